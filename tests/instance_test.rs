//! Workflow instance and task lifecycle tests.

mod common;

use chrono::{TimeZone, Utc};

use checklists::errors::AppError;
use checklists::models::definition::{self, NewDefinition, TaskSpec};
use checklists::models::instance::{self, InstanceFilter, InstanceStatus, InstanceUpdate, NewInstance};
use checklists::models::task::{self, TaskStatus};
use checklists::models::user::Role;
use common::*;

const MORNING: &str = "def_morning_quick_start";
const EVENING: &str = "def_evening_wind_down";

async fn member(pool: &checklists::db::DbPool) -> i64 {
    create_user(pool, "walker", "walker123", Role::Member).await
}

fn no_changes() -> InstanceUpdate {
    InstanceUpdate {
        name: None,
        status: None,
        due_datetime: None,
        workflow_definition_id: None,
    }
}

#[tokio::test]
async fn test_instantiate_copies_tasks_with_due_offsets() {
    let db = setup_test_db_seeded().await;
    let pool = db.pool();
    let user_id = member(pool).await;

    let due = Utc.with_ymd_and_hms(2025, 3, 1, 21, 0, 0).unwrap();
    let mut new = NewInstance::new(EVENING);
    new.due_datetime = Some(due);
    let wf = instance::create(pool, user_id, &new).await.expect("create");

    assert_eq!(wf.name, "Evening Wind Down");
    assert_eq!(wf.status, InstanceStatus::Active);
    assert_eq!(wf.tasks.len(), 3);
    assert!(wf.tasks.iter().all(|t| t.status == TaskStatus::Pending));

    let first = wf.tasks.iter().find(|t| t.position == 1).expect("first task");
    assert_eq!(first.due_datetime, Some(due + chrono::Duration::minutes(5)));
    let second = wf.tasks.iter().find(|t| t.position == 2).expect("second task");
    assert_eq!(second.due_datetime, Some(due));
}

#[tokio::test]
async fn test_instantiate_unknown_definition_is_a_validation_error() {
    let db = setup_test_db_seeded().await;
    let pool = db.pool();
    let user_id = member(pool).await;

    let result = instance::create(pool, user_id, &NewInstance::new("def_nope")).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_instances_are_private_to_their_owner() {
    let db = setup_test_db_seeded().await;
    let pool = db.pool();
    let owner = member(pool).await;
    let other = create_user(pool, "other", "other123", Role::Member).await;

    let wf = instance::create(pool, owner, &NewInstance::new(MORNING)).await.expect("create");

    assert!(instance::find_owned(pool, &wf.id, other).await.expect("query").is_none());
    assert!(instance::find_for_user(pool, other, &InstanceFilter::default()).await.expect("list").is_empty());
    assert!(matches!(instance::archive(pool, &wf.id, other).await, Err(AppError::NotFound)));
    assert!(matches!(task::complete(pool, &wf.tasks[0].id, other).await, Err(AppError::NotFound)));
}

#[tokio::test]
async fn test_completing_every_task_completes_the_workflow() {
    let db = setup_test_db_seeded().await;
    let pool = db.pool();
    let user_id = member(pool).await;

    let mut new = NewInstance::new(MORNING);
    new.status = InstanceStatus::Pending;
    let wf = instance::create(pool, user_id, &new).await.expect("create");
    assert_eq!(wf.status, InstanceStatus::Pending);

    task::complete(pool, &wf.tasks[0].id, user_id).await.expect("complete first");
    let after_first = instance::find_owned(pool, &wf.id, user_id).await.expect("find").expect("owned");
    assert_eq!(after_first.status, InstanceStatus::Active);
    assert_eq!(after_first.progress(), (1, 3));

    for t in &wf.tasks[1..] {
        task::complete(pool, &t.id, user_id).await.expect("complete");
    }
    let done = instance::find_owned(pool, &wf.id, user_id).await.expect("find").expect("owned");
    assert_eq!(done.status, InstanceStatus::Completed);

    let reopened = task::reopen(pool, &wf.tasks[2].id, user_id).await.expect("reopen");
    assert_eq!(reopened.status, TaskStatus::Pending);
    let active = instance::find_owned(pool, &wf.id, user_id).await.expect("find").expect("owned");
    assert_eq!(active.status, InstanceStatus::Active);
}

#[tokio::test]
async fn test_pending_tasks_sort_before_completed_ones() {
    let db = setup_test_db_seeded().await;
    let pool = db.pool();
    let user_id = member(pool).await;
    let wf = instance::create(pool, user_id, &NewInstance::new(MORNING)).await.expect("create");

    let first = wf.tasks.iter().find(|t| t.position == 1).expect("first");
    task::complete(pool, &first.id, user_id).await.expect("complete");

    let tasks = task::find_for_instance(pool, &wf.id).await.expect("tasks");
    let order: Vec<(TaskStatus, i64)> = tasks.iter().map(|t| (t.status, t.position)).collect();
    assert_eq!(
        order,
        vec![(TaskStatus::Pending, 2), (TaskStatus::Pending, 3), (TaskStatus::Completed, 1)]
    );
}

#[tokio::test]
async fn test_task_transitions_are_checked() {
    let db = setup_test_db_seeded().await;
    let pool = db.pool();
    let user_id = member(pool).await;
    let wf = instance::create(pool, user_id, &NewInstance::new(MORNING)).await.expect("create");
    let id = &wf.tasks[0].id;

    assert!(matches!(task::reopen(pool, id, user_id).await, Err(AppError::Conflict(_))));
    task::complete(pool, id, user_id).await.expect("complete");
    assert!(matches!(task::complete(pool, id, user_id).await, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_archive_and_unarchive() {
    let db = setup_test_db_seeded().await;
    let pool = db.pool();
    let user_id = member(pool).await;
    let wf = instance::create(pool, user_id, &NewInstance::new(MORNING)).await.expect("create");

    let archived = instance::archive(pool, &wf.id, user_id).await.expect("archive");
    assert_eq!(archived.status, InstanceStatus::Archived);
    // Archiving twice is harmless
    instance::archive(pool, &wf.id, user_id).await.expect("archive again");

    let restored = instance::unarchive(pool, &wf.id, user_id).await.expect("unarchive");
    assert_eq!(restored.status, InstanceStatus::Active);
    assert!(matches!(instance::unarchive(pool, &wf.id, user_id).await, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_completed_workflow_cannot_be_archived() {
    let db = setup_test_db_seeded().await;
    let pool = db.pool();
    let user_id = member(pool).await;
    let wf = instance::create(pool, user_id, &NewInstance::new(MORNING)).await.expect("create");
    for t in &wf.tasks {
        task::complete(pool, &t.id, user_id).await.expect("complete");
    }

    assert!(matches!(instance::archive(pool, &wf.id, user_id).await, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_update_enforces_status_rules() {
    let db = setup_test_db_seeded().await;
    let pool = db.pool();
    let user_id = member(pool).await;
    let wf = instance::create(pool, user_id, &NewInstance::new(MORNING)).await.expect("create");

    let completed = InstanceUpdate {
        status: Some(InstanceStatus::Completed),
        ..no_changes()
    };
    assert!(matches!(instance::update(pool, &wf.id, user_id, &completed).await, Err(AppError::Conflict(_))));

    let other_definition = InstanceUpdate {
        workflow_definition_id: Some(EVENING.to_string()),
        ..no_changes()
    };
    assert!(matches!(
        instance::update(pool, &wf.id, user_id, &other_definition).await,
        Err(AppError::Validation(_))
    ));

    let renamed = InstanceUpdate {
        name: Some("Slow morning".to_string()),
        status: Some(InstanceStatus::Pending),
        ..no_changes()
    };
    let updated = instance::update(pool, &wf.id, user_id, &renamed).await.expect("update");
    assert_eq!(updated.name, "Slow morning");
    assert_eq!(updated.status, InstanceStatus::Pending);
}

#[tokio::test]
async fn test_list_filters_by_status_and_definition() {
    let db = setup_test_db_seeded().await;
    let pool = db.pool();
    let user_id = member(pool).await;

    let a = instance::create(pool, user_id, &NewInstance::new(MORNING)).await.expect("create");
    instance::create(pool, user_id, &NewInstance::new(MORNING)).await.expect("create");
    instance::create(pool, user_id, &NewInstance::new(EVENING)).await.expect("create");
    instance::archive(pool, &a.id, user_id).await.expect("archive");

    let archived = InstanceFilter {
        status: Some(InstanceStatus::Archived),
        ..Default::default()
    };
    let found = instance::find_for_user(pool, user_id, &archived).await.expect("list");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, a.id);

    let evening = InstanceFilter {
        definition_id: Some(EVENING.to_string()),
        ..Default::default()
    };
    assert_eq!(instance::find_for_user(pool, user_id, &evening).await.expect("list").len(), 1);

    let all = instance::find_for_user(pool, user_id, &InstanceFilter::default()).await.expect("list");
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn test_share_token_is_stable_and_resolves() {
    let db = setup_test_db_seeded().await;
    let pool = db.pool();
    let user_id = member(pool).await;
    let wf = instance::create(pool, user_id, &NewInstance::new(MORNING)).await.expect("create");

    let token = instance::share(pool, &wf.id, user_id).await.expect("share");
    assert_eq!(token.len(), 32);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(instance::share(pool, &wf.id, user_id).await.expect("share again"), token);

    let shared = instance::find_by_share_token(pool, &token).await.expect("lookup").expect("shared");
    assert_eq!(shared.id, wf.id);
    assert_eq!(shared.tasks.len(), 3);
    assert!(instance::find_by_share_token(pool, "nope").await.expect("lookup").is_none());
}

#[tokio::test]
async fn test_due_offsets_are_bounded() {
    let db = setup_test_db().await;
    let pool = db.pool();

    let errors = TaskSpec::parse_lines("Far | 1000000000000\nNear | 15").expect_err("offset too large");
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Line 1"));

    // Definitions built without the line parser get the same check
    let unchecked = NewDefinition {
        name: "Far future".to_string(),
        description: None,
        tasks: vec![TaskSpec {
            name: "Far".to_string(),
            due_offset_minutes: Some(1_000_000_000_000),
        }],
    };
    assert!(matches!(definition::create(pool, &unchecked).await, Err(AppError::Validation(_))));
    assert_eq!(definition::count(pool).await.expect("count"), 0);
}

#[tokio::test]
async fn test_unrepresentable_task_due_date_is_a_validation_error() {
    let db = setup_test_db().await;
    let pool = db.pool();
    let user_id = member(pool).await;
    let def = definition::create(
        pool,
        &NewDefinition {
            name: "Edge of time".to_string(),
            description: None,
            tasks: TaskSpec::parse_lines("Late | 1").expect("task lines"),
        },
    )
    .await
    .expect("create definition");

    let mut new = NewInstance::new(def.id.clone());
    new.due_datetime = Some(chrono::DateTime::<Utc>::MAX_UTC);
    let result = instance::create(pool, user_id, &new).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    // The instance insert was rolled back with the tasks
    let left = instance::find_for_user(pool, user_id, &InstanceFilter::default()).await.expect("list");
    assert!(left.is_empty());
}

#[tokio::test]
async fn test_update_keeps_due_date_unless_cleared() {
    let db = setup_test_db_seeded().await;
    let pool = db.pool();
    let user_id = member(pool).await;

    let due = Utc.with_ymd_and_hms(2025, 3, 1, 21, 0, 0).unwrap();
    let mut new = NewInstance::new(EVENING);
    new.due_datetime = Some(due);
    let wf = instance::create(pool, user_id, &new).await.expect("create");

    let renamed = InstanceUpdate {
        name: Some("Late wind down".to_string()),
        ..no_changes()
    };
    let updated = instance::update(pool, &wf.id, user_id, &renamed).await.expect("rename");
    assert_eq!(updated.name, "Late wind down");
    assert_eq!(updated.due_datetime, Some(due));

    let cleared = InstanceUpdate {
        due_datetime: Some(None),
        ..no_changes()
    };
    let updated = instance::update(pool, &wf.id, user_id, &cleared).await.expect("clear");
    assert_eq!(updated.name, "Late wind down");
    assert_eq!(updated.due_datetime, None);
}
