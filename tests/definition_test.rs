//! Workflow definition model tests: CRUD, task ordering, delete guard, seeding.

mod common;

use checklists::db;
use checklists::errors::AppError;
use checklists::models::definition::{self, DefinitionFilter, NewDefinition, TaskSpec};
use checklists::models::instance::{self, NewInstance};
use common::*;

fn new_definition(name: &str, tasks: &str) -> NewDefinition {
    NewDefinition {
        name: name.to_string(),
        description: None,
        tasks: TaskSpec::parse_lines(tasks).expect("task lines"),
    }
}

#[tokio::test]
async fn test_create_definition_numbers_tasks_from_one() {
    let db = setup_test_db().await;
    let pool = db.pool();

    let def = definition::create(pool, &new_definition("Laundry", "Sort\nWash | 30\nFold"))
        .await
        .expect("create");

    assert!(def.id.starts_with("def_"));
    let positions: Vec<i64> = def.tasks.iter().map(|t| t.position).collect();
    assert_eq!(positions, vec![1, 2, 3]);
    assert_eq!(def.tasks[1].due_offset_minutes, Some(30));
    assert_eq!(def.tasks[0].due_offset_minutes, None);
}

#[tokio::test]
async fn test_create_definition_rejects_blank_name() {
    let db = setup_test_db().await;
    let result = definition::create(db.pool(), &new_definition("   ", "One")).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(definition::count(db.pool()).await.expect("count"), 0);
}

#[tokio::test]
async fn test_find_all_filters_by_name_substring() {
    let db = setup_test_db().await;
    let pool = db.pool();
    definition::create(pool, &new_definition("Morning routine", "Wake")).await.expect("create");
    definition::create(pool, &new_definition("Evening routine", "Sleep")).await.expect("create");
    definition::create(pool, &new_definition("Groceries", "Milk")).await.expect("create");

    let all = definition::find_all(pool, &DefinitionFilter::default()).await.expect("all");
    let names: Vec<&str> = all.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["Evening routine", "Groceries", "Morning routine"]);

    let filter = DefinitionFilter {
        name: Some("routine".to_string()),
    };
    let routines = definition::find_all(pool, &filter).await.expect("filtered");
    assert_eq!(routines.len(), 2);
}

#[tokio::test]
async fn test_update_replaces_task_list() {
    let db = setup_test_db().await;
    let pool = db.pool();
    let def = definition::create(pool, &new_definition("Packing", "Socks\nShirts")).await.expect("create");

    let updated = definition::update(pool, &def.id, &new_definition("Packing list", "Passport\nSocks\nCharger"))
        .await
        .expect("update");
    assert_eq!(updated.name, "Packing list");
    let names: Vec<&str> = updated.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Passport", "Socks", "Charger"]);
}

#[tokio::test]
async fn test_update_requires_a_task_and_an_existing_definition() {
    let db = setup_test_db().await;
    let pool = db.pool();
    let def = definition::create(pool, &new_definition("Packing", "Socks")).await.expect("create");

    let empty = definition::update(pool, &def.id, &new_definition("Packing", "")).await;
    assert!(matches!(empty, Err(AppError::Validation(_))));

    let missing = definition::update(pool, "def_missing", &new_definition("X", "Y")).await;
    assert!(matches!(missing, Err(AppError::NotFound)));
}

#[tokio::test]
async fn test_delete_is_refused_while_instances_exist() {
    let db = setup_test_db().await;
    let pool = db.pool();
    let user_id = create_user(pool, MEMBER_USER, MEMBER_PASS, checklists::models::user::Role::Member).await;
    let def = definition::create(pool, &new_definition("Chores", "Dishes")).await.expect("create");
    instance::create(pool, user_id, &NewInstance::new(def.id.clone())).await.expect("instantiate");

    let result = definition::delete(pool, &def.id).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert!(definition::find_by_id(pool, &def.id).await.expect("find").is_some());
}

#[tokio::test]
async fn test_delete_removes_definition_and_tasks() {
    let db = setup_test_db().await;
    let pool = db.pool();
    let def = definition::create(pool, &new_definition("Chores", "Dishes\nFloors")).await.expect("create");

    definition::delete(pool, &def.id).await.expect("delete");
    assert!(definition::find_by_id(pool, &def.id).await.expect("find").is_none());

    let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM task_definitions WHERE workflow_definition_id = ?1")
        .bind(&def.id)
        .fetch_one(pool)
        .await
        .expect("count tasks");
    assert_eq!(orphans, 0);

    assert!(matches!(definition::delete(pool, &def.id).await, Err(AppError::NotFound)));
}

#[tokio::test]
async fn test_demo_seed_runs_once() {
    let db = setup_test_db().await;
    let pool = db.pool();

    let first = db::seed_demo_definitions(pool).await.expect("seed");
    assert_eq!(first, 2);
    let second = db::seed_demo_definitions(pool).await.expect("seed again");
    assert_eq!(second, 0);

    let morning = definition::find_by_id(pool, "def_morning_quick_start")
        .await
        .expect("find")
        .expect("seeded definition");
    assert_eq!(morning.tasks.len(), 3);
    assert_eq!(definition::find_ids(pool).await.expect("ids").len(), 2);
}

#[tokio::test]
async fn test_name_filter_treats_wildcards_literally() {
    let db = setup_test_db().await;
    let pool = db.pool();
    definition::create(pool, &new_definition("100% done", "One")).await.expect("create");
    definition::create(pool, &new_definition("1000 things", "One")).await.expect("create");
    definition::create(pool, &new_definition("one_two", "One")).await.expect("create");
    definition::create(pool, &new_definition("oneXtwo", "One")).await.expect("create");

    let by_name = |name: &str| DefinitionFilter {
        name: Some(name.to_string()),
    };
    let percent = definition::find_all(pool, &by_name("0%")).await.expect("filter");
    assert_eq!(percent.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(), vec!["100% done"]);

    let underscore = definition::find_all(pool, &by_name("e_t")).await.expect("filter");
    assert_eq!(underscore.len(), 1);
    assert_eq!(underscore[0].name, "one_two");

    assert!(definition::find_all(pool, &by_name("_x_")).await.expect("filter").is_empty());
}
