use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::{contains_pattern, definition, generate_id, task};
use super::types::*;

const SELECT_INSTANCE: &str = "SELECT id, workflow_definition_id, user_id, name, status, created_at, \
                               due_datetime, share_token FROM workflow_instances";

async fn with_tasks(pool: &DbPool, mut instance: WorkflowInstance) -> Result<WorkflowInstance, AppError> {
    instance.tasks = task::find_for_instance(pool, &instance.id).await?;
    Ok(instance)
}

/// The caller's instances, newest first.
pub async fn find_for_user(
    pool: &DbPool,
    user_id: i64,
    filter: &InstanceFilter,
) -> Result<Vec<WorkflowInstance>, AppError> {
    let rows = sqlx::query_as::<_, WorkflowInstance>(&format!(
        "{SELECT_INSTANCE} \
         WHERE user_id = ?1 \
           AND (?2 IS NULL OR status = ?2) \
           AND (?3 IS NULL OR workflow_definition_id = ?3) \
           AND (?4 IS NULL OR name LIKE ?4 ESCAPE '\\') \
         ORDER BY created_at DESC, rowid DESC"
    ))
    .bind(user_id)
    .bind(filter.status.map(|s| s.as_str()))
    .bind(filter.definition_id.as_deref())
    .bind(filter.name.as_deref().map(contains_pattern))
    .fetch_all(pool)
    .await?;

    let mut instances = Vec::with_capacity(rows.len());
    for row in rows {
        instances.push(with_tasks(pool, row).await?);
    }
    Ok(instances)
}

/// An instance with its tasks, provided it belongs to `user_id`.
pub async fn find_owned(pool: &DbPool, id: &str, user_id: i64) -> Result<Option<WorkflowInstance>, AppError> {
    let row = sqlx::query_as::<_, WorkflowInstance>(&format!("{SELECT_INSTANCE} WHERE id = ?1 AND user_id = ?2"))
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    match row {
        Some(instance) => Ok(Some(with_tasks(pool, instance).await?)),
        None => Ok(None),
    }
}

async fn require_owned(pool: &DbPool, id: &str, user_id: i64) -> Result<WorkflowInstance, AppError> {
    find_owned(pool, id, user_id).await?.ok_or(AppError::NotFound)
}

pub async fn find_by_share_token(pool: &DbPool, token: &str) -> Result<Option<WorkflowInstance>, AppError> {
    let row = sqlx::query_as::<_, WorkflowInstance>(&format!("{SELECT_INSTANCE} WHERE share_token = ?1"))
        .bind(token)
        .fetch_optional(pool)
        .await?;
    match row {
        Some(instance) => Ok(Some(with_tasks(pool, instance).await?)),
        None => Ok(None),
    }
}

/// Instance due time shifted by a task's offset, refusing out-of-range results.
fn task_due(due: DateTime<Utc>, offset_minutes: i64, task: &str) -> Result<DateTime<Utc>, AppError> {
    Duration::try_minutes(offset_minutes)
        .and_then(|offset| due.checked_add_signed(offset))
        .ok_or_else(|| AppError::Validation(vec![format!("Task '{task}': due date is out of range")]))
}

/// Instantiate a definition for `user_id`, copying its tasks. Task due
/// times are the instance due time plus each task's offset.
pub async fn create(pool: &DbPool, user_id: i64, new: &NewInstance) -> Result<WorkflowInstance, AppError> {
    let definition = definition::find_by_id(pool, &new.workflow_definition_id)
        .await?
        .ok_or_else(|| {
            AppError::Validation(vec![format!(
                "Workflow definition '{}' does not exist",
                new.workflow_definition_id
            )])
        })?;

    let id = generate_id("wf");
    let name = new.name.clone().unwrap_or_else(|| definition.name.clone());

    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO workflow_instances (id, workflow_definition_id, user_id, name, status, created_at, due_datetime) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(&id)
    .bind(&definition.id)
    .bind(user_id)
    .bind(&name)
    .bind(new.status)
    .bind(Utc::now())
    .bind(new.due_datetime)
    .execute(&mut *tx)
    .await?;

    for task_def in &definition.tasks {
        let due = match new.due_datetime {
            Some(due) => Some(task_due(due, task_def.due_offset_minutes.unwrap_or(0), &task_def.name)?),
            None => None,
        };
        sqlx::query(
            "INSERT INTO task_instances (id, workflow_instance_id, name, position, status, due_datetime) \
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
        )
        .bind(generate_id("task"))
        .bind(&id)
        .bind(&task_def.name)
        .bind(task_def.position)
        .bind(due)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    log::info!("User {user_id} started workflow {id} from {}", definition.id);
    require_owned(pool, &id, user_id).await
}

/// Apply an edit, enforcing the status rules.
pub async fn update(pool: &DbPool, id: &str, user_id: i64, changes: &InstanceUpdate) -> Result<WorkflowInstance, AppError> {
    let current = require_owned(pool, id, user_id).await?;

    if let Some(def_id) = &changes.workflow_definition_id {
        if *def_id != current.workflow_definition_id {
            return Err(AppError::Validation(vec![
                "The definition of an existing workflow cannot be changed".to_string(),
            ]));
        }
    }
    let status = changes.status.unwrap_or(current.status);
    current
        .status
        .check_transition(status, current.all_tasks_done())
        .map_err(AppError::Conflict)?;

    sqlx::query("UPDATE workflow_instances SET name = ?1, status = ?2, due_datetime = ?3 WHERE id = ?4")
        .bind(changes.name.as_deref().unwrap_or(&current.name))
        .bind(status)
        .bind(changes.due_datetime.unwrap_or(current.due_datetime))
        .bind(id)
        .execute(pool)
        .await?;

    require_owned(pool, id, user_id).await
}

async fn set_status(pool: &DbPool, id: &str, status: InstanceStatus) -> Result<(), AppError> {
    sqlx::query("UPDATE workflow_instances SET status = ?1 WHERE id = ?2")
        .bind(status)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Archive an instance. Archiving twice is a no-op; completed instances stay put.
pub async fn archive(pool: &DbPool, id: &str, user_id: i64) -> Result<WorkflowInstance, AppError> {
    let instance = require_owned(pool, id, user_id).await?;
    match instance.status {
        InstanceStatus::Archived => return Ok(instance),
        InstanceStatus::Completed => {
            return Err(AppError::Conflict("A completed workflow cannot be archived".to_string()));
        }
        _ => {}
    }
    set_status(pool, id, InstanceStatus::Archived).await?;
    log::info!("Archived workflow instance {id}");
    require_owned(pool, id, user_id).await
}

pub async fn unarchive(pool: &DbPool, id: &str, user_id: i64) -> Result<WorkflowInstance, AppError> {
    let instance = require_owned(pool, id, user_id).await?;
    if instance.status != InstanceStatus::Archived {
        return Err(AppError::Conflict("Only archived workflows can be unarchived".to_string()));
    }
    set_status(pool, id, InstanceStatus::Active).await?;
    log::info!("Unarchived workflow instance {id}");
    require_owned(pool, id, user_id).await
}

/// The instance's share token, generated on first use.
pub async fn share(pool: &DbPool, id: &str, user_id: i64) -> Result<String, AppError> {
    let instance = require_owned(pool, id, user_id).await?;
    if let Some(token) = instance.share_token {
        return Ok(token);
    }
    let bytes: [u8; 16] = rand::rng().random();
    let token = hex::encode(bytes);
    sqlx::query("UPDATE workflow_instances SET share_token = ?1 WHERE id = ?2 AND share_token IS NULL")
        .bind(&token)
        .bind(id)
        .execute(pool)
        .await?;
    // A concurrent request may have won the race; the stored token is authoritative
    let stored: Option<String> = sqlx::query_scalar("SELECT share_token FROM workflow_instances WHERE id = ?1")
        .bind(id)
        .fetch_one(pool)
        .await?;
    stored.ok_or(AppError::NotFound)
}
