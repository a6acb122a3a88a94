use sqlx::{Sqlite, Transaction};

use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::instance::InstanceStatus;
use super::types::*;

const SELECT_TASK: &str = "SELECT t.id, t.workflow_instance_id, t.name, t.position, t.status, t.due_datetime \
                           FROM task_instances t";

/// Tasks of one instance: pending first, then by position.
pub async fn find_for_instance(pool: &DbPool, instance_id: &str) -> Result<Vec<TaskInstance>, AppError> {
    let tasks = sqlx::query_as::<_, TaskInstance>(&format!(
        "{SELECT_TASK} WHERE t.workflow_instance_id = ?1 \
         ORDER BY CASE t.status WHEN 'pending' THEN 0 ELSE 1 END, t.position"
    ))
    .bind(instance_id)
    .fetch_all(pool)
    .await?;
    Ok(tasks)
}

/// A task, provided its instance belongs to `user_id`.
pub async fn find_owned(pool: &DbPool, task_id: &str, user_id: i64) -> Result<Option<TaskInstance>, AppError> {
    let task = sqlx::query_as::<_, TaskInstance>(&format!(
        "{SELECT_TASK} JOIN workflow_instances w ON w.id = t.workflow_instance_id \
         WHERE t.id = ?1 AND w.user_id = ?2"
    ))
    .bind(task_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(task)
}

async fn lock_owned(
    tx: &mut Transaction<'_, Sqlite>,
    task_id: &str,
    user_id: i64,
) -> Result<(TaskInstance, InstanceStatus), AppError> {
    let task = sqlx::query_as::<_, TaskInstance>(&format!(
        "{SELECT_TASK} JOIN workflow_instances w ON w.id = t.workflow_instance_id \
         WHERE t.id = ?1 AND w.user_id = ?2"
    ))
    .bind(task_id)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(AppError::NotFound)?;

    let status: InstanceStatus = sqlx::query_scalar("SELECT status FROM workflow_instances WHERE id = ?1")
        .bind(&task.workflow_instance_id)
        .fetch_one(&mut **tx)
        .await?;
    Ok((task, status))
}

async fn set_task_status(
    tx: &mut Transaction<'_, Sqlite>,
    task_id: &str,
    status: TaskStatus,
) -> Result<(), AppError> {
    sqlx::query("UPDATE task_instances SET status = ?1 WHERE id = ?2")
        .bind(status)
        .bind(task_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn set_instance_status(
    tx: &mut Transaction<'_, Sqlite>,
    instance_id: &str,
    status: InstanceStatus,
) -> Result<(), AppError> {
    sqlx::query("UPDATE workflow_instances SET status = ?1 WHERE id = ?2")
        .bind(status)
        .bind(instance_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Mark a pending task completed. The instance becomes active when it was
/// pending, and completed once no task is left pending.
pub async fn complete(pool: &DbPool, task_id: &str, user_id: i64) -> Result<TaskInstance, AppError> {
    let mut tx = pool.begin().await?;
    let (mut task, instance_status) = lock_owned(&mut tx, task_id, user_id).await?;
    if task.status != TaskStatus::Pending {
        return Err(AppError::Conflict("Task is already completed".to_string()));
    }
    set_task_status(&mut tx, task_id, TaskStatus::Completed).await?;

    let remaining: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM task_instances WHERE workflow_instance_id = ?1 AND status = 'pending'",
    )
    .bind(&task.workflow_instance_id)
    .fetch_one(&mut *tx)
    .await?;

    let next = if remaining == 0 {
        Some(InstanceStatus::Completed)
    } else if instance_status == InstanceStatus::Pending {
        Some(InstanceStatus::Active)
    } else {
        None
    };
    if let Some(next) = next.filter(|n| *n != instance_status) {
        set_instance_status(&mut tx, &task.workflow_instance_id, next).await?;
        log::info!("Workflow instance {} is now {}", task.workflow_instance_id, next.as_str());
    }
    tx.commit().await?;

    task.status = TaskStatus::Completed;
    Ok(task)
}

/// Put a completed task back to pending; a completed instance becomes active.
pub async fn reopen(pool: &DbPool, task_id: &str, user_id: i64) -> Result<TaskInstance, AppError> {
    let mut tx = pool.begin().await?;
    let (mut task, instance_status) = lock_owned(&mut tx, task_id, user_id).await?;
    if task.status != TaskStatus::Completed {
        return Err(AppError::Conflict("Task is not completed".to_string()));
    }
    set_task_status(&mut tx, task_id, TaskStatus::Pending).await?;
    if instance_status == InstanceStatus::Completed {
        set_instance_status(&mut tx, &task.workflow_instance_id, InstanceStatus::Active).await?;
        log::info!("Workflow instance {} reopened", task.workflow_instance_id);
    }
    tx.commit().await?;

    task.status = TaskStatus::Pending;
    Ok(task)
}
