use chrono::Utc;
use sqlx::{Sqlite, Transaction};

use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::{contains_pattern, generate_id};
use super::types::*;

const SELECT_DEFINITION: &str =
    "SELECT id, name, description, created_at FROM workflow_definitions";

async fn load_tasks(pool: &DbPool, definition: &mut WorkflowDefinition) -> Result<(), AppError> {
    definition.tasks = sqlx::query_as::<_, TaskDefinition>(
        "SELECT id, workflow_definition_id, name, position, due_offset_minutes \
         FROM task_definitions WHERE workflow_definition_id = ?1 ORDER BY position",
    )
    .bind(&definition.id)
    .fetch_all(pool)
    .await?;
    Ok(())
}

/// All definitions matching the filter, by name, with their tasks.
pub async fn find_all(pool: &DbPool, filter: &DefinitionFilter) -> Result<Vec<WorkflowDefinition>, AppError> {
    let mut definitions = sqlx::query_as::<_, WorkflowDefinition>(&format!(
        "{SELECT_DEFINITION} \
         WHERE (?1 IS NULL OR name LIKE ?1 ESCAPE '\\') \
         ORDER BY name, created_at"
    ))
    .bind(filter.name.as_deref().map(contains_pattern))
    .fetch_all(pool)
    .await?;

    for definition in &mut definitions {
        load_tasks(pool, definition).await?;
    }
    Ok(definitions)
}

pub async fn find_by_id(pool: &DbPool, id: &str) -> Result<Option<WorkflowDefinition>, AppError> {
    let found = sqlx::query_as::<_, WorkflowDefinition>(&format!("{SELECT_DEFINITION} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    match found {
        Some(mut definition) => {
            load_tasks(pool, &mut definition).await?;
            Ok(Some(definition))
        }
        None => Ok(None),
    }
}

/// Ids of every definition, for select options.
pub async fn find_ids(pool: &DbPool) -> Result<Vec<String>, AppError> {
    let ids = sqlx::query_scalar::<_, String>("SELECT id FROM workflow_definitions ORDER BY name, id")
        .fetch_all(pool)
        .await?;
    Ok(ids)
}

pub async fn count(pool: &DbPool) -> Result<i64, AppError> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM workflow_definitions")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

async fn insert_tasks(
    tx: &mut Transaction<'_, Sqlite>,
    definition_id: &str,
    tasks: &[TaskSpec],
) -> Result<(), AppError> {
    for (i, task) in tasks.iter().enumerate() {
        sqlx::query(
            "INSERT INTO task_definitions (id, workflow_definition_id, name, position, due_offset_minutes) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(generate_id("tdef"))
        .bind(definition_id)
        .bind(&task.name)
        .bind(i as i64 + 1)
        .bind(task.due_offset_minutes)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn require_name(new: &NewDefinition) -> Result<(), AppError> {
    if new.name.trim().is_empty() {
        return Err(AppError::Validation(vec!["Definition name cannot be empty.".to_string()]));
    }
    let out_of_range: Vec<String> = new
        .tasks
        .iter()
        .filter(|t| t.due_offset_minutes.is_some_and(|m| m.abs() > MAX_DUE_OFFSET_MINUTES))
        .map(|t| format!("Task '{}': due offset is outside ±{MAX_DUE_OFFSET_MINUTES} minutes", t.name))
        .collect();
    if !out_of_range.is_empty() {
        return Err(AppError::Validation(out_of_range));
    }
    Ok(())
}

/// Create a definition under a generated `def_` id.
pub async fn create(pool: &DbPool, new: &NewDefinition) -> Result<WorkflowDefinition, AppError> {
    create_with_id(pool, &generate_id("def"), new).await
}

pub async fn create_with_id(pool: &DbPool, id: &str, new: &NewDefinition) -> Result<WorkflowDefinition, AppError> {
    require_name(new)?;

    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO workflow_definitions (id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(id)
    .bind(new.name.trim())
    .bind(new.description.as_deref())
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;
    insert_tasks(&mut tx, id, &new.tasks).await?;
    tx.commit().await?;

    log::info!("Created workflow definition {id} ({} tasks)", new.tasks.len());
    find_by_id(pool, id).await?.ok_or(AppError::NotFound)
}

/// Replace name, description and the whole task list.
pub async fn update(pool: &DbPool, id: &str, new: &NewDefinition) -> Result<WorkflowDefinition, AppError> {
    require_name(new)?;
    if new.tasks.is_empty() {
        return Err(AppError::Validation(vec![
            "A definition must have at least one task.".to_string(),
        ]));
    }

    let mut tx = pool.begin().await?;
    let updated = sqlx::query("UPDATE workflow_definitions SET name = ?1, description = ?2 WHERE id = ?3")
        .bind(new.name.trim())
        .bind(new.description.as_deref())
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    sqlx::query("DELETE FROM task_definitions WHERE workflow_definition_id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    insert_tasks(&mut tx, id, &new.tasks).await?;
    tx.commit().await?;

    log::info!("Updated workflow definition {id}");
    find_by_id(pool, id).await?.ok_or(AppError::NotFound)
}

/// Delete a definition that no instance refers to.
pub async fn delete(pool: &DbPool, id: &str) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM workflow_definitions WHERE id = ?1")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    if !exists {
        return Err(AppError::NotFound);
    }
    let in_use: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM workflow_instances WHERE workflow_definition_id = ?1")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
    if in_use > 0 {
        return Err(AppError::Conflict(format!(
            "Definition is used by {in_use} workflow instance(s) and cannot be deleted"
        )));
    }
    sqlx::query("DELETE FROM workflow_definitions WHERE id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    log::info!("Deleted workflow definition {id}");
    Ok(())
}
