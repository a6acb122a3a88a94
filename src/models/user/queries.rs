use chrono::Utc;

use crate::db::DbPool;
use crate::errors::AppError;
use super::types::{NewUser, User};

const SELECT_USER: &str =
    "SELECT id, username, password, display_name, role, created_at FROM users";

pub async fn find_by_username(pool: &DbPool, username: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE username = ?1"))
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn find_by_id(pool: &DbPool, id: i64) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

pub async fn count(pool: &DbPool) -> Result<i64, AppError> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

/// Insert a user; a taken username is a conflict.
pub async fn create(pool: &DbPool, new: &NewUser) -> Result<i64, AppError> {
    if find_by_username(pool, &new.username).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "Username '{}' is already taken",
            new.username
        )));
    }
    let result = sqlx::query(
        "INSERT INTO users (username, password, display_name, role, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&new.username)
    .bind(&new.password)
    .bind(&new.display_name)
    .bind(new.role)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}
