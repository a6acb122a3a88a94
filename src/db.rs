use std::str::FromStr;

use serde::Deserialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::errors::AppError;
use crate::models::definition::{self, NewDefinition, TaskSpec};
use crate::models::user::{self, NewUser, Role};

pub type DbPool = SqlitePool;

pub const MIGRATIONS: &str = include_str!("schema.sql");

const DEFINITIONS_SEED: &str = include_str!("../data/seed/definitions.json");

/// Open a pool. In-memory databases get a single, never-recycled connection
/// because each SQLite connection would otherwise see its own empty database.
pub async fn init_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let in_memory = database_url.contains(":memory:");
    let mut options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(8)
    };
    pool_options.connect_with(options).await
}

pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(MIGRATIONS).execute(pool).await?;
    log::info!("Database migrations complete");
    Ok(())
}

/// Create the `admin` account when no user exists yet.
pub async fn seed_admin(pool: &DbPool, password_hash: &str) -> Result<(), AppError> {
    let count = user::count(pool).await?;
    if count > 0 {
        log::info!("Database already has {count} user(s), skipping admin seed");
        return Ok(());
    }
    user::create(
        pool,
        &NewUser {
            username: "admin".to_string(),
            password: password_hash.to_string(),
            display_name: "Administrator".to_string(),
            role: Role::Admin,
        },
    )
    .await?;
    log::info!("Seeded admin user");
    Ok(())
}

#[derive(Deserialize)]
struct SeedDefinition {
    id: String,
    name: String,
    description: Option<String>,
    tasks: Vec<TaskSpec>,
}

/// Load the bundled example definitions into an empty definitions table.
/// Returns how many were created.
pub async fn seed_demo_definitions(pool: &DbPool) -> Result<usize, AppError> {
    let count = definition::count(pool).await?;
    if count > 0 {
        log::info!("Database already has {count} definition(s), skipping demo seed");
        return Ok(0);
    }

    let seeds: Vec<SeedDefinition> = serde_json::from_str(DEFINITIONS_SEED)
        .map_err(|e| AppError::Validation(vec![format!("Bad definitions seed JSON: {e}")]))?;
    for seed in &seeds {
        let new = NewDefinition {
            name: seed.name.clone(),
            description: seed.description.clone(),
            tasks: seed.tasks.clone(),
        };
        definition::create_with_id(pool, &seed.id, &new).await?;
    }
    log::info!("Seeded {} demo workflow definitions", seeds.len());
    Ok(seeds.len())
}
