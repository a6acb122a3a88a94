//! Shared test infrastructure for model and route tests.
//!
//! `setup_test_db()` gives every test its own in-memory SQLite database with
//! the schema applied. Users are seeded on demand.

use checklists::auth::password;
use checklists::db::{self, DbPool};
use checklists::models::user::{self, NewUser, Role};

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASS: &str = "admin123";
pub const MEMBER_USER: &str = "member";
pub const MEMBER_PASS: &str = "member123";

pub struct TestDb {
    pool: DbPool,
}

impl TestDb {
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Fresh database with migrations applied and nothing else.
pub async fn setup_test_db() -> TestDb {
    let pool = db::init_pool("sqlite::memory:").await.expect("open in-memory DB");
    db::run_migrations(&pool).await.expect("run migrations");
    TestDb { pool }
}

/// Fresh database with the bundled definitions plus an admin and a member.
pub async fn setup_test_db_seeded() -> TestDb {
    let db = setup_test_db().await;
    db::seed_demo_definitions(db.pool()).await.expect("seed definitions");
    create_user(db.pool(), ADMIN_USER, ADMIN_PASS, Role::Admin).await;
    create_user(db.pool(), MEMBER_USER, MEMBER_PASS, Role::Member).await;
    db
}

pub async fn create_user(pool: &DbPool, username: &str, pass: &str, role: Role) -> i64 {
    let hash = password::hash_password(pass).expect("hash password");
    user::create(
        pool,
        &NewUser {
            username: username.to_string(),
            password: hash,
            display_name: username.to_string(),
            role,
        },
    )
    .await
    .expect("create user")
}
