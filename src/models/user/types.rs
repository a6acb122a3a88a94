use chrono::{DateTime, Utc};

use crate::auth::session::{MANAGE_DEFINITIONS, MANAGE_INSTANCES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }

    /// Permission codes granted by this role.
    pub fn permission_codes(&self) -> Vec<&'static str> {
        match self {
            Role::Admin => vec![MANAGE_DEFINITIONS, MANAGE_INSTANCES],
            Role::Member => vec![MANAGE_INSTANCES],
        }
    }
}

/// Internal user struct for authentication, includes the password hash.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// New user data for creation. `password` is already hashed.
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub role: Role,
}
