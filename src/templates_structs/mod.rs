// Template context structures for Askama templates.

use actix_session::Session;

use crate::auth::csrf;
use crate::auth::session::{Permissions, get_permissions, get_username, take_flash};
use crate::config::AppConfig;
use crate::errors::AppError;

/// Common context shared by all authenticated pages.
/// Templates access these as `ctx.username`, `ctx.permissions`, etc.
pub struct PageContext {
    pub username: String,
    pub avatar_initial: String,
    pub permissions: Permissions,
    pub flash: Option<String>,
    pub app_name: String,
    pub csrf_token: String,
    /// Section highlighted in the top navigation.
    pub active: String,
}

impl PageContext {
    pub fn build(session: &Session, config: &AppConfig, active: &str) -> Result<Self, AppError> {
        let username = get_username(session)
            .map_err(|e| AppError::Session(format!("Failed to get username: {}", e)))?;
        let permissions = get_permissions(session)
            .map_err(|e| AppError::Session(format!("Failed to get permissions: {}", e)))?;
        let flash = take_flash(session);
        let csrf_token = csrf::get_or_create_token(session);
        let avatar_initial = username.chars().next().unwrap_or('?').to_uppercase().to_string();
        Ok(Self {
            username,
            avatar_initial,
            permissions,
            flash,
            app_name: config.app_name.clone(),
            csrf_token,
            active: active.to_string(),
        })
    }

    pub fn is_signed_in(&self) -> bool {
        !self.username.is_empty()
    }

    /// Context for pages reachable without signing in, such as shared views.
    pub fn anonymous(config: &AppConfig) -> Self {
        Self {
            username: String::new(),
            avatar_initial: String::new(),
            permissions: Permissions::default(),
            flash: None,
            app_name: config.app_name.clone(),
            csrf_token: String::new(),
            active: String::new(),
        }
    }
}

mod collection;
mod common;

pub use collection::*;
pub use common::*;
