use actix_session::Session;

use crate::errors::AppError;
use crate::models::user::User;

pub const MANAGE_DEFINITIONS: &str = "definitions.manage";
pub const MANAGE_INSTANCES: &str = "instances.manage";

/// Wrapper around permission codes with a `has()` method for use in Askama templates.
#[derive(Debug, Clone, Default)]
pub struct Permissions(pub Vec<String>);

impl Permissions {
    pub fn has(&self, code: &str) -> bool {
        self.0.iter().any(|p| p == code)
    }

    pub fn from_csv(csv: &str) -> Self {
        let codes = csv
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Permissions(codes)
    }

    pub fn to_csv(&self) -> String {
        self.0.join(",")
    }
}

/// Store the logged-in user in the session. The session id is renewed to
/// prevent fixation.
pub fn sign_in(session: &Session, user: &User) -> Result<(), AppError> {
    let permissions = Permissions(
        user.role
            .permission_codes()
            .into_iter()
            .map(String::from)
            .collect(),
    );
    session.renew();
    store(session, "user_id", user.id)?;
    store(session, "username", &user.username)?;
    store(session, "display_name", &user.display_name)?;
    store(session, "permissions", permissions.to_csv())?;
    Ok(())
}

fn store(session: &Session, key: &str, value: impl serde::Serialize) -> Result<(), AppError> {
    session
        .insert(key, value)
        .map_err(|e| AppError::Session(format!("Failed to store {key}: {e}")))
}

pub fn get_user_id(session: &Session) -> Option<i64> {
    session.get::<i64>("user_id").unwrap_or(None)
}

/// The logged-in user's id, or a session error for anonymous requests.
pub fn require_user_id(session: &Session) -> Result<i64, AppError> {
    get_user_id(session).ok_or_else(|| AppError::Session("No user in session".to_string()))
}

pub fn get_username(session: &Session) -> Result<String, String> {
    match session.get::<String>("username") {
        Ok(Some(username)) => Ok(username),
        Ok(None) => Err("No username in session".to_string()),
        Err(e) => Err(format!("Session error: {}", e)),
    }
}

pub fn get_permissions(session: &Session) -> Result<Permissions, String> {
    match session.get::<String>("permissions") {
        Ok(Some(csv)) => Ok(Permissions::from_csv(&csv)),
        Ok(None) => Err("No permissions in session".to_string()),
        Err(e) => Err(format!("Session error: {}", e)),
    }
}

pub fn set_flash(session: &Session, message: impl Into<String>) {
    if let Err(e) = session.insert("flash", message.into()) {
        log::warn!("Could not store flash message: {e}");
    }
}

pub fn take_flash(session: &Session) -> Option<String> {
    let flash = session.get::<String>("flash").unwrap_or(None);
    if flash.is_some() {
        session.remove("flash");
    }
    flash
}

/// Check permission; returns Err(AppError) if denied.
pub fn require_permission(session: &Session, code: &str) -> Result<(), AppError> {
    let permissions = get_permissions(session)
        .map_err(|e| AppError::Session(format!("Failed to get permissions: {}", e)))?;

    if permissions.has(code) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(code.to_string()))
    }
}
