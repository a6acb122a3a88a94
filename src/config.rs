use actix_web::cookie::Key;

use crate::hypermedia::DEFAULT_TEXTAREA_THRESHOLD;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/checklists.db?mode=rwc";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_APP_NAME: &str = "Checklists";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

/// Runtime settings, read once at startup from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub session_key: Option<String>,
    /// Prefix for every generated href; empty means relative URIs.
    pub public_base_url: String,
    pub app_name: String,
    pub admin_password: String,
    pub textarea_threshold: u64,
    pub seed_demo: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            log::debug!("No .env file loaded: {e}");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let textarea_threshold = match lookup("TEXTAREA_THRESHOLD") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                log::warn!("TEXTAREA_THRESHOLD '{raw}' is not a number, using {DEFAULT_TEXTAREA_THRESHOLD}");
                DEFAULT_TEXTAREA_THRESHOLD
            }),
            None => DEFAULT_TEXTAREA_THRESHOLD,
        };

        let seed_demo = lookup("SEED_DEMO")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(true);

        Self {
            database_url: get("DATABASE_URL", DEFAULT_DATABASE_URL),
            bind_addr: get("BIND_ADDR", DEFAULT_BIND_ADDR),
            session_key: lookup("SESSION_KEY"),
            public_base_url: get("PUBLIC_BASE_URL", "").trim_end_matches('/').to_string(),
            app_name: get("APP_NAME", DEFAULT_APP_NAME),
            admin_password: get("ADMIN_PASSWORD", DEFAULT_ADMIN_PASSWORD),
            textarea_threshold,
            seed_demo,
        }
    }

    /// Cookie signing key. A missing or short SESSION_KEY falls back to a
    /// random key, so sessions do not survive a restart.
    pub fn session_key(&self) -> Key {
        match &self.session_key {
            Some(val) if val.len() >= 64 => {
                log::info!("Using SESSION_KEY from environment");
                Key::from(val.as_bytes())
            }
            Some(val) => {
                log::warn!("SESSION_KEY too short ({} bytes, need 64+), generating random key", val.len());
                Key::generate()
            }
            None => {
                log::warn!("No SESSION_KEY set, generating random key (sessions lost on restart)");
                Key::generate()
            }
        }
    }

    /// SQLite file databases live under a directory that may not exist yet.
    pub fn database_dir(&self) -> Option<std::path::PathBuf> {
        let path = self.database_url.strip_prefix("sqlite://")?;
        let path = path.split('?').next()?;
        if path.is_empty() || path.starts_with(":memory:") {
            return None;
        }
        std::path::Path::new(path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
    }
}
