use std::io;

use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::{App, HttpServer, middleware, web};

use checklists::auth::{self, rate_limit::RateLimiter};
use checklists::config::AppConfig;
use checklists::schemas::SchemaRegistry;
use checklists::{db, handlers};

fn startup_error(what: &str, e: impl std::fmt::Display) -> io::Error {
    io::Error::other(format!("{what}: {e}"))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init();
    let config = AppConfig::from_env();

    // Ensure data directory exists
    if let Some(dir) = config.database_dir() {
        std::fs::create_dir_all(&dir)?;
    }

    // Initialize database
    let pool = db::init_pool(&config.database_url)
        .await
        .map_err(|e| startup_error("Failed to open database", e))?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| startup_error("Failed to run migrations", e))?;

    let admin_hash = auth::password::hash_password(&config.admin_password)
        .map_err(|e| startup_error("Failed to hash admin password", e))?;
    db::seed_admin(&pool, &admin_hash)
        .await
        .map_err(|e| startup_error("Failed to seed admin user", e))?;
    if config.seed_demo {
        db::seed_demo_definitions(&pool)
            .await
            .map_err(|e| startup_error("Failed to seed definitions", e))?;
    }

    // Bad schemas are a startup failure, never a per-request one
    let registry = SchemaRegistry::load(config.textarea_threshold)
        .map_err(|e| startup_error("Failed to load entity schemas", e))?;
    registry
        .check()
        .map_err(|e| startup_error("Entity schemas do not build a catalog", e))?;

    let secret_key = config.session_key();
    let bind_addr = config.bind_addr.clone();

    let pool = web::Data::new(pool);
    let registry = web::Data::new(registry);
    let limiter = web::Data::new(RateLimiter::default());
    let config = web::Data::new(config);

    log::info!("Starting server at http://{bind_addr}");

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
            .cookie_secure(false)
            .cookie_http_only(true)
            .build();

        App::new()
            .wrap(session_mw)
            .wrap(middleware::Logger::default())
            .app_data(pool.clone())
            .app_data(registry.clone())
            .app_data(config.clone())
            .app_data(limiter.clone())
            .service(actix_files::Files::new("/static", "./static"))
            .configure(handlers::configure)
    })
    .bind(bind_addr)?
    .run()
    .await
}
