pub mod api_cj;
pub mod auth_handlers;
pub mod collections;
pub mod definition_handlers;
pub mod home;
pub mod instance_handlers;
pub mod share_handlers;
pub mod task_handlers;

use actix_session::Session;
use actix_web::{HttpResponse, web};
use serde_json::{Map, Value};

use crate::auth::middleware::require_auth;
use crate::auth::session::{MANAGE_DEFINITIONS, MANAGE_INSTANCES, get_permissions};
use crate::errors::AppError;
use crate::hypermedia::EntitySchema;
use collections::Abilities;

/// Document abilities of the signed-in user.
pub fn abilities(session: &Session) -> Abilities {
    let permissions = get_permissions(session).unwrap_or_default();
    Abilities {
        manage_definitions: permissions.has(MANAGE_DEFINITIONS),
        manage_instances: permissions.has(MANAGE_INSTANCES),
    }
}

/// Validate a write payload against its schema, then read it into a domain input.
pub fn read_payload<T>(
    schema: &EntitySchema,
    payload: &Map<String, Value>,
    parse: impl FnOnce(&Map<String, Value>) -> Result<T, Vec<String>>,
) -> Result<T, AppError> {
    let filled = schema.validate(payload).map_err(AppError::Validation)?;
    parse(&filled).map_err(AppError::Validation)
}

pub fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header(("Location", location))
        .finish()
}

/// Every route of the application. Shared state (pool, schemas, config,
/// rate limiter) is registered by the caller.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // Public routes
        .route("/health", web::get().to(home::health))
        .route("/login", web::get().to(auth_handlers::login_page))
        .route("/login", web::post().to(auth_handlers::login_submit))
        .route("/share/{token}", web::get().to(share_handlers::view))
        .route("/api/cj/share/{token}", web::get().to(api_cj::share::view))
        .route("/api/cj/share/{token}/tasks", web::get().to(api_cj::share::tasks))
        // Collection+JSON API
        .service(
            web::scope(api_cj::API_PREFIX)
                .wrap(actix_web::middleware::from_fn(api_cj::require_json_content_type))
                .wrap(actix_web::middleware::from_fn(require_auth))
                .configure(api_cj::configure),
        )
        // Protected routes
        .service(
            web::scope("")
                .wrap(actix_web::middleware::from_fn(require_auth))
                .route("/", web::get().to(home::index))
                .route("/logout", web::post().to(auth_handlers::logout))
                // Definitions
                .route("/workflow-definitions", web::get().to(definition_handlers::list))
                .route("/workflow-definitions", web::post().to(definition_handlers::create))
                .route("/workflow-definitions/{id}", web::get().to(definition_handlers::read))
                .route("/workflow-definitions/{id}", web::post().to(definition_handlers::update))
                .route("/workflow-definitions/{id}/edit", web::get().to(definition_handlers::edit_form))
                .route("/workflow-definitions/{id}/delete", web::post().to(definition_handlers::delete))
                .route("/workflow-definitions/{id}/instances", web::post().to(definition_handlers::instantiate))
                // Instances
                .route("/workflow-instances", web::get().to(instance_handlers::list))
                .route("/workflow-instances", web::post().to(instance_handlers::create))
                .route("/workflow-instances/{id}", web::get().to(instance_handlers::read))
                .route("/workflow-instances/{id}", web::post().to(instance_handlers::update))
                .route("/workflow-instances/{id}/edit", web::get().to(instance_handlers::edit_form))
                .route("/workflow-instances/{id}/archive", web::post().to(instance_handlers::archive))
                .route("/workflow-instances/{id}/unarchive", web::post().to(instance_handlers::unarchive))
                .route("/workflow-instances/{id}/share", web::post().to(instance_handlers::share))
                // Tasks
                .route("/task-instances/{id}", web::get().to(task_handlers::read))
                .route("/task-instances/{id}/complete", web::post().to(task_handlers::complete))
                .route("/task-instances/{id}/reopen", web::post().to(task_handlers::reopen)),
        )
        // Default 404 handler (must be registered last)
        .default_service(web::to(|| async {
            let html = include_str!("../../templates/errors/404.html");
            HttpResponse::NotFound()
                .content_type("text/html; charset=utf-8")
                .body(html)
        }));
}
