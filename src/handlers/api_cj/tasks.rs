use actix_session::Session;
use actix_web::{HttpResponse, http::StatusCode, web};

use super::{AtHref, CjError, document, template_payload};
use crate::auth::session::{MANAGE_INSTANCES, require_permission, require_user_id};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::AppError;
use crate::handlers::collections::{Documents, Surface};
use crate::handlers::{abilities, read_payload};
use crate::models::task::{self, TaskInstance, TaskStatus};
use crate::schemas::SchemaRegistry;

fn caller(session: &Session, href: &str) -> Result<i64, CjError> {
    require_permission(session, MANAGE_INSTANCES).at(href)?;
    require_user_id(session).at(href)
}

fn respond_with(
    docs: &Documents<'_>,
    session: &Session,
    href: &str,
    found: &TaskInstance,
) -> Result<HttpResponse, CjError> {
    let doc = docs.task_single(found, abilities(session)).at(href)?;
    Ok(document(StatusCode::OK, &doc))
}

/// GET /api/cj/task-instances/{id}
pub async fn read(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, CjError> {
    let docs = Documents::new(&registry, &config, Surface::Api);
    let href = docs.uris().task(&path);
    let user_id = caller(&session, &href)?;

    let found = task::find_owned(&pool, &path, user_id)
        .await
        .and_then(|t| t.ok_or(AppError::NotFound))
        .at(&href)?;
    respond_with(&docs, &session, &href, &found)
}

/// PUT /api/cj/task-instances/{id} - status `completed` completes, `pending` reopens
pub async fn update(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
    body: web::Bytes,
) -> Result<HttpResponse, CjError> {
    let docs = Documents::new(&registry, &config, Surface::Api);
    let href = docs.uris().task(&path);
    let user_id = caller(&session, &href)?;

    let payload = template_payload(&body).at(&href)?;
    let status = read_payload(&registry.task, &payload, |p| {
        p.get("status")
            .and_then(|v| v.as_str())
            .and_then(TaskStatus::parse)
            .ok_or_else(|| vec!["Status must be pending or completed".to_string()])
    })
    .at(&href)?;

    let updated = match status {
        TaskStatus::Completed => task::complete(&pool, &path, user_id).await,
        TaskStatus::Pending => task::reopen(&pool, &path, user_id).await,
    }
    .at(&href)?;
    respond_with(&docs, &session, &href, &updated)
}

/// POST /api/cj/task-instances/{id}/complete
pub async fn complete(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, CjError> {
    let docs = Documents::new(&registry, &config, Surface::Api);
    let href = docs.uris().task(&path);
    let user_id = caller(&session, &href)?;

    let updated = task::complete(&pool, &path, user_id).await.at(&href)?;
    respond_with(&docs, &session, &href, &updated)
}

/// POST /api/cj/task-instances/{id}/reopen
pub async fn reopen(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, CjError> {
    let docs = Documents::new(&registry, &config, Surface::Api);
    let href = docs.uris().task(&path);
    let user_id = caller(&session, &href)?;

    let updated = task::reopen(&pool, &path, user_id).await.at(&href)?;
    respond_with(&docs, &session, &href, &updated)
}
