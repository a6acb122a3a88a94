use actix_web::{HttpResponse, http::StatusCode, web};

use super::{AtHref, CjError, document};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::AppError;
use crate::handlers::collections::{Documents, Surface};
use crate::models::instance;
use crate::schemas::SchemaRegistry;

/// GET /api/cj/share/{token} and /api/cj/share/{token}/tasks - public, read-only
pub async fn view(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    path: web::Path<String>,
) -> Result<HttpResponse, CjError> {
    shared_doc(&pool, &registry, &config, &path, 0).await
}

pub async fn tasks(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    path: web::Path<String>,
) -> Result<HttpResponse, CjError> {
    shared_doc(&pool, &registry, &config, &path, 1).await
}

async fn shared_doc(
    pool: &DbPool,
    registry: &SchemaRegistry,
    config: &AppConfig,
    token: &str,
    index: usize,
) -> Result<HttpResponse, CjError> {
    let docs = Documents::new(registry, config, Surface::Api);
    let href = docs.uris().share(token);

    let wf = instance::find_by_share_token(pool, token)
        .await
        .and_then(|found| found.ok_or(AppError::NotFound))
        .at(&href)?;
    let shared = docs.shared(token, &wf).at(&href)?;
    let doc = shared.get(index).ok_or(AppError::NotFound).at(&href)?;
    Ok(document(StatusCode::OK, doc))
}
