use std::collections::HashMap;

use actix_session::Session;
use actix_web::{HttpResponse, http::StatusCode, web};

use super::{AtHref, CjError, created, document, template_payload};
use crate::auth::session::{MANAGE_DEFINITIONS, MANAGE_INSTANCES, require_permission, require_user_id};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::AppError;
use crate::handlers::collections::{Documents, Surface};
use crate::handlers::{abilities, read_payload};
use crate::models::definition::{self, DefinitionFilter, NewDefinition};
use crate::models::instance::{self, NewInstance};
use crate::schemas::SchemaRegistry;

/// GET /api/cj/ - entry point with links to every collection
pub async fn home(
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
) -> HttpResponse {
    let docs = Documents::new(&registry, &config, Surface::Api);
    document(StatusCode::OK, &docs.home())
}

/// GET /api/cj/workflow-definitions - query params filter by name
pub async fn list(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    query: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, CjError> {
    let docs = Documents::new(&registry, &config, Surface::Api);
    let href = docs.uris().definitions();

    let filters = registry.definition.filter_values(&query);
    let definitions = definition::find_all(&pool, &DefinitionFilter::from_values(&filters))
        .await
        .at(&href)?;
    let doc = docs
        .definition_list(&definitions, filters, Vec::new(), abilities(&session))
        .at(&href)?;
    Ok(document(StatusCode::OK, &doc))
}

/// POST /api/cj/workflow-definitions - body is a filled-in template
pub async fn create(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    body: web::Bytes,
) -> Result<HttpResponse, CjError> {
    let docs = Documents::new(&registry, &config, Surface::Api);
    let href = docs.uris().definitions();
    require_permission(&session, MANAGE_DEFINITIONS).at(&href)?;

    let payload = template_payload(&body).at(&href)?;
    let new = read_payload(&registry.definition, &payload, NewDefinition::from_payload).at(&href)?;
    let def = definition::create(&pool, &new).await.at(&href)?;

    let doc = docs.definition_single(&def, true, abilities(&session)).at(&href)?;
    Ok(created(&doc))
}

/// GET /api/cj/workflow-definitions/{id}
pub async fn read(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, CjError> {
    let docs = Documents::new(&registry, &config, Surface::Api);
    let href = docs.uris().definition(&path);

    let def = definition::find_by_id(&pool, &path)
        .await
        .and_then(|found| found.ok_or(AppError::NotFound))
        .at(&href)?;
    let doc = docs.definition_single(&def, true, abilities(&session)).at(&href)?;
    Ok(document(StatusCode::OK, &doc))
}

/// PUT /api/cj/workflow-definitions/{id} - replaces name, description and tasks
pub async fn update(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
    body: web::Bytes,
) -> Result<HttpResponse, CjError> {
    let docs = Documents::new(&registry, &config, Surface::Api);
    let href = docs.uris().definition(&path);
    require_permission(&session, MANAGE_DEFINITIONS).at(&href)?;

    let payload = template_payload(&body).at(&href)?;
    let changes = read_payload(&registry.definition, &payload, NewDefinition::from_payload).at(&href)?;
    let def = definition::update(&pool, &path, &changes).await.at(&href)?;

    let doc = docs.definition_single(&def, true, abilities(&session)).at(&href)?;
    Ok(document(StatusCode::OK, &doc))
}

/// DELETE /api/cj/workflow-definitions/{id} - 409 while instances use it
pub async fn delete(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, CjError> {
    let docs = Documents::new(&registry, &config, Surface::Api);
    let href = docs.uris().definition(&path);
    require_permission(&session, MANAGE_DEFINITIONS).at(&href)?;

    definition::delete(&pool, &path).await.at(&href)?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/cj/workflow-definitions/{id}/instances - start with defaults
pub async fn instantiate(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, CjError> {
    let docs = Documents::new(&registry, &config, Surface::Api);
    let href = format!("{}/instances", docs.uris().definition(&path));
    require_permission(&session, MANAGE_INSTANCES).at(&href)?;
    let user_id = require_user_id(&session).at(&href)?;

    let wf = match instance::create(&pool, user_id, &NewInstance::new(path.into_inner())).await {
        Err(AppError::Validation(_)) => Err(AppError::NotFound),
        other => other,
    }
    .at(&href)?;
    let doc = docs.instance_single(&wf, true, abilities(&session)).at(&href)?;
    Ok(created(&doc))
}
