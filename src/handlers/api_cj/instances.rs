use std::collections::HashMap;

use actix_session::Session;
use actix_web::{HttpResponse, http::StatusCode, web};

use super::{AtHref, CjError, created, document, template_payload};
use crate::auth::session::{MANAGE_INSTANCES, require_permission, require_user_id};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::AppError;
use crate::handlers::collections::{Documents, Surface};
use crate::handlers::{abilities, read_payload};
use crate::models::definition;
use crate::models::instance::{self, InstanceFilter, InstanceUpdate, NewInstance, WorkflowInstance};
use crate::schemas::SchemaRegistry;

/// Permission check plus the caller's id, reported against `href`.
fn caller(session: &Session, href: &str) -> Result<i64, CjError> {
    require_permission(session, MANAGE_INSTANCES).at(href)?;
    require_user_id(session).at(href)
}

async fn owned(pool: &DbPool, id: &str, user_id: i64) -> Result<WorkflowInstance, AppError> {
    instance::find_owned(pool, id, user_id).await?.ok_or(AppError::NotFound)
}

/// GET /api/cj/workflow-instances - the caller's instances, newest first
pub async fn list(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    query: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, CjError> {
    let docs = Documents::new(&registry, &config, Surface::Api);
    let href = docs.uris().instances();
    let user_id = caller(&session, &href)?;

    let schema = docs.instance_schema(definition::find_ids(&pool).await.at(&href)?);
    let filters = schema.filter_values(&query);
    let instances = instance::find_for_user(&pool, user_id, &InstanceFilter::from_values(&filters))
        .await
        .at(&href)?;
    let doc = docs
        .instance_list(&schema, &instances, filters, Vec::new(), abilities(&session))
        .at(&href)?;
    Ok(document(StatusCode::OK, &doc))
}

/// POST /api/cj/workflow-instances - start a workflow from a template
pub async fn create(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    body: web::Bytes,
) -> Result<HttpResponse, CjError> {
    let docs = Documents::new(&registry, &config, Surface::Api);
    let href = docs.uris().instances();
    let user_id = caller(&session, &href)?;

    let payload = template_payload(&body).at(&href)?;
    let new = read_payload(&registry.instance, &payload, NewInstance::from_payload).at(&href)?;
    let wf = instance::create(&pool, user_id, &new).await.at(&href)?;

    let doc = docs.instance_single(&wf, true, abilities(&session)).at(&href)?;
    Ok(created(&doc))
}

/// GET /api/cj/workflow-instances/{id}
pub async fn read(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, CjError> {
    let docs = Documents::new(&registry, &config, Surface::Api);
    let href = docs.uris().instance(&path);
    let user_id = caller(&session, &href)?;

    let wf = owned(&pool, &path, user_id).await.at(&href)?;
    let doc = docs.instance_single(&wf, true, abilities(&session)).at(&href)?;
    Ok(document(StatusCode::OK, &doc))
}

/// PUT /api/cj/workflow-instances/{id} - name, status and due date
pub async fn update(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
    body: web::Bytes,
) -> Result<HttpResponse, CjError> {
    let docs = Documents::new(&registry, &config, Surface::Api);
    let href = docs.uris().instance(&path);
    let user_id = caller(&session, &href)?;

    let payload = template_payload(&body).at(&href)?;
    let changes = read_payload(&registry.instance, &payload, InstanceUpdate::from_payload).at(&href)?;
    let wf = instance::update(&pool, &path, user_id, &changes).await.at(&href)?;

    let doc = docs.instance_single(&wf, true, abilities(&session)).at(&href)?;
    Ok(document(StatusCode::OK, &doc))
}

/// GET /api/cj/workflow-instances/{id}/tasks
pub async fn tasks(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, CjError> {
    let docs = Documents::new(&registry, &config, Surface::Api);
    let href = docs.uris().instance_tasks(&path);
    let user_id = caller(&session, &href)?;

    let wf = owned(&pool, &path, user_id).await.at(&href)?;
    let doc = docs.task_list(&wf, abilities(&session)).at(&href)?;
    Ok(document(StatusCode::OK, &doc))
}

#[derive(Clone, Copy)]
enum Transition {
    Archive,
    Unarchive,
    Share,
}

async fn transition(
    pool: &DbPool,
    registry: &SchemaRegistry,
    config: &AppConfig,
    session: &Session,
    id: &str,
    which: Transition,
) -> Result<HttpResponse, CjError> {
    let docs = Documents::new(registry, config, Surface::Api);
    let href = docs.uris().instance(id);
    let user_id = caller(session, &href)?;

    let wf = match which {
        Transition::Archive => instance::archive(pool, id, user_id).await,
        Transition::Unarchive => instance::unarchive(pool, id, user_id).await,
        Transition::Share => match instance::share(pool, id, user_id).await {
            Ok(_) => owned(pool, id, user_id).await,
            Err(e) => Err(e),
        },
    }
    .at(&href)?;

    let doc = docs.instance_single(&wf, true, abilities(session)).at(&href)?;
    Ok(document(StatusCode::OK, &doc))
}

/// POST /api/cj/workflow-instances/{id}/archive - 409 for completed workflows
pub async fn archive(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, CjError> {
    transition(&pool, &registry, &config, &session, &path, Transition::Archive).await
}

/// POST /api/cj/workflow-instances/{id}/unarchive
pub async fn unarchive(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, CjError> {
    transition(&pool, &registry, &config, &session, &path, Transition::Unarchive).await
}

/// POST /api/cj/workflow-instances/{id}/share - the document gains a `shared` link
pub async fn share(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, CjError> {
    transition(&pool, &registry, &config, &session, &path, Transition::Share).await
}
