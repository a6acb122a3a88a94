use std::collections::HashMap;

use actix_session::Session;
use actix_web::{HttpResponse, web};

use crate::auth::csrf;
use crate::auth::session::{MANAGE_INSTANCES, require_permission, require_user_id, set_flash};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::{AppError, render};
use crate::handlers::collections::{Documents, Surface, Uris};
use crate::handlers::{abilities, read_payload, see_other};
use crate::hypermedia::FieldValue;
use crate::models::definition;
use crate::models::instance::{self, InstanceFilter, InstanceUpdate, NewInstance};
use crate::schemas::SchemaRegistry;
use crate::templates_structs::{CollectionPage, PageContext};

type Params = HashMap<String, String>;

/// Renders the list; `form` is a rejected create submission to echo back.
async fn list_page(
    pool: &DbPool,
    registry: &SchemaRegistry,
    config: &AppConfig,
    session: &Session,
    query: &Params,
    form: Option<&Params>,
    errors: Vec<String>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_user_id(session)?;
    let docs = Documents::new(registry, config, Surface::Html);
    let schema = docs.instance_schema(definition::find_ids(pool).await?);

    let filters = schema.filter_values(query);
    let instances = instance::find_for_user(pool, user_id, &InstanceFilter::from_values(&filters)).await?;
    let draft = form.map(|f| schema.form_values(f)).unwrap_or_default();

    let doc = docs.instance_list(&schema, &instances, filters, draft, abilities(session))?;
    let ctx = PageContext::build(session, config, "instances")?;
    render(CollectionPage::new(ctx, vec![doc]).with_errors(errors))
}

pub async fn list(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    query: web::Query<Params>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, MANAGE_INSTANCES)?;
    list_page(&pool, &registry, &config, &session, &query, None, Vec::new()).await
}

pub async fn create(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    form: web::Form<Params>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, MANAGE_INSTANCES)?;
    csrf::validate_form(&session, &form)?;
    let user_id = require_user_id(&session)?;

    let payload = registry.instance.coerce_form(&form);
    let created = match read_payload(&registry.instance, &payload, NewInstance::from_payload) {
        Ok(new) => instance::create(&pool, user_id, &new).await,
        Err(e) => Err(e),
    };

    match created {
        Ok(wf) => {
            set_flash(&session, format!("Started '{}'", wf.name));
            Ok(see_other(&Uris::new(&config, Surface::Html).instance(&wf.id)))
        }
        Err(AppError::Validation(errors)) => {
            list_page(&pool, &registry, &config, &session, &HashMap::new(), Some(&form), errors).await
        }
        Err(e) => Err(e),
    }
}

async fn single_page(
    pool: &DbPool,
    registry: &SchemaRegistry,
    config: &AppConfig,
    session: &Session,
    id: &str,
    editable: bool,
    errors: Vec<String>,
) -> Result<HttpResponse, AppError> {
    let user_id = require_user_id(session)?;
    let wf = instance::find_owned(pool, id, user_id).await?.ok_or(AppError::NotFound)?;

    let docs = Documents::new(registry, config, Surface::Html);
    let abilities = abilities(session);
    let mut pages = vec![docs.instance_single(&wf, editable, abilities)?];
    if !editable {
        pages.push(docs.task_list(&wf, abilities)?);
    }
    let ctx = PageContext::build(session, config, "instances")?;
    render(CollectionPage::new(ctx, pages).with_errors(errors))
}

pub async fn read(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, MANAGE_INSTANCES)?;
    single_page(&pool, &registry, &config, &session, &path, false, Vec::new()).await
}

pub async fn edit_form(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, MANAGE_INSTANCES)?;
    single_page(&pool, &registry, &config, &session, &path, true, Vec::new()).await
}

pub async fn update(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
    form: web::Form<Params>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, MANAGE_INSTANCES)?;
    csrf::validate_form(&session, &form)?;
    let user_id = require_user_id(&session)?;
    let id = path.into_inner();

    let payload = registry.instance.coerce_form(&form);
    let updated = match read_payload(&registry.instance, &payload, InstanceUpdate::from_payload) {
        Ok(changes) => instance::update(&pool, &id, user_id, &changes).await,
        Err(e) => Err(e),
    };

    match updated {
        Ok(wf) => {
            set_flash(&session, format!("Saved '{}'", wf.name));
            Ok(see_other(&Uris::new(&config, Surface::Html).instance(&wf.id)))
        }
        Err(AppError::Validation(errors)) => {
            single_page(&pool, &registry, &config, &session, &id, true, errors).await
        }
        Err(AppError::Conflict(msg)) => {
            single_page(&pool, &registry, &config, &session, &id, true, vec![msg]).await
        }
        Err(e) => Err(e),
    }
}

/// Shared tail of the archive/unarchive buttons: conflicts become a flash message.
fn after_transition(
    session: &Session,
    config: &AppConfig,
    id: &str,
    outcome: Result<String, AppError>,
) -> Result<HttpResponse, AppError> {
    match outcome {
        Ok(message) => set_flash(session, message),
        Err(AppError::Conflict(msg)) => set_flash(session, msg),
        Err(e) => return Err(e),
    }
    Ok(see_other(&Uris::new(config, Surface::Html).instance(id)))
}

pub async fn archive(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
    form: web::Form<Params>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, MANAGE_INSTANCES)?;
    csrf::validate_form(&session, &form)?;
    let user_id = require_user_id(&session)?;
    let id = path.into_inner();

    let outcome = instance::archive(&pool, &id, user_id)
        .await
        .map(|wf| format!("Archived '{}'", wf.name));
    after_transition(&session, &config, &id, outcome)
}

pub async fn unarchive(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
    form: web::Form<Params>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, MANAGE_INSTANCES)?;
    csrf::validate_form(&session, &form)?;
    let user_id = require_user_id(&session)?;
    let id = path.into_inner();

    let outcome = instance::unarchive(&pool, &id, user_id)
        .await
        .map(|wf| format!("'{}' is active again", wf.name));
    after_transition(&session, &config, &id, outcome)
}

pub async fn share(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
    form: web::Form<Params>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, MANAGE_INSTANCES)?;
    csrf::validate_form(&session, &form)?;
    let user_id = require_user_id(&session)?;
    let id = path.into_inner();

    let uris = Uris::new(&config, Surface::Html);
    let outcome = instance::share(&pool, &id, user_id)
        .await
        .map(|token| format!("Anyone with this link can view the workflow: {}", uris.share(&token)));
    after_transition(&session, &config, &id, outcome)
}
