use std::collections::HashMap;

use actix_session::Session;
use actix_web::{HttpResponse, web};

use crate::auth::csrf;
use crate::auth::session::{MANAGE_DEFINITIONS, MANAGE_INSTANCES, require_permission, require_user_id, set_flash};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::{AppError, render};
use crate::handlers::collections::{Documents, Surface, Uris};
use crate::handlers::{abilities, read_payload, see_other};
use crate::hypermedia::FieldValue;
use crate::models::definition::{self, DefinitionFilter, NewDefinition};
use crate::models::instance::{self, NewInstance};
use crate::schemas::SchemaRegistry;
use crate::templates_structs::{CollectionPage, PageContext};

type Params = HashMap<String, String>;

async fn list_page(
    pool: &DbPool,
    registry: &SchemaRegistry,
    config: &AppConfig,
    session: &Session,
    query: &Params,
    draft: Vec<(String, FieldValue)>,
    errors: Vec<String>,
) -> Result<HttpResponse, AppError> {
    let filters = registry.definition.filter_values(query);
    let definitions = definition::find_all(pool, &DefinitionFilter::from_values(&filters)).await?;

    let docs = Documents::new(registry, config, Surface::Html);
    let doc = docs.definition_list(&definitions, filters, draft, abilities(session))?;
    let ctx = PageContext::build(session, config, "definitions")?;
    render(CollectionPage::new(ctx, vec![doc]).with_errors(errors))
}

pub async fn list(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    query: web::Query<Params>,
) -> Result<HttpResponse, AppError> {
    list_page(&pool, &registry, &config, &session, &query, Vec::new(), Vec::new()).await
}

pub async fn create(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    form: web::Form<Params>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, MANAGE_DEFINITIONS)?;
    csrf::validate_form(&session, &form)?;

    let payload = registry.definition.coerce_form(&form);
    let created = match read_payload(&registry.definition, &payload, NewDefinition::from_payload) {
        Ok(new) => definition::create(&pool, &new).await,
        Err(e) => Err(e),
    };

    match created {
        Ok(def) => {
            set_flash(&session, format!("Definition '{}' created", def.name));
            Ok(see_other(&Uris::new(&config, Surface::Html).definition(&def.id)))
        }
        Err(AppError::Validation(errors)) => {
            let draft = registry.definition.form_values(&form);
            list_page(&pool, &registry, &config, &session, &HashMap::new(), draft, errors).await
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
    let def = definition::find_by_id(pool, id).await?.ok_or(AppError::NotFound)?;
    let docs = Documents::new(registry, config, Surface::Html);
    let doc = docs.definition_single(&def, editable, abilities(session))?;
    let ctx = PageContext::build(session, config, "definitions")?;
    render(CollectionPage::new(ctx, vec![doc]).with_errors(errors))
}

pub async fn read(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    single_page(&pool, &registry, &config, &session, &path, false, Vec::new()).await
}

pub async fn edit_form(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, MANAGE_DEFINITIONS)?;
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
    require_permission(&session, MANAGE_DEFINITIONS)?;
    csrf::validate_form(&session, &form)?;
    let id = path.into_inner();

    let payload = registry.definition.coerce_form(&form);
    let updated = match read_payload(&registry.definition, &payload, NewDefinition::from_payload) {
        Ok(changes) => definition::update(&pool, &id, &changes).await,
        Err(e) => Err(e),
    };

    match updated {
        Ok(def) => {
            set_flash(&session, format!("Definition '{}' saved", def.name));
            Ok(see_other(&Uris::new(&config, Surface::Html).definition(&def.id)))
        }
        Err(AppError::Validation(errors)) => {
            single_page(&pool, &registry, &config, &session, &id, true, errors).await
        }
        Err(e) => Err(e),
    }
}

pub async fn delete(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
    form: web::Form<Params>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, MANAGE_DEFINITIONS)?;
    csrf::validate_form(&session, &form)?;
    let id = path.into_inner();

    match definition::delete(&pool, &id).await {
        Ok(()) => set_flash(&session, "Definition deleted"),
        Err(AppError::Conflict(msg)) => set_flash(&session, msg),
        Err(e) => return Err(e),
    }
    Ok(see_other(&Uris::new(&config, Surface::Html).definitions()))
}

/// Start a workflow from a definition with default settings.
pub async fn instantiate(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
    form: web::Form<Params>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, MANAGE_INSTANCES)?;
    csrf::validate_form(&session, &form)?;
    let user_id = require_user_id(&session)?;

    let created = match instance::create(&pool, user_id, &NewInstance::new(path.into_inner())).await {
        // The only validation failure here is an unknown definition
        Err(AppError::Validation(_)) => return Err(AppError::NotFound),
        other => other?,
    };
    set_flash(&session, format!("Started '{}'", created.name));
    Ok(see_other(&Uris::new(&config, Surface::Html).instance(&created.id)))
}
