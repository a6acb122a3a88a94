use std::collections::HashMap;

use actix_session::Session;
use actix_web::{HttpResponse, web};

use crate::auth::csrf;
use crate::auth::session::{MANAGE_INSTANCES, require_permission, require_user_id, set_flash};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::{AppError, render};
use crate::handlers::collections::{Documents, Surface, Uris};
use crate::handlers::{abilities, see_other};
use crate::models::task::{self, TaskInstance};
use crate::schemas::SchemaRegistry;
use crate::templates_structs::{CollectionPage, PageContext};

type Params = HashMap<String, String>;

pub async fn read(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, MANAGE_INSTANCES)?;
    let user_id = require_user_id(&session)?;
    let found = task::find_owned(&pool, &path, user_id).await?.ok_or(AppError::NotFound)?;

    let docs = Documents::new(&registry, &config, Surface::Html);
    let doc = docs.task_single(&found, abilities(&session))?;
    let ctx = PageContext::build(&session, &config, "instances")?;
    render(CollectionPage::new(ctx, vec![doc]))
}

/// Redirect back to the task's workflow; a conflict becomes a flash message.
async fn back_to_workflow(
    pool: &DbPool,
    config: &AppConfig,
    session: &Session,
    task_id: &str,
    user_id: i64,
    outcome: Result<TaskInstance, AppError>,
) -> Result<HttpResponse, AppError> {
    let instance_id = match outcome {
        Ok(t) => t.workflow_instance_id,
        Err(AppError::Conflict(msg)) => {
            set_flash(session, msg);
            task::find_owned(pool, task_id, user_id)
                .await?
                .ok_or(AppError::NotFound)?
                .workflow_instance_id
        }
        Err(e) => return Err(e),
    };
    Ok(see_other(&Uris::new(config, Surface::Html).instance(&instance_id)))
}

pub async fn complete(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
    form: web::Form<Params>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, MANAGE_INSTANCES)?;
    csrf::validate_form(&session, &form)?;
    let user_id = require_user_id(&session)?;

    let outcome = task::complete(&pool, &path, user_id).await;
    back_to_workflow(&pool, &config, &session, &path, user_id, outcome).await
}

pub async fn reopen(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    session: Session,
    path: web::Path<String>,
    form: web::Form<Params>,
) -> Result<HttpResponse, AppError> {
    require_permission(&session, MANAGE_INSTANCES)?;
    csrf::validate_form(&session, &form)?;
    let user_id = require_user_id(&session)?;

    let outcome = task::reopen(&pool, &path, user_id).await;
    back_to_workflow(&pool, &config, &session, &path, user_id, outcome).await
}
