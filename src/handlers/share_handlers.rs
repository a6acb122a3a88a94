use actix_web::{HttpResponse, web};

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::{AppError, render};
use crate::handlers::collections::{Documents, Surface};
use crate::models::instance;
use crate::schemas::SchemaRegistry;
use crate::templates_structs::{CollectionPage, PageContext};

/// Read-only view of a shared workflow. No sign-in required.
pub async fn view(
    pool: web::Data<DbPool>,
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let token = path.into_inner();
    let wf = instance::find_by_share_token(&pool, &token)
        .await?
        .ok_or(AppError::NotFound)?;

    let docs = Documents::new(&registry, &config, Surface::Html);
    let pages = docs.shared(&token, &wf)?;
    render(CollectionPage::new(PageContext::anonymous(&config), pages))
}
