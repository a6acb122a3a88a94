use actix_session::Session;
use actix_web::{HttpResponse, web};

use crate::config::AppConfig;
use crate::errors::{AppError, render};
use crate::handlers::collections::{Documents, Surface};
use crate::schemas::SchemaRegistry;
use crate::templates_structs::{CollectionPage, PageContext};

pub async fn index(
    registry: web::Data<SchemaRegistry>,
    config: web::Data<AppConfig>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    let ctx = PageContext::build(&session, &config, "home")?;
    let docs = Documents::new(&registry, &config, Surface::Html);
    render(CollectionPage::new(ctx, vec![docs.home()]))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}
