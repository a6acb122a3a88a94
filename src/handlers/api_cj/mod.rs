//! Collection+JSON API under `/api/cj`. Same resources and documents as the
//! HTML pages, with PUT/DELETE for writes and JSON error documents.

pub mod definitions;
pub mod instances;
pub mod share;
pub mod tasks;

use std::fmt;

use actix_web::{
    Error, HttpResponse, ResponseError,
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    http::StatusCode,
    middleware::Next,
    web,
};
use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::hypermedia::{CollectionDocument, CollectionJson, MEDIA_TYPE, TemplateWrite};

pub const API_PREFIX: &str = "/api/cj";

/// Serialize a Collection+JSON body with its media type.
pub fn respond(status: StatusCode, doc: &CollectionJson) -> HttpResponse {
    match serde_json::to_string(doc) {
        Ok(body) => HttpResponse::build(status).content_type(MEDIA_TYPE).body(body),
        Err(e) => {
            log::error!("Failed to serialize Collection+JSON document: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

pub fn document(status: StatusCode, doc: &CollectionDocument) -> HttpResponse {
    respond(status, &CollectionJson::from(doc))
}

/// 201 with a Location header pointing at the new resource.
pub fn created(doc: &CollectionDocument) -> HttpResponse {
    let mut response = document(StatusCode::CREATED, doc);
    if let Some(item) = doc.items.first() {
        if let Ok(location) = actix_web::http::header::HeaderValue::from_str(&item.href) {
            response
                .headers_mut()
                .insert(actix_web::http::header::LOCATION, location);
        }
    }
    response
}

/// Parse a `{"template": {"data": [...]}}` body into a flat payload.
pub fn template_payload(body: &[u8]) -> Result<Map<String, Value>, AppError> {
    let write: TemplateWrite = serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(vec![format!("Body is not a Collection+JSON template: {e}")]))?;
    Ok(write.into_payload())
}

/// An application error answered with a Collection+JSON error document.
#[derive(Debug)]
pub struct CjError {
    href: String,
    source: AppError,
}

impl CjError {
    pub fn new(href: impl Into<String>, source: AppError) -> Self {
        Self {
            href: href.into(),
            source,
        }
    }
}

impl fmt::Display for CjError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.source.fmt(f)
    }
}

impl ResponseError for CjError {
    fn status_code(&self) -> StatusCode {
        self.source.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() {
            log::error!("{}", self.source);
            "Internal Server Error".to_string()
        } else {
            self.source.to_string()
        };
        let title = status.canonical_reason().unwrap_or("Error");
        respond(status, &CollectionJson::error(&self.href, title, status.as_u16(), message))
    }
}

/// Attach the request href to application errors.
pub trait AtHref<T> {
    fn at(self, href: &str) -> Result<T, CjError>;
}

impl<T, E: Into<AppError>> AtHref<T> for Result<T, E> {
    fn at(self, href: &str) -> Result<T, CjError> {
        self.map_err(|e| CjError::new(href, e.into()))
    }
}

/// CSRF protection for API mutation endpoints.
///
/// Rejects POST/PUT/DELETE requests without a JSON content type. Browsers
/// cannot send cross-origin JSON with cookies via a simple form POST, so the
/// Content-Type check guards without tokens. GET requests are exempt.
pub async fn require_json_content_type(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let method = req.method().clone();

    if method == actix_web::http::Method::POST
        || method == actix_web::http::Method::PUT
        || method == actix_web::http::Method::DELETE
    {
        let content_type = req
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if !content_type.starts_with("application/json") && !content_type.starts_with(MEDIA_TYPE) {
            let doc = CollectionJson::error(
                req.path(),
                "Unsupported Media Type",
                415,
                format!("Content-Type must be application/json or {MEDIA_TYPE} for mutation requests"),
            );
            let response = respond(StatusCode::UNSUPPORTED_MEDIA_TYPE, &doc);
            return Ok(req.into_response(response).map_into_right_body());
        }
    }

    next.call(req).await.map(|res| res.map_into_left_body())
}

/// Configure routes below `/api/cj`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(definitions::home))
        .route("/workflow-definitions", web::get().to(definitions::list))
        .route("/workflow-definitions", web::post().to(definitions::create))
        .route("/workflow-definitions/{id}", web::get().to(definitions::read))
        .route("/workflow-definitions/{id}", web::put().to(definitions::update))
        .route("/workflow-definitions/{id}", web::delete().to(definitions::delete))
        .route("/workflow-definitions/{id}/instances", web::post().to(definitions::instantiate))
        .route("/workflow-instances", web::get().to(instances::list))
        .route("/workflow-instances", web::post().to(instances::create))
        .route("/workflow-instances/{id}", web::get().to(instances::read))
        .route("/workflow-instances/{id}", web::put().to(instances::update))
        .route("/workflow-instances/{id}/tasks", web::get().to(instances::tasks))
        .route("/workflow-instances/{id}/archive", web::post().to(instances::archive))
        .route("/workflow-instances/{id}/unarchive", web::post().to(instances::unarchive))
        .route("/workflow-instances/{id}/share", web::post().to(instances::share))
        .route("/task-instances/{id}", web::get().to(tasks::read))
        .route("/task-instances/{id}", web::put().to(tasks::update))
        .route("/task-instances/{id}/complete", web::post().to(tasks::complete))
        .route("/task-instances/{id}/reopen", web::post().to(tasks::reopen));
}
