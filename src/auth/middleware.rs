use actix_session::SessionExt;
use actix_web::{
    Error, HttpResponse,
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    http::StatusCode,
    middleware::Next,
};

use crate::handlers::api_cj::{self, API_PREFIX};
use crate::hypermedia::CollectionJson;

/// Middleware function that checks for an authenticated session.
/// Browsers are redirected to /login; API clients get a 401 error document.
pub async fn require_auth(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let session = req.get_session();
    let has_user = session.get::<i64>("user_id").unwrap_or(None).is_some();

    if !has_user {
        let response = if req.path().starts_with(API_PREFIX) {
            let doc = CollectionJson::error(req.path(), "Unauthorized", 401, "Sign in to use this API");
            api_cj::respond(StatusCode::UNAUTHORIZED, &doc)
        } else {
            HttpResponse::SeeOther()
                .insert_header(("Location", "/login"))
                .finish()
        };
        return Ok(req.into_response(response).map_into_right_body());
    }

    next.call(req).await.map(|res| res.map_into_left_body())
}
