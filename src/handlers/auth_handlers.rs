use actix_session::Session;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::Deserialize;

use crate::auth::session::{get_user_id, sign_in};
use crate::auth::{csrf, password, rate_limit::RateLimiter};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::{AppError, render};
use crate::handlers::see_other;
use crate::models::user;
use crate::templates_structs::LoginTemplate;

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub csrf_token: String,
}

#[derive(Deserialize)]
pub struct CsrfOnly {
    pub csrf_token: String,
}

fn login_form(session: &Session, config: &AppConfig, error: Option<&str>) -> Result<HttpResponse, AppError> {
    let tmpl = LoginTemplate {
        error: error.map(String::from),
        app_name: config.app_name.clone(),
        csrf_token: csrf::get_or_create_token(session),
    };
    render(tmpl)
}

pub async fn login_page(
    config: web::Data<AppConfig>,
    session: Session,
) -> Result<HttpResponse, AppError> {
    // If already logged in, redirect home
    if get_user_id(&session).is_some() {
        return Ok(see_other("/"));
    }
    login_form(&session, &config, None)
}

pub async fn login_submit(
    req: HttpRequest,
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    session: Session,
    form: web::Form<LoginForm>,
    limiter: web::Data<RateLimiter>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;

    // Rate-limit check BEFORE any database access
    let ip = req
        .peer_addr()
        .map(|addr| addr.ip())
        .unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED));

    if limiter.is_blocked(ip) {
        log::warn!("Login blocked for {ip}: too many failed attempts");
        return login_form(
            &session,
            &config,
            Some("Too many failed login attempts. Please try again later."),
        );
    }

    let found = user::find_by_username(&pool, form.username.trim()).await?;
    let verified = match &found {
        Some(u) => password::verify_password(&form.password, &u.password)?,
        None => false,
    };

    match found {
        Some(u) if verified => {
            limiter.clear(ip);
            sign_in(&session, &u)?;
            log::info!("User '{}' signed in", u.username);
            Ok(see_other("/"))
        }
        _ => {
            limiter.record_failure(ip);
            login_form(&session, &config, Some("Invalid username or password"))
        }
    }
}

pub async fn logout(
    session: Session,
    form: web::Form<CsrfOnly>,
) -> Result<HttpResponse, AppError> {
    csrf::validate_csrf(&session, &form.csrf_token)?;
    session.purge();
    Ok(see_other("/login"))
}
