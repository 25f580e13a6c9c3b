//! Admin session gate.
//!
//! The session is a plain `admin_logged_in` cookie: anyone who can set the
//! cookie is an admin. It keeps casual visitors out of the console and no more.

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_cookies::{Cookie, Cookies, cookie::time::Duration};

use crate::config::Config;
use crate::error::AppError;

pub const ADMIN_COOKIE: &str = "admin_logged_in";

pub fn credentials_match(config: &Config, username: &str, password: &str) -> bool {
    username.trim() == config.admin_username && password.trim() == config.admin_password
}

pub fn is_logged_in(cookies: &Cookies) -> bool {
    cookies.get(ADMIN_COOKIE).is_some()
}

pub fn start_session(cookies: &Cookies) {
    let mut cookie = Cookie::new(ADMIN_COOKIE, "true");
    cookie.set_path("/");
    cookie.set_max_age(Duration::hours(24));
    cookies.add(cookie);
}

pub fn end_session(cookies: &Cookies) {
    let mut cookie = Cookie::from(ADMIN_COOKIE);
    cookie.set_path("/");
    cookies.remove(cookie);
}

/// Extractor for API handlers that change state. Rejects with 401.
pub struct AdminSession;

impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::Unauthorized)?;
        if is_logged_in(&cookies) {
            Ok(AdminSession)
        } else {
            Err(AppError::Unauthorized)
        }
    }
}

/// Sends visitors without a session to the admin login page.
pub async fn require_admin_page(cookies: Cookies, request: Request, next: Next) -> Response {
    if is_logged_in(&cookies) {
        next.run(request).await
    } else {
        tracing::debug!(path = %request.uri().path(), "no admin session, redirecting to login");
        Redirect::to("/admin/login").into_response()
    }
}
