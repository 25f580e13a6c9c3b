//! The captive-portal splash page the hotspot gateway redirects guests to.

use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use chrono::{Local, NaiveDateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::{
    carousel::{Carousel, ROTATE_INTERVAL},
    config::Config,
    db,
    error::AppError,
    handlers::validate_email,
    models::Settings,
    schedule,
    state::AppState,
};

const DEFAULT_GATEWAY: &str = "192.168.1.1";

/// "Now" as the portal sees it: the configured fixed offset, or server local time.
pub fn portal_now(config: &Config) -> NaiveDateTime {
    match config.utc_offset {
        Some(offset) => Utc::now().with_timezone(&offset).naive_local(),
        None => Local::now().naive_local(),
    }
}

/// Parameters the hotspot gateway appends when it sends a guest to the portal.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HotspotParams {
    pub ip: Option<String>,
    #[serde(rename = "link-login-only")]
    pub link_login_only: Option<String>,
    #[serde(rename = "link-orig")]
    pub link_orig: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl HotspotParams {
    /// Parses the raw query string the gateway sent, ignoring anything unexpected.
    pub fn from_query(raw: &str) -> HotspotParams {
        let mut params = HotspotParams::default();
        let Ok(url) = Url::parse(&format!("http://gateway/?{raw}")) else {
            return params;
        };
        for (key, value) in url.query_pairs() {
            let value = Some(value.into_owned());
            match key.as_ref() {
                "ip" => params.ip = value,
                "link-login-only" => params.link_login_only = value,
                "link-orig" => params.link_orig = value,
                "username" => params.username = value,
                "password" => params.password = value,
                _ => {}
            }
        }
        params
    }

    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("ip", &self.ip),
            ("link-login-only", &self.link_login_only),
            ("link-orig", &self.link_orig),
            ("username", &self.username),
            ("password", &self.password),
        ]
        .into_iter()
        .filter_map(|(key, value)| non_empty(value).map(|v| (key, v)))
        .collect()
    }

    /// The gateway's login URL with credentials and destination filled in.
    pub fn login_url(&self, username: &str, password: &str, default_dst: &str) -> Result<String, AppError> {
        let gateway = non_empty(&self.ip).unwrap_or(DEFAULT_GATEWAY);
        let mut url = match non_empty(&self.link_login_only).map(Url::parse) {
            Some(Ok(url)) => url,
            _ => Url::parse(&format!("http://{gateway}/login"))
                .map_err(|e| AppError::BadRequest(format!("bad gateway address {gateway:?}: {e}")))?,
        };
        let dst = non_empty(&self.link_orig).unwrap_or(default_dst);
        url.query_pairs_mut()
            .append_pair("username", username)
            .append_pair("password", password)
            .append_pair("dst", dst);
        Ok(url.to_string())
    }
}

/// Query string that keeps the gateway parameters and optionally selects a carousel slot.
fn portal_query(params: &HotspotParams, ad: Option<usize>) -> String {
    let ad = ad.map(|k| k.to_string());
    let mut pairs = params.pairs();
    if let Some(ad) = ad.as_deref() {
        pairs.push(("ad", ad));
    }
    Url::parse_with_params("http://portal/", &pairs)
        .ok()
        .and_then(|url| url.query().map(str::to_string))
        .unwrap_or_default()
}

#[derive(Debug, Default, Deserialize)]
pub struct PortalQuery {
    #[serde(flatten)]
    hotspot: HotspotParams,
    ad: Option<String>,
}

#[derive(Serialize)]
struct HiddenField<'a> {
    name: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
struct Slide {
    index: usize,
    link: String,
    current: bool,
}

pub async fn portal_page(
    State(app_state): State<AppState>,
    Query(query): Query<PortalQuery>,
) -> Result<Html<String>, AppError> {
    let ad = query.ad.as_deref().and_then(|raw| raw.trim().parse().ok());
    render_portal(&app_state, &query.hotspot, ad, None, "").await
}

/// Renders the splash page. `error` and `email` echo a rejected connect form.
async fn render_portal(
    app_state: &AppState,
    hotspot: &HotspotParams,
    ad: Option<usize>,
    error: Option<&str>,
    email: &str,
) -> Result<Html<String>, AppError> {
    let settings = db::get_settings(&app_state.pool).await.unwrap_or_else(|e| {
        tracing::warn!("portal falling back to default settings: {e}");
        Settings::default()
    });
    let campaigns = db::get_all_campaigns(&app_state.pool).await.unwrap_or_else(|e| {
        tracing::warn!("portal could not load campaigns, showing none: {e}");
        Vec::new()
    });

    let now = portal_now(&app_state.config);
    let mut carousel = Carousel::new(schedule::select_active(&campaigns, now));
    if let Some(k) = ad {
        carousel.jump(k);
    }

    let link = |ad: usize| format!("/?{}", portal_query(hotspot, Some(ad)));
    let slides: Vec<Slide> = (0..carousel.len())
        .map(|index| Slide {
            index,
            link: link(index),
            current: index == carousel.index(),
        })
        .collect();
    let passthrough = portal_query(hotspot, None);

    let mut context = tera::Context::new();
    context.insert("settings", &settings);
    context.insert("background_url", &settings.background_url());
    context.insert("ad", &carousel.current());
    context.insert("multiple", &(carousel.len() > 1));
    context.insert("slides", &slides);
    context.insert("prev_link", &link(carousel.peek(Carousel::prev)));
    context.insert("next_link", &link(carousel.peek(Carousel::next)));
    context.insert("tick_link", &link(carousel.peek(Carousel::tick)));
    context.insert("rotate_seconds", &ROTATE_INTERVAL.as_secs());
    let hidden: Vec<HiddenField> = hotspot
        .pairs()
        .into_iter()
        .map(|(name, value)| HiddenField { name, value })
        .collect();
    context.insert("hotspot", &hidden);
    context.insert("google_enabled", &settings.google_enabled());
    context.insert("facebook_enabled", &settings.facebook_enabled());
    context.insert("auth_query", &passthrough);
    context.insert("error", &error);
    context.insert("email", email);

    Ok(Html(app_state.tera.render("portal.html", &context)?))
}

#[derive(Debug, Deserialize)]
pub struct ConnectForm {
    #[serde(default)]
    email: String,
    terms: Option<String>,
    #[serde(flatten)]
    hotspot: HotspotParams,
}

/// Records the guest's email and hands them to the gateway for login. A
/// rejected form comes back as the splash page with the reason shown.
pub async fn connect(
    State(app_state): State<AppState>,
    Form(form): Form<ConnectForm>,
) -> Result<Response, AppError> {
    let problem = match validate_email(&form.email) {
        Err(_) => Some("Please enter a valid email address."),
        Ok(_) if form.terms.is_none() => Some("Please accept the terms to continue."),
        Ok(_) => None,
    };
    if let Some(problem) = problem {
        tracing::debug!(problem, "portal connect form rejected");
        let page = render_portal(&app_state, &form.hotspot, None, Some(problem), form.email.trim()).await?;
        return Ok((StatusCode::BAD_REQUEST, page).into_response());
    }
    let email = form.email.trim();

    // A lost email must not keep the guest offline.
    if let Err(e) = db::record_email(&app_state.pool, email, "portal").await {
        tracing::warn!("could not record portal email: {e}");
    }

    let username = non_empty(&form.hotspot.username).unwrap_or("user");
    let password = non_empty(&form.hotspot.password).unwrap_or("password");
    let url = form
        .hotspot
        .login_url(username, password, &app_state.config.hotspot_destination)?;
    Ok(Redirect::to(&url).into_response())
}
