//! Google / Facebook sign-in for guests. The provider only vouches for an
//! email address; the guest is then logged in at the hotspot gateway.

use axum::{
    extract::{Path, Query, RawQuery, State},
    response::Redirect,
};
use reqwest::Url;
use serde::Deserialize;

use crate::{db, error::AppError, models::Settings, portal::HotspotParams, state::AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Google,
    Facebook,
}

impl Provider {
    pub fn parse(raw: &str) -> Result<Provider, AppError> {
        match raw {
            "google" => Ok(Provider::Google),
            "facebook" => Ok(Provider::Facebook),
            other => Err(AppError::NotFound(format!("unknown login provider {other:?}"))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Facebook => "facebook",
        }
    }

    fn enabled(self, settings: &Settings) -> bool {
        match self {
            Provider::Google => settings.google_enabled(),
            Provider::Facebook => settings.facebook_enabled(),
        }
    }

    fn client_id(self, settings: &Settings) -> &str {
        match self {
            Provider::Google => &settings.google_client_id,
            Provider::Facebook => &settings.facebook_app_id,
        }
    }

    fn client_secret(self, settings: &Settings) -> &str {
        match self {
            Provider::Google => &settings.google_client_secret,
            Provider::Facebook => &settings.facebook_app_secret,
        }
    }

    /// Consent page the guest is sent to, carrying the gateway query as `state`.
    pub fn authorize_url(self, settings: &Settings, redirect_uri: &str, state: &str) -> Result<String, AppError> {
        let url = match self {
            Provider::Google => Url::parse_with_params(
                "https://accounts.google.com/o/oauth2/v2/auth",
                &[
                    ("client_id", self.client_id(settings)),
                    ("redirect_uri", redirect_uri),
                    ("response_type", "code"),
                    ("scope", "email profile"),
                    ("state", state),
                ],
            ),
            Provider::Facebook => Url::parse_with_params(
                "https://www.facebook.com/v12.0/dialog/oauth",
                &[
                    ("client_id", self.client_id(settings)),
                    ("redirect_uri", redirect_uri),
                    ("state", state),
                    ("scope", "email"),
                ],
            ),
        };
        url.map(String::from)
            .map_err(|e| AppError::Upstream(format!("could not build {} login url: {e}", self.name())))
    }
}

fn redirect_uri(app_state: &AppState, provider: Provider) -> String {
    format!("{}/auth/{}/callback", app_state.config.public_base_url, provider.name())
}

async fn enabled_settings(app_state: &AppState, provider: Provider) -> Result<Settings, AppError> {
    let settings = db::get_settings(&app_state.pool).await?;
    if provider.enabled(&settings) {
        Ok(settings)
    } else {
        Err(AppError::Forbidden(format!(
            "{} login is disabled or misconfigured",
            provider.name()
        )))
    }
}

pub async fn login(
    State(app_state): State<AppState>,
    Path(provider): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Redirect, AppError> {
    let provider = Provider::parse(&provider)?;
    let settings = enabled_settings(&app_state, provider).await?;
    let url = provider.authorize_url(
        &settings,
        &redirect_uri(&app_state, provider),
        query.as_deref().unwrap_or_default(),
    )?;
    tracing::debug!(provider = provider.name(), "sending guest to consent page");
    Ok(Redirect::temporary(&url))
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfo {
    email: Option<String>,
}

async fn fetch_email(
    app_state: &AppState,
    provider: Provider,
    settings: &Settings,
    code: &str,
) -> Result<String, AppError> {
    let redirect_uri = redirect_uri(app_state, provider);
    let client = &app_state.http;

    let info: UserInfo = match provider {
        Provider::Google => {
            let token: TokenResponse = client
                .post("https://oauth2.googleapis.com/token")
                .form(&[
                    ("client_id", provider.client_id(settings)),
                    ("client_secret", provider.client_secret(settings)),
                    ("code", code),
                    ("grant_type", "authorization_code"),
                    ("redirect_uri", redirect_uri.as_str()),
                ])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            client
                .get("https://www.googleapis.com/oauth2/v2/userinfo")
                .bearer_auth(&token.access_token)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?
        }
        Provider::Facebook => {
            let token: TokenResponse = client
                .get("https://graph.facebook.com/v12.0/oauth/access_token")
                .query(&[
                    ("client_id", provider.client_id(settings)),
                    ("redirect_uri", redirect_uri.as_str()),
                    ("client_secret", provider.client_secret(settings)),
                    ("code", code),
                ])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            client
                .get("https://graph.facebook.com/me")
                .query(&[("fields", "email"), ("access_token", token.access_token.as_str())])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?
        }
    };

    info.email
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| AppError::Upstream(format!("{} did not share an email address", provider.name())))
}

pub async fn callback(
    State(app_state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect, AppError> {
    let provider = Provider::parse(&provider)?;
    let code = query
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::BadRequest("code missing".to_string()))?;
    let settings = enabled_settings(&app_state, provider).await?;

    let email = fetch_email(&app_state, provider, &settings, &code).await?;
    if let Err(e) = db::record_email(&app_state.pool, &email, provider.name()).await {
        tracing::warn!("could not record {} email: {e}", provider.name());
    }
    tracing::info!(provider = provider.name(), "guest signed in");

    let hotspot = HotspotParams::from_query(query.state.as_deref().unwrap_or_default());
    let url = hotspot.login_url(&email, "password", &app_state.config.hotspot_destination)?;
    Ok(Redirect::temporary(&url))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            google_login_enabled: "true".to_string(),
            google_client_id: "gid".to_string(),
            facebook_login_enabled: "true".to_string(),
            facebook_app_id: "fid".to_string(),
            ..Settings::default()
        }
    }

    #[test]
    fn unknown_provider_is_not_found() {
        assert!(matches!(Provider::parse("myspace"), Err(AppError::NotFound(_))));
        assert_eq!(Provider::parse("google").unwrap(), Provider::Google);
    }

    #[test]
    fn google_authorize_url_carries_state() {
        let url = Provider::Google
            .authorize_url(&settings(), "https://portal.test/auth/google/callback", "ip=10.0.0.1&mac=AA")
            .unwrap();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?client_id=gid&"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fportal.test%2Fauth%2Fgoogle%2Fcallback"));
        assert!(url.contains("scope=email+profile"));
        assert!(url.ends_with("state=ip%3D10.0.0.1%26mac%3DAA"));
    }

    #[test]
    fn facebook_authorize_url_uses_app_id() {
        let url = Provider::Facebook
            .authorize_url(&settings(), "https://portal.test/auth/facebook/callback", "")
            .unwrap();
        assert!(url.starts_with("https://www.facebook.com/v12.0/dialog/oauth?client_id=fid&"));
        assert!(url.ends_with("scope=email"));
    }
}
