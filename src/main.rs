mod admin;
mod auth;
mod carousel;
mod config;
mod crop;
mod db;
mod error;
mod handlers;
mod models;
mod oauth;
mod portal;
mod schedule;
mod state;
mod templates;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use config::Config;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use state::AppState;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

const UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

fn cors(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring unusable CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

pub fn app(app_state: AppState) -> Router {
    let admin_pages = Router::new()
        .route("/admin", get(admin::dashboard))
        .route("/admin/settings", post(admin::save_settings))
        .route("/admin/campaigns", post(admin::save_campaign))
        .route("/admin/campaigns/{id}/toggle", post(admin::toggle_campaign))
        .route("/admin/campaigns/{id}/delete", post(admin::delete_campaign))
        .route("/admin/emails", get(admin::emails_page))
        .route(
            "/admin/upload",
            post(admin::upload).layer(DefaultBodyLimit::max(UPLOAD_LIMIT)),
        )
        .route("/admin/logout", post(admin::logout))
        .route_layer(middleware::from_fn(auth::require_admin_page));

    let upload_dir = app_state.config.upload_dir.clone();
    let cors = cors(&app_state.config.cors_origins);

    Router::new()
        .route("/", get(portal::portal_page))
        .route("/portal/connect", post(portal::connect))
        .route("/health", get(handlers::health))
        .nest_service("/img", ServeDir::new(upload_dir))
        .route("/api/ads", get(handlers::get_ads).post(handlers::create_ad))
        .route(
            "/api/ads/{id}",
            put(handlers::update_ad).delete(handlers::delete_ad),
        )
        .route("/api/ads/conflicts", post(handlers::check_conflicts))
        .route("/api/active-ads", get(handlers::get_active_ads))
        .route("/api/active-ad", get(handlers::get_active_ad))
        .route(
            "/api/settings",
            get(handlers::get_settings).post(handlers::update_settings),
        )
        .route(
            "/api/upload",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(UPLOAD_LIMIT)),
        )
        .route(
            "/api/emails",
            get(handlers::get_emails).post(handlers::collect_email),
        )
        .route("/api/emails/export", get(handlers::export_emails))
        .route("/api/auth/login", post(handlers::admin_login))
        .route("/auth/{provider}/login", get(oauth::login))
        .route("/auth/{provider}/callback", get(oauth::callback))
        .route("/admin/login", get(admin::login_page).post(admin::login))
        .merge(admin_pages)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CookieManagerLayer::new())
        .with_state(app_state)
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    if config.uses_default_credentials() {
        tracing::warn!("ADMIN_USERNAME / ADMIN_PASSWORD not set, using the default admin credentials");
    }

    let connect_options = SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;
    db::create_schema(&pool).await?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let addr = format!("0.0.0.0:{}", config.port);
    let app_state = AppState {
        pool,
        config: Arc::new(config),
        tera: Arc::new(templates::load()?),
        http,
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {addr}");
    axum::serve(listener, app(app_state)).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hotspot_portal=info,tower_http=info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = run(config).await {
        tracing::error!("server stopped: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn test_app() -> (Router, sqlx::SqlitePool) {
        test_app_with(Config::default()).await
    }

    async fn test_app_with(config: Config) -> (Router, sqlx::SqlitePool) {
        let pool = db::tests::memory_pool().await;
        let app_state = AppState {
            pool: pool.clone(),
            config: Arc::new(config),
            tera: Arc::new(templates::load().unwrap()),
            http: reqwest::Client::new(),
        };
        (app(app_state), pool)
    }

    const BOUNDARY: &str = "hotspot-test-boundary";

    /// `(field, file name, content)` parts as a multipart/form-data upload.
    fn multipart_upload(parts: &[(&str, Option<&str>, &[u8])]) -> Result<Request<Body>, axum::http::Error> {
        let mut body = Vec::new();
        for (name, file_name, content) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            let disposition = match file_name {
                Some(file_name) => format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n"),
                None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n"),
            };
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        admin(Request::post("/api/upload"))
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
    }

    async fn json_body(response: Response) -> anyhow::Result<Value> {
        Ok(serde_json::from_str(&body_text(response).await)?)
    }

    fn admin(builder: axum::http::request::Builder) -> axum::http::request::Builder {
        builder.header(header::COOKIE, "admin_logged_in=true")
    }

    fn json_request(method: &str, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
    }

    fn form_request(uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    #[tokio::test]
    async fn portal_renders_campaigns_or_the_plain_header() -> anyhow::Result<()> {
        let (app, pool) = test_app().await;

        let response = app.clone().oneshot(Request::get("/").body(Body::empty())?).await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("no-ad-header"));

        let mut always = db::tests::draft("Always On", "", "");
        always.start_time = String::new();
        always.end_time = String::new();
        db::create_campaign(&pool, &always).await?;

        let response = app.oneshot(Request::get("/?ip=10.5.50.1").body(Body::empty())?).await?;
        let html = body_text(response).await;
        assert!(html.contains("Always On"));
        assert!(!html.contains("no-ad-header"));
        assert!(html.contains(r#"name="ip" value="10.5.50.1""#));
        Ok(())
    }

    #[tokio::test]
    async fn mutating_api_needs_the_admin_cookie() -> anyhow::Result<()> {
        let (app, _pool) = test_app().await;
        let payload = json!({ "title": "Spring", "description": "Spring sale" });

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/ads").body(Body::from(payload.to_string()))?)
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(admin(json_request("POST", "/api/ads")).body(Body::from(payload.to_string()))?)
            .await?;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app.oneshot(Request::get("/api/emails").body(Body::empty())?).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn campaigns_are_created_listed_and_deleted() -> anyhow::Result<()> {
        let (app, _pool) = test_app().await;
        let payload = json!({
            "title": "Spring",
            "description": "Spring sale",
            "start_date": "2026-03-01T00:00:00.000Z",
            "end_date": "2026-03-31",
            "start_time": "09:00",
        });

        let response = app
            .clone()
            .oneshot(admin(json_request("POST", "/api/ads")).body(Body::from(payload.to_string()))?)
            .await?;
        let created: Value = serde_json::from_str(&body_text(response).await)?;
        let id = created["campaign"]["id"].as_i64().unwrap();
        assert_eq!(created["campaign"]["start_date"], "2026-03-01");
        assert_eq!(created["campaign"]["start_time"], "09:00:00");

        let response = app.clone().oneshot(Request::get("/api/ads").body(Body::empty())?).await?;
        let listed: Value = serde_json::from_str(&body_text(response).await)?;
        assert_eq!(listed.as_array().map(Vec::len), Some(1));

        let conflict = json!({ "start_date": "2026-03-01", "end_date": "2026-03-31" });
        let response = app
            .clone()
            .oneshot(admin(json_request("POST", "/api/ads/conflicts")).body(Body::from(conflict.to_string()))?)
            .await?;
        let conflicts: Value = serde_json::from_str(&body_text(response).await)?;
        assert_eq!(conflicts["duplicates"], json!(["Spring (2026-03-01 - 2026-03-31)"]));

        let delete = || admin(Request::delete(format!("/api/ads/{id}"))).body(Body::empty());
        let response = app.clone().oneshot(delete()?).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let response = app.oneshot(delete()?).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn admin_pages_redirect_to_login() -> anyhow::Result<()> {
        let (app, _pool) = test_app().await;

        let response = app.clone().oneshot(Request::get("/admin").body(Body::empty())?).await?;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin/login");

        let response = app
            .clone()
            .oneshot(form_request("/admin/login").body(Body::from("username=admin&password=nope"))?)
            .await?;
        assert_eq!(location(&response), "/admin/login?error=1");

        let response = app
            .oneshot(form_request("/admin/login").body(Body::from("username=admin&password=admin"))?)
            .await?;
        assert_eq!(location(&response), "/admin");
        let cookie = response.headers()[header::SET_COOKIE].to_str()?;
        assert!(cookie.starts_with("admin_logged_in=true"));
        Ok(())
    }

    #[tokio::test]
    async fn console_warns_about_a_repeated_window() -> anyhow::Result<()> {
        let (app, pool) = test_app().await;
        db::create_campaign(&pool, &db::tests::draft("Spring", "2026-03-01", "2026-03-31")).await?;

        let form = "ad_title=Spring+bis&ad_desc=Again&start_date=2026-03-01&end_date=2026-03-31";
        let response = app
            .clone()
            .oneshot(admin(form_request("/admin/campaigns")).body(Body::from(form))?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("duplicate-warning"));
        assert!(html.contains("Spring (2026-03-01 - 2026-03-31)"));
        assert_eq!(db::get_all_campaigns(&pool).await?.len(), 1);

        let response = app
            .oneshot(admin(form_request("/admin/campaigns")).body(Body::from(format!("{form}&confirm=true")))?)
            .await?;
        assert_eq!(location(&response), "/admin?notice=created");
        assert_eq!(db::get_all_campaigns(&pool).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn portal_connect_records_email_and_logs_in() -> anyhow::Result<()> {
        let (app, pool) = test_app().await;

        let response = app
            .clone()
            .oneshot(form_request("/portal/connect").body(Body::from("email=guest%40example.com&ip=10.5.50.1"))?)
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let html = body_text(response).await;
        assert!(html.contains("connect-error"));
        assert!(html.contains("Please accept the terms to continue."));
        assert!(html.contains(r#"name="ip" value="10.5.50.1""#));
        assert!(html.contains(r#"value="guest@example.com""#));

        let response = app
            .clone()
            .oneshot(form_request("/portal/connect").body(Body::from("email=guest&terms=on"))?)
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("Please enter a valid email address."));
        assert!(db::get_all_emails(&pool).await?.is_empty());

        let response = app
            .clone()
            .oneshot(form_request("/portal/connect").body(Body::from("email=guest%40example.com&terms=on&ip=10.5.50.1"))?)
            .await?;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(location(&response).starts_with("http://10.5.50.1/login?username=user&password=password&dst="));
        assert_eq!(db::get_all_emails(&pool).await?[0].source, "portal");

        let response = app
            .oneshot(admin(Request::get("/api/emails/export")).body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let csv = body_text(response).await;
        assert!(csv.starts_with("ID,Email Address,Source,Date Collected\n"));
        assert!(csv.contains(r#""guest@example.com","portal""#));
        Ok(())
    }

    #[tokio::test]
    async fn disabled_social_login_is_forbidden() -> anyhow::Result<()> {
        let (app, _pool) = test_app().await;

        let response = app
            .clone()
            .oneshot(Request::get("/auth/google/login").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app.oneshot(Request::get("/auth/myspace/login").body(Body::empty())?).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn campaigns_are_updated_in_place() -> anyhow::Result<()> {
        let (app, pool) = test_app().await;
        let created = db::create_campaign(&pool, &db::tests::draft("Spring", "2026-03-01", "2026-03-31")).await?;
        let put = |id: i64, payload: Value| {
            admin(json_request("PUT", &format!("/api/ads/{id}"))).body(Body::from(payload.to_string()))
        };

        let pause = json!({ "title": "Spring v2", "description": "Sale", "end_date": "2026-04-15", "is_active": false });
        let response = app.clone().oneshot(put(created.id, pause)?).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let updated = json_body(response).await?;
        assert_eq!(updated["campaign"]["title"], "Spring v2");
        assert_eq!(updated["campaign"]["end_date"], "2026-04-15");
        assert_eq!(updated["campaign"]["is_active"], false);

        // no status in the payload: the campaign stays paused
        let rename = json!({ "title": "Spring v3", "description": "Sale" });
        let response = app.clone().oneshot(put(created.id, rename.clone())?).await?;
        let updated = json_body(response).await?;
        assert_eq!(updated["campaign"]["title"], "Spring v3");
        assert_eq!(updated["campaign"]["is_active"], false);

        let response = app.clone().oneshot(put(created.id + 100, rename.clone())?).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(json_request("PUT", &format!("/api/ads/{}", created.id)).body(Body::from(rename.to_string()))?)
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn active_endpoints_apply_the_schedule() -> anyhow::Result<()> {
        let (app, pool) = test_app().await;

        let response = app.clone().oneshot(Request::get("/api/active-ad").body(Body::empty())?).await?;
        assert_eq!(json_body(response).await?, json!({ "ad": null }));

        let mut always = db::tests::draft("Always", "", "");
        always.start_time = String::new();
        always.end_time = String::new();
        db::create_campaign(&pool, &always).await?;
        db::create_campaign(&pool, &db::tests::draft("Expired", "2020-01-01", "2020-01-31")).await?;
        let paused = db::create_campaign(&pool, &always).await?;
        db::set_campaign_active(&pool, paused.id, false).await?;

        let response = app.clone().oneshot(Request::get("/api/active-ads").body(Body::empty())?).await?;
        let active = json_body(response).await?;
        let titles: Vec<&str> = active
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|ad| ad["title"].as_str())
            .collect();
        assert_eq!(titles, vec!["Always"]);

        let response = app.oneshot(Request::get("/api/active-ad").body(Body::empty())?).await?;
        assert_eq!(json_body(response).await?["ad"]["title"], "Always");
        Ok(())
    }

    #[tokio::test]
    async fn settings_keep_blank_fields_and_hide_secrets() -> anyhow::Result<()> {
        let (app, _pool) = test_app().await;
        let update = json!({
            "page_title": "Hello Guests",
            "button_text": "",
            "google_login_enabled": "true",
            "google_client_id": "gid",
            "google_client_secret": "s3cret",
        });

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/settings").body(Body::from(update.to_string()))?)
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .clone()
            .oneshot(admin(json_request("POST", "/api/settings")).body(Body::from(update.to_string()))?)
            .await?;
        assert_eq!(json_body(response).await?, json!({ "success": true }));

        let response = app.clone().oneshot(Request::get("/api/settings").body(Body::empty())?).await?;
        let settings = json_body(response).await?;
        assert_eq!(settings["page_title"], "Hello Guests");
        assert_eq!(settings["button_text"], "Connect to WiFi");
        assert_eq!(settings["google_client_id"], "gid");
        assert!(settings.get("google_client_secret").is_none());
        assert!(settings.get("facebook_app_secret").is_none());
        assert!(!settings.to_string().contains("s3cret"));

        let response = app
            .oneshot(Request::get("/auth/google/login?ip=10.5.50.1").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert!(location(&response).contains("client_id=gid"));
        assert!(location(&response).ends_with("state=ip%3D10.5.50.1"));
        Ok(())
    }

    #[tokio::test]
    async fn uploads_are_stored_and_served() -> anyhow::Result<()> {
        let upload_dir = std::env::temp_dir().join(format!("hotspot-upload-{}", nanoid::nanoid!()));
        let config = Config {
            upload_dir: upload_dir.clone(),
            ..Config::default()
        };
        let (app, _pool) = test_app_with(config).await;

        let response = app
            .clone()
            .oneshot(multipart_upload(&[("file", Some("my bg.png"), b"background bytes".as_slice())])?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let uploaded = json_body(response).await?;
        let url = uploaded["url"].as_str().unwrap().to_string();
        assert!(url.starts_with("/img/upload_"));
        assert!(url.ends_with("_my_bg.png"));
        let stored = upload_dir.join(url.trim_start_matches("/img/"));
        assert_eq!(std::fs::read(&stored)?, b"background bytes");

        let response = app.clone().oneshot(Request::get("/api/settings").body(Body::empty())?).await?;
        assert_eq!(json_body(response).await?["background_image"], format!("url({url})"));

        let response = app.clone().oneshot(Request::get(url.as_str()).body(Body::empty())?).await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "background bytes");

        let response = app
            .clone()
            .oneshot(multipart_upload(&[("is_ad", None, b"true".as_slice())])?)
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let mut png = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image::RgbImage::new(64, 36))
            .write_to(&mut png, image::ImageFormat::Png)?;
        let png = png.into_inner();
        let response = app
            .clone()
            .oneshot(multipart_upload(&[
                ("file", Some("banner.png"), png.as_slice()),
                ("is_ad", None, b"true".as_slice()),
                ("x", None, b"16".as_slice()),
                ("y", None, b"0".as_slice()),
                ("width", None, b"32".as_slice()),
                ("height", None, b"18".as_slice()),
            ])?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let banner = json_body(response).await?["url"].as_str().unwrap().to_string();
        assert!(banner.ends_with("_banner.jpg"));
        let cropped = image::load_from_memory(&std::fs::read(upload_dir.join(banner.trim_start_matches("/img/")))?)?;
        assert_eq!((cropped.width(), cropped.height()), (32, 18));

        // ad uploads leave the background alone
        let response = app.oneshot(Request::get("/api/settings").body(Body::empty())?).await?;
        assert_eq!(json_body(response).await?["background_image"], format!("url({url})"));

        std::fs::remove_dir_all(&upload_dir)?;
        Ok(())
    }
}
