//! Server-rendered operator console: portal settings, campaign scheduling
//! and the collected email list.

use axum::{
    Form,
    extract::{Multipart, Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use crate::{
    auth, db,
    error::AppError,
    handlers::{self, validated},
    models::{Campaign, CampaignDraft, Settings, SettingsUpdate},
    portal, schedule,
    state::AppState,
};

/// `2026-01-05T00:00:00Z` -> `05/01/2026`, empty -> `Anytime`.
pub fn display_date(raw: &str) -> String {
    if raw.trim().is_empty() {
        return "Anytime".to_string();
    }
    match schedule::parse_date(raw) {
        Ok(date) => date.format("%d/%m/%Y").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// `08:15:00` -> `08:15`, empty -> `00:00`.
pub fn display_time(raw: &str, empty: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return empty.to_string();
    }
    let clock = trimmed.split_once('T').map(|(_, t)| t).unwrap_or(trimmed);
    clock.chars().take(5).collect()
}

#[derive(Serialize)]
struct CampaignRow<'a> {
    campaign: &'a Campaign,
    dates: String,
    times: String,
    showing_now: bool,
}

/// Values of the campaign form, either blank, loaded for editing, or echoed
/// back after a duplicate-window warning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CampaignForm {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub ad_title: String,
    #[serde(default)]
    pub ad_desc: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub start_hour: String,
    #[serde(default)]
    pub start_min: String,
    #[serde(default)]
    pub end_hour: String,
    #[serde(default)]
    pub end_min: String,
    #[serde(default, skip_serializing)]
    pub confirm: String,
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    let value = value.trim();
    if value.is_empty() { default } else { value }
}

impl CampaignForm {
    fn from_campaign(campaign: &Campaign) -> CampaignForm {
        let clock = |raw: &str| -> (String, String) {
            let hm = display_time(raw, "");
            match hm.split_once(':') {
                Some((h, m)) => (h.to_string(), m.to_string()),
                None => (String::new(), String::new()),
            }
        };
        let (start_hour, start_min) = clock(&campaign.start_time);
        let (end_hour, end_min) = clock(&campaign.end_time);
        CampaignForm {
            id: campaign.id.to_string(),
            ad_title: campaign.title.clone(),
            ad_desc: campaign.description.clone(),
            image: campaign.image.clone(),
            start_date: schedule::date_part(&campaign.start_date).to_string(),
            end_date: schedule::date_part(&campaign.end_date).to_string(),
            start_hour,
            start_min,
            end_hour,
            end_min,
            confirm: String::new(),
        }
    }

    fn editing_id(&self) -> Result<Option<i64>, AppError> {
        let raw = self.id.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("bad campaign id {raw:?}")))
    }

    /// The window defaults to the whole day: `00:00:00` to `23:59:59`.
    fn draft(&self) -> CampaignDraft {
        CampaignDraft {
            title: self.ad_title.clone(),
            description: self.ad_desc.clone(),
            image: self.image.clone(),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            start_time: format!(
                "{}:{}:00",
                or_default(&self.start_hour, "00"),
                or_default(&self.start_min, "00")
            ),
            end_time: format!(
                "{}:{}:59",
                or_default(&self.end_hour, "23"),
                or_default(&self.end_min, "59")
            ),
            is_active: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    edit: Option<i64>,
    notice: Option<String>,
    uploaded: Option<String>,
}

fn notice_text(code: &str) -> Option<&'static str> {
    match code {
        "settings" => Some("Portal settings saved."),
        "created" => Some("Campaign created."),
        "updated" => Some("Campaign updated."),
        "deleted" => Some("Campaign deleted."),
        "toggled" => Some("Campaign status changed."),
        "uploaded" => Some("Image uploaded."),
        "background" => Some("Background image updated."),
        _ => None,
    }
}

async fn render_dashboard(
    app_state: &AppState,
    form: &CampaignForm,
    duplicates: &[String],
    notice: Option<&str>,
) -> Result<Html<String>, AppError> {
    let settings = db::get_settings(&app_state.pool).await.unwrap_or_else(|e| {
        tracing::warn!("console falling back to default settings: {e}");
        Settings::default()
    });
    let campaigns = db::get_all_campaigns(&app_state.pool).await?;
    let now = portal::portal_now(&app_state.config);

    let rows: Vec<CampaignRow> = campaigns
        .iter()
        .map(|campaign| CampaignRow {
            campaign,
            dates: format!(
                "{} - {}",
                display_date(&campaign.start_date),
                display_date(&campaign.end_date)
            ),
            times: format!(
                "{} - {}",
                display_time(&campaign.start_time, "00:00"),
                display_time(&campaign.end_time, "23:59")
            ),
            showing_now: schedule::is_eligible(campaign, now),
        })
        .collect();
    let live = rows.iter().filter(|row| row.showing_now).count();

    let hours: Vec<String> = (0..24).map(|h| format!("{h:02}")).collect();
    let minutes: Vec<String> = (0..60).map(|m| format!("{m:02}")).collect();

    let mut context = tera::Context::new();
    context.insert("settings", &settings);
    context.insert("google_client_secret", &settings.google_client_secret);
    context.insert("facebook_app_secret", &settings.facebook_app_secret);
    context.insert("background_url", &settings.background_url());
    context.insert("campaigns", &rows);
    context.insert("live", &live);
    context.insert("form", form);
    context.insert("editing", &!form.id.trim().is_empty());
    context.insert("duplicates", duplicates);
    context.insert("notice", &notice);
    context.insert("hours", &hours);
    context.insert("minutes", &minutes);
    context.insert("clock", &now.format("%H:%M").to_string());

    Ok(Html(app_state.tera.render("admin.html", &context)?))
}

pub async fn dashboard(
    State(app_state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Html<String>, AppError> {
    let mut form = match query.edit {
        Some(id) => db::find_campaign(&app_state.pool, id)
            .await?
            .map(|campaign| CampaignForm::from_campaign(&campaign))
            .ok_or_else(|| AppError::NotFound(format!("no campaign with id {id}")))?,
        None => CampaignForm::default(),
    };
    if let Some(url) = query.uploaded.filter(|url| url.starts_with("/img/")) {
        form.image = url;
    }
    let notice = query.notice.as_deref().and_then(notice_text);
    render_dashboard(&app_state, &form, &[], notice).await
}

/// Creates or updates a campaign. A new campaign whose dates exactly repeat
/// an existing one is held back with a warning until the operator confirms.
pub async fn save_campaign(
    State(app_state): State<AppState>,
    Form(form): Form<CampaignForm>,
) -> Result<Response, AppError> {
    let editing = form.editing_id()?;

    let existing = match editing {
        Some(id) => Some(
            db::find_campaign(&app_state.pool, id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("no campaign with id {id}")))?,
        ),
        None => None,
    };
    let draft = form.draft();

    if existing.is_none() && form.confirm != "true" {
        let campaigns = db::get_all_campaigns(&app_state.pool).await?;
        let duplicates = schedule::find_duplicates(&campaigns, &draft.start_date, &draft.end_date, editing);
        if !duplicates.is_empty() {
            tracing::info!(count = duplicates.len(), "duplicate campaign window, asking for confirmation");
            return Ok(render_dashboard(&app_state, &form, &duplicates, None)
                .await?
                .into_response());
        }
    }

    let draft = validated(draft)?;
    let notice = match editing {
        Some(id) => {
            db::update_campaign(&app_state.pool, id, &draft).await?;
            tracing::info!(campaign_id = id, "campaign updated from console");
            "updated"
        }
        None => {
            let campaign = db::create_campaign(&app_state.pool, &draft).await?;
            tracing::info!(campaign_id = campaign.id, "campaign created from console");
            "created"
        }
    };
    Ok(Redirect::to(&format!("/admin?notice={notice}")).into_response())
}

pub async fn toggle_campaign(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    let campaign = db::find_campaign(&app_state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no campaign with id {id}")))?;
    db::set_campaign_active(&app_state.pool, id, !campaign.is_active).await?;
    tracing::info!(campaign_id = id, is_active = !campaign.is_active, "campaign toggled");
    Ok(Redirect::to("/admin?notice=toggled"))
}

pub async fn delete_campaign(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Redirect, AppError> {
    if !db::delete_campaign(&app_state.pool, id).await? {
        return Err(AppError::NotFound(format!("no campaign with id {id}")));
    }
    tracing::info!(campaign_id = id, "campaign deleted from console");
    Ok(Redirect::to("/admin?notice=deleted"))
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsForm {
    page_title: Option<String>,
    button_text: Option<String>,
    background_color: Option<String>,
    google_login_enabled: Option<String>,
    facebook_login_enabled: Option<String>,
    google_client_id: Option<String>,
    google_client_secret: Option<String>,
    facebook_app_id: Option<String>,
    facebook_app_secret: Option<String>,
}

fn checkbox(value: &Option<String>) -> Option<String> {
    Some(if value.is_some() { "true" } else { "false" }.to_string())
}

impl SettingsForm {
    fn update(self) -> SettingsUpdate {
        SettingsUpdate {
            google_login_enabled: checkbox(&self.google_login_enabled),
            facebook_login_enabled: checkbox(&self.facebook_login_enabled),
            page_title: self.page_title,
            button_text: self.button_text,
            background_color: self.background_color,
            google_client_id: self.google_client_id,
            google_client_secret: self.google_client_secret,
            facebook_app_id: self.facebook_app_id,
            facebook_app_secret: self.facebook_app_secret,
        }
    }
}

pub async fn save_settings(
    State(app_state): State<AppState>,
    Form(form): Form<SettingsForm>,
) -> Result<Redirect, AppError> {
    let update = form.update();
    db::put_settings(&app_state.pool, &update.entries()).await?;
    tracing::info!("portal settings saved from console");
    Ok(Redirect::to("/admin?notice=settings"))
}

pub async fn upload(
    State(app_state): State<AppState>,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    let upload = handlers::read_upload(multipart).await?;
    let url = handlers::store_upload(&app_state, &upload.file_name, &upload.bytes, upload.is_ad).await?;
    if upload.is_ad {
        Ok(Redirect::to(&format!("/admin?notice=uploaded&uploaded={url}")))
    } else {
        Ok(Redirect::to("/admin?notice=background"))
    }
}

pub async fn emails_page(State(app_state): State<AppState>) -> Result<Html<String>, AppError> {
    let emails = db::get_all_emails(&app_state.pool).await?;
    let mut context = tera::Context::new();
    context.insert("emails", &emails);
    Ok(Html(app_state.tera.render("emails.html", &context)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    error: Option<String>,
}

pub async fn login_page(
    State(app_state): State<AppState>,
    cookies: Cookies,
    Query(query): Query<LoginQuery>,
) -> Result<Response, AppError> {
    if auth::is_logged_in(&cookies) {
        return Ok(Redirect::to("/admin").into_response());
    }
    let mut context = tera::Context::new();
    context.insert("error", &query.error.is_some());
    Ok(Html(app_state.tera.render("admin_login.html", &context)?).into_response())
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

pub async fn login(
    State(app_state): State<AppState>,
    cookies: Cookies,
    Form(form): Form<LoginForm>,
) -> Redirect {
    if auth::credentials_match(&app_state.config, &form.username, &form.password) {
        tracing::info!(user = %form.username.trim(), "admin login");
        auth::start_session(&cookies);
        Redirect::to("/admin")
    } else {
        tracing::warn!(user = %form.username.trim(), "admin login rejected");
        Redirect::to("/admin/login?error=1")
    }
}

pub async fn logout(cookies: Cookies) -> Redirect {
    auth::end_session(&cookies);
    Redirect::to("/admin/login")
}
