use crate::{
    auth::{self, AdminSession},
    crop::{self, CropBox},
    db,
    error::AppError,
    models::{Campaign, CampaignDraft, CollectedEmail, Settings, SettingsUpdate},
    portal, schedule,
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::Path as FsPath;
use tower_cookies::Cookies;

#[derive(Debug, Serialize)]
pub struct CampaignMutation {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    campaign: Option<Campaign>,
    campaigns: Vec<Campaign>,
}

/// Trims and checks an operator-submitted campaign and brings its dates and
/// times into the stored `YYYY-MM-DD` / `HH:MM:SS` form.
pub fn validated(draft: CampaignDraft) -> Result<CampaignDraft, AppError> {
    let title = draft.title.trim().to_string();
    let description = draft.description.trim().to_string();
    if title.is_empty() {
        return Err(AppError::BadRequest("campaign title is required".to_string()));
    }
    if description.is_empty() {
        return Err(AppError::BadRequest("campaign description is required".to_string()));
    }
    Ok(CampaignDraft {
        title,
        description,
        image: draft.image.trim().to_string(),
        start_date: schedule::normalize_date(&draft.start_date)?,
        end_date: schedule::normalize_date(&draft.end_date)?,
        start_time: schedule::normalize_time(&draft.start_time)?,
        end_time: schedule::normalize_time(&draft.end_time)?,
        is_active: draft.is_active,
    })
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn get_ads(State(app_state): State<AppState>) -> Result<Json<Vec<Campaign>>, AppError> {
    db::get_all_campaigns(&app_state.pool).await.map(Json)
}

pub async fn create_ad(
    _admin: AdminSession,
    State(app_state): State<AppState>,
    Json(payload): Json<CampaignDraft>,
) -> Result<(StatusCode, Json<CampaignMutation>), AppError> {
    let draft = validated(payload)?;
    let campaign = db::create_campaign(&app_state.pool, &draft).await?;
    tracing::info!(campaign_id = campaign.id, title = %campaign.title, "campaign created");
    let campaigns = db::get_all_campaigns(&app_state.pool).await?;
    Ok((
        StatusCode::CREATED,
        Json(CampaignMutation {
            success: true,
            campaign: Some(campaign),
            campaigns,
        }),
    ))
}

pub async fn update_ad(
    _admin: AdminSession,
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<CampaignDraft>,
) -> Result<Json<CampaignMutation>, AppError> {
    let draft = validated(payload)?;
    let campaign = db::update_campaign(&app_state.pool, id, &draft)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no campaign with id {id}")))?;
    tracing::info!(campaign_id = id, is_active = campaign.is_active, "campaign updated");
    let campaigns = db::get_all_campaigns(&app_state.pool).await?;
    Ok(Json(CampaignMutation {
        success: true,
        campaign: Some(campaign),
        campaigns,
    }))
}

pub async fn delete_ad(
    _admin: AdminSession,
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CampaignMutation>, AppError> {
    if !db::delete_campaign(&app_state.pool, id).await? {
        return Err(AppError::NotFound(format!("no campaign with id {id}")));
    }
    tracing::info!(campaign_id = id, "campaign deleted");
    let campaigns = db::get_all_campaigns(&app_state.pool).await?;
    Ok(Json(CampaignMutation {
        success: true,
        campaign: None,
        campaigns,
    }))
}

#[derive(Deserialize)]
pub struct ConflictQuery {
    #[serde(default)]
    start_date: String,
    #[serde(default)]
    end_date: String,
    exclude_id: Option<i64>,
}

pub async fn check_conflicts(
    _admin: AdminSession,
    State(app_state): State<AppState>,
    Json(payload): Json<ConflictQuery>,
) -> Result<Json<Value>, AppError> {
    let campaigns = db::get_all_campaigns(&app_state.pool).await?;
    let duplicates = schedule::find_duplicates(
        &campaigns,
        &payload.start_date,
        &payload.end_date,
        payload.exclude_id,
    );
    Ok(Json(json!({ "duplicates": duplicates })))
}

pub async fn get_active_ads(State(app_state): State<AppState>) -> Result<Json<Vec<Campaign>>, AppError> {
    let campaigns = db::get_all_campaigns(&app_state.pool).await?;
    let now = portal::portal_now(&app_state.config);
    Ok(Json(schedule::select_active(&campaigns, now)))
}

pub async fn get_active_ad(State(app_state): State<AppState>) -> Result<Json<Value>, AppError> {
    let campaigns = db::get_all_campaigns(&app_state.pool).await?;
    let now = portal::portal_now(&app_state.config);
    let first = schedule::select_active(&campaigns, now).into_iter().next();
    Ok(Json(json!({ "ad": first })))
}

/// Never fails: the portal and console fall back to the defaults.
pub async fn get_settings(State(app_state): State<AppState>) -> Json<Settings> {
    match db::get_settings(&app_state.pool).await {
        Ok(settings) => Json(settings),
        Err(e) => {
            tracing::warn!("could not load settings, serving defaults: {e}");
            Json(Settings::default())
        }
    }
}

pub async fn update_settings(
    _admin: AdminSession,
    State(app_state): State<AppState>,
    Json(payload): Json<SettingsUpdate>,
) -> Result<Json<Value>, AppError> {
    let entries = payload.entries();
    db::put_settings(&app_state.pool, &entries).await?;
    tracing::info!(keys = ?entries.iter().map(|(k, _)| *k).collect::<Vec<_>>(), "settings updated");
    Ok(Json(json!({ "success": true })))
}

/// Keeps the characters that are safe in a file name and URL path.
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "image.jpg".to_string()
    } else {
        cleaned
    }
}

/// Writes an uploaded image to the upload directory and returns its public
/// `/img/...` path. Background uploads also become the portal background.
pub async fn store_upload(
    app_state: &AppState,
    original_name: &str,
    bytes: &[u8],
    is_ad: bool,
) -> Result<String, AppError> {
    let file_name = format!(
        "upload_{}_{}",
        Local::now().timestamp(),
        sanitize_file_name(original_name)
    );
    let dir: &FsPath = &app_state.config.upload_dir;
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(dir.join(&file_name), bytes).await?;

    let url = format!("/img/{file_name}");
    if !is_ad {
        let background = format!("url({url})");
        db::put_settings(&app_state.pool, &[("background_image", background.as_str())]).await?;
    }
    tracing::info!(%url, is_ad, size = bytes.len(), "image uploaded");
    Ok(url)
}

pub struct UploadForm {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub is_ad: bool,
}

/// Reads the upload form. When a crop box (`x`, `y`, `width`, `height`) is
/// sent, the image is cropped to it and stored as JPEG.
pub async fn read_upload(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut file = None;
    let mut is_ad = false;
    let mut crop_fields: [Option<String>; 4] = Default::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let name = field.file_name().unwrap_or("image.jpg").to_string();
                let bytes = field.bytes().await?;
                file = Some((name, bytes.to_vec()));
            }
            "is_ad" => is_ad = field.text().await?.trim() == "true",
            "x" => crop_fields[0] = Some(field.text().await?),
            "y" => crop_fields[1] = Some(field.text().await?),
            "width" => crop_fields[2] = Some(field.text().await?),
            "height" => crop_fields[3] = Some(field.text().await?),
            _ => {}
        }
    }
    let (file_name, bytes) = file
        .filter(|(_, bytes)| !bytes.is_empty())
        .ok_or_else(|| AppError::BadRequest("no file received".to_string()))?;

    let [x, y, width, height] = &crop_fields;
    let crop = CropBox::from_fields(x.as_deref(), y.as_deref(), width.as_deref(), height.as_deref())?;
    let (file_name, bytes) = match crop {
        Some(area) => {
            let cropped = tokio::task::spawn_blocking(move || crop::crop_to_jpeg(&bytes, area))
                .await
                .map_err(|e| AppError::IoError(std::io::Error::other(e)))??;
            tracing::debug!(?area, size = cropped.len(), "upload cropped");
            (crop::jpeg_name(&file_name), cropped)
        }
        None => (file_name, bytes),
    };
    Ok(UploadForm {
        file_name,
        bytes,
        is_ad,
    })
}

pub async fn upload_file(
    _admin: AdminSession,
    State(app_state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Value>, AppError> {
    let upload = read_upload(multipart).await?;
    let url = store_upload(&app_state, &upload.file_name, &upload.bytes, upload.is_ad).await?;
    Ok(Json(json!({ "success": true, "url": url })))
}

#[derive(Deserialize)]
pub struct EmailPayload {
    email: String,
    source: Option<String>,
}

pub fn validate_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email.to_string())
    } else {
        Err(AppError::BadRequest(format!("not an email address: {raw:?}")))
    }
}

pub async fn collect_email(
    State(app_state): State<AppState>,
    Json(payload): Json<EmailPayload>,
) -> Result<(StatusCode, Json<CollectedEmail>), AppError> {
    let email = validate_email(&payload.email)?;
    let source = payload
        .source
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "api".to_string());
    let record = db::record_email(&app_state.pool, &email, &source).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_emails(
    _admin: AdminSession,
    State(app_state): State<AppState>,
) -> Result<Json<Vec<CollectedEmail>>, AppError> {
    db::get_all_emails(&app_state.pool).await.map(Json)
}

fn csv_cell(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn collected_at(created_at: &NaiveDateTime) -> String {
    created_at.format("%d/%m/%Y, %H:%M:%S").to_string()
}

pub fn emails_csv(emails: &[CollectedEmail]) -> String {
    let mut lines = vec!["ID,Email Address,Source,Date Collected".to_string()];
    for email in emails {
        let cells = [
            email.id.to_string(),
            email.email.clone(),
            email.source.clone(),
            collected_at(&email.created_at),
        ];
        lines.push(cells.iter().map(|c| csv_cell(c)).collect::<Vec<_>>().join(","));
    }
    lines.join("\n")
}

pub async fn export_emails(
    _admin: AdminSession,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let emails = db::get_all_emails(&app_state.pool).await?;
    let file_name = format!("collected_emails_{}.csv", Local::now().format("%Y-%m-%d"));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        emails_csv(&emails),
    ))
}

#[derive(Deserialize)]
pub struct LoginPayload {
    username: String,
    password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

pub async fn admin_login(
    State(app_state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<LoginPayload>,
) -> (StatusCode, Json<LoginResponse>) {
    if auth::credentials_match(&app_state.config, &payload.username, &payload.password) {
        tracing::info!(user = %payload.username.trim(), "admin login");
        auth::start_session(&cookies);
        (
            StatusCode::OK,
            Json(LoginResponse {
                success: true,
                token: Some(nanoid::nanoid!(32)),
                message: None,
            }),
        )
    } else {
        tracing::warn!(user = %payload.username.trim(), "admin login rejected");
        (
            StatusCode::UNAUTHORIZED,
            Json(LoginResponse {
                success: false,
                token: None,
                message: Some("Invalid username or password".to_string()),
            }),
        )
    }
}
