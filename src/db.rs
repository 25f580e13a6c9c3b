use crate::error::AppError;
use crate::models::{Campaign, CampaignDraft, CollectedEmail, Settings};
use sqlx::SqlitePool;

const CAMPAIGN_COLUMNS: &str = "id, title, description, image, \
     COALESCE(start_date, '') AS start_date, COALESCE(end_date, '') AS end_date, \
     COALESCE(start_time, '') AS start_time, COALESCE(end_time, '') AS end_time, \
     is_active, created_at";

pub async fn create_schema(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS page_settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        );",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS scheduled_ads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            image TEXT NOT NULL DEFAULT '',
            start_date TEXT,
            end_date TEXT,
            start_time TEXT,
            end_time TEXT,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        );",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS collected_emails (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL,
            source TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        );",
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn none_if_empty(value: &str) -> Option<&str> {
    if value.is_empty() { None } else { Some(value) }
}

pub async fn get_all_campaigns(pool: &SqlitePool) -> Result<Vec<Campaign>, AppError> {
    sqlx::query_as(&format!(
        "SELECT {CAMPAIGN_COLUMNS} FROM scheduled_ads ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(pool)
    .await
    .map_err(AppError::from)
}

pub async fn find_campaign(pool: &SqlitePool, id: i64) -> Result<Option<Campaign>, AppError> {
    sqlx::query_as(&format!("SELECT {CAMPAIGN_COLUMNS} FROM scheduled_ads WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::from)
}

/// Stores an already validated draft. New campaigns always start active.
pub async fn create_campaign(pool: &SqlitePool, draft: &CampaignDraft) -> Result<Campaign, AppError> {
    let id = sqlx::query(
        "INSERT INTO scheduled_ads (title, description, image, start_date, end_date, start_time, end_time, is_active)
         VALUES (?, ?, ?, ?, ?, ?, ?, TRUE)",
    )
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(&draft.image)
    .bind(none_if_empty(&draft.start_date))
    .bind(none_if_empty(&draft.end_date))
    .bind(none_if_empty(&draft.start_time))
    .bind(none_if_empty(&draft.end_time))
    .execute(pool)
    .await?
    .last_insert_rowid();

    find_campaign(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("campaign {id} vanished after insert")))
}

pub async fn update_campaign(
    pool: &SqlitePool,
    id: i64,
    draft: &CampaignDraft,
) -> Result<Option<Campaign>, AppError> {
    let updated = sqlx::query(
        "UPDATE scheduled_ads
         SET title = ?, description = ?, image = ?, start_date = ?, end_date = ?,
             start_time = ?, end_time = ?, is_active = COALESCE(?, is_active)
         WHERE id = ?",
    )
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(&draft.image)
    .bind(none_if_empty(&draft.start_date))
    .bind(none_if_empty(&draft.end_date))
    .bind(none_if_empty(&draft.start_time))
    .bind(none_if_empty(&draft.end_time))
    .bind(draft.is_active)
    .bind(id)
    .execute(pool)
    .await?
    .rows_affected();

    if updated == 0 {
        return Ok(None);
    }
    find_campaign(pool, id).await
}

pub async fn set_campaign_active(pool: &SqlitePool, id: i64, is_active: bool) -> Result<bool, AppError> {
    let updated = sqlx::query("UPDATE scheduled_ads SET is_active = ? WHERE id = ?")
        .bind(is_active)
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(updated > 0)
}

pub async fn delete_campaign(pool: &SqlitePool, id: i64) -> Result<bool, AppError> {
    let deleted = sqlx::query("DELETE FROM scheduled_ads WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}

/// Defaults overlaid with every stored key.
pub async fn get_settings(pool: &SqlitePool) -> Result<Settings, AppError> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM page_settings")
        .fetch_all(pool)
        .await?;

    let mut settings = Settings::default();
    for (key, value) in rows {
        settings.apply(&key, value);
    }
    Ok(settings)
}

pub async fn put_settings(pool: &SqlitePool, entries: &[(&str, &str)]) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    for (key, value) in entries {
        sqlx::query(
            "INSERT INTO page_settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(*key)
        .bind(*value)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn record_email(pool: &SqlitePool, email: &str, source: &str) -> Result<CollectedEmail, AppError> {
    let email = sqlx::query_as(
        "INSERT INTO collected_emails (email, source) VALUES (?, ?) RETURNING id, email, source, created_at",
    )
    .bind(email)
    .bind(source)
    .fetch_one(pool)
    .await?;
    Ok(email)
}

pub async fn get_all_emails(pool: &SqlitePool) -> Result<Vec<CollectedEmail>, AppError> {
    sqlx::query_as("SELECT id, email, source, created_at FROM collected_emails ORDER BY created_at DESC, id DESC")
        .fetch_all(pool)
        .await
        .map_err(AppError::from)
}
