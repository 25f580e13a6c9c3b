use crate::config::Config;
use sqlx::SqlitePool;
use std::sync::Arc;
use tera::Tera;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub tera: Arc<Tera>,
    pub http: reqwest::Client,
}
