use chrono::FixedOffset;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub admin_username: String,
    pub admin_password: String,
    /// Public origin of this server, used to build OAuth redirect URIs.
    pub public_base_url: String,
    /// Where the hotspot sends the client after login when the gateway gives no `link-orig`.
    pub hotspot_destination: String,
    /// Fixed offset for the portal clock. `None` uses the server's local time.
    pub utc_offset: Option<FixedOffset>,
    pub cors_origins: Vec<String>,
}

#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid configuration: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: "sqlite://hotspot.db".to_string(),
            port: 3000,
            upload_dir: PathBuf::from("public/img"),
            admin_username: "admin".to_string(),
            admin_password: "admin".to_string(),
            public_base_url: "http://localhost:3000".to_string(),
            hotspot_destination: "https://www.nuanu.com/".to_string(),
            utc_offset: None,
            cors_origins: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let defaults = Config::default();

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError(format!("PORT is not a port number: {raw:?}")))?,
            Err(_) => defaults.port,
        };

        let utc_offset = match env::var("PORTAL_UTC_OFFSET") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                FixedOffset::from_str(raw.trim())
                    .map_err(|_| ConfigError(format!("PORTAL_UTC_OFFSET must look like +08:00, got {raw:?}")))?,
            ),
            _ => None,
        };

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let admin_username = env::var("ADMIN_USERNAME")
            .map(|v| clean_credential(&v))
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.admin_username);
        let admin_password = env::var("ADMIN_PASSWORD")
            .map(|v| clean_credential(&v))
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.admin_password);

        Ok(Config {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            port,
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
            admin_username,
            admin_password,
            public_base_url: env::var("PUBLIC_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_base_url),
            hotspot_destination: env::var("HOTSPOT_DESTINATION")
                .unwrap_or(defaults.hotspot_destination),
            utc_offset,
            cors_origins,
        })
    }

    pub fn uses_default_credentials(&self) -> bool {
        self.admin_username == "admin" && self.admin_password == "admin"
    }
}

/// Strips control characters and surrounding whitespace that sneak into
/// credentials pasted into `.env` files or deploy dashboards.
pub fn clean_credential(raw: &str) -> String {
    raw.chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some(' ')
            } else if c.is_control() {
                None
            } else {
                Some(c)
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}
