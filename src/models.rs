use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A scheduled ad banner. Empty date/time strings mean "unbounded on that side".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Campaign {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image: String,
    pub start_date: String,
    pub end_date: String,
    pub start_time: String,
    pub end_time: String,
    pub is_active: bool,
    #[serde(skip_serializing, default)]
    pub created_at: Option<NaiveDateTime>,
}

/// A campaign as submitted by the operator, before the store assigns an id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CampaignDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    /// Ignored on create. On update, `None` keeps the stored state.
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CollectedEmail {
    pub id: i64,
    pub email: String,
    pub source: String,
    pub created_at: NaiveDateTime,
}

/// Portal look and social login switches. Stored as key/value rows, every
/// key falls back to its default when missing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub background_image: String,
    pub background_image_type: String,
    pub background_image_data: String,
    pub background_color: String,
    pub page_title: String,
    pub button_text: String,
    pub google_login_enabled: String,
    pub facebook_login_enabled: String,
    pub google_client_id: String,
    #[serde(skip_serializing)]
    pub google_client_secret: String,
    pub facebook_app_id: String,
    #[serde(skip_serializing)]
    pub facebook_app_secret: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            background_image: "url(/img/nuanu.png)".to_string(),
            background_image_type: "url".to_string(),
            background_image_data: String::new(),
            background_color: "#667eea".to_string(),
            page_title: "Welcome To NUANU Free WiFi".to_string(),
            button_text: "Connect to WiFi".to_string(),
            google_login_enabled: "false".to_string(),
            facebook_login_enabled: "false".to_string(),
            google_client_id: String::new(),
            google_client_secret: String::new(),
            facebook_app_id: String::new(),
            facebook_app_secret: String::new(),
        }
    }
}

impl Settings {
    /// Overlays one stored key/value row. Unknown keys are ignored.
    pub fn apply(&mut self, key: &str, value: String) {
        match key {
            "background_image" => self.background_image = value,
            "background_image_type" => self.background_image_type = value,
            "background_image_data" => self.background_image_data = value,
            "background_color" => self.background_color = value,
            "page_title" => self.page_title = value,
            "button_text" => self.button_text = value,
            "google_login_enabled" => self.google_login_enabled = value,
            "facebook_login_enabled" => self.facebook_login_enabled = value,
            "google_client_id" => self.google_client_id = value,
            "google_client_secret" => self.google_client_secret = value,
            "facebook_app_id" => self.facebook_app_id = value,
            "facebook_app_secret" => self.facebook_app_secret = value,
            _ => {}
        }
    }

    pub fn google_enabled(&self) -> bool {
        self.google_login_enabled == "true" && !self.google_client_id.is_empty()
    }

    pub fn facebook_enabled(&self) -> bool {
        self.facebook_login_enabled == "true" && !self.facebook_app_id.is_empty()
    }

    /// The background image as a plain URL, with any CSS `url(...)` wrapper removed.
    pub fn background_url(&self) -> String {
        let raw = self.background_image.trim();
        let inner = raw
            .strip_prefix("url(")
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap_or(raw);
        inner.replace(['\'', '"'], "")
    }
}

/// Partial settings update. Missing or empty fields leave the stored value alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub page_title: Option<String>,
    pub button_text: Option<String>,
    pub background_color: Option<String>,
    pub google_login_enabled: Option<String>,
    pub facebook_login_enabled: Option<String>,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub facebook_app_id: Option<String>,
    pub facebook_app_secret: Option<String>,
}

impl SettingsUpdate {
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("page_title", &self.page_title),
            ("button_text", &self.button_text),
            ("background_color", &self.background_color),
            ("google_login_enabled", &self.google_login_enabled),
            ("facebook_login_enabled", &self.facebook_login_enabled),
            ("google_client_id", &self.google_client_id),
            ("google_client_secret", &self.google_client_secret),
            ("facebook_app_id", &self.facebook_app_id),
            ("facebook_app_secret", &self.facebook_app_secret),
        ]
        .into_iter()
        .filter_map(|(key, value)| match value.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => Some((key, v)),
            _ => None,
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_url_unwraps_css_url() {
        let mut settings = Settings::default();
        assert_eq!(settings.background_url(), "/img/nuanu.png");

        settings.background_image = "url('/img/upload_1_a.jpg')".to_string();
        assert_eq!(settings.background_url(), "/img/upload_1_a.jpg");

        settings.background_image = "https://cdn.example.com/bg.png".to_string();
        assert_eq!(settings.background_url(), "https://cdn.example.com/bg.png");
    }

    #[test]
    fn social_login_needs_switch_and_client_id() {
        let mut settings = Settings::default();
        settings.google_login_enabled = "true".to_string();
        assert!(!settings.google_enabled());
        settings.google_client_id = "client".to_string();
        assert!(settings.google_enabled());
        assert!(!settings.facebook_enabled());
    }

    #[test]
    fn settings_update_skips_blank_fields() {
        let update = SettingsUpdate {
            page_title: Some("Free WiFi".to_string()),
            button_text: Some("   ".to_string()),
            google_login_enabled: Some("false".to_string()),
            ..Default::default()
        };
        assert_eq!(
            update.entries(),
            vec![("page_title", "Free WiFi"), ("google_login_enabled", "false")]
        );
    }

    #[test]
    fn secrets_are_not_serialized() {
        let mut settings = Settings::default();
        settings.google_client_secret = "hidden".to_string();
        let json = serde_json::to_value(&settings).unwrap();
        assert!(json.get("google_client_secret").is_none());
        assert!(json.get("facebook_app_secret").is_none());
        assert_eq!(json["page_title"], "Welcome To NUANU Free WiFi");
    }
}
