use serde::Deserialize;
use std::collections::HashMap;
use std::env;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub migrations_dir: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            url: "sqlite::memory:".to_string(),
            max_connections: 5,
            migrations_dir: "migrations".to_string(),
        }
    }
}

/// Locale configuration. An empty `available_locales` list accepts any
/// well-formed locale.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct I18nSettings {
    pub default_locale: String,
    pub available_locales: Vec<String>,
}

impl Default for I18nSettings {
    fn default() -> Self {
        I18nSettings {
            default_locale: "en".to_string(),
            available_locales: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub i18n: I18nSettings,
    pub other: HashMap<String, String>,
}

impl Settings {
    /// Defaults overridden by `TRANSLATABLE_*` environment variables.
    pub fn from_env() -> Self {
        let mut settings = Settings::default();
        settings.apply_overrides(|key| env::var(key).ok());
        settings
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("TRANSLATABLE_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(max) = lookup("TRANSLATABLE_MAX_CONNECTIONS") {
            match max.trim().parse() {
                Ok(max) => self.database.max_connections = max,
                Err(_) => log::warn!("Ignoring TRANSLATABLE_MAX_CONNECTIONS={}", max),
            }
        }
        if let Some(dir) = lookup("TRANSLATABLE_MIGRATIONS_DIR") {
            self.database.migrations_dir = dir;
        }
        if let Some(locale) = lookup("TRANSLATABLE_DEFAULT_LOCALE") {
            self.i18n.default_locale = locale.trim().to_string();
        }
        if let Some(list) = lookup("TRANSLATABLE_AVAILABLE_LOCALES") {
            self.i18n.available_locales = list
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect();
        }
    }
}
