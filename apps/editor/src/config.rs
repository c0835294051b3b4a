use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::layout::{Granularity, PageConfig};
use crate::preview::toolbar::ToolbarConfig;
use crate::session::editor::EditorSettings;

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub edit_debounce_ms: u64,
    pub toolbar_grace_ms: u64,
    pub toolbar_dismiss_ms: u64,
    pub highlight_ms: u64,
    pub pagination_granularity: Granularity,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            rust_log: "info".to_string(),
            edit_debounce_ms: 100,
            toolbar_grace_ms: 200,
            toolbar_dismiss_ms: 150,
            highlight_ms: 1500,
            pagination_granularity: Granularity::Section,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = Config::default();
        Ok(Config {
            port: env_or("PORT", defaults.port).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or(defaults.rust_log),
            edit_debounce_ms: env_or("EDIT_DEBOUNCE_MS", defaults.edit_debounce_ms)?,
            toolbar_grace_ms: env_or("TOOLBAR_GRACE_MS", defaults.toolbar_grace_ms)?,
            toolbar_dismiss_ms: env_or("TOOLBAR_DISMISS_MS", defaults.toolbar_dismiss_ms)?,
            highlight_ms: env_or("HIGHLIGHT_MS", defaults.highlight_ms)?,
            pagination_granularity: match std::env::var("PAGINATION_GRANULARITY") {
                Ok(value) => parse_granularity(&value)?,
                Err(_) => defaults.pagination_granularity,
            },
        })
    }

    /// Timer and layout settings handed to every editor session.
    pub fn editor_settings(&self) -> EditorSettings {
        EditorSettings {
            edit_debounce: Duration::from_millis(self.edit_debounce_ms),
            highlight: Duration::from_millis(self.highlight_ms),
            toolbar: ToolbarConfig {
                grace: Duration::from_millis(self.toolbar_grace_ms),
                dismiss_delay: Duration::from_millis(self.toolbar_dismiss_ms),
                ..ToolbarConfig::default()
            },
            granularity: self.pagination_granularity,
            page: PageConfig::default(),
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn parse_granularity(value: &str) -> Result<Granularity> {
    match value.trim().to_ascii_lowercase().as_str() {
        "section" => Ok(Granularity::Section),
        "child" | "child_element" => Ok(Granularity::ChildElement),
        other => bail!("PAGINATION_GRANULARITY must be 'section' or 'child', got '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_granularity() {
        assert_eq!(parse_granularity("Section").unwrap(), Granularity::Section);
        assert_eq!(parse_granularity("child").unwrap(), Granularity::ChildElement);
        assert!(parse_granularity("page").is_err());
    }

    #[test]
    fn test_editor_settings_carry_timer_values() {
        let config = Config {
            toolbar_grace_ms: 250,
            ..Config::default()
        };
        let settings = config.editor_settings();
        assert_eq!(settings.toolbar.grace, Duration::from_millis(250));
        assert_eq!(settings.edit_debounce, Duration::from_millis(100));
        assert_eq!(settings.toolbar.dismiss_delay, Duration::from_millis(150));
    }
}
