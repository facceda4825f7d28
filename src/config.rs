use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::geo::ExclusionList;
use crate::render::CsvStyle;

/// Settings shared by every report run, read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub role_a: String,
    pub role_b: String,
    pub exclusions: ExclusionList,
    pub recipients: Vec<String>,
    pub outbox_dir: PathBuf,
    pub output_dir: PathBuf,
    pub join_separator: String,
    pub csv_style: CsvStyle,
    pub log_level: String,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn role(key: &'static str, default: &str) -> Result<String, ConfigError> {
    let value = var_or(key, default);
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid { key, value });
    }
    Ok(value.trim().to_string())
}

impl AppConfig {
    /// Reads `.env` if present, then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::load_from_env()
    }

    pub fn load_from_env() -> Result<Self, ConfigError> {
        let csv_style = var_or("REPORT_CSV_STYLE", "legacy");
        let csv_style = csv_style
            .parse::<CsvStyle>()
            .map_err(|_| ConfigError::Invalid {
                key: "REPORT_CSV_STYLE",
                value: csv_style.clone(),
            })?;

        let role_a = role("REPORT_ROLE_A", "CRP")?;
        let role_b = role("REPORT_ROLE_B", "BFC")?;
        if role_a == role_b {
            return Err(ConfigError::Conflict("REPORT_ROLE_A", "REPORT_ROLE_B"));
        }

        let excluded = var_or("REPORT_EXCLUDED_BOUNDARIES", "");
        let separator = env::var("REPORT_JOIN_SEPARATOR")
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "; ".to_string());

        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            role_a,
            role_b,
            exclusions: ExclusionList::from_entries(excluded.split(',')),
            recipients: list(&var_or("REPORT_RECIPIENTS", "")),
            outbox_dir: PathBuf::from(var_or("REPORT_OUTBOX_DIR", "outbox")),
            output_dir: PathBuf::from(var_or("REPORT_OUTPUT_DIR", "reports")),
            join_separator: separator,
            csv_style,
            log_level: var_or("APP_LOG_LEVEL", "info"),
        })
    }

    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "DATABASE_URL",
            "REPORT_ROLE_A",
            "REPORT_ROLE_B",
            "REPORT_EXCLUDED_BOUNDARIES",
            "REPORT_RECIPIENTS",
            "REPORT_OUTBOX_DIR",
            "REPORT_OUTPUT_DIR",
            "REPORT_JOIN_SEPARATOR",
            "REPORT_CSV_STYLE",
            "APP_LOG_LEVEL",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load_from_env().expect("config loads with defaults");
        assert!(config.database_url.is_none());
        assert_eq!(config.role_a, "CRP");
        assert_eq!(config.role_b, "BFC");
        assert!(config.exclusions.is_empty());
        assert!(config.recipients.is_empty());
        assert_eq!(config.join_separator, "; ");
        assert_eq!(config.csv_style, CsvStyle::Legacy);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn database_url_is_required_on_demand() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load_from_env().expect("config loads");
        assert!(matches!(
            config.database_url(),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));

        env::set_var("DATABASE_URL", "postgres://localhost/field_reports");
        let config = AppConfig::load_from_env().expect("config loads");
        assert_eq!(
            config.database_url().expect("url set"),
            "postgres://localhost/field_reports"
        );
        reset_env();
    }

    #[test]
    fn parses_lists_and_styles() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("REPORT_EXCLUDED_BOUNDARIES", "445, Bangalore U South ,");
        env::set_var("REPORT_RECIPIENTS", "ops@example.org, field@example.org");
        env::set_var("REPORT_CSV_STYLE", "quoted");
        let config = AppConfig::load_from_env().expect("config loads");
        assert_eq!(config.exclusions.len(), 2);
        assert_eq!(
            config.recipients,
            vec!["ops@example.org".to_string(), "field@example.org".to_string()]
        );
        assert_eq!(config.csv_style, CsvStyle::Quoted);
        reset_env();
    }

    #[test]
    fn rejects_bad_values_by_name() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("REPORT_CSV_STYLE", "tsv");
        let err = AppConfig::load_from_env().expect_err("style rejected");
        assert!(err.to_string().contains("REPORT_CSV_STYLE"));

        reset_env();
        env::set_var("REPORT_ROLE_B", "CRP");
        let err = AppConfig::load_from_env().expect_err("duplicate role rejected");
        assert!(matches!(
            err,
            ConfigError::Conflict("REPORT_ROLE_A", "REPORT_ROLE_B")
        ));
        reset_env();
    }
}
