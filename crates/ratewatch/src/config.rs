use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Deserializer};

use crate::normalize::slug;
use crate::types::{CompetitorSet, Occupancy};

pub const DEFAULT_HORIZON_DAYS: u32 = 30;
pub const MAX_HORIZON_DAYS: u32 = 365;
pub const DEFAULT_OUTPUT_DIR: &str = "data";
pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_ATTACHMENT: &str = "data/rates.zip";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const ALL_CITIES_LABEL: &str = "all_cities";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Horizon must be between 1 and 365 days, got {0}")]
    InvalidHorizon(u32),
    #[error("No competitor hotels configured{0}")]
    NoCompetitors(String),
    #[error("City '{0}' is configured more than once")]
    DuplicateCity(String),
    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),
    #[error("Failed to read competitors file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid competitors file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything a collection run needs, fixed before the first page loads.
///
/// Deserializes from JSON with every field but `competitors` and
/// `start_date` optional; the timeout is given as `page_timeout_secs`.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub competitors: CompetitorSet,
    pub start_date: NaiveDate,
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,
    #[serde(default)]
    pub occupancy: Occupancy,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(
        rename = "page_timeout_secs",
        default = "default_page_timeout",
        deserialize_with = "duration_from_secs"
    )]
    pub page_timeout: Duration,
}

fn default_horizon_days() -> u32 {
    DEFAULT_HORIZON_DAYS
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_page_timeout() -> Duration {
    DEFAULT_PAGE_TIMEOUT
}

fn duration_from_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    u64::deserialize(deserializer).map(Duration::from_secs)
}

impl RunConfig {
    pub fn new(competitors: CompetitorSet, start_date: NaiveDate) -> Self {
        Self {
            competitors,
            start_date,
            horizon_days: default_horizon_days(),
            occupancy: Occupancy::default(),
            output_dir: default_output_dir(),
            page_timeout: default_page_timeout(),
        }
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.horizon_days == 0 || self.horizon_days > MAX_HORIZON_DAYS {
            return Err(ConfigError::InvalidHorizon(self.horizon_days));
        }
        if self.competitors.is_empty() {
            return Err(ConfigError::NoCompetitors(String::new()));
        }

        let mut seen = HashSet::new();
        for city in &self.competitors.cities {
            if !seen.insert(slug(&city.city)) {
                return Err(ConfigError::DuplicateCity(city.city.clone()));
            }
            if city.canonical().is_empty() {
                return Err(ConfigError::NoCompetitors(format!(" for '{}'", city.city)));
            }
        }

        Ok(self)
    }

    /// Check-in dates of the run: `start_date` plus `0..horizon_days`.
    pub fn check_in_dates(&self) -> Vec<NaiveDate> {
        (0..self.horizon_days)
            .map_while(|i| self.start_date.checked_add_days(Days::new(i.into())))
            .collect()
    }

    /// City part of the export filename.
    pub fn output_label(&self) -> String {
        match self.competitors.cities.first() {
            Some(city) if !self.competitors.is_multi_city() => slug(&city.city),
            _ => ALL_CITIES_LABEL.to_string(),
        }
    }
}

/// Reads a competitors file:
/// `{"cities": [{"city": "Taubate", "hotels": ["Ibis Taubate"]}]}`
pub fn load_competitors(path: &Path) -> Result<CompetitorSet, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailSettings {
    pub from: String,
    pub to: String,
    pub password: String,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub attachment: PathBuf,
}

impl EmailSettings {
    /// Builds settings from optional sources, failing on the first
    /// credential that was not supplied.
    pub fn from_parts(
        from: Option<String>,
        to: Option<String>,
        password: Option<String>,
        smtp_host: Option<String>,
        smtp_port: Option<u16>,
        attachment: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let present = |v: Option<String>, name: &'static str| {
            v.filter(|s| !s.trim().is_empty())
                .ok_or(ConfigError::MissingSetting(name))
        };

        Ok(Self {
            from: present(from, "email sender")?,
            to: present(to, "email recipient")?,
            password: present(password, "SMTP password")?,
            smtp_host,
            smtp_port: smtp_port.unwrap_or(DEFAULT_SMTP_PORT),
            attachment: attachment.unwrap_or_else(|| PathBuf::from(DEFAULT_ATTACHMENT)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CityCompetitors;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn taubate() -> CompetitorSet {
        CompetitorSet::single("Taubaté", vec!["Ibis Taubate".to_string()])
    }

    #[test]
    fn test_check_in_dates() {
        let mut config = RunConfig::new(taubate(), date(2024, 12, 30));
        config.horizon_days = 3;

        assert_eq!(
            config.check_in_dates(),
            vec![date(2024, 12, 30), date(2024, 12, 31), date(2025, 1, 1)]
        );
    }

    #[test]
    fn test_default_horizon() {
        let config = RunConfig::new(taubate(), date(2024, 1, 1)).validate().unwrap();
        assert_eq!(config.check_in_dates().len(), 30);
    }

    #[test]
    fn test_validate_rejects_bad_horizon() {
        let mut config = RunConfig::new(taubate(), date(2024, 1, 1));
        config.horizon_days = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidHorizon(0))));

        let mut config = RunConfig::new(taubate(), date(2024, 1, 1));
        config.horizon_days = 400;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidHorizon(400))));
    }

    #[test]
    fn test_validate_rejects_empty_and_duplicate_cities() {
        let config = RunConfig::new(CompetitorSet::default(), date(2024, 1, 1));
        assert!(matches!(config.validate(), Err(ConfigError::NoCompetitors(_))));

        let set = CompetitorSet::single("Taubate", vec!["  ".to_string()]);
        let config = RunConfig::new(set, date(2024, 1, 1));
        assert!(matches!(config.validate(), Err(ConfigError::NoCompetitors(_))));

        let set = CompetitorSet {
            cities: vec![
                CityCompetitors::new("Taubaté", vec!["Ibis Taubate".to_string()]),
                CityCompetitors::new("TAUBATE", vec!["Olavo Bilac Hotel".to_string()]),
            ],
        };
        let config = RunConfig::new(set, date(2024, 1, 1));
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateCity(_))));
    }

    #[test]
    fn test_output_label() {
        let config = RunConfig::new(taubate(), date(2024, 1, 1));
        assert_eq!(config.output_label(), "taubate");

        let set = CompetitorSet {
            cities: vec![
                CityCompetitors::new("Taubate", vec!["Ibis Taubate".to_string()]),
                CityCompetitors::new("São José dos Campos", vec!["Ibis Sjc".to_string()]),
            ],
        };
        let config = RunConfig::new(set, date(2024, 1, 1));
        assert_eq!(config.output_label(), ALL_CITIES_LABEL);
    }

    #[test]
    fn test_load_competitors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("competitors.json");
        std::fs::write(
            &path,
            r#"{"cities": [
                {"city": "Taubate", "hotels": ["Faro Hotel Taubaté", "Ibis Taubate"]},
                {"city": "Pindamonhangaba", "hotels": ["Hotel Pinda"]}
            ]}"#,
        )
        .unwrap();

        let set = load_competitors(&path).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.cities[0].city, "Taubate");
        assert_eq!(set.cities[0].hotels, vec!["Faro Hotel Taubaté", "Ibis Taubate"]);

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(load_competitors(&path), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_run_config_from_json() {
        let config: RunConfig = serde_json::from_str(
            r#"{
                "competitors": {"cities": [{"city": "Taubate", "hotels": ["Ibis Taubate"]}]},
                "start_date": "2025-03-10",
                "horizon_days": 7,
                "page_timeout_secs": 25
            }"#,
        )
        .unwrap();

        assert_eq!(config.start_date, date(2025, 3, 10));
        assert_eq!(config.horizon_days, 7);
        assert_eq!(config.page_timeout, Duration::from_secs(25));
        assert_eq!(config.occupancy, Occupancy::default());
        assert_eq!(config.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(config.validate().unwrap().check_in_dates().len(), 7);

        let defaults: RunConfig = serde_json::from_str(
            r#"{"competitors": {"cities": []}, "start_date": "2025-03-10"}"#,
        )
        .unwrap();
        assert_eq!(defaults.horizon_days, DEFAULT_HORIZON_DAYS);
        assert_eq!(defaults.page_timeout, DEFAULT_PAGE_TIMEOUT);
        assert!(matches!(defaults.validate(), Err(ConfigError::NoCompetitors(_))));
    }

    #[test]
    fn test_email_settings_require_credentials() {
        let missing = EmailSettings::from_parts(
            Some("reports@gmail.com".to_string()),
            Some("owner@example.com".to_string()),
            None,
            None,
            None,
            None,
        );
        assert!(matches!(missing, Err(ConfigError::MissingSetting("SMTP password"))));

        let blank_sender = EmailSettings::from_parts(
            Some(" ".to_string()),
            Some("owner@example.com".to_string()),
            Some("secret".to_string()),
            None,
            None,
            None,
        );
        assert!(matches!(blank_sender, Err(ConfigError::MissingSetting("email sender"))));

        let ok = EmailSettings::from_parts(
            Some("reports@gmail.com".to_string()),
            Some("owner@example.com".to_string()),
            Some("secret".to_string()),
            None,
            None,
            None,
        )
        .unwrap();
        assert_eq!(ok.smtp_port, DEFAULT_SMTP_PORT);
        assert_eq!(ok.attachment, PathBuf::from(DEFAULT_ATTACHMENT));
    }
}
