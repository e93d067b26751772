use crate::errors::{E2eError, Result};
use crate::types::Viewport;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://aurum-test.alchelyst.com";
pub const DEFAULT_USERNAME: &str = "TestUser";
pub const DEFAULT_PASSWORD: &str = "Password@123";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub credentials: Credentials,
    pub default_timeout_ms: u64,
    pub login_timeout_ms: u64,
    pub report_timeout_ms: u64,
    pub export_timeout_ms: u64,
    pub browser: BrowserConfig,
    pub artifacts: ArtifactConfig,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub args: Vec<String>,
    /// How long Chrome may stay silent before the connection is dropped.
    pub idle_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub screenshot_dir: PathBuf,
    pub download_dir: PathBuf,
    pub auth_state_path: PathBuf,
    pub report_path: PathBuf,
}

/// Report form inputs shared by the NAV Pack and Trial Balance journeys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestData {
    pub client: String,
    pub fund: String,
    pub date_mode: String,
    pub start_date: String,
    pub end_date: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials: Credentials::valid(),
            default_timeout_ms: 10_000,
            login_timeout_ms: 30_000,
            report_timeout_ms: 1_800_000,
            export_timeout_ms: 600_000,
            browser: BrowserConfig::default(),
            artifacts: ArtifactConfig::default(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: Viewport::default(),
            user_agent: None,
            args: vec![],
            idle_timeout_ms: 3_600_000,
        }
    }
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            screenshot_dir: PathBuf::from("screenshots"),
            download_dir: PathBuf::from("downloads"),
            auth_state_path: PathBuf::from("auth-state.json"),
            report_path: PathBuf::from("e2e-report.json"),
        }
    }
}

impl Default for TestData {
    fn default() -> Self {
        Self {
            client: "STEERHEAD".to_string(),
            fund: "Steerhead Alternative Energy Fund".to_string(),
            date_mode: "AccountingDate".to_string(),
            start_date: "30APR2025".to_string(),
            end_date: "30APR2025".to_string(),
        }
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn valid() -> Self {
        Self::new(DEFAULT_USERNAME, DEFAULT_PASSWORD)
    }

    pub fn invalid() -> Self {
        Self::new("WrongUser", "WrongPassword")
    }
}

// Keep the password out of logs and panic messages.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Defaults overridden by whatever the environment provides.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Applies `BASE_URL`, `TEST_USERNAME`, `TEST_PASSWORD`,
    /// `DEFAULT_TIMEOUT_MS`, `LOGIN_TIMEOUT_MS` and `HEADLESS`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup("BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(username) = lookup("TEST_USERNAME") {
            self.credentials.username = username;
        }
        if let Some(password) = lookup("TEST_PASSWORD") {
            self.credentials.password = password;
        }
        if let Some(raw) = lookup("DEFAULT_TIMEOUT_MS") {
            self.default_timeout_ms = parse_millis("DEFAULT_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("LOGIN_TIMEOUT_MS") {
            self.login_timeout_ms = parse_millis("LOGIN_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("HEADLESS") {
            self.browser.headless = !matches!(raw.trim(), "0" | "false" | "no");
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(E2eError::ConfigurationError(format!(
                "base_url must be http(s), got '{}'",
                self.base_url
            )));
        }
        let timeouts = [
            ("default_timeout_ms", self.default_timeout_ms),
            ("login_timeout_ms", self.login_timeout_ms),
            ("report_timeout_ms", self.report_timeout_ms),
            ("export_timeout_ms", self.export_timeout_ms),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, value)| *value == 0) {
            return Err(E2eError::ConfigurationError(format!(
                "{} must be greater than zero",
                name
            )));
        }
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_millis(self.login_timeout_ms)
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_millis(self.report_timeout_ms)
    }

    pub fn export_timeout(&self) -> Duration {
        Duration::from_millis(self.export_timeout_ms)
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|_| {
        E2eError::ConfigurationError(format!(
            "{} must be a number of milliseconds, got '{}'",
            key, raw
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_fall_back_when_environment_is_empty() {
        let mut config = Config::default();
        config.apply_env(env(&[])).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.credentials, Credentials::valid());
        assert_eq!(config.default_timeout(), Duration::from_secs(10));
        assert!(config.browser.headless);
        config.validate().unwrap();
    }

    #[test]
    fn environment_overrides_every_recognized_option() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("BASE_URL", "http://localhost:8080"),
                ("TEST_USERNAME", "alice"),
                ("TEST_PASSWORD", "s3cret"),
                ("DEFAULT_TIMEOUT_MS", "2500"),
                ("LOGIN_TIMEOUT_MS", "45000"),
                ("HEADLESS", "false"),
            ]))
            .unwrap();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.credentials, Credentials::new("alice", "s3cret"));
        assert_eq!(config.default_timeout_ms, 2500);
        assert_eq!(config.login_timeout(), Duration::from_secs(45));
        assert!(!config.browser.headless);
    }

    #[test]
    fn malformed_timeout_is_a_configuration_error() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[("DEFAULT_TIMEOUT_MS", "ten seconds")]))
            .unwrap_err();
        assert!(matches!(err, E2eError::ConfigurationError(_)));
    }

    #[test]
    fn validate_rejects_bad_urls_and_zero_timeouts() {
        let mut config = Config::default();
        config.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.base_url = "ftp://portal.test".to_string();
        assert!(matches!(
            config.validate(),
            Err(E2eError::ConfigurationError(_))
        ));

        let mut config = Config::default();
        config.login_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("login_timeout_ms"));
    }

    #[test]
    fn partial_config_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "base_url": "https://staging.portal.test", "browser": { "headless": false } }"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.base_url, "https://staging.portal.test");
        assert!(!config.browser.headless);
        assert_eq!(config.browser.viewport, Viewport::default());
        assert_eq!(config.export_timeout_ms, 600_000);
    }

    #[test]
    fn credentials_debug_hides_password() {
        let rendered = format!("{:?}", Credentials::valid());
        assert!(rendered.contains(DEFAULT_USERNAME));
        assert!(!rendered.contains(DEFAULT_PASSWORD));
    }
}
