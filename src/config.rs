//! Application configuration from the environment.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dh_notify::BookingMailer;
use dh_smtp::{JsonFileSettingsStore, SettingsStore, SmtpClient, SmtpClientConfig, SmtpCredentials};

pub const DEFAULT_BUSINESS_NAME: &str = "DetailHub";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// `EnvFilter` directive string.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.into(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub business_name: String,
    /// JSON file of SMTP settings records. Without it only the `SMTP_*`
    /// fallback is used.
    pub settings_path: Option<PathBuf>,
    pub smtp: SmtpClientConfig,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            business_name: DEFAULT_BUSINESS_NAME.into(),
            settings_path: None,
            smtp: SmtpClientConfig::default(),
            log: LogConfig::default(),
        }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_flag(key: &str) -> Option<bool> {
    match env_non_empty(key)?.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    env_non_empty(key)?.parse::<u64>().ok().map(Duration::from_secs)
}

impl AppConfig {
    pub fn from_environment() -> Self {
        let mut cfg = Self::default();

        if let Some(name) = env_non_empty("DETAILHUB_BUSINESS_NAME") {
            cfg.business_name = name;
        }
        cfg.settings_path = env_non_empty("DETAILHUB_SMTP_SETTINGS").map(PathBuf::from);

        if let Some(domain) = env_non_empty("DETAILHUB_EHLO_DOMAIN") {
            cfg.smtp.ehlo_domain = domain;
        }
        if let Some(t) = env_secs("DETAILHUB_SMTP_CONNECT_TIMEOUT") {
            cfg.smtp.connect_timeout = t;
        }
        if let Some(t) = env_secs("DETAILHUB_SMTP_SEND_TIMEOUT") {
            cfg.smtp.send_timeout = t;
        }
        if let Some(verify) = env_flag("DETAILHUB_SMTP_VERIFY_CERTS") {
            cfg.smtp.verify_certificates = verify;
        }
        cfg.smtp.ca_cert_path = env_non_empty("DETAILHUB_SMTP_CA_CERT");
        cfg.smtp.fallback_credentials = SmtpCredentials::from_environment();

        if let Some(filter) = env_non_empty("DETAILHUB_LOG") {
            cfg.log.filter = filter;
        }
        if env_non_empty("DETAILHUB_LOG_FORMAT").as_deref() == Some("json") {
            cfg.log.format = LogFormat::Json;
        }
        cfg
    }

    pub fn settings_store(&self) -> Option<Arc<dyn SettingsStore>> {
        self.settings_path
            .as_ref()
            .map(|p| Arc::new(JsonFileSettingsStore::new(p)) as Arc<dyn SettingsStore>)
    }

    /// Must be called inside a Tokio runtime for settings to resolve in
    /// the background.
    pub fn build_client(&self) -> SmtpClient {
        SmtpClient::new(self.settings_store(), self.smtp.clone())
    }

    pub fn build_mailer(&self) -> Arc<BookingMailer> {
        Arc::new(BookingMailer::new(
            Arc::new(self.build_client()),
            self.business_name.clone(),
        ))
    }
}
