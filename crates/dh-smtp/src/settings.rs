//! SMTP settings lookup.
//!
//! Settings live in an external store; the client asks it for the most
//! recently created active record and falls back to configured
//! credentials when there is none or the store cannot be reached.

use std::path::PathBuf;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::RwLock;

use crate::types::*;

/// Source of persisted SMTP settings records.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// The active record with the latest `created_at`, if any.
    async fn latest_active_smtp(&self) -> SmtpResult<Option<SmtpSettingsRecord>>;
}

fn latest_active(records: &[SmtpSettingsRecord]) -> Option<SmtpSettingsRecord> {
    records
        .iter()
        .filter(|r| r.is_active)
        .max_by_key(|r| r.created_at)
        .cloned()
}

// ─── In-memory store ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    records: RwLock<Vec<SmtpSettingsRecord>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<SmtpSettingsRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn insert(&self, record: SmtpSettingsRecord) {
        self.records.write().await.push(record);
    }

    /// Deactivate every record.
    pub async fn deactivate_all(&self) {
        for r in self.records.write().await.iter_mut() {
            r.is_active = false;
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn latest_active_smtp(&self) -> SmtpResult<Option<SmtpSettingsRecord>> {
        Ok(latest_active(&self.records.read().await))
    }
}

// ─── JSON file store ────────────────────────────────────────────────

/// Reads a JSON array of settings records from disk on every lookup.
#[derive(Debug, Clone)]
pub struct JsonFileSettingsStore {
    path: PathBuf,
}

impl JsonFileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettingsStore {
    async fn latest_active_smtp(&self) -> SmtpResult<Option<SmtpSettingsRecord>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Settings file {} does not exist", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(SmtpError::config(format!(
                    "Failed to read settings file {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        let records: Vec<SmtpSettingsRecord> = serde_json::from_str(&raw).map_err(|e| {
            SmtpError::config(format!(
                "Invalid settings file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(latest_active(&records))
    }
}

// ─── Resolution ─────────────────────────────────────────────────────

/// Store record first, then `fallback`. Store errors are logged, not
/// returned, so an unreachable store still lets the fallback apply.
pub async fn resolve_credentials(
    store: Option<&dyn SettingsStore>,
    fallback: Option<&SmtpCredentials>,
) -> SmtpResult<SmtpCredentials> {
    if let Some(store) = store {
        match store.latest_active_smtp().await {
            Ok(Some(record)) => {
                info!(
                    "Using stored SMTP settings for {}:{}",
                    record.host, record.port
                );
                return Ok(SmtpCredentials::from_record(&record));
            }
            Ok(None) => debug!("No active SMTP settings record"),
            Err(e) => warn!("Settings store lookup failed: {}", e),
        }
    }
    match fallback {
        Some(creds) => {
            info!("Using fallback SMTP settings for {}:{}", creds.host, creds.port);
            Ok(creds.clone())
        }
        None => Err(SmtpError::config(
            "No SMTP settings available: no active settings record and no fallback configured",
        )),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::io::Write;

    fn record(host: &str, active: bool, age_hours: i64) -> SmtpSettingsRecord {
        SmtpSettingsRecord {
            id: Some(host.into()),
            host: host.into(),
            port: 587,
            username: "mailer".into(),
            password: "secret".into(),
            from_name: "Shine Auto Spa".into(),
            from_address: "bookings@example.com".into(),
            secure: None,
            is_active: active,
            created_at: Utc::now() - Duration::hours(age_hours),
        }
    }

    fn fallback() -> SmtpCredentials {
        SmtpCredentials {
            host: "fallback.example.com".into(),
            port: 465,
            username: "env".into(),
            password: "env".into(),
            use_implicit_tls: true,
            from_name: "DetailHub".into(),
            from_address: "env@example.com".into(),
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl SettingsStore for BrokenStore {
        async fn latest_active_smtp(&self) -> SmtpResult<Option<SmtpSettingsRecord>> {
            Err(SmtpError::transport("database unreachable"))
        }
    }

    #[tokio::test]
    async fn newest_active_record_wins() {
        let store = MemorySettingsStore::with_records(vec![
            record("old.example.com", true, 48),
            record("new.example.com", true, 1),
            record("inactive.example.com", false, 0),
        ]);
        let latest = store.latest_active_smtp().await.unwrap().unwrap();
        assert_eq!(latest.host, "new.example.com");
    }

    #[tokio::test]
    async fn no_active_records() {
        let store = MemorySettingsStore::new();
        store.insert(record("a.example.com", false, 0)).await;
        assert!(store.latest_active_smtp().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deactivate_all_hides_records() {
        let store = MemorySettingsStore::with_records(vec![record("a.example.com", true, 0)]);
        store.deactivate_all().await;
        assert!(store.latest_active_smtp().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_record_preferred_over_fallback() {
        let store = MemorySettingsStore::with_records(vec![record("db.example.com", true, 0)]);
        let fb = fallback();
        let creds = resolve_credentials(Some(&store), Some(&fb)).await.unwrap();
        assert_eq!(creds.host, "db.example.com");
        assert!(!creds.use_implicit_tls);
    }

    #[tokio::test]
    async fn fallback_when_store_empty() {
        let store = MemorySettingsStore::new();
        let fb = fallback();
        let creds = resolve_credentials(Some(&store), Some(&fb)).await.unwrap();
        assert_eq!(creds.host, "fallback.example.com");
    }

    #[tokio::test]
    async fn fallback_when_store_fails() {
        let fb = fallback();
        let creds = resolve_credentials(Some(&BrokenStore), Some(&fb)).await.unwrap();
        assert_eq!(creds, fb);
    }

    #[tokio::test]
    async fn nothing_available_is_config_error() {
        let err = resolve_credentials(Some(&BrokenStore), None).await.unwrap_err();
        assert_eq!(err.kind, SmtpErrorKind::Configuration);
        let err = resolve_credentials(None, None).await.unwrap_err();
        assert_eq!(err.kind, SmtpErrorKind::Configuration);
    }

    #[tokio::test]
    async fn json_file_store_reads_camel_case() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"host":"old.example.com","port":587,"username":"u","password":"p",
                  "fromName":"Old","fromAddress":"old@example.com","isActive":true,
                  "createdAt":"2024-01-01T00:00:00Z"}},
                {{"host":"smtps.example.com","port":465,"username":"u","password":"p",
                  "fromName":"New","fromAddress":"new@example.com","isActive":true,
                  "createdAt":"2024-06-01T00:00:00Z"}}
            ]"#
        )
        .unwrap();
        let store = JsonFileSettingsStore::new(file.path());
        let latest = store.latest_active_smtp().await.unwrap().unwrap();
        assert_eq!(latest.host, "smtps.example.com");
        assert!(SmtpCredentials::from_record(&latest).use_implicit_tls);
    }

    #[tokio::test]
    async fn json_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSettingsStore::new(dir.path().join("smtp.json"));
        assert!(store.latest_active_smtp().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn json_file_store_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let store = JsonFileSettingsStore::new(file.path());
        let err = store.latest_active_smtp().await.unwrap_err();
        assert_eq!(err.kind, SmtpErrorKind::Configuration);
    }
}
