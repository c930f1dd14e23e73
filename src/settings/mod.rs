//! Operator-editable settings, read through a TTL cache.
//!
//! The settings file is a flat JSON object merged over defaults on every
//! load, so partially-written files and older files with missing keys stay
//! readable. The cache serves stale-within-TTL copies and is passed
//! explicitly (`Arc<SettingsCache>`) to the components that need it; there
//! is no process-wide singleton.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Read(String),

    #[error("failed to write settings file: {0}")]
    Write(String),

    #[error("settings payload is not a JSON object")]
    NotAnObject,
}

/// Current operator settings. Every field has a safe default; secrets
/// default to empty, which puts the affected gateway in "not configured"
/// (test) mode instead of crashing anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub payment_gateway: String,
    pub phonepe_merchant_id: String,
    pub phonepe_salt_key: String,
    pub phonepe_salt_index: String,
    pub phonepe_base_url: String,
    pub payu_key: String,
    pub payu_salt: String,
    pub payu_base_url: String,
    pub application_fee: String,
    pub application_currency: String,
    pub application_name: String,
    pub site_url: String,
    pub sheet_id: String,
    pub sheet_name: String,
    pub sheets_api_token: String,
    pub admin_email: String,
    pub support_phone: String,
    pub support_email: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            payment_gateway: "phonepe".to_string(),
            phonepe_merchant_id: String::new(),
            phonepe_salt_key: String::new(),
            phonepe_salt_index: "1".to_string(),
            phonepe_base_url: "https://api-preprod.phonepe.com".to_string(),
            payu_key: String::new(),
            payu_salt: String::new(),
            payu_base_url: "https://test.payu.in".to_string(),
            application_fee: "250".to_string(),
            application_currency: "INR".to_string(),
            application_name: "Vaidya Jyothi Scholarship".to_string(),
            site_url: String::new(),
            sheet_id: String::new(),
            sheet_name: "Sheet1".to_string(),
            sheets_api_token: String::new(),
            admin_email: String::new(),
            support_phone: String::new(),
            support_email: String::new(),
        }
    }
}

/// Clock seam so cache-expiry behavior is testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Where settings are loaded from and persisted to.
pub trait SettingsSource: Send + Sync {
    fn load(&self) -> Settings;
    fn save(&self, patch: &JsonValue) -> Result<Settings, SettingsError>;
}

/// JSON file on disk, merged over defaults.
pub struct FileSettingsSource {
    path: PathBuf,
}

impl FileSettingsSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SettingsSource for FileSettingsSource {
    fn load(&self) -> Settings {
        match std::fs::read_to_string(&self.path) {
            Ok(data) => match serde_json::from_str::<Settings>(&data) {
                Ok(settings) => settings,
                Err(e) => {
                    error!(path = %self.path.display(), error = %e, "settings file is malformed, using defaults");
                    Settings::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "settings file absent, using defaults");
                Settings::default()
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to read settings file, using defaults");
                Settings::default()
            }
        }
    }

    fn save(&self, patch: &JsonValue) -> Result<Settings, SettingsError> {
        let patch = patch.as_object().ok_or(SettingsError::NotAnObject)?;

        let current = self.load();
        let mut merged = serde_json::to_value(&current)
            .map_err(|e| SettingsError::Write(e.to_string()))?;
        let merged_map = merged
            .as_object_mut()
            .expect("settings always serialize to an object");
        for (key, value) in patch {
            merged_map.insert(key.clone(), value.clone());
        }

        let updated: Settings = serde_json::from_value(merged)
            .map_err(|e| SettingsError::Write(e.to_string()))?;

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| SettingsError::Write(e.to_string()))?;
            }
        }
        let serialized = serde_json::to_string_pretty(&updated)
            .map_err(|e| SettingsError::Write(e.to_string()))?;
        std::fs::write(&self.path, serialized).map_err(|e| SettingsError::Write(e.to_string()))?;

        info!(path = %self.path.display(), "settings saved");
        Ok(updated)
    }
}

struct CacheEntry {
    loaded_at: DateTime<Utc>,
    settings: Settings,
}

/// TTL-cached view over a settings source.
pub struct SettingsCache {
    source: Box<dyn SettingsSource>,
    clock: Box<dyn Clock>,
    ttl: Duration,
    state: Mutex<Option<CacheEntry>>,
}

impl SettingsCache {
    pub fn new(source: Box<dyn SettingsSource>, ttl_secs: u64, clock: Box<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            ttl: Duration::seconds(ttl_secs as i64),
            state: Mutex::new(None),
        }
    }

    /// Current settings, possibly stale within the TTL.
    pub fn get(&self) -> Settings {
        let now = self.clock.now();
        let mut state = self.state.lock().expect("settings cache lock poisoned");

        if let Some(entry) = state.as_ref() {
            if now - entry.loaded_at < self.ttl {
                return entry.settings.clone();
            }
        }

        let settings = self.source.load();
        *state = Some(CacheEntry {
            loaded_at: now,
            settings: settings.clone(),
        });
        settings
    }

    /// Drop the cached copy; the next `get` reloads from the source.
    pub fn invalidate(&self) {
        let mut state = self.state.lock().expect("settings cache lock poisoned");
        *state = None;
    }

    /// Merge-save a patch through the source and refresh the cache.
    pub fn save(&self, patch: &JsonValue) -> Result<Settings, SettingsError> {
        let updated = self.source.save(patch)?;
        let mut state = self.state.lock().expect("settings cache lock poisoned");
        *state = Some(CacheEntry {
            loaded_at: self.clock.now(),
            settings: updated.clone(),
        });
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn new(start: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(start),
            }
        }
    }

    struct SharedClock(Arc<ManualClock>);

    impl Clock for SharedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.now.lock().unwrap()
        }
    }

    struct CountingSource {
        loads: Arc<AtomicUsize>,
        fee: String,
    }

    impl SettingsSource for CountingSource {
        fn load(&self) -> Settings {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Settings {
                application_fee: self.fee.clone(),
                ..Settings::default()
            }
        }

        fn save(&self, _patch: &JsonValue) -> Result<Settings, SettingsError> {
            Ok(Settings::default())
        }
    }

    #[test]
    fn cache_serves_stale_within_ttl_and_reloads_after() {
        let loads = Arc::new(AtomicUsize::new(0));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = SettingsCache::new(
            Box::new(CountingSource {
                loads: loads.clone(),
                fee: "250".to_string(),
            }),
            300,
            Box::new(SharedClock(clock.clone())),
        );

        assert_eq!(cache.get().application_fee, "250");
        assert_eq!(cache.get().application_fee, "250");
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        // Advance past the TTL; next get reloads.
        *clock.now.lock().unwrap() += Duration::seconds(301);
        cache.get();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn invalidate_forces_reload() {
        let loads = Arc::new(AtomicUsize::new(0));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = SettingsCache::new(
            Box::new(CountingSource {
                loads: loads.clone(),
                fee: "500".to_string(),
            }),
            300,
            Box::new(SharedClock(clock)),
        );

        cache.get();
        cache.invalidate();
        cache.get();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn file_source_merges_patch_over_existing_values() {
        let path = std::env::temp_dir().join(format!(
            "vjscholar-settings-{}.json",
            uuid::Uuid::new_v4().simple()
        ));
        let source = FileSettingsSource::new(&path);

        let first = source
            .save(&serde_json::json!({"applicationFee": "300"}))
            .expect("save should succeed");
        assert_eq!(first.application_fee, "300");

        let second = source
            .save(&serde_json::json!({"paymentGateway": "payu"}))
            .expect("save should succeed");
        assert_eq!(second.payment_gateway, "payu");
        // Earlier patch survives the merge.
        assert_eq!(second.application_fee, "300");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let source = FileSettingsSource::new("/nonexistent/vjscholar-settings.json");
        let settings = source.load();
        assert_eq!(settings.payment_gateway, "phonepe");
        assert!(settings.phonepe_salt_key.is_empty());
    }
}
