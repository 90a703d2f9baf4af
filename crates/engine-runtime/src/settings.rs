use connectors::{file::csv::HeaderPolicy, storage::PublicUrl};
use engine_core::{fetcher::CursorPolicy, retry::RetryPolicy};
use serde::Serialize;
use std::{collections::HashMap, fmt, path::PathBuf, str::FromStr, time::Duration};
use thiserror::Error;

pub const DB_URI: &str = "DB_URI";
pub const CURSOR_POLICY: &str = "CURSOR_POLICY";
pub const STATE_BACKEND: &str = "STATE_BACKEND";
pub const STATE_PATH: &str = "STATE_PATH";
pub const STAGING_DIR: &str = "STAGING_DIR";
pub const STORAGE_URL: &str = "STORAGE_URL";
pub const STORAGE_PREFIX: &str = "STORAGE_PREFIX";
pub const PUBLIC_BASE_URL: &str = "PUBLIC_BASE_URL";
pub const PUBLIC_URL_SUFFIX: &str = "PUBLIC_URL_SUFFIX";
pub const HEADER_POLICY: &str = "HEADER_POLICY";
pub const MAX_CONCURRENCY: &str = "MAX_CONCURRENCY";
pub const FETCH_TIMEOUT_SECS: &str = "FETCH_TIMEOUT_SECS";
pub const APPEND_TIMEOUT_SECS: &str = "APPEND_TIMEOUT_SECS";
pub const PUBLISH_TIMEOUT_SECS: &str = "PUBLISH_TIMEOUT_SECS";
pub const RETRY_ATTEMPTS: &str = "RETRY_ATTEMPTS";

const DEFAULT_STAGING_DIR: &str = "staging";
const DEFAULT_JSON_STATE_FILE: &str = "snapshot.json";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors raised while assembling the sync settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A required variable was not set.
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    /// A variable was set to something that cannot be used.
    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Could not determine home directory")]
    NoHomeDir,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    #[default]
    Sled,
    Json,
}

impl FromStr for StateBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sled" => Ok(StateBackend::Sled),
            "json" | "file" => Ok(StateBackend::Json),
            other => Err(format!("Unknown state backend: {other}")),
        }
    }
}

impl fmt::Display for StateBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateBackend::Sled => f.write_str("sled"),
            StateBackend::Json => f.write_str("json"),
        }
    }
}

/// Where cursors live. Enough for commands that never touch the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSettings {
    pub backend: StateBackend,
    pub path: Option<PathBuf>,
}

impl StoreSettings {
    pub fn from_env(vars: &HashMap<String, String>) -> Result<Self, SettingsError> {
        Ok(StoreSettings {
            backend: parse_or(vars, STATE_BACKEND, StateBackend::default())?,
            path: lookup(vars, STATE_PATH).map(PathBuf::from),
        })
    }

    /// Sled defaults to `~/.docsync/state`, the JSON file to `snapshot.json`
    /// in the working directory.
    pub fn resolved_path(&self) -> Result<PathBuf, SettingsError> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }

        match self.backend {
            StateBackend::Sled => {
                let home = dirs::home_dir().ok_or(SettingsError::NoHomeDir)?;
                Ok(home.join(".docsync/state"))
            }
            StateBackend::Json => Ok(PathBuf::from(DEFAULT_JSON_STATE_FILE)),
        }
    }
}

/// Deadlines for each suspension point of a sync unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub fetch: Duration,
    pub append: Duration,
    pub publish: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            fetch: DEFAULT_TIMEOUT,
            append: DEFAULT_TIMEOUT,
            publish: DEFAULT_TIMEOUT,
        }
    }
}

/// Everything the orchestrator needs to know about one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub cursor_policy: CursorPolicy,
    pub header_policy: HeaderPolicy,
    pub staging_dir: PathBuf,
    /// Upper bound on datasets in flight; `0` means unbounded.
    pub max_concurrency: usize,
    pub timeouts: Timeouts,
    pub retry: RetryPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            cursor_policy: CursorPolicy::default(),
            header_policy: HeaderPolicy::default(),
            staging_dir: PathBuf::from(DEFAULT_STAGING_DIR),
            max_concurrency: 0,
            timeouts: Timeouts::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Settings read from the environment (and an optional `.env` file).
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub db_uri: String,
    pub store: StoreSettings,
    pub storage_url: String,
    pub storage_prefix: Option<String>,
    pub public_base_url: Option<String>,
    pub public_url_suffix: Option<String>,
    pub run: RunOptions,
}

impl SyncSettings {
    pub fn from_env(vars: &HashMap<String, String>) -> Result<Self, SettingsError> {
        let defaults = RunOptions::default();

        let retry_attempts: usize = parse_or(vars, RETRY_ATTEMPTS, defaults.retry.max_attempts)?;
        if retry_attempts == 0 {
            return Err(invalid(RETRY_ATTEMPTS, "0", "at least one attempt is required"));
        }

        let run = RunOptions {
            cursor_policy: parse_or(vars, CURSOR_POLICY, defaults.cursor_policy)?,
            header_policy: parse_or(vars, HEADER_POLICY, defaults.header_policy)?,
            staging_dir: lookup(vars, STAGING_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
            max_concurrency: parse_or(vars, MAX_CONCURRENCY, defaults.max_concurrency)?,
            timeouts: Timeouts {
                fetch: parse_timeout(vars, FETCH_TIMEOUT_SECS)?,
                append: parse_timeout(vars, APPEND_TIMEOUT_SECS)?,
                publish: parse_timeout(vars, PUBLISH_TIMEOUT_SECS)?,
            },
            retry: defaults.retry.with_max_attempts(retry_attempts),
        };

        Ok(SyncSettings {
            db_uri: db_uri_from_env(vars)?,
            store: StoreSettings::from_env(vars)?,
            storage_url: require(vars, STORAGE_URL)?,
            storage_prefix: lookup(vars, STORAGE_PREFIX),
            public_base_url: lookup(vars, PUBLIC_BASE_URL),
            public_url_suffix: lookup(vars, PUBLIC_URL_SUFFIX),
            run,
        })
    }

    /// Public URL override; `None` keeps the backend default.
    pub fn public_url(&self) -> Option<PublicUrl> {
        self.public_base_url.as_ref().map(|base| {
            PublicUrl::new(
                base.clone(),
                self.public_url_suffix.clone().unwrap_or_default(),
            )
        })
    }
}

/// Connection string of the document store.
pub fn db_uri_from_env(vars: &HashMap<String, String>) -> Result<String, SettingsError> {
    require(vars, DB_URI)
}

fn lookup(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn require(vars: &HashMap<String, String>, key: &'static str) -> Result<String, SettingsError> {
    lookup(vars, key).ok_or(SettingsError::Missing(key))
}

fn parse_or<T>(
    vars: &HashMap<String, String>,
    key: &'static str,
    default: T,
) -> Result<T, SettingsError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(vars, key) {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| invalid(key, &raw, &e.to_string())),
        None => Ok(default),
    }
}

fn parse_timeout(
    vars: &HashMap<String, String>,
    key: &'static str,
) -> Result<Duration, SettingsError> {
    let secs: u64 = parse_or(vars, key, DEFAULT_TIMEOUT.as_secs())?;
    if secs == 0 {
        return Err(invalid(key, "0", "timeout must be positive"));
    }
    Ok(Duration::from_secs(secs))
}

fn invalid(key: &'static str, value: &str, reason: &str) -> SettingsError {
    SettingsError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            (DB_URI, "mongodb://localhost:27017"),
            (STORAGE_URL, "gcs://daxsome.appspot.com"),
        ]
    }

    #[test]
    fn defaults_apply() {
        let settings = SyncSettings::from_env(&vars(&minimal())).unwrap();
        assert_eq!(settings.store.backend, StateBackend::Sled);
        assert_eq!(settings.run.cursor_policy, CursorPolicy::Identifier);
        assert_eq!(settings.run.header_policy, HeaderPolicy::FirstDocument);
        assert_eq!(settings.run.max_concurrency, 0);
        assert_eq!(settings.run.retry.max_attempts, 3);
        assert_eq!(settings.run.timeouts, Timeouts::default());
        assert!(settings.public_url().is_none());
    }

    #[test]
    fn missing_db_uri_is_reported() {
        let err = SyncSettings::from_env(&vars(&[(STORAGE_URL, "memory://")])).unwrap_err();
        assert!(matches!(err, SettingsError::Missing(DB_URI)));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = minimal();
        pairs.extend([
            (CURSOR_POLICY, "freshness"),
            (STATE_BACKEND, "json"),
            (HEADER_POLICY, "union"),
            (MAX_CONCURRENCY, "4"),
            (FETCH_TIMEOUT_SECS, "10"),
            (RETRY_ATTEMPTS, "5"),
            (PUBLIC_BASE_URL, "https://cdn.example.com"),
        ]);

        let settings = SyncSettings::from_env(&vars(&pairs)).unwrap();
        assert_eq!(settings.run.cursor_policy, CursorPolicy::Freshness);
        assert_eq!(settings.store.backend, StateBackend::Json);
        assert_eq!(settings.run.header_policy, HeaderPolicy::BatchUnion);
        assert_eq!(settings.run.max_concurrency, 4);
        assert_eq!(settings.run.timeouts.fetch, Duration::from_secs(10));
        assert_eq!(settings.run.retry.max_attempts, 5);
        assert_eq!(
            settings.store.resolved_path().unwrap(),
            PathBuf::from("snapshot.json")
        );
        assert_eq!(
            settings.public_url().unwrap().for_object("a/b.csv"),
            "https://cdn.example.com/a%2Fb.csv"
        );
    }

    #[test]
    fn store_settings_need_no_connection_strings() {
        let store = StoreSettings::from_env(&vars(&[
            (STATE_BACKEND, "sled"),
            (STATE_PATH, "/var/lib/docsync"),
        ]))
        .unwrap();
        assert_eq!(store.resolved_path().unwrap(), PathBuf::from("/var/lib/docsync"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        for (key, value) in [
            (CURSOR_POLICY, "offset"),
            (MAX_CONCURRENCY, "-1"),
            (PUBLISH_TIMEOUT_SECS, "0"),
            (RETRY_ATTEMPTS, "0"),
        ] {
            let mut pairs = minimal();
            pairs.push((key, value));
            let err = SyncSettings::from_env(&vars(&pairs)).unwrap_err();
            assert!(
                matches!(err, SettingsError::Invalid { key: k, .. } if k == key),
                "{key}={value} should be invalid"
            );
        }
    }
}
