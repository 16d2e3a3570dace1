//! Startup settings and persisted preferences.
//!
//! Everything here is read once at startup into an immutable [`Settings`] value that is handed to
//! the controller. Preference writes happen only as explicit controller side effects.

use primordia_data::client::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT, SignalClientConfig};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Display,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use thiserror::Error;
use tracing::{debug, warn};

pub const ENV_API_URL: &str = "PRIMORDIA_API_URL";
pub const ENV_MAP_TOKEN: &str = "PRIMORDIA_MAP_TOKEN";
pub const ENV_POLL_SECS: &str = "PRIMORDIA_POLL_SECS";
pub const ENV_TIMEOUT_SECS: &str = "PRIMORDIA_TIMEOUT_SECS";
pub const ENV_PREFS_PATH: &str = "PRIMORDIA_PREFS_PATH";
pub const ENV_LOG_FILE: &str = "PRIMORDIA_LOG_FILE";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(120);
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(5);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_PREFS_PATH: &str = ".primordia/preferences.json";

/// Errors raised while persisting [`Preferences`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("preferences I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialise preferences: {0}")]
    Serialise(#[from] serde_json::Error),
}

/// Colour scheme of the terminal front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

/// User preferences persisted between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Preferences {
    pub theme: Theme,
    /// Set once the user has joined the waitlist; gates the dashboard.
    pub access_granted: bool,
}

impl Preferences {
    /// Load preferences, falling back to defaults when the file is missing or unreadable.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no preferences file, using defaults");
                return Self::default();
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to read preferences, using defaults");
                return Self::default();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|error| {
            warn!(path = %path.display(), %error, "invalid preferences file, using defaults");
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(io_error)
    }
}

/// Polling cadence and failure backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Period between polls of the selected region
    pub interval: Duration,
    /// Delay before the first retry after a failed poll
    pub backoff_base: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl PollPolicy {
    /// Set poll interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set backoff base delay
    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    /// Delay before the next attempt after `consecutive_failures` failed polls.
    ///
    /// Doubles from `backoff_base` and never exceeds the regular interval.
    pub fn backoff_delay(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return self.interval;
        }
        let exponent = (consecutive_failures - 1).min(16);
        self.backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.interval)
    }
}

/// Immutable startup configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    pub client: SignalClientConfig,
    pub poll: PollPolicy,
    /// Map-provider access token. Absent means the map panel renders a placeholder.
    pub map_token: Option<String>,
    /// Where [`Preferences`] are persisted, `None` disables persistence.
    pub preferences_path: Option<PathBuf>,
    /// Preferences as loaded at startup.
    pub preferences: Preferences,
    pub log_file: Option<PathBuf>,
}

impl Settings {
    /// Log file named by the process environment.
    ///
    /// Read ahead of [`Settings::from_env`] so logging is installed before settings are parsed
    /// and their warnings are not lost.
    pub fn log_file_from_env() -> Option<PathBuf> {
        Self::log_file_from_lookup(|name| std::env::var(name).ok())
    }

    pub fn log_file_from_lookup<F>(lookup: F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(ENV_LOG_FILE)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    }

    /// Read settings from the process environment and load the preferences file.
    pub fn from_env() -> Self {
        let settings = Self::from_lookup(|name| std::env::var(name).ok());
        let preferences = settings
            .preferences_path
            .as_deref()
            .map(Preferences::load)
            .unwrap_or_default();

        Self {
            preferences,
            ..settings
        }
    }

    /// Build settings from an arbitrary variable lookup without touching the filesystem.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let base_url = var(ENV_API_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout = Duration::from_secs(parse_or(
            ENV_TIMEOUT_SECS,
            var(ENV_TIMEOUT_SECS),
            DEFAULT_REQUEST_TIMEOUT.as_secs(),
        ));
        let mut interval = Duration::from_secs(parse_or(
            ENV_POLL_SECS,
            var(ENV_POLL_SECS),
            DEFAULT_POLL_INTERVAL.as_secs(),
        ));
        if interval > MAX_POLL_INTERVAL {
            warn!(
                name = ENV_POLL_SECS,
                ?interval,
                max = ?MAX_POLL_INTERVAL,
                "poll interval too long, capping"
            );
            interval = MAX_POLL_INTERVAL;
        }

        Self {
            client: SignalClientConfig::new(base_url).with_timeout(timeout),
            poll: PollPolicy::default().with_interval(interval),
            map_token: var(ENV_MAP_TOKEN),
            preferences_path: Some(
                var(ENV_PREFS_PATH)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_PREFS_PATH)),
            ),
            preferences: Preferences::default(),
            log_file: Self::log_file_from_lookup(&lookup),
        }
    }
}

/// Parse a positive value, warning and falling back to `default` on anything else.
fn parse_or<T>(name: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + PartialOrd + Default + Display + Copy,
{
    let Some(raw) = raw else {
        return default;
    };

    match raw.parse::<T>() {
        Ok(value) if value > T::default() => value,
        _ => {
            warn!(name, value = %raw, %default, "invalid setting, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("primordia-config-{}-{name}", std::process::id()))
            .join("preferences.json")
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::from_lookup(lookup(&[]));

        assert_eq!(settings.client.base_url, "http://localhost:8000");
        assert_eq!(settings.client.timeout, Duration::from_secs(10));
        assert_eq!(settings.poll.interval, Duration::from_secs(120));
        assert_eq!(settings.map_token, None);
        assert_eq!(
            settings.preferences_path,
            Some(PathBuf::from(".primordia/preferences.json"))
        );
        assert_eq!(settings.log_file, None);
    }

    #[test]
    fn test_settings_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            (ENV_API_URL, " https://api.primordia.dev "),
            (ENV_MAP_TOKEN, "pk.abc"),
            (ENV_POLL_SECS, "30"),
            (ENV_TIMEOUT_SECS, "4"),
            (ENV_PREFS_PATH, "/tmp/prefs.json"),
            (ENV_LOG_FILE, "/tmp/primordia.log"),
        ]));

        assert_eq!(settings.client.base_url, "https://api.primordia.dev");
        assert_eq!(settings.client.timeout, Duration::from_secs(4));
        assert_eq!(settings.poll.interval, Duration::from_secs(30));
        assert_eq!(settings.map_token.as_deref(), Some("pk.abc"));
        assert_eq!(settings.preferences_path, Some(PathBuf::from("/tmp/prefs.json")));
        assert_eq!(settings.log_file, Some(PathBuf::from("/tmp/primordia.log")));
    }

    #[test]
    fn test_settings_invalid_values_fall_back() {
        let settings = Settings::from_lookup(lookup(&[
            (ENV_POLL_SECS, "soon"),
            (ENV_TIMEOUT_SECS, "0"),
            (ENV_MAP_TOKEN, "   "),
        ]));

        assert_eq!(settings.poll.interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(settings.client.timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(settings.map_token, None);
    }

    #[test]
    fn test_settings_poll_interval_capped() {
        struct TestCase {
            raw: &'static str,
            expected: Duration,
        }

        let tests = vec![
            TestCase { raw: "86400", expected: Duration::from_secs(86400) },
            TestCase { raw: "86401", expected: MAX_POLL_INTERVAL },
            TestCase { raw: "18446744073709551615", expected: MAX_POLL_INTERVAL },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let settings = Settings::from_lookup(lookup(&[(ENV_POLL_SECS, test.raw)]));
            assert_eq!(settings.poll.interval, test.expected, "TC{} failed", index);
            assert_eq!(settings.poll.backoff_delay(1), DEFAULT_BACKOFF_BASE, "TC{} failed", index);
        }
    }

    #[test]
    fn test_log_file_readable_before_settings() {
        let vars = lookup(&[(ENV_LOG_FILE, " /tmp/primordia.log "), (ENV_POLL_SECS, "soon")]);

        assert_eq!(
            Settings::log_file_from_lookup(&vars),
            Some(PathBuf::from("/tmp/primordia.log"))
        );
        assert_eq!(Settings::from_lookup(&vars).log_file, Settings::log_file_from_lookup(&vars));
        assert_eq!(Settings::log_file_from_lookup(lookup(&[(ENV_LOG_FILE, "  ")])), None);
    }

    #[test]
    fn test_backoff_delay() {
        struct TestCase {
            failures: u32,
            expected: Duration,
        }

        let policy = PollPolicy::default();
        let tests = vec![
            TestCase { failures: 0, expected: Duration::from_secs(120) },
            TestCase { failures: 1, expected: Duration::from_secs(5) },
            TestCase { failures: 2, expected: Duration::from_secs(10) },
            TestCase { failures: 3, expected: Duration::from_secs(20) },
            TestCase { failures: 5, expected: Duration::from_secs(80) },
            TestCase { failures: 6, expected: Duration::from_secs(120) },
            TestCase { failures: 500, expected: Duration::from_secs(120) },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = policy.backoff_delay(test.failures);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_preferences_round_trip() {
        let path = temp_path("round-trip");
        let preferences = Preferences {
            theme: Theme::Light,
            access_granted: true,
        };

        preferences.save(&path).unwrap();
        assert_eq!(Preferences::load(&path), preferences);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_preferences_missing_or_corrupt_default() {
        let path = temp_path("corrupt");
        assert_eq!(Preferences::load(&path), Preferences::default());

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(Preferences::load(&path), Preferences::default());

        // Unknown and missing fields are tolerated
        std::fs::write(&path, r#"{"theme":"light","beta":true}"#).unwrap();
        assert_eq!(
            Preferences::load(&path),
            Preferences {
                theme: Theme::Light,
                access_granted: false,
            }
        );

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
