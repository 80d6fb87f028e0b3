//! Configuration for the chew gate.
//!
//! All tunables are bounded. Mutation goes through setters that reject
//! out-of-range values and leave the previous value in place, so a `Config`
//! always satisfies `threshold <= floor(window_length / sampling_interval)`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Fixed sampling cadence.
pub const SAMPLING_INTERVAL: Duration = Duration::from_millis(250);

pub const DEFAULT_WINDOW_SECS: u64 = 5;
pub const MIN_WINDOW_SECS: u64 = 1;
pub const MAX_WINDOW_SECS: u64 = 30;

pub const DEFAULT_THRESHOLD: u32 = 3;
pub const MIN_THRESHOLD: u32 = 1;

pub const DEFAULT_REWARD_SECS: u64 = 30;
pub const MIN_REWARD_SECS: u64 = 5;
pub const MAX_REWARD_SECS: u64 = 45;

pub const DEFAULT_SENSITIVITY: f64 = 6.0;
pub const DEFAULT_AREA_RATIO_CUTOFF: f64 = 2.0;

/// Which signal strategy the engine builds at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Compare a scalar jaw-openness metric against the sensitivity.
    Threshold,
    /// Compare relative change of the mouth contour area between frames.
    AreaRatio,
}

impl SignalKind {
    /// Parse a signal kind from a CLI-style string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "threshold" => Some(SignalKind::Threshold),
            "area_ratio" | "area" => Some(SignalKind::AreaRatio),
            _ => None,
        }
    }
}

/// How qualifying events are counted inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountPolicy {
    /// Count false -> true transitions only.
    RisingEdge,
    /// Count every tick whose sample was true.
    TotalSamples,
}

/// Main configuration for the chew gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(with = "duration_serde")]
    sampling_interval: Duration,

    #[serde(with = "duration_serde")]
    window_length: Duration,

    /// Qualifying events required per window
    threshold: u32,

    #[serde(with = "duration_serde")]
    reward_length: Duration,

    /// Cutoff for the threshold strategy (compared as `m > sensitivity * 0.5`)
    sensitivity: f64,

    /// Cutoff for the area-ratio strategy
    area_ratio_cutoff: f64,

    signal: SignalKind,

    count_policy: CountPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sampling_interval: SAMPLING_INTERVAL,
            window_length: Duration::from_secs(DEFAULT_WINDOW_SECS),
            threshold: DEFAULT_THRESHOLD,
            reward_length: Duration::from_secs(DEFAULT_REWARD_SECS),
            sensitivity: DEFAULT_SENSITIVITY,
            area_ratio_cutoff: DEFAULT_AREA_RATIO_CUTOFF,
            signal: SignalKind::AreaRatio,
            count_policy: CountPolicy::RisingEdge,
        }
    }
}

impl Config {
    pub fn sampling_interval(&self) -> Duration {
        self.sampling_interval
    }

    pub fn window_length(&self) -> Duration {
        self.window_length
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn reward_length(&self) -> Duration {
        self.reward_length
    }

    pub fn sensitivity(&self) -> f64 {
        self.sensitivity
    }

    pub fn area_ratio_cutoff(&self) -> f64 {
        self.area_ratio_cutoff
    }

    pub fn signal(&self) -> SignalKind {
        self.signal
    }

    pub fn count_policy(&self) -> CountPolicy {
        self.count_policy
    }

    /// Largest threshold the current window can satisfy:
    /// `floor(window_length / sampling_interval)`.
    pub fn threshold_ceiling(&self) -> u32 {
        ceiling_for(self.window_length, self.sampling_interval)
    }

    /// Set the compliance threshold.
    ///
    /// Returns `false` and keeps the previous value if `threshold` is outside
    /// `[1, threshold_ceiling()]`.
    pub fn set_threshold(&mut self, threshold: u32) -> bool {
        if threshold < MIN_THRESHOLD || threshold > self.threshold_ceiling() {
            return false;
        }
        self.threshold = threshold;
        true
    }

    /// Step the threshold up or down, with the same bounds as `set_threshold`.
    pub fn increment_threshold(&mut self, by: i64) -> bool {
        let next = i64::from(self.threshold) + by;
        match u32::try_from(next) {
            Ok(next) => self.set_threshold(next),
            Err(_) => false,
        }
    }

    /// Set the window length.
    ///
    /// Rejected outside `[1s, 30s]`. A shorter window clamps the threshold
    /// down to the new ceiling.
    pub fn set_window_length(&mut self, window_length: Duration) -> bool {
        if window_length < Duration::from_secs(MIN_WINDOW_SECS)
            || window_length > Duration::from_secs(MAX_WINDOW_SECS)
        {
            return false;
        }
        self.window_length = window_length;

        let ceiling = self.threshold_ceiling();
        if self.threshold > ceiling {
            self.threshold = ceiling;
        }
        true
    }

    /// Step the window length by whole seconds.
    pub fn increment_window_length(&mut self, by_secs: i64) -> bool {
        let next = self.window_length.as_secs() as i64 + by_secs;
        if next < 0 {
            return false;
        }
        self.set_window_length(Duration::from_secs(next as u64))
    }

    /// Set the reward length. Rejected outside `[5s, 45s]`.
    pub fn set_reward_length(&mut self, reward_length: Duration) -> bool {
        if reward_length < Duration::from_secs(MIN_REWARD_SECS)
            || reward_length > Duration::from_secs(MAX_REWARD_SECS)
        {
            return false;
        }
        self.reward_length = reward_length;
        true
    }

    /// Set the detection sensitivity. Any finite value is accepted.
    pub fn set_sensitivity(&mut self, sensitivity: f64) -> bool {
        if !sensitivity.is_finite() {
            return false;
        }
        self.sensitivity = sensitivity;
        true
    }

    /// Set the area-ratio cutoff. Must be finite and non-negative.
    pub fn set_area_ratio_cutoff(&mut self, cutoff: f64) -> bool {
        if !cutoff.is_finite() || cutoff < 0.0 {
            return false;
        }
        self.area_ratio_cutoff = cutoff;
        true
    }

    pub fn set_signal(&mut self, signal: SignalKind) {
        self.signal = signal;
    }

    pub fn set_count_policy(&mut self, policy: CountPolicy) {
        self.count_policy = policy;
    }

    /// Restore threshold and window length to their defaults.
    pub fn reset(&mut self) {
        self.threshold = DEFAULT_THRESHOLD;
        self.window_length = Duration::from_secs(DEFAULT_WINDOW_SECS);
    }

    /// Human readable summary, e.g. "3 chews per 5 sec".
    pub fn summary(&self) -> String {
        format!(
            "{} chews per {} sec",
            self.threshold,
            self.window_length.as_secs()
        )
    }

    /// Clamp every field into its bounds.
    ///
    /// Used after loading a file that may have been edited by hand.
    pub fn sanitized(mut self) -> Self {
        self.sampling_interval = SAMPLING_INTERVAL;
        self.window_length = clamp_duration(
            self.window_length,
            Duration::from_secs(MIN_WINDOW_SECS),
            Duration::from_secs(MAX_WINDOW_SECS),
        );
        self.reward_length = clamp_duration(
            self.reward_length,
            Duration::from_secs(MIN_REWARD_SECS),
            Duration::from_secs(MAX_REWARD_SECS),
        );
        self.threshold = self
            .threshold
            .clamp(MIN_THRESHOLD, self.threshold_ceiling());
        if !self.sensitivity.is_finite() {
            self.sensitivity = DEFAULT_SENSITIVITY;
        }
        if !self.area_ratio_cutoff.is_finite() || self.area_ratio_cutoff < 0.0 {
            self.area_ratio_cutoff = DEFAULT_AREA_RATIO_CUTOFF;
        }
        self
    }

    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
        Ok(config.sanitized())
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`, creating the parent directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chew-gate")
            .join("config.json")
    }
}

fn ceiling_for(window_length: Duration, sampling_interval: Duration) -> u32 {
    let step = sampling_interval.as_nanos();
    if step == 0 {
        return MIN_THRESHOLD;
    }
    u32::try_from(window_length.as_nanos() / step).unwrap_or(u32::MAX)
}

fn clamp_duration(value: Duration, min: Duration, max: Duration) -> Duration {
    value.max(min).min(max)
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Serde support for Duration as fractional seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(serde::de::Error::custom(format!(
                "duration must be a non-negative number of seconds, got {secs}"
            )));
        }
        // Saturate oversized values; `Config::sanitized` clamps them into bounds.
        Ok(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sampling_interval(), Duration::from_millis(250));
        assert_eq!(config.window_length(), Duration::from_secs(5));
        assert_eq!(config.threshold(), 3);
        assert_eq!(config.reward_length(), Duration::from_secs(30));
        assert_eq!(config.sensitivity(), 6.0);
        assert_eq!(config.count_policy(), CountPolicy::RisingEdge);
        assert_eq!(config.threshold_ceiling(), 20);
    }

    #[test]
    fn test_threshold_above_ceiling_is_rejected() {
        let mut config = Config::default();
        assert!(!config.set_threshold(25));
        assert_eq!(config.threshold(), 3);

        assert!(config.set_threshold(20));
        assert_eq!(config.threshold(), 20);
        assert!(!config.set_threshold(0));
        assert_eq!(config.threshold(), 20);
    }

    #[test]
    fn test_shorter_window_clamps_threshold() {
        let mut config = Config::default();
        assert!(config.set_threshold(18));

        // 2s / 0.25s = 8
        assert!(config.set_window_length(Duration::from_secs(2)));
        assert_eq!(config.threshold(), 8);
        assert!(config.threshold() <= config.threshold_ceiling());
    }

    #[test]
    fn test_window_and_reward_bounds() {
        let mut config = Config::default();
        assert!(!config.set_window_length(Duration::from_secs(31)));
        assert!(!config.set_window_length(Duration::from_millis(500)));
        assert_eq!(config.window_length(), Duration::from_secs(5));

        assert!(!config.set_reward_length(Duration::from_secs(4)));
        assert!(!config.set_reward_length(Duration::from_secs(46)));
        assert!(config.set_reward_length(Duration::from_secs(45)));
        assert_eq!(config.reward_length(), Duration::from_secs(45));
    }

    #[test]
    fn test_stepwise_mutation() {
        let mut config = Config::default();
        assert!(config.increment_threshold(1));
        assert_eq!(config.threshold(), 4);
        assert!(!config.increment_threshold(-10));
        assert_eq!(config.threshold(), 4);

        assert!(!config.increment_window_length(-5));
        assert!(config.increment_window_length(-4));
        assert_eq!(config.window_length(), Duration::from_secs(1));
        assert_eq!(config.threshold(), 4);

        config.reset();
        assert_eq!(config.summary(), "3 chews per 5 sec");
    }

    #[test]
    fn test_sensitivity_is_unbounded_but_finite() {
        let mut config = Config::default();
        assert!(config.set_sensitivity(-12.5));
        assert_eq!(config.sensitivity(), -12.5);
        assert!(!config.set_sensitivity(f64::NAN));
        assert_eq!(config.sensitivity(), -12.5);
    }

    #[test]
    fn test_sanitize_clamps_hand_edited_values() {
        let json = r#"{"window_length": 2.0, "threshold": 99, "reward_length": 120.0}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let config = config.sanitized();
        assert_eq!(config.window_length(), Duration::from_secs(2));
        assert_eq!(config.threshold(), 8);
        assert_eq!(config.reward_length(), Duration::from_secs(45));
    }

    #[test]
    fn test_load_clamps_oversized_durations() {
        let path = std::env::temp_dir()
            .join(format!("chew-gate-config-{}", uuid::Uuid::new_v4()))
            .join("config.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"window_length": 1e30, "reward_length": 1e300}"#).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.window_length(), Duration::from_secs(30));
        assert_eq!(loaded.reward_length(), Duration::from_secs(45));
        assert_eq!(loaded.threshold(), 3);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_negative_duration_is_a_parse_error() {
        let json = r#"{"window_length": -1.0}"#;
        assert!(serde_json::from_str::<Config>(json).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("chew-gate-config-{}", uuid::Uuid::new_v4()))
            .join("config.json");

        let mut config = Config::default();
        assert!(config.set_threshold(7));
        config.set_signal(SignalKind::Threshold);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("chew-gate-does-not-exist.json");
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_signal_kind_parsing() {
        assert_eq!(SignalKind::parse("threshold"), Some(SignalKind::Threshold));
        assert_eq!(SignalKind::parse("area-ratio"), Some(SignalKind::AreaRatio));
        assert_eq!(SignalKind::parse("Area"), Some(SignalKind::AreaRatio));
        assert_eq!(SignalKind::parse("camera"), None);
    }
}
