//! Scanner configuration

use crate::constants::*;
use crate::error::ConfigError;
use crate::types::VideoConstraints;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Tunables for a scanner controller
///
/// Every field has a default, so a config file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScannerConfig {
    /// Identical consecutive readings required for acceptance
    pub consecutive_hits: u32,

    /// Zoom cap applied during capability negotiation
    pub max_zoom: f64,

    /// Preferred capture width
    pub ideal_width: u32,

    /// Preferred capture height
    pub ideal_height: u32,

    /// Preferred capture frame rate
    pub ideal_frame_rate: u32,

    /// Native detector polling cadence
    pub native_poll_interval_ms: u64,

    /// Library and fallback decode rate
    pub library_fps: u32,

    /// Per-source decoding library load timeout
    pub library_load_timeout_ms: u64,

    /// Decoding library sources, tried in order
    pub library_sources: Vec<String>,

    /// Auto-dismiss interval the UI applies to notifications
    pub notification_dismiss_ms: u64,

    /// Capacity of the event broadcast channel
    pub event_channel_capacity: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            consecutive_hits: DEFAULT_CONSECUTIVE_HITS,
            max_zoom: DEFAULT_MAX_ZOOM,
            ideal_width: DEFAULT_IDEAL_WIDTH,
            ideal_height: DEFAULT_IDEAL_HEIGHT,
            ideal_frame_rate: DEFAULT_IDEAL_FRAME_RATE,
            native_poll_interval_ms: DEFAULT_NATIVE_POLL_INTERVAL_MS,
            library_fps: DEFAULT_LIBRARY_FPS,
            library_load_timeout_ms: DEFAULT_LIBRARY_LOAD_TIMEOUT_MS,
            library_sources: DEFAULT_LIBRARY_SOURCES.iter().map(|s| s.to_string()).collect(),
            notification_dismiss_ms: DEFAULT_NOTIFICATION_DISMISS_MS,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConfigShape {
    Nested { scanner: ScannerConfig },
    Flat(ScannerConfig),
}

impl ScannerConfig {
    /// Parse a TOML document, either flat or under a `[scanner]` table
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config = match toml::from_str::<ConfigShape>(input)? {
            ConfigShape::Nested { scanner } => scanner,
            ConfigShape::Flat(config) => config,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.consecutive_hits == 0 {
            return Err(invalid("consecutive_hits", "must be at least 1"));
        }
        if !self.max_zoom.is_finite() || self.max_zoom < 1.0 {
            return Err(invalid(
                "max_zoom",
                format!("must be a finite value >= 1.0, got {}", self.max_zoom),
            ));
        }
        if self.library_fps == 0 {
            return Err(invalid("library_fps", "must be at least 1"));
        }
        if self.native_poll_interval_ms == 0 {
            return Err(invalid("native_poll_interval_ms", "must be at least 1"));
        }
        if self.library_load_timeout_ms == 0 {
            return Err(invalid("library_load_timeout_ms", "must be at least 1"));
        }
        if self.event_channel_capacity == 0 {
            return Err(invalid("event_channel_capacity", "must be at least 1"));
        }
        Ok(())
    }

    /// Constraints for the first camera request
    pub fn video_constraints(&self) -> VideoConstraints {
        VideoConstraints::environment(self.ideal_width, self.ideal_height, self.ideal_frame_rate)
    }

    /// Native detector polling cadence
    pub fn native_poll_interval(&self) -> Duration {
        Duration::from_millis(self.native_poll_interval_ms)
    }

    /// Library and fallback polling cadence
    pub fn library_poll_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.library_fps.max(1)))
    }

    /// Per-source library load timeout
    pub fn library_load_timeout(&self) -> Duration {
        Duration::from_millis(self.library_load_timeout_ms)
    }

    /// UI notification lifetime
    pub fn notification_dismiss(&self) -> Duration {
        Duration::from_millis(self.notification_dismiss_ms)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = ScannerConfig::default();
        assert_eq!(cfg.consecutive_hits, 2);
        assert_eq!(cfg.max_zoom, 2.0);
        assert_eq!(cfg.library_sources.len(), 2);
        assert_eq!(cfg.library_poll_interval(), Duration::from_millis(100));
        assert_eq!(cfg.notification_dismiss(), Duration::from_secs(5));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_nested_shape() {
        let input = r#"
[scanner]
consecutive_hits = 3
max_zoom = 1.5
library_sources = ["https://a.example/lib.js"]
"#;
        let cfg = ScannerConfig::from_toml_str(input).expect("config should parse");
        assert_eq!(cfg.consecutive_hits, 3);
        assert_eq!(cfg.max_zoom, 1.5);
        assert_eq!(cfg.library_sources, vec!["https://a.example/lib.js"]);
        assert_eq!(cfg.ideal_width, DEFAULT_IDEAL_WIDTH);
    }

    #[test]
    fn test_parse_flat_shape() {
        let input = r#"
library_fps = 5
library_load_timeout_ms = 250
"#;
        let cfg = ScannerConfig::from_toml_str(input).expect("config should parse");
        assert_eq!(cfg.library_poll_interval(), Duration::from_millis(200));
        assert_eq!(cfg.library_load_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_rejects_zero_threshold() {
        let err = ScannerConfig::from_toml_str("consecutive_hits = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "consecutive_hits",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_zoom_below_one() {
        let err = ScannerConfig::from_toml_str("max_zoom = 0.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "max_zoom", .. }));
    }

    #[test]
    fn test_rejects_malformed_document() {
        let err = ScannerConfig::from_toml_str("consecutive_hits = \"two\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_toml_round_trip_keeps_values() {
        let cfg = ScannerConfig {
            consecutive_hits: 4,
            ..Default::default()
        };
        let text = cfg.to_toml_string().unwrap();
        assert_eq!(ScannerConfig::from_toml_str(&text).unwrap(), cfg);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scanner]\nmax_zoom = 3.0").unwrap();
        let cfg = ScannerConfig::from_file(file.path()).expect("config should load");
        assert_eq!(cfg.max_zoom, 3.0);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = ScannerConfig::from_file("/nonexistent/parcelscan.toml").unwrap_err();
        match err {
            ConfigError::Io { path, .. } => assert!(path.contains("parcelscan.toml")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
