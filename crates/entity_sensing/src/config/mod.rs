//! Sensing configuration
//!
//! Settings load from TOML or RON, picked by file extension. Fields missing
//! from a file keep their defaults.

use std::path::Path;

pub use serde::{Deserialize, Serialize};

use crate::world::TileStopMask;

/// File formats a [`Config`] can be stored in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`
    Toml,
    /// `.ron`
    Ron,
}

impl ConfigFormat {
    /// Format implied by the file extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Serde-backed settings that round-trip through TOML or RON files
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Parse settings from text in `format`
    fn parse(contents: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        match format {
            ConfigFormat::Toml => toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string())),
            ConfigFormat::Ron => ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Render settings as text in `format`
    fn render(&self, format: ConfigFormat) -> Result<String, ConfigError> {
        match format {
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string())),
            ConfigFormat::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string())),
        }
    }

    /// Load settings from a `.toml` or `.ron` file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents, format)
    }

    /// Save settings to a `.toml` or `.ron` file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = self.render(ConfigFormat::from_path(path)?)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("Config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// File contents are not valid for the format
    #[error("Config parse failed: {0}")]
    Parse(String),

    /// Settings could not be rendered
    #[error("Config serialization failed: {0}")]
    Serialize(String),

    /// Extension is neither `.toml` nor `.ron`
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// A value is outside its valid range
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        /// Offending field name
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// # Sensing Configuration
///
/// Tunables shared by every sensor a [`SensorManager`](crate::sensor::SensorManager)
/// creates. Loaded from TOML or RON; missing fields fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensingConfig {
    /// World units per tile edge
    pub tile_size: f32,
    /// Detection delay applied to newly created sensors (seconds)
    pub default_delay_seconds: f64,
    /// Tile kinds that block sight for newly created sensors
    pub default_sight_stop_mask: TileStopMask,
    /// Whether newly created sensors sort callbacks by distance
    pub distance_sort_by_default: bool,
    /// Upper bound on deferred callbacks dispatched per tick (0 = unlimited)
    pub max_callbacks_per_drain: usize,
}

impl Default for SensingConfig {
    fn default() -> Self {
        Self {
            tile_size: 1.0,
            default_delay_seconds: 0.0,
            default_sight_stop_mask: TileStopMask::SOLID | TileStopMask::CRYSTAL,
            distance_sort_by_default: false,
            max_callbacks_per_drain: 0,
        }
    }
}

impl Config for SensingConfig {}

impl SensingConfig {
    /// Check that all values are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tile_size.is_finite() && self.tile_size > 0.0) {
            return Err(ConfigError::Invalid {
                field: "tile_size",
                reason: format!("must be positive, got {}", self.tile_size),
            });
        }
        if !(self.default_delay_seconds.is_finite() && self.default_delay_seconds >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "default_delay_seconds",
                reason: format!("must be non-negative, got {}", self.default_delay_seconds),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SensingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_toml_partial_config_uses_defaults() {
        let config: SensingConfig = toml::from_str("tile_size = 16.0\n").unwrap();
        assert_eq!(config.tile_size, 16.0);
        assert_eq!(config.default_delay_seconds, 0.0);
        assert_eq!(config.default_sight_stop_mask, TileStopMask::SOLID | TileStopMask::CRYSTAL);
    }

    #[test]
    fn test_round_trip_through_both_formats() {
        let config = SensingConfig {
            tile_size: 8.0,
            default_delay_seconds: 0.25,
            distance_sort_by_default: true,
            ..Default::default()
        };
        for format in [ConfigFormat::Ron, ConfigFormat::Toml] {
            let text = config.render(format).unwrap();
            assert_eq!(SensingConfig::parse(&text, format).unwrap(), config);
        }
    }

    #[test]
    fn test_rejects_bad_tile_size() {
        let config = SensingConfig {
            tile_size: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "tile_size", .. })));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = SensingConfig::default().save_to_file("sensing.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
        assert!(matches!(
            SensingConfig::load_from_file("sensing"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
