//! Engine tuning knobs.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Interaction and rendering parameters.
///
/// Missing fields in a JSON document fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Eraser hit radius in world units.
    pub eraser_radius: f64,
    /// Maximum number of undo snapshots.
    pub history_limit: usize,
    /// Shapes dragged less than this are discarded.
    pub min_drag_distance: f64,
    /// Freehand points closer than this to the previous one are skipped.
    pub freehand_min_distance: f64,
    pub zoom_in_factor: f64,
    pub zoom_out_factor: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Grid spacing at zoom 1.
    pub grid_size: f64,
    /// Minimum time between rendered frames.
    pub frame_interval_ms: u64,
    /// Selection handle hit radius in screen pixels.
    pub handle_tolerance: f64,
    /// Arrows shorter than this are drawn without a head.
    pub arrowhead_min_length: f64,
    pub arrowhead_size: f64,
    /// Font size for new text elements.
    pub default_font_size: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            eraser_radius: 10.0,
            history_limit: 100,
            min_drag_distance: 3.0,
            freehand_min_distance: 2.0,
            zoom_in_factor: 1.05,
            zoom_out_factor: 0.95,
            min_zoom: 0.1,
            max_zoom: 5.0,
            grid_size: 20.0,
            frame_interval_ms: 16,
            handle_tolerance: 8.0,
            arrowhead_min_length: 10.0,
            arrowhead_size: 15.0,
            default_font_size: 20.0,
        }
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON document over the defaults.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let positive = [
            ("eraserRadius", self.eraser_radius),
            ("zoomInFactor", self.zoom_in_factor),
            ("zoomOutFactor", self.zoom_out_factor),
            ("minZoom", self.min_zoom),
            ("gridSize", self.grid_size),
            ("defaultFontSize", self.default_font_size),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")));
            }
        }
        if self.min_zoom > self.max_zoom {
            return Err(ConfigError::Invalid(format!(
                "minZoom {} exceeds maxZoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid("historyLimit must be at least 1".into()));
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{ "eraserRadius": 4, "maxZoom": 8 }"#).unwrap();
        assert!((config.eraser_radius - 4.0).abs() < f64::EPSILON);
        assert!((config.max_zoom - 8.0).abs() < f64::EPSILON);
        assert_eq!(config.history_limit, 100);
        assert_eq!(config.frame_interval(), Duration::from_millis(16));
    }

    #[test]
    fn test_rejects_inverted_zoom_range() {
        let err = EngineConfig::from_json(r#"{ "minZoom": 3, "maxZoom": 2 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_zero_history() {
        assert!(EngineConfig::from_json(r#"{ "historyLimit": 0 }"#).is_err());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(EngineConfig::from_json("{"), Err(ConfigError::Parse(_))));
    }
}
