//! Engine configuration.
//!
//! Tunables for hit-testing, resize limits and history depth. Configuration can be
//! loaded from environment variables or created programmatically.

use crate::annotation::Style;

/// Configuration for an editing session.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Minimum width/height of a box-shaped annotation, in capture pixels
    pub min_size: f64,
    /// Pick radius around freehand strokes and lines, in capture pixels
    pub stroke_hit_tolerance: f64,
    /// Hit radius of resize handles, in capture pixels
    pub handle_size: f64,
    /// Maximum number of history snapshots kept (None = unbounded)
    pub history_limit: Option<usize>,
    /// Style applied to newly drawn shapes
    pub default_style: Style,
    /// Font size for placed text, in document units
    pub text_font_size: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_size: 1.0,
            stroke_hit_tolerance: 20.0,
            handle_size: 8.0,
            history_limit: None,
            default_style: Style::default(),
            text_font_size: 12.0,
        }
    }
}

impl EngineConfig {
    /// Sets the minimum annotation size.
    pub fn with_min_size(mut self, min_size: f64) -> Self {
        self.min_size = min_size;
        self
    }

    /// Sets the stroke pick tolerance.
    pub fn with_stroke_hit_tolerance(mut self, tolerance: f64) -> Self {
        self.stroke_hit_tolerance = tolerance;
        self
    }

    /// Sets the handle hit radius.
    pub fn with_handle_size(mut self, size: f64) -> Self {
        self.handle_size = size;
        self
    }

    /// Caps the number of history snapshots.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    /// Sets the style for newly drawn shapes.
    pub fn with_default_style(mut self, style: Style) -> Self {
        self.default_style = style;
        self
    }

    /// Sets the font size for placed text.
    pub fn with_text_font_size(mut self, size: f64) -> Self {
        self.text_font_size = size;
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PAGEMARK_MIN_SIZE`: minimum annotation size (default: 1.0)
    /// - `PAGEMARK_STROKE_TOLERANCE`: stroke pick tolerance (default: 20.0)
    /// - `PAGEMARK_HANDLE_SIZE`: handle hit radius (default: 8.0)
    /// - `PAGEMARK_HISTORY_LIMIT`: history depth (default: unbounded)
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PAGEMARK_MIN_SIZE") {
            config.min_size = parse_positive("PAGEMARK_MIN_SIZE", &val)?;
        }

        if let Ok(val) = std::env::var("PAGEMARK_STROKE_TOLERANCE") {
            config.stroke_hit_tolerance = parse_positive("PAGEMARK_STROKE_TOLERANCE", &val)?;
        }

        if let Ok(val) = std::env::var("PAGEMARK_HANDLE_SIZE") {
            config.handle_size = parse_positive("PAGEMARK_HANDLE_SIZE", &val)?;
        }

        if let Ok(val) = std::env::var("PAGEMARK_HISTORY_LIMIT") {
            let limit = val
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidValue("PAGEMARK_HISTORY_LIMIT".to_string()))?;
            if limit == 0 {
                return Err(ConfigError::InvalidValue(
                    "PAGEMARK_HISTORY_LIMIT".to_string(),
                ));
            }
            config.history_limit = Some(limit);
        }

        Ok(config)
    }
}

fn parse_positive(key: &str, val: &str) -> Result<f64, ConfigError> {
    match val.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(ConfigError::InvalidValue(key.to_string())),
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid value for a configuration key
    #[error("invalid value for configuration key: {0}")]
    InvalidValue(String),
}
