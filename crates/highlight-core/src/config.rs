//! Highlighting configuration
//!
//! Loaded from TOML, optionally overridden from the environment:
//!
//! ```toml
//! threshold = 90.0
//! buffer = 10
//! timeout_ms = 30000
//!
//! [style]
//! color = [1.0, 1.0, 0.0]
//! opacity = 1.0
//! ```

use crate::error::{HighlightError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Engine settings shared by every evidence item in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightConfig {
    /// Minimum fuzzy score (0-100) for a window to count as a match
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Extra words considered beyond the evidence word count
    #[serde(default = "default_buffer")]
    pub buffer: usize,
    /// Upper bound on locate-and-annotate time per evidence item
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub style: HighlightStyle,
}

fn default_threshold() -> f64 {
    90.0
}

fn default_buffer() -> usize {
    10
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            buffer: default_buffer(),
            timeout_ms: default_timeout_ms(),
            style: HighlightStyle::default(),
        }
    }
}

/// Appearance of written highlight annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightStyle {
    /// RGB, each component 0-1
    #[serde(default = "default_color")]
    pub color: [f32; 3],
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

fn default_color() -> [f32; 3] {
    [1.0, 1.0, 0.0]
}

fn default_opacity() -> f32 {
    1.0
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            color: default_color(),
            opacity: default_opacity(),
        }
    }
}

impl HighlightConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            HighlightError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|e| HighlightError::InvalidConfig(format!("Malformed TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from environment variables
    ///
    /// Recognized variables:
    /// - EVIDENCE_THRESHOLD: minimum fuzzy score
    /// - EVIDENCE_BUFFER: extra window words
    /// - EVIDENCE_TIMEOUT_MS: per-item timeout
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("EVIDENCE_THRESHOLD") {
            self.threshold = parse_var("EVIDENCE_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("EVIDENCE_BUFFER") {
            self.buffer = parse_var("EVIDENCE_BUFFER", &v)?;
        }
        if let Some(v) = lookup("EVIDENCE_TIMEOUT_MS") {
            self.timeout_ms = parse_var("EVIDENCE_TIMEOUT_MS", &v)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.threshold) {
            return Err(HighlightError::InvalidConfig(format!(
                "threshold must be within 0..=100, got {}",
                self.threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.style.opacity) {
            return Err(HighlightError::InvalidConfig(format!(
                "opacity must be within 0..=1, got {}",
                self.style.opacity
            )));
        }
        if self.style.color.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(HighlightError::InvalidConfig(
                "color components must be within 0..=1".into(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(HighlightError::InvalidConfig(
                "timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| HighlightError::InvalidConfig(format!("{} has invalid value {:?}", key, value)))
}
