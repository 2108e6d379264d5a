//! Configuration types for the fusion engine and tracker.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the emotion engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fusion thresholds and modality weights.
    pub fusion: FusionConfig,
    /// Continuous capture scheduler settings.
    pub tracker: TrackerConfig,
    /// Session store settings.
    pub session: SessionConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
}

/// Fusion algorithm tuning.
///
/// All thresholds and weights are operator-tunable; nothing in the fusion
/// path is hard-coded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Discount applied to a lone modality's confidence.
    ///
    /// Uncorroborated evidence is weaker, so a single-modality result is
    /// reported at `confidence * single_modality_discount`.
    pub single_modality_discount: f32,
    /// Minimum consistency score for an authentic verdict.
    pub authenticity_threshold: f32,
    /// Minimum fused confidence for an authentic verdict.
    pub min_confidence: f32,
    /// Confidence spread among agreeing modalities above which the
    /// consistency score is reduced by that spread.
    pub spread_threshold: f32,
    /// Priority weight for the face modality.
    pub face_weight: f32,
    /// Priority weight for the voice modality.
    ///
    /// Slightly below face/text by default: vocal tone is the noisier signal.
    pub voice_weight: f32,
    /// Priority weight for the text modality.
    pub text_weight: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            single_modality_discount: 0.8,
            authenticity_threshold: 0.6,
            min_confidence: 0.5,
            spread_threshold: 0.4,
            face_weight: 1.0,
            voice_weight: 0.8,
            text_weight: 1.0,
        }
    }
}

impl FusionConfig {
    /// Priority weight for a modality.
    pub fn weight(&self, modality: crate::emotion::Modality) -> f32 {
        match modality {
            crate::emotion::Modality::Face => self.face_weight,
            crate::emotion::Modality::Voice => self.voice_weight,
            crate::emotion::Modality::Text => self.text_weight,
        }
    }
}

/// Continuous capture scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Interval between capture ticks in milliseconds.
    pub tick_interval_ms: u64,
    /// Per-modality timeout for capture + classification within one tick,
    /// in milliseconds. A modality that misses the deadline is dropped from
    /// that tick, never awaited past it.
    pub modality_timeout_ms: u64,
    /// Consecutive failed ticks for one modality before a single
    /// degradation warning is emitted.
    pub degradation_after_ticks: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 2_500,
            modality_timeout_ms: 1_500,
            degradation_after_ticks: 5,
        }
    }
}

/// Session store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Bounded sliding-window capacity of each session's fusion history.
    pub history_capacity: usize,
    /// Idle time in seconds after which an inactive session may be evicted.
    pub idle_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_capacity: 10,
            idle_timeout_secs: 600,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the HTTP surface.
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7430".to_owned(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::EmotionError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::EmotionError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/candor/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Ok(config) = std::env::var("CANDOR_CONFIG_DIR") {
            PathBuf::from(config).join("config.toml")
        } else if let Some(dir) = dirs::config_dir() {
            dir.join("candor").join("config.toml")
        } else {
            PathBuf::from("/tmp/candor-config/config.toml")
        }
    }
}
