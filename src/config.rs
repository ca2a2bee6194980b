//! Persisted configuration under the platform config directory.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::minigame::MiniGameKind;
use crate::model::segment::PathTone;

const APP_DIR: &str = "utopia_dystopia";
const CONFIG_FILE: &str = "config.json";

/// Environment variables checked, in order, for an API key.
const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

pub fn config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path
}

/// Reads `file` from the config directory, falling back to defaults when it
/// is missing or unreadable.
pub fn load_json<T: DeserializeOwned + Default>(file: &str) -> T {
    let path = config_dir().join(file);
    let Ok(text) = fs::read_to_string(&path) else {
        return T::default();
    };

    serde_json::from_str(&text).unwrap_or_else(|err| {
        warn!(path = %path.display(), %err, "ignoring unreadable settings file");
        T::default()
    })
}

pub fn save_json<T: Serialize>(file: &str, value: &T) -> Result<(), ConfigError> {
    let dir = config_dir();
    fs::create_dir_all(&dir).map_err(|source| ConfigError::Io {
        path: dir.clone(),
        source,
    })?;

    let path = dir.join(file);
    let json = serde_json::to_string_pretty(value)?;
    fs::write(&path, json).map_err(|source| ConfigError::Io { path, source })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationMode {
    Off,
    /// The player asks for each scene to be animated.
    #[default]
    OnDemand,
    /// The latest scene is animated as soon as its image is in and any
    /// mini-game on it is solved.
    AfterImage,
}

/// Which media and mini-game features a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSet {
    pub narration: bool,
    pub scene_images: bool,
    pub animation: AnimationMode,
    pub mini_game: MiniGameKind,
}

impl Default for FeatureSet {
    fn default() -> Self {
        Self {
            narration: true,
            scene_images: true,
            animation: AnimationMode::OnDemand,
            mini_game: MiniGameKind::None,
        }
    }
}

impl FeatureSet {
    /// Mini-games and animation are played on the scene image, so either one
    /// switches image generation on.
    pub fn normalized(mut self) -> Self {
        if self.mini_game != MiniGameKind::None || self.animation != AnimationMode::Off {
            self.scene_images = true;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub text_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub image_model: String,
    pub video_model: String,
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            text_model: "gemini-2.5-flash".into(),
            tts_model: "gemini-2.5-flash-preview-tts".into(),
            tts_voice: "Kore".into(),
            image_model: "imagen-4.0-generate-001".into(),
            video_model: "veo-3.0-fast-generate-001".into(),
            request_timeout_secs: 120,
        }
    }
}

/// Timers of the engine, in milliseconds on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub poll_interval_ms: u64,
    pub max_poll_checks: u32,
    pub jigsaw_gate_delay_ms: u64,
    pub hidden_object_gate_delay_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            max_poll_checks: 120,
            jigsaw_gate_delay_ms: 500,
            hidden_object_gate_delay_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub starting_tone: PathTone,
    pub autoplay_narration: bool,
    pub features: FeatureSet,
    pub backend: BackendConfig,
    pub pacing: PacingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            starting_tone: PathTone::Utopia,
            autoplay_narration: true,
            features: FeatureSet::default(),
            backend: BackendConfig::default(),
            pacing: PacingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the stored config, writing the defaults on first run, then
    /// applies environment overrides.
    pub fn load() -> Self {
        let path = config_dir().join(CONFIG_FILE);
        let mut config: AppConfig = load_json(CONFIG_FILE);

        if !path.exists() {
            match save_json(CONFIG_FILE, &config) {
                Ok(()) => info!(path = %path.display(), "wrote default config"),
                Err(err) => warn!(%err, "could not write default config"),
            }
        }

        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let from_env = API_KEY_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .find(|key| !key.trim().is_empty());

        if let Some(key) = from_env {
            self.api_key = Some(key.trim().to_string());
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            features: self.features,
            starting_tone: self.starting_tone,
            autoplay_narration: self.autoplay_narration,
            poll_interval: Duration::from_millis(self.pacing.poll_interval_ms),
            max_poll_checks: self.pacing.max_poll_checks,
            jigsaw_gate_delay: Duration::from_millis(self.pacing.jigsaw_gate_delay_ms),
            hidden_object_gate_delay: Duration::from_millis(self.pacing.hidden_object_gate_delay_ms),
        }
        .normalized()
    }
}

/// Runtime settings the engine reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub features: FeatureSet,
    pub starting_tone: PathTone,
    pub autoplay_narration: bool,
    pub poll_interval: Duration,
    pub max_poll_checks: u32,
    pub jigsaw_gate_delay: Duration,
    pub hidden_object_gate_delay: Duration,
}

/// Shortest accepted animation poll interval.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

impl EngineConfig {
    /// Applies the feature rules and keeps the poll timer non-zero.
    pub fn normalized(mut self) -> Self {
        self.features = self.features.normalized();
        self.poll_interval = self.poll_interval.max(MIN_POLL_INTERVAL);
        self.max_poll_checks = self.max_poll_checks.max(1);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        AppConfig::default().engine_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "features": { "mini_game": "jigsaw" } }"#).unwrap();

        assert_eq!(config.features.mini_game, MiniGameKind::Jigsaw);
        assert!(config.features.narration);
        assert_eq!(config.pacing.poll_interval_ms, 5_000);
        assert_eq!(config.backend.text_model, "gemini-2.5-flash");
    }

    #[test]
    fn engine_config_is_normalized_however_it_was_built() {
        let config = EngineConfig {
            features: FeatureSet {
                scene_images: false,
                animation: AnimationMode::Off,
                mini_game: MiniGameKind::Jigsaw,
                ..FeatureSet::default()
            },
            poll_interval: Duration::ZERO,
            max_poll_checks: 0,
            ..EngineConfig::default()
        }
        .normalized();

        assert!(config.features.scene_images);
        assert_eq!(config.poll_interval, Duration::from_millis(1));
        assert_eq!(config.max_poll_checks, 1);

        let mut pacing = AppConfig::default();
        pacing.pacing.poll_interval_ms = 0;
        assert_eq!(pacing.engine_config().poll_interval, Duration::from_millis(1));
    }

    #[test]
    fn mini_games_force_scene_images_on() {
        let features = FeatureSet {
            scene_images: false,
            animation: AnimationMode::Off,
            mini_game: MiniGameKind::HiddenObject,
            ..FeatureSet::default()
        };
        assert!(features.normalized().scene_images);

        let plain = FeatureSet {
            scene_images: false,
            animation: AnimationMode::Off,
            ..FeatureSet::default()
        };
        assert!(!plain.normalized().scene_images);
    }

    #[test]
    fn environment_key_overrides_stored_key() {
        let mut config = AppConfig {
            api_key: Some("stored".into()),
            ..AppConfig::default()
        };

        config.apply_env(|name| (name == "API_KEY").then(|| " from-env ".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("from-env"));

        config.apply_env(|_| Some("   ".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn engine_config_converts_pacing() {
        let engine = AppConfig::default().engine_config();
        assert_eq!(engine.poll_interval, Duration::from_secs(5));
        assert_eq!(engine.max_poll_checks, 120);
        assert_eq!(engine.jigsaw_gate_delay, Duration::from_millis(500));
    }
}
