use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::category::{Category, CategoryCatalog};
use crate::error::{BingoError, Result};

/// Top-level configuration for Meeting Bingo.
///
/// Loaded from `~/.meeting-bingo/config.toml` by default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BingoConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    /// Extra word packs, merged over the built-in ones.
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl BingoConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BingoConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file is missing
    /// or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| BingoError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Built-in packs plus the configured ones.
    ///
    /// Fails if a configured pack cannot fill a card, so a bad config is
    /// reported at startup rather than when a game begins.
    pub fn catalog(&self) -> Result<CategoryCatalog> {
        for category in &self.categories {
            category.validate()?;
        }
        Ok(CategoryCatalog::builtin().with_custom(self.categories.clone()))
    }
}

/// General application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the saved game database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.meeting-bingo/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Game behaviour settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Category used when `play` is run without `--category`.
    pub default_category: String,
    /// Save the game after every change so it survives a restart.
    pub persist: bool,
    /// How many recently detected words the status line shows.
    pub recent_detections: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            default_category: "corporate".to_string(),
            persist: true,
            recent_detections: 5,
        }
    }
}

/// Speech source settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Recognition language for engine adapters. The typed-transcript
    /// source has no recogniser, so it is only reported.
    pub language: String,
    /// Consecutive restarts after spurious end events before giving up.
    pub max_restarts: u32,
    /// Print interim (non-final) transcript text.
    pub show_interim: bool,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            max_restarts: 10,
            show_interim: true,
        }
    }
}
