use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Which scene a stage runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneKind {
    #[default]
    Cube,
    Portal,
}

impl SceneKind {
    pub const ALL: [SceneKind; 2] = [SceneKind::Cube, SceneKind::Portal];

    pub fn as_str(&self) -> &'static str {
        match self {
            SceneKind::Cube => "cube",
            SceneKind::Portal => "portal",
        }
    }
}

impl fmt::Display for SceneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SceneKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cube" => Ok(SceneKind::Cube),
            "portal" => Ok(SceneKind::Portal),
            other => Err(ConfigError::UnknownScene(other.to_string())),
        }
    }
}

/// Errors loading a scene configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("unknown scene {0:?} (expected cube or portal)")]
    UnknownScene(String),
}

/// Options shared by both scenes. Every field has a default, so a config
/// file only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub scene: SceneKind,
    /// Seed for random placement and flicker. `None` draws from entropy.
    pub seed: Option<u64>,
    /// Image loaded for the portal's ring particles and smoke.
    pub texture_path: PathBuf,
    /// Rotate the cube by 0.6 rad/s of delta time instead of 0.01 rad per tick.
    pub delta_scaled_primary: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            scene: SceneKind::Cube,
            seed: None,
            texture_path: PathBuf::from("portal_particle.png"),
            delta_scaled_primary: false,
        }
    }
}

impl SceneConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load a YAML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&text)?;
        tracing::debug!(path = %path.display(), scene = %config.scene, "scene config loaded");
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}
