//! Configuration types for modman

use crate::error::{Error, Result};
use crate::types::TargetId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for [`ModManager`](crate::ModManager)
///
/// Every field has a serde default, so a partial JSON document such as
/// `{"game_dir": "/games/NuclearOption"}` is a complete configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Game installation directory (the prerequisite is extracted here)
    #[serde(default)]
    pub game_dir: PathBuf,

    /// Remote catalog settings
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// The protected prerequisite (mod loader runtime)
    #[serde(default)]
    pub prerequisite: PrerequisiteConfig,

    /// Install engine settings
    #[serde(default)]
    pub install: InstallConfig,

    /// Retry behavior for artifact downloads
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that would make the engine unusable
    pub fn validate(&self) -> Result<()> {
        if self.prerequisite.id.as_str().trim().is_empty() {
            return Err(Error::Config {
                message: "prerequisite id must not be empty".to_string(),
                key: Some("prerequisite.id".to_string()),
            });
        }
        if self.install.max_concurrent_installs == 0 {
            return Err(Error::Config {
                message: "at least one concurrent install is required".to_string(),
                key: Some("install.max_concurrent_installs".to_string()),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config {
                message: "at least one download attempt is required".to_string(),
                key: Some("retry.max_attempts".to_string()),
            });
        }
        Ok(())
    }

    /// Filesystem layout derived from this configuration
    pub fn layout(&self) -> Layout {
        Layout {
            game_dir: self.game_dir.clone(),
            prerequisite_root: self.game_dir.join(&self.prerequisite.folder),
            plugins_folder: self.prerequisite.plugins_folder.clone(),
            staging_folder: self.prerequisite.staging_folder.clone(),
        }
    }
}

/// Remote catalog configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// URL of the JSON manifest
    #[serde(default)]
    pub manifest_url: Option<String>,

    /// Local manifest file used instead of the URL (for mod authors testing a manifest)
    #[serde(default)]
    pub manifest_path: Option<PathBuf>,
}

/// Protected prerequisite configuration
///
/// The prerequisite is installed into the game directory in protected mode:
/// existing files are never overwritten and a failed install never deletes anything.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrerequisiteConfig {
    /// Identifier used for the task state and lock (default: "BepInEx")
    #[serde(default = "default_prerequisite_id")]
    pub id: TargetId,

    /// Archive URL
    #[serde(default = "default_prerequisite_url")]
    pub download_url: String,

    /// Folder inside the game directory whose presence means "installed" (default: "BepInEx")
    #[serde(default = "default_prerequisite_folder")]
    pub folder: String,

    /// Folder of enabled mods, inside the prerequisite folder (default: "plugins")
    #[serde(default = "default_plugins_folder")]
    pub plugins_folder: String,

    /// Folder installs are staged into, inside the prerequisite folder (default: "disabledPlugins")
    #[serde(default = "default_staging_folder")]
    pub staging_folder: String,
}

impl Default for PrerequisiteConfig {
    fn default() -> Self {
        Self {
            id: default_prerequisite_id(),
            download_url: default_prerequisite_url(),
            folder: default_prerequisite_folder(),
            plugins_folder: default_plugins_folder(),
            staging_folder: default_staging_folder(),
        }
    }
}

/// Install engine configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstallConfig {
    /// Maximum number of fetch/extract sequences running at once across all targets (default: 4)
    #[serde(default = "default_max_concurrent_installs")]
    pub max_concurrent_installs: usize,

    /// Timeout for establishing a connection (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_ms_serde")]
    pub connect_timeout: Duration,

    /// Longest wait for response headers or the next body chunk (default: 60 seconds)
    ///
    /// Applies per read, so a large download on a slow link is not cut off while
    /// data keeps arriving.
    #[serde(default = "default_read_timeout", with = "duration_ms_serde")]
    pub read_timeout: Duration,

    /// User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            max_concurrent_installs: default_max_concurrent_installs(),
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Retry configuration for artifact downloads
///
/// Backoff is linear: after failed attempt `n` (1-indexed) the fetcher waits
/// `base_delay * n` before the next attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay unit for linear backoff (default: 1000 ms)
    #[serde(default = "default_base_delay", with = "duration_ms_serde")]
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
        }
    }
}

/// Resolved install locations
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    /// Game installation directory
    pub game_dir: PathBuf,
    /// `<game_dir>/<prerequisite folder>`
    pub prerequisite_root: PathBuf,
    plugins_folder: String,
    staging_folder: String,
}

impl Layout {
    /// Directory of enabled mods
    pub fn plugins_dir(&self) -> PathBuf {
        self.prerequisite_root.join(&self.plugins_folder)
    }

    /// Directory installs are staged into
    pub fn staging_dir(&self) -> PathBuf {
        self.prerequisite_root.join(&self.staging_folder)
    }

    /// Staging directory for one mod
    pub fn staging_target(&self, id: &TargetId) -> PathBuf {
        self.staging_dir().join(id.as_str())
    }

    /// True when the prerequisite folder exists on disk
    pub fn prerequisite_present(&self) -> bool {
        self.prerequisite_root.is_dir()
    }
}

fn default_prerequisite_id() -> TargetId {
    TargetId::from("BepInEx")
}

fn default_prerequisite_url() -> String {
    "https://github.com/BepInEx/BepInEx/releases/download/v5.4.23.4/BepInEx_win_x64_5.4.23.4.zip"
        .to_string()
}

fn default_prerequisite_folder() -> String {
    "BepInEx".to_string()
}

fn default_plugins_folder() -> String {
    "plugins".to_string()
}

fn default_staging_folder() -> String {
    "disabledPlugins".to_string()
}

fn default_max_concurrent_installs() -> usize {
    4
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_user_agent() -> String {
    format!("modman/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(1000)
}

// Duration serialization helper (milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
