//! Client-local preferences persisted across sessions.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const PREFS_DIR: &str = "taskdeck";
const PREFS_FILE: &str = "preferences.toml";

/// Persisted UI preferences. Not part of the task domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Dark theme toggle; light is the default.
    #[serde(default)]
    pub dark_mode: bool,
}

impl Preferences {
    /// Conventional preferences path under the platform config directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(PREFS_DIR).join(PREFS_FILE))
    }

    /// Load preferences from the given file, defaulting when it does not
    /// exist yet.
    ///
    /// # Errors
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Persist preferences to the given file, creating parent directories
    /// as needed.
    ///
    /// # Errors
    /// Returns an error when the directory or file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let contents = toml::to_string(self).context("failed to serialize preferences")?;
        fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Preferences with the theme flipped.
    #[must_use]
    pub const fn toggled(self) -> Self {
        Self {
            dark_mode: !self.dark_mode,
        }
    }
}
