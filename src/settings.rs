//! Persisted user settings: the path of the Graphviz `dot` binary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const APP_DIR: &str = "relx";
const FILE_NAME: &str = "settings.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Explicit `dot` binary; unset means look it up on PATH
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dot_path: Option<PathBuf>,
}

impl Settings {
    /// `<config dir>/relx/settings.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(FILE_NAME))
    }

    /// Read settings from `path`; a missing file gives the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write settings: {}", path.display()))?;
        info!(path = %path.display(), "saved settings");
        Ok(())
    }

    /// Store a new `dot` path; an empty path clears it
    pub fn set_dot_path(&mut self, path: Option<PathBuf>) {
        self.dot_path = path.filter(|p| !p.as_os_str().is_empty());
    }

    /// Engine path to configure: the command-line value wins over the file.
    /// `None` leaves the engine to search PATH.
    pub fn resolve_dot_path(&self, cli: Option<PathBuf>) -> Option<PathBuf> {
        cli.filter(|p| !p.as_os_str().is_empty())
            .or_else(|| self.dot_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn save_creates_the_directory_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relx").join("settings.json");

        let mut settings = Settings::default();
        settings.set_dot_path(Some(PathBuf::from("/opt/graphviz/bin/dot")));
        settings.save(&path).unwrap();

        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn empty_path_clears_the_setting() {
        let mut settings = Settings {
            dot_path: Some(PathBuf::from("/usr/bin/dot")),
        };
        settings.set_dot_path(Some(PathBuf::new()));
        assert_eq!(settings.dot_path, None);
    }

    #[test]
    fn command_line_path_takes_precedence() {
        let settings = Settings {
            dot_path: Some(PathBuf::from("/from/file")),
        };
        assert_eq!(
            settings.resolve_dot_path(Some(PathBuf::from("/from/flag"))),
            Some(PathBuf::from("/from/flag"))
        );
        assert_eq!(settings.resolve_dot_path(Some(PathBuf::new())), Some(PathBuf::from("/from/file")));
        assert_eq!(Settings::default().resolve_dot_path(None), None);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Settings::load(&path).is_err());
    }
}
