use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::store::{ConfigStore, DEFAULT_CONFIG_PATH};
use crate::version::DEFAULT_VERSION_FILE;

/// Default location of the tool settings file.
pub const DEFAULT_SETTINGS_PATH: &str = "/usr/local/etc/hasync-settings.toml";

/// Host-specific locations used by a run.
///
/// Read from a TOML file; command line flags take precedence over every key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolSettings {
    #[serde(default = "default_config_path")]
    pub config_path: PathBuf,
    #[serde(default = "default_version_file")]
    pub version_file: PathBuf,
    /// Service catalog overriding the built-in one.
    #[serde(default)]
    pub catalog_file: Option<PathBuf>,
    /// Lock file; `<config_path>.lock` when unset.
    #[serde(default)]
    pub lock_path: Option<PathBuf>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            config_path: default_config_path(),
            version_file: default_version_file(),
            catalog_file: None,
            lock_path: None,
        }
    }
}

fn default_config_path() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

fn default_version_file() -> PathBuf {
    PathBuf::from(DEFAULT_VERSION_FILE)
}

impl ToolSettings {
    /// Load settings from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file
    /// is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_file(path),
            None => {
                let default = Path::new(DEFAULT_SETTINGS_PATH);
                if default.exists() {
                    Self::load_file(default)
                } else {
                    debug!(path = DEFAULT_SETTINGS_PATH, "no settings file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings {}", path.display()))?;
        let settings: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse settings {}", path.display()))?;
        debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Store for the configured config and lock paths.
    pub fn store(&self) -> ConfigStore {
        let store = ConfigStore::new(&self.config_path);
        match &self.lock_path {
            Some(lock) => store.with_lock_path(lock),
            None => store,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use tempfile::tempdir;

    use super::ToolSettings;

    #[test]
    fn empty_file_yields_defaults() {
        let settings: ToolSettings = toml::from_str("").expect("parse");
        assert_eq!(settings, ToolSettings::default());
        assert_eq!(settings.config_path, PathBuf::from("/conf/config.xml"));
        assert_eq!(settings.store().path(), Path::new("/conf/config.xml"));
    }

    #[test]
    fn loads_overrides_from_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("hasync-settings.toml");
        fs::write(
            &path,
            "config_path = \"/tmp/config.xml\"\nversion_file = \"/tmp/core\"\ncatalog_file = \"/tmp/services.toml\"\n",
        )
        .expect("write");

        let settings = ToolSettings::load(Some(&path)).expect("load");
        assert_eq!(settings.config_path, PathBuf::from("/tmp/config.xml"));
        assert_eq!(settings.version_file, PathBuf::from("/tmp/core"));
        assert_eq!(
            settings.catalog_file.as_deref(),
            Some(Path::new("/tmp/services.toml"))
        );
        assert_eq!(settings.lock_path, None);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let err = ToolSettings::load(Some(&dir.path().join("nope.toml"))).expect_err("missing");
        assert!(err.to_string().contains("failed to read settings"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<ToolSettings>("config = \"/x\"").is_err());
    }
}
