//! Project configuration (`.taskweave/config.yaml`).

use crate::error::{Error, Result};
use crate::storage::{AtomicFileWriter, DEFAULT_BACKUP_RETENTION, RetryPolicy, WriteOptions};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory under the project root holding all taskweave files.
pub const PROJECT_DIR: &str = ".taskweave";
/// The persisted graph document.
pub const DOCUMENT_FILE: &str = "project.json";
/// Optional configuration file.
pub const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backups kept per document.
    pub backup_retention: usize,
    pub create_backups: bool,
    pub retry: RetryPolicy,
    /// Lifetime of a cached topological order. Zero disables the cache.
    pub topo_cache_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backup_retention: DEFAULT_BACKUP_RETENTION,
            create_backups: true,
            retry: RetryPolicy::default(),
            topo_cache_ttl_secs: 5,
        }
    }
}

impl Config {
    /// Parse a config file.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file("read config", path, e))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Load `<root>/.taskweave/config.yaml`, or defaults when it does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::path(root);
        match Self::load_file(&path) {
            Err(Error::FileOperation { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                log::debug!("no config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        AtomicFileWriter::new(0, self.retry).write(&Self::path(root), &yaml, WriteOptions { create_backup: false })
    }

    pub fn path(root: &Path) -> PathBuf {
        root.join(PROJECT_DIR).join(CONFIG_FILE)
    }

    pub fn topo_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.topo_cache_ttl_secs)
    }

    /// Writer configured from these settings.
    pub fn writer(&self) -> AtomicFileWriter {
        AtomicFileWriter::new(self.backup_retention, self.retry)
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            create_backup: self.create_backups,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(root: &Path, body: &str) {
        let dir = root.join(PROJECT_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(CONFIG_FILE), body).unwrap();
    }

    #[test]
    fn test_defaults_when_missing() {
        let temp = TempDir::new().unwrap();
        let config = Config::load(temp.path()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.backup_retention, 5);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 25);
        assert_eq!(config.topo_cache_ttl(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_overrides() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "backup_retention: 2\nretry:\n  max_attempts: 7\n");
        let config = Config::load(temp.path()).unwrap();
        assert_eq!(config.backup_retention, 2);
        assert_eq!(config.retry.max_attempts, 7);
        assert_eq!(config.retry.base_delay_ms, 25);
        assert!(config.create_backups);
    }

    #[test]
    fn test_malformed_config_is_error() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "backup_retention: [not, a, number]\n");
        let err = Config::load(temp.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let config = Config {
            create_backups: false,
            topo_cache_ttl_secs: 0,
            ..Config::default()
        };
        config.save(temp.path()).unwrap();
        assert_eq!(Config::load(temp.path()).unwrap(), config);
    }
}
