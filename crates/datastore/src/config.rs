//! Repository configuration, read from `.strata/config.toml`.
//!
//! ```toml
//! [user]
//! name = "Ann"
//! email = "ann@example.com"
//!
//! [sql]
//! batch_mode = "batched"
//! ```

use crate::error::DatastoreError;
use crate::table_editor::BatchMode;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    pub user: UserConfig,
    pub sql: SqlConfig,
}

/// Who commits are attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct UserConfig {
    pub name: String,
    pub email: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            name: "strata".into(),
            email: "strata@localhost".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SqlConfig {
    pub batch_mode: BatchMode,
}

impl Config {
    /// Reads the config at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&text).map_err(|source| DatastoreError::Config {
            path: path.to_owned(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.sql.batch_mode, BatchMode::Single);
    }

    #[test]
    fn partial_files_keep_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[sql]\nbatch_mode = \"batched\"\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.sql.batch_mode, BatchMode::Batched);
        assert_eq!(config.user, UserConfig::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = Config {
            user: UserConfig {
                name: "Ann".into(),
                email: "ann@example.com".into(),
            },
            sql: SqlConfig {
                batch_mode: BatchMode::Batched,
            },
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[user]\nnickname = \"a\"\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, DatastoreError::Config { .. }));
        assert!(err.to_string().contains("nickname"), "{err}");
    }
}
