//! Settings persistence
//!
//! A small key-value capability. The file-backed store keeps the whole
//! document in memory and rewrites it on every `set`.

use crate::extension::error::{SettingsError, SettingsResult};
use log::{debug, trace};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Key-value persistence capability
pub trait SettingsStore: Send {
    fn get(&self, key: &str) -> SettingsResult<Option<toml::Value>>;
    fn set(&mut self, key: &str, value: toml::Value) -> SettingsResult<()>;
}

/// Settings persisted as a TOML document
#[derive(Debug)]
pub struct TomlSettingsStore {
    path: PathBuf,
    values: toml::Table,
}

impl TomlSettingsStore {
    /// Open a settings file; a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> SettingsResult<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(content) => content
                .parse::<toml::Table>()
                .map_err(|e| SettingsError::Parse {
                    path: path.clone(),
                    message: e.to_string(),
                })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Settings file {} not found, starting empty", path.display());
                toml::Table::new()
            }
            Err(e) => {
                return Err(SettingsError::Io {
                    path,
                    message: e.to_string(),
                })
            }
        };

        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> SettingsResult<()> {
        let io_error = |e: std::io::Error| SettingsError::Io {
            path: self.path.clone(),
            message: e.to_string(),
        };

        let content = toml::to_string_pretty(&self.values).map_err(|e| SettingsError::Serialize {
            message: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, content).map_err(io_error)?;
        fs::rename(&tmp, &self.path).map_err(io_error)?;

        trace!("Wrote settings to {}", self.path.display());
        Ok(())
    }
}

impl SettingsStore for TomlSettingsStore {
    fn get(&self, key: &str) -> SettingsResult<Option<toml::Value>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: toml::Value) -> SettingsResult<()> {
        self.values.insert(key.to_string(), value);
        self.persist()
    }
}

/// Settings that live for the process only
#[derive(Debug, Default, Clone)]
pub struct MemorySettingsStore {
    values: BTreeMap<String, toml::Value>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> SettingsResult<Option<toml::Value>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: toml::Value) -> SettingsResult<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = TomlSettingsStore::open(dir.path().join("settings.toml")).unwrap();
        assert_eq!(store.get("anything").unwrap(), None);
    }

    #[test]
    fn test_set_persists_and_reopens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let mut store = TomlSettingsStore::open(&path).unwrap();
        store
            .set("greeting", toml::Value::String("hello".to_string()))
            .unwrap();
        assert!(path.exists());

        let reopened = TomlSettingsStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("greeting").unwrap(),
            Some(toml::Value::String("hello".to_string()))
        );
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "this is = = not toml").unwrap();

        let err = TomlSettingsStore::open(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemorySettingsStore::new();
        store.set("n", toml::Value::Integer(3)).unwrap();
        assert_eq!(store.get("n").unwrap(), Some(toml::Value::Integer(3)));
        assert_eq!(store.get("missing").unwrap(), None);
    }
}
