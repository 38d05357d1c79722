//! Enabled-set registry
//!
//! Ids the user has turned on. Membership does not depend on a module with
//! that id existing.

use crate::extension::error::{SettingsError, SettingsResult};
use crate::extension::settings::SettingsStore;
use log::warn;
use std::collections::BTreeSet;

/// Settings key holding the enabled ids
pub const ENABLED_MODULES_KEY: &str = "enabled_modules";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnabledModules {
    ids: BTreeSet<String>,
}

impl EnabledModules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the enabled set from settings; absent key means empty
    pub fn load(store: &dyn SettingsStore) -> SettingsResult<Self> {
        let Some(value) = store.get(ENABLED_MODULES_KEY)? else {
            return Ok(Self::new());
        };

        let array = value.as_array().ok_or_else(|| SettingsError::Serialize {
            message: format!("'{}' must be an array of strings", ENABLED_MODULES_KEY),
        })?;

        let ids = array
            .iter()
            .filter_map(|v| match v.as_str() {
                Some(id) => Some(id.to_string()),
                None => {
                    warn!("Ignoring non-string entry {} in '{}'", v, ENABLED_MODULES_KEY);
                    None
                }
            })
            .collect();

        Ok(Self { ids })
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Apply the change in memory, then write it through
    ///
    /// The in-memory set keeps the change even if persisting fails.
    pub fn set_enabled(
        &mut self,
        id: &str,
        enabled: bool,
        store: &mut dyn SettingsStore,
    ) -> SettingsResult<()> {
        if enabled {
            self.ids.insert(id.to_string());
        } else {
            self.ids.remove(id);
        }
        store.set(ENABLED_MODULES_KEY, self.to_value())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn to_value(&self) -> toml::Value {
        toml::Value::Array(
            self.ids
                .iter()
                .cloned()
                .map(toml::Value::String)
                .collect(),
        )
    }
}
