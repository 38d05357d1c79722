//! Directory reconciliation
//!
//! Keeps the module collection in step with the module roots: drop modules
//! whose path vanished, pick up new entries, restore canonical order.

use crate::extension::module::Module;
use crate::notifications::api::SharedNotifier;
use glob::Pattern;
use log::{debug, trace, warn};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Default reserved names: bytecode caches written next to module sources
pub const DEFAULT_RESERVED_NAMES: &[&str] = &["__pycache__"];

/// A new directory entry that becomes a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredModule {
    pub id: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    reserved: Vec<Pattern>,
}

impl Default for DirectoryScanner {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVED_NAMES.iter().map(|s| s.to_string()))
    }
}

impl DirectoryScanner {
    /// Build a scanner; invalid patterns are logged and skipped
    pub fn new(reserved: impl IntoIterator<Item = String>) -> Self {
        let reserved = reserved
            .into_iter()
            .filter_map(|p| match Pattern::new(&p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Ignoring invalid reserved-name pattern '{}': {}", p, e);
                    None
                }
            })
            .collect();
        Self { reserved }
    }

    /// Hidden entries and reserved names are never modules
    pub fn is_reserved(&self, file_name: &str) -> bool {
        file_name.starts_with('.') || self.reserved.iter().any(|p| p.matches(file_name))
    }

    /// Module id: base name with the extension stripped
    pub fn module_id(path: &Path) -> Option<String> {
        path.file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Remove modules whose backing path no longer exists
    pub fn prune<H>(&self, modules: &mut Vec<Arc<Module<H>>>) -> Vec<Arc<Module<H>>>
    where
        H: Clone + Send + Sync + 'static,
    {
        let (kept, removed): (Vec<_>, Vec<_>) =
            modules.drain(..).partition(|m| m.path().exists());
        *modules = kept;

        for module in &removed {
            debug!(
                "Module '{}' vanished from {}",
                module.id(),
                module.path().display()
            );
        }
        removed
    }

    /// New entries under `root` whose id is not already taken
    ///
    /// `known` holds the ids already in the collection and is extended with
    /// every id returned, so the first root to provide an id wins.
    pub fn discover(&self, root: &Path, known: &mut HashSet<String>) -> Vec<DiscoveredModule> {
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot read module root {}: {}", root.display(), e);
                return Vec::new();
            }
        };

        let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let mut found = Vec::new();
        for path in paths {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                trace!("Skipping non UTF-8 entry {}", path.display());
                continue;
            };
            if self.is_reserved(file_name) {
                trace!("Skipping reserved entry {}", path.display());
                continue;
            }
            if !path.exists() {
                trace!("Skipping dangling entry {}", path.display());
                continue;
            }
            let Some(id) = Self::module_id(&path) else {
                continue;
            };
            if !known.insert(id.clone()) {
                debug!(
                    "Module id '{}' already present, ignoring {}",
                    id,
                    path.display()
                );
                continue;
            }
            found.push(DiscoveredModule { id, path });
        }
        found
    }

    /// Build modules for discovered entries
    pub fn instantiate<H>(
        discovered: Vec<DiscoveredModule>,
        notifier: &SharedNotifier,
    ) -> Vec<Arc<Module<H>>>
    where
        H: Clone + Send + Sync + 'static,
    {
        discovered
            .into_iter()
            .map(|d| Arc::new(Module::new(d.id, d.path, notifier.clone())))
            .collect()
    }

    /// Primary-strength comparison key: accents stripped, case folded
    pub fn collation_key(name: &str) -> String {
        name.nfd()
            .filter(|c| !is_combining_mark(*c))
            .flat_map(char::to_lowercase)
            .collect()
    }

    /// Canonical order: display name descending, then id
    ///
    /// Names equal at primary strength fall back to their lowercase form so
    /// "epee" and "Épée" still order deterministically.
    pub fn sort<H>(modules: &mut [Arc<Module<H>>])
    where
        H: Clone + Send + Sync + 'static,
    {
        modules.sort_by_cached_key(|m| {
            let name = m.display_name();
            (
                Reverse(Self::collation_key(&name)),
                Reverse(name.to_lowercase()),
                m.id().to_string(),
            )
        });
    }
}
