//! Module state machine
//!
//! One `Module` per discovered path. State lives behind a module-local lock
//! that is only held for bookkeeping; runtime calls are made with the handle
//! cloned out, so listing never waits on module code. Callers must hold the
//! manager's runtime lock, which is why every runtime-touching method takes
//! `&mut R`.

use crate::core::version::{get_api_version, is_api_compatible, major_version};
use crate::extension::error::{ModuleError, ModuleResult};
use crate::extension::runtime::{find_executable, Callable, ScriptRuntime, FINALIZE, HANDLE_QUERY, INITIALIZE};
use crate::extension::types::{ModuleAttributes, ModuleMetadata, ModuleState, ModuleSummary, Query};
use crate::notifications::api::{Event, ModuleEvent, ModuleEventType, SharedNotifier};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

enum Slot<H> {
    Unloaded,
    Loaded {
        handle: H,
        attributes: ModuleAttributes,
        loaded_at: DateTime<Utc>,
    },
}

struct ModuleInner<H> {
    slot: Slot<H>,
    metadata: Option<ModuleMetadata>,
    last_error: Option<ModuleError>,
    /// Modification stamp of the path when the last load failed
    failed_stamp: Option<Option<SystemTime>>,
}

/// A discovered module and its load state
pub struct Module<H> {
    id: String,
    path: PathBuf,
    inner: RwLock<ModuleInner<H>>,
    notifier: SharedNotifier,
}

impl<H: Clone + Send + Sync + 'static> Module<H> {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, notifier: SharedNotifier) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            inner: RwLock::new(ModuleInner {
                slot: Slot::Unloaded,
                metadata: None,
                last_error: None,
                failed_stamp: None,
            }),
            notifier,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> ModuleState {
        match self.read().slot {
            Slot::Unloaded => ModuleState::Unloaded,
            Slot::Loaded { .. } => ModuleState::Loaded,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == ModuleState::Loaded
    }

    /// Trigger prefix; empty for passive modules and for modules never loaded
    pub fn trigger(&self) -> String {
        self.read()
            .metadata
            .as_ref()
            .map(|m| m.trigger.clone())
            .unwrap_or_default()
    }

    /// Display name; the id until metadata has been probed
    pub fn display_name(&self) -> String {
        self.read()
            .metadata
            .as_ref()
            .map(|m| m.name.clone())
            .unwrap_or_else(|| self.id.clone())
    }

    pub fn metadata(&self) -> Option<ModuleMetadata> {
        self.read().metadata.clone()
    }

    pub fn last_error(&self) -> Option<ModuleError> {
        self.read().last_error.clone()
    }

    pub fn summary(&self, enabled: bool) -> ModuleSummary {
        let inner = self.read();
        let metadata = inner
            .metadata
            .clone()
            .unwrap_or_else(|| ModuleMetadata::from_attributes(&self.id, &ModuleAttributes::default()));
        let (state, loaded_at) = match &inner.slot {
            Slot::Unloaded => (ModuleState::Unloaded, None),
            Slot::Loaded { loaded_at, .. } => (ModuleState::Loaded, Some(*loaded_at)),
        };

        ModuleSummary {
            id: self.id.clone(),
            path: self.path.clone(),
            name: metadata.name,
            trigger: metadata.trigger,
            version: metadata.version,
            author: metadata.author,
            description: metadata.description,
            state,
            enabled,
            last_error: inner.last_error.as_ref().map(|e| e.to_string()),
            loaded_at,
        }
    }

    /// Whether a rescan should try loading this module again
    ///
    /// Only a module whose last load failed and whose files changed since
    /// that attempt qualifies; an unchanged broken module stays unloaded so
    /// back-to-back rescans do not re-run its code.
    pub fn needs_retry(&self) -> bool {
        let inner = self.read();
        match (&inner.slot, &inner.failed_stamp) {
            (Slot::Unloaded, Some(stamp)) => *stamp != modification_stamp(&self.path),
            _ => false,
        }
    }

    /// Import the module and validate what it declares
    ///
    /// Idempotent when already loaded. On failure the module stays unloaded
    /// with the error recorded; a later call retries from scratch.
    pub fn load<R>(&self, runtime: &mut R) -> ModuleResult<()>
    where
        R: ScriptRuntime<Handle = H>,
    {
        if self.is_loaded() {
            debug!("Module '{}' already loaded", self.id);
            return Ok(());
        }

        debug!("Loading module '{}' from {}", self.id, self.path.display());
        let result = self.try_load(runtime);

        {
            let mut inner = self.write();
            match &result {
                Ok((handle, attributes)) => {
                    inner.metadata = Some(ModuleMetadata::from_attributes(&self.id, attributes));
                    inner.slot = Slot::Loaded {
                        handle: handle.clone(),
                        attributes: attributes.clone(),
                        loaded_at: Utc::now(),
                    };
                    inner.last_error = None;
                    inner.failed_stamp = None;
                }
                Err(e) => {
                    inner.slot = Slot::Unloaded;
                    inner.last_error = Some(e.clone());
                    inner.failed_stamp = Some(modification_stamp(&self.path));
                }
            }
        }

        match result {
            Ok(_) => {
                info!("Loaded module '{}'", self.id);
                self.notify_changed(None);
                Ok(())
            }
            Err(e) => {
                warn!("{}", e);
                self.notify_changed(Some(e.to_string()));
                Err(e)
            }
        }
    }

    fn try_load<R>(&self, runtime: &mut R) -> ModuleResult<(H, ModuleAttributes)>
    where
        R: ScriptRuntime<Handle = H>,
    {
        let handle = runtime
            .execute_module_code(&self.id, &self.path)
            .map_err(|cause| ModuleError::Load {
                id: self.id.clone(),
                cause,
            })?;

        match self.validate(runtime, &handle) {
            Ok(attributes) => Ok((handle, attributes)),
            Err(e) => {
                runtime.release_handle(handle);
                Err(e)
            }
        }
    }

    fn validate<R>(&self, runtime: &mut R, handle: &H) -> ModuleResult<ModuleAttributes>
    where
        R: ScriptRuntime<Handle = H>,
    {
        let attributes = runtime
            .probe_attributes(handle)
            .map_err(|cause| ModuleError::Load {
                id: self.id.clone(),
                cause,
            })?;

        if let Some(module_version) = attributes.api_version {
            let host_version = get_api_version();
            if !is_api_compatible(host_version, module_version) {
                return Err(ModuleError::IncompatibleApi {
                    id: self.id.clone(),
                    module_version,
                    host_major: major_version(host_version),
                });
            }
        }

        if !attributes.provides(HANDLE_QUERY) {
            return Err(ModuleError::MissingHandler {
                id: self.id.clone(),
                callable: HANDLE_QUERY.to_string(),
            });
        }

        let missing: Vec<String> = attributes
            .dependencies
            .iter()
            .filter(|dep| find_executable(dep).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ModuleError::MissingDependencies {
                id: self.id.clone(),
                missing,
            });
        }

        if attributes.provides(INITIALIZE) {
            runtime
                .invoke_callable(handle, Callable::Initialize)
                .map_err(|cause| ModuleError::Call {
                    id: self.id.clone(),
                    operation: INITIALIZE.to_string(),
                    cause,
                })?;
        }

        Ok(attributes)
    }

    /// Release the module; teardown failures are logged, never returned
    pub fn unload<R>(&self, runtime: &mut R)
    where
        R: ScriptRuntime<Handle = H>,
    {
        let loaded = match std::mem::replace(&mut self.write().slot, Slot::Unloaded) {
            Slot::Loaded {
                handle, attributes, ..
            } => Some((handle, attributes)),
            Slot::Unloaded => None,
        };

        let Some((handle, attributes)) = loaded else {
            return;
        };

        if attributes.provides(FINALIZE) {
            if let Err(e) = runtime.invoke_callable(&handle, Callable::Finalize) {
                warn!("Module '{}' failed during '{}': {}", self.id, FINALIZE, e);
            }
        }
        runtime.release_handle(handle);

        info!("Unloaded module '{}'", self.id);
        self.notify_changed(None);
    }

    /// Pass a request to the module's query handler
    ///
    /// Errors raised by module code are logged and returned; the module
    /// stays loaded.
    pub fn handle_query<R>(&self, runtime: &mut R, query: &mut Query) -> ModuleResult<()>
    where
        R: ScriptRuntime<Handle = H>,
    {
        let handle = match &self.read().slot {
            Slot::Loaded { handle, .. } => handle.clone(),
            Slot::Unloaded => {
                return Err(ModuleError::NotLoaded {
                    id: self.id.clone(),
                })
            }
        };

        runtime
            .invoke_callable(&handle, Callable::HandleQuery(query))
            .map_err(|cause| {
                let err = ModuleError::Call {
                    id: self.id.clone(),
                    operation: HANDLE_QUERY.to_string(),
                    cause,
                };
                warn!("{}", err);
                err
            })
    }

    fn notify_changed(&self, message: Option<String>) {
        let event = match message {
            Some(message) => {
                ModuleEvent::with_message(ModuleEventType::Changed, self.id.clone(), message)
            }
            None => ModuleEvent::new(ModuleEventType::Changed, self.id.clone()),
        };
        self.notifier.notify(Event::Module(event));
    }

    fn read(&self) -> RwLockReadGuard<'_, ModuleInner<H>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ModuleInner<H>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<H> std::fmt::Debug for Module<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("path", &self.path)
            .finish()
    }
}

/// Latest modification time of a module path
///
/// For a directory bundle the direct children count too, since editing a
/// file inside the bundle does not always touch the directory itself.
pub(crate) fn modification_stamp(path: &Path) -> Option<SystemTime> {
    let own = std::fs::metadata(path).and_then(|m| m.modified()).ok();
    if !path.is_dir() {
        return own;
    }

    let children = std::fs::read_dir(path)
        .into_iter()
        .flatten()
        .flatten()
        .filter_map(|entry| entry.metadata().and_then(|m| m.modified()).ok());

    own.into_iter().chain(children).max()
}
