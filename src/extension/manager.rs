//! Module Manager
//!
//! Owns the scripting runtime, the module collection and the enabled set,
//! and composes scanner and router into the host-facing contract.
//!
//! Lock order is runtime, then collection, then enabled set, then settings.
//! The runtime mutex is held for every load, unload and dispatch; the
//! collection and enabled-set locks are only held for bookkeeping, so
//! listing proceeds while a module call is running.

use crate::core::sync::{handle_mutex_poison, handle_rwlock_read, handle_rwlock_write};
use crate::extension::enabled::EnabledModules;
use crate::extension::error::{ManagerError, ManagerResult};
use crate::extension::module::Module;
use crate::extension::router::{self, RouteOutcome};
use crate::extension::runtime::ScriptRuntime;
use crate::extension::scanner::{DirectoryScanner, DEFAULT_RESERVED_NAMES};
use crate::extension::settings::SettingsStore;
use crate::extension::types::{ModuleSummary, Query};
use crate::notifications::api::{
    CollectionEvent, CollectionEventType, Event, EventFilter, EventReceiver, NotificationError,
    SharedNotifier, SystemEvent, SystemEventType,
};
use log::{debug, info, trace, warn};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Manager construction options
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Watched module roots; the first is the primary root
    pub module_roots: Vec<PathBuf>,
    /// Glob patterns of entry names that are never modules
    pub reserved_names: Vec<String>,
    /// Create the primary root if it does not exist
    pub create_primary_root: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            module_roots: Vec::new(),
            reserved_names: DEFAULT_RESERVED_NAMES.iter().map(|s| s.to_string()).collect(),
            create_primary_root: false,
        }
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.module_roots.push(root.into());
        self
    }

    pub fn with_module_roots(mut self, roots: impl IntoIterator<Item = PathBuf>) -> Self {
        self.module_roots.extend(roots);
        self
    }

    pub fn with_reserved_names(mut self, names: Vec<String>) -> Self {
        self.reserved_names = names;
        self
    }

    pub fn create_primary_root(mut self, create: bool) -> Self {
        self.create_primary_root = create;
        self
    }
}

/// What a reconciliation changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub removed: Vec<String>,
    pub added: Vec<String>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

type ModuleList<H> = Vec<Arc<Module<H>>>;

pub struct ModuleManager<R: ScriptRuntime> {
    runtime: Mutex<R>,
    modules: RwLock<ModuleList<R::Handle>>,
    enabled: RwLock<EnabledModules>,
    settings: Mutex<Box<dyn SettingsStore>>,
    scanner: DirectoryScanner,
    roots: Vec<PathBuf>,
    notifier: SharedNotifier,
    shut_down: AtomicBool,
}

impl<R: ScriptRuntime> ModuleManager<R> {
    /// Bring up the runtime and read the enabled set
    ///
    /// A runtime that fails to initialise is fatal. An unreadable enabled
    /// set is not: the session starts with nothing enabled.
    pub fn new(
        mut runtime: R,
        settings: Box<dyn SettingsStore>,
        config: ManagerConfig,
    ) -> ManagerResult<Self> {
        runtime.initialize()?;

        if config.create_primary_root {
            if let Some(primary) = config.module_roots.first() {
                std::fs::create_dir_all(primary).map_err(|e| ManagerError::Io {
                    path: primary.clone(),
                    message: e.to_string(),
                })?;
            }
        }

        for root in config.module_roots.iter().filter(|r| r.is_dir()) {
            if let Err(e) = runtime.register_module_root(root) {
                warn!("Could not register module root {}: {}", root.display(), e);
            }
        }

        let enabled = EnabledModules::load(&*settings).unwrap_or_else(|e| {
            warn!("Could not read enabled modules, starting with none: {}", e);
            EnabledModules::new()
        });
        debug!("{} module(s) enabled in settings", enabled.len());

        let notifier = SharedNotifier::new();
        notifier.notify(Event::System(SystemEvent::new(SystemEventType::Startup)));

        Ok(Self {
            runtime: Mutex::new(runtime),
            modules: RwLock::new(Vec::new()),
            enabled: RwLock::new(enabled),
            settings: Mutex::new(settings),
            scanner: DirectoryScanner::new(config.reserved_names),
            roots: config.module_roots,
            notifier,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn module_roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn notifier(&self) -> &SharedNotifier {
        &self.notifier
    }

    /// Observe module and collection changes
    pub fn subscribe(
        &self,
        subscriber_id: &str,
        filter: EventFilter,
    ) -> Result<EventReceiver, NotificationError> {
        self.notifier
            .subscribe(subscriber_id, filter, "extension::manager")
    }

    /// Reconcile every existing module root
    pub fn discover_and_load(&self) -> ManagerResult<ReconcileReport> {
        let roots: Vec<PathBuf> = self.roots.iter().filter(|r| r.is_dir()).cloned().collect();
        let report = self.reconcile(&roots)?;
        info!(
            "Discovered {} module(s) in {} root(s)",
            report.added.len(),
            roots.len()
        );
        Ok(report)
    }

    /// Filesystem-change entry point for one watched root
    pub fn update_directory(&self, path: &Path) -> ManagerResult<ReconcileReport> {
        if !self.roots.iter().any(|r| r == path) {
            return Err(ManagerError::Configuration {
                message: format!("'{}' is not a module root", path.display()),
            });
        }
        if path.is_dir() {
            self.reconcile(&[path.to_path_buf()])
        } else {
            // Root gone: pruning alone drops its modules
            self.reconcile(&[])
        }
    }

    fn reconcile(&self, roots: &[PathBuf]) -> ManagerResult<ReconcileReport> {
        let mut runtime = self.lock_runtime()?;

        let (removed, added) = {
            let mut modules = self.write_modules()?;
            let removed = self.scanner.prune(&mut modules);

            let mut known: HashSet<String> = modules.iter().map(|m| m.id().to_string()).collect();
            let discovered = roots
                .iter()
                .flat_map(|root| self.scanner.discover(root, &mut known))
                .collect();
            let added = DirectoryScanner::instantiate(discovered, &self.notifier);
            modules.extend(added.iter().cloned());
            (removed, added)
        };

        for module in &removed {
            module.unload(&mut *runtime);
        }

        let added_ids: HashSet<&str> = added.iter().map(|m| m.id()).collect();
        let to_load: Vec<_> = {
            let modules = self.read_modules()?;
            let enabled = self.read_enabled()?;
            modules
                .iter()
                .filter(|m| enabled.is_enabled(m.id()))
                .filter(|m| added_ids.contains(m.id()) || m.needs_retry())
                .cloned()
                .collect()
        };
        for module in &to_load {
            // Failures are recorded on the module
            let _ = module.load(&mut *runtime);
        }

        let count = {
            let mut modules = self.write_modules()?;
            DirectoryScanner::sort(&mut modules);
            modules.len()
        };
        drop(runtime);

        self.notifier
            .notify(Event::Collection(CollectionEvent::new(CollectionEventType::Changed, count)));

        let report = ReconcileReport {
            removed: removed.iter().map(|m| m.id().to_string()).collect(),
            added: added.iter().map(|m| m.id().to_string()).collect(),
        };
        if !report.is_empty() {
            debug!(
                "Reconciled modules: {} added, {} removed",
                report.added.len(),
                report.removed.len()
            );
        }
        Ok(report)
    }

    /// Modules in canonical order
    pub fn list_modules(&self) -> ManagerResult<Vec<ModuleSummary>> {
        let modules = self.read_modules()?;
        let enabled = self.read_enabled()?;
        Ok(modules
            .iter()
            .map(|m| m.summary(enabled.is_enabled(m.id())))
            .collect())
    }

    pub fn module(&self, id: &str) -> ManagerResult<ModuleSummary> {
        let module = self
            .find(id)?
            .ok_or_else(|| ManagerError::module_not_found(id))?;
        let enabled = self.is_enabled(id);
        Ok(module.summary(enabled))
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        match self.enabled.read() {
            Ok(enabled) => enabled.is_enabled(id),
            Err(poisoned) => poisoned.into_inner().is_enabled(id),
        }
    }

    /// Enable or disable a module, loading or unloading it if present
    ///
    /// The change always takes effect for the session. A persistence
    /// failure is returned after the load/unload has happened.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> ManagerResult<()> {
        let mut runtime = self.lock_runtime()?;

        let persisted = {
            let mut set = self.write_enabled()?;
            let mut settings = self.lock_settings()?;
            set.set_enabled(id, enabled, &mut **settings)
        };

        if let Some(module) = self.find(id)? {
            if enabled {
                let _ = module.load(&mut *runtime);
                let mut modules = self.write_modules()?;
                DirectoryScanner::sort(&mut modules);
            } else {
                module.unload(&mut *runtime);
            }
        } else {
            debug!("No module '{}' present; enabled set updated only", id);
        }
        drop(runtime);

        persisted.map_err(|source| {
            warn!("Enabled modules not saved: {}", source);
            ManagerError::Persistence {
                id: id.to_string(),
                source,
            }
        })
    }

    /// Route a request to the eligible modules
    pub fn handle_request(&self, query: &mut Query) -> ManagerResult<RouteOutcome> {
        let mut runtime = self.lock_runtime()?;
        let modules = self.read_modules()?.clone();
        let enabled = self.read_enabled()?.clone();
        Ok(router::route(&mut *runtime, &modules, &enabled, query))
    }

    /// Non-empty triggers of enabled, loaded modules
    pub fn triggers(&self) -> ManagerResult<BTreeSet<String>> {
        let modules = self.read_modules()?;
        let enabled = self.read_enabled()?;
        Ok(modules
            .iter()
            .filter(|m| enabled.is_enabled(m.id()) && m.is_loaded())
            .map(|m| m.trigger())
            .filter(|t| !t.is_empty())
            .collect())
    }

    /// Unload every module; later calls are no-ops
    pub fn shutdown(&self) -> ManagerResult<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut runtime = self.lock_runtime()?;
        let modules = self.read_modules()?.clone();
        for module in modules.iter().filter(|m| m.is_loaded()) {
            module.unload(&mut *runtime);
        }
        drop(runtime);

        info!("Module manager shut down");
        self.notifier
            .notify(Event::System(SystemEvent::new(SystemEventType::Shutdown)));
        Ok(())
    }

    fn find(&self, id: &str) -> ManagerResult<Option<Arc<Module<R::Handle>>>> {
        Ok(self.read_modules()?.iter().find(|m| m.id() == id).cloned())
    }

    fn lock_runtime(&self) -> ManagerResult<MutexGuard<'_, R>> {
        trace!("Acquiring runtime lock");
        handle_mutex_poison(self.runtime.lock(), |message| {
            ManagerError::Synchronisation { message }
        })
    }

    fn lock_settings(&self) -> ManagerResult<MutexGuard<'_, Box<dyn SettingsStore>>> {
        handle_mutex_poison(self.settings.lock(), |message| {
            ManagerError::Synchronisation { message }
        })
    }

    fn read_modules(&self) -> ManagerResult<RwLockReadGuard<'_, ModuleList<R::Handle>>> {
        handle_rwlock_read(self.modules.read(), |message| {
            ManagerError::Synchronisation { message }
        })
    }

    fn write_modules(&self) -> ManagerResult<RwLockWriteGuard<'_, ModuleList<R::Handle>>> {
        handle_rwlock_write(self.modules.write(), |message| {
            ManagerError::Synchronisation { message }
        })
    }

    fn read_enabled(&self) -> ManagerResult<RwLockReadGuard<'_, EnabledModules>> {
        handle_rwlock_read(self.enabled.read(), |message| {
            ManagerError::Synchronisation { message }
        })
    }

    fn write_enabled(&self) -> ManagerResult<RwLockWriteGuard<'_, EnabledModules>> {
        handle_rwlock_write(self.enabled.write(), |message| {
            ManagerError::Synchronisation { message }
        })
    }
}

impl<R: ScriptRuntime> Drop for ModuleManager<R> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Module manager shutdown failed: {}", e);
        }
    }
}
