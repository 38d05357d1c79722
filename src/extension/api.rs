//! Public API for the extension system
//!
//! Hosts build a `ModuleManager` from a `ScriptRuntime` and a
//! `SettingsStore`, then drive it with discovery, enable/disable and
//! requests.

pub use crate::extension::enabled::{EnabledModules, ENABLED_MODULES_KEY};
pub use crate::extension::error::{
    ManagerError, ManagerResult, ModuleError, ModuleResult, RuntimeError, RuntimeResult,
    SettingsError, SettingsResult,
};
pub use crate::extension::manager::{ManagerConfig, ModuleManager, ReconcileReport};
pub use crate::extension::module::Module;
pub use crate::extension::process::{
    ProcessHandle, ProcessRuntime, ProcessRuntimeConfig, BUNDLE_ENTRY, ENV_API_VERSION,
    ENV_MODULE_ID, ENV_MODULE_ROOTS,
};
pub use crate::extension::router::{route, RouteOutcome};
pub use crate::extension::runtime::{
    find_executable, forward_module_output, module_log, Callable, ModuleLogLevel, ScriptRuntime,
    FINALIZE, HANDLE_QUERY, INITIALIZE,
};
pub use crate::extension::scanner::{DirectoryScanner, DiscoveredModule, DEFAULT_RESERVED_NAMES};
pub use crate::extension::settings::{MemorySettingsStore, SettingsStore, TomlSettingsStore};
pub use crate::extension::types::{
    Action, ModuleAttributes, ModuleMetadata, ModuleState, ModuleSummary, Query, ResultItem,
    Urgency,
};
