//! Extension System Error Handling
//!
//! Per-module failures (`ModuleError`) are recorded on the module and never
//! escalate; only `ManagerError::RuntimeInit` is fatal to the manager.

use crate::core::error_handling::ContextualError;
use std::path::PathBuf;

/// Result type alias for runtime capability calls
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

/// Result type alias for module state machine operations
pub type ModuleResult<T> = std::result::Result<T, ModuleError>;

/// Result type alias for settings persistence
pub type SettingsResult<T> = std::result::Result<T, SettingsError>;

/// Result type alias for manager operations
pub type ManagerResult<T> = std::result::Result<T, ManagerError>;

/// Failures reported by the scripting runtime
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    /// The runtime itself could not start
    #[error("Runtime initialisation failed: {message}")]
    Init { message: String },

    /// Module code could not be imported or executed
    #[error("Module code at '{}' failed to execute: {message}", .path.display())]
    Load { path: PathBuf, message: String },

    /// A module callable raised
    #[error("Callable '{callable}' failed: {message}")]
    Call { callable: String, message: String },
}

/// Per-module failures, recorded as the module's last error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModuleError {
    #[error("Failed to load module '{id}': {cause}")]
    Load {
        id: String,
        #[source]
        cause: RuntimeError,
    },

    #[error("Module '{id}' does not provide a '{callable}' callable")]
    MissingHandler { id: String, callable: String },

    #[error("Module '{id}' has incompatible API version {module_version} (expected major version {host_major})")]
    IncompatibleApi {
        id: String,
        module_version: u32,
        host_major: u32,
    },

    #[error("Module '{id}' has missing dependencies: {}", .missing.join(", "))]
    MissingDependencies { id: String, missing: Vec<String> },

    #[error("Module '{id}' failed during '{operation}': {cause}")]
    Call {
        id: String,
        operation: String,
        #[source]
        cause: RuntimeError,
    },

    #[error("Module '{id}' is not loaded")]
    NotLoaded { id: String },
}

impl ModuleError {
    /// Id of the module the error belongs to
    pub fn module_id(&self) -> &str {
        match self {
            ModuleError::Load { id, .. }
            | ModuleError::MissingHandler { id, .. }
            | ModuleError::IncompatibleApi { id, .. }
            | ModuleError::MissingDependencies { id, .. }
            | ModuleError::Call { id, .. }
            | ModuleError::NotLoaded { id } => id,
        }
    }
}

/// Persistence capability failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("Cannot access settings file '{}': {message}", .path.display())]
    Io { path: PathBuf, message: String },

    #[error("Settings file '{}' is malformed: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Settings value could not be serialised: {message}")]
    Serialize { message: String },
}

/// Errors surfaced to the host by the manager
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("Scripting runtime failed to initialise")]
    RuntimeInit {
        #[from]
        source: RuntimeError,
    },

    #[error("Enabled-set change for '{id}' was applied but not persisted")]
    Persistence {
        id: String,
        #[source]
        source: SettingsError,
    },

    #[error("{message}")]
    ModuleNotFound { id: String, message: String },

    #[error("{message}")]
    Configuration { message: String },

    #[error("Internal synchronisation error: {message}")]
    Synchronisation { message: String },

    #[error("IO error on '{}': {message}", .path.display())]
    Io { path: PathBuf, message: String },
}

impl ManagerError {
    pub fn module_not_found(id: &str) -> Self {
        ManagerError::ModuleNotFound {
            id: id.to_string(),
            message: format!("Unknown module '{}'", id),
        }
    }
}

impl ContextualError for RuntimeError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, RuntimeError::Init { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            RuntimeError::Init { message } => Some(message),
            _ => None,
        }
    }
}

/// Module failures are shown in listings, never reported as fatal
impl ContextualError for ModuleError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

impl ContextualError for ManagerError {
    fn is_user_actionable(&self) -> bool {
        match self {
            ManagerError::ModuleNotFound { .. } | ManagerError::Configuration { .. } => true,
            ManagerError::RuntimeInit { source } => source.is_user_actionable(),
            _ => false,
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ManagerError::Configuration { message } => Some(message),
            ManagerError::ModuleNotFound { message, .. } => Some(message),
            ManagerError::RuntimeInit { source } => source.user_message(),
            _ => None,
        }
    }
}

impl ContextualError for SettingsError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, SettingsError::Parse { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            SettingsError::Parse { message, .. } => Some(message),
            _ => None,
        }
    }
}
