//! Runtime capability
//!
//! The scripting runtime is a single, non-reentrant execution context. The
//! manager owns exactly one `ScriptRuntime` behind a mutex, and every method
//! here takes `&mut self`, so code can only reach the runtime while holding
//! that lock.

use crate::core::logging::MODULE_TARGET_PREFIX;
use crate::extension::error::RuntimeResult;
use crate::extension::types::{ModuleAttributes, Query};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Mandatory query handler callable
pub const HANDLE_QUERY: &str = "handleQuery";
/// Optional callable run after a successful import
pub const INITIALIZE: &str = "initialize";
/// Optional callable run before the module is released
pub const FINALIZE: &str = "finalize";

/// A callable a module may provide, with its arguments
pub enum Callable<'a> {
    Initialize,
    Finalize,
    HandleQuery(&'a mut Query),
}

impl Callable<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Callable::Initialize => INITIALIZE,
            Callable::Finalize => FINALIZE,
            Callable::HandleQuery(_) => HANDLE_QUERY,
        }
    }
}

/// The embedded scripting runtime as seen by the manager
pub trait ScriptRuntime: Send {
    /// Runtime-side handle (namespace, module object, process descriptor)
    type Handle: Clone + Send + Sync + 'static;

    /// Bring the runtime up; failure is fatal to the manager
    fn initialize(&mut self) -> RuntimeResult<()> {
        Ok(())
    }

    /// Make a module root visible to module code (import path and similar)
    fn register_module_root(&mut self, _root: &Path) -> RuntimeResult<()> {
        Ok(())
    }

    /// Import/execute the module's code
    fn execute_module_code(&mut self, id: &str, path: &Path) -> RuntimeResult<Self::Handle>;

    /// Report which optional attributes the module declared
    fn probe_attributes(&mut self, handle: &Self::Handle) -> RuntimeResult<ModuleAttributes>;

    /// Invoke one of the module's callables
    fn invoke_callable(
        &mut self,
        handle: &Self::Handle,
        callable: Callable<'_>,
    ) -> RuntimeResult<()>;

    /// Drop the runtime-side handle/namespace
    fn release_handle(&mut self, handle: Self::Handle);
}

/// Log levels exposed to module code
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::EnumString, strum_macros::Display)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ModuleLogLevel {
    Debug,
    Info,
    Warning,
    Critical,
}

impl From<ModuleLogLevel> for log::Level {
    fn from(level: ModuleLogLevel) -> Self {
        match level {
            ModuleLogLevel::Debug => log::Level::Debug,
            ModuleLogLevel::Info => log::Level::Info,
            ModuleLogLevel::Warning => log::Level::Warn,
            ModuleLogLevel::Critical => log::Level::Error,
        }
    }
}

/// One-way log sink for module code
pub fn module_log(module_id: &str, level: ModuleLogLevel, message: &str) {
    let target = format!("{}{}", MODULE_TARGET_PREFIX, module_id);
    log::log!(target: &target, level.into(), "{}", message);
}

/// Forward diagnostic output of module code line by line
///
/// Lines of the form `level: message` use that level; anything else is
/// treated as a warning, since unprefixed output is usually a traceback.
pub fn forward_module_output(module_id: &str, output: &str) {
    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        let (level, message) = split_level(line);
        module_log(module_id, level, message);
    }
}

fn split_level(line: &str) -> (ModuleLogLevel, &str) {
    if let Some((prefix, rest)) = line.split_once(':') {
        if let Ok(level) = ModuleLogLevel::from_str(prefix.trim()) {
            return (level, rest.trim_start());
        }
    }
    (ModuleLogLevel::Warning, line)
}

/// Locate an executable by name on `PATH` (or verify an explicit path)
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|full| is_executable(full))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
