//! Process runtime
//!
//! Runs each module as an external program speaking a small JSON protocol
//! over its standard streams. The program is called with one verb:
//!
//! - `metadata`: print the module attributes as a JSON object
//! - `query`: read the request from stdin, print `{"items": [...], "valid": bool}`
//! - `initialize` / `finalize`: optional lifecycle hooks
//!
//! Diagnostics go to stderr as `level: message` lines and end up in the log
//! under the module's target.

use crate::core::version::get_api_version;
use crate::extension::error::{RuntimeError, RuntimeResult};
use crate::extension::runtime::{
    find_executable, forward_module_output, Callable, ScriptRuntime, HANDLE_QUERY,
};
use crate::extension::types::{ModuleAttributes, ResultItem};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Environment variable carrying the module id
pub const ENV_MODULE_ID: &str = "MODHOST_MODULE_ID";
/// Environment variable carrying the host api version
pub const ENV_API_VERSION: &str = "MODHOST_API_VERSION";
/// Environment variable carrying the registered module roots
pub const ENV_MODULE_ROOTS: &str = "MODHOST_MODULE_ROOTS";

/// Entry point name inside a directory bundle
pub const BUNDLE_ENTRY: &str = "main";

#[derive(Debug, Clone, Default)]
pub struct ProcessRuntimeConfig {
    /// File extension (without dot) to interpreter command line
    pub interpreters: BTreeMap<String, Vec<String>>,
}

impl ProcessRuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an interpreter; the command line is split on whitespace
    pub fn with_interpreter(mut self, extension: &str, command_line: &str) -> Self {
        self.interpreters.insert(
            extension.trim_start_matches('.').to_lowercase(),
            command_line.split_whitespace().map(str::to_string).collect(),
        );
        self
    }
}

/// A module program ready to be invoked
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    id: String,
    program: PathBuf,
    args: Vec<String>,
    cwd: PathBuf,
    attributes: ModuleAttributes,
}

impl ProcessHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[derive(Serialize)]
struct QueryPayload<'a> {
    string: &'a str,
    #[serde(rename = "rawString")]
    raw_string: &'a str,
    trigger: &'a str,
    #[serde(rename = "isTriggered")]
    is_triggered: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    items: Vec<ResultItem>,
    #[serde(default)]
    valid: bool,
}

#[derive(Debug, Default)]
pub struct ProcessRuntime {
    config: ProcessRuntimeConfig,
    roots: Vec<PathBuf>,
}

impl ProcessRuntime {
    pub fn new(config: ProcessRuntimeConfig) -> Self {
        Self {
            config,
            roots: Vec::new(),
        }
    }

    pub fn module_roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn entry_point(path: &Path) -> Result<PathBuf, String> {
        if !path.is_dir() {
            return Ok(path.to_path_buf());
        }

        let exact = path.join(BUNDLE_ENTRY);
        if exact.is_file() {
            return Ok(exact);
        }

        let mut candidates: Vec<PathBuf> = std::fs::read_dir(path)
            .map_err(|e| e.to_string())?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.file_stem().and_then(|s| s.to_str()) == Some(BUNDLE_ENTRY))
            .collect();
        candidates.sort();
        candidates
            .into_iter()
            .next()
            .ok_or_else(|| format!("bundle has no '{}' entry point", BUNDLE_ENTRY))
    }

    fn command_for(&self, entry: &Path) -> (PathBuf, Vec<String>) {
        let interpreter = entry
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| self.config.interpreters.get(&ext.to_lowercase()))
            .filter(|cmd| !cmd.is_empty());

        match interpreter {
            Some(cmd) => {
                let mut args: Vec<String> = cmd[1..].to_vec();
                args.push(entry.to_string_lossy().into_owned());
                (PathBuf::from(&cmd[0]), args)
            }
            None => (entry.to_path_buf(), Vec::new()),
        }
    }

    fn run(&self, handle: &ProcessHandle, verb: &str, input: Option<Vec<u8>>) -> Result<Vec<u8>, String> {
        trace!("Running '{}' {}", handle.id, verb);
        let roots = std::env::join_paths(&self.roots).unwrap_or_default();

        let mut child = Command::new(&handle.program)
            .args(&handle.args)
            .arg(verb)
            .current_dir(&handle.cwd)
            .env(ENV_MODULE_ID, &handle.id)
            .env(ENV_API_VERSION, get_api_version().to_string())
            .env(ENV_MODULE_ROOTS, roots)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format!("cannot start {}: {}", handle.program.display(), e))?;

        let writer = match (input, child.stdin.take()) {
            (Some(bytes), Some(mut stdin)) => Some(std::thread::spawn(move || {
                match stdin.write_all(&bytes) {
                    // The module may exit without reading its input
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                    other => other,
                }
            })),
            _ => None,
        };

        let output = child.wait_with_output().map_err(|e| e.to_string())?;
        if let Some(writer) = writer {
            match writer.join() {
                Ok(Err(e)) => return Err(format!("cannot write request: {}", e)),
                Err(_) => return Err("request writer panicked".to_string()),
                Ok(Ok(())) => {}
            }
        }

        forward_module_output(&handle.id, &String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(format!("'{}' exited with {}", verb, output.status));
        }
        Ok(output.stdout)
    }

    fn call_error(callable: &str, message: String) -> RuntimeError {
        RuntimeError::Call {
            callable: callable.to_string(),
            message,
        }
    }
}

impl ScriptRuntime for ProcessRuntime {
    type Handle = ProcessHandle;

    fn initialize(&mut self) -> RuntimeResult<()> {
        for (ext, cmd) in &self.config.interpreters {
            let program = cmd.first().ok_or_else(|| RuntimeError::Init {
                message: format!("interpreter for '.{}' is empty", ext),
            })?;
            if find_executable(program).is_none() {
                return Err(RuntimeError::Init {
                    message: format!("interpreter '{}' for '.{}' not found", program, ext),
                });
            }
        }
        debug!(
            "Process runtime ready with {} interpreter(s)",
            self.config.interpreters.len()
        );
        Ok(())
    }

    fn register_module_root(&mut self, root: &Path) -> RuntimeResult<()> {
        if !self.roots.iter().any(|r| r == root) {
            self.roots.push(root.to_path_buf());
        }
        Ok(())
    }

    fn execute_module_code(&mut self, id: &str, path: &Path) -> RuntimeResult<ProcessHandle> {
        let load_error = |message: String| RuntimeError::Load {
            path: path.to_path_buf(),
            message,
        };

        let entry = Self::entry_point(path).map_err(load_error)?;
        let (program, args) = self.command_for(&entry);
        let cwd = if path.is_dir() {
            path.to_path_buf()
        } else {
            path.parent().map(Path::to_path_buf).unwrap_or_default()
        };

        let mut handle = ProcessHandle {
            id: id.to_string(),
            program,
            args,
            cwd,
            attributes: ModuleAttributes::default(),
        };

        let stdout = self.run(&handle, "metadata", None).map_err(load_error)?;
        handle.attributes = serde_json::from_slice(&stdout)
            .map_err(|e| load_error(format!("invalid metadata: {}", e)))?;
        Ok(handle)
    }

    fn probe_attributes(&mut self, handle: &ProcessHandle) -> RuntimeResult<ModuleAttributes> {
        Ok(handle.attributes.clone())
    }

    fn invoke_callable(&mut self, handle: &ProcessHandle, callable: Callable<'_>) -> RuntimeResult<()> {
        match callable {
            Callable::HandleQuery(query) => {
                let payload = QueryPayload {
                    string: query.text(),
                    raw_string: query.raw_text(),
                    trigger: query.trigger(),
                    is_triggered: query.is_triggered(),
                };
                let input = serde_json::to_vec(&payload)
                    .map_err(|e| Self::call_error(HANDLE_QUERY, e.to_string()))?;
                let stdout = self
                    .run(handle, "query", Some(input))
                    .map_err(|e| Self::call_error(HANDLE_QUERY, e))?;
                let response: QueryResponse = serde_json::from_slice(&stdout)
                    .map_err(|e| Self::call_error(HANDLE_QUERY, format!("invalid response: {}", e)))?;
                query.add_items(response.items);
                if response.valid {
                    query.set_valid(true);
                }
                Ok(())
            }
            other => {
                let verb = other.name();
                self.run(handle, verb, None)
                    .map(|_| ())
                    .map_err(|e| Self::call_error(verb, e))
            }
        }
    }

    fn release_handle(&mut self, handle: ProcessHandle) {
        trace!("Released '{}'", handle.id);
    }
}
