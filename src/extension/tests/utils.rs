//! Extension Test Utilities
//!
//! A scripted runtime that records every call, plus helpers for building
//! module roots and managers.

use crate::extension::enabled::ENABLED_MODULES_KEY;
use crate::extension::error::{RuntimeError, RuntimeResult, SettingsError, SettingsResult};
use crate::extension::manager::{ManagerConfig, ModuleManager};
use crate::extension::runtime::{Callable, ScriptRuntime, FINALIZE, HANDLE_QUERY, INITIALIZE};
use crate::extension::settings::{MemorySettingsStore, SettingsStore};
use crate::extension::types::{ModuleAttributes, ResultItem};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Blocks a runtime call until the test releases it
#[derive(Default)]
pub struct Gate {
    state: Mutex<(bool, bool)>,
    cv: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn enter_and_wait(&self) {
        let mut state = self.state.lock().unwrap();
        state.0 = true;
        self.cv.notify_all();
        while !state.1 {
            state = self.cv.wait(state).unwrap();
        }
    }

    /// Wait until a call is parked at the gate
    pub fn wait_entered(&self) {
        let mut state = self.state.lock().unwrap();
        while !state.0 {
            let (next, timeout) = self
                .cv
                .wait_timeout(state, Duration::from_secs(5))
                .unwrap();
            state = next;
            assert!(!timeout.timed_out() || state.0, "gate never entered");
        }
    }

    pub fn release(&self) {
        let mut state = self.state.lock().unwrap();
        state.1 = true;
        self.cv.notify_all();
    }
}

/// Scripted behaviour of one module
#[derive(Clone, Default)]
pub struct MockModule {
    pub attributes: ModuleAttributes,
    pub fail_load: bool,
    pub fail_initialize: bool,
    pub fail_finalize: bool,
    pub fail_query: bool,
    pub mark_valid: bool,
    pub items: Vec<ResultItem>,
    pub query_gate: Option<Arc<Gate>>,
}

impl MockModule {
    /// A module with a query handler and no trigger
    pub fn passive() -> Self {
        Self {
            attributes: ModuleAttributes {
                callables: vec![HANDLE_QUERY.to_string()],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn triggered(trigger: &str) -> Self {
        let mut behaviour = Self::passive();
        behaviour.attributes.trigger = Some(trigger.to_string());
        behaviour
    }

    pub fn named(mut self, name: &str) -> Self {
        self.attributes.name = Some(name.to_string());
        self
    }

    pub fn with_callable(mut self, callable: &str) -> Self {
        self.attributes.callables.push(callable.to_string());
        self
    }

    pub fn without_handler(mut self) -> Self {
        self.attributes.callables.retain(|c| c != HANDLE_QUERY);
        self
    }

    pub fn marks_valid(mut self) -> Self {
        self.mark_valid = true;
        self
    }

    pub fn with_item(mut self, text: &str) -> Self {
        self.items.push(ResultItem::new(text, text));
        self
    }
}

#[derive(Default)]
pub struct MockState {
    pub behaviours: HashMap<String, MockModule>,
    pub calls: Vec<String>,
    pub roots: Vec<PathBuf>,
    pub fail_init: bool,
    pub active: usize,
    pub max_active: usize,
}

/// Runtime double; clones share state so tests can inspect it after the
/// manager takes ownership
#[derive(Clone, Default)]
pub struct MockRuntime {
    pub state: Arc<Mutex<MockState>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(self, id: &str, behaviour: MockModule) -> Self {
        self.set_behaviour(id, behaviour);
        self
    }

    pub fn set_behaviour(&self, id: &str, behaviour: MockModule) {
        self.state.lock().unwrap().behaviours.insert(id.to_string(), behaviour);
    }

    pub fn update_behaviour(&self, id: &str, f: impl FnOnce(&mut MockModule)) {
        let mut state = self.state.lock().unwrap();
        f(state.behaviours.entry(id.to_string()).or_insert_with(MockModule::passive));
    }

    pub fn failing_init() -> Self {
        let runtime = Self::new();
        runtime.state.lock().unwrap().fail_init = true;
        runtime
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of recorded calls with the given prefix, e.g. `"load:foo"`
    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn max_active(&self) -> usize {
        self.state.lock().unwrap().max_active
    }

    fn begin(&self, call: String) -> MockModule {
        let mut state = self.state.lock().unwrap();
        let id = call.split(':').nth(1).unwrap_or_default().to_string();
        state.calls.push(call);
        state.active += 1;
        state.max_active = state.max_active.max(state.active);
        state.behaviours.get(&id).cloned().unwrap_or_else(MockModule::passive)
    }

    fn end(&self) {
        self.state.lock().unwrap().active -= 1;
    }

    fn call_error(callable: &str, id: &str) -> RuntimeError {
        RuntimeError::Call {
            callable: callable.to_string(),
            message: format!("{} raised in {}", callable, id),
        }
    }
}

impl ScriptRuntime for MockRuntime {
    type Handle = String;

    fn initialize(&mut self) -> RuntimeResult<()> {
        if self.state.lock().unwrap().fail_init {
            return Err(RuntimeError::Init {
                message: "interpreter unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn register_module_root(&mut self, root: &Path) -> RuntimeResult<()> {
        self.state.lock().unwrap().roots.push(root.to_path_buf());
        Ok(())
    }

    fn execute_module_code(&mut self, id: &str, path: &Path) -> RuntimeResult<String> {
        let behaviour = self.begin(format!("load:{}", id));
        self.end();
        if behaviour.fail_load {
            return Err(RuntimeError::Load {
                path: path.to_path_buf(),
                message: "SyntaxError: invalid syntax".to_string(),
            });
        }
        Ok(id.to_string())
    }

    fn probe_attributes(&mut self, handle: &String) -> RuntimeResult<ModuleAttributes> {
        let state = self.state.lock().unwrap();
        Ok(state
            .behaviours
            .get(handle)
            .cloned()
            .unwrap_or_else(MockModule::passive)
            .attributes)
    }

    fn invoke_callable(&mut self, handle: &String, callable: Callable<'_>) -> RuntimeResult<()> {
        let result = match callable {
            Callable::Initialize => {
                let behaviour = self.begin(format!("init:{}", handle));
                if behaviour.fail_initialize {
                    Err(Self::call_error(INITIALIZE, handle))
                } else {
                    Ok(())
                }
            }
            Callable::Finalize => {
                let behaviour = self.begin(format!("finalize:{}", handle));
                if behaviour.fail_finalize {
                    Err(Self::call_error(FINALIZE, handle))
                } else {
                    Ok(())
                }
            }
            Callable::HandleQuery(query) => {
                let behaviour = self.begin(format!("query:{}", handle));
                if let Some(gate) = &behaviour.query_gate {
                    gate.enter_and_wait();
                }
                if behaviour.fail_query {
                    Err(Self::call_error(HANDLE_QUERY, handle))
                } else {
                    query.add_items(behaviour.items.clone());
                    if behaviour.mark_valid {
                        query.set_valid(true);
                    }
                    Ok(())
                }
            }
        };
        self.end();
        result
    }

    fn release_handle(&mut self, handle: String) {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(format!("release:{}", handle));
    }
}

/// Settings store whose writes always fail
#[derive(Default)]
pub struct FailingSettingsStore {
    inner: MemorySettingsStore,
}

impl SettingsStore for FailingSettingsStore {
    fn get(&self, key: &str) -> SettingsResult<Option<toml::Value>> {
        self.inner.get(key)
    }

    fn set(&mut self, _key: &str, _value: toml::Value) -> SettingsResult<()> {
        Err(SettingsError::Io {
            path: PathBuf::from("/read-only/settings.toml"),
            message: "Read-only file system".to_string(),
        })
    }
}

/// A module root containing one empty file per name
pub fn module_root(files: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for file in files {
        std::fs::write(dir.path().join(file), "").unwrap();
    }
    dir
}

pub fn enabled_settings(ids: &[&str]) -> MemorySettingsStore {
    let mut store = MemorySettingsStore::new();
    store
        .set(
            ENABLED_MODULES_KEY,
            toml::Value::Array(
                ids.iter()
                    .map(|id| toml::Value::String(id.to_string()))
                    .collect(),
            ),
        )
        .unwrap();
    store
}

pub fn manager_for(
    runtime: &MockRuntime,
    root: &Path,
    enabled: &[&str],
) -> ModuleManager<MockRuntime> {
    ModuleManager::new(
        runtime.clone(),
        Box::new(enabled_settings(enabled)),
        ManagerConfig::new().with_module_root(root),
    )
    .unwrap()
}

pub fn ids(manager: &ModuleManager<MockRuntime>) -> Vec<String> {
    manager
        .list_modules()
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect()
}
