//! Shared helpers for integration tests
//!
//! Modules are small `sh` scripts run through the `sh` interpreter, so the
//! tests never execute a file they have just written.

#![allow(dead_code)]

use modhost::extension::api::{
    ManagerConfig, MemorySettingsStore, ModuleManager, ProcessRuntime, ProcessRuntimeConfig,
    SettingsStore, ENABLED_MODULES_KEY,
};
use std::fs;
use std::path::{Path, PathBuf};

/// A module answering every verb; `metadata` prints `metadata_json`
pub fn script(metadata_json: &str, query_body: &str) -> String {
    format!(
        r#"#!/bin/sh
case "$1" in
  metadata)
    cat <<'JSON'
{metadata_json}
JSON
    ;;
  initialize)
    echo "info: $MODHOST_MODULE_ID ready" >&2
    ;;
  finalize)
    echo "debug: $MODHOST_MODULE_ID stopping" >&2
    ;;
  query)
{query_body}
    ;;
  *)
    exit 2
    ;;
esac
"#
    )
}

/// Query body that records the request and answers with one valid item
pub const ECHO_QUERY: &str = r#"    cat > last_query.json
    printf '{"items":[{"id":"%s","text":"%s"}],"valid":true}' "$MODHOST_MODULE_ID" "$MODHOST_MODULE_ID""#;

/// Query body that answers with nothing and leaves the request invalid
pub const SILENT_QUERY: &str = r#"    cat > /dev/null
    echo '{"items":[],"valid":false}'"#;

pub fn write_module(dir: &Path, file: &str, contents: &str) -> PathBuf {
    let path = dir.join(file);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

pub fn sh_runtime() -> ProcessRuntime {
    ProcessRuntime::new(ProcessRuntimeConfig::new().with_interpreter("sh", "sh"))
}

pub fn settings_with(enabled: &[&str]) -> MemorySettingsStore {
    let mut store = MemorySettingsStore::new();
    store
        .set(
            ENABLED_MODULES_KEY,
            toml::Value::Array(
                enabled
                    .iter()
                    .map(|id| toml::Value::String(id.to_string()))
                    .collect(),
            ),
        )
        .unwrap();
    store
}

pub fn process_manager(root: &Path, enabled: &[&str]) -> ModuleManager<ProcessRuntime> {
    ModuleManager::new(
        sh_runtime(),
        Box::new(settings_with(enabled)),
        ManagerConfig::new().with_module_root(root),
    )
    .unwrap()
}
