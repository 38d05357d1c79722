//! Manager contract tests

use super::utils::{
    enabled_settings, ids, manager_for, module_root, FailingSettingsStore, MockRuntime,
    MockModule,
};
use crate::extension::enabled::EnabledModules;
use crate::extension::error::{ManagerError, RuntimeError};
use crate::extension::manager::{ManagerConfig, ModuleManager};
use crate::extension::settings::{MemorySettingsStore, SettingsStore, TomlSettingsStore};
use crate::extension::types::{ModuleState, Query};
use crate::notifications::api::{Event, EventFilter, SystemEventType};
use std::collections::BTreeSet;

#[test]
fn test_runtime_init_failure_is_fatal() {
    let result = ModuleManager::new(
        MockRuntime::failing_init(),
        Box::new(MemorySettingsStore::new()),
        ManagerConfig::new(),
    );
    assert!(matches!(
        result,
        Err(ManagerError::RuntimeInit {
            source: RuntimeError::Init { .. }
        })
    ));
}

#[test]
fn test_primary_root_is_created_and_registered() {
    let base = tempfile::TempDir::new().unwrap();
    let primary = base.path().join("modules");
    let runtime = MockRuntime::new();

    let manager = ModuleManager::new(
        runtime.clone(),
        Box::new(MemorySettingsStore::new()),
        ManagerConfig::new()
            .with_module_root(&primary)
            .with_module_root(base.path().join("missing"))
            .create_primary_root(true),
    )
    .unwrap();

    assert!(primary.is_dir());
    assert_eq!(runtime.state.lock().unwrap().roots, vec![primary.clone()]);
    assert_eq!(manager.module_roots().len(), 2);
}

#[test]
fn test_scenario_trigger_and_passive_dispatch() {
    let root = module_root(&["foo.py", "bar.py"]);
    let runtime = MockRuntime::new()
        .with_module("foo", MockModule::passive())
        .with_module("bar", MockModule::triggered("b "));
    let manager = manager_for(&runtime, root.path(), &["foo", "bar"]);
    manager.discover_and_load().unwrap();

    assert_eq!(ids(&manager), vec!["foo", "bar"]);
    runtime.clear_calls();

    let mut triggered = Query::triggered("b ", "x");
    let outcome = manager.handle_request(&mut triggered).unwrap();
    assert_eq!(outcome.handled_by, vec!["bar"]);
    assert_eq!(runtime.calls(), vec!["query:bar"]);

    runtime.clear_calls();
    let mut passive = Query::new("y");
    let outcome = manager.handle_request(&mut passive).unwrap();
    assert_eq!(outcome.handled_by, vec!["foo"]);
    assert_eq!(runtime.calls(), vec!["query:foo"]);
}

#[test]
fn test_only_enabled_modules_load_on_discovery() {
    let root = module_root(&["on.py", "off.py"]);
    let runtime = MockRuntime::new();
    let manager = manager_for(&runtime, root.path(), &["on"]);
    manager.discover_and_load().unwrap();

    let modules = manager.list_modules().unwrap();
    let state = |id: &str| modules.iter().find(|m| m.id == id).unwrap().state;
    assert_eq!(state("on"), ModuleState::Loaded);
    assert_eq!(state("off"), ModuleState::Unloaded);
    assert_eq!(runtime.count("load:off"), 0);
}

#[test]
fn test_enable_loads_and_disable_unloads() {
    let root = module_root(&["calc.py"]);
    let runtime = MockRuntime::new();
    let manager = manager_for(&runtime, root.path(), &[]);
    manager.discover_and_load().unwrap();
    assert_eq!(manager.module("calc").unwrap().state, ModuleState::Unloaded);

    manager.set_enabled("calc", true).unwrap();
    assert!(manager.is_enabled("calc"));
    assert_eq!(manager.module("calc").unwrap().state, ModuleState::Loaded);

    manager.set_enabled("calc", false).unwrap();
    assert!(!manager.is_enabled("calc"));
    assert_eq!(manager.module("calc").unwrap().state, ModuleState::Unloaded);
    assert_eq!(runtime.count("release:calc"), 1);
}

#[test]
fn test_enable_retries_failed_load() {
    let root = module_root(&["flaky.py"]);
    let runtime = MockRuntime::new().with_module(
        "flaky",
        MockModule {
            fail_load: true,
            ..MockModule::passive()
        },
    );
    let manager = manager_for(&runtime, root.path(), &["flaky"]);
    manager.discover_and_load().unwrap();
    assert!(manager.module("flaky").unwrap().last_error.is_some());

    runtime.update_behaviour("flaky", |behaviour| behaviour.fail_load = false);
    manager.set_enabled("flaky", true).unwrap();
    let summary = manager.module("flaky").unwrap();
    assert_eq!(summary.state, ModuleState::Loaded);
    assert!(summary.last_error.is_none());
}

#[test]
fn test_enable_unknown_id_is_remembered() {
    let root = module_root(&[]);
    let runtime = MockRuntime::new();
    let manager = manager_for(&runtime, root.path(), &[]);

    manager.set_enabled("later", true).unwrap();
    assert!(manager.is_enabled("later"));
    assert!(matches!(
        manager.module("later"),
        Err(ManagerError::ModuleNotFound { .. })
    ));

    std::fs::write(root.path().join("later.py"), "").unwrap();
    manager.update_directory(root.path()).unwrap();
    assert_eq!(manager.module("later").unwrap().state, ModuleState::Loaded);
}

#[test]
fn test_persistence_failure_keeps_session_state() {
    let root = module_root(&["calc.py"]);
    let runtime = MockRuntime::new();
    let manager = ModuleManager::new(
        runtime.clone(),
        Box::new(FailingSettingsStore::default()),
        ManagerConfig::new().with_module_root(root.path()),
    )
    .unwrap();
    manager.discover_and_load().unwrap();

    let err = manager.set_enabled("calc", true).unwrap_err();
    assert!(matches!(err, ManagerError::Persistence { ref id, .. } if id == "calc"));
    assert!(manager.is_enabled("calc"));
    assert_eq!(manager.module("calc").unwrap().state, ModuleState::Loaded);
}

#[test]
fn test_enabled_set_survives_restart() {
    let root = module_root(&["calc.py"]);
    let settings_dir = tempfile::TempDir::new().unwrap();
    let settings_path = settings_dir.path().join("settings.toml");

    {
        let manager = ModuleManager::new(
            MockRuntime::new(),
            Box::new(TomlSettingsStore::open(&settings_path).unwrap()),
            ManagerConfig::new().with_module_root(root.path()),
        )
        .unwrap();
        manager.set_enabled("calc", true).unwrap();
    }

    let store = TomlSettingsStore::open(&settings_path).unwrap();
    assert!(EnabledModules::load(&store).unwrap().is_enabled("calc"));

    let runtime = MockRuntime::new();
    let manager = ModuleManager::new(
        runtime.clone(),
        Box::new(store),
        ManagerConfig::new().with_module_root(root.path()),
    )
    .unwrap();
    manager.discover_and_load().unwrap();
    assert_eq!(manager.module("calc").unwrap().state, ModuleState::Loaded);
}

#[test]
fn test_unreadable_enabled_set_starts_empty() {
    let root = module_root(&["calc.py"]);
    let mut store = MemorySettingsStore::new();
    store
        .set("enabled_modules", toml::Value::Integer(1))
        .unwrap();
    let manager = ModuleManager::new(
        MockRuntime::new(),
        Box::new(store),
        ManagerConfig::new().with_module_root(root.path()),
    )
    .unwrap();
    assert!(!manager.is_enabled("calc"));
}

#[test]
fn test_triggers_lists_enabled_loaded_only() {
    let root = module_root(&["web.py", "calc.py", "off.py", "plain.py"]);
    let runtime = MockRuntime::new()
        .with_module("web", MockModule::triggered("w "))
        .with_module("calc", MockModule::triggered("= "))
        .with_module("off", MockModule::triggered("o "))
        .with_module("plain", MockModule::passive());
    let manager = manager_for(&runtime, root.path(), &["web", "calc", "plain"]);
    manager.discover_and_load().unwrap();

    let expected: BTreeSet<String> = ["w ", "= "].iter().map(|s| s.to_string()).collect();
    assert_eq!(manager.triggers().unwrap(), expected);
}

#[test]
fn test_triggered_query_from_input() {
    let root = module_root(&["web.py", "wiki.py"]);
    let runtime = MockRuntime::new()
        .with_module("web", MockModule::triggered("w "))
        .with_module("wiki", MockModule::triggered("wi "));
    let manager = manager_for(&runtime, root.path(), &["web", "wiki"]);
    manager.discover_and_load().unwrap();

    let triggers = manager.triggers().unwrap();
    let mut query = Query::from_input("wi rust", &triggers);
    assert_eq!(query.trigger(), "wi ");
    assert_eq!(query.text(), "rust");

    let outcome = manager.handle_request(&mut query).unwrap();
    assert_eq!(outcome.handled_by, vec!["wiki"]);
}

#[test]
fn test_load_failure_isolated_from_others() {
    let root = module_root(&["alpha.py", "broken.py", "zeta.py"]);
    let runtime = MockRuntime::new().with_module(
        "broken",
        MockModule {
            fail_load: true,
            ..MockModule::passive()
        },
    );
    let manager = manager_for(&runtime, root.path(), &["alpha", "broken", "zeta"]);
    manager.discover_and_load().unwrap();

    for summary in manager.list_modules().unwrap() {
        if summary.id == "broken" {
            assert_eq!(summary.state, ModuleState::Unloaded);
            assert!(summary.last_error.is_some());
        } else {
            assert_eq!(summary.state, ModuleState::Loaded);
        }
    }

    // The runtime lock is free again
    let mut query = Query::new("x");
    let outcome = manager.handle_request(&mut query).unwrap();
    assert_eq!(outcome.handled_by, vec!["zeta", "alpha"]);
}

#[test]
fn test_shutdown_unloads_everything_once() {
    let root = module_root(&["a.py", "b.py"]);
    let runtime = MockRuntime::new();
    let manager = manager_for(&runtime, root.path(), &["a", "b"]);
    manager.discover_and_load().unwrap();
    let mut receiver = manager.subscribe("test", EventFilter::SystemOnly).unwrap();

    manager.shutdown().unwrap();
    manager.shutdown().unwrap();
    drop(manager);

    assert_eq!(runtime.count("release:a"), 1);
    assert_eq!(runtime.count("release:b"), 1);
    match receiver.try_recv() {
        Ok(Event::System(event)) => assert_eq!(event.event_type, SystemEventType::Shutdown),
        other => panic!("expected shutdown event, got {:?}", other),
    }
    assert!(receiver.try_recv().is_err());
}

#[test]
fn test_drop_unloads_modules() {
    let root = module_root(&["a.py"]);
    let runtime = MockRuntime::new();
    {
        let manager = manager_for(&runtime, root.path(), &["a"]);
        manager.discover_and_load().unwrap();
    }
    assert_eq!(runtime.count("release:a"), 1);
}

#[test]
fn test_enabled_settings_helper_matches_key() {
    let store = enabled_settings(&["a"]);
    assert!(EnabledModules::load(&store).unwrap().is_enabled("a"));
}
