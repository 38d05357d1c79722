//! Subcommand execution

use crate::app::cli::args::{Args, Command};
use crate::app::cli::config::HostConfig;
use crate::app::error::AppError;
use crate::app::{render, watch};
use crate::core::styles::StyleRole;
use crate::core::validation::validate_module_id;
use crate::extension::api::{
    ManagerConfig, ManagerError, ModuleManager, ModuleState, ProcessRuntime, Query,
    ScriptRuntime, TomlSettingsStore,
};
use log::{info, warn};
use std::sync::Arc;

/// Build the manager for the configured roots and settings file
pub fn build_manager(config: &HostConfig) -> Result<ModuleManager<ProcessRuntime>, AppError> {
    let settings = TomlSettingsStore::open(&config.settings_file)?;
    let manager = ModuleManager::new(
        ProcessRuntime::new(config.runtime_config()),
        Box::new(settings),
        ManagerConfig::new()
            .with_module_roots(config.module_roots.iter().cloned())
            .with_reserved_names(config.reserved_names.clone())
            .create_primary_root(true),
    )?;
    Ok(manager)
}

pub async fn execute<R>(
    manager: ModuleManager<R>,
    args: &Args,
    config: &HostConfig,
) -> Result<(), AppError>
where
    R: ScriptRuntime + 'static,
{
    let color = config.color;
    manager.discover_and_load()?;

    match &args.command {
        Command::List { format } => {
            render::print_modules(&manager.list_modules()?, *format, color)?;
        }
        Command::Enable { id } => set_enabled(&manager, id, true, color)?,
        Command::Disable { id } => set_enabled(&manager, id, false, color)?,
        Command::Triggers => render::print_triggers(&manager.triggers()?, color),
        Command::Query {
            trigger,
            format,
            text,
        } => {
            let text = Args::query_text(text);
            let mut query = match trigger {
                Some(trigger) => Query::triggered(trigger.as_str(), &text),
                None => Query::from_input(&text, &manager.triggers()?),
            };
            let outcome = manager.handle_request(&mut query)?;
            for failed in &outcome.failures {
                warn!("Module '{}' failed to handle the request", failed);
            }
            render::print_results(&query, &outcome, *format, color)?;
        }
        Command::Watch => {
            let manager = Arc::new(manager);
            watch::run_watch(manager.clone(), Default::default(), color).await?;
            manager.shutdown()?;
        }
    }
    Ok(())
}

fn set_enabled<R: ScriptRuntime>(
    manager: &ModuleManager<R>,
    id: &str,
    enabled: bool,
    color: bool,
) -> Result<(), AppError> {
    let id = validate_module_id(id)?;
    let verb = if enabled { "Enabled" } else { "Disabled" };
    manager.set_enabled(&id, enabled)?;

    match manager.module(&id) {
        Ok(summary) => {
            let state = match (&summary.state, &summary.last_error) {
                (ModuleState::Unloaded, Some(e)) if enabled => {
                    StyleRole::Error.paint(&format!("failed to load: {}", e), color)
                }
                (ModuleState::Loaded, _) => StyleRole::Loaded.paint("loaded", color),
                (ModuleState::Unloaded, _) => StyleRole::Unloaded.paint("unloaded", color),
            };
            println!("{} '{}' ({})", verb, StyleRole::Literal.paint(&id, color), state);
        }
        Err(ManagerError::ModuleNotFound { .. }) => {
            info!("No module '{}' installed yet", id);
            println!(
                "{} '{}' (not installed)",
                verb,
                StyleRole::Literal.paint(&id, color)
            );
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
