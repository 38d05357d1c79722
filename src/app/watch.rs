//! Filesystem-watch adapter and the interactive watch loop
//!
//! `notify` callbacks only say which path changed. Each path is mapped back
//! to the module root it belongs to and queued; the loop reconciles that
//! root on a blocking thread. Bursts are not deduplicated, reconciliation
//! is idempotent.

use crate::app::cli::args::OutputFormat;
use crate::app::error::AppError;
use crate::app::render;
use crate::core::logging::reconfigure_logging;
use crate::extension::api::{ModuleManager, Query, ScriptRuntime};
use crate::notifications::api::{Event, EventFilter};
use log::{debug, info, trace, warn};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Module root containing `path`, preferring the most specific root
pub fn root_for(roots: &[(PathBuf, PathBuf)], path: &Path) -> Option<PathBuf> {
    roots
        .iter()
        .filter(|(root, canonical)| path.starts_with(root) || path.starts_with(canonical))
        .max_by_key(|(root, _)| root.components().count())
        .map(|(root, _)| root.clone())
}

/// Host commands typed in the watch loop; any other line is a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCommand {
    /// Replace the active log level spec, e.g. `:loglevel debug`
    LogLevel(String),
    /// Reconcile every module root now
    Rescan,
}

/// Parse a `:`-prefixed input line; `None` means the line is a request
pub fn parse_command(line: &str) -> Option<Result<WatchCommand, String>> {
    let rest = line.trim().strip_prefix(':')?;
    let mut words = rest.split_whitespace();
    let command = match (words.next(), words.next(), words.next()) {
        (Some("loglevel"), Some(spec), None) => Ok(WatchCommand::LogLevel(spec.to_string())),
        (Some("loglevel"), _, _) => Err("usage: :loglevel <level>".to_string()),
        (Some("rescan"), None, _) => Ok(WatchCommand::Rescan),
        (Some("rescan"), _, _) => Err("usage: :rescan".to_string()),
        (Some(other), _, _) => Err(format!("Unknown command ':{}'", other)),
        (None, _, _) => Err("Empty command".to_string()),
    };
    Some(command)
}

/// Watches module roots and forwards the affected root for each change
pub struct ModuleRootWatcher {
    _watcher: RecommendedWatcher,
    watched: Vec<PathBuf>,
}

impl ModuleRootWatcher {
    pub fn start(roots: &[PathBuf], tx: mpsc::UnboundedSender<PathBuf>) -> Result<Self, AppError> {
        let mapping: Vec<(PathBuf, PathBuf)> = roots
            .iter()
            .map(|r| (r.clone(), r.canonicalize().unwrap_or_else(|_| r.clone())))
            .collect();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    warn!("Filesystem watch error: {}", e);
                    return;
                }
            };
            if matches!(event.kind, EventKind::Access(_)) {
                return;
            }
            for path in &event.paths {
                match root_for(&mapping, path) {
                    Some(root) => {
                        trace!("Change at {} in root {}", path.display(), root.display());
                        let _ = tx.send(root);
                    }
                    None => trace!("Change outside module roots: {}", path.display()),
                }
            }
        })
        .map_err(|e| AppError::Watch {
            message: e.to_string(),
        })?;

        let mut watched = Vec::new();
        for root in roots {
            if !root.is_dir() {
                warn!("Not watching missing module root {}", root.display());
                continue;
            }
            watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| AppError::Watch {
                    message: format!("{}: {}", root.display(), e),
                })?;
            debug!("Watching {}", root.display());
            watched.push(root.clone());
        }

        Ok(Self {
            _watcher: watcher,
            watched,
        })
    }

    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }
}

/// Reconcile on change and answer stdin queries until EOF or Ctrl-C
pub async fn run_watch<R>(
    manager: Arc<ModuleManager<R>>,
    output: OutputFormat,
    color: bool,
) -> Result<(), AppError>
where
    R: ScriptRuntime + 'static,
{
    let (tx, mut changes) = mpsc::unbounded_channel();
    let watcher = ModuleRootWatcher::start(manager.module_roots(), tx)?;
    info!(
        "Watching {} module root(s); type a request per line, Ctrl-C to stop",
        watcher.watched().len()
    );

    let mut events = manager
        .subscribe("cli:watch", EventFilter::ModuleAndCollection)
        .map_err(|e| AppError::Watch {
            message: e.to_string(),
        })?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
            Some(root) = changes.recv() => {
                let m = manager.clone();
                match tokio::task::spawn_blocking(move || m.update_directory(&root)).await {
                    Ok(Ok(report)) if !report.is_empty() => info!(
                        "Modules changed: +[{}] -[{}]",
                        report.added.join(", "),
                        report.removed.join(", ")
                    ),
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!("Reconciliation failed: {}", e),
                    Err(e) => warn!("Reconciliation task failed: {}", e),
                }
            }
            Some(event) = events.recv() => match event {
                Event::Module(e) => match e.message {
                    Some(message) => debug!("Module '{}' changed: {}", e.module_id, message),
                    None => debug!("Module '{}' changed", e.module_id),
                },
                Event::Collection(e) => debug!("{} module(s) known", e.module_count),
                Event::System(_) => {}
            },
            line = lines.next_line() => match line {
                Ok(Some(text)) if text.trim().is_empty() => {}
                Ok(Some(text)) => match parse_command(&text) {
                    Some(Ok(command)) => run_command(&manager, command).await,
                    Some(Err(message)) => warn!("{}", message),
                    None => answer(&manager, text, output, color).await?,
                },
                Ok(None) => {
                    debug!("End of input");
                    break;
                }
                Err(e) => {
                    warn!("Cannot read input: {}", e);
                    break;
                }
            },
        }
    }
    Ok(())
}

async fn run_command<R>(manager: &Arc<ModuleManager<R>>, command: WatchCommand)
where
    R: ScriptRuntime + 'static,
{
    match command {
        WatchCommand::LogLevel(spec) => match reconfigure_logging(&spec) {
            Ok(()) => info!("Log level set to '{}'", spec),
            Err(e) => warn!("Cannot set log level '{}': {}", spec, e),
        },
        WatchCommand::Rescan => {
            let m = manager.clone();
            match tokio::task::spawn_blocking(move || m.discover_and_load()).await {
                Ok(Ok(report)) => info!(
                    "Rescanned: +[{}] -[{}]",
                    report.added.join(", "),
                    report.removed.join(", ")
                ),
                Ok(Err(e)) => warn!("Rescan failed: {}", e),
                Err(e) => warn!("Rescan task failed: {}", e),
            }
        }
    }
}

async fn answer<R>(
    manager: &Arc<ModuleManager<R>>,
    text: String,
    output: OutputFormat,
    color: bool,
) -> Result<(), AppError>
where
    R: ScriptRuntime + 'static,
{
    let m = manager.clone();
    let (query, outcome) = tokio::task::spawn_blocking(move || {
        let triggers = m.triggers()?;
        let mut query = Query::from_input(&text, &triggers);
        let outcome = m.handle_request(&mut query)?;
        Ok::<_, AppError>((query, outcome))
    })
    .await
    .map_err(|e| AppError::Watch {
        message: e.to_string(),
    })??;

    render::print_results(&query, &outcome, output, color)
}
