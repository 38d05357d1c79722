//! Application startup
//!
//! Parse arguments, read the configuration file, start logging, then hand
//! over to the subcommand. Failures before logging is up go to stderr.

use crate::app::cli::args::Args;
use crate::app::cli::config::{load_config_file, FileConfig, HostConfig};
use crate::app::commands;
use crate::app::error::AppError;
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::init_logging;
use crate::core::version::{build_time, get_api_version, git_hash};
use std::io::IsTerminal;

/// Run the host; returns the process exit code
pub async fn startup() -> i32 {
    let terminal_color = std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal();
    let args = Args::parse_from_env(terminal_color);

    let config = match prepare(&args).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let log_file = config
        .log_file
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned());
    if let Err(e) = init_logging(
        Some(&config.log_level),
        Some(&config.log_format),
        log_file.as_deref(),
        config.color,
    ) {
        eprintln!("Error: Logging setup failed: {}", e);
        return 1;
    }

    log::debug!(
        "modhost {} (api {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        get_api_version(),
        build_time(),
        git_hash()
    );
    log::debug!("Resolved configuration: {:?}", config);

    match run(&args, &config).await {
        Ok(()) => 0,
        Err(e) => {
            log_error_with_context(&e, "Module host failed");
            1
        }
    }
}

async fn prepare(args: &Args) -> Result<HostConfig, AppError> {
    let file = match load_config_file(args.config_file.as_deref()).await? {
        Some(table) => FileConfig::from_table(&table)?,
        None => FileConfig::default(),
    };
    Ok(HostConfig::resolve(args, file)?)
}

async fn run(args: &Args, config: &HostConfig) -> Result<(), AppError> {
    let manager = commands::build_manager(config)?;
    commands::execute(manager, args, config).await
}
