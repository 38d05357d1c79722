//! Command-line arguments
//!
//! Global options configure the host; the subcommand says what to do with
//! the modules once they are discovered.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "modhost")]
#[command(about = "Extension module host")]
#[command(version)]
#[command(after_help = " * can be specified multiple times or as a comma-separated list")]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Module directories to watch*
    #[arg(
        short = 'm',
        long = "modules-dir",
        value_name = "DIRS",
        action = ArgAction::Append,
        value_delimiter = ',',
        global = true
    )]
    pub modules_dir: Vec<PathBuf>,

    /// File holding the enabled module list
    #[arg(short = 's', long = "settings-file", value_name = "FILE", global = true)]
    pub settings_file: Option<PathBuf>,

    /// Entry names never treated as modules (glob patterns)*
    #[arg(
        long = "reserved-name",
        value_name = "PATTERNS",
        action = ArgAction::Append,
        value_delimiter = ',',
        global = true
    )]
    pub reserved_names: Vec<String>,

    /// Force coloured output
    #[arg(short = 'g', long = "color", global = true)]
    pub color: bool,

    /// Disable coloured output
    #[arg(long = "no-color", conflicts_with = "color", global = true)]
    pub no_color: bool,

    /// More log output (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Less log output (repeatable)
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"], global = true)]
    pub log_level: Option<String>,

    /// Log file path (use 'none' to disable file logging)
    #[arg(short = 'f', long = "log-file", value_name = "FILE", global = true)]
    pub log_file: Option<String>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"], global = true)]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List discovered modules
    List {
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Enable a module and load it
    Enable { id: String },
    /// Disable a module and unload it
    Disable { id: String },
    /// Show the triggers of loaded modules
    Triggers,
    /// Run a request through the loaded modules
    Query {
        /// Route to the module owning this trigger
        #[arg(short = 't', long = "trigger", value_name = "TRIGGER")]
        trigger: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Request text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Watch module directories and answer requests from stdin
    Watch,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    ValueEnum,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl Args {
    /// Parse from the process arguments with styled help
    pub fn parse_from_env(color: bool) -> Self {
        use clap::{CommandFactory, FromArgMatches};

        let matches = Self::command()
            .styles(crate::core::styles::palette_to_clap(color))
            .get_matches();
        match Self::from_arg_matches(&matches) {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Explicit colour choice from the command line, if any
    pub fn color_choice(&self) -> Option<bool> {
        if self.color {
            Some(true)
        } else if self.no_color {
            Some(false)
        } else {
            None
        }
    }

    /// Request text as typed, words joined by single spaces
    pub fn query_text(words: &[String]) -> String {
        words.join(" ")
    }
}
