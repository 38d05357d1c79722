//! TOML configuration file loading and resolution
//!
//! File values are read first; command-line values override them. The
//! result is a `HostConfig` with every default filled in.

use crate::core::validation::{
    validate_extension, validate_glob_pattern, validate_module_root, ValidationError,
};
use crate::extension::api::{ProcessRuntimeConfig, DEFAULT_RESERVED_NAMES};
use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use super::args::Args;

/// Application directory name under the platform config/data dirs
pub const APP_DIR: &str = "Modhost";
/// Configuration file name inside the application config dir
pub const CONFIG_FILE_NAME: &str = "modhost.toml";
/// Settings file name inside the application config dir
pub const SETTINGS_FILE_NAME: &str = "settings.toml";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];
const LOG_FORMATS: &[&str] = &["text", "ext", "json"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("The specified configuration file does not exist: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Error reading configuration file {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    #[error("Error parsing configuration file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl crate::core::error_handling::ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        !matches!(self, ConfigError::Read { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConfigError::Invalid(e) => Some(&e.message),
            ConfigError::Parse { message, .. } => Some(message),
            ConfigError::NotFound { .. } => Some("The specified configuration file does not exist"),
            ConfigError::Read { .. } => None,
        }
    }
}

/// Platform default configuration file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE_NAME))
}

/// Platform default primary module root
pub fn default_modules_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_DIR.to_lowercase()).join("modules"))
}

/// Platform default settings file
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(SETTINGS_FILE_NAME))
}

/// Read the configuration file
///
/// An explicitly named file must exist; the default file is optional.
pub async fn load_config_file(explicit: Option<&Path>) -> Result<Option<toml::Table>, ConfigError> {
    let path = match explicit {
        Some(path) if !path.exists() => {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(None),
        },
    };

    let contents = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| ConfigError::Read {
            path: path.clone(),
            message: e.to_string(),
        })?;
    let table = contents
        .parse::<toml::Table>()
        .map_err(|e| ConfigError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;
    Ok(Some(table))
}

/// Values taken from the configuration file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileConfig {
    pub modules_dir: Vec<PathBuf>,
    pub settings_file: Option<PathBuf>,
    pub reserved_names: Option<Vec<String>>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    /// `Some(None)` when the file explicitly disables file logging
    pub log_file: Option<Option<PathBuf>>,
    pub color: Option<bool>,
    pub interpreters: BTreeMap<String, String>,
}

impl FileConfig {
    pub fn from_table(config: &toml::Table) -> Result<Self, ValidationError> {
        let mut file = FileConfig {
            modules_dir: string_or_array(config, "modules-dir")?
                .unwrap_or_default()
                .iter()
                .map(PathBuf::from)
                .collect(),
            reserved_names: string_or_array(config, "reserved-names")?,
            ..Default::default()
        };

        if let Some(settings_file) = string_value(config, "settings-file")? {
            file.settings_file = Some(PathBuf::from(settings_file));
        }
        if let Some(level) = string_value(config, "log-level")? {
            file.log_level = Some(one_of("log-level", level, LOG_LEVELS)?);
        }
        if let Some(format) = string_value(config, "log-format")? {
            file.log_format = Some(one_of("log-format", format, LOG_FORMATS)?);
        }
        if let Some(log_file) = string_value(config, "log-file")? {
            file.log_file = Some(log_file_path(log_file));
        }
        if let Some(value) = config.get("color") {
            let color = value.as_bool().ok_or_else(|| {
                ValidationError::new("'color' must be a boolean (true or false)")
            })?;
            file.color = Some(color);
        }

        if let Some(value) = config.get("interpreters") {
            let table = value.as_table().ok_or_else(|| {
                ValidationError::new("'interpreters' must be a table of extension = \"command\"")
            })?;
            for (ext, command) in table {
                let command = command.as_str().filter(|c| !c.trim().is_empty()).ok_or_else(|| {
                    ValidationError::new(format!(
                        "Interpreter for '{}' must be a non-empty string",
                        ext
                    ))
                })?;
                file.interpreters
                    .insert(validate_extension(ext)?, command.to_string());
            }
        }

        Ok(file)
    }
}

/// Fully resolved host configuration
#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
    /// Watched roots; the first one is created if missing
    pub module_roots: Vec<PathBuf>,
    pub settings_file: PathBuf,
    pub reserved_names: Vec<String>,
    pub log_level: String,
    pub log_format: String,
    pub log_file: Option<PathBuf>,
    pub color: bool,
    pub interpreters: BTreeMap<String, String>,
}

impl HostConfig {
    /// Merge command line over file values and fill in defaults
    pub fn resolve(args: &Args, file: FileConfig) -> Result<Self, ValidationError> {
        let mut module_roots = if !args.modules_dir.is_empty() {
            args.modules_dir.clone()
        } else if !file.modules_dir.is_empty() {
            file.modules_dir
        } else {
            default_modules_dir().into_iter().collect()
        };
        dedup_paths(&mut module_roots);
        if module_roots.is_empty() {
            return Err(ValidationError::new(
                "No module directory configured and no platform data directory available",
            ));
        }
        for root in &module_roots {
            validate_module_root(root)?;
        }

        let settings_file = args
            .settings_file
            .clone()
            .or(file.settings_file)
            .or_else(default_settings_path)
            .ok_or_else(|| {
                ValidationError::new(
                    "No settings file configured and no platform config directory available",
                )
            })?;

        let reserved_names = if !args.reserved_names.is_empty() {
            args.reserved_names.clone()
        } else {
            file.reserved_names.unwrap_or_else(|| {
                DEFAULT_RESERVED_NAMES.iter().map(|s| s.to_string()).collect()
            })
        };
        for pattern in &reserved_names {
            validate_glob_pattern(pattern)?;
        }

        let log_level = match (&args.log_level, args.verbose, args.quiet) {
            (Some(level), _, _) => level.clone(),
            (None, 0, 0) => file.log_level.unwrap_or_else(|| "info".to_string()),
            (None, verbose, quiet) => {
                crate::core::logging::level_from_verbosity(verbose, quiet).to_string()
            }
        };

        let log_file = match &args.log_file {
            Some(value) => log_file_path(value),
            None => file.log_file.flatten(),
        };

        let color = args
            .color_choice()
            .or(file.color)
            .unwrap_or_else(|| std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal());

        Ok(Self {
            module_roots,
            settings_file,
            reserved_names,
            log_level,
            log_format: args
                .log_format
                .clone()
                .or(file.log_format)
                .unwrap_or_else(|| "text".to_string()),
            log_file,
            color,
            interpreters: file.interpreters,
        })
    }

    pub fn runtime_config(&self) -> ProcessRuntimeConfig {
        self.interpreters
            .iter()
            .fold(ProcessRuntimeConfig::new(), |config, (ext, command)| {
                config.with_interpreter(ext, command)
            })
    }
}

/// `none` and `-` disable file logging
fn log_file_path(value: &str) -> Option<PathBuf> {
    if value.eq_ignore_ascii_case("none") || value == "-" {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

fn one_of(key: &str, value: &str, allowed: &[&str]) -> Result<String, ValidationError> {
    let lowered = value.to_lowercase();
    if allowed.contains(&lowered.as_str()) {
        Ok(lowered)
    } else {
        Err(ValidationError::new(format!(
            "Invalid {} '{}' (expected one of: {})",
            key,
            value,
            allowed.join(", ")
        )))
    }
}

/// Optional string key; any other type is an error
fn string_value<'a>(config: &'a toml::Table, key: &str) -> Result<Option<&'a str>, ValidationError> {
    match config.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| ValidationError::new(format!("'{}' must be a string", key))),
    }
}

/// Accept `key = "a"`, `key = "a,b"` and `key = ["a", "b"]`
fn string_or_array(config: &toml::Table, key: &str) -> Result<Option<Vec<String>>, ValidationError> {
    let Some(value) = config.get(key) else {
        return Ok(None);
    };

    let raw: Vec<&str> = if let Some(s) = value.as_str() {
        vec![s]
    } else if let Some(array) = value.as_array() {
        array
            .iter()
            .map(|item| {
                item.as_str().ok_or_else(|| {
                    ValidationError::new(format!("'{}' entries must be strings", key))
                })
            })
            .collect::<Result<_, _>>()?
    } else {
        return Err(ValidationError::new(format!(
            "'{}' must be a string or an array of strings",
            key
        )));
    };

    let mut values: Vec<String> = Vec::new();
    for item in raw.iter().flat_map(|s| s.split(',')) {
        let item = item.trim();
        if !item.is_empty() && !values.iter().any(|v| v == item) {
            values.push(item.to_string());
        }
    }
    Ok(Some(values))
}

fn dedup_paths(paths: &mut Vec<PathBuf>) {
    let mut seen = Vec::new();
    paths.retain(|p| {
        if seen.contains(p) {
            false
        } else {
            seen.push(p.clone());
            true
        }
    });
}
