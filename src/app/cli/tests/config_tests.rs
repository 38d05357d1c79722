//! Tests for TOML configuration loading and resolution

use crate::app::cli::args::Args;
use crate::app::cli::config::*;
use clap::Parser;
use std::path::PathBuf;

fn table(toml: &str) -> toml::Table {
    toml.parse().unwrap()
}

fn args(extra: &[&str]) -> Args {
    Args::try_parse_from(
        std::iter::once("modhost")
            .chain(extra.iter().copied())
            .chain(std::iter::once("list")),
    )
    .unwrap()
}

#[test]
fn test_file_config_values() {
    let file = FileConfig::from_table(&table(
        r#"
        modules-dir = ["/srv/modules", "/opt/modules,/srv/modules"]
        settings-file = "/etc/modhost/settings.toml"
        reserved-names = "__pycache__,*.bak"
        log-level = "DEBUG"
        log-format = "json"
        log-file = "none"
        color = false

        [interpreters]
        py = "python3 -u"
        ".sh" = "sh"
        "#,
    ))
    .unwrap();

    assert_eq!(
        file.modules_dir,
        vec![PathBuf::from("/srv/modules"), PathBuf::from("/opt/modules")]
    );
    assert_eq!(
        file.settings_file,
        Some(PathBuf::from("/etc/modhost/settings.toml"))
    );
    assert_eq!(
        file.reserved_names,
        Some(vec!["__pycache__".to_string(), "*.bak".to_string()])
    );
    assert_eq!(file.log_level.as_deref(), Some("debug"));
    assert_eq!(file.log_format.as_deref(), Some("json"));
    assert_eq!(file.log_file, Some(None));
    assert_eq!(file.color, Some(false));
    assert_eq!(file.interpreters.get("py").map(String::as_str), Some("python3 -u"));
    assert_eq!(file.interpreters.get("sh").map(String::as_str), Some("sh"));
}

#[test]
fn test_invalid_values_rejected() {
    assert!(FileConfig::from_table(&table(r#"log-level = "loud""#)).is_err());
    assert!(FileConfig::from_table(&table(r#"log-format = "xml""#)).is_err());
    assert!(FileConfig::from_table(&table(r#"modules-dir = 3"#)).is_err());
    assert!(FileConfig::from_table(&table("interpreters = \"python\"")).is_err());
    assert!(FileConfig::from_table(&table("[interpreters]\npy = \"\"")).is_err());
}

#[test]
fn test_wrongly_typed_keys_rejected() {
    for source in [
        r#"color = "yes""#,
        "settings-file = 7",
        "log-level = 2",
        "log-format = true",
        "log-file = [\"a.log\"]",
    ] {
        let error = FileConfig::from_table(&table(source)).unwrap_err();
        let key = source.split(' ').next().unwrap();
        assert!(error.to_string().contains(key), "{}: {}", source, error);
    }
}

#[test]
fn test_command_line_overrides_file() {
    let file = FileConfig {
        modules_dir: vec![PathBuf::from("/from/file")],
        log_level: Some("warn".to_string()),
        log_file: Some(Some(PathBuf::from("/var/log/modhost.log"))),
        color: Some(true),
        ..Default::default()
    };
    let config = HostConfig::resolve(
        &args(&[
            "-m",
            "/from/cli",
            "--log-level",
            "trace",
            "--log-file",
            "-",
            "--no-color",
            "--settings-file",
            "/tmp/s.toml",
        ]),
        file,
    )
    .unwrap();

    assert_eq!(config.module_roots, vec![PathBuf::from("/from/cli")]);
    assert_eq!(config.log_level, "trace");
    assert_eq!(config.log_file, None);
    assert!(!config.color);
    assert_eq!(config.settings_file, PathBuf::from("/tmp/s.toml"));
}

#[test]
fn test_file_values_used_without_command_line() {
    let file = FileConfig {
        modules_dir: vec![PathBuf::from("/from/file")],
        settings_file: Some(PathBuf::from("/from/file/settings.toml")),
        log_level: Some("warn".to_string()),
        color: Some(false),
        ..Default::default()
    };
    let config = HostConfig::resolve(&args(&[]), file).unwrap();

    assert_eq!(config.module_roots, vec![PathBuf::from("/from/file")]);
    assert_eq!(config.log_level, "warn");
    assert_eq!(config.log_format, "text");
    assert_eq!(config.reserved_names, vec!["__pycache__".to_string()]);
    assert!(!config.color);
}

#[test]
fn test_verbosity_overrides_file_level() {
    let file = FileConfig {
        modules_dir: vec![PathBuf::from("/m")],
        settings_file: Some(PathBuf::from("/s.toml")),
        log_level: Some("error".to_string()),
        ..Default::default()
    };
    let config = HostConfig::resolve(&args(&["-v"]), file).unwrap();
    assert_eq!(config.log_level, "debug");
}

#[test]
fn test_module_root_must_be_directory() {
    let dir = tempfile::TempDir::new().unwrap();
    let file_path = dir.path().join("not-a-dir");
    std::fs::write(&file_path, "").unwrap();

    let file = FileConfig {
        modules_dir: vec![file_path],
        settings_file: Some(PathBuf::from("/s.toml")),
        ..Default::default()
    };
    assert!(HostConfig::resolve(&args(&[]), file).is_err());
}

#[test]
fn test_invalid_reserved_pattern_rejected() {
    let file = FileConfig {
        modules_dir: vec![PathBuf::from("/m")],
        settings_file: Some(PathBuf::from("/s.toml")),
        reserved_names: Some(vec!["[".to_string()]),
        ..Default::default()
    };
    assert!(HostConfig::resolve(&args(&[]), file).is_err());
}

#[test]
fn test_runtime_config_splits_command_line() {
    let file = FileConfig {
        modules_dir: vec![PathBuf::from("/m")],
        settings_file: Some(PathBuf::from("/s.toml")),
        interpreters: [("py".to_string(), "python3 -u".to_string())]
            .into_iter()
            .collect(),
        ..Default::default()
    };
    let config = HostConfig::resolve(&args(&[]), file).unwrap();
    let runtime = config.runtime_config();
    assert_eq!(
        runtime.interpreters.get("py"),
        Some(&vec!["python3".to_string(), "-u".to_string()])
    );
}

#[tokio::test]
async fn test_explicit_config_file_must_exist() {
    let result = load_config_file(Some(std::path::Path::new("/no/such/modhost.toml"))).await;
    assert!(matches!(result, Err(ConfigError::NotFound { .. })));
}

#[tokio::test]
async fn test_config_file_parse_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("modhost.toml");
    std::fs::write(&path, "modules-dir = [").unwrap();
    let result = load_config_file(Some(path.as_path())).await;
    assert!(matches!(result, Err(ConfigError::Parse { .. })));
}

#[tokio::test]
async fn test_config_file_loads_table() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("modhost.toml");
    std::fs::write(&path, "modules-dir = \"/srv/modules\"\n").unwrap();
    let table = load_config_file(Some(path.as_path())).await.unwrap().unwrap();
    assert_eq!(
        table.get("modules-dir").and_then(|v| v.as_str()),
        Some("/srv/modules")
    );
}
