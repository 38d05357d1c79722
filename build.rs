//! Generates `version.rs` with the module API version, build time and git hash

use std::env;
use std::fs;
use std::path::Path;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-changed=.git/HEAD");

    let manifest_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo");
    let out_dir = env::var_os("OUT_DIR").expect("OUT_DIR is set by cargo");

    let manifest = fs::read_to_string(Path::new(&manifest_dir).join("Cargo.toml"))
        .expect("Cargo.toml is readable");

    let generated = format!(
        "pub const MODULE_API_VERSION: &str = {:?};\n\
         pub const BUILD_TIME: &str = {:?};\n\
         pub const GIT_HASH: &str = {:?};\n",
        module_api_version(&manifest),
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        git_hash(),
    );
    fs::write(Path::new(&out_dir).join("version.rs"), generated).expect("version.rs is writable");
}

/// `[package.metadata] module_api_version`, or "unknown"
fn module_api_version(manifest: &str) -> String {
    manifest
        .parse::<toml::Table>()
        .ok()
        .and_then(|table| {
            table
                .get("package")?
                .get("metadata")?
                .get("module_api_version")?
                .as_integer()
        })
        .map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

fn git_hash() -> String {
    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|hash| hash.trim().to_string())
        .filter(|hash| !hash.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
