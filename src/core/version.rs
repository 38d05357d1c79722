//! Build metadata and module API version accessors.
//! The generated version.rs from the build script is included here so there is
//! a single source of truth for the host and the module loader.

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Fallback used when the build script could not read the manifest metadata
const DEFAULT_API_VERSION: u32 = 20250727;

/// Parse the module API version string from the build script into u32.
pub fn get_api_version() -> u32 {
    MODULE_API_VERSION.parse().unwrap_or(DEFAULT_API_VERSION)
}

/// Major component (year) of an API version
pub fn major_version(api_version: u32) -> u32 {
    api_version / 10000
}

/// Same major version (year) is compatible
pub fn is_api_compatible(host_version: u32, module_version: u32) -> bool {
    major_version(host_version) == major_version(module_version)
}

/// Build time string from the build script (UTC)
pub fn build_time() -> &'static str {
    BUILD_TIME
}

/// Short git hash captured by the build script
pub fn git_hash() -> &'static str {
    GIT_HASH
}
