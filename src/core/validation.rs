//! Validation utilities for configuration and CLI values

use std::path::Path;

/// A configuration or argument value failed validation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl crate::core::error_handling::ContextualError for ValidationError {
    fn is_user_actionable(&self) -> bool {
        true
    }

    fn user_message(&self) -> Option<&str> {
        Some(&self.message)
    }
}

/// Validate glob pattern syntax
pub fn validate_glob_pattern(pattern: &str) -> Result<String, ValidationError> {
    match glob::Pattern::new(pattern) {
        Ok(_) => Ok(pattern.to_string()),
        Err(e) => Err(ValidationError::new(format!(
            "Invalid glob pattern '{}': {}",
            pattern, e
        ))),
    }
}

/// Validate a module id given on the command line
///
/// Ids are derived from file names, so they can never contain a path separator
/// and are never empty.
pub fn validate_module_id(id: &str) -> Result<String, ValidationError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("Module id cannot be empty"));
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(ValidationError::new(format!(
            "Module id '{}' cannot contain path separators",
            trimmed
        )));
    }
    Ok(trimmed.to_string())
}

/// Validate a file extension used as an interpreter key
pub fn validate_extension(ext: &str) -> Result<String, ValidationError> {
    let cleaned = ext.strip_prefix('.').unwrap_or(ext);

    if cleaned.is_empty() {
        return Err(ValidationError::new("Extension cannot be empty"));
    }
    if cleaned.contains('/') || cleaned.contains('\\') {
        return Err(ValidationError::new(
            "Extension cannot contain path separators",
        ));
    }

    Ok(cleaned.to_lowercase())
}

/// A configured module root must be a directory if it exists at all
pub fn validate_module_root(path: &Path) -> Result<(), ValidationError> {
    if path.exists() && !path.is_dir() {
        return Err(ValidationError::new(format!(
            "Module root '{}' is not a directory",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_extension() {
        assert_eq!(validate_extension("py").unwrap(), "py");
        assert_eq!(validate_extension(".py").unwrap(), "py");
        assert_eq!(validate_extension("SH").unwrap(), "sh");
        assert!(validate_extension("").is_err());
        assert!(validate_extension(".").is_err());
        assert!(validate_extension("py/sh").is_err());
    }

    #[test]
    fn test_validate_glob_pattern() {
        assert!(validate_glob_pattern("__pycache__").is_ok());
        assert!(validate_glob_pattern("*.pyc").is_ok());
        assert!(validate_glob_pattern("[").is_err());
    }

    #[test]
    fn test_validate_module_id() {
        assert_eq!(validate_module_id(" foo ").unwrap(), "foo");
        assert!(validate_module_id("").is_err());
        assert!(validate_module_id("a/b").is_err());
    }

    #[test]
    fn test_validate_module_root() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(validate_module_root(dir.path()).is_ok());
        assert!(validate_module_root(&dir.path().join("missing")).is_ok());

        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(validate_module_root(&file).is_err());
    }
}
