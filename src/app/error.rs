//! Host error type

use crate::app::cli::config::ConfigError;
use crate::core::error_handling::ContextualError;
use crate::core::validation::ValidationError;
use crate::extension::api::{ManagerError, SettingsError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Logging setup failed: {message}")]
    Logging { message: String },

    #[error("Filesystem watch failed: {message}")]
    Watch { message: String },

    #[error("Could not write output: {message}")]
    Output { message: String },
}

impl ContextualError for AppError {
    fn is_user_actionable(&self) -> bool {
        match self {
            AppError::Config(e) => e.is_user_actionable(),
            AppError::Validation(e) => e.is_user_actionable(),
            AppError::Manager(e) => e.is_user_actionable(),
            AppError::Settings(e) => e.is_user_actionable(),
            _ => false,
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            AppError::Config(e) => e.user_message(),
            AppError::Validation(e) => e.user_message(),
            AppError::Manager(e) => e.user_message(),
            AppError::Settings(e) => e.user_message(),
            _ => None,
        }
    }
}
