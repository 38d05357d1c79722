//! Generic error handling utilities
//!
//! Lets the host report failures from any subsystem with the right amount of
//! detail: configuration mistakes the user can fix are shown verbatim, system
//! failures are shown as a one-line context with the detail at debug level.

/// Errors that can tell a user-actionable problem from a system failure
///
/// When `is_user_actionable()` returns `true`, `user_message()` must return
/// `Some(message)`; otherwise it returns `None`.
pub trait ContextualError: std::error::Error {
    /// True if the message is specific enough to show to the user as-is
    fn is_user_actionable(&self) -> bool;

    /// The user-facing message for actionable errors
    fn user_message(&self) -> Option<&str>;
}

/// Log a fatal error with the appropriate level of detail
///
/// # Examples
/// ```rust,no_run
/// # use modhost::core::error_handling::log_error_with_context;
/// # use modhost::core::validation::ValidationError;
/// let err = ValidationError::new("Module root '/nope' is not a directory");
/// log_error_with_context(&err, "Loading configuration");
/// // Logs: "FATAL: Module root '/nope' is not a directory"
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => log::error!("FATAL: {}", user_msg),
        _ => log::error!("FATAL: {}", operation_context),
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}
