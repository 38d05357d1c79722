// Internal modules - all access should go through api module
pub(crate) mod enabled;
pub(crate) mod error;
pub(crate) mod manager;
pub(crate) mod module;
pub(crate) mod process;
pub(crate) mod router;
pub(crate) mod runtime;
pub(crate) mod scanner;
pub(crate) mod settings;
pub(crate) mod types;

// Public API module - the only public interface for the extension system
pub mod api;

#[cfg(test)]
mod tests;
