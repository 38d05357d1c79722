pub mod app;
pub mod core;
pub mod extension;
pub mod notifications;
