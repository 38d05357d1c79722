//! Core services and infrastructure

pub mod error_handling;
pub mod logging;
pub mod styles;
pub mod sync;
pub mod validation;
pub mod version;
