//! Module host notifications
//!
//! Broadcasts module, collection and system events to subscribers over
//! unbounded tokio channels. Everything outside this module goes through
//! [`api`].

pub(crate) mod error;
pub(crate) mod event;
pub(crate) mod manager;

pub mod api;

#[cfg(test)]
mod tests;
