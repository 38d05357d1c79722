//! Test modules for the extension system
//!
//! Module state machine, routing, reconciliation and manager suites, all
//! driven by the scripted runtime in `utils`.

mod manager;
mod utils;
