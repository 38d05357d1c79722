//! Request routing
//!
//! Triggered requests go to the first eligible module owning the trigger.
//! Untriggered requests go to passive modules in order until one of them
//! marks the request valid.

use crate::extension::enabled::EnabledModules;
use crate::extension::module::Module;
use crate::extension::runtime::ScriptRuntime;
use crate::extension::types::Query;
use log::{debug, trace};
use std::sync::Arc;

/// Which modules saw a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteOutcome {
    /// Modules whose handler was invoked, in order
    pub handled_by: Vec<String>,
    /// Subset of `handled_by` whose handler raised
    pub failures: Vec<String>,
}

/// Dispatch `query` over `modules` in canonical order
///
/// Modules that are disabled or not loaded are skipped silently. Handler
/// errors are recorded in the outcome and never stop the pass.
pub fn route<R>(
    runtime: &mut R,
    modules: &[Arc<Module<R::Handle>>],
    enabled: &EnabledModules,
    query: &mut Query,
) -> RouteOutcome
where
    R: ScriptRuntime,
{
    let mut outcome = RouteOutcome::default();
    let eligible = modules
        .iter()
        .filter(|m| enabled.is_enabled(m.id()) && m.is_loaded());

    if query.is_triggered() {
        let trigger = query.trigger().to_string();
        if let Some(module) = eligible.into_iter().find(|m| m.trigger() == trigger) {
            dispatch(runtime, module, query, &mut outcome);
        } else {
            debug!("No loaded module owns trigger '{}'", trigger);
        }
        return outcome;
    }

    for module in eligible.filter(|m| m.trigger().is_empty()) {
        dispatch(runtime, module, query, &mut outcome);
        if query.is_valid() {
            trace!("Request consumed by '{}'", module.id());
            break;
        }
    }
    outcome
}

fn dispatch<R>(
    runtime: &mut R,
    module: &Module<R::Handle>,
    query: &mut Query,
    outcome: &mut RouteOutcome,
) where
    R: ScriptRuntime,
{
    trace!("Dispatching request to '{}'", module.id());
    outcome.handled_by.push(module.id().to_string());
    if module.handle_query(runtime, query).is_err() {
        outcome.failures.push(module.id().to_string());
    }
}
