//! Public API for the notification system
//!
//! Observers of the module collection (a settings panel, a CLI watch loop,
//! tests) subscribe here instead of polling the manager.

pub use crate::notifications::error::NotificationError;
pub use crate::notifications::event::{
    CollectionEvent, CollectionEventType, Event, EventFilter, ModuleEvent, ModuleEventType,
    SystemEvent, SystemEventType,
};
pub use crate::notifications::manager::{EventReceiver, NotificationManager, SharedNotifier};
