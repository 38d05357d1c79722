//! Event types for the notification system

use std::time::SystemTime;

#[derive(Clone, Debug, PartialEq)]
pub enum ModuleEventType {
    /// A load or unload attempt finished (successfully or not)
    Changed,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CollectionEventType {
    /// A reconciliation pass over a module root completed
    Changed,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SystemEventType {
    Startup,
    Shutdown,
}

/// Emitted by a single module after each state transition attempt
#[derive(Clone, Debug)]
pub struct ModuleEvent {
    pub event_type: ModuleEventType,
    pub timestamp: SystemTime,
    pub module_id: String,
    pub message: Option<String>,
}

impl ModuleEvent {
    pub fn new(event_type: ModuleEventType, module_id: String) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            module_id,
            message: None,
        }
    }

    pub fn with_message(event_type: ModuleEventType, module_id: String, message: String) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            module_id,
            message: Some(message),
        }
    }
}

/// Emitted once per reconciliation, never once per module
#[derive(Clone, Debug)]
pub struct CollectionEvent {
    pub event_type: CollectionEventType,
    pub timestamp: SystemTime,
    pub module_count: usize,
}

impl CollectionEvent {
    pub fn new(event_type: CollectionEventType, module_count: usize) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            module_count,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SystemEvent {
    pub event_type: SystemEventType,
    pub timestamp: SystemTime,
    pub message: Option<String>,
}

impl SystemEvent {
    pub fn new(event_type: SystemEventType) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            message: None,
        }
    }

    pub fn with_message(event_type: SystemEventType, message: String) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            message: Some(message),
        }
    }
}

/// Unified event enum that encompasses all event types
#[derive(Clone, Debug)]
pub enum Event {
    Module(ModuleEvent),
    Collection(CollectionEvent),
    System(SystemEvent),
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Module(_) => "Module",
            Event::Collection(_) => "Collection",
            Event::System(_) => "System",
        }
    }
}

/// Event filtering options for subscribers
#[derive(Clone, Debug, PartialEq)]
pub enum EventFilter {
    ModuleOnly,
    CollectionOnly,
    SystemOnly,
    ModuleAndCollection,
    All,
}

impl EventFilter {
    /// Check if an event should be accepted by this filter
    pub fn accepts(&self, event: &Event) -> bool {
        matches!(
            (self, event),
            (EventFilter::ModuleOnly, Event::Module(_))
                | (EventFilter::CollectionOnly, Event::Collection(_))
                | (EventFilter::SystemOnly, Event::System(_))
                | (EventFilter::ModuleAndCollection, Event::Module(_))
                | (EventFilter::ModuleAndCollection, Event::Collection(_))
                | (EventFilter::All, _)
        )
    }
}
