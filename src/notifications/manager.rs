//! NotificationManager implementation
//!
//! Publishing is synchronous: it is called from inside the manager's runtime
//! critical sections, and unbounded channels never block the sender.

use crate::core::sync::handle_mutex_poison;
use crate::notifications::error::NotificationError;
use crate::notifications::event::{Event, EventFilter};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Receiving half handed to subscribers
pub type EventReceiver = UnboundedReceiver<Event>;

struct SubscriberInfo {
    filter: EventFilter,
    source: String,
    sender: UnboundedSender<Event>,
    delivered: usize,
}

pub struct NotificationManager {
    subscribers: HashMap<String, SubscriberInfo>,
}

impl NotificationManager {
    pub fn new() -> Self {
        Self {
            subscribers: HashMap::new(),
        }
    }

    pub fn subscribe(
        &mut self,
        subscriber_id: String,
        filter: EventFilter,
        source: String,
    ) -> EventReceiver {
        let (sender, receiver) = unbounded_channel();

        let subscriber_info = SubscriberInfo {
            filter,
            source: source.clone(),
            sender,
            delivered: 0,
        };

        if let Some(existing) = self.subscribers.insert(subscriber_id.clone(), subscriber_info) {
            log::warn!(
                "Subscriber '{}' replaced existing subscription (source: {} -> {})",
                subscriber_id,
                existing.source,
                source
            );
        }

        receiver
    }

    pub fn unsubscribe(&mut self, subscriber_id: &str) -> bool {
        self.subscribers.remove(subscriber_id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn has_subscriber(&self, subscriber_id: &str) -> bool {
        self.subscribers.contains_key(subscriber_id)
    }

    /// Number of events handed to a subscriber's channel so far
    pub fn delivered_count(&self, subscriber_id: &str) -> Option<usize> {
        self.subscribers.get(subscriber_id).map(|info| info.delivered)
    }

    /// Deliver an event to every subscriber whose filter accepts it
    ///
    /// Subscribers whose receiver has been dropped are removed and reported in
    /// the returned error; the remaining subscribers still get the event.
    pub fn publish(&mut self, event: Event) -> Result<(), NotificationError> {
        let mut failed_subscribers = Vec::new();

        for (subscriber_id, subscriber_info) in self.subscribers.iter_mut() {
            if !subscriber_info.filter.accepts(&event) {
                continue;
            }
            if subscriber_info.sender.send(event.clone()).is_err() {
                failed_subscribers.push(subscriber_id.clone());
            } else {
                subscriber_info.delivered += 1;
            }
        }

        for subscriber_id in &failed_subscribers {
            self.subscribers.remove(subscriber_id);
        }

        if !failed_subscribers.is_empty() {
            return Err(NotificationError::PublishFailed {
                event_type: event.kind().to_string(),
                failed_subscribers,
            });
        }

        Ok(())
    }
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle shared by the manager and every module it owns
#[derive(Clone, Default)]
pub struct SharedNotifier {
    inner: Arc<Mutex<NotificationManager>>,
}

impl SharedNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        subscriber_id: &str,
        filter: EventFilter,
        source: &str,
    ) -> Result<EventReceiver, NotificationError> {
        let mut manager = handle_mutex_poison(self.inner.lock(), |message| {
            NotificationError::Unavailable { message }
        })?;
        Ok(manager.subscribe(subscriber_id.to_string(), filter, source.to_string()))
    }

    pub fn unsubscribe(&self, subscriber_id: &str) -> Result<bool, NotificationError> {
        let mut manager = handle_mutex_poison(self.inner.lock(), |message| {
            NotificationError::Unavailable { message }
        })?;
        Ok(manager.unsubscribe(subscriber_id))
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .map(|manager| manager.subscriber_count())
            .unwrap_or(0)
    }

    /// Publish and log instead of failing; observers are best-effort
    pub fn notify(&self, event: Event) {
        let result = handle_mutex_poison(self.inner.lock(), |message| {
            NotificationError::Unavailable { message }
        })
        .and_then(|mut manager| manager.publish(event));

        if let Err(e) = result {
            log::debug!("Notification not fully delivered: {}", e);
        }
    }
}
