//! In-process event bus.
//!
//! Publishing never blocks: events go into a bounded channel and a single
//! dispatcher task fans them out to subscribers in publication order. A full
//! buffer or a closed bus rejects the event, which publishers log and drop.

use super::{Event, EventPublisher};
use crate::config::EventBusConfig;
use crate::error::{AimaError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Callback invoked for each delivered event.
pub type EventHandler = Arc<dyn Fn(&Event) -> Result<()> + Send + Sync>;

/// Predicate deciding whether a subscriber receives an event.
pub type EventFilter = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// Identifier returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Subscription {
    handler: EventHandler,
    filter: Option<EventFilter>,
}

type Subscribers = Arc<RwLock<HashMap<SubscriptionId, Arc<Subscription>>>>;

/// Channel-backed event bus.
pub struct EventBus {
    sender: Mutex<Option<mpsc::Sender<Event>>>,
    subscribers: Subscribers,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl EventBus {
    /// Create a bus with the default buffer size.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new() -> Self {
        Self::with_buffer_size(EventBusConfig::BUFFER_SIZE)
    }

    pub fn with_buffer_size(buffer_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        let subscribers: Subscribers = Arc::new(RwLock::new(HashMap::new()));
        let dispatcher = tokio::spawn(Self::dispatch_loop(rx, subscribers.clone()));

        Self {
            sender: Mutex::new(Some(tx)),
            subscribers,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    async fn dispatch_loop(mut rx: mpsc::Receiver<Event>, subscribers: Subscribers) {
        while let Some(event) = rx.recv().await {
            let targets: Vec<Arc<Subscription>> = subscribers
                .read()
                .map(|subs| subs.values().cloned().collect())
                .unwrap_or_default();

            for sub in targets {
                if let Some(filter) = &sub.filter {
                    if !filter(&event) {
                        continue;
                    }
                }
                if let Err(e) = (sub.handler)(&event) {
                    warn!("Event handler failed for {}: {}", event.event_type, e);
                }
            }
        }
        debug!("Event bus dispatcher stopped");
    }

    /// Register a handler, optionally restricted by a filter.
    pub fn subscribe(
        &self,
        handler: EventHandler,
        filter: Option<EventFilter>,
    ) -> Result<SubscriptionId> {
        if self.is_closed() {
            return Err(AimaError::internal("event bus is closed"));
        }

        let id = SubscriptionId(uuid::Uuid::new_v4().simple().to_string());
        self.subscribers
            .write()
            .map_err(|e| AimaError::internal(format!("subscriber table poisoned: {}", e)))?
            .insert(id.clone(), Arc::new(Subscription { handler, filter }));
        Ok(id)
    }

    /// Remove a subscription.
    pub fn unsubscribe(&self, id: &SubscriptionId) -> Result<()> {
        let removed = self
            .subscribers
            .write()
            .map_err(|e| AimaError::internal(format!("subscriber table poisoned: {}", e)))?
            .remove(id);
        match removed {
            Some(_) => Ok(()),
            None => Err(AimaError::internal(format!("subscription {} not found", id))),
        }
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().map(|s| s.is_none()).unwrap_or(true)
    }

    /// Stop accepting events, deliver what is buffered, and drop all subscribers.
    ///
    /// Calling `close` more than once is a no-op.
    pub async fn close(&self) {
        let sender = self.sender.lock().ok().and_then(|mut s| s.take());
        if sender.is_none() {
            return;
        }
        drop(sender);

        let dispatcher = self.dispatcher.lock().ok().and_then(|mut d| d.take());
        if let Some(handle) = dispatcher {
            if let Err(e) = handle.await {
                warn!("Event bus dispatcher ended abnormally: {}", e);
            }
        }

        if let Ok(mut subs) = self.subscribers.write() {
            subs.clear();
        }
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, event: Event) -> Result<()> {
        let guard = self
            .sender
            .lock()
            .map_err(|e| AimaError::internal(format!("event bus poisoned: {}", e)))?;
        let sender = guard
            .as_ref()
            .ok_or_else(|| AimaError::internal("event bus is closed"))?;

        sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(event) => AimaError::internal(format!(
                "event bus buffer full, dropped {}",
                event.event_type
            )),
            TrySendError::Closed(_) => AimaError::internal("event bus is closed"),
        })
    }
}

/// Common subscription filters.
pub mod filters {
    use super::{Event, EventFilter};
    use std::sync::Arc;

    /// Match one exact event type.
    pub fn by_type(event_type: &str) -> EventFilter {
        let event_type = event_type.to_string();
        Arc::new(move |e: &Event| e.event_type == event_type)
    }

    /// Match every event of one domain.
    pub fn by_domain(domain: &str) -> EventFilter {
        let domain = domain.to_string();
        Arc::new(move |e: &Event| e.domain == domain)
    }

    /// Match event types starting with `prefix` (e.g. `model.pull`).
    pub fn by_type_prefix(prefix: &str) -> EventFilter {
        let prefix = prefix.to_string();
        Arc::new(move |e: &Event| e.event_type.starts_with(&prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn collector() -> (EventHandler, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: EventHandler = Arc::new(move |e: &Event| {
            sink.lock().unwrap().push(e.event_type.clone());
            Ok(())
        });
        (handler, seen)
    }

    async fn wait_for(seen: &Arc<Mutex<Vec<String>>>, count: usize) {
        for _ in 0..100 {
            if seen.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_publish_delivers_in_order() {
        let bus = EventBus::new();
        let (handler, seen) = collector();
        bus.subscribe(handler, None).unwrap();

        bus.publish(Event::new("model.created", "model", json!({}))).unwrap();
        bus.publish(Event::new("model.deleted", "model", json!({}))).unwrap();
        wait_for(&seen, 2).await;

        assert_eq!(*seen.lock().unwrap(), vec!["model.created", "model.deleted"]);
    }

    #[tokio::test]
    async fn test_filter_restricts_delivery() {
        let bus = EventBus::new();
        let (handler, seen) = collector();
        bus.subscribe(handler, Some(filters::by_domain("catalog"))).unwrap();

        bus.publish(Event::new("model.created", "model", json!({}))).unwrap();
        bus.publish(Event::new("catalog.recipe_created", "catalog", json!({})))
            .unwrap();
        bus.close().await;

        assert_eq!(*seen.lock().unwrap(), vec!["catalog.recipe_created"]);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_block_others() {
        let bus = EventBus::new();
        bus.subscribe(Arc::new(|_: &Event| Err(AimaError::internal("boom"))), None)
            .unwrap();
        let (handler, seen) = collector();
        bus.subscribe(handler, None).unwrap();

        bus.publish(Event::new("a.b", "a", json!({}))).unwrap();
        wait_for(&seen, 1).await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let bus = EventBus::new();
        let (handler, _seen) = collector();
        let id = bus.subscribe(handler, None).unwrap();
        assert_eq!(bus.subscriber_count(), 1);

        bus.unsubscribe(&id).unwrap();
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.unsubscribe(&id).is_err());
    }

    #[tokio::test]
    async fn test_publish_after_close_fails() {
        let bus = EventBus::new();
        bus.close().await;
        bus.close().await;
        assert!(bus.is_closed());
        assert!(bus.publish(Event::new("a.b", "a", json!({}))).is_err());
        assert!(bus.subscribe(Arc::new(|_: &Event| Ok(())), None).is_err());
    }

    #[tokio::test]
    async fn test_full_buffer_rejects_without_blocking() {
        let bus = EventBus::with_buffer_size(1);
        // Hold the dispatcher on a slow handler so the buffer fills up.
        bus.subscribe(
            Arc::new(|_: &Event| {
                std::thread::sleep(Duration::from_millis(50));
                Ok(())
            }),
            None,
        )
        .unwrap();

        let mut rejected = 0;
        for _ in 0..20 {
            if bus.publish(Event::new("a.b", "a", json!({}))).is_err() {
                rejected += 1;
            }
        }
        assert!(rejected > 0);
    }
}
