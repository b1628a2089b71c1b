/*!
 * Event bus for yoctoproxy.
 *
 * One broadcast channel per event type. Proxies publish binding and
 * property-change notifications here so that UI layers can follow them
 * without polling.
 */
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::error::{Error, Result};

/// Maximum number of events that can be buffered in a channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

type EventSender<T> = broadcast::Sender<T>;

/// Receiving half of an event subscription
pub type EventReceiver<T> = broadcast::Receiver<T>;

/// Event bus for publishing and subscribing to events
#[derive(Debug)]
pub struct EventBus {
    channels: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    channel_capacity: usize,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with a specific channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            channel_capacity: capacity.max(1),
        }
    }

    /// Channel capacity used for new event types
    pub fn capacity(&self) -> usize {
        self.channel_capacity
    }

    fn sender<T: Clone + Debug + Send + Sync + 'static>(&self) -> Result<EventSender<T>> {
        let type_id = TypeId::of::<T>();
        let mut channels = self
            .channels
            .lock()
            .map_err(|_| Error::event("Failed to lock channels"))?;

        if let Some(sender) = channels.get(&type_id) {
            return sender
                .downcast_ref::<EventSender<T>>()
                .cloned()
                .ok_or_else(|| Error::event("Failed to downcast sender"));
        }

        let (sender, _) = broadcast::channel(self.channel_capacity);
        channels.insert(type_id, Box::new(sender.clone()));
        Ok(sender)
    }

    /// Publish an event, returning the number of receivers it reached
    ///
    /// Publishing without subscribers is not an error.
    pub fn publish<T: Clone + Debug + Send + Sync + 'static>(&self, event: T) -> Result<usize> {
        let sender = self.sender::<T>()?;

        if sender.receiver_count() == 0 {
            trace!("No receivers for {}", std::any::type_name::<T>());
            return Ok(0);
        }

        match sender.send(event) {
            Ok(n) => {
                trace!("Published event to {} receivers", n);
                Ok(n)
            }
            Err(e) => {
                warn!("Failed to publish event: {}", e);
                Err(Error::event(format!("Failed to publish event: {}", e)))
            }
        }
    }

    /// Subscribe to events of a specific type
    pub fn subscribe<T: Clone + Debug + Send + Sync + 'static>(&self) -> Result<EventReceiver<T>> {
        Ok(self.sender::<T>()?.subscribe())
    }

    /// Number of live receivers for an event type
    pub fn receiver_count<T: Clone + Debug + Send + Sync + 'static>(&self) -> usize {
        self.sender::<T>().map(|s| s.receiver_count()).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A shared event bus that can be cloned
#[derive(Debug, Clone)]
pub struct SharedEventBus(Arc<EventBus>);

impl SharedEventBus {
    /// Create a new shared event bus
    pub fn new() -> Self {
        Self(Arc::new(EventBus::new()))
    }

    /// Create a new shared event bus with a specific channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Arc::new(EventBus::with_capacity(capacity)))
    }

    /// Publish an event
    pub fn publish<T: Clone + Debug + Send + Sync + 'static>(&self, event: T) -> Result<usize> {
        self.0.publish(event)
    }

    /// Subscribe to events of a specific type
    pub fn subscribe<T: Clone + Debug + Send + Sync + 'static>(&self) -> Result<EventReceiver<T>> {
        self.0.subscribe()
    }

    /// Number of live receivers for an event type
    pub fn receiver_count<T: Clone + Debug + Send + Sync + 'static>(&self) -> usize {
        self.0.receiver_count::<T>()
    }
}

impl Default for SharedEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<EventBus> for SharedEventBus {
    fn as_ref(&self) -> &EventBus {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Barrier;

    #[derive(Debug, Clone)]
    struct PlugNotice {
        id: u32,
        message: String,
    }

    #[tokio::test]
    async fn test_publish_subscribe() -> Result<()> {
        let event_bus = EventBus::new();
        let mut rx = event_bus.subscribe::<PlugNotice>()?;

        let event = PlugNotice {
            id: 1,
            message: "MOTORCTL-00001 arrived".to_string(),
        };

        let receivers = event_bus.publish(event.clone())?;
        assert_eq!(receivers, 1);

        let received = rx.recv().await.map_err(|e| Error::event(e.to_string()))?;
        assert_eq!(received.id, event.id);
        assert_eq!(received.message, event.message);

        Ok(())
    }

    #[test]
    fn test_publish_without_subscribers() -> Result<()> {
        let event_bus = EventBus::new();
        let receivers = event_bus.publish(PlugNotice {
            id: 7,
            message: "YI2CMK01-00001 left".to_string(),
        })?;
        assert_eq!(receivers, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_multiple_event_types() -> Result<()> {
        #[derive(Debug, Clone)]
        struct ValueNotice {
            value: String,
        }

        let event_bus = SharedEventBus::new();
        let mut rx1 = event_bus.subscribe::<PlugNotice>()?;
        let mut rx2 = event_bus.subscribe::<ValueNotice>()?;

        event_bus.publish(PlugNotice {
            id: 3,
            message: "YRFID01-00001 arrived".to_string(),
        })?;
        event_bus.publish(ValueNotice {
            value: "21.5".to_string(),
        })?;

        let received1 = rx1.recv().await.map_err(|e| Error::event(e.to_string()))?;
        let received2 = rx2.recv().await.map_err(|e| Error::event(e.to_string()))?;

        assert_eq!(received1.id, 3);
        assert_eq!(received2.value, "21.5");
        assert_eq!(event_bus.receiver_count::<PlugNotice>(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_publish() -> Result<()> {
        const NUM_PUBLISHERS: usize = 8;
        const EVENTS_PER_PUBLISHER: usize = 10;

        let event_bus = SharedEventBus::new();
        let mut rx = event_bus.subscribe::<PlugNotice>()?;
        let barrier = Arc::new(Barrier::new(NUM_PUBLISHERS));
        let mut handles = Vec::with_capacity(NUM_PUBLISHERS);

        for publisher_id in 0..NUM_PUBLISHERS {
            let event_bus = event_bus.clone();
            let barrier = barrier.clone();

            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                for i in 0..EVENTS_PER_PUBLISHER {
                    let event = PlugNotice {
                        id: (publisher_id * EVENTS_PER_PUBLISHER + i) as u32,
                        message: format!("HUB{:02}-{:05}", publisher_id, i),
                    };
                    event_bus.publish(event).unwrap();
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        let mut received_count = 0;
        while rx.try_recv().is_ok() {
            received_count += 1;
        }

        assert_eq!(received_count, NUM_PUBLISHERS * EVENTS_PER_PUBLISHER);

        Ok(())
    }
}
