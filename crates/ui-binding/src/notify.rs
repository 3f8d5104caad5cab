//! Property change notification and the change-notification race

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Callback receiving the name of the property that changed
pub type PropertyHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Handle returned by [`NotifyPropertyChanged::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// An object that announces property changes by name
pub trait NotifyPropertyChanged: Send + Sync {
    fn subscribe(&self, handler: PropertyHandler) -> SubscriptionId;

    /// Returns false if the subscription was not found
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// Reusable change-notification hub for view models
#[derive(Default)]
pub struct PropertyNotifier {
    handlers: Mutex<Vec<(SubscriptionId, PropertyHandler)>>,
    next_id: AtomicU64,
}

impl PropertyNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a change notification for `property`.
    ///
    /// Handlers run synchronously on the calling thread, outside the lock,
    /// so they may unsubscribe themselves.
    pub fn notify(&self, property: &str) {
        let handlers: Vec<PropertyHandler> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler(property);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl NotifyPropertyChanged for PropertyNotifier {
    fn subscribe(&self, handler: PropertyHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, handler));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }
}

/// Unsubscribes when dropped, whichever way the race ends
struct SubscriptionGuard<'a> {
    source: &'a dyn NotifyPropertyChanged,
    id: SubscriptionId,
}

impl Drop for SubscriptionGuard<'_> {
    fn drop(&mut self) {
        self.source.unsubscribe(self.id);
    }
}

/// Wait until `source` announces a change of exactly `property`.
///
/// Returns `true` on the first matching notification, `false` once `timeout`
/// elapses. The subscription is always removed before returning.
pub async fn wait_for_property_change(
    source: &dyn NotifyPropertyChanged,
    property: &str,
    timeout: Duration,
) -> bool {
    let (tx, rx) = oneshot::channel::<()>();
    let slot = Mutex::new(Some(tx));
    let target = property.to_string();

    let id = source.subscribe(Arc::new(move |changed: &str| {
        if changed == target {
            if let Some(tx) = slot.lock().unwrap_or_else(PoisonError::into_inner).take() {
                let _ = tx.send(());
            }
        }
    }));
    let _guard = SubscriptionGuard { source, id };

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(())) => {
            debug!("Observed change of '{}'", property);
            true
        }
        Ok(Err(_)) => {
            warn!("Notification source dropped the '{}' subscription", property);
            false
        }
        Err(_) => {
            warn!("No change of '{}' within {:?}", property, timeout);
            false
        }
    }
}
