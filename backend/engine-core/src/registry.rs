//! Registry of remote status subscribers.
//!
//! Subscribers are kept in registration order, which is also broadcast order. Each
//! registration arms a liveness watch: a background task awaits the subscriber's
//! [`StatusCallback::death_watch`] and removes that handle when its connection ends.
//!
//! # Locking
//!
//! One mutex guards the whole sequence. `register`, `remove` and `broadcast` each hold
//! it for their full duration, so a broadcast never sees a half-erased entry and a
//! subscriber removed before a broadcast starts never receives it. Removal is a linear
//! scan; registries stay at tens of entries and the `Vec` keeps insertion order.

use crate::service::StatusSnapshot;

use std::sync::Arc;

use futures_util::future::BoxFuture;
use log::{error, info};
use tokio::sync::Mutex;

/// A remote handle that receives status pushes.
///
/// Identity is handle identity: two `Arc`s pointing at the same object are the same
/// subscriber, two distinct objects never are, whatever they contain.
pub trait StatusCallback: Send + Sync {
    /// Push one update. Fire-and-forget; a dead peer silently drops it.
    fn handle_status_update(&self, snapshot: &StatusSnapshot);

    /// Resolves once the peer's connection has terminated.
    fn death_watch(&self) -> BoxFuture<'static, ()>;
}

type Callbacks = Vec<Arc<dyn StatusCallback>>;

/// Ordered, liveness-tracked collection of [`StatusCallback`] handles.
///
/// `Clone` shares the same underlying sequence.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    callbacks: Arc<Mutex<Callbacks>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `callback` and watch its connection.
    ///
    /// Must be called from within a tokio runtime; the watch runs as a spawned task.
    pub async fn register(&self, callback: Arc<dyn StatusCallback>) {
        let death = callback.death_watch();
        self.callbacks.lock().await.push(Arc::clone(&callback));

        let registry = self.clone();
        tokio::spawn(async move {
            death.await;
            registry.remove(&callback).await;
        });
    }

    /// Erase the first entry with the same handle identity as `callback`.
    ///
    /// An unknown handle is logged and otherwise ignored.
    pub async fn remove(&self, callback: &Arc<dyn StatusCallback>) {
        let mut callbacks = self.callbacks.lock().await;

        match callbacks.iter().position(|entry| same_handle(entry, callback)) {
            Some(index) => {
                info!("Erasing orphan callback");
                callbacks.remove(index);
            }
            None => error!("Got death notification for unknown callback."),
        }
    }

    /// Push `snapshot` to every registered subscriber in registration order.
    pub async fn broadcast(&self, snapshot: &StatusSnapshot) {
        let callbacks = self.callbacks.lock().await;

        for callback in callbacks.iter() {
            callback.handle_status_update(snapshot);
        }
    }

    pub async fn len(&self) -> usize {
        self.callbacks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.callbacks.lock().await.is_empty()
    }
}

fn same_handle(a: &Arc<dyn StatusCallback>, b: &Arc<dyn StatusCallback>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
