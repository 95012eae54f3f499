//! In-process real-time hub.
//!
//! Holds JSON documents per collection and pushes a fresh full snapshot to
//! every matching subscriber whenever a collection changes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::{Collection, CollectionQuery, RealtimeSource, SnapshotEvent, SnapshotStream};
use crate::errors::SyncError;

#[derive(Debug, Clone)]
enum HubEvent {
    Changed(Collection),
    Failed(Collection, String),
}

#[derive(Debug)]
struct Hub {
    collections: Mutex<HashMap<Collection, Vec<Value>>>,
    events: broadcast::Sender<HubEvent>,
    fail_setup: AtomicBool,
}

impl Hub {
    fn lock(&self) -> MutexGuard<'_, HashMap<Collection, Vec<Value>>> {
        self.collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn snapshot(&self, query: &CollectionQuery) -> Vec<Value> {
        let docs = self
            .lock()
            .get(&query.collection)
            .cloned()
            .unwrap_or_default();
        query.apply(docs)
    }

    fn notify(&self, event: HubEvent) {
        // No receivers just means nobody is subscribed yet.
        let _ = self.events.send(event);
    }
}

#[derive(Debug, Clone)]
pub struct MemoryRealtime {
    hub: Arc<Hub>,
}

impl Default for MemoryRealtime {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRealtime {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            hub: Arc::new(Hub {
                collections: Mutex::new(HashMap::new()),
                events,
                fail_setup: AtomicBool::new(false),
            }),
        }
    }

    /// Insert or replace a document by its `id` field.
    pub fn upsert(&self, collection: Collection, doc: Value) -> Result<(), SyncError> {
        let id = doc
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::InvalidDocument("document has no string id".to_string()))?
            .to_string();
        {
            let mut collections = self.hub.lock();
            let docs = collections.entry(collection).or_default();
            match docs.iter_mut().find(|d| d["id"] == id.as_str()) {
                Some(existing) => *existing = doc,
                None => docs.push(doc),
            }
        }
        self.hub.notify(HubEvent::Changed(collection));
        Ok(())
    }

    /// Remove a document. Returns whether it existed.
    pub fn remove(&self, collection: Collection, id: &str) -> bool {
        let removed = {
            let mut collections = self.hub.lock();
            let docs = collections.entry(collection).or_default();
            let before = docs.len();
            docs.retain(|d| d["id"] != id);
            docs.len() != before
        };
        if removed {
            self.hub.notify(HubEvent::Changed(collection));
        }
        removed
    }

    pub fn replace_all(&self, collection: Collection, docs: Vec<Value>) {
        self.hub.lock().insert(collection, docs);
        self.hub.notify(HubEvent::Changed(collection));
    }

    pub fn snapshot(&self, query: &CollectionQuery) -> Vec<Value> {
        self.hub.snapshot(query)
    }

    /// Make every subsequent `subscribe` fail setup.
    pub fn fail_subscriptions(&self, fail: bool) {
        self.hub.fail_setup.store(fail, Ordering::SeqCst);
    }

    /// Deliver a stream error to subscribers of `collection`.
    pub fn emit_error(&self, collection: Collection, message: &str) {
        self.hub
            .notify(HubEvent::Failed(collection, message.to_string()));
    }
}

#[async_trait]
impl RealtimeSource for MemoryRealtime {
    async fn subscribe(&self, query: &CollectionQuery) -> Result<SnapshotStream, SyncError> {
        if self.hub.fail_setup.load(Ordering::SeqCst) {
            return Err(SyncError::SubscriptionSetup(format!(
                "{} subscription refused",
                query.collection
            )));
        }

        let cancel = CancellationToken::new();
        let (tx, stream) = SnapshotStream::channel(cancel.clone());
        let mut events = self.hub.events.subscribe();
        tx.send(SnapshotEvent::Next(self.hub.snapshot(query)))
            .await
            .map_err(|e| SyncError::SubscriptionSetup(e.to_string()))?;

        let hub = Arc::clone(&self.hub);
        let query = query.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => event,
                };
                let outgoing = match event {
                    Ok(HubEvent::Changed(c)) if c == query.collection => {
                        SnapshotEvent::Next(hub.snapshot(&query))
                    }
                    Ok(HubEvent::Failed(c, message)) if c == query.collection => {
                        SnapshotEvent::Error(message)
                    }
                    Ok(_) => continue,
                    // Missed notifications; a full snapshot catches up.
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        SnapshotEvent::Next(hub.snapshot(&query))
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if tx.send(outgoing).await.is_err() {
                    break;
                }
            }
            tracing::debug!(collection = %query.collection, "memory subscription closed");
        });

        Ok(stream)
    }
}
