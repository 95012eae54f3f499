//! Real-time subscription adapter.
//!
//! A `RealtimeSource` turns a `CollectionQuery` into a `SnapshotStream` of
//! full result sets. `LiveCollection` sits on top and exposes the
//! `{data, loading, error}` view the dashboard consumes, with local
//! optimistic mutators and a one-shot REST fallback when the subscription
//! cannot be established.

pub mod live;
pub mod memory;
pub mod polling;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::errors::SyncError;

pub use live::{LiveCollection, LiveState};
pub use memory::MemoryRealtime;
pub use polling::PollingRealtime;

/// Buffered snapshots per subscription before the producer waits.
pub const SNAPSHOT_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Projects,
    Tasks,
    Users,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Projects => "projects",
            Self::Tasks => "tasks",
            Self::Users => "users",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "projects" => Ok(Self::Projects),
            "tasks" => Ok(Self::Tasks),
            "users" => Ok(Self::Users),
            other => Err(format!("unknown collection: {}", other)),
        }
    }
}

/// How a snapshot is reconciled with local optimistic edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// Every snapshot replaces the local list outright.
    #[default]
    SnapshotWins,
    /// An optimistic value survives until a snapshot confirms it: a newer
    /// server version than the one it was based on, or matching content.
    PendingVersion,
}

impl ReconcilePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SnapshotWins => "snapshot_wins",
            Self::PendingVersion => "pending_version",
        }
    }
}

impl std::str::FromStr for ReconcilePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "snapshot_wins" => Ok(Self::SnapshotWins),
            "pending_version" => Ok(Self::PendingVersion),
            other => Err(format!("unknown reconcile policy: {}", other)),
        }
    }
}

/// Query shape: equality filter, ascending order, limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionQuery {
    pub collection: Collection,
    #[serde(default)]
    pub filter: BTreeMap<String, Value>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl CollectionQuery {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filter: BTreeMap::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn projects() -> Self {
        Self::new(Collection::Projects).order_by("created_at")
    }

    pub fn tasks(project_id: Option<&str>) -> Self {
        let query = Self::new(Collection::Tasks).order_by("updated_at");
        match project_id {
            Some(id) => query.filter("project_id", Value::String(id.to_string())),
            None => query,
        }
    }

    pub fn users() -> Self {
        Self::new(Collection::Users).order_by("created_at")
    }

    pub fn filter(mut self, field: &str, value: Value) -> Self {
        self.filter.insert(field.to_string(), value);
        self
    }

    pub fn order_by(mut self, field: &str) -> Self {
        self.order_by = Some(field.to_string());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn filter_str(&self, field: &str) -> Option<&str> {
        self.filter.get(field).and_then(Value::as_str)
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.filter
            .iter()
            .all(|(field, expected)| doc.get(field) == Some(expected))
    }

    /// Filter, then stable-sort ascending on `order_by`, then truncate.
    pub fn apply(&self, docs: Vec<Value>) -> Vec<Value> {
        let mut out: Vec<Value> = docs.into_iter().filter(|d| self.matches(d)).collect();
        if let Some(field) = &self.order_by {
            out.sort_by(|a, b| compare_fields(a.get(field), b.get(field)));
        }
        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

/// Missing < null < bool < number < string; anything else compares equal.
fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotEvent {
    /// The full current result set.
    Next(Vec<Value>),
    Error(String),
}

/// Receiving half of a subscription. Dropping it tears the producer down.
#[derive(Debug)]
pub struct SnapshotStream {
    rx: mpsc::Receiver<SnapshotEvent>,
    cancel: CancellationToken,
}

impl SnapshotStream {
    /// A connected sender/stream pair. The producer should stop once
    /// `cancel` fires or a send fails.
    pub fn channel(cancel: CancellationToken) -> (mpsc::Sender<SnapshotEvent>, Self) {
        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        (tx, Self { rx, cancel })
    }

    pub async fn recv(&mut self) -> Option<SnapshotEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<SnapshotEvent> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for SnapshotStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl futures::Stream for SnapshotStream {
    type Item = SnapshotEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// Anything that can push full-snapshot updates for a query.
#[async_trait]
pub trait RealtimeSource: Send + Sync {
    /// Establish a subscription. The first snapshot is delivered on the
    /// returned stream; an `Err` here means setup failed and the caller
    /// should fall back.
    async fn subscribe(&self, query: &CollectionQuery) -> Result<SnapshotStream, SyncError>;
}

/// Source used when real-time is switched off: every subscription fails
/// setup, so live collections take the one-shot fallback path.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRealtime;

#[async_trait]
impl RealtimeSource for DisabledRealtime {
    async fn subscribe(&self, query: &CollectionQuery) -> Result<SnapshotStream, SyncError> {
        Err(SyncError::SubscriptionSetup(format!(
            "real-time disabled; {} served by REST",
            query.collection
        )))
    }
}
