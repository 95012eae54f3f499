//! `LiveCollection`: the `{data, loading, error}` view over one query.
//!
//! Lifecycle: `Initializing → Subscribed | FellBack → Unsubscribed`. There is
//! no path back to `Initializing`; a fresh view needs a fresh `open`.

use std::collections::HashMap;

use builderhub_common::Entity;
use builderhub_common::time::now_millis;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{CollectionQuery, ReconcilePolicy, RealtimeSource, SnapshotEvent, SnapshotStream};
use crate::errors::SyncError;
use crate::gateway::DataGateway;
use crate::session::RequestContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveState {
    Initializing,
    Subscribed,
    FellBack,
    Unsubscribed,
}

/// A local change waiting for the server to confirm it. Versions here are
/// always server-assigned; the client clock is never compared against them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    /// Added from a server response that carried `version`.
    Added { version: i64 },
    /// Edited locally; `base` is the last server version seen before the
    /// first unconfirmed edit.
    Edited { base: i64 },
    Delete,
}

pub struct LiveCollection<T> {
    query: CollectionQuery,
    policy: ReconcilePolicy,
    state: LiveState,
    data: Vec<T>,
    loading: bool,
    error: Option<SyncError>,
    pending: HashMap<String, Pending>,
    stream: Option<SnapshotStream>,
}

impl<T> LiveCollection<T>
where
    T: Entity + Clone + Serialize + DeserializeOwned,
{
    /// Subscribe through `source`; if setup fails, fetch once through
    /// `gateway` instead and never try the subscription again.
    pub async fn open(
        source: &dyn RealtimeSource,
        gateway: &dyn DataGateway,
        ctx: &RequestContext,
        query: CollectionQuery,
        policy: ReconcilePolicy,
    ) -> Self {
        let mut live = Self {
            query,
            policy,
            state: LiveState::Initializing,
            data: Vec::new(),
            loading: true,
            error: None,
            pending: HashMap::new(),
            stream: None,
        };

        match source.subscribe(&live.query).await {
            Ok(stream) => {
                tracing::debug!(collection = %live.query.collection, "live subscription established");
                live.stream = Some(stream);
                live.state = LiveState::Subscribed;
            }
            Err(setup_err) => {
                tracing::warn!(
                    collection = %live.query.collection,
                    error = %setup_err,
                    "subscription setup failed; falling back to REST"
                );
                live.error = Some(setup_err);
                match gateway.list_collection(ctx, &live.query).await {
                    Ok(docs) => live.data = decode(docs),
                    Err(e) => live.error = Some(SyncError::Gateway(e)),
                }
                live.state = LiveState::FellBack;
                live.loading = false;
            }
        }
        live
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&SyncError> {
        self.error.as_ref()
    }

    pub fn state(&self) -> LiveState {
        self.state
    }

    pub fn query(&self) -> &CollectionQuery {
        &self.query
    }

    pub fn policy(&self) -> ReconcilePolicy {
        self.policy
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.data.iter().find(|item| item.id() == id)
    }

    /// Wait for the next event from the subscription and apply it. Returns
    /// `false` once there is no live subscription to wait on.
    pub async fn next_change(&mut self) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };
        match stream.recv().await {
            Some(event) => {
                self.apply_event(event);
                true
            }
            None => {
                tracing::debug!(collection = %self.query.collection, "subscription ended");
                self.stream = None;
                self.state = LiveState::Unsubscribed;
                false
            }
        }
    }

    /// Apply every event already queued without waiting. Returns how many
    /// were applied.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.stream.as_mut().and_then(SnapshotStream::try_recv) {
            self.apply_event(event);
            applied += 1;
        }
        applied
    }

    /// Wait until the first snapshot (or an error) has arrived.
    pub async fn ready(&mut self) {
        while self.loading {
            if !self.next_change().await {
                self.loading = false;
            }
        }
    }

    fn apply_event(&mut self, event: SnapshotEvent) {
        match event {
            SnapshotEvent::Next(docs) => {
                self.apply_snapshot(decode(docs));
                self.error = None;
            }
            SnapshotEvent::Error(message) => {
                tracing::warn!(collection = %self.query.collection, %message, "subscription error");
                self.error = Some(SyncError::Stream(message));
            }
        }
        self.loading = false;
    }

    fn apply_snapshot(&mut self, mut snapshot: Vec<T>) {
        if self.policy == ReconcilePolicy::SnapshotWins || self.pending.is_empty() {
            self.pending.clear();
            self.data = snapshot;
            return;
        }

        let mut confirmed = Vec::new();
        for (id, pending) in &self.pending {
            let server = snapshot.iter().position(|item| item.id() == id);
            let local = self.get(id);
            let settled = match (*pending, server) {
                (Pending::Delete, None) => true,
                (Pending::Delete, Some(idx)) => {
                    snapshot.remove(idx);
                    continue;
                }
                (Pending::Added { version }, Some(idx)) => snapshot[idx].version() >= version,
                (Pending::Edited { base }, Some(idx)) => {
                    snapshot[idx].version() > base
                        || local.is_some_and(|local| same_content(local, &snapshot[idx]))
                }
                (_, None) => false,
            };
            if settled {
                confirmed.push(id.clone());
                continue;
            }
            let Some(local) = local.cloned() else {
                confirmed.push(id.clone());
                continue;
            };
            match server {
                Some(idx) => snapshot[idx] = local,
                None => snapshot.push(local),
            }
        }
        for id in confirmed {
            self.pending.remove(&id);
        }
        self.data = snapshot;
    }

    fn track(&mut self, id: &str, pending: Pending) {
        if self.policy == ReconcilePolicy::PendingVersion && self.state == LiveState::Subscribed {
            self.pending.insert(id.to_string(), pending);
        }
    }

    /// Server version an edit of `id` is measured against: the one recorded
    /// by an earlier unconfirmed change, else the version currently held.
    fn base_version(&self, id: &str, held: i64) -> i64 {
        match self.pending.get(id) {
            Some(Pending::Added { version }) => *version,
            Some(Pending::Edited { base }) => *base,
            _ => held,
        }
    }

    /// Append a just-created item without waiting for a snapshot.
    pub fn add_item(&mut self, item: T) {
        let id = item.id().to_string();
        let version = item.version();
        self.data.push(item);
        self.track(&id, Pending::Added { version });
    }

    /// Shallow-merge `patch` into the item with `id` and stamp `updated_at`
    /// with the current time. Returns `Ok(false)` when no such item is held
    /// and `SyncError::InvalidDocument` when `patch` is not a JSON object.
    pub fn update_item(&mut self, id: &str, patch: Value) -> Result<bool, SyncError> {
        let Value::Object(updates) = patch else {
            return Err(SyncError::InvalidDocument(format!(
                "patch for {} is not an object",
                id
            )));
        };
        let Some(idx) = self.data.iter().position(|item| item.id() == id) else {
            return Ok(false);
        };
        let base = self.base_version(id, self.data[idx].version());

        let mut doc = serde_json::to_value(&self.data[idx])
            .map_err(|e| SyncError::InvalidDocument(e.to_string()))?;
        let Some(fields) = doc.as_object_mut() else {
            return Err(SyncError::InvalidDocument(format!("{} is not an object", id)));
        };
        fields.extend(updates);
        fields.insert("updated_at".to_string(), Value::from(now_millis()));

        let updated: T =
            serde_json::from_value(doc).map_err(|e| SyncError::InvalidDocument(e.to_string()))?;
        self.data[idx] = updated;
        self.track(id, Pending::Edited { base });
        Ok(true)
    }

    /// Remove the item with `id`. Returns whether it was present.
    pub fn delete_item(&mut self, id: &str) -> bool {
        let before = self.data.len();
        self.data.retain(|item| item.id() != id);
        let removed = self.data.len() != before;
        if removed {
            self.track(id, Pending::Delete);
        }
        removed
    }

    /// Tear down the subscription. Data stays readable; no further
    /// snapshots are applied.
    pub fn unsubscribe(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.unsubscribe();
        }
        self.pending.clear();
        self.loading = false;
        self.state = LiveState::Unsubscribed;
    }
}

/// Equal apart from `updated_at`, which a local edit stamps from the client
/// clock.
fn same_content<T: Serialize>(a: &T, b: &T) -> bool {
    fn content<T: Serialize>(item: &T) -> Option<Value> {
        let mut value = serde_json::to_value(item).ok()?;
        value.as_object_mut()?.remove("updated_at");
        Some(value)
    }
    matches!((content(a), content(b)), (Some(a), Some(b)) if a == b)
}

fn decode<T: DeserializeOwned>(docs: Vec<Value>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| match serde_json::from_value(doc) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable document");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GatewayError;
    use crate::realtime::{Collection, MemoryRealtime};
    use crate::test_support::{FakeGateway, project, task};
    use builderhub_common::{Project, Task, TaskStatus};
    use serde_json::json;

    async fn open_tasks(
        hub: &MemoryRealtime,
        gateway: &FakeGateway,
        policy: ReconcilePolicy,
    ) -> LiveCollection<Task> {
        let mut live = LiveCollection::open(
            hub,
            gateway,
            &RequestContext::anonymous(),
            CollectionQuery::tasks(None),
            policy,
        )
        .await;
        live.ready().await;
        live
    }

    fn seed(hub: &MemoryRealtime, task: &Task) {
        hub.upsert(Collection::Tasks, serde_json::to_value(task).unwrap())
            .unwrap();
    }

    #[tokio::test]
    async fn test_loading_until_first_snapshot() {
        let hub = MemoryRealtime::new();
        let gateway = FakeGateway::new();
        seed(&hub, &task("t1", "p1", TaskStatus::Todo, 10));

        let mut live: LiveCollection<Task> = LiveCollection::open(
            &hub,
            &gateway,
            &RequestContext::anonymous(),
            CollectionQuery::tasks(None),
            ReconcilePolicy::SnapshotWins,
        )
        .await;
        assert_eq!(live.state(), LiveState::Subscribed);
        assert!(live.loading());
        assert!(live.data().is_empty());

        assert!(live.next_change().await);
        assert!(!live.loading());
        assert_eq!(live.data().len(), 1);
        assert_eq!(gateway.call_count("list_tasks"), 0);
    }

    #[tokio::test]
    async fn test_setup_failure_falls_back_once() {
        let hub = MemoryRealtime::new();
        hub.fail_subscriptions(true);
        let gateway = FakeGateway::new();
        gateway.set_tasks(vec![task("t1", "p1", TaskStatus::Todo, 10)]);

        let mut live = open_tasks(&hub, &gateway, ReconcilePolicy::SnapshotWins).await;
        assert_eq!(live.state(), LiveState::FellBack);
        assert!(!live.loading());
        assert_eq!(live.data().len(), 1);
        assert!(matches!(live.error(), Some(SyncError::SubscriptionSetup(_))));

        // No retry: nothing further to wait on and no extra fetches.
        hub.fail_subscriptions(false);
        assert!(!live.next_change().await);
        assert_eq!(gateway.call_count("list_tasks"), 1);
        assert_eq!(live.state(), LiveState::FellBack);
    }

    #[tokio::test]
    async fn test_fallback_failure_surfaces_gateway_error() {
        let hub = MemoryRealtime::new();
        hub.fail_subscriptions(true);
        let gateway = FakeGateway::new();
        gateway.fail("list_tasks", GatewayError::NetworkError("down".into()));

        let live = open_tasks(&hub, &gateway, ReconcilePolicy::SnapshotWins).await;
        assert!(!live.loading());
        assert!(live.data().is_empty());
        assert!(matches!(
            live.error(),
            Some(SyncError::Gateway(GatewayError::NetworkError(_)))
        ));
    }

    #[tokio::test]
    async fn test_users_fallback_is_unsupported() {
        let hub = MemoryRealtime::new();
        hub.fail_subscriptions(true);
        let gateway = FakeGateway::new();
        let live: LiveCollection<builderhub_common::User> = LiveCollection::open(
            &hub,
            &gateway,
            &RequestContext::anonymous(),
            CollectionQuery::users(),
            ReconcilePolicy::SnapshotWins,
        )
        .await;
        assert!(matches!(
            live.error(),
            Some(SyncError::Gateway(GatewayError::Unsupported(_)))
        ));
    }

    #[tokio::test]
    async fn test_stream_error_sets_error_and_keeps_data() {
        let hub = MemoryRealtime::new();
        let gateway = FakeGateway::new();
        seed(&hub, &task("t1", "p1", TaskStatus::Todo, 10));
        let mut live = open_tasks(&hub, &gateway, ReconcilePolicy::SnapshotWins).await;

        hub.emit_error(Collection::Tasks, "socket closed");
        live.next_change().await;
        assert!(matches!(live.error(), Some(SyncError::Stream(m)) if m == "socket closed"));
        assert_eq!(live.data().len(), 1);
        assert!(!live.loading());
    }

    #[tokio::test]
    async fn test_optimistic_mutators_splice_locally() {
        let hub = MemoryRealtime::new();
        let gateway = FakeGateway::new();
        seed(&hub, &task("t1", "p1", TaskStatus::Todo, 10));
        let mut live = open_tasks(&hub, &gateway, ReconcilePolicy::SnapshotWins).await;

        live.add_item(task("t2", "p1", TaskStatus::Todo, 20));
        assert_eq!(live.data().len(), 2);

        let before = now_millis();
        assert!(live.update_item("t1", json!({"status": "done"})).unwrap());
        let t1 = live.get("t1").unwrap();
        assert_eq!(t1.status, TaskStatus::Done);
        assert!(t1.updated_at >= before);
        assert_eq!(t1.title, "Task t1");

        assert!(!live.update_item("missing", json!({})).unwrap());
        assert!(live.delete_item("t2"));
        assert!(!live.delete_item("t2"));
        assert_eq!(live.data().len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_wins_overwrites_optimistic_value() {
        let hub = MemoryRealtime::new();
        let gateway = FakeGateway::new();
        seed(&hub, &task("t1", "p1", TaskStatus::Todo, 10));
        let mut live = open_tasks(&hub, &gateway, ReconcilePolicy::SnapshotWins).await;

        live.update_item("t1", json!({"status": "done"})).unwrap();
        seed(&hub, &task("t1", "p1", TaskStatus::Todo, 10));
        live.next_change().await;
        assert_eq!(live.get("t1").unwrap().status, TaskStatus::Todo);
    }

    // Server timestamps are whole seconds.
    const SERVER_SECS: i64 = 1_700_000_000;

    #[tokio::test]
    async fn test_pending_version_keeps_optimistic_until_newer_snapshot() {
        let hub = MemoryRealtime::new();
        let gateway = FakeGateway::new();
        seed(&hub, &task("t1", "p1", TaskStatus::Todo, SERVER_SECS));
        let mut live = open_tasks(&hub, &gateway, ReconcilePolicy::PendingVersion).await;

        live.update_item("t1", json!({"status": "done"})).unwrap();

        // A snapshot at the version the edit started from does not clobber it.
        seed(&hub, &task("t1", "p1", TaskStatus::Todo, SERVER_SECS));
        live.next_change().await;
        assert_eq!(live.get("t1").unwrap().status, TaskStatus::Done);

        // Any newer server version releases it, even one far below the
        // client's millisecond clock.
        let mut newer = task("t1", "p1", TaskStatus::InProgress, SERVER_SECS + 3600);
        newer.title = "Renamed on server".into();
        seed(&hub, &newer);
        live.next_change().await;
        let t1 = live.get("t1").unwrap();
        assert_eq!(t1.status, TaskStatus::InProgress);
        assert_eq!(t1.updated_at, SERVER_SECS + 3600);

        // And subsequent snapshots apply as-is again.
        seed(&hub, &task("t1", "p1", TaskStatus::Todo, SERVER_SECS + 7200));
        live.next_change().await;
        assert_eq!(live.get("t1").unwrap().status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn test_pending_version_releases_when_server_echoes_edit() {
        let hub = MemoryRealtime::new();
        let gateway = FakeGateway::new();
        seed(&hub, &task("t1", "p1", TaskStatus::Todo, SERVER_SECS));
        let mut live = open_tasks(&hub, &gateway, ReconcilePolicy::PendingVersion).await;

        live.update_item("t1", json!({"status": "done"})).unwrap();

        // Saved within the same second: the version does not move but the
        // content matches, so the server value takes over.
        seed(&hub, &task("t1", "p1", TaskStatus::Done, SERVER_SECS));
        live.next_change().await;
        assert_eq!(live.get("t1").unwrap().updated_at, SERVER_SECS);

        // Released: a later change from elsewhere applies.
        seed(&hub, &task("t1", "p1", TaskStatus::Todo, SERVER_SECS));
        live.next_change().await;
        assert_eq!(live.get("t1").unwrap().status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn test_pending_version_repeated_edits_keep_first_base() {
        let hub = MemoryRealtime::new();
        let gateway = FakeGateway::new();
        seed(&hub, &task("t1", "p1", TaskStatus::Todo, SERVER_SECS));
        let mut live = open_tasks(&hub, &gateway, ReconcilePolicy::PendingVersion).await;

        live.update_item("t1", json!({"status": "in_progress"})).unwrap();
        live.update_item("t1", json!({"status": "done"})).unwrap();

        seed(&hub, &task("t1", "p1", TaskStatus::InProgress, SERVER_SECS));
        live.next_change().await;
        assert_eq!(live.get("t1").unwrap().status, TaskStatus::Done);

        seed(&hub, &task("t1", "p1", TaskStatus::Done, SERVER_SECS + 1));
        live.next_change().await;
        assert_eq!(live.get("t1").unwrap().updated_at, SERVER_SECS + 1);
    }

    #[tokio::test]
    async fn test_pending_version_releases_added_item_once_listed() {
        let hub = MemoryRealtime::new();
        let gateway = FakeGateway::new();
        let mut live = open_tasks(&hub, &gateway, ReconcilePolicy::PendingVersion).await;

        live.add_item(task("t9", "p1", TaskStatus::Todo, SERVER_SECS));
        seed(&hub, &task("t9", "p1", TaskStatus::Todo, SERVER_SECS));
        live.next_change().await;
        assert_eq!(live.data().len(), 1);

        // No longer pending, so the server's removal is honoured.
        hub.remove(Collection::Tasks, "t9");
        live.next_change().await;
        assert!(live.get("t9").is_none());
    }

    #[tokio::test]
    async fn test_update_item_rejects_non_object_patch() {
        let hub = MemoryRealtime::new();
        let gateway = FakeGateway::new();
        seed(&hub, &task("t1", "p1", TaskStatus::Todo, SERVER_SECS));
        let mut live = open_tasks(&hub, &gateway, ReconcilePolicy::PendingVersion).await;

        let err = live.update_item("t1", json!(["done"])).unwrap_err();
        assert!(matches!(err, SyncError::InvalidDocument(m) if m.contains("t1")));
        assert!(matches!(
            live.update_item("missing", json!("done")),
            Err(SyncError::InvalidDocument(_))
        ));

        let t1 = live.get("t1").unwrap();
        assert_eq!(t1.status, TaskStatus::Todo);
        assert_eq!(t1.updated_at, SERVER_SECS);

        // Nothing was tracked: the next snapshot applies as-is.
        seed(&hub, &task("t1", "p1", TaskStatus::Done, SERVER_SECS));
        live.next_change().await;
        assert_eq!(live.get("t1").unwrap().status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn test_pending_version_holds_delete_until_server_agrees() {
        let hub = MemoryRealtime::new();
        let gateway = FakeGateway::new();
        seed(&hub, &task("t1", "p1", TaskStatus::Todo, 10));
        seed(&hub, &task("t2", "p1", TaskStatus::Todo, 11));
        let mut live = open_tasks(&hub, &gateway, ReconcilePolicy::PendingVersion).await;

        live.delete_item("t1");
        seed(&hub, &task("t2", "p1", TaskStatus::Done, 12));
        live.next_change().await;
        assert!(live.get("t1").is_none());
        assert_eq!(live.data().len(), 1);

        hub.remove(Collection::Tasks, "t1");
        live.next_change().await;
        assert!(live.get("t1").is_none());
    }

    #[tokio::test]
    async fn test_pending_version_keeps_added_item_missing_from_snapshot() {
        let hub = MemoryRealtime::new();
        let gateway = FakeGateway::new();
        let mut live = open_tasks(&hub, &gateway, ReconcilePolicy::PendingVersion).await;

        live.add_item(task("t9", "p1", TaskStatus::Todo, 50));
        seed(&hub, &task("t1", "p1", TaskStatus::Todo, 10));
        live.next_change().await;
        assert!(live.get("t9").is_some());
        assert!(live.get("t1").is_some());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_updates() {
        let hub = MemoryRealtime::new();
        let gateway = FakeGateway::new();
        let mut live: LiveCollection<Project> = LiveCollection::open(
            &hub,
            &gateway,
            &RequestContext::anonymous(),
            CollectionQuery::projects(),
            ReconcilePolicy::SnapshotWins,
        )
        .await;
        live.ready().await;

        live.unsubscribe();
        assert_eq!(live.state(), LiveState::Unsubscribed);
        hub.upsert(Collection::Projects, serde_json::to_value(project("p1", "Alpha")).unwrap())
            .unwrap();
        assert!(!live.next_change().await);
        assert_eq!(live.drain(), 0);
        assert!(live.data().is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_documents_are_skipped() {
        let hub = MemoryRealtime::new();
        let gateway = FakeGateway::new();
        hub.upsert(Collection::Tasks, json!({"id": "broken"})).unwrap();
        seed(&hub, &task("t1", "p1", TaskStatus::Todo, 10));
        let live = open_tasks(&hub, &gateway, ReconcilePolicy::SnapshotWins).await;
        assert_eq!(live.data().len(), 1);
    }
}
