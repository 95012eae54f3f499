//! Polling stand-in for a push subscription.
//!
//! The first fetch doubles as subscription setup. After that the gateway is
//! polled every `interval` and a snapshot is emitted only when the result
//! differs from the last one delivered.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{CollectionQuery, RealtimeSource, SnapshotEvent, SnapshotStream};
use crate::errors::{GatewayError, SyncError};
use crate::gateway::DataGateway;
use crate::session::RequestContext;

pub struct PollingRealtime {
    gateway: Arc<dyn DataGateway>,
    ctx: RequestContext,
    interval: Duration,
}

impl PollingRealtime {
    pub fn new(gateway: Arc<dyn DataGateway>, ctx: RequestContext, interval: Duration) -> Self {
        Self {
            gateway,
            ctx,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl RealtimeSource for PollingRealtime {
    async fn subscribe(&self, query: &CollectionQuery) -> Result<SnapshotStream, SyncError> {
        // Scoped to this subscription: dropping the stream also aborts any
        // in-flight poll.
        let ctx = self.ctx.child();
        let first = self
            .gateway
            .list_collection(&ctx, query)
            .await
            .map_err(|e| SyncError::SubscriptionSetup(e.to_string()))?;

        let (tx, stream) = SnapshotStream::channel(ctx.cancel.clone());
        tx.send(SnapshotEvent::Next(first.clone()))
            .await
            .map_err(|e| SyncError::SubscriptionSetup(e.to_string()))?;

        let gateway = Arc::clone(&self.gateway);
        let query = query.clone();
        let interval = self.interval;
        tokio::spawn(async move {
            let mut last = first;
            loop {
                tokio::select! {
                    _ = ctx.cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                let event = match gateway.list_collection(&ctx, &query).await {
                    Ok(docs) if docs == last => continue,
                    Ok(docs) => {
                        last = docs.clone();
                        SnapshotEvent::Next(docs)
                    }
                    Err(GatewayError::Cancelled) => break,
                    Err(e) => {
                        tracing::warn!(collection = %query.collection, error = %e, "poll failed");
                        SnapshotEvent::Error(e.user_message())
                    }
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            tracing::debug!(collection = %query.collection, "polling subscription closed");
        });

        Ok(stream)
    }
}
