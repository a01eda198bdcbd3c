// ============================================================================
// Message Dispatcher
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use concord_error::{TxError, TxResult};
use concord_types::{PendingMessage, TransactionMsg};

use crate::storage::TransactionStore;
use crate::transport::MessageTransport;

/// Publishes an item's pending notifications and durably records each
/// dispatch.
///
/// Delivery is at-least-once: a batch that fails midway leaves the
/// already-sent messages published and persisted (nothing is retracted),
/// and the caller retries the whole report. Consumers deduplicate on
/// (group_id, sub_task_id).
pub struct MessageDispatcher {
    store: Arc<dyn TransactionStore>,
    transport: Arc<dyn MessageTransport>,
}

impl MessageDispatcher {
    pub fn new(store: Arc<dyn TransactionStore>, transport: Arc<dyn MessageTransport>) -> Self {
        Self { store, transport }
    }

    /// Dispatch a pending-message batch for a group.
    ///
    /// Each descriptor is turned into a [`TransactionMsg`] — the `group_id`
    /// parameter is authoritative and the update time is stamped to now —
    /// then published and persisted, in that order. The first publish or
    /// persist failure short-circuits the remaining batch. An empty batch
    /// trivially succeeds.
    ///
    /// Returns the number of messages dispatched.
    pub async fn dispatch(
        &self,
        group_id: &str,
        pending: &[PendingMessage],
    ) -> TxResult<usize> {
        if pending.is_empty() {
            tracing::debug!(group_id = %group_id, "Empty pending batch, nothing to dispatch");
            return Ok(0);
        }

        let mut dispatched = 0;
        for descriptor in pending {
            let msg = TransactionMsg::from_pending(group_id, descriptor);
            let start = Instant::now();

            if let Err(e) = self.transport.publish(&msg).await {
                concord_metrics::MSG_DISPATCH_FAILURES.inc();
                return Err(TxError::Dispatch {
                    group_id: group_id.to_string(),
                    reason: format!("publish of subTask {} failed: {}", msg.sub_task_id, e),
                });
            }

            if let Err(e) = self.store.insert_msg(&msg).await {
                // The publish went out; the record did not. The retry will
                // re-publish, which downstream tolerates.
                concord_metrics::MSG_DISPATCH_FAILURES.inc();
                return Err(TxError::Dispatch {
                    group_id: group_id.to_string(),
                    reason: format!("persist of subTask {} failed: {}", msg.sub_task_id, e),
                });
            }

            concord_metrics::MSGS_DISPATCHED_TOTAL.inc();
            concord_metrics::DISPATCH_LATENCY.observe(start.elapsed().as_secs_f64());

            tracing::debug!(
                group_id = %msg.group_id,
                sub_task_id = %msg.sub_task_id,
                target = %msg.target,
                "Dispatched transaction message"
            );
            dispatched += 1;
        }

        Ok(dispatched)
    }

    /// Overwrite the consumed flag of the message matching
    /// (group_id, sub_task_id).
    ///
    /// Zero matches is a failure, not a no-op: callers must not assume an
    /// already-absent record was acknowledged.
    pub async fn acknowledge(
        &self,
        group_id: &str,
        sub_task_id: &str,
        consumed: i32,
    ) -> TxResult<()> {
        let matched = self
            .store
            .update_msg_consumed(group_id, sub_task_id, consumed)
            .await?;

        if matched == 0 {
            return Err(TxError::MsgNotFound {
                group_id: group_id.to_string(),
                sub_task_id: sub_task_id.to_string(),
            });
        }

        tracing::debug!(
            group_id = %group_id,
            sub_task_id = %sub_task_id,
            consumed = consumed,
            "Acknowledged transaction message"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::transport::LoopbackTransport;
    use serde_json::json;

    fn pending(sub_task_id: &str) -> PendingMessage {
        PendingMessage {
            schema_version: 0,
            method: "pay".to_string(),
            source: "A".to_string(),
            target: "B".to_string(),
            args: json!({"amt": 10}),
            sub_task_id: sub_task_id.to_string(),
            create_time: 1000,
            consumed: 0,
        }
    }

    fn dispatcher() -> (MessageDispatcher, Arc<MemoryStore>, Arc<LoopbackTransport>) {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(LoopbackTransport::new());
        let dispatcher = MessageDispatcher::new(store.clone(), transport.clone());
        (dispatcher, store, transport)
    }

    #[tokio::test]
    async fn test_dispatch_publishes_and_persists_each_message() {
        let (dispatcher, store, transport) = dispatcher();

        let sent = dispatcher
            .dispatch("G1", &[pending("S1"), pending("S2")])
            .await
            .unwrap();

        assert_eq!(sent, 2);
        assert_eq!(transport.published().len(), 2);

        let persisted = store.msgs();
        assert_eq!(persisted.len(), 2);
        assert_eq!(persisted[0].group_id, "G1");
        assert!(persisted.iter().all(|m| !m.is_acknowledged()));
    }

    #[tokio::test]
    async fn test_group_id_parameter_is_authoritative() {
        let (dispatcher, store, _transport) = dispatcher();

        // The descriptor has no notion of a group; whatever dispatch is
        // called with wins.
        dispatcher.dispatch("G-real", &[pending("S1")]).await.unwrap();

        assert_eq!(store.msgs()[0].group_id, "G-real");
    }

    #[tokio::test]
    async fn test_empty_batch_trivially_succeeds() {
        let (dispatcher, store, transport) = dispatcher();

        assert_eq!(dispatcher.dispatch("G1", &[]).await.unwrap(), 0);
        assert!(transport.published().is_empty());
        assert!(store.msgs().is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_short_circuits_batch() {
        let (dispatcher, store, transport) = dispatcher();
        transport.fail_after(1);

        let err = dispatcher
            .dispatch("G1", &[pending("S1"), pending("S2"), pending("S3")])
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "DISPATCH_FAILURE");
        assert!(err.retryable());

        // The first message stays published and persisted; nothing is
        // retracted.
        assert_eq!(transport.published().len(), 1);
        assert_eq!(store.msgs().len(), 1);
        assert_eq!(store.msgs()[0].sub_task_id, "S1");
    }

    #[tokio::test]
    async fn test_acknowledge_requires_a_match() {
        let (dispatcher, store, _transport) = dispatcher();
        dispatcher.dispatch("G1", &[pending("S1")]).await.unwrap();

        dispatcher.acknowledge("G1", "S1", 1).await.unwrap();
        assert!(store.msgs()[0].is_acknowledged());

        let err = dispatcher.acknowledge("G1", "S9", 1).await.unwrap_err();
        assert_eq!(err.error_code(), "MSG_NOT_FOUND");
        assert!(!err.retryable());
    }
}
