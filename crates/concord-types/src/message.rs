use serde::{Deserialize, Serialize};

/// Consumed-flag value of a message nobody has acknowledged yet. Any
/// nonzero value means acknowledged.
pub const MSG_NOT_CONSUMED: i32 = 0;

// ============================================================================
// PendingMessage - descriptor embedded in an item's argument payload
// ============================================================================

/// One queued completion notification, as embedded in a
/// [`TransactionItem`](crate::item::TransactionItem)'s argument payload.
///
/// The structure is explicit and versioned: participants that evolve the
/// shape bump `schema_version` instead of relying on positional decoding.
/// A payload that does not deserialize into this shape is a decode failure,
/// distinct from a missing item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingMessage {
    #[serde(default)]
    pub schema_version: u16,

    /// Method the downstream participant should apply
    pub method: String,

    /// Reporting service
    pub source: String,

    /// Downstream participant the notification is destined for
    pub target: String,

    /// Opaque method arguments, passed through untouched
    #[serde(default)]
    pub args: serde_json::Value,

    /// Identifies the sub-task within its group
    pub sub_task_id: String,

    /// Epoch millis at which the participant queued the notification
    pub create_time: i64,

    /// Initial consumed flag (0 = pending)
    #[serde(default)]
    pub consumed: i32,
}

// ============================================================================
// TransactionMsg - durable record of a dispatched notification
// ============================================================================

/// Immutable record of a completion notification published to the
/// transport. Created only at dispatch time via [`TransactionMsg::from_pending`];
/// after that, the consumed flag is the single mutable field (updated by
/// the acknowledgment path), and records are never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMsg {
    pub group_id: String,
    pub method: String,
    pub source: String,
    pub target: String,
    pub args: serde_json::Value,
    pub sub_task_id: String,

    /// Epoch millis, carried over from the pending descriptor
    pub create_time: i64,

    /// Epoch millis, stamped when the message was built for dispatch
    pub update_time: i64,

    /// 0 = pending, nonzero = acknowledged by the consumer
    pub consumed: i32,
}

impl TransactionMsg {
    /// Builds a dispatchable message from a pending descriptor.
    ///
    /// The `group_id` parameter is authoritative: whatever group the
    /// descriptor believes it belongs to, the message carries the group the
    /// dispatch was issued for. `update_time` is stamped to now.
    pub fn from_pending(group_id: &str, pending: &PendingMessage) -> Self {
        Self {
            group_id: group_id.to_string(),
            method: pending.method.clone(),
            source: pending.source.clone(),
            target: pending.target.clone(),
            args: pending.args.clone(),
            sub_task_id: pending.sub_task_id.clone(),
            create_time: pending.create_time,
            update_time: chrono::Utc::now().timestamp_millis(),
            consumed: pending.consumed,
        }
    }

    pub fn is_acknowledged(&self) -> bool {
        self.consumed != MSG_NOT_CONSUMED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pending() -> PendingMessage {
        PendingMessage {
            schema_version: 0,
            method: "pay".to_string(),
            source: "order-service".to_string(),
            target: "account-service".to_string(),
            args: json!({"amt": 10}),
            sub_task_id: "S1".to_string(),
            create_time: 1000,
            consumed: 0,
        }
    }

    #[test]
    fn test_from_pending_stamps_group_and_update_time() {
        let msg = TransactionMsg::from_pending("G1", &pending());

        assert_eq!(msg.group_id, "G1");
        assert_eq!(msg.sub_task_id, "S1");
        assert_eq!(msg.create_time, 1000);
        assert!(msg.update_time > msg.create_time);
        assert!(!msg.is_acknowledged());
    }

    #[test]
    fn test_pending_message_serde_defaults() {
        // Descriptors written before the schema carried version/consumed
        // fields still decode.
        let raw = json!({
            "method": "pay",
            "source": "A",
            "target": "B",
            "subTaskId": "S1",
            "createTime": 1000
        });

        let decoded: PendingMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(decoded.schema_version, 0);
        assert_eq!(decoded.consumed, 0);
        assert_eq!(decoded.args, serde_json::Value::Null);
    }

    #[test]
    fn test_pending_message_rejects_missing_required_fields() {
        let raw = json!({"method": "pay"});
        assert!(serde_json::from_value::<PendingMessage>(raw).is_err());
    }
}
