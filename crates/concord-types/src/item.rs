use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::message::PendingMessage;
use crate::status::TransactionStatus;

/// Wall-clock format of an item's creation timestamp. Participants write
/// this as a formatted string; it is parsed back on demand.
pub const CREATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The item's argument payload did not have the expected shape.
#[derive(Debug, thiserror::Error)]
#[error("pending-message payload has unexpected shape: {0}")]
pub struct PayloadShapeError(pub String);

// ============================================================================
// TransactionItem - one participant's unit of work within a group
// ============================================================================

/// One participant's sub-transaction record. `(group_id, task_key)` is
/// unique. The item references its group by id only; it does not own it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionItem {
    pub group_id: String,

    /// Unique within the group
    pub task_key: String,

    /// Formatted with [`CREATE_TIME_FORMAT`], parsed on demand
    pub create_time: String,

    pub status: TransactionStatus,

    /// Human-readable result message from the participant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Seconds between creation and the final status report
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consume_time: Option<i64>,

    /// Set while a status report is between "first notification published"
    /// and "status update committed". A set marker on load means a prior
    /// report may already have dispatched.
    #[serde(default)]
    pub dispatch_pending: bool,

    /// Opaque argument payload. The first element is the pending-message
    /// batch; the rest is passed through untouched.
    #[serde(default)]
    pub args: serde_json::Value,
}

impl TransactionItem {
    /// Creates a fresh item carrying the given pending-message batch as the
    /// first element of its argument payload.
    pub fn new(group_id: &str, task_key: &str, pending: Vec<PendingMessage>) -> Self {
        let batch = serde_json::to_value(pending).unwrap_or_else(|_| serde_json::json!([]));
        Self {
            group_id: group_id.to_string(),
            task_key: task_key.to_string(),
            create_time: chrono::Utc::now().format(CREATE_TIME_FORMAT).to_string(),
            status: TransactionStatus::Begin,
            message: None,
            consume_time: None,
            dispatch_pending: false,
            args: serde_json::Value::Array(vec![batch]),
        }
    }

    /// Decodes the pending-message batch embedded in the argument payload.
    ///
    /// The payload must be a non-empty array whose first element is a
    /// sequence of [`PendingMessage`] descriptors. An empty batch (`[[]]`)
    /// is valid; a payload without a first element, or a first element of
    /// the wrong shape, is a decode failure.
    pub fn pending_messages(&self) -> Result<Vec<PendingMessage>, PayloadShapeError> {
        let first = self
            .args
            .as_array()
            .and_then(|args| args.first())
            .ok_or_else(|| {
                PayloadShapeError("argument payload has no first element".to_string())
            })?;

        serde_json::from_value(first.clone())
            .map_err(|e| PayloadShapeError(format!("first element is not a message batch: {}", e)))
    }

    pub fn parse_create_time(&self) -> Result<NaiveDateTime, chrono::ParseError> {
        NaiveDateTime::parse_from_str(&self.create_time, CREATE_TIME_FORMAT)
    }
}

// ============================================================================
// TransactionGroup - a set of cooperating sub-transactions
// ============================================================================

/// A set of related sub-transactions that must reach a consistent
/// collective outcome. Members are independent records tagged with the
/// group id; the group itself is never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionGroup {
    pub id: String,

    #[serde(default)]
    pub items: Vec<TransactionItem>,
}

impl TransactionGroup {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            items: Vec::new(),
        }
    }

    pub fn with_items(id: &str, items: Vec<TransactionItem>) -> Self {
        Self {
            id: id.to_string(),
            items,
        }
    }
}
