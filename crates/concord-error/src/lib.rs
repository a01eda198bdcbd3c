use thiserror::Error;

pub type TxResult<T> = Result<T, TxError>;

/// Coordination error taxonomy.
///
/// Every internal fault collapses to one of these variants at the public
/// boundary; nothing panics past it. Callers branch on [`TxError::retryable`]
/// instead of inspecting logs: a failed status report must be retried as a
/// whole, and retries may cause duplicate downstream notifications
/// (at-least-once delivery).
#[derive(Error, Debug)]
pub enum TxError {
    // ===== Lookup failures =====
    #[error("transaction item not found: group={group_id}, task={task_key}")]
    ItemNotFound { group_id: String, task_key: String },

    #[error("transaction message not found: group={group_id}, subTask={sub_task_id}")]
    MsgNotFound {
        group_id: String,
        sub_task_id: String,
    },

    // ===== Payload failures =====
    #[error("pending-message payload for group {group_id} could not be decoded: {reason}")]
    Decode { group_id: String, reason: String },

    // ===== Dispatch failures =====
    #[error("dispatch failed for group {group_id}: {reason}")]
    Dispatch { group_id: String, reason: String },

    #[error("dispatch for group {group_id} timed out after {timeout_ms}ms")]
    DispatchTimeout { group_id: String, timeout_ms: u64 },

    // ===== Persistence failures =====
    #[error("storage error: {0}")]
    Store(#[from] anyhow::Error),
}

impl TxError {
    /// Stable code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            TxError::ItemNotFound { .. } => "ITEM_NOT_FOUND",
            TxError::MsgNotFound { .. } => "MSG_NOT_FOUND",
            TxError::Decode { .. } => "DECODE_FAILURE",
            TxError::Dispatch { .. } => "DISPATCH_FAILURE",
            TxError::DispatchTimeout { .. } => "DISPATCH_TIMEOUT",
            TxError::Store(_) => "STORE_FAILURE",
        }
    }

    /// Whether retrying the whole operation can succeed.
    ///
    /// Dispatch and storage faults are transient from the caller's
    /// perspective; a missing record or an undecodable payload will not be
    /// fixed by retrying.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            TxError::Dispatch { .. } | TxError::DispatchTimeout { .. } | TxError::Store(_)
        )
    }

    /// Log this error with its distinguished cause before it crosses the
    /// public boundary.
    pub fn log(&self) {
        if self.retryable() {
            tracing::error!(
                error = %self,
                error_code = %self.error_code(),
                "transient coordination failure, safe to retry"
            );
        } else {
            tracing::warn!(
                error = %self,
                error_code = %self.error_code(),
                "permanent coordination failure"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = TxError::ItemNotFound {
            group_id: "G1".to_string(),
            task_key: "T1".to_string(),
        };
        assert_eq!(err.error_code(), "ITEM_NOT_FOUND");

        let err = TxError::Store(anyhow::anyhow!("connection refused"));
        assert_eq!(err.error_code(), "STORE_FAILURE");
    }

    #[test]
    fn test_retryability_split() {
        assert!(!TxError::ItemNotFound {
            group_id: "G1".to_string(),
            task_key: "T1".to_string(),
        }
        .retryable());

        assert!(!TxError::Decode {
            group_id: "G1".to_string(),
            reason: "bad shape".to_string(),
        }
        .retryable());

        assert!(TxError::Dispatch {
            group_id: "G1".to_string(),
            reason: "broker down".to_string(),
        }
        .retryable());

        assert!(TxError::DispatchTimeout {
            group_id: "G1".to_string(),
            timeout_ms: 3000,
        }
        .retryable());
    }
}
