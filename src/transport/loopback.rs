// ============================================================================
// Loopback Transport
// ============================================================================

use std::sync::Mutex;

use anyhow::Result;
use concord_types::TransactionMsg;

use super::MessageTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailMode {
    Never,
    Always,
    /// Accept this many publishes, then reject the rest
    After(usize),
}

/// In-process transport that records published messages.
///
/// Used by the test suite and by single-process deployments whose
/// notification consumer runs in the same process. The failure switch lets
/// tests exercise the dispatch-failure paths without a broker.
pub struct LoopbackTransport {
    published: Mutex<Vec<TransactionMsg>>,
    fail_mode: Mutex<FailMode>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail_mode: Mutex::new(FailMode::Never),
        }
    }

    /// Snapshot of everything published so far, in publish order
    pub fn published(&self) -> Vec<TransactionMsg> {
        self.published.lock().expect("transport lock poisoned").clone()
    }

    /// Reject every publish from now on
    pub fn set_failing(&self, failing: bool) {
        *self.fail_mode.lock().expect("transport lock poisoned") =
            if failing { FailMode::Always } else { FailMode::Never };
    }

    /// Accept `n` more publishes, then reject the rest
    pub fn fail_after(&self, n: usize) {
        *self.fail_mode.lock().expect("transport lock poisoned") = FailMode::After(n);
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MessageTransport for LoopbackTransport {
    async fn publish(&self, msg: &TransactionMsg) -> Result<()> {
        {
            let mut mode = self.fail_mode.lock().expect("transport lock poisoned");
            match *mode {
                FailMode::Never => {}
                FailMode::Always => anyhow::bail!("transport rejected publish"),
                FailMode::After(0) => anyhow::bail!("transport rejected publish"),
                FailMode::After(n) => *mode = FailMode::After(n - 1),
            }
        }

        self.published
            .lock()
            .expect("transport lock poisoned")
            .push(msg.clone());

        tracing::debug!(
            group_id = %msg.group_id,
            sub_task_id = %msg.sub_task_id,
            "Published transaction message on loopback"
        );

        Ok(())
    }
}
