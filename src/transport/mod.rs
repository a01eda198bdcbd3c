// ============================================================================
// Message Transport
// ============================================================================

mod kafka;
mod loopback;

pub use kafka::KafkaTransport;
pub use loopback::LoopbackTransport;

use anyhow::Result;
use concord_types::TransactionMsg;

/// Downstream channel for transaction completion notifications.
///
/// Publishing is fire-and-forget beyond the success/failure of the call
/// itself; no acknowledgment value is consumed here. Implementations:
/// - Kafka (production)
/// - Loopback (tests, single-process deployments)
#[async_trait::async_trait]
pub trait MessageTransport: Send + Sync {
    async fn publish(&self, msg: &TransactionMsg) -> Result<()>;
}
