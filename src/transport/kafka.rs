// ============================================================================
// Kafka Transport
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use concord_config::KafkaConfig;
use concord_types::TransactionMsg;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use tracing::{error, info};

use super::MessageTransport;

/// Kafka-backed notification transport.
///
/// The producer is configured for at-least-once delivery: duplicate
/// notifications on retried reports are expected and consumers deduplicate
/// on (group_id, sub_task_id). Partitioning by group id keeps notification
/// order per group.
pub struct KafkaTransport {
    /// The actual Kafka producer (None when disabled)
    producer: Option<Arc<FutureProducer>>,
    topic: String,
    send_timeout: Duration,
    enabled: bool,
}

/// Builds a producer `ClientConfig` from the application's `KafkaConfig`,
/// handling SSL/TLS and SASL setup.
fn create_client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config.set("bootstrap.servers", &config.brokers);
    client_config.set("security.protocol", "plaintext");

    if config.ssl_enabled {
        info!("Enabling SSL/TLS for Kafka connection");
        client_config.set("security.protocol", "ssl");
    }

    if let (Some(mechanism), Some(username), Some(password)) = (
        &config.sasl_mechanism,
        &config.sasl_username,
        &config.sasl_password,
    ) {
        info!(sasl_mechanism = %mechanism, "Configuring SASL authentication");
        client_config
            .set("sasl.mechanism", mechanism)
            .set("sasl.username", username)
            .set("sasl.password", password);

        if config.ssl_enabled {
            client_config.set("security.protocol", "sasl_ssl");
        } else {
            client_config.set("security.protocol", "sasl_plaintext");
        }
    }

    client_config
}

impl KafkaTransport {
    /// Create a new Kafka transport from the application configuration.
    ///
    /// With `enabled = false` no producer is created and publishes succeed
    /// as no-ops, so the coordinator can run against the loopback or in
    /// tests without a broker.
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        if !config.enabled {
            info!("Kafka transport disabled (KAFKA_ENABLED=false)");
            return Ok(Self {
                producer: None,
                topic: config.topic.clone(),
                send_timeout: Duration::from_millis(config.send_timeout_ms),
                enabled: false,
            });
        }

        info!("Initializing Kafka producer...");
        let producer: FutureProducer = create_client_config(config)
            .set("acks", &config.producer_acks)
            .set(
                "enable.idempotence",
                if config.producer_enable_idempotence {
                    "true"
                } else {
                    "false"
                },
            )
            .set(
                "max.in.flight.requests.per.connection",
                config.producer_max_in_flight.to_string(),
            )
            .set("retries", config.producer_retries.to_string())
            .set("compression.type", &config.producer_compression)
            .set("linger.ms", config.producer_linger_ms.to_string())
            .set("batch.size", config.producer_batch_size.to_string())
            .set(
                "request.timeout.ms",
                config.producer_request_timeout_ms.to_string(),
            )
            .create()
            .context("Failed to create Kafka producer")?;

        info!(
            topic = %config.topic,
            "Kafka producer initialized for transaction messages"
        );

        Ok(Self {
            producer: Some(Arc::new(producer)),
            topic: config.topic.clone(),
            send_timeout: Duration::from_millis(config.send_timeout_ms),
            enabled: true,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Flush pending messages (for graceful shutdown).
    ///
    /// Waits for all in-flight messages to be acknowledged; call before
    /// application shutdown.
    pub async fn flush(&self, timeout: Duration) -> Result<()> {
        let producer = match &self.producer {
            Some(p) => p,
            None => return Ok(()),
        };

        producer
            .flush(Timeout::After(timeout))
            .context("Failed to flush Kafka producer")?;

        info!("Kafka producer flushed");
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessageTransport for KafkaTransport {
    async fn publish(&self, msg: &TransactionMsg) -> Result<()> {
        let producer = match &self.producer {
            Some(p) => p,
            None => {
                tracing::debug!(
                    group_id = %msg.group_id,
                    sub_task_id = %msg.sub_task_id,
                    "Kafka disabled - transaction message NOT sent"
                );
                return Ok(());
            }
        };

        let payload =
            serde_json::to_vec(msg).context("Failed to serialize transaction message")?;

        // Partition key: group id (preserves notification order per group)
        let record = FutureRecord::to(&self.topic)
            .key(msg.group_id.as_bytes())
            .payload(&payload);

        match producer
            .send(record, Timeout::After(self.send_timeout))
            .await
        {
            Ok((partition, offset)) => {
                tracing::debug!(
                    partition = partition,
                    offset = offset,
                    group_id = %msg.group_id,
                    sub_task_id = %msg.sub_task_id,
                    "Transaction message published to Kafka"
                );
                Ok(())
            }
            Err((kafka_err, _)) => {
                error!(
                    error = %kafka_err,
                    group_id = %msg.group_id,
                    sub_task_id = %msg.sub_task_id,
                    topic = %self.topic,
                    "Failed to publish transaction message to Kafka"
                );
                Err(anyhow::anyhow!("Kafka send failed: {}", kafka_err))
            }
        }
    }
}

// Implement Clone manually to avoid cloning the producer (Arc handles it)
impl Clone for KafkaTransport {
    fn clone(&self) -> Self {
        Self {
            producer: self.producer.as_ref().map(Arc::clone),
            topic: self.topic.clone(),
            send_timeout: self.send_timeout,
            enabled: self.enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_types::PendingMessage;

    #[test]
    fn test_disabled_transport_creation() {
        let transport = KafkaTransport::new(&KafkaConfig::disabled());

        assert!(transport.is_ok());
        assert!(!transport.unwrap().is_enabled());
    }

    #[tokio::test]
    async fn test_disabled_transport_publish() {
        let transport = KafkaTransport::new(&KafkaConfig::disabled()).unwrap();

        let msg = TransactionMsg::from_pending(
            "G1",
            &PendingMessage {
                schema_version: 0,
                method: "pay".to_string(),
                source: "A".to_string(),
                target: "B".to_string(),
                args: serde_json::Value::Null,
                sub_task_id: "S1".to_string(),
                create_time: 1000,
                consumed: 0,
            },
        );

        // Should succeed as a no-op
        assert!(transport.publish(&msg).await.is_ok());
        assert!(transport.flush(Duration::from_secs(1)).await.is_ok());
    }
}
