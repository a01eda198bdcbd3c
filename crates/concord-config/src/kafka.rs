// ============================================================================
// Kafka Configuration
// ============================================================================

/// Kafka configuration for the notification transport
#[derive(Clone, Debug)]
pub struct KafkaConfig {
    /// Whether Kafka is enabled (false = loopback/testing mode)
    pub enabled: bool,
    /// Comma-separated list of Kafka brokers (e.g., "kafka1:9092,kafka2:9092")
    pub brokers: String,
    /// Topic transaction messages are published to
    pub topic: String,
    /// SSL/TLS enabled
    pub ssl_enabled: bool,
    /// SASL mechanism (e.g., "SCRAM-SHA-256", "PLAIN")
    pub sasl_mechanism: Option<String>,
    /// SASL username
    pub sasl_username: Option<String>,
    /// SASL password
    pub sasl_password: Option<String>,
    // producer-specific settings
    pub producer_compression: String, // "zstd" | "snappy" | "gzip" | "lz4" | "none"
    pub producer_acks: String,        // "all" | "1" | "-1" | "0"
    pub producer_linger_ms: u32,
    pub producer_batch_size: u32,
    pub producer_max_in_flight: u32,
    pub producer_retries: u32,
    pub producer_request_timeout_ms: u32,
    pub producer_enable_idempotence: bool,
    /// Per-publish send timeout (milliseconds)
    pub send_timeout_ms: u64,
}

impl KafkaConfig {
    pub(crate) fn from_env() -> Self {
        Self {
            enabled: std::env::var("KAFKA_ENABLED")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            brokers: std::env::var("KAFKA_BROKERS")
                .unwrap_or_else(|_| "localhost:9092".to_string()),
            topic: std::env::var("KAFKA_TOPIC").unwrap_or_else(|_| "concord-tx-msgs".to_string()),
            ssl_enabled: std::env::var("KAFKA_SSL_ENABLED")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            sasl_mechanism: std::env::var("KAFKA_SASL_MECHANISM").ok(),
            sasl_username: std::env::var("KAFKA_SASL_USERNAME").ok(),
            sasl_password: std::env::var("KAFKA_SASL_PASSWORD").ok(),
            producer_compression: std::env::var("KAFKA_PRODUCER_COMPRESSION")
                .unwrap_or_else(|_| "snappy".to_string()),
            producer_acks: std::env::var("KAFKA_PRODUCER_ACKS")
                .unwrap_or_else(|_| "all".to_string()),
            producer_linger_ms: std::env::var("KAFKA_PRODUCER_LINGER_MS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            producer_batch_size: std::env::var("KAFKA_PRODUCER_BATCH_SIZE")
                .unwrap_or_else(|_| "16384".to_string())
                .parse()
                .unwrap_or(16384),
            producer_max_in_flight: std::env::var("KAFKA_PRODUCER_MAX_IN_FLIGHT")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            producer_retries: std::env::var("KAFKA_PRODUCER_RETRIES")
                .unwrap_or_else(|_| "2147483647".to_string())
                .parse()
                .unwrap_or(2147483647),
            producer_request_timeout_ms: std::env::var("KAFKA_PRODUCER_REQUEST_TIMEOUT_MS")
                .unwrap_or_else(|_| "30000".to_string())
                .parse()
                .unwrap_or(30000),
            producer_enable_idempotence: std::env::var("KAFKA_PRODUCER_ENABLE_IDEMPOTENCE")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            send_timeout_ms: std::env::var("KAFKA_SEND_TIMEOUT_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .unwrap_or(2000),
        }
    }

    /// A disabled configuration for tests and loopback deployments.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            brokers: "localhost:9092".to_string(),
            topic: "concord-tx-msgs".to_string(),
            ssl_enabled: false,
            sasl_mechanism: None,
            sasl_username: None,
            sasl_password: None,
            producer_compression: "none".to_string(),
            producer_acks: "all".to_string(),
            producer_linger_ms: 0,
            producer_batch_size: 16384,
            producer_max_in_flight: 5,
            producer_retries: 0,
            producer_request_timeout_ms: 30000,
            producer_enable_idempotence: true,
            send_timeout_ms: 2000,
        }
    }
}
