use serde::{Deserialize, Serialize};

/// Status of a sub-transaction within its group.
///
/// The numeric codes are part of the wire contract with participants and
/// must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Group registered, outcome not yet decided
    Begin,

    /// Sub-transaction committed
    Commit,

    /// Sub-transaction rolled back
    Rollback,

    /// Participant reported an unrecoverable failure
    Failure,
}

impl TransactionStatus {
    /// Stable numeric code used in persisted records and on the wire.
    pub fn code(&self) -> i32 {
        match self {
            TransactionStatus::Begin => 1,
            TransactionStatus::Commit => 2,
            TransactionStatus::Rollback => 3,
            TransactionStatus::Failure => 4,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(TransactionStatus::Begin),
            2 => Some(TransactionStatus::Commit),
            3 => Some(TransactionStatus::Rollback),
            4 => Some(TransactionStatus::Failure),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Begin => "BEGIN",
            TransactionStatus::Commit => "COMMIT",
            TransactionStatus::Rollback => "ROLLBACK",
            TransactionStatus::Failure => "FAILURE",
        }
    }

    /// Terminal statuses admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Commit | TransactionStatus::Rollback)
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BEGIN" => Ok(TransactionStatus::Begin),
            "COMMIT" => Ok(TransactionStatus::Commit),
            "ROLLBACK" => Ok(TransactionStatus::Rollback),
            "FAILURE" => Ok(TransactionStatus::Failure),
            _ => Err(format!("Unknown transaction status: {}", s)),
        }
    }
}
