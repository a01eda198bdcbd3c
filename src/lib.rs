//! # Concord Server
//!
//! Status-coordination core of the Concord distributed transaction
//! manager. It tracks groups of related sub-transactions contributed by
//! participating services, records their lifecycle, and guarantees that a
//! sub-transaction's completion notifications are durably dispatched
//! before its status is marked final.
//!
//! The consistency rule is dispatch-then-commit: a persisted status always
//! means "outcome recorded AND all downstream notifications published".
//! The converse does not hold — a failed report can leave notifications
//! published without a status update, which the caller resolves by
//! retrying the whole report (duplicate notifications are tolerated
//! downstream).
//!
//! Entry point: [`TxCoordinator`], wired with a [`storage::TransactionStore`]
//! and a [`transport::MessageTransport`] implementation.

pub mod coordinator;
pub mod dispatcher;
pub mod lifecycle;
pub mod storage;
pub mod telemetry;
pub mod transport;

pub use concord_error::{TxError, TxResult};
pub use concord_types::{
    Collection, PendingMessage, TransactionGroup, TransactionItem, TransactionMsg,
    TransactionStatus,
};
pub use coordinator::TxCoordinator;
