//! # Ledger Access Port
//!
//! The two primitives the ledger offers. Everything above this trait is
//! transport-agnostic; a gRPC gateway, a test double or the in-memory
//! emulator all plug in here.

use async_trait::async_trait;
use thiserror::Error;

/// Port-level result type
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Failures a single ledger call can report
///
/// Implementations must never retry on their own; callers own retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Transport or peer connection failure; nothing reached the ledger
    #[error("ledger peer unavailable: {message}")]
    Unavailable { message: String },

    /// Chaincode or endorsement policy rejected the proposal
    #[error("endorsement of {transaction} failed: {message}")]
    EndorsementFailed {
        transaction: String,
        message: String,
    },

    /// Chaincode rejected a create because the key is taken
    #[error("{transaction} rejected: key {key} already exists")]
    KeyExists { transaction: String, key: String },

    /// Commit status was not confirmed in time; the write may still land
    #[error("commit of {transaction} was not confirmed in time")]
    CommitTimeout { transaction: String },

    /// The named key does not exist
    #[error("{transaction}: {entity} {key} does not exist")]
    NotFound {
        transaction: String,
        entity: String,
        key: String,
    },
}

impl LedgerError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn endorsement(transaction: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EndorsementFailed {
            transaction: transaction.into(),
            message: message.into(),
        }
    }

    pub fn commit_timeout(transaction: impl Into<String>) -> Self {
        Self::CommitTimeout {
            transaction: transaction.into(),
        }
    }
}

/// Connection to a deployed marketplace chaincode
///
/// `submit` orders and commits a state change and blocks until commit status
/// is known. `evaluate` is a side-effect free query. Each call is atomic on
/// its own; no two calls compose into a larger atomic unit.
#[async_trait]
pub trait LedgerContract: Send + Sync {
    /// Endpoint description for logging
    fn endpoint(&self) -> &str;

    async fn submit(&self, transaction: &str, args: &[String]) -> LedgerResult<Vec<u8>>;

    async fn evaluate(&self, transaction: &str, args: &[String]) -> LedgerResult<Vec<u8>>;
}
