//! # Market Error Types
//!
//! Structured error handling for every orchestration call. Each variant maps to
//! one failure kind a caller has to react to differently: retry, re-read the
//! ledger before acting, fix the request, or inspect a partially applied
//! compound operation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::orchestration::saga::SagaReport;

/// Result type alias for orchestration operations
pub type MarketResult<T> = Result<T, MarketError>;

/// Business rules enforced client-side by the orchestration layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessRule {
    /// A record with the same key already exists on the ledger
    AlreadyExists,
    /// The worker already took on the task
    AlreadyAccepted,
    /// Password did not match the stored record
    BadCredentials,
    /// Account has not passed both approval gates
    NotVerified,
    /// Task already left the open phase
    AlreadyComplete,
    /// Request arguments rejected before touching the ledger
    InvalidArgument,
}

impl fmt::Display for BusinessRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists => write!(f, "already_exists"),
            Self::AlreadyAccepted => write!(f, "already_accepted"),
            Self::BadCredentials => write!(f, "bad_credentials"),
            Self::NotVerified => write!(f, "not_verified"),
            Self::AlreadyComplete => write!(f, "already_complete"),
            Self::InvalidArgument => write!(f, "invalid_argument"),
        }
    }
}

/// Comprehensive orchestration error types
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("Ledger unavailable: {message}")]
    LedgerUnavailable { message: String },

    #[error("Endorsement failed for {transaction}: {message}")]
    EndorsementFailed {
        transaction: String,
        message: String,
    },

    #[error("Commit timed out for {operation}; ledger state is indeterminate")]
    CommitTimeout { operation: String },

    #[error("{entity} not found: {key}")]
    NotFound { entity: String, key: String },

    #[error("Validation failed for {context}: {message}")]
    ValidationFailed { context: String, message: String },

    #[error("Business rule violated ({rule}): {detail}")]
    BusinessRuleViolation { rule: BusinessRule, detail: String },

    #[error("Partial failure in {}: {cause}", .report.operation)]
    PartialFailure {
        report: Box<SagaReport>,
        cause: Box<MarketError>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Certificate authority error: {operation}: {message}")]
    CertificateAuthority { operation: String, message: String },
}

impl MarketError {
    /// Create a ledger unavailable error
    pub fn ledger_unavailable(message: impl Into<String>) -> Self {
        Self::LedgerUnavailable {
            message: message.into(),
        }
    }

    /// Create a commit timeout error
    pub fn commit_timeout(operation: impl Into<String>) -> Self {
        Self::CommitTimeout {
            operation: operation.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            key: key.into(),
        }
    }

    /// Create a validation error for a malformed payload or argument
    pub fn validation(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create a business rule violation
    pub fn rule(rule: BusinessRule, detail: impl Into<String>) -> Self {
        Self::BusinessRuleViolation {
            rule,
            detail: detail.into(),
        }
    }

    /// Create a partial failure from a saga report and the error that stopped it
    pub fn partial(report: SagaReport, cause: MarketError) -> Self {
        Self::PartialFailure {
            report: Box::new(report),
            cause: Box::new(cause),
        }
    }

    /// Create a certificate authority error
    pub fn certificate_authority(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CertificateAuthority {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// The business rule behind this error, if any
    pub fn business_rule(&self) -> Option<BusinessRule> {
        match self {
            Self::BusinessRuleViolation { rule, .. } => Some(*rule),
            _ => None,
        }
    }

    /// The saga report carried by a partial failure
    pub fn partial_report(&self) -> Option<&SagaReport> {
        match self {
            Self::PartialFailure { report, .. } => Some(report),
            _ => None,
        }
    }

    /// Check if error is recoverable (safe to retry without re-reading state)
    ///
    /// Only transport failures qualify. Submit-path failures may have landed,
    /// so a retry there is the caller's explicit decision after a re-read.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::LedgerUnavailable { .. })
    }

    /// Check if the ledger may or may not reflect the attempted change
    #[must_use]
    pub fn state_indeterminate(&self) -> bool {
        matches!(
            self,
            Self::EndorsementFailed { .. } | Self::CommitTimeout { .. } | Self::PartialFailure { .. }
        )
    }

    /// Message safe to hand to an untrusted caller
    ///
    /// Credential, approval and unknown-user failures collapse into one
    /// message so a login endpoint cannot be used to enumerate usernames.
    pub fn public_message(&self) -> String {
        match self {
            Self::BusinessRuleViolation {
                rule: BusinessRule::BadCredentials | BusinessRule::NotVerified,
                ..
            } => "invalid username or password".to_string(),
            Self::NotFound { entity, .. } if entity == "user" => {
                "invalid username or password".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<LedgerError> for MarketError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Unavailable { message } => Self::ledger_unavailable(message),
            LedgerError::EndorsementFailed {
                transaction,
                message,
            } => Self::EndorsementFailed {
                transaction,
                message,
            },
            LedgerError::KeyExists { transaction, key } => Self::rule(
                BusinessRule::AlreadyExists,
                format!("{transaction} rejected: {key} already exists"),
            ),
            LedgerError::CommitTimeout { transaction } => Self::commit_timeout(transaction),
            LedgerError::NotFound { entity, key, .. } => Self::not_found(entity, key),
        }
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        Self::validation("ledger payload", err.to_string())
    }
}

impl From<config::ConfigError> for MarketError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}
