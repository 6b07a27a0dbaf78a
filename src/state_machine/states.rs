use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of a task record
///
/// The ledger stores only `isComplete` and `nextRoundTaskId`; the phase is
/// derived from the pair so that "finished with payout" and "advanced to a
/// successor round" can never be confused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TaskPhase {
    /// Accepting workers
    Open,
    /// Closed by spawning a successor; no payout
    Advanced { next_round_task_id: String },
    /// Closed with reward distribution to accepted workers
    Finished,
}

impl TaskPhase {
    /// Derive the phase from the stored flags
    pub fn from_record(is_complete: bool, next_round_task_id: &str) -> Result<Self, String> {
        match (is_complete, next_round_task_id.is_empty()) {
            (false, true) => Ok(Self::Open),
            (true, true) => Ok(Self::Finished),
            (true, false) => Ok(Self::Advanced {
                next_round_task_id: next_round_task_id.to_string(),
            }),
            (false, false) => Err(format!(
                "open task already links successor {next_round_task_id}"
            )),
        }
    }

    /// Check if this is a terminal phase (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }

    /// Whether reaching this phase pays the accepted workers
    pub fn pays_out(&self) -> bool {
        matches!(self, Self::Finished)
    }

    /// Stored `(isComplete, nextRoundTaskId)` pair for this phase
    pub fn to_record(&self) -> (bool, &str) {
        match self {
            Self::Open => (false, ""),
            Self::Finished => (true, ""),
            Self::Advanced { next_round_task_id } => (true, next_round_task_id.as_str()),
        }
    }
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Advanced { .. } => write!(f, "advanced"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

impl Default for TaskPhase {
    fn default() -> Self {
        Self::Open
    }
}

/// Where an account stands against the two approval gates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStanding {
    /// Neither verified nor accepted
    PendingApproval,
    /// Accepted but not verified
    AwaitingVerification,
    /// Verified but not accepted
    AwaitingAcceptance,
    /// Both gates passed; may log in
    Active,
}

impl AccountStanding {
    pub fn from_flags(is_verified: bool, is_accepted: bool) -> Self {
        match (is_verified, is_accepted) {
            (true, true) => Self::Active,
            (true, false) => Self::AwaitingAcceptance,
            (false, true) => Self::AwaitingVerification,
            (false, false) => Self::PendingApproval,
        }
    }

    pub fn can_log_in(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for AccountStanding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PendingApproval => write!(f, "pending_approval"),
            Self::AwaitingVerification => write!(f, "awaiting_verification"),
            Self::AwaitingAcceptance => write!(f, "awaiting_acceptance"),
            Self::Active => write!(f, "active"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_from_record() {
        assert_eq!(TaskPhase::from_record(false, "").unwrap(), TaskPhase::Open);
        assert_eq!(TaskPhase::from_record(true, "").unwrap(), TaskPhase::Finished);
        assert_eq!(
            TaskPhase::from_record(true, "t-2").unwrap(),
            TaskPhase::Advanced {
                next_round_task_id: "t-2".to_string()
            }
        );
        assert!(TaskPhase::from_record(false, "t-2").is_err());
    }

    #[test]
    fn test_only_finished_pays_out() {
        assert!(TaskPhase::Finished.pays_out());
        assert!(!TaskPhase::Open.pays_out());
        assert!(!TaskPhase::Advanced {
            next_round_task_id: "t-2".to_string()
        }
        .pays_out());
        assert!(!TaskPhase::Open.is_terminal());
        assert!(TaskPhase::Finished.is_terminal());
    }

    #[test]
    fn test_account_standing() {
        assert!(AccountStanding::from_flags(true, true).can_log_in());
        assert!(!AccountStanding::from_flags(true, false).can_log_in());
        assert!(!AccountStanding::from_flags(false, true).can_log_in());
        assert_eq!(
            AccountStanding::from_flags(false, false).to_string(),
            "pending_approval"
        );
    }

    #[test]
    fn test_phase_serde() {
        let phase = TaskPhase::Advanced {
            next_round_task_id: "t-2".to_string(),
        };
        let json = serde_json::to_string(&phase).unwrap();
        assert_eq!(json, r#"{"phase":"advanced","next_round_task_id":"t-2"}"#);
        let parsed: TaskPhase = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, phase);
    }
}
