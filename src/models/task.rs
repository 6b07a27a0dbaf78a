//! # Task Record
//!
//! A unit of work with a token bounty. `isComplete` only ever moves from
//! false to true; whether completion paid out or spawned a successor round is
//! read from [`Task::phase`].

use serde::{Deserialize, Serialize};

use crate::constants::ledger::ASSIGN_ID;
use crate::error::{BusinessRule, MarketError, MarketResult};
use crate::models::codec::{decode_record, encode_bool, encode_int, null_as_empty};
use crate::state_machine::TaskPhase;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "id")]
    pub task_id: String,
    pub bonus: u64,
    pub root_model_id: String,
    pub posted_user: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub accepted_users: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub models: Vec<String>,
    #[serde(default)]
    pub is_complete: bool,
    pub round: u32,
    #[serde(default)]
    pub next_round_task_id: String,
}

impl Task {
    /// Decode a `ReadTask` response and check its invariants
    pub fn decode(payload: &[u8]) -> MarketResult<Self> {
        let task: Self = decode_record("task", payload)?;
        task.validate()?;
        Ok(task)
    }

    pub fn validate(&self) -> MarketResult<()> {
        if self.task_id.trim().is_empty() {
            return Err(MarketError::validation("task", "record has no id"));
        }
        if self.round == 0 {
            return Err(MarketError::validation(
                format!("task {}", self.task_id),
                "round must be at least 1",
            ));
        }
        self.phase().map(|_| ())
    }

    pub fn phase(&self) -> MarketResult<TaskPhase> {
        TaskPhase::from_record(self.is_complete, &self.next_round_task_id)
            .map_err(|reason| MarketError::validation(format!("task {}", self.task_id), reason))
    }

    pub fn next_round(&self) -> Option<&str> {
        Some(self.next_round_task_id.as_str()).filter(|id| !id.is_empty())
    }

    pub fn has_worker(&self, username: &str) -> bool {
        self.accepted_users.iter().any(|user| user == username)
    }

    /// Copy of this record moved into `phase`
    pub fn with_phase(&self, phase: &TaskPhase) -> Self {
        let (is_complete, next_round_task_id) = phase.to_record();
        Self {
            is_complete,
            next_round_task_id: next_round_task_id.to_string(),
            ..self.clone()
        }
    }

    /// Positional arguments for `UpdateTask`
    pub fn update_args(&self) -> Vec<String> {
        vec![
            self.task_id.clone(),
            encode_int(self.bonus),
            self.root_model_id.clone(),
            self.posted_user.clone(),
            encode_bool(self.is_complete),
            encode_int(self.round),
            self.next_round_task_id.clone(),
        ]
    }
}

/// Fields supplied when creating a task; the ledger assigns the id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub bonus: u64,
    pub root_model_id: String,
    pub posted_user: String,
    pub round: u32,
    #[serde(default)]
    pub next_round_task_id: String,
}

impl TaskDraft {
    /// First-round draft with no successor
    pub fn new(
        bonus: u64,
        root_model_id: impl Into<String>,
        posted_user: impl Into<String>,
    ) -> Self {
        Self {
            bonus,
            root_model_id: root_model_id.into(),
            posted_user: posted_user.into(),
            round: 1,
            next_round_task_id: String::new(),
        }
    }

    pub fn validate(&self) -> MarketResult<()> {
        if self.posted_user.trim().is_empty() {
            return Err(MarketError::rule(
                BusinessRule::InvalidArgument,
                "task needs a posting user",
            ));
        }
        if self.root_model_id.trim().is_empty() {
            return Err(MarketError::rule(
                BusinessRule::InvalidArgument,
                "task needs a root model",
            ));
        }
        if self.round == 0 {
            return Err(MarketError::rule(
                BusinessRule::InvalidArgument,
                "task round must be at least 1",
            ));
        }
        Ok(())
    }

    /// Positional arguments for `CreateTask`
    pub fn create_args(&self) -> Vec<String> {
        vec![
            ASSIGN_ID.to_string(),
            encode_int(self.bonus),
            self.root_model_id.clone(),
            self.posted_user.clone(),
            encode_int(self.round),
            self.next_round_task_id.clone(),
        ]
    }
}
