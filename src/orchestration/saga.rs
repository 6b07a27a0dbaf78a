//! # Saga Reports
//!
//! Ordered record of the ledger calls a compound operation issued and what
//! became of each one. A report travels inside
//! [`MarketError::PartialFailure`](crate::error::MarketError) so the caller
//! can tell exactly which writes landed before deciding whether to retry the
//! remainder. No step is ever compensated automatically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MarketError;
use crate::ledger::Transaction;
use crate::logging::log_saga_step;

/// Outcome of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    /// `indeterminate` is set when the write may have landed anyway
    Failed { error: String, indeterminate: bool },
    /// Never attempted because an earlier step failed
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaStep {
    pub name: String,
    pub transaction: Transaction,
    /// Record key the step wrote to
    pub subject: String,
    #[serde(flatten)]
    pub status: StepStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaReport {
    pub operation_id: Uuid,
    pub operation: String,
    pub started_at: DateTime<Utc>,
    pub steps: Vec<SagaStep>,
}

impl SagaReport {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation_id: Uuid::new_v4(),
            operation: operation.into(),
            started_at: Utc::now(),
            steps: Vec::new(),
        }
    }

    pub fn completed(&mut self, name: &str, transaction: Transaction, subject: &str) {
        self.push(name, transaction, subject, StepStatus::Completed);
    }

    pub fn failed(
        &mut self,
        name: &str,
        transaction: Transaction,
        subject: &str,
        error: &MarketError,
    ) {
        let status = StepStatus::Failed {
            error: error.to_string(),
            indeterminate: error.state_indeterminate(),
        };
        self.push(name, transaction, subject, status);
    }

    /// Record a step whose write was accepted but whose outcome could not be read back
    pub fn unconfirmed(
        &mut self,
        name: &str,
        transaction: Transaction,
        subject: &str,
        error: &MarketError,
    ) {
        let status = StepStatus::Failed {
            error: error.to_string(),
            indeterminate: true,
        };
        self.push(name, transaction, subject, status);
    }

    pub fn skipped(&mut self, name: &str, transaction: Transaction, subject: &str) {
        self.push(name, transaction, subject, StepStatus::Skipped);
    }

    fn push(&mut self, name: &str, transaction: Transaction, subject: &str, status: StepStatus) {
        let label = match &status {
            StepStatus::Completed => "completed",
            StepStatus::Failed { .. } => "failed",
            StepStatus::Skipped => "skipped",
        };
        log_saga_step(&self.operation, name, subject, label);
        self.steps.push(SagaStep {
            name: name.to_string(),
            transaction,
            subject: subject.to_string(),
            status,
        });
    }

    /// Whether any write of this operation landed
    pub fn has_applied(&self) -> bool {
        self.steps
            .iter()
            .any(|step| step.status == StepStatus::Completed)
    }

    /// Turn a step failure into the error the caller sees
    ///
    /// Before anything was applied the step error is returned as is;
    /// afterwards it is wrapped in a partial failure carrying this report.
    pub fn abort(
        mut self,
        name: &str,
        transaction: Transaction,
        subject: &str,
        error: MarketError,
    ) -> MarketError {
        if !self.has_applied() {
            return error;
        }
        self.failed(name, transaction, subject, &error);
        MarketError::partial(self, error)
    }

    /// Subjects of the completed steps named `name`, in execution order
    pub fn completed_subjects(&self, name: &str) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|step| step.name == name && step.status == StepStatus::Completed)
            .map(|step| step.subject.as_str())
            .collect()
    }

    /// Subjects of the steps named `name` that did not complete
    pub fn unapplied_subjects(&self, name: &str) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|step| step.name == name && step.status != StepStatus::Completed)
            .map(|step| step.subject.as_str())
            .collect()
    }

    pub fn failed_step(&self) -> Option<&SagaStep> {
        self.steps
            .iter()
            .find(|step| matches!(step.status, StepStatus::Failed { .. }))
    }

    pub fn is_clean(&self) -> bool {
        self.steps
            .iter()
            .all(|step| step.status == StepStatus::Completed)
    }
}
