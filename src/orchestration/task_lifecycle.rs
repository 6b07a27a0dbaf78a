//! # Task Lifecycle Manager
//!
//! Creation, posting, acceptance, round advance and completion of tasks.
//!
//! ## Compound operations
//!
//! Posting, acceptance and round advance each need two submits that the
//! ledger cannot make atomic together. They run as sagas: a failure of the
//! first write returns that error unchanged, a failure after a write landed
//! returns [`MarketError::PartialFailure`] with the report of what was
//! applied. Nothing is rolled back.
//!
//! Completion does not pay anyone; see [`RewardDistributor`] and
//! [`TaskMarket::finish_and_distribute`].
//!
//! [`RewardDistributor`]: crate::orchestration::RewardDistributor
//! [`TaskMarket::finish_and_distribute`]: crate::orchestration::TaskMarket::finish_and_distribute

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::operations;
use crate::error::{BusinessRule, MarketError, MarketResult};
use crate::ledger::{LedgerGateway, Transaction};
use crate::logging::log_task_operation;
use crate::models::codec::decode_assigned_id;
use crate::models::{Task, TaskDraft};
use crate::orchestration::saga::SagaReport;
use crate::orchestration::user_lifecycle::{fetch_user, ProfileCache};
use crate::state_machine::{StateGuard, TaskOpenGuard, TaskPhase};

/// Ids produced by a round advance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundAdvance {
    pub predecessor_id: String,
    pub successor_id: String,
    /// Round number of the successor
    pub round: u32,
}

pub struct TaskLifecycleManager {
    gateway: Arc<LedgerGateway>,
    profiles: Arc<ProfileCache>,
}

impl TaskLifecycleManager {
    pub fn new(gateway: Arc<LedgerGateway>, profiles: Arc<ProfileCache>) -> Self {
        Self { gateway, profiles }
    }

    /// Create a task and return the id the ledger assigned
    ///
    /// The submit has already committed when the answer is decoded, so an
    /// unreadable id is reported as a partial failure: the task exists but
    /// its key is unknown, and retrying blindly would create a second one.
    pub async fn create_task(&self, draft: &TaskDraft) -> MarketResult<String> {
        draft.validate()?;
        let payload = self
            .gateway
            .submit(Transaction::CreateTask, draft.create_args())
            .await?;
        let task_id = match decode_assigned_id("task", &payload) {
            Ok(task_id) => task_id,
            Err(err) => {
                log_task_operation(
                    operations::CREATE_TASK,
                    None,
                    Some(draft.round),
                    "unconfirmed",
                    Some(&err.to_string()),
                );
                let mut report = SagaReport::new(operations::CREATE_TASK);
                report.unconfirmed(
                    "create_task",
                    Transaction::CreateTask,
                    &draft.posted_user,
                    &err,
                );
                return Err(MarketError::partial(report, err));
            }
        };

        log_task_operation(
            operations::CREATE_TASK,
            Some(&task_id),
            Some(draft.round),
            "success",
            None,
        );
        Ok(task_id)
    }

    /// Create a task and record it in the poster's posted list
    pub async fn post_task(&self, draft: &TaskDraft) -> MarketResult<String> {
        draft.validate()?;
        fetch_user(&self.gateway, &draft.posted_user).await?;
        self.profiles.invalidate(&draft.posted_user);

        let mut report = SagaReport::new(operations::POST_TASK);
        let task_id = self.create_task(draft).await?;
        report.completed("create_task", Transaction::CreateTask, &task_id);

        // The chaincode names this argument modelId but stores it in postedTasks
        let link = vec![draft.posted_user.clone(), task_id.clone()];
        if let Err(err) = self.gateway.submit(Transaction::AddToPosted, link).await {
            log_task_operation(
                operations::POST_TASK,
                Some(&task_id),
                Some(draft.round),
                "partial",
                Some(&err.to_string()),
            );
            return Err(report.abort(
                "link_poster",
                Transaction::AddToPosted,
                &draft.posted_user,
                err,
            ));
        }

        log_task_operation(
            operations::POST_TASK,
            Some(&task_id),
            Some(draft.round),
            "success",
            None,
        );
        Ok(task_id)
    }

    pub async fn read_task(&self, task_id: &str) -> MarketResult<Task> {
        let payload = self
            .gateway
            .evaluate(Transaction::ReadTask, vec![task_id.to_string()])
            .await?;
        Task::decode(&payload)
    }

    /// Link a worker and a task on both records
    ///
    /// The chaincode appends blindly, so both sides are checked first and
    /// only the missing links are written. Re-running after a partial failure
    /// finishes the job instead of duplicating entries.
    pub async fn accept_task(&self, username: &str, task_id: &str) -> MarketResult<SagaReport> {
        let user = fetch_user(&self.gateway, username).await?;
        let task = self.read_task(task_id).await?;

        let user_linked = user.has_accepted(task_id);
        let task_linked = task.has_worker(username);
        if user_linked && task_linked {
            return Err(MarketError::rule(
                BusinessRule::AlreadyAccepted,
                format!("{username} already accepted task {task_id}"),
            ));
        }
        if !user_linked && !task_linked {
            TaskOpenGuard.check(&task)?;
        }

        self.profiles.invalidate(&username.to_string());
        let mut report = SagaReport::new(operations::ACCEPT_TASK);

        if !user_linked {
            let args = vec![username.to_string(), task_id.to_string()];
            match self.gateway.submit(Transaction::AddToAccepted, args).await {
                Ok(_) => report.completed("link_user", Transaction::AddToAccepted, username),
                Err(err) => {
                    let err = report.abort("link_user", Transaction::AddToAccepted, username, err);
                    return Err(err);
                }
            }
        }

        if !task_linked {
            let args = vec![task_id.to_string(), username.to_string()];
            match self.gateway.submit(Transaction::AddUserToTask, args).await {
                Ok(_) => report.completed("link_task", Transaction::AddUserToTask, task_id),
                Err(err) => {
                    log_task_operation(
                        operations::ACCEPT_TASK,
                        Some(task_id),
                        Some(task.round),
                        "partial",
                        Some(&err.to_string()),
                    );
                    let err = report.abort("link_task", Transaction::AddUserToTask, task_id, err);
                    return Err(err);
                }
            }
        }

        log_task_operation(
            operations::ACCEPT_TASK,
            Some(task_id),
            Some(task.round),
            "success",
            Some(username),
        );
        Ok(report)
    }

    /// Spawn the next round and close this one without payout
    ///
    /// The successor is created first. If closing the predecessor then fails,
    /// the successor exists with no backlink; its id is in the report.
    pub async fn advance_round(
        &self,
        task_id: &str,
        new_root_model_id: &str,
    ) -> MarketResult<RoundAdvance> {
        let task = self.read_task(task_id).await?;
        TaskOpenGuard.check(&task)?;

        let round = task.round.checked_add(1).ok_or_else(|| {
            MarketError::rule(
                BusinessRule::InvalidArgument,
                format!("task {task_id} is at the last representable round"),
            )
        })?;
        let draft = TaskDraft {
            bonus: task.bonus,
            root_model_id: new_root_model_id.to_string(),
            posted_user: task.posted_user.clone(),
            round,
            next_round_task_id: String::new(),
        };

        let mut report = SagaReport::new(operations::ADVANCE_ROUND);
        let successor_id = self.create_task(&draft).await?;
        report.completed("create_successor", Transaction::CreateTask, &successor_id);

        let closed = task.with_phase(&TaskPhase::Advanced {
            next_round_task_id: successor_id.clone(),
        });
        if let Err(err) = self
            .gateway
            .submit(Transaction::UpdateTask, closed.update_args())
            .await
        {
            log_task_operation(
                operations::ADVANCE_ROUND,
                Some(task_id),
                Some(task.round),
                "partial",
                Some(&format!("orphan successor {successor_id}: {err}")),
            );
            let err = report.abort("close_predecessor", Transaction::UpdateTask, task_id, err);
            return Err(err);
        }

        info!(
            task_id = %task_id,
            successor_id = %successor_id,
            round = round,
            "Advanced task to next round"
        );
        Ok(RoundAdvance {
            predecessor_id: task_id.to_string(),
            successor_id,
            round,
        })
    }

    /// Mark a task finished and return the workers owed the bonus
    pub async fn finish(&self, task_id: &str) -> MarketResult<Vec<String>> {
        self.complete(task_id).await.map(|task| task.accepted_users)
    }

    /// Mark a task finished and return the closed snapshot
    ///
    /// Refuses anything but an open task, so a finished or advanced task can
    /// never be settled twice.
    pub async fn complete(&self, task_id: &str) -> MarketResult<Task> {
        let task = self.read_task(task_id).await?;
        TaskOpenGuard.check(&task)?;

        let closed = task.with_phase(&TaskPhase::Finished);
        let result = self
            .gateway
            .submit(Transaction::UpdateTask, closed.update_args())
            .await;

        let status = if result.is_ok() { "success" } else { "failed" };
        log_task_operation(
            operations::FINISH_TASK,
            Some(task_id),
            Some(task.round),
            status,
            result.as_ref().err().map(ToString::to_string).as_deref(),
        );
        result.map(|_| closed)
    }

    pub async fn delete_task(&self, task_id: &str) -> MarketResult<()> {
        let result = self
            .gateway
            .submit(Transaction::DeleteTask, vec![task_id.to_string()])
            .await
            .map(|_| ());
        let status = if result.is_ok() { "success" } else { "failed" };
        log_task_operation(operations::DELETE_TASK, Some(task_id), None, status, None);
        result
    }
}
