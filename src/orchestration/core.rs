//! # Task Market Core
//!
//! Bootstrap path for the orchestration layer. Builds one gateway over the
//! supplied ledger connection and hands the same shared handle to every
//! manager; the connection is never mutated after construction.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cache::SnapshotCache;
use crate::config::MarketConfig;
use crate::constants::operations;
use crate::error::{BusinessRule, MarketError, MarketResult};
use crate::ledger::{LedgerContract, LedgerGateway, Transaction};
use crate::models::Task;
use crate::orchestration::market_query::MarketQuery;
use crate::orchestration::model_registry::ModelRegistry;
use crate::orchestration::reward_distributor::RewardDistributor;
use crate::orchestration::saga::SagaReport;
use crate::orchestration::task_lifecycle::TaskLifecycleManager;
use crate::orchestration::user_lifecycle::{ProfileCache, UserLifecycleManager};
use crate::state_machine::TaskPhase;

/// Outcome of finishing a task and paying its workers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Snapshot of the task as it was closed
    pub task: Task,
    pub payout: SagaReport,
}

/// Entry point wiring every manager to one ledger connection
pub struct TaskMarket {
    config: MarketConfig,
    gateway: Arc<LedgerGateway>,
    profiles: Arc<ProfileCache>,
    users: UserLifecycleManager,
    tasks: TaskLifecycleManager,
    rewards: RewardDistributor,
    models: ModelRegistry,
    query: MarketQuery,
}

impl std::fmt::Debug for TaskMarket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskMarket")
            .field("gateway", &self.gateway)
            .field("registration", &self.config.registration)
            .field("cached_profiles", &self.profiles.len())
            .finish()
    }
}

impl TaskMarket {
    /// Validate the configuration and build all managers over `contract`
    pub fn new(contract: Arc<dyn LedgerContract>, config: MarketConfig) -> MarketResult<Self> {
        config.validate()?;
        info!(
            endpoint = %contract.endpoint(),
            channel = %config.ledger.channel,
            chaincode = %config.ledger.chaincode,
            registration = ?config.registration,
            "🔧 Initializing TaskMarket"
        );

        let gateway = Arc::new(LedgerGateway::from_config(contract, &config));
        let profiles = Arc::new(SnapshotCache::new(&config.cache));

        Ok(Self {
            users: UserLifecycleManager::new(
                gateway.clone(),
                config.registration,
                profiles.clone(),
            ),
            tasks: TaskLifecycleManager::new(gateway.clone(), profiles.clone()),
            rewards: RewardDistributor::new(gateway.clone(), profiles.clone()),
            models: ModelRegistry::new(gateway.clone()),
            query: MarketQuery::new(gateway.clone(), profiles.clone()),
            config,
            gateway,
            profiles,
        })
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn gateway(&self) -> &LedgerGateway {
        &self.gateway
    }

    pub fn users(&self) -> &UserLifecycleManager {
        &self.users
    }

    pub fn tasks(&self) -> &TaskLifecycleManager {
        &self.tasks
    }

    pub fn rewards(&self) -> &RewardDistributor {
        &self.rewards
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn query(&self) -> &MarketQuery {
        &self.query
    }

    /// Close a task with payout, then credit its bonus to every worker
    ///
    /// Only an open task can be settled, so a repeated call fails with
    /// `AlreadyComplete` instead of paying again. If crediting fails part
    /// way, the partial failure report starts with the completed
    /// `mark_complete` step followed by the per-recipient credits.
    ///
    /// When closing the task fails indeterminately (`CommitTimeout` or
    /// `EndorsementFailed`) the write may have landed, and a retry is then
    /// refused with `AlreadyComplete`. Read the task: if it is `Finished`,
    /// pay its workers with [`settle_finished`](Self::settle_finished).
    pub async fn finish_and_distribute(&self, task_id: &str) -> MarketResult<Settlement> {
        let task = self.tasks.complete(task_id).await?;

        let mut report = SagaReport::new(operations::FINISH_AND_DISTRIBUTE);
        report.completed("mark_complete", Transaction::UpdateTask, task_id);

        let payout = self
            .rewards
            .distribute_into(report, task.bonus, &task.accepted_users)
            .await?;

        info!(
            task_id = %task_id,
            bonus = task.bonus,
            workers = task.accepted_users.len(),
            "✅ Task settled"
        );
        Ok(Settlement { task, payout })
    }

    /// Pay the workers of a task that is already `Finished`
    ///
    /// Recovery for a close whose outcome was unknown. The ledger keeps no
    /// payout marker, so the caller must know no credit for this task has
    /// been applied yet; calling it twice pays twice.
    pub async fn settle_finished(&self, task_id: &str) -> MarketResult<Settlement> {
        let task = self.tasks.read_task(task_id).await?;
        match task.phase()? {
            TaskPhase::Finished => {}
            TaskPhase::Open => {
                return Err(MarketError::rule(
                    BusinessRule::InvalidArgument,
                    format!("task {task_id} is still open; use finish_and_distribute"),
                ))
            }
            TaskPhase::Advanced { .. } => {
                return Err(MarketError::rule(
                    BusinessRule::AlreadyComplete,
                    format!("task {task_id} advanced to a new round without payout"),
                ))
            }
        }

        let payout = self
            .rewards
            .distribute_into(
                SagaReport::new(operations::SETTLE_FINISHED),
                task.bonus,
                &task.accepted_users,
            )
            .await?;

        info!(
            task_id = %task_id,
            bonus = task.bonus,
            workers = task.accepted_users.len(),
            "✅ Finished task settled"
        );
        Ok(Settlement { task, payout })
    }
}
