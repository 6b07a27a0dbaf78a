//! # Orchestration
//!
//! Sequences ledger reads and writes into the user and task lifecycles.
//!
//! ## Execution model
//!
//! Every operation runs a strictly sequential chain of awaited ledger calls;
//! nothing inside one operation runs concurrently. Separate operations may
//! run concurrently against the same keys with no client-side locking, and a
//! reader can observe a compound operation half done.
//!
//! ## Core Components
//!
//! - **UserLifecycleManager**: registration, login, approvals, keys, deletion
//! - **TaskLifecycleManager**: create, post, accept, advance, finish, delete
//! - **RewardDistributor**: sequential per-recipient token credits
//! - **MarketQuery**: listings with `null` normalization and cached profiles
//! - **ModelRegistry**: model uploads
//! - **TaskMarket**: wires all of the above to one ledger connection

pub mod core;
pub mod market_query;
pub mod model_registry;
pub mod reward_distributor;
pub mod saga;
pub mod task_lifecycle;
pub mod user_lifecycle;

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{MarketError, MarketResult};

pub use self::core::{Settlement, TaskMarket};
pub use market_query::{MarketQuery, UserProfile};
pub use model_registry::ModelRegistry;
pub use reward_distributor::{RewardDistributor, CREDIT_STEP};
pub use saga::{SagaReport, SagaStep, StepStatus};
pub use task_lifecycle::{RoundAdvance, TaskLifecycleManager};
pub use user_lifecycle::{ProfileCache, UserLifecycleManager};

/// Bound a whole operation by a caller deadline
///
/// Expiry drops the future, which cannot recall a submit already sent, so it
/// is reported as a commit timeout: re-read the ledger before retrying.
pub async fn with_deadline<T, F>(deadline: Duration, operation: &str, future: F) -> MarketResult<T>
where
    F: Future<Output = MarketResult<T>>,
{
    match tokio::time::timeout(deadline, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                operation = %operation,
                deadline_ms = deadline.as_millis() as u64,
                "Operation deadline expired; ledger state unknown"
            );
            Err(MarketError::commit_timeout(operation))
        }
    }
}
