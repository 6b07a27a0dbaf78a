use crate::error::{BusinessRule, MarketError, MarketResult};
use crate::models::{Task, User};

use super::states::TaskPhase;

/// Trait for implementing precondition guards on ledger records
///
/// Guards run against a snapshot read immediately before the mutating call.
/// They narrow the window for conflicting writes but cannot close it.
pub trait StateGuard<T: ?Sized> {
    /// Check if the operation may proceed against `entity`
    fn check(&self, entity: &T) -> MarketResult<()>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// Guard to check that a task is still accepting workers
pub struct TaskOpenGuard;

impl StateGuard<Task> for TaskOpenGuard {
    fn check(&self, task: &Task) -> MarketResult<()> {
        match task.phase()? {
            TaskPhase::Open => Ok(()),
            phase => Err(MarketError::rule(
                BusinessRule::AlreadyComplete,
                format!("task {} is {phase}", task.task_id),
            )),
        }
    }

    fn description(&self) -> &'static str {
        "Task must be open"
    }
}

/// Guard to check that an account passed both approval gates
pub struct AccountActiveGuard;

impl StateGuard<User> for AccountActiveGuard {
    fn check(&self, user: &User) -> MarketResult<()> {
        let standing = user.standing();
        if standing.can_log_in() {
            Ok(())
        } else {
            Err(MarketError::rule(
                BusinessRule::NotVerified,
                format!("account {} is {standing}", user.username),
            ))
        }
    }

    fn description(&self) -> &'static str {
        "Account must be verified and accepted"
    }
}
