//! # Reward Distributor
//!
//! Credits a bonus to each recipient with an independent read-modify-write
//! of the user record. Recipients are processed one at a time in the order
//! given; the first failure halts the run and everyone after it is reported
//! as skipped.
//!
//! There is no idempotency key on the ledger. A recipient reported as
//! credited must never be retried, or they are paid twice. Two settlements
//! crediting the same user concurrently can lose one increment.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::constants::operations;
use crate::error::{BusinessRule, MarketError, MarketResult};
use crate::ledger::{LedgerGateway, Transaction};
use crate::orchestration::saga::SagaReport;
use crate::orchestration::user_lifecycle::{replace_user, ProfileCache};

/// Step name used for each credited recipient
pub const CREDIT_STEP: &str = "credit";

pub struct RewardDistributor {
    gateway: Arc<LedgerGateway>,
    profiles: Arc<ProfileCache>,
}

impl RewardDistributor {
    pub fn new(gateway: Arc<LedgerGateway>, profiles: Arc<ProfileCache>) -> Self {
        Self { gateway, profiles }
    }

    /// Pay `bonus` to every distinct recipient
    ///
    /// On failure the error is always a partial failure whose report lists
    /// the credited recipients, the failed one and the skipped rest.
    pub async fn distribute(&self, bonus: u64, recipients: &[String]) -> MarketResult<SagaReport> {
        self.distribute_into(SagaReport::new(operations::DISTRIBUTE), bonus, recipients)
            .await
    }

    /// Same as [`distribute`](Self::distribute), appending to an existing report
    pub async fn distribute_into(
        &self,
        mut report: SagaReport,
        bonus: u64,
        recipients: &[String],
    ) -> MarketResult<SagaReport> {
        let recipients = distinct(recipients);
        if bonus == 0 || recipients.is_empty() {
            info!(
                operation = %report.operation,
                bonus = bonus,
                recipients = recipients.len(),
                "Nothing to distribute"
            );
            return Ok(report);
        }

        for (index, username) in recipients.iter().enumerate() {
            if let Err(err) = self.credit(username, bonus).await {
                warn!(
                    operation = %report.operation,
                    username = %username,
                    error = %err,
                    "Reward transfer failed; halting distribution"
                );
                report.failed(CREDIT_STEP, Transaction::UpdateUser, username, &err);
                for rest in &recipients[index + 1..] {
                    report.skipped(CREDIT_STEP, Transaction::UpdateUser, rest);
                }
                return Err(MarketError::partial(report, err));
            }
            report.completed(CREDIT_STEP, Transaction::UpdateUser, username);
        }

        info!(
            operation = %report.operation,
            bonus = bonus,
            recipients = recipients.len(),
            "Distribution complete"
        );
        Ok(report)
    }

    async fn credit(&self, username: &str, bonus: u64) -> MarketResult<()> {
        replace_user(&self.gateway, &self.profiles, username, |user| {
            user.token = user.token.checked_add(bonus).ok_or_else(|| {
                MarketError::rule(
                    BusinessRule::InvalidArgument,
                    format!("crediting {bonus} would overflow the balance of {username}"),
                )
            })?;
            Ok(())
        })
        .await
        .map(|_| ())
    }
}

/// First occurrence of each name, in input order
fn distinct(recipients: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    recipients
        .iter()
        .map(String::as_str)
        .filter(|name| seen.insert(*name))
        .collect()
}
