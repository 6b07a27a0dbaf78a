//! Market fixtures over the in-memory ledger

#![allow(dead_code)] // Not every test binary uses every builder

use std::sync::Arc;
use std::time::Duration;

use taskmarket_core::config::{CacheConfig, MarketConfig, RegistrationPolicy};
use taskmarket_core::ledger::{InMemoryLedger, LedgerContract};
use taskmarket_core::models::{AccountFlags, Task, TaskDraft, User};
use taskmarket_core::orchestration::TaskMarket;

pub const APPROVED: AccountFlags = AccountFlags {
    is_admin: false,
    is_verified: true,
    is_accepted: true,
};

/// Builder for a market wired to a fresh emulator
pub struct MarketBuilder {
    registration: RegistrationPolicy,
    cache: CacheConfig,
    latency: Option<Duration>,
    users: Vec<(String, AccountFlags)>,
}

impl MarketBuilder {
    pub fn new() -> Self {
        Self {
            registration: RegistrationPolicy::RequireApproval,
            cache: CacheConfig {
                enabled: false,
                ttl_ms: 0,
            },
            latency: None,
            users: Vec::new(),
        }
    }

    pub fn with_registration(mut self, policy: RegistrationPolicy) -> Self {
        self.registration = policy;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = CacheConfig {
            enabled: true,
            ttl_ms: ttl.as_millis() as u64,
        };
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed an approved account named `username`
    pub fn with_user(mut self, username: &str) -> Self {
        self.users.push((username.to_string(), APPROVED));
        self
    }

    pub fn with_pending_user(mut self, username: &str) -> Self {
        self.users.push((username.to_string(), AccountFlags::default()));
        self
    }

    pub fn build(self) -> (Arc<InMemoryLedger>, TaskMarket) {
        let ledger = match self.latency {
            Some(latency) => InMemoryLedger::new().with_latency(latency),
            None => InMemoryLedger::new(),
        };
        let ledger = Arc::new(ledger);
        for (username, flags) in self.users {
            ledger.seed_user(User::new(username, "pw", "org1", flags));
        }

        let config = MarketConfig {
            registration: self.registration,
            cache: self.cache,
            ..MarketConfig::default()
        };
        let contract: Arc<dyn LedgerContract> = ledger.clone();
        let market = TaskMarket::new(contract, config).expect("valid test config");
        (ledger, market)
    }
}

impl Default for MarketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Post a first-round task for `poster` and return its id
pub async fn post_task(market: &TaskMarket, poster: &str, bonus: u64) -> String {
    market
        .tasks()
        .post_task(&TaskDraft::new(bonus, "model-root", poster))
        .await
        .expect("post task")
}

/// An open task record with a fixed id, for seeding
pub fn open_task(task_id: &str, poster: &str, bonus: u64, workers: &[&str]) -> Task {
    Task {
        task_id: task_id.to_string(),
        bonus,
        root_model_id: "model-root".to_string(),
        posted_user: poster.to_string(),
        accepted_users: workers.iter().map(|w| w.to_string()).collect(),
        models: Vec::new(),
        is_complete: false,
        round: 1,
        next_round_task_id: String::new(),
    }
}
