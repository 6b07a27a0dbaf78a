//! # Market Query
//!
//! Read-only listings. The chaincode answers an empty listing with the
//! literal `null`; every method here returns an empty vector instead.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::MarketResult;
use crate::ledger::{LedgerGateway, Transaction};
use crate::models::codec::decode_collection;
use crate::models::{Task, User};
use crate::orchestration::user_lifecycle::{fetch_user, ProfileCache};
use crate::state_machine::{AccountStanding, TaskPhase};

/// Display view of an account, without credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub organization: String,
    pub pub_key_hash: Option<String>,
    pub token: u64,
    pub posted_tasks: Vec<String>,
    pub accepted_tasks: Vec<String>,
    pub is_admin: bool,
    pub standing: AccountStanding,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            organization: user.organization.clone(),
            pub_key_hash: user.public_key_hash().map(str::to_string),
            token: user.token,
            posted_tasks: user.posted_tasks.clone(),
            accepted_tasks: user.accepted_tasks.clone(),
            is_admin: user.is_admin,
            standing: user.standing(),
        }
    }
}

pub struct MarketQuery {
    gateway: Arc<LedgerGateway>,
    profiles: Arc<ProfileCache>,
}

impl MarketQuery {
    pub fn new(gateway: Arc<LedgerGateway>, profiles: Arc<ProfileCache>) -> Self {
        Self { gateway, profiles }
    }

    pub async fn all_tasks(&self) -> MarketResult<Vec<Task>> {
        let payload = self.gateway.evaluate(Transaction::GetAllTasks, vec![]).await?;
        let tasks: Vec<Task> = decode_collection("task", &payload)?;
        tasks.iter().try_for_each(Task::validate)?;
        Ok(tasks)
    }

    pub async fn all_users(&self) -> MarketResult<Vec<User>> {
        let payload = self.gateway.evaluate(Transaction::GetAllUsers, vec![]).await?;
        decode_collection("user", &payload)
    }

    /// Tasks still accepting workers
    pub async fn open_tasks(&self) -> MarketResult<Vec<Task>> {
        let tasks = self.all_tasks().await?;
        Ok(tasks
            .into_iter()
            .filter(|task| matches!(task.phase(), Ok(TaskPhase::Open)))
            .collect())
    }

    /// Profile for display, served from the snapshot cache when fresh
    pub async fn user_profile(&self, username: &str) -> MarketResult<UserProfile> {
        let key = username.to_string();
        if let Some(user) = self.profiles.get_fresh(&key) {
            return Ok(UserProfile::from(&user));
        }
        let user = fetch_user(&self.gateway, username).await?;
        // A write invalidating between the read and this put is masked until the TTL expires
        self.profiles.put(key, user.clone());
        Ok(UserProfile::from(&user))
    }
}
