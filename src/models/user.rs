//! # User Record
//!
//! Identity and participation record. The username is the ledger key and
//! never changes; every other field is replaced wholesale through
//! `UpdateUser`, except the posted/accepted lists which the chaincode only
//! grows through its dedicated append transactions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{MarketError, MarketResult};
use crate::models::codec::{decode_record, encode_bool, encode_int, null_as_empty};
use crate::state_machine::AccountStanding;

/// Admin and approval flags of an account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountFlags {
    pub is_admin: bool,
    pub is_verified: bool,
    pub is_accepted: bool,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub password: String,
    #[serde(rename = "org")]
    pub organization: String,
    /// Empty until a key is attached
    #[serde(default)]
    pub pub_key_hash: String,
    #[serde(default)]
    pub token: u64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub posted_tasks: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub accepted_tasks: Vec<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_accepted: bool,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("organization", &self.organization)
            .field("pub_key_hash", &self.pub_key_hash)
            .field("token", &self.token)
            .field("posted_tasks", &self.posted_tasks)
            .field("accepted_tasks", &self.accepted_tasks)
            .field("is_admin", &self.is_admin)
            .field("is_verified", &self.is_verified)
            .field("is_accepted", &self.is_accepted)
            .finish()
    }
}

impl User {
    /// A fresh account with no key, no tokens and the given flags
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        organization: impl Into<String>,
        flags: AccountFlags,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            organization: organization.into(),
            pub_key_hash: String::new(),
            token: 0,
            posted_tasks: Vec::new(),
            accepted_tasks: Vec::new(),
            is_admin: flags.is_admin,
            is_verified: flags.is_verified,
            is_accepted: flags.is_accepted,
        }
    }

    /// Decode a `ReadUser` response
    pub fn decode(payload: &[u8]) -> MarketResult<Self> {
        let user: Self = decode_record("user", payload)?;
        if user.username.trim().is_empty() {
            return Err(MarketError::validation("user", "record has no username"));
        }
        Ok(user)
    }

    pub fn flags(&self) -> AccountFlags {
        AccountFlags {
            is_admin: self.is_admin,
            is_verified: self.is_verified,
            is_accepted: self.is_accepted,
        }
    }

    pub fn standing(&self) -> AccountStanding {
        AccountStanding::from_flags(self.is_verified, self.is_accepted)
    }

    pub fn public_key_hash(&self) -> Option<&str> {
        Some(self.pub_key_hash.as_str()).filter(|hash| !hash.is_empty())
    }

    pub fn has_accepted(&self, task_id: &str) -> bool {
        self.accepted_tasks.iter().any(|id| id == task_id)
    }

    pub fn has_posted(&self, task_id: &str) -> bool {
        self.posted_tasks.iter().any(|id| id == task_id)
    }

    /// Positional arguments shared by `CreateUser` and `UpdateUser`
    pub fn ledger_args(&self) -> Vec<String> {
        vec![
            self.username.clone(),
            self.password.clone(),
            self.organization.clone(),
            self.pub_key_hash.clone(),
            encode_int(self.token),
            encode_bool(self.is_admin),
            encode_bool(self.is_verified),
            encode_bool(self.is_accepted),
        ]
    }
}
