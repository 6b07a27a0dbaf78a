//! # User Lifecycle Manager
//!
//! Registration, login, approval toggling, key attachment and deletion.
//!
//! ## Lost updates
//!
//! `UpdateUser` replaces the whole record. Every mutation here is a
//! read-modify-write: fetch, change a local copy, write the copy back. A
//! concurrent writer that lands between the read and the write is silently
//! overwritten. The chaincode has no version field to compare against, so
//! the race is documented rather than prevented.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::SnapshotCache;
use crate::config::RegistrationPolicy;
use crate::constants::operations;
use crate::error::{BusinessRule, MarketError, MarketResult};
use crate::ledger::{LedgerGateway, Transaction};
use crate::logging::log_user_operation;
use crate::models::{AccountFlags, User};
use crate::state_machine::{AccountActiveGuard, StateGuard};

/// Cache of user snapshots shared by every manager that writes users
pub type ProfileCache = SnapshotCache<String, User>;

pub struct UserLifecycleManager {
    gateway: Arc<LedgerGateway>,
    policy: RegistrationPolicy,
    profiles: Arc<ProfileCache>,
}

impl UserLifecycleManager {
    pub fn new(
        gateway: Arc<LedgerGateway>,
        policy: RegistrationPolicy,
        profiles: Arc<ProfileCache>,
    ) -> Self {
        Self {
            gateway,
            policy,
            profiles,
        }
    }

    pub fn policy(&self) -> RegistrationPolicy {
        self.policy
    }

    /// Create an account with the approval flags the policy dictates
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        organization: &str,
    ) -> MarketResult<User> {
        require_field("username", username)?;
        require_field("password", password)?;
        require_field("organization", organization)?;

        let user = User::new(username, password, organization, self.policy.initial_flags());
        self.profiles.invalidate(&user.username);

        match self
            .gateway
            .submit(Transaction::CreateUser, user.ledger_args())
            .await
        {
            Ok(_) => {
                log_user_operation(operations::REGISTER, username, "success", None);
                Ok(user)
            }
            Err(err) => {
                log_user_operation(
                    operations::REGISTER,
                    username,
                    "failed",
                    Some(&err.to_string()),
                );
                Err(err)
            }
        }
    }

    pub async fn read_user(&self, username: &str) -> MarketResult<User> {
        fetch_user(&self.gateway, username).await
    }

    /// Check credentials against a fresh read
    ///
    /// Approval is checked before the password, so an unapproved account
    /// reports `NotVerified` whether or not the password matches.
    pub async fn login(&self, username: &str, password: &str) -> MarketResult<User> {
        let user = self.read_user(username).await?;

        if let Err(err) = AccountActiveGuard.check(&user) {
            log_user_operation(operations::LOGIN, username, "rejected", Some("not verified"));
            return Err(err);
        }
        if !constant_time_eq(user.password.as_bytes(), password.as_bytes()) {
            log_user_operation(operations::LOGIN, username, "rejected", Some("bad credentials"));
            return Err(MarketError::rule(
                BusinessRule::BadCredentials,
                format!("password mismatch for {username}"),
            ));
        }

        log_user_operation(operations::LOGIN, username, "success", None);
        Ok(user)
    }

    pub async fn attach_public_key(
        &self,
        username: &str,
        pub_key_hash: &str,
    ) -> MarketResult<User> {
        require_field("public key hash", pub_key_hash)?;
        let updated = replace_user(&self.gateway, &self.profiles, username, |user| {
            user.pub_key_hash = pub_key_hash.to_string();
            Ok(())
        })
        .await;
        log_outcome(operations::ATTACH_PUBLIC_KEY, username, &updated);
        updated
    }

    /// Overwrite the admin and approval flags
    ///
    /// Admin-only by convention; the caller enforces who may invoke this.
    pub async fn set_verification(
        &self,
        username: &str,
        flags: AccountFlags,
    ) -> MarketResult<User> {
        let updated = replace_user(&self.gateway, &self.profiles, username, |user| {
            user.is_admin = flags.is_admin;
            user.is_verified = flags.is_verified;
            user.is_accepted = flags.is_accepted;
            Ok(())
        })
        .await;
        log_outcome(operations::SET_VERIFICATION, username, &updated);
        updated
    }

    pub async fn delete(&self, username: &str) -> MarketResult<()> {
        self.profiles.invalidate(&username.to_string());
        let result = self
            .gateway
            .submit(Transaction::DeleteUser, vec![username.to_string()])
            .await
            .map(|_| ());
        log_outcome(operations::DELETE_USER, username, &result);
        result
    }
}

pub(crate) async fn fetch_user(gateway: &LedgerGateway, username: &str) -> MarketResult<User> {
    let payload = gateway
        .evaluate(Transaction::ReadUser, vec![username.to_string()])
        .await?;
    User::decode(&payload)
}

/// Read-modify-write of one user record through `UpdateUser`
///
/// The cached snapshot is dropped before the read so the decision is made on
/// ledger state, and again after the write.
pub(crate) async fn replace_user<F>(
    gateway: &LedgerGateway,
    profiles: &ProfileCache,
    username: &str,
    mutate: F,
) -> MarketResult<User>
where
    F: FnOnce(&mut User) -> MarketResult<()>,
{
    let key = username.to_string();
    profiles.invalidate(&key);

    let mut user = fetch_user(gateway, username).await?;
    mutate(&mut user)?;
    debug!(username = %username, "Writing back user record");

    let result = gateway
        .submit(Transaction::UpdateUser, user.ledger_args())
        .await;
    profiles.invalidate(&key);
    result.map(|_| user)
}

fn require_field(field: &str, value: &str) -> MarketResult<()> {
    if value.trim().is_empty() {
        return Err(MarketError::rule(
            BusinessRule::InvalidArgument,
            format!("{field} must not be empty"),
        ));
    }
    Ok(())
}

fn log_outcome<T>(operation: &str, username: &str, result: &MarketResult<T>) {
    match result {
        Ok(_) => log_user_operation(operation, username, "success", None),
        Err(err) => {
            warn!(
                operation = %operation,
                username = %username,
                error = %err,
                "User operation failed"
            );
            log_user_operation(operation, username, "failed", Some(&err.to_string()));
        }
    }
}

/// Compare without short-circuiting on the first differing byte
fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    let mut diff = left.len() ^ right.len();
    for i in 0..left.len().max(right.len()) {
        let a = left.get(i).copied().unwrap_or(0);
        let b = right.get(i).copied().unwrap_or(0);
        diff |= usize::from(a ^ b);
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::ledger::InMemoryLedger;

    fn manager(policy: RegistrationPolicy) -> (Arc<InMemoryLedger>, UserLifecycleManager) {
        let ledger = Arc::new(InMemoryLedger::new());
        let gateway = Arc::new(LedgerGateway::new(ledger.clone(), LedgerConfig::default()));
        let profiles = Arc::new(ProfileCache::disabled());
        (ledger, UserLifecycleManager::new(gateway, policy, profiles))
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret!"));
        assert!(!constant_time_eq(b"", b"x"));
        assert!(constant_time_eq(b"", b""));
    }

    #[tokio::test]
    async fn test_register_rejects_blank_fields() {
        let (ledger, users) = manager(RegistrationPolicy::default());
        let err = users.register("alice", " ", "org1").await.unwrap_err();
        assert_eq!(err.business_rule(), Some(BusinessRule::InvalidArgument));
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_already_exists() {
        let (_ledger, users) = manager(RegistrationPolicy::default());
        users.register("alice", "pw", "org1").await.unwrap();
        let err = users.register("alice", "other", "org2").await.unwrap_err();
        assert_eq!(err.business_rule(), Some(BusinessRule::AlreadyExists));
    }

    #[tokio::test]
    async fn test_attach_public_key_preserves_other_fields() {
        let (ledger, users) = manager(RegistrationPolicy::AutoApprove);
        users.register("alice", "pw", "org1").await.unwrap();

        let updated = users.attach_public_key("alice", "ab12").await.unwrap();
        assert_eq!(updated.public_key_hash(), Some("ab12"));

        let stored = ledger.user("alice").unwrap();
        assert_eq!(stored.pub_key_hash, "ab12");
        assert!(stored.is_verified && stored.is_accepted);
    }

    #[tokio::test]
    async fn test_missing_user_is_not_found() {
        let (_ledger, users) = manager(RegistrationPolicy::default());
        let err = users
            .set_verification("ghost", AccountFlags::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::NotFound { .. }));

        let err = users.delete("ghost").await.unwrap_err();
        assert!(matches!(err, MarketError::NotFound { .. }));
    }
}
