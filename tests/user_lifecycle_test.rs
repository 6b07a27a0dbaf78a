//! Registration, approval and login flows through the public market API

mod common;

use common::*;
use taskmarket_core::config::RegistrationPolicy;
use taskmarket_core::error::{BusinessRule, MarketError};
use taskmarket_core::ledger::Transaction;
use taskmarket_core::models::AccountFlags;
use taskmarket_core::state_machine::AccountStanding;

#[tokio::test]
async fn test_registration_requiring_approval_starts_pending() {
    init_tracing();
    let (ledger, market) = MarketBuilder::new().build();

    market.users().register("alice", "s3cret", "org1").await.unwrap();

    let stored = ledger.user("alice").unwrap();
    assert_eq!(stored.token, 0);
    assert_eq!(stored.pub_key_hash, "");
    assert!(!stored.is_admin && !stored.is_verified && !stored.is_accepted);
    assert_eq!(stored.standing(), AccountStanding::PendingApproval);

    let read = market.users().read_user("alice").await.unwrap();
    assert_eq!(read, stored);
}

#[tokio::test]
async fn test_auto_approve_registration_can_log_in_immediately() {
    let (ledger, market) = MarketBuilder::new()
        .with_registration(RegistrationPolicy::AutoApprove)
        .build();

    market.users().register("alice", "s3cret", "org1").await.unwrap();
    let stored = ledger.user("alice").unwrap();
    assert!(stored.is_admin && stored.is_verified && stored.is_accepted);

    let user = market.users().login("alice", "s3cret").await.unwrap();
    assert_eq!(user.username, "alice");
}

#[tokio::test]
async fn test_duplicate_registration_is_already_exists() {
    let (ledger, market) = MarketBuilder::new().with_user("alice").build();

    let err = market
        .users()
        .register("alice", "other", "org2")
        .await
        .unwrap_err();
    assert_eq!(err.business_rule(), Some(BusinessRule::AlreadyExists));
    assert_eq!(ledger.user("alice").unwrap().password, "pw");
}

#[tokio::test]
async fn test_unapproved_login_reports_not_verified_regardless_of_password() {
    let (_ledger, market) = MarketBuilder::new().build();
    market.users().register("bob", "right", "org1").await.unwrap();

    for password in ["right", "wrong"] {
        let err = market.users().login("bob", password).await.unwrap_err();
        assert_eq!(err.business_rule(), Some(BusinessRule::NotVerified));
    }
}

#[tokio::test]
async fn test_half_approved_account_still_cannot_log_in() {
    let (_ledger, market) = MarketBuilder::new().build();
    market.users().register("bob", "pw", "org1").await.unwrap();

    market
        .users()
        .set_verification(
            "bob",
            AccountFlags {
                is_admin: false,
                is_verified: true,
                is_accepted: false,
            },
        )
        .await
        .unwrap();

    let err = market.users().login("bob", "pw").await.unwrap_err();
    assert_eq!(err.business_rule(), Some(BusinessRule::NotVerified));
}

#[tokio::test]
async fn test_approval_then_login() {
    let (_ledger, market) = MarketBuilder::new().build();
    market.users().register("bob", "pw", "org1").await.unwrap();
    market.users().set_verification("bob", APPROVED).await.unwrap();

    let err = market.users().login("bob", "nope").await.unwrap_err();
    assert_eq!(err.business_rule(), Some(BusinessRule::BadCredentials));

    let user = market.users().login("bob", "pw").await.unwrap();
    assert_eq!(user.standing(), AccountStanding::Active);
}

#[tokio::test]
async fn test_login_failures_share_one_public_message() {
    let (_ledger, market) = MarketBuilder::new()
        .with_user("alice")
        .with_pending_user("bob")
        .build();

    let bad_password = market.users().login("alice", "nope").await.unwrap_err();
    let unapproved = market.users().login("bob", "pw").await.unwrap_err();
    let unknown = market.users().login("mallory", "pw").await.unwrap_err();

    assert!(matches!(unknown, MarketError::NotFound { .. }));
    assert_eq!(bad_password.public_message(), unapproved.public_message());
    assert_eq!(unapproved.public_message(), unknown.public_message());
}

#[tokio::test]
async fn test_attach_public_key_keeps_task_lists() {
    let (ledger, market) = MarketBuilder::new().with_user("alice").build();
    let task_id = post_task(&market, "alice", 5).await;

    let user = market
        .users()
        .attach_public_key("alice", "ab12cd")
        .await
        .unwrap();
    assert_eq!(user.public_key_hash(), Some("ab12cd"));

    let stored = ledger.user("alice").unwrap();
    assert_eq!(stored.pub_key_hash, "ab12cd");
    assert_eq!(stored.posted_tasks, vec![task_id]);
}

#[tokio::test]
async fn test_blank_registration_fields_never_reach_the_ledger() {
    let (ledger, market) = MarketBuilder::new().build();

    let err = market.users().register("  ", "pw", "org1").await.unwrap_err();
    assert_eq!(err.business_rule(), Some(BusinessRule::InvalidArgument));
    assert_eq!(ledger.call_count(Transaction::CreateUser), 0);
}

#[tokio::test]
async fn test_delete_user() {
    let (ledger, market) = MarketBuilder::new().with_user("alice").build();

    market.users().delete("alice").await.unwrap();
    assert!(ledger.user("alice").is_none());

    let err = market.users().read_user("alice").await.unwrap_err();
    assert!(matches!(err, MarketError::NotFound { .. }));
}
