#![allow(clippy::doc_markdown)] // Allow technical terms like Hyperledger, OpenSSL in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Task Market Core
//!
//! Client-side orchestration for a federated task marketplace whose
//! authoritative state lives on an external ledger.
//!
//! ## Overview
//!
//! The ledger offers two primitives: `Submit` (ordered, committed, mutating)
//! and `Evaluate` (read-only). Each call is atomic on its own; no two calls
//! compose. Every business operation that touches more than one record
//! (accepting a task, advancing a round, paying workers) is assembled here
//! from independent calls, and this crate defines what happens when one of
//! them fails part way.
//!
//! ## Module Organization
//!
//! - [`ledger`] - Ledger port, transaction table, gateway and in-memory emulator
//! - [`models`] - User, Task and Model records with their wire encodings
//! - [`state_machine`] - Task phases, account standing and precondition guards
//! - [`orchestration`] - User and task lifecycles, reward distribution, listings
//! - [`cache`] - Read-through snapshot cache for display paths
//! - [`pki`] - Certificate authority boundary for identity provisioning
//! - [`resilience`] - Circuit breaker in front of the ledger
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use taskmarket_core::config::MarketConfig;
//! use taskmarket_core::ledger::InMemoryLedger;
//! use taskmarket_core::models::TaskDraft;
//! use taskmarket_core::orchestration::TaskMarket;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let market = TaskMarket::new(Arc::new(InMemoryLedger::new()), MarketConfig::default())?;
//!
//! market.users().register("alice", "s3cret", "org1").await?;
//! let task_id = market
//!     .tasks()
//!     .post_task(&TaskDraft::new(10, "model-1", "alice"))
//!     .await?;
//! println!("posted {task_id}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! Every test runs against [`ledger::InMemoryLedger`], which reproduces the
//! chaincode's observable behavior and supports fault injection:
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod pki;
pub mod resilience;
pub mod state_machine;

pub use cache::SnapshotCache;
pub use config::{MarketConfig, RegistrationPolicy};
pub use error::{BusinessRule, MarketError, MarketResult};
pub use ledger::{InMemoryLedger, LedgerContract, LedgerError, LedgerGateway, Transaction};
pub use models::{AccountFlags, Model, Task, TaskDraft, User};
pub use orchestration::{
    with_deadline, MarketQuery, ModelRegistry, RewardDistributor, RoundAdvance, SagaReport,
    Settlement, TaskLifecycleManager, TaskMarket, UserLifecycleManager,
};
pub use state_machine::{AccountStanding, TaskPhase};
