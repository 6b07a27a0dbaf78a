//! # Ledger Access
//!
//! Port, transaction table, gateway and in-process emulator for the
//! marketplace chaincode. Orchestration code only ever talks to
//! [`LedgerGateway`]; implementations of [`LedgerContract`] plug in beneath it.

pub mod contract;
pub mod gateway;
pub mod memory;
pub mod transactions;

pub use contract::{LedgerContract, LedgerError, LedgerResult};
pub use gateway::LedgerGateway;
pub use memory::{FaultRule, InMemoryLedger, RecordedCall};
pub use transactions::{CallKind, Transaction};
