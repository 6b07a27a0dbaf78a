//! # Entity Codec
//!
//! The three ledger records and their wire encodings. Any record value held
//! by orchestration code is a snapshot of one read and is stale as soon as
//! the call that fetched it returns.

pub mod codec;
pub mod model;
pub mod task;
pub mod user;

pub use model::Model;
pub use task::{Task, TaskDraft};
pub use user::{AccountFlags, User};
