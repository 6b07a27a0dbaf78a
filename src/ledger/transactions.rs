//! # Chaincode Transaction Table
//!
//! Names, call kinds and arities of every chaincode transaction. These must
//! match the deployed chaincode exactly; arguments are positional strings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a transaction reaches the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// Ordered, endorsed and committed; the only path that changes state
    Submit,
    /// Read-only query, not ordered against other transactions
    Evaluate,
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submit => write!(f, "submit"),
            Self::Evaluate => write!(f, "evaluate"),
        }
    }
}

/// Chaincode transactions exposed by the marketplace contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transaction {
    CreateUser,
    ReadUser,
    UpdateUser,
    DeleteUser,
    GetAllUsers,
    CreateTask,
    ReadTask,
    UpdateTask,
    DeleteTask,
    GetAllTasks,
    AddToAccepted,
    AddUserToTask,
    CreateModel,
    AddToPosted,
}

impl Transaction {
    pub const ALL: [Transaction; 14] = [
        Self::CreateUser,
        Self::ReadUser,
        Self::UpdateUser,
        Self::DeleteUser,
        Self::GetAllUsers,
        Self::CreateTask,
        Self::ReadTask,
        Self::UpdateTask,
        Self::DeleteTask,
        Self::GetAllTasks,
        Self::AddToAccepted,
        Self::AddUserToTask,
        Self::CreateModel,
        Self::AddToPosted,
    ];

    /// Chaincode function name
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateUser => "CreateUser",
            Self::ReadUser => "ReadUser",
            Self::UpdateUser => "UpdateUser",
            Self::DeleteUser => "DeleteUser",
            Self::GetAllUsers => "GetAllUsers",
            Self::CreateTask => "CreateTask",
            Self::ReadTask => "ReadTask",
            Self::UpdateTask => "UpdateTask",
            Self::DeleteTask => "DeleteTask",
            Self::GetAllTasks => "GetAllTasks",
            Self::AddToAccepted => "AddToAccepted",
            Self::AddUserToTask => "AddUserToTask",
            Self::CreateModel => "CreateModel",
            Self::AddToPosted => "AddToPosted",
        }
    }

    pub fn kind(&self) -> CallKind {
        match self {
            Self::ReadUser | Self::GetAllUsers | Self::ReadTask | Self::GetAllTasks => {
                CallKind::Evaluate
            }
            _ => CallKind::Submit,
        }
    }

    /// Number of positional arguments the chaincode expects
    pub fn arity(&self) -> usize {
        match self {
            Self::CreateUser | Self::UpdateUser => 8,
            Self::UpdateTask => 7,
            Self::CreateTask => 6,
            Self::CreateModel => 3,
            Self::AddToAccepted | Self::AddUserToTask | Self::AddToPosted => 2,
            Self::ReadUser | Self::DeleteUser | Self::ReadTask | Self::DeleteTask => 1,
            Self::GetAllUsers | Self::GetAllTasks => 0,
        }
    }

    /// Record type whose key the first argument names
    pub fn entity(&self) -> &'static str {
        match self {
            Self::CreateUser
            | Self::ReadUser
            | Self::UpdateUser
            | Self::DeleteUser
            | Self::GetAllUsers
            | Self::AddToAccepted
            | Self::AddToPosted => "user",
            Self::CreateModel => "model",
            _ => "task",
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Transaction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|tx| tx.name() == s)
            .copied()
            .ok_or_else(|| format!("Unknown chaincode transaction: {s}"))
    }
}
