//! # In-Memory Ledger
//!
//! In-process emulator of the marketplace chaincode. Keeps the chaincode's
//! observable behavior: duplicate-key rejection on create, whole-record
//! updates, non-deduplicating list appends and the literal `null` for empty
//! listings and empty record lists. Used for local development and every
//! test in this crate.
//!
//! Faults are injected per transaction with [`FaultRule`]; every call is
//! journaled before faults or latency apply.
//!
//! ```rust
//! use taskmarket_core::ledger::{
//!     FaultRule, InMemoryLedger, LedgerContract, LedgerError, Transaction,
//! };
//!
//! # tokio_test::block_on(async {
//! let ledger = InMemoryLedger::new();
//! ledger.fail_on(
//!     FaultRule::new(Transaction::GetAllUsers, LedgerError::unavailable("peer down")).times(1),
//! );
//!
//! assert!(ledger.evaluate("GetAllUsers", &[]).await.is_err());
//! assert_eq!(ledger.evaluate("GetAllUsers", &[]).await.unwrap(), b"null");
//! assert_eq!(ledger.call_count(Transaction::GetAllUsers), 2);
//! # });
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::constants::ledger::{ASSIGN_ID, NULL_SENTINEL};
use crate::ledger::contract::{LedgerContract, LedgerError, LedgerResult};
use crate::ledger::transactions::{CallKind, Transaction};
use crate::models::{Model, Task, User};

/// One call as the contract received it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub transaction: String,
    pub args: Vec<String>,
}

/// Injected failure for a named transaction
#[derive(Debug, Clone)]
pub struct FaultRule {
    transaction: Transaction,
    error: LedgerError,
    arg: Option<String>,
    skip: usize,
    times: Option<usize>,
    after_commit: bool,
    seen: usize,
    fired: usize,
}

impl FaultRule {
    /// Fail every call of `transaction` with `error`
    pub fn new(transaction: Transaction, error: LedgerError) -> Self {
        Self {
            transaction,
            error,
            arg: None,
            skip: 0,
            times: None,
            after_commit: false,
            seen: 0,
            fired: 0,
        }
    }

    /// Only match calls carrying `arg` among their arguments
    pub fn when_arg(mut self, arg: impl Into<String>) -> Self {
        self.arg = Some(arg.into());
        self
    }

    /// Let the first `calls` matching calls through
    pub fn after(mut self, calls: usize) -> Self {
        self.skip = calls;
        self
    }

    /// Stop failing after `count` injected failures
    pub fn times(mut self, count: usize) -> Self {
        self.times = Some(count);
        self
    }

    /// Apply the write, then report the failure (indeterminate outcome)
    pub fn after_commit(mut self) -> Self {
        self.after_commit = true;
        self
    }

    fn matches(&self, transaction: &str, args: &[String]) -> bool {
        self.transaction.name() == transaction
            && self
                .arg
                .as_ref()
                .map_or(true, |wanted| args.iter().any(|arg| arg == wanted))
    }

    fn exhausted(&self) -> bool {
        self.times.is_some_and(|limit| self.fired >= limit)
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    users: BTreeMap<String, User>,
    tasks: BTreeMap<String, Task>,
    models: BTreeMap<String, Model>,
}

/// Chaincode emulator implementing [`LedgerContract`]
#[derive(Debug)]
pub struct InMemoryLedger {
    endpoint: String,
    latency: Option<Duration>,
    state: Mutex<LedgerState>,
    faults: Mutex<Vec<FaultRule>>,
    journal: Mutex<Vec<RecordedCall>>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            endpoint: "memory://mychannel/mycc".to_string(),
            latency: None,
            state: Mutex::new(LedgerState::default()),
            faults: Mutex::new(Vec::new()),
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Delay every call by `latency` before it touches state
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn fail_on(&self, rule: FaultRule) {
        self.faults.lock().push(rule);
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    pub fn seed_user(&self, user: User) {
        self.state.lock().users.insert(user.username.clone(), user);
    }

    pub fn seed_task(&self, task: Task) {
        self.state.lock().tasks.insert(task.task_id.clone(), task);
    }

    pub fn user(&self, username: &str) -> Option<User> {
        self.state.lock().users.get(username).cloned()
    }

    pub fn task(&self, task_id: &str) -> Option<Task> {
        self.state.lock().tasks.get(task_id).cloned()
    }

    pub fn model(&self, model_id: &str) -> Option<Model> {
        self.state.lock().models.get(model_id).cloned()
    }

    pub fn task_count(&self) -> usize {
        self.state.lock().tasks.len()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.journal.lock().clone()
    }

    /// Number of times `transaction` reached the contract
    pub fn call_count(&self, transaction: Transaction) -> usize {
        self.journal
            .lock()
            .iter()
            .filter(|call| call.transaction == transaction.name())
            .count()
    }

    async fn enter(&self, kind: CallKind, transaction: &str, args: &[String]) {
        self.journal.lock().push(RecordedCall {
            kind,
            transaction: transaction.to_string(),
            args: args.to_vec(),
        });
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Fault to inject for this call, split by whether the write lands first
    fn take_fault(&self, transaction: &str, args: &[String]) -> Option<(LedgerError, bool)> {
        let mut faults = self.faults.lock();
        for rule in faults.iter_mut() {
            if !rule.matches(transaction, args) || rule.exhausted() {
                continue;
            }
            rule.seen += 1;
            if rule.seen > rule.skip {
                rule.fired += 1;
                return Some((rule.error.clone(), rule.after_commit));
            }
        }
        None
    }

    fn apply(&self, transaction: Transaction, args: &[String]) -> LedgerResult<Vec<u8>> {
        let mut state = self.state.lock();
        let name = transaction.name();
        match transaction {
            Transaction::CreateUser => {
                let user = parse_user(name, args)?;
                if state.users.contains_key(&user.username) {
                    return Err(LedgerError::KeyExists {
                        transaction: name.to_string(),
                        key: user.username,
                    });
                }
                state.users.insert(user.username.clone(), user);
                Ok(Vec::new())
            }
            Transaction::UpdateUser => {
                let mut user = parse_user(name, args)?;
                let existing = lookup(&state.users, name, "user", &user.username)?;
                user.posted_tasks = existing.posted_tasks.clone();
                user.accepted_tasks = existing.accepted_tasks.clone();
                state.users.insert(user.username.clone(), user);
                Ok(Vec::new())
            }
            Transaction::ReadUser => to_payload(name, lookup(&state.users, name, "user", &args[0])?),
            Transaction::DeleteUser => {
                remove(&mut state.users, name, "user", &args[0])?;
                Ok(Vec::new())
            }
            Transaction::GetAllUsers => listing(name, state.users.values()),
            Transaction::CreateTask => {
                let task_id = if args[0] == ASSIGN_ID {
                    Uuid::new_v4().to_string()
                } else if state.tasks.contains_key(&args[0]) {
                    return Err(LedgerError::KeyExists {
                        transaction: name.to_string(),
                        key: args[0].clone(),
                    });
                } else {
                    args[0].clone()
                };
                let task = Task {
                    task_id,
                    bonus: parse_arg(name, "bonus", &args[1])?,
                    root_model_id: args[2].clone(),
                    posted_user: args[3].clone(),
                    accepted_users: Vec::new(),
                    models: Vec::new(),
                    is_complete: false,
                    round: parse_arg(name, "round", &args[4])?,
                    next_round_task_id: args[5].clone(),
                };
                let payload = to_payload(name, &task)?;
                state.tasks.insert(task.task_id.clone(), task);
                Ok(payload)
            }
            Transaction::UpdateTask => {
                let existing = lookup(&state.tasks, name, "task", &args[0])?;
                let task = Task {
                    task_id: args[0].clone(),
                    bonus: parse_arg(name, "bonus", &args[1])?,
                    root_model_id: args[2].clone(),
                    posted_user: args[3].clone(),
                    accepted_users: existing.accepted_users.clone(),
                    models: existing.models.clone(),
                    is_complete: parse_arg(name, "isComplete", &args[4])?,
                    round: parse_arg(name, "round", &args[5])?,
                    next_round_task_id: args[6].clone(),
                };
                state.tasks.insert(task.task_id.clone(), task);
                Ok(Vec::new())
            }
            Transaction::ReadTask => to_payload(name, lookup(&state.tasks, name, "task", &args[0])?),
            Transaction::DeleteTask => {
                remove(&mut state.tasks, name, "task", &args[0])?;
                Ok(Vec::new())
            }
            Transaction::GetAllTasks => listing(name, state.tasks.values()),
            Transaction::AddToAccepted => {
                lookup_mut(&mut state.users, name, "user", &args[0])?
                    .accepted_tasks
                    .push(args[1].clone());
                Ok(Vec::new())
            }
            Transaction::AddToPosted => {
                lookup_mut(&mut state.users, name, "user", &args[0])?
                    .posted_tasks
                    .push(args[1].clone());
                Ok(Vec::new())
            }
            Transaction::AddUserToTask => {
                lookup_mut(&mut state.tasks, name, "task", &args[0])?
                    .accepted_users
                    .push(args[1].clone());
                Ok(Vec::new())
            }
            Transaction::CreateModel => {
                let model = Model {
                    id: Uuid::new_v4().to_string(),
                    owner: args[0].clone(),
                    content_hash: args[1].clone(),
                    signature: args[2].clone(),
                };
                let payload = to_payload(name, &model)?;
                state.models.insert(model.id.clone(), model);
                Ok(payload)
            }
        }
    }

    fn resolve(
        &self,
        kind: CallKind,
        transaction: &str,
        args: &[String],
    ) -> LedgerResult<Transaction> {
        let tx: Transaction = transaction
            .parse()
            .map_err(|e: String| LedgerError::endorsement(transaction, e))?;
        if tx.kind() != kind {
            return Err(LedgerError::endorsement(
                transaction,
                format!("{tx} cannot be invoked through {kind}"),
            ));
        }
        if args.len() != tx.arity() {
            return Err(LedgerError::endorsement(
                transaction,
                format!("incorrect number of arguments: expected {}", tx.arity()),
            ));
        }
        Ok(tx)
    }
}

#[async_trait]
impl LedgerContract for InMemoryLedger {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn submit(&self, transaction: &str, args: &[String]) -> LedgerResult<Vec<u8>> {
        self.enter(CallKind::Submit, transaction, args).await;
        let tx = self.resolve(CallKind::Submit, transaction, args)?;

        match self.take_fault(transaction, args) {
            Some((error, false)) => Err(error),
            Some((error, true)) => {
                // The write is kept even though the caller sees a failure.
                let _ = self.apply(tx, args);
                Err(error)
            }
            None => self.apply(tx, args),
        }
    }

    async fn evaluate(&self, transaction: &str, args: &[String]) -> LedgerResult<Vec<u8>> {
        self.enter(CallKind::Evaluate, transaction, args).await;
        let tx = self.resolve(CallKind::Evaluate, transaction, args)?;

        if let Some((error, _)) = self.take_fault(transaction, args) {
            return Err(error);
        }
        self.apply(tx, args)
    }
}

fn parse_arg<T: std::str::FromStr>(transaction: &str, field: &str, raw: &str) -> LedgerResult<T> {
    raw.parse()
        .map_err(|_| LedgerError::endorsement(transaction, format!("invalid {field}: {raw:?}")))
}

fn parse_user(transaction: &str, args: &[String]) -> LedgerResult<User> {
    Ok(User {
        username: args[0].clone(),
        password: args[1].clone(),
        organization: args[2].clone(),
        pub_key_hash: args[3].clone(),
        token: parse_arg(transaction, "token", &args[4])?,
        posted_tasks: Vec::new(),
        accepted_tasks: Vec::new(),
        is_admin: parse_arg(transaction, "isAdmin", &args[5])?,
        is_verified: parse_arg(transaction, "isVerified", &args[6])?,
        is_accepted: parse_arg(transaction, "isAccepted", &args[7])?,
    })
}

fn not_found(transaction: &str, entity: &str, key: &str) -> LedgerError {
    LedgerError::NotFound {
        transaction: transaction.to_string(),
        entity: entity.to_string(),
        key: key.to_string(),
    }
}

fn lookup<'a, T>(
    records: &'a BTreeMap<String, T>,
    transaction: &str,
    entity: &str,
    key: &str,
) -> LedgerResult<&'a T> {
    records
        .get(key)
        .ok_or_else(|| not_found(transaction, entity, key))
}

fn lookup_mut<'a, T>(
    records: &'a mut BTreeMap<String, T>,
    transaction: &str,
    entity: &str,
    key: &str,
) -> LedgerResult<&'a mut T> {
    records
        .get_mut(key)
        .ok_or_else(|| not_found(transaction, entity, key))
}

fn remove<T>(
    records: &mut BTreeMap<String, T>,
    transaction: &str,
    entity: &str,
    key: &str,
) -> LedgerResult<()> {
    records
        .remove(key)
        .map(|_| ())
        .ok_or_else(|| not_found(transaction, entity, key))
}

/// Serialize the way the chaincode does: empty lists go out as `null`
fn to_value<T: Serialize>(transaction: &str, record: &T) -> LedgerResult<Value> {
    let mut value = serde_json::to_value(record)
        .map_err(|e| LedgerError::endorsement(transaction, e.to_string()))?;
    if let Value::Object(fields) = &mut value {
        for field in fields.values_mut() {
            if matches!(field, Value::Array(items) if items.is_empty()) {
                *field = Value::Null;
            }
        }
    }
    Ok(value)
}

fn to_payload<T: Serialize>(transaction: &str, record: &T) -> LedgerResult<Vec<u8>> {
    Ok(to_value(transaction, record)?.to_string().into_bytes())
}

fn listing<'a, T: Serialize + 'a>(
    transaction: &str,
    records: impl Iterator<Item = &'a T>,
) -> LedgerResult<Vec<u8>> {
    let values = records
        .map(|record| to_value(transaction, record))
        .collect::<LedgerResult<Vec<_>>>()?;
    if values.is_empty() {
        return Ok(NULL_SENTINEL.as_bytes().to_vec());
    }
    Ok(Value::Array(values).to_string().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn alice_args() -> Vec<String> {
        args(&["alice", "pw", "org1", "", "0", "false", "false", "false"])
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicates() {
        let ledger = InMemoryLedger::new();
        ledger.submit("CreateUser", &alice_args()).await.unwrap();

        let err = ledger.submit("CreateUser", &alice_args()).await.unwrap_err();
        assert!(matches!(err, LedgerError::KeyExists { .. }));
    }

    #[tokio::test]
    async fn test_empty_listing_is_null_sentinel() {
        let ledger = InMemoryLedger::new();
        let payload = ledger.evaluate("GetAllTasks", &[]).await.unwrap();
        assert_eq!(payload, b"null");
    }

    #[tokio::test]
    async fn test_read_emits_null_for_empty_lists() {
        let ledger = InMemoryLedger::new();
        ledger.submit("CreateUser", &alice_args()).await.unwrap();

        let payload = ledger.evaluate("ReadUser", &args(&["alice"])).await.unwrap();
        let value: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["acceptedTasks"], Value::Null);
        assert_eq!(value["org"], "org1");
    }

    #[tokio::test]
    async fn test_update_user_keeps_task_lists() {
        let ledger = InMemoryLedger::new();
        ledger.submit("CreateUser", &alice_args()).await.unwrap();
        ledger
            .submit("AddToAccepted", &args(&["alice", "t-1"]))
            .await
            .unwrap();
        ledger
            .submit(
                "UpdateUser",
                &args(&["alice", "pw", "org1", "", "15", "false", "true", "true"]),
            )
            .await
            .unwrap();

        let alice = ledger.user("alice").unwrap();
        assert_eq!(alice.token, 15);
        assert_eq!(alice.accepted_tasks, vec!["t-1"]);
    }

    #[tokio::test]
    async fn test_appends_are_not_deduplicated() {
        let ledger = InMemoryLedger::new();
        ledger.submit("CreateUser", &alice_args()).await.unwrap();
        for _ in 0..2 {
            ledger
                .submit("AddToAccepted", &args(&["alice", "t-1"]))
                .await
                .unwrap();
        }
        assert_eq!(ledger.user("alice").unwrap().accepted_tasks.len(), 2);
    }

    #[tokio::test]
    async fn test_create_task_assigns_id() {
        let ledger = InMemoryLedger::new();
        let payload = ledger
            .submit("CreateTask", &args(&["", "10", "m-1", "alice", "1", ""]))
            .await
            .unwrap();
        let created = Task::decode(&payload).unwrap();
        assert!(!created.task_id.is_empty());
        assert_eq!(ledger.task(&created.task_id).unwrap().bonus, 10);
    }

    #[tokio::test]
    async fn test_bad_arguments_fail_endorsement() {
        let ledger = InMemoryLedger::new();
        let err = ledger
            .submit("CreateTask", &args(&["", "ten", "m-1", "alice", "1", ""]))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::EndorsementFailed { .. }));

        let err = ledger.evaluate("DeleteTask", &args(&["t-1"])).await.unwrap_err();
        assert!(matches!(err, LedgerError::EndorsementFailed { .. }));
    }

    #[tokio::test]
    async fn test_fault_rule_targets_argument_and_count() {
        let ledger = InMemoryLedger::new();
        ledger.submit("CreateUser", &alice_args()).await.unwrap();
        ledger.fail_on(
            FaultRule::new(Transaction::ReadUser, LedgerError::unavailable("peer down"))
                .when_arg("alice")
                .after(1)
                .times(1),
        );

        let read = args(&["alice"]);
        assert!(ledger.evaluate("ReadUser", &read).await.is_ok());
        assert!(ledger.evaluate("ReadUser", &read).await.is_err());
        assert!(ledger.evaluate("ReadUser", &read).await.is_ok());
        assert!(matches!(
            ledger.evaluate("ReadUser", &args(&["bob"])).await,
            Err(LedgerError::NotFound { .. })
        ));
        assert_eq!(ledger.call_count(Transaction::ReadUser), 4);
    }

    #[tokio::test]
    async fn test_after_commit_fault_keeps_write() {
        let ledger = InMemoryLedger::new();
        ledger.fail_on(
            FaultRule::new(
                Transaction::CreateUser,
                LedgerError::commit_timeout("CreateUser"),
            )
            .after_commit(),
        );

        let err = ledger.submit("CreateUser", &alice_args()).await.unwrap_err();
        assert!(matches!(err, LedgerError::CommitTimeout { .. }));
        assert!(ledger.user("alice").is_some());
    }
}
