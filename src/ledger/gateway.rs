//! # Ledger Gateway
//!
//! The single entry point orchestration code uses to reach the ledger.
//! Checks every call against the transaction table before it leaves the
//! process, bounds it in time and feeds transport failures to the optional
//! circuit breaker. It never retries.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::timeout;

use crate::config::{LedgerConfig, MarketConfig};
use crate::error::{MarketError, MarketResult};
use crate::ledger::contract::{LedgerContract, LedgerError, LedgerResult};
use crate::ledger::transactions::{CallKind, Transaction};
use crate::logging::log_ledger_call;
use crate::resilience::{CircuitBreaker, CircuitBreakerError, CircuitState, TripsBreaker};

impl TripsBreaker for LedgerError {
    fn trips_breaker(&self) -> bool {
        matches!(
            self,
            LedgerError::Unavailable { .. } | LedgerError::CommitTimeout { .. }
        )
    }
}

/// Shared, read-only handle over one chaincode connection
pub struct LedgerGateway {
    contract: Arc<dyn LedgerContract>,
    config: LedgerConfig,
    breaker: Option<CircuitBreaker>,
}

impl std::fmt::Debug for LedgerGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerGateway")
            .field("endpoint", &self.contract.endpoint())
            .field("channel", &self.config.channel)
            .field("chaincode", &self.config.chaincode)
            .field("circuit_state", &self.circuit_state())
            .finish()
    }
}

impl LedgerGateway {
    pub fn new(contract: Arc<dyn LedgerContract>, config: LedgerConfig) -> Self {
        Self {
            contract,
            config,
            breaker: None,
        }
    }

    /// Build a gateway with the breaker wired in when the config enables it
    pub fn from_config(contract: Arc<dyn LedgerContract>, config: &MarketConfig) -> Self {
        let gateway = Self::new(contract, config.ledger.clone());
        if config.circuit_breaker.enabled {
            let name = format!("ledger:{}/{}", config.ledger.channel, config.ledger.chaincode);
            gateway.with_circuit_breaker(CircuitBreaker::new(name, config.circuit_breaker.clone()))
        } else {
            gateway
        }
    }

    pub fn with_circuit_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = Some(breaker);
        self
    }

    pub fn endpoint(&self) -> &str {
        self.contract.endpoint()
    }

    pub fn circuit_state(&self) -> Option<CircuitState> {
        self.breaker.as_ref().map(CircuitBreaker::state)
    }

    /// Order and commit a state-changing transaction
    pub async fn submit(&self, transaction: Transaction, args: Vec<String>) -> MarketResult<Vec<u8>> {
        self.invoke(CallKind::Submit, transaction, args).await
    }

    /// Run a read-only query
    pub async fn evaluate(
        &self,
        transaction: Transaction,
        args: Vec<String>,
    ) -> MarketResult<Vec<u8>> {
        self.invoke(CallKind::Evaluate, transaction, args).await
    }

    async fn invoke(
        &self,
        kind: CallKind,
        transaction: Transaction,
        args: Vec<String>,
    ) -> MarketResult<Vec<u8>> {
        if transaction.kind() != kind {
            return Err(MarketError::validation(
                transaction.name(),
                format!("{transaction} must be sent as {}, not {kind}", transaction.kind()),
            ));
        }
        if args.len() != transaction.arity() {
            return Err(MarketError::validation(
                transaction.name(),
                format!(
                    "expected {} arguments, got {}",
                    transaction.arity(),
                    args.len()
                ),
            ));
        }

        let started = Instant::now();
        let result = match &self.breaker {
            Some(breaker) => breaker
                .call(|| self.dispatch(kind, transaction, &args))
                .await
                .map_err(|err| match err {
                    CircuitBreakerError::CircuitOpen { component } => {
                        LedgerError::unavailable(format!("circuit breaker open for {component}"))
                    }
                    CircuitBreakerError::OperationFailed(inner) => inner,
                }),
            None => self.dispatch(kind, transaction, &args).await,
        };

        let error = result.as_ref().err().map(ToString::to_string);
        log_ledger_call(
            kind,
            transaction,
            args.first().map(String::as_str),
            started.elapsed(),
            error.as_deref(),
        );

        result.map_err(MarketError::from)
    }

    async fn dispatch(
        &self,
        kind: CallKind,
        transaction: Transaction,
        args: &[String],
    ) -> LedgerResult<Vec<u8>> {
        match kind {
            CallKind::Evaluate => {
                let bound = self.config.evaluate_timeout();
                timeout(bound, self.contract.evaluate(transaction.name(), args))
                    .await
                    .unwrap_or_else(|_| {
                        Err(LedgerError::unavailable(format!(
                            "evaluate {transaction} timed out after {}ms",
                            bound.as_millis()
                        )))
                    })
            }
            // Dropping the future only stops our wait; an endorsed proposal may still commit.
            CallKind::Submit => timeout(
                self.config.submit_budget(),
                self.contract.submit(transaction.name(), args),
            )
            .await
            .unwrap_or_else(|_| Err(LedgerError::commit_timeout(transaction.name()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;
    use crate::ledger::memory::{FaultRule, InMemoryLedger};
    use std::time::Duration;

    fn fast_config() -> LedgerConfig {
        LedgerConfig {
            evaluate_timeout_ms: 20,
            endorse_timeout_ms: 10,
            submit_timeout_ms: 10,
            commit_status_timeout_ms: 10,
            ..LedgerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_rejects_wrong_call_kind_without_sending() {
        let ledger = Arc::new(InMemoryLedger::new());
        let gateway = LedgerGateway::new(ledger.clone(), LedgerConfig::default());

        let err = gateway
            .submit(Transaction::ReadUser, vec!["alice".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::ValidationFailed { .. }));

        let err = gateway
            .evaluate(Transaction::DeleteUser, vec!["alice".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::ValidationFailed { .. }));
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_wrong_arity() {
        let ledger = Arc::new(InMemoryLedger::new());
        let gateway = LedgerGateway::new(ledger.clone(), LedgerConfig::default());

        let err = gateway
            .submit(Transaction::AddToAccepted, vec!["alice".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("expected 2 arguments, got 1"));
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn test_slow_submit_becomes_commit_timeout() {
        let ledger = Arc::new(InMemoryLedger::new().with_latency(Duration::from_millis(200)));
        let gateway = LedgerGateway::new(ledger, fast_config());

        let err = gateway
            .submit(Transaction::DeleteTask, vec!["t-1".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::CommitTimeout { .. }));
        assert!(err.state_indeterminate());
    }

    #[tokio::test]
    async fn test_slow_evaluate_becomes_unavailable() {
        let ledger = Arc::new(InMemoryLedger::new().with_latency(Duration::from_millis(200)));
        let gateway = LedgerGateway::new(ledger, fast_config());

        let err = gateway.evaluate(Transaction::GetAllTasks, vec![]).await.unwrap_err();
        assert!(matches!(err, MarketError::LedgerUnavailable { .. }));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_breaker_opens_on_unavailable_peer() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.fail_on(FaultRule::new(
            Transaction::GetAllUsers,
            LedgerError::unavailable("connection refused"),
        ));

        let config = MarketConfig {
            ledger: fast_config(),
            circuit_breaker: CircuitBreakerConfig {
                enabled: true,
                failure_threshold: 2,
                open_timeout_ms: 60_000,
                success_threshold: 1,
            },
            ..MarketConfig::default()
        };
        let gateway = LedgerGateway::from_config(ledger.clone(), &config);

        for _ in 0..2 {
            let _ = gateway.evaluate(Transaction::GetAllUsers, vec![]).await;
        }
        assert_eq!(gateway.circuit_state(), Some(CircuitState::Open));

        let err = gateway.evaluate(Transaction::GetAllTasks, vec![]).await.unwrap_err();
        assert!(err.to_string().contains("circuit breaker open"));
        assert_eq!(ledger.calls().len(), 2, "open circuit must not reach the ledger");
    }

    #[tokio::test]
    async fn test_not_found_does_not_trip_breaker() {
        let ledger = Arc::new(InMemoryLedger::new());
        let config = MarketConfig {
            circuit_breaker: CircuitBreakerConfig {
                enabled: true,
                failure_threshold: 1,
                ..CircuitBreakerConfig::default()
            },
            ..MarketConfig::default()
        };
        let gateway = LedgerGateway::from_config(ledger, &config);

        let err = gateway
            .evaluate(Transaction::ReadUser, vec!["ghost".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::NotFound { .. }));
        assert_eq!(gateway.circuit_state(), Some(CircuitState::Closed));
    }
}
