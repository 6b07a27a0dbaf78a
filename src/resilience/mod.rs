//! # Resilience Module
//!
//! Fault tolerance for the ledger connection. A circuit breaker in front of
//! the port turns a dead peer into immediate `LedgerUnavailable` errors
//! instead of a pile-up of calls each waiting out its own timeout.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use taskmarket_core::config::CircuitBreakerConfig;
//! use taskmarket_core::resilience::CircuitBreaker;
//!
//! let breaker = CircuitBreaker::new("ledger", CircuitBreakerConfig {
//!     enabled: true,
//!     ..CircuitBreakerConfig::default()
//! });
//! assert_eq!(breaker.name(), "ledger");
//! ```

pub mod circuit_breaker;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerError, CircuitBreakerMetrics, CircuitState, TripsBreaker,
};
