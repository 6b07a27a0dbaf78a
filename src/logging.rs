//! # Structured Logging Module
//!
//! Environment-aware structured logging for orchestration runs. Every ledger
//! call and every compound-operation step is logged with enough fields to
//! reconstruct what reached the ledger after a partial failure.

use std::sync::OnceLock;
use std::time::Duration;

use chrono::Utc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::ledger::{CallKind, Transaction};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
///
/// Safe to call more than once. If the host process already installed a
/// global subscriber this leaves it in place.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));
        let json = std::env::var("MARKET_LOG_FORMAT").is_ok_and(|format| format == "json");

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %environment,
            json = json,
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("MARKET_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log one ledger round trip; arguments are never logged since they carry passwords
pub fn log_ledger_call(
    kind: CallKind,
    transaction: Transaction,
    key: Option<&str>,
    elapsed: Duration,
    error: Option<&str>,
) {
    match error {
        None => tracing::debug!(
            kind = %kind,
            transaction = %transaction,
            key = key,
            elapsed_ms = elapsed.as_millis() as u64,
            "LEDGER_CALL"
        ),
        Some(error) => tracing::warn!(
            kind = %kind,
            transaction = %transaction,
            key = key,
            elapsed_ms = elapsed.as_millis() as u64,
            error = %error,
            "LEDGER_CALL failed"
        ),
    }
}

/// Log structured data for user lifecycle operations
pub fn log_user_operation(operation: &str, username: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        username = %username,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "USER_OPERATION"
    );
}

/// Log structured data for task lifecycle operations
pub fn log_task_operation(
    operation: &str,
    task_id: Option<&str>,
    round: Option<u32>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        task_id = task_id,
        round = round,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "TASK_OPERATION"
    );
}

/// Log one step of a compound operation
pub fn log_saga_step(operation: &str, step: &str, subject: &str, status: &str) {
    tracing::info!(
        operation = %operation,
        step = %step,
        subject = %subject,
        status = %status,
        timestamp = %Utc::now().to_rfc3339(),
        "SAGA_STEP"
    );
}
