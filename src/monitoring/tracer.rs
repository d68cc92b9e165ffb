/*!
 * Tracing
 * Structured logging for the primitives and the stress binary
 *
 * The primitives only emit events (`debug!` on setup, `trace!` on futex
 * traffic, `warn!` on configuration failures). Installing a subscriber is
 * left to the embedding program; `init_tracing` is the one the stress binary
 * uses.
 */

use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global subscriber
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - SYNC_TRACE_JSON: Enable JSON output (default: false)
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("SYNC_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()?;
        info!("tracing initialized with JSON output");
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
        info!("tracing initialized");
    }
    Ok(())
}

/// Timed span around one named operation
///
/// Logs its duration when dropped, at `warn` if it ran longer than the slow
/// threshold.
pub struct OperationSpan {
    span: tracing::Span,
    operation: &'static str,
    start: Instant,
    slow_after: Duration,
}

impl OperationSpan {
    pub fn new(operation: &'static str, slow_after: Duration) -> Self {
        let span = span!(
            Level::DEBUG,
            "operation",
            operation,
            duration_us = tracing::field::Empty,
            result = tracing::field::Empty,
            items_processed = tracing::field::Empty,
        );
        span.in_scope(|| debug!(operation, "operation started"));

        Self {
            span,
            operation,
            start: Instant::now(),
            slow_after,
        }
    }

    /// Record the operation result
    pub fn record_result(&self, success: bool) {
        self.span
            .record("result", if success { "success" } else { "error" });
    }

    pub fn record_items_processed(&self, count: u64) {
        self.span.record("items_processed", count);
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Make this span current on the calling thread until the guard drops,
    /// so events logged inside the operation carry its fields
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for OperationSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_us", duration.as_micros() as u64);

        if duration > self.slow_after {
            warn!(
                operation = self.operation,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow operation detected"
            );
        } else {
            debug!(
                operation = self.operation,
                duration_us = duration.as_micros() as u64,
                "operation completed"
            );
        }
    }
}

/// Span for an operation expected to finish within `slow_after`
#[inline]
pub fn span_operation(name: &'static str, slow_after: Duration) -> OperationSpan {
    OperationSpan::new(name, slow_after)
}
