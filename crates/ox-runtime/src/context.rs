use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Result, RuntimeError};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Settings for one top-level invocation.
#[derive(Debug, Clone, Default)]
pub struct ExecutionConfig {
    /// Record per-operator wall-clock timings.
    pub profile: bool,
}

/// Timing of one operator application.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRecord {
    pub operator: String,
    pub node: Option<String>,
    pub elapsed: Duration,
}

/// Per-invocation execution context, passed by reference to every
/// operator. Operators never keep it.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    config: ExecutionConfig,
    cancellation: CancellationToken,
    records: Mutex<Vec<ProfileRecord>>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ExecutionConfig) -> Self {
        ExecutionContext {
            config,
            ..Self::default()
        }
    }

    /// Shorthand for a context with profiling enabled.
    pub fn with_profiling() -> Self {
        Self::with_config(ExecutionConfig { profile: true })
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// A handle that can cancel this context from elsewhere.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Fails with [`RuntimeError::Cancelled`] once cancellation was requested.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }
        Ok(())
    }

    pub fn is_profiling(&self) -> bool {
        self.config.profile
    }

    /// Stores a timing record. No-op unless profiling is enabled.
    pub fn record(&self, operator: &str, node: Option<&str>, elapsed: Duration) {
        if !self.config.profile {
            return;
        }
        self.records.lock().push(ProfileRecord {
            operator: operator.to_string(),
            node: node.map(str::to_string),
            elapsed,
        });
    }

    pub fn profile_records(&self) -> Vec<ProfileRecord> {
        self.records.lock().clone()
    }

    /// Sum of all recorded timings.
    pub fn total_elapsed(&self) -> Duration {
        self.records.lock().iter().map(|r| r.elapsed).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_shared() {
        let ctx = ExecutionContext::new();
        let token = ctx.cancellation();
        assert!(ctx.ensure_active().is_ok());
        token.cancel();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.ensure_active(), Err(RuntimeError::Cancelled));
    }

    #[test]
    fn test_records_only_when_profiling() {
        let quiet = ExecutionContext::new();
        quiet.record("LSTM", None, Duration::from_millis(1));
        assert!(quiet.profile_records().is_empty());

        let ctx = ExecutionContext::with_profiling();
        ctx.record("LSTM", Some("lstm_0"), Duration::from_millis(2));
        ctx.record("LSTM", None, Duration::from_millis(3));
        let records = ctx.profile_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].node.as_deref(), Some("lstm_0"));
        assert_eq!(ctx.total_elapsed(), Duration::from_millis(5));
    }
}
