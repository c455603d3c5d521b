//! Circuit breaker around the remote endpoint.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::SyncError;

/// Breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Consecutive half-open successes that close it
    pub success_threshold: u32,
    /// How long the circuit stays open
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failures: u32,
    successes: u32,
    opened_at: Option<Instant>,
}

impl Inner {
    const fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            successes: 0,
            opened_at: None,
        }
    }

    fn trip(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.successes = 0;
    }
}

/// Shared failure gate. One instance guards every remote call.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::closed()),
        }
    }

    /// Current state. An open circuit whose timeout elapsed reports
    /// half-open.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        match self.inner.lock() {
            Ok(mut inner) => {
                self.refresh(&mut inner);
                inner.state
            }
            Err(_) => CircuitState::Open,
        }
    }

    /// Force the circuit closed and forget all counters.
    pub fn reset(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            if inner.state != CircuitState::Closed {
                info!(from = %inner.state, "Circuit reset");
            }
            *inner = Inner::closed();
        }
    }

    /// Run `fut` through the breaker.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::CircuitOpen`] without polling `fut` while the
    /// circuit is open, otherwise whatever `fut` returns. Validation errors
    /// pass through without counting as failures.
    pub async fn call<F, T>(&self, fut: F) -> Result<T, SyncError>
    where
        F: Future<Output = Result<T, SyncError>>,
    {
        self.admit()?;
        let result = fut.await;
        match &result {
            Ok(_) => self.on_success(),
            Err(SyncError::Validation(_)) => {}
            Err(e) => self.on_failure(e),
        }
        result
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, SyncError> {
        self.inner
            .lock()
            .map_err(|_| SyncError::Database("Circuit breaker lock poisoned".to_string()))
    }

    fn refresh(&self, inner: &mut Inner) {
        if inner.state != CircuitState::Open {
            return;
        }
        let elapsed = inner.opened_at.map_or(self.config.reset_timeout, |at| at.elapsed());
        if elapsed >= self.config.reset_timeout {
            inner.state = CircuitState::HalfOpen;
            inner.successes = 0;
            info!("Circuit half-open, allowing trial calls");
        }
    }

    fn admit(&self) -> Result<(), SyncError> {
        let mut inner = self.lock()?;
        self.refresh(&mut inner);
        if inner.state == CircuitState::Open {
            let elapsed = inner.opened_at.map_or(Duration::ZERO, |at| at.elapsed());
            return Err(SyncError::CircuitOpen {
                retry_in: self.config.reset_timeout.saturating_sub(elapsed),
            });
        }
        Ok(())
    }

    fn on_success(&self) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        match inner.state {
            CircuitState::HalfOpen => {
                inner.successes += 1;
                if inner.successes >= self.config.success_threshold {
                    info!("Circuit closed");
                    *inner = Inner::closed();
                }
            }
            CircuitState::Closed => inner.failures = 0,
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self, error: &SyncError) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        match inner.state {
            CircuitState::Closed => {
                inner.failures += 1;
                if inner.failures >= self.config.failure_threshold {
                    warn!(failures = inner.failures, error = %error, "Circuit opened");
                    inner.trip();
                }
            }
            CircuitState::HalfOpen => {
                warn!(error = %error, "Trial call failed, circuit reopened");
                inner.trip();
            }
            CircuitState::Open => {}
        }
    }
}
