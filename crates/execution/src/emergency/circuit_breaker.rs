//! Circuit breaker that halts a pool after a solver failure.

use chrono::{DateTime, Utc};
use stableswap_domain::PoolError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Pool halted: only balanced withdrawals and views are served.
    Open,
}

/// Configuration for the circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Convergence failures that open the circuit.
    pub max_convergence_failures: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_convergence_failures: 1,
        }
    }
}

/// Halts a pool once its solver stops converging.
///
/// Convergence failures signal a corrupted or extreme pool state, so a
/// tripped breaker stays open until an admin resets it.
pub struct CircuitBreaker {
    state: Arc<RwLock<CircuitState>>,
    config: CircuitBreakerConfig,
    /// Convergence failures since the last success.
    failure_count: AtomicU32,
    /// Systemic failures of any kind, never reset by successes.
    systemic_failures: AtomicU32,
    halted_at: Arc<RwLock<Option<DateTime<Utc>>>>,
    manually_tripped: AtomicBool,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(CircuitState::Closed)),
            config,
            failure_count: AtomicU32::new(0),
            systemic_failures: AtomicU32::new(0),
            halted_at: Arc::new(RwLock::new(None)),
            manually_tripped: AtomicBool::new(false),
        }
    }

    /// Checks if operations other than balanced withdrawals are allowed.
    pub async fn is_allowed(&self) -> bool {
        if self.manually_tripped.load(Ordering::SeqCst) {
            return false;
        }
        *self.state.read().await == CircuitState::Closed
    }

    /// Records a committed operation.
    pub async fn record_success(&self) {
        self.failure_count.store(0, Ordering::SeqCst);
    }

    /// Records a failed operation. Returns true if this failure tripped the
    /// breaker.
    pub async fn record_failure(&self, err: &PoolError) -> bool {
        if !err.is_systemic() {
            return false;
        }
        self.systemic_failures.fetch_add(1, Ordering::SeqCst);

        if !matches!(err, PoolError::ConvergenceFailure(_)) {
            warn!(error = %err, "systemic pool failure");
            return false;
        }

        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= self.config.max_convergence_failures
            && *self.state.read().await == CircuitState::Closed
        {
            self.trip(&err.to_string()).await;
            return true;
        }
        false
    }

    /// Manually halts the pool.
    pub async fn manual_trip(&self, reason: &str) {
        self.manually_tripped.store(true, Ordering::SeqCst);
        self.trip(&format!("manual trip: {reason}")).await;
    }

    async fn trip(&self, reason: &str) {
        error!(reason, "Circuit breaker tripped, pool halted");
        self.transition_to(CircuitState::Open).await;
        *self.halted_at.write().await = Some(Utc::now());
        self.failure_count.store(0, Ordering::SeqCst);
    }

    async fn transition_to(&self, new_state: CircuitState) {
        let mut state = self.state.write().await;
        let old_state = *state;

        if old_state != new_state {
            *state = new_state;
            info!(
                old_state = ?old_state,
                new_state = ?new_state,
                "Circuit breaker state changed"
            );
        }
    }

    pub async fn state(&self) -> CircuitState {
        *self.state.read().await
    }

    /// Resumes normal operation.
    pub async fn reset(&self) {
        self.transition_to(CircuitState::Closed).await;
        self.failure_count.store(0, Ordering::SeqCst);
        self.manually_tripped.store(false, Ordering::SeqCst);
        *self.halted_at.write().await = None;
        info!("Circuit breaker reset");
    }

    pub async fn stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            state: *self.state.read().await,
            failure_count: self.failure_count.load(Ordering::SeqCst),
            systemic_failures: self.systemic_failures.load(Ordering::SeqCst),
            manually_tripped: self.manually_tripped.load(Ordering::SeqCst),
            halted_at: *self.halted_at.read().await,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

/// Statistics for the circuit breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    /// Convergence failures since the last success.
    pub failure_count: u32,
    pub systemic_failures: u32,
    pub manually_tripped: bool,
    /// When the pool was halted.
    pub halted_at: Option<DateTime<Utc>>,
}
