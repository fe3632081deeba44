//! Per-source admission control: concurrency cap, token-bucket rate
//! limit, and a circuit breaker.
//!
//! Every call to an external source funnels through the guard for
//! that source's layer. The guard admits or rejects before any
//! network work happens, so an open circuit costs nothing but an
//! error value.
//!
//! Breaker rules: only transient and rate-limited failures count, and
//! they must be consecutive. Permanent and data failures prove the
//! source is answering, so they neither count nor reset the streak;
//! in half-open they close the circuit. After `failure_threshold`
//! counted failures the circuit opens for `cooldown_secs`, then one
//! trial call decides between closing and reopening.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, warn};

use crate::domain::models::config::{GuardConfig, SourceGuardConfig};
use crate::domain::models::Layer;
use crate::domain::ports::SourceError;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Failing; calls are rejected.
    Open,
    /// Cooldown elapsed; one trial call is probing recovery.
    HalfOpen,
}

impl CircuitState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Breaker bookkeeping for one layer.
#[derive(Debug, Clone)]
struct LayerBreaker {
    state: CircuitState,
    consecutive_failures: u32,
    trial_in_flight: bool,
    opened_at: Option<DateTime<Utc>>,
    state_changed_at: DateTime<Utc>,
    open_count: u32,
}

impl LayerBreaker {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            trial_in_flight: false,
            opened_at: None,
            state_changed_at: Utc::now(),
            open_count: 0,
        }
    }

    /// Record a counted failure. Returns whether the circuit opened
    /// just now.
    fn record_failure(&mut self, threshold: u32) -> bool {
        self.consecutive_failures += 1;
        match self.state {
            CircuitState::Closed if self.consecutive_failures >= threshold => {
                self.open();
                true
            }
            // A failed trial call sends the circuit straight back open.
            CircuitState::HalfOpen => {
                self.open();
                true
            }
            _ => false,
        }
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.trial_in_flight = false;
        if self.state == CircuitState::HalfOpen {
            self.close();
        }
    }

    fn open(&mut self) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Utc::now());
        self.state_changed_at = Utc::now();
        self.trial_in_flight = false;
        self.open_count += 1;
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.opened_at = None;
        self.state_changed_at = Utc::now();
        self.trial_in_flight = false;
        self.consecutive_failures = 0;
    }

    fn half_open(&mut self) {
        self.state = CircuitState::HalfOpen;
        self.state_changed_at = Utc::now();
    }
}

/// Admission guard for one source layer.
pub struct SourceGuard {
    layer: Layer,
    config: SourceGuardConfig,
    semaphore: Semaphore,
    limiter: DefaultDirectRateLimiter,
    breaker: RwLock<LayerBreaker>,
}

impl SourceGuard {
    #[must_use]
    pub fn new(layer: Layer, config: SourceGuardConfig) -> Self {
        let rate = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN);
        Self {
            layer,
            semaphore: Semaphore::new(config.max_concurrent.max(1)),
            limiter: RateLimiter::direct(Quota::per_second(rate).allow_burst(burst)),
            breaker: RwLock::new(LayerBreaker::new()),
            config,
        }
    }

    /// Run one source call under the guard.
    ///
    /// Order matters: the breaker is consulted first so an open
    /// circuit rejects without consuming a permit or a token, then a
    /// concurrency permit is taken, then the rate limiter waits for a
    /// token, then the call runs and its outcome feeds the breaker.
    pub async fn run<T, F, Fut>(&self, call: F) -> Result<T, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, SourceError>>,
    {
        self.admit().await?;
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| SourceError::transient("source guard semaphore closed"))?;
        self.limiter.until_ready().await;

        let result = call().await;
        match &result {
            Ok(_) => self.record_success().await,
            Err(err) => self.record_error(err).await,
        }
        result
    }

    /// Current breaker state, for logs and tests.
    pub async fn circuit_state(&self) -> CircuitState {
        self.breaker.read().await.state
    }

    /// Current counted failure streak, for logs and tests.
    pub async fn consecutive_failures(&self) -> u32 {
        self.breaker.read().await.consecutive_failures
    }

    /// Manually close the circuit and clear the streak.
    pub async fn reset(&self) {
        self.breaker.write().await.close();
    }

    async fn admit(&self) -> Result<(), SourceError> {
        let cooldown = Duration::seconds(self.config.cooldown_secs as i64);
        let mut breaker = self.breaker.write().await;
        match breaker.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let retry_at = breaker.opened_at.map_or_else(Utc::now, |at| at + cooldown);
                if Utc::now() >= retry_at {
                    breaker.half_open();
                    breaker.trial_in_flight = true;
                    debug!(layer = %self.layer, "circuit half-open, admitting trial call");
                    Ok(())
                } else {
                    Err(SourceError::CircuitOpen { layer: self.layer, retry_at })
                }
            }
            CircuitState::HalfOpen => {
                if breaker.trial_in_flight {
                    Err(SourceError::CircuitOpen {
                        layer: self.layer,
                        retry_at: breaker.state_changed_at + cooldown,
                    })
                } else {
                    breaker.trial_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    async fn record_success(&self) {
        let mut breaker = self.breaker.write().await;
        let was_open = breaker.state != CircuitState::Closed;
        breaker.record_success();
        if was_open {
            debug!(layer = %self.layer, "circuit closed after successful trial");
        }
    }

    async fn record_error(&self, err: &SourceError) {
        // A short-circuit result carries no information about the
        // source itself.
        if matches!(err, SourceError::CircuitOpen { .. }) {
            return;
        }
        let mut breaker = self.breaker.write().await;
        if err.counts_toward_breaker() {
            let opened = breaker.record_failure(self.config.failure_threshold);
            if opened {
                warn!(
                    layer = %self.layer,
                    failures = breaker.consecutive_failures,
                    open_count = breaker.open_count,
                    "circuit opened"
                );
            }
        } else {
            // The source answered, just not usefully. A half-open
            // trial counts as recovery; otherwise the streak stands.
            breaker.trial_in_flight = false;
            if breaker.state == CircuitState::HalfOpen {
                breaker.close();
            }
        }
    }
}

/// One guard per layer, shared by every orchestrator worker.
pub struct SourceGuardRegistry {
    guards: [Arc<SourceGuard>; 7],
}

impl SourceGuardRegistry {
    /// Build guards for every layer, applying per-layer overrides on
    /// top of the defaults.
    #[must_use]
    pub fn new(config: &GuardConfig) -> Self {
        let guards = Layer::ALL.map(|layer| {
            let layer_config = config
                .overrides
                .get(layer.as_str())
                .cloned()
                .unwrap_or_else(|| config.defaults.clone());
            Arc::new(SourceGuard::new(layer, layer_config))
        });
        Self { guards }
    }

    /// Build a registry with identical settings for every layer.
    #[must_use]
    pub fn uniform(defaults: SourceGuardConfig) -> Self {
        Self::new(&GuardConfig { defaults, overrides: HashMap::new() })
    }

    #[must_use]
    pub fn guard(&self, layer: Layer) -> Arc<SourceGuard> {
        Arc::clone(&self.guards[layer as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(failure_threshold: u32, cooldown_secs: u64) -> SourceGuardConfig {
        SourceGuardConfig {
            max_concurrent: 4,
            requests_per_second: 1000,
            burst_size: 1000,
            failure_threshold,
            cooldown_secs,
        }
    }

    async fn failing_call(guard: &SourceGuard, calls: &AtomicU32) -> Result<(), SourceError> {
        guard
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(SourceError::transient("boom"))
            })
            .await
    }

    #[tokio::test]
    async fn test_opens_after_consecutive_failures() {
        let guard = SourceGuard::new(Layer::Whois, fast_config(3, 60));
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            let _ = failing_call(&guard, &calls).await;
        }
        assert_eq!(guard.circuit_state().await, CircuitState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // Further calls short-circuit without reaching the source.
        let err = failing_call(&guard, &calls).await.unwrap_err();
        assert!(matches!(err, SourceError::CircuitOpen { layer: Layer::Whois, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_success_resets_streak() {
        let guard = SourceGuard::new(Layer::Dns, fast_config(3, 60));
        let calls = AtomicU32::new(0);

        let _ = failing_call(&guard, &calls).await;
        let _ = failing_call(&guard, &calls).await;
        assert_eq!(guard.consecutive_failures().await, 2);

        guard.run(|| async { Ok::<(), SourceError>(()) }).await.unwrap();
        assert_eq!(guard.consecutive_failures().await, 0);

        let _ = failing_call(&guard, &calls).await;
        let _ = failing_call(&guard, &calls).await;
        assert_eq!(guard.circuit_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_permanent_failures_do_not_count() {
        let guard = SourceGuard::new(Layer::PageScrape, fast_config(2, 60));
        for _ in 0..5 {
            let result: Result<(), _> = guard
                .run(|| async { Err(SourceError::permanent("404")) })
                .await;
            assert!(result.is_err());
        }
        assert_eq!(guard.circuit_state().await, CircuitState::Closed);
        assert_eq!(guard.consecutive_failures().await, 0);
    }

    #[tokio::test]
    async fn test_rate_limited_counts_toward_breaker() {
        let guard = SourceGuard::new(Layer::Reviews, fast_config(2, 60));
        for _ in 0..2 {
            let result: Result<(), _> = guard
                .run(|| async { Err(SourceError::RateLimited { retry_after_secs: Some(1) }) })
                .await;
            assert!(result.is_err());
        }
        assert_eq!(guard.circuit_state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_half_open_trial_success_closes() {
        // Zero cooldown: the next call after opening is the trial.
        let guard = SourceGuard::new(Layer::CertLog, fast_config(1, 0));
        let calls = AtomicU32::new(0);

        let _ = failing_call(&guard, &calls).await;
        assert_eq!(guard.circuit_state().await, CircuitState::Open);

        guard.run(|| async { Ok::<(), SourceError>(()) }).await.unwrap();
        assert_eq!(guard.circuit_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_trial_failure_reopens() {
        let guard = SourceGuard::new(Layer::CertLog, fast_config(1, 0));
        let calls = AtomicU32::new(0);

        let _ = failing_call(&guard, &calls).await;
        assert_eq!(guard.circuit_state().await, CircuitState::Open);

        let _ = failing_call(&guard, &calls).await;
        assert_eq!(guard.circuit_state().await, CircuitState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 2, "trial call did reach the source");
    }

    #[tokio::test]
    async fn test_permanent_failure_ends_half_open_trial() {
        let guard = SourceGuard::new(Layer::GovRegistry, fast_config(1, 0));
        let _ = guard
            .run(|| async { Err::<(), _>(SourceError::transient("boom")) })
            .await;
        assert_eq!(guard.circuit_state().await, CircuitState::Open);

        // Trial returns a permanent error: the source is reachable.
        let _ = guard
            .run(|| async { Err::<(), _>(SourceError::permanent("gone")) })
            .await;
        assert_eq!(guard.circuit_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_semaphore_caps_concurrency() {
        let config = SourceGuardConfig {
            max_concurrent: 2,
            ..fast_config(10, 60)
        };
        let guard = Arc::new(SourceGuard::new(Layer::Whois, config));
        let in_flight = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let guard = Arc::clone(&guard);
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                guard
                    .run(|| async {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok::<(), SourceError>(())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_registry_overrides() {
        let mut config = GuardConfig::default();
        config.overrides.insert(
            "whois".to_string(),
            SourceGuardConfig { failure_threshold: 1, ..fast_config(1, 0) },
        );
        let registry = SourceGuardRegistry::new(&config);

        let whois = registry.guard(Layer::Whois);
        let _ = whois
            .run(|| async { Err::<(), _>(SourceError::transient("boom")) })
            .await;
        assert_eq!(whois.circuit_state().await, CircuitState::Open);

        // Other layers still use the default threshold.
        let dns = registry.guard(Layer::Dns);
        let _ = dns
            .run(|| async { Err::<(), _>(SourceError::transient("boom")) })
            .await;
        assert_eq!(dns.circuit_state().await, CircuitState::Closed);

        // The registry hands out the same guard instance per layer.
        assert_eq!(registry.guard(Layer::Whois).circuit_state().await, CircuitState::Open);
    }
}
