//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: upstream assumed down, requests fail fast
//! - Half-Open: limited probes test whether the upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold
//! Open → Half-Open: after the cool-down timeout elapses
//! Half-Open → Closed: a probe succeeds
//! Half-Open → Open: a probe fails
//! ```

use std::future::Future;
use std::time::Instant;

use parking_lot::Mutex;

use crate::config::schema::CircuitBreakerConfig;
use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failures: u32,
    last_fail_at: Option<Instant>,
    half_open_inflight: u32,
}

/// Records an abandoned call as a failure when the wrapping future is
/// dropped between admission and completion.
struct CallGuard<'a> {
    breaker: &'a CircuitBreaker,
    completed: bool,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.breaker.after_request(true);
        }
    }
}

/// Three-state breaker shared by every request on the proxy path.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
                last_fail_at: None,
                half_open_inflight: 0,
            }),
        }
    }

    /// Gate the given call: admit it per the current state, await it, and
    /// record the outcome. The future only runs when admitted. An admitted
    /// call whose future is dropped mid-flight (the pipeline deadline
    /// fired) is recorded as a failure, so half-open probe slots cannot
    /// leak.
    pub async fn call<T, F, Fut>(&self, f: F) -> Result<T, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        self.before_request()?;
        let mut guard = CallGuard {
            breaker: self,
            completed: false,
        };
        let outcome = f().await;
        guard.completed = true;
        self.after_request(outcome.is_err());
        outcome
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    fn before_request(&self) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let cooled_down = inner
                    .last_fail_at
                    .is_some_and(|at| at.elapsed() > self.config.timeout);
                if cooled_down {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_inflight = 1;
                    tracing::info!("Circuit breaker half-open, admitting probe");
                    Ok(())
                } else {
                    Err(GatewayError::CircuitOpen)
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_inflight >= self.config.max_requests {
                    return Err(GatewayError::TooManyProbes);
                }
                inner.half_open_inflight += 1;
                Ok(())
            }
        }
    }

    fn after_request(&self, failed: bool) {
        let mut inner = self.inner.lock();
        if failed {
            self.on_failure(&mut inner);
        } else {
            self.on_success(&mut inner);
        }
    }

    fn on_success(&self, inner: &mut Inner) {
        match inner.state {
            CircuitState::Closed => {
                inner.failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.failures = 0;
                inner.half_open_inflight = 0;
                tracing::info!("Circuit breaker closed after successful probe");
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self, inner: &mut Inner) {
        inner.failures += 1;
        inner.last_fail_at = Some(Instant::now());

        match inner.state {
            CircuitState::Closed => {
                if inner.failures >= self.config.threshold {
                    inner.state = CircuitState::Open;
                    tracing::warn!(
                        failures = inner.failures,
                        threshold = self.config.threshold,
                        "Circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.half_open_inflight = 0;
                tracing::warn!("Circuit breaker re-opened from half-open state");
            }
            CircuitState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn breaker(threshold: u32, timeout: Duration, max_requests: u32) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            enabled: true,
            threshold,
            timeout,
            max_requests,
        })
    }

    async fn fail(cb: &CircuitBreaker) -> Result<(), GatewayError> {
        cb.call(|| async { Err::<(), _>(GatewayError::Upstream("boom".into())) })
            .await
    }

    async fn succeed(cb: &CircuitBreaker) -> Result<(), GatewayError> {
        cb.call(|| async { Ok(()) }).await
    }

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let cb = breaker(3, Duration::from_secs(60), 1);

        for _ in 0..3 {
            assert!(fail(&cb).await.is_err());
        }
        assert_eq!(cb.state(), CircuitState::Open);

        let err = succeed(&cb).await.unwrap_err();
        assert!(matches!(err, GatewayError::CircuitOpen));
    }

    #[tokio::test]
    async fn success_resets_failure_count_while_closed() {
        let cb = breaker(3, Duration::from_secs(60), 1);

        assert!(fail(&cb).await.is_err());
        assert!(fail(&cb).await.is_err());
        assert!(succeed(&cb).await.is_ok());
        assert!(fail(&cb).await.is_err());
        assert!(fail(&cb).await.is_err());

        // Never reached three consecutive failures.
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn probe_after_cooldown_closes_on_success() {
        let cb = breaker(1, Duration::from_millis(10), 1);

        assert!(fail(&cb).await.is_err());
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(succeed(&cb).await.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn probe_failure_reopens() {
        let cb = breaker(1, Duration::from_millis(10), 1);

        assert!(fail(&cb).await.is_err());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(fail(&cb).await.is_err());

        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn dropped_call_counts_as_failure() {
        let cb = breaker(2, Duration::from_secs(60), 1);

        // The call future is cancelled mid-flight, as the pipeline
        // deadline does.
        let hung = cb.call(|| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });
        assert!(
            tokio::time::timeout(Duration::from_millis(10), hung)
                .await
                .is_err()
        );

        assert!(fail(&cb).await.is_err());
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn half_open_rejects_excess_probes() {
        let cb = breaker(1, Duration::from_millis(10), 1);

        assert!(fail(&cb).await.is_err());
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The admitted probe holds the only slot; a concurrent call is
        // rejected with TooManyProbes.
        let probe = cb.call(|| async {
            let second = cb.call(|| async { Ok(()) }).await;
            assert!(matches!(second, Err(GatewayError::TooManyProbes)));
            Ok(())
        });
        assert!(probe.await.is_ok());
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
