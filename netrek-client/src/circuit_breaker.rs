//! Circuit Breaker (§4.8): wraps client-initiated network operations so a
//! failing server does not leave every caller blocked on transport
//! timeouts. Closed -> Open on a consecutive-failure streak; Open -> HalfOpen
//! after a cooldown; HalfOpen admits a limited number of probes and decides
//! the next state from the first one to finish.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::CircuitBreakerConfig;
use crate::error::CircuitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    window_started_at: Instant,
    opened_at: Instant,
    half_open_probes: u32,
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        let now = Instant::now();
        CircuitBreaker {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                window_started_at: now,
                opened_at: now,
                half_open_probes: 0,
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().unwrap().state
    }

    /// Admits or rejects a call under the current state, running `attempt_guard`
    /// bookkeeping for Open -> HalfOpen transitions. Returns `Err(Open)`
    /// without calling `op` at all when the circuit denies admission.
    fn admit(&self) -> Result<(), CircuitError> {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        match inner.state {
            BreakerState::Closed => {
                if now.duration_since(inner.window_started_at) >= self.config.interval {
                    inner.consecutive_failures = 0;
                    inner.window_started_at = now;
                }
                Ok(())
            }
            BreakerState::Open => {
                if now.duration_since(inner.opened_at) >= self.config.timeout {
                    tracing::info!("circuit breaker: Open -> HalfOpen");
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_probes = 1;
                    Ok(())
                } else {
                    Err(CircuitError::Open)
                }
            }
            BreakerState::HalfOpen => {
                if inner.half_open_probes < self.config.max_requests {
                    inner.half_open_probes += 1;
                    Ok(())
                } else {
                    Err(CircuitError::Open)
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed => inner.consecutive_failures = 0,
            BreakerState::HalfOpen => {
                tracing::info!("circuit breaker: HalfOpen -> Closed");
                inner.state = BreakerState::Closed;
                inner.consecutive_failures = 0;
                inner.window_started_at = Instant::now();
                inner.half_open_probes = 0;
            }
            BreakerState::Open => {}
        }
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.max_consecutive_failures {
                    tracing::warn!(failures = inner.consecutive_failures, "circuit breaker: Closed -> Open");
                    inner.state = BreakerState::Open;
                    inner.opened_at = Instant::now();
                }
            }
            BreakerState::HalfOpen => {
                tracing::warn!("circuit breaker: HalfOpen -> Open");
                inner.state = BreakerState::Open;
                inner.opened_at = Instant::now();
                inner.half_open_probes = 0;
            }
            BreakerState::Open => {}
        }
    }

    /// Runs `op` if the breaker admits the call, recording the outcome.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, CircuitError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.admit()?;
        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(CircuitError::Operation(err.to_string()))
            }
        }
    }

    /// Retries `op` up to 3 times total with linear backoff (1s, 2s, 3s)
    /// between attempts. Returns immediately once the breaker is Open,
    /// without waiting out the remaining backoff.
    pub async fn execute_with_retry<T, E, F, Fut>(&self, mut op: F) -> Result<T, CircuitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        const BACKOFFS: [Duration; 3] = [Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(3)];

        let mut last_err = CircuitError::Open;
        for backoff in BACKOFFS {
            match self.call(&mut op).await {
                Ok(value) => return Ok(value),
                Err(CircuitError::Open) => return Err(CircuitError::Open),
                Err(err) => {
                    last_err = err;
                    tokio::time::sleep(backoff).await;
                }
            }
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            max_requests: 1,
            interval: Duration::from_secs(60),
            timeout: Duration::from_millis(20),
            max_consecutive_failures: 2,
        }
    }

    #[tokio::test]
    async fn trips_open_after_consecutive_failures() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        let err = breaker.call(|| async { Ok::<_, &str>(()) }).await.unwrap_err();
        assert!(matches!(err, CircuitError::Open));
    }

    #[tokio::test]
    async fn half_open_probe_success_closes_the_circuit() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        tokio::time::sleep(Duration::from_millis(30)).await;
        breaker.call(|| async { Ok::<_, &str>(()) }).await.unwrap();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_open_probe_failure_reopens_the_circuit() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..2 {
            let _ = breaker.call(|| async { Err::<(), _>("boom") }).await;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
        let _ = breaker.call(|| async { Err::<(), _>("boom again") }).await;
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn execute_with_retry_succeeds_on_a_later_attempt() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            max_requests: 3,
            interval: Duration::from_secs(60),
            timeout: Duration::from_secs(30),
            max_consecutive_failures: 5,
        });
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result = breaker
            .execute_with_retry(|| {
                let n = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async move {
                    if n < 1 {
                        Err("not yet")
                    } else {
                        Ok(())
                    }
                }
            })
            .await;
        assert!(result.is_ok());
    }
}
