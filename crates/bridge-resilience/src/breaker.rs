use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Per-command circuit breaker state machine (§3/§4.7): `closed` tolerates
/// failures up to a threshold, `open` rejects everything until a cooldown
/// elapses, `half-open` admits a single probe before deciding which way to
/// go next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    half_open_probe_in_flight: bool,
}

pub struct CircuitBreaker {
    command_name: String,
    failure_threshold: u32,
    open_timeout: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(command_name: impl Into<String>, failure_threshold: u32, open_timeout: Duration) -> Self {
        Self {
            command_name: command_name.into(),
            failure_threshold: failure_threshold.max(1),
            open_timeout,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure: None,
                half_open_probe_in_flight: false,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    /// Checks whether a new submission may proceed, transitioning
    /// `open -> half-open` if the cooldown has elapsed. Only one probe is
    /// admitted per half-open window; concurrent callers during that window
    /// are rejected until the probe resolves.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                if inner.half_open_probe_in_flight {
                    false
                } else {
                    inner.half_open_probe_in_flight = true;
                    true
                }
            }
            CircuitState::Open => {
                let elapsed = inner.last_failure.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.open_timeout {
                    debug!(command = %self.command_name, "circuit breaker entering half-open probe");
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.consecutive_failures = 0;
        inner.half_open_probe_in_flight = false;
        if inner.state != CircuitState::Closed {
            debug!(command = %self.command_name, "circuit breaker closing after successful probe");
        }
        inner.state = CircuitState::Closed;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.half_open_probe_in_flight = false;
        inner.last_failure = Some(Instant::now());

        match inner.state {
            CircuitState::HalfOpen => {
                warn!(command = %self.command_name, "probe failed, circuit breaker re-opening");
                inner.state = CircuitState::Open;
            }
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    warn!(
                        command = %self.command_name,
                        failures = inner.consecutive_failures,
                        "circuit breaker opening after consecutive failures"
                    );
                    inner.state = CircuitState::Open;
                }
            }
            CircuitState::Open => {}
        }
    }
}
