use std::sync::Arc;
use std::time::Duration;

use bridge_registry::CommandSpec;
use dashmap::DashMap;

use crate::breaker::CircuitBreaker;
use crate::error::ResilienceError;
use crate::rate_limiter::RateLimiter;

/// Default consecutive-failure threshold before a command's circuit opens,
/// and the cooldown before a half-open probe is admitted (§3, command specs
/// don't currently carry per-command overrides for these).
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(30);

/// Wraps every executor pool submission with rate limiting and circuit
/// breaking (§4.7). Retry and audit emission are separate collaborators
/// ([`crate::RetryPolicy`], [`crate::AuditSink`]) driven by the caller around
/// the same submission, since they need the in-flight attempt's result
/// rather than a yes/no gate.
pub struct ResilienceLayer {
    rate_limiter: RateLimiter,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl Default for ResilienceLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResilienceLayer {
    pub fn new() -> Self {
        Self {
            rate_limiter: RateLimiter::new(),
            breakers: DashMap::new(),
        }
    }

    fn breaker_for(&self, command_name: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(command_name.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    command_name.to_string(),
                    DEFAULT_FAILURE_THRESHOLD,
                    DEFAULT_OPEN_TIMEOUT,
                ))
            })
            .clone()
    }

    /// Checks whether `principal_id` may submit `spec` right now: rate limit
    /// first (cheapest, most specific to the caller), then the command's
    /// circuit breaker.
    pub fn admit(&self, spec: &CommandSpec, principal_id: &str) -> Result<Arc<CircuitBreaker>, ResilienceError> {
        if let Some(descriptor) = &spec.rate_limit {
            if let Err(retry_after) = self.rate_limiter.check(&spec.name, principal_id, descriptor) {
                return Err(ResilienceError::RateLimited { retry_after });
            }
        }

        let breaker = self.breaker_for(&spec.name);
        if !breaker.allow() {
            return Err(ResilienceError::CircuitOpen);
        }
        Ok(breaker)
    }
}
