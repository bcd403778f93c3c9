//! Resilience Layer: wraps every executor pool submission with per-command
//! rate limiting and circuit breaking, offers a deadline-respecting retry
//! helper for the categories a command spec marks retryable, and defines the
//! audit record emitted on every terminal transition (§4.7).

mod audit;
mod breaker;
mod error;
mod guard;
mod rate_limiter;
mod retry;

pub use audit::{redact_arguments, AuditArgument, AuditRecord, AuditSink, InMemoryAuditSink};
pub use breaker::{CircuitBreaker, CircuitState};
pub use error::ResilienceError;
pub use guard::ResilienceLayer;
pub use rate_limiter::RateLimiter;
pub use retry::RetryPolicy;
