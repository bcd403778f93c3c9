use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ResilienceError {
    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    #[error("circuit open for this command")]
    CircuitOpen,
}
