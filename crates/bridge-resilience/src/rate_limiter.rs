use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use bridge_registry::RateLimitDescriptor;
use dashmap::DashMap;

/// Sliding-window request log for one (command, principal) pair.
struct Bucket {
    timestamps: VecDeque<Instant>,
}

/// Per command × principal × window rate limiter (§3's Rate Limiter Bucket).
/// A sliding window of request timestamps rather than a fixed-interval
/// counter, so a burst right at a window boundary can't double the
/// configured rate.
pub struct RateLimiter {
    buckets: DashMap<(String, String), Mutex<Bucket>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    /// Returns `Ok(())` if the request is admitted, or `Err(retry_after)` if
    /// the principal has exhausted its window for this command.
    pub fn check(
        &self,
        command_name: &str,
        principal_id: &str,
        descriptor: &RateLimitDescriptor,
    ) -> Result<(), Duration> {
        let key = (command_name.to_string(), principal_id.to_string());
        let bucket = self
            .buckets
            .entry(key)
            .or_insert_with(|| {
                Mutex::new(Bucket {
                    timestamps: VecDeque::new(),
                })
            });
        let mut bucket = bucket.lock().unwrap();

        let now = Instant::now();
        while let Some(&oldest) = bucket.timestamps.front() {
            if now.duration_since(oldest) >= descriptor.window {
                bucket.timestamps.pop_front();
            } else {
                break;
            }
        }

        if bucket.timestamps.len() as u32 >= descriptor.max_requests {
            let oldest = *bucket.timestamps.front().unwrap();
            let retry_after = descriptor.window.saturating_sub(now.duration_since(oldest));
            return Err(retry_after);
        }

        bucket.timestamps.push_back(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_configured_max_then_rejects() {
        let limiter = RateLimiter::new();
        let descriptor = RateLimitDescriptor {
            max_requests: 2,
            window: Duration::from_secs(60),
        };
        assert!(limiter.check("server.enable", "user-1", &descriptor).is_ok());
        assert!(limiter.check("server.enable", "user-1", &descriptor).is_ok());
        assert!(limiter.check("server.enable", "user-1", &descriptor).is_err());
    }

    #[test]
    fn buckets_are_independent_per_principal() {
        let limiter = RateLimiter::new();
        let descriptor = RateLimitDescriptor {
            max_requests: 1,
            window: Duration::from_secs(60),
        };
        assert!(limiter.check("server.enable", "user-1", &descriptor).is_ok());
        assert!(limiter.check("server.enable", "user-2", &descriptor).is_ok());
    }
}
