use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const MAX_ATTEMPTS: usize = 5;
const WINDOW_SECS: u64 = 900; // 15 minutes

/// Failed-login counter per client IP, shared across workers.
#[derive(Clone)]
pub struct RateLimiter {
    attempts: Arc<Mutex<HashMap<IpAddr, Vec<Instant>>>>,
    max_attempts: usize,
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(MAX_ATTEMPTS, Duration::from_secs(WINDOW_SECS))
    }
}

impl RateLimiter {
    pub fn new(max_attempts: usize, window: Duration) -> Self {
        Self {
            attempts: Arc::new(Mutex::new(HashMap::new())),
            max_attempts,
            window,
        }
    }

    /// Check if the given IP is rate-limited. Returns true if blocked.
    /// Also lazily cleans up stale entries for the checked IP.
    pub fn is_blocked(&self, ip: IpAddr) -> bool {
        let mut map = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        let Some(cutoff) = Instant::now().checked_sub(self.window) else {
            return map.get(&ip).is_some_and(|t| t.len() >= self.max_attempts);
        };

        match map.get_mut(&ip) {
            Some(timestamps) => {
                timestamps.retain(|t| *t > cutoff);
                timestamps.len() >= self.max_attempts
            }
            None => false,
        }
    }

    /// Record a failed login attempt for the given IP.
    pub fn record_failure(&self, ip: IpAddr) {
        let mut map = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(ip).or_default().push(Instant::now());
    }

    /// Clear all recorded attempts for the given IP (call on successful login).
    pub fn clear(&self, ip: IpAddr) {
        let mut map = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(&ip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const IP: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7));

    #[test]
    fn blocks_after_max_failures() {
        let limiter = RateLimiter::default();
        for _ in 0..4 {
            limiter.record_failure(IP);
        }
        assert!(!limiter.is_blocked(IP));
        limiter.record_failure(IP);
        assert!(limiter.is_blocked(IP));
        assert!(!limiter.is_blocked(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    }

    #[test]
    fn clear_unblocks() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        limiter.record_failure(IP);
        assert!(limiter.is_blocked(IP));
        limiter.clear(IP);
        assert!(!limiter.is_blocked(IP));
    }

    #[test]
    fn old_failures_expire() {
        let limiter = RateLimiter::new(1, Duration::from_millis(10));
        limiter.record_failure(IP);
        std::thread::sleep(Duration::from_millis(30));
        assert!(!limiter.is_blocked(IP));
    }
}
