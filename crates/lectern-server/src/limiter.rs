// File: src/limiter.rs
// Purpose: Fixed-window request limiter keyed by client IP

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use lectern::config::ServerConfig;

pub const TOO_MANY_REQUESTS: &str = "Too many requests, please try again later.";

/// Stale windows are swept once the table grows past this many clients
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

/// Outcome of counting one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    /// Over the limit; the window resets after the given delay
    Limited { retry_after: Duration },
}

#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max: u32,
    clients: Mutex<HashMap<IpAddr, Window>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max: u32) -> Self {
        Self {
            window,
            max,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.limiter_window(), config.limiter_max)
    }

    pub fn is_enabled(&self) -> bool {
        self.max > 0 && !self.window.is_zero()
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Count one request from `client` at `now`
    pub fn check(&self, client: IpAddr, now: Instant) -> Decision {
        if !self.is_enabled() {
            return Decision::Allowed { remaining: u32::MAX };
        }

        let mut clients = self.clients.lock();
        if clients.len() > SWEEP_THRESHOLD {
            let window = self.window;
            clients.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = clients.entry(client).or_insert(Window { started: now, hits: 0 });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window { started: now, hits: 0 };
        }

        if entry.hits >= self.max {
            let elapsed = now.duration_since(entry.started);
            return Decision::Limited {
                retry_after: self.window.saturating_sub(elapsed),
            };
        }
        entry.hits += 1;
        Decision::Allowed {
            remaining: self.max - entry.hits,
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.clients.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_limit_within_window() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);
        let start = Instant::now();

        assert_eq!(limiter.check(ip(1), start), Decision::Allowed { remaining: 1 });
        assert_eq!(limiter.check(ip(1), start), Decision::Allowed { remaining: 0 });
        assert_eq!(
            limiter.check(ip(1), start + Duration::from_secs(20)),
            Decision::Limited {
                retry_after: Duration::from_secs(40)
            }
        );
    }

    #[test]
    fn test_clients_are_counted_separately() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        let now = Instant::now();

        assert!(matches!(limiter.check(ip(1), now), Decision::Allowed { .. }));
        assert!(matches!(limiter.check(ip(2), now), Decision::Allowed { .. }));
        assert!(matches!(limiter.check(ip(1), now), Decision::Limited { .. }));
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::new(Duration::from_secs(1), 1);
        let start = Instant::now();

        assert!(matches!(limiter.check(ip(1), start), Decision::Allowed { .. }));
        assert!(matches!(limiter.check(ip(1), start), Decision::Limited { .. }));
        assert_eq!(
            limiter.check(ip(1), start + Duration::from_secs(1)),
            Decision::Allowed { remaining: 0 }
        );
    }

    #[test]
    fn test_zero_max_disables() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 0);
        let now = Instant::now();
        for _ in 0..5 {
            assert!(matches!(limiter.check(ip(1), now), Decision::Allowed { .. }));
        }
        assert_eq!(limiter.tracked(), 0);
    }

    #[test]
    fn test_stale_clients_are_swept() {
        let limiter = RateLimiter::new(Duration::from_secs(1), 5);
        let start = Instant::now();
        for i in 0..=SWEEP_THRESHOLD as u32 {
            let client = IpAddr::V4(Ipv4Addr::from(i));
            limiter.check(client, start);
        }
        limiter.check(ip(1), start + Duration::from_secs(2));
        assert_eq!(limiter.tracked(), 1);
    }
}
