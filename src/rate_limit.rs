use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::DashMap;

/// Sliding window in-memory rate limiter. State is per process and is lost on
/// restart; horizontally scaled instances each count separately.
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    store: Arc<DashMap<String, VecDeque<Instant>>>,
    pub enabled: bool,
}

impl InMemoryRateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self { store: Arc::new(DashMap::new()), enabled }
    }

    /// Records a hit for `key`. When the window is already full the hit is
    /// not recorded and the time until the oldest hit expires is returned.
    pub fn hit(&self, key: &str, limit: usize, window: Duration) -> Result<(), Duration> {
        if !self.enabled { return Ok(()); }
        let now = Instant::now();
        let mut hits = self.store.entry(key.to_string()).or_default();
        hits.retain(|t| now.duration_since(*t) < window);
        if hits.len() < limit {
            hits.push_back(now);
            return Ok(());
        }
        let oldest = hits.front().copied().unwrap_or(now);
        Err(window.saturating_sub(now.duration_since(oldest)))
    }

    /// Drops hits older than `window` and forgets keys left without any.
    pub fn sweep(&self, window: Duration) {
        let now = Instant::now();
        self.store.retain(|_, hits| {
            hits.retain(|t| now.duration_since(*t) < window);
            !hits.is_empty()
        });
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub action_limit: usize,
    pub action_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { action_limit: 50, action_window: Duration::from_secs(60) }
    }
}

/// Guard consulted by the forum's mutating actions, keyed by client address.
#[derive(Clone)]
pub struct RateLimiterFacade {
    pub limiter: InMemoryRateLimiter,
    pub cfg: RateLimitConfig,
}

impl RateLimiterFacade {
    pub fn new(limiter: InMemoryRateLimiter, cfg: RateLimitConfig) -> Self { Self { limiter, cfg } }
    /// `Err` carries the suggested retry delay.
    pub fn allow_action(&self, client: &str) -> Result<(), Duration> {
        self.limiter.hit(&format!("forum:{client}"), self.cfg.action_limit, self.cfg.action_window)
    }

    pub fn sweep(&self) {
        self.limiter.sweep(self.cfg.action_window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sliding_window_basic() {
        let rl = InMemoryRateLimiter::new(true);
        let window = Duration::from_millis(50);
        for _ in 0..3 { assert!(rl.hit("k", 3, window).is_ok()); }
        assert!(rl.hit("k", 3, window).is_err());
        std::thread::sleep(Duration::from_millis(60));
        assert!(rl.hit("k", 3, window).is_ok());
    }

    #[test]
    fn keys_are_independent_and_disabled_allows_all() {
        let facade = RateLimiterFacade::new(
            InMemoryRateLimiter::new(true),
            RateLimitConfig { action_limit: 1, action_window: Duration::from_secs(60) },
        );
        assert!(facade.allow_action("10.0.0.1").is_ok());
        let retry = facade.allow_action("10.0.0.1").unwrap_err();
        assert!(retry <= Duration::from_secs(60) && retry > Duration::from_secs(55));
        assert!(facade.allow_action("10.0.0.2").is_ok());

        let off = InMemoryRateLimiter::new(false);
        for _ in 0..10 { assert!(off.hit("k", 1, Duration::from_secs(60)).is_ok()); }
    }

    #[test]
    fn sweep_forgets_idle_clients() {
        let rl = InMemoryRateLimiter::new(true);
        let window = Duration::from_millis(50);
        assert!(rl.hit("idle", 5, window).is_ok());
        std::thread::sleep(Duration::from_millis(60));
        assert!(rl.hit("busy", 5, window).is_ok());
        assert_eq!(rl.tracked_keys(), 2);

        rl.sweep(window);
        assert_eq!(rl.tracked_keys(), 1);
        assert!(rl.hit("busy", 5, window).is_ok());
        assert_eq!(rl.tracked_keys(), 1);
    }
}
