//! Per-key attempt counting for sensitive routes.
//!
//! # Responsibilities
//! - Count attempts per (caller key, route) inside a fixed window
//! - Reject attempts past the configured maximum while the window is open
//! - Clear a key on explicit success
//! - Drop windows that have run out (housekeeping)
//!
//! # Design Decisions
//! - Windows live in a `DashMap`; each attempt is one `entry()` update, so
//!   concurrent requests from the same key cannot under-count each other
//! - Expiry is lazy: a stale window is reset on the next attempt, not by a timer
//! - A rejected attempt still counts; only the response changes
//! - The reset compares against the first attempt of the window, so a burst
//!   straddling the boundary can see `max + 1` accepted attempts

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::RateLimitConfig;
use crate::dispatch::DispatchError;
use crate::http::RequestContext;

pub const DEFAULT_MESSAGE: &str = "Too many attempts. Please try again later.";

/// Where the caller half of a rate key comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateKeySource {
    /// Client IP address.
    #[default]
    ClientIp,
    /// Authenticated subject id, or the client IP for anonymous callers.
    Subject,
    /// A top-level field of the JSON body (e.g. the username of a login),
    /// or the client IP when the body has no usable value for it.
    Field(&'static str),
}

impl RateKeySource {
    /// The caller half of the rate key for `request`.
    pub fn caller(self, request: &RequestContext) -> String {
        let keyed = match self {
            RateKeySource::ClientIp => None,
            RateKeySource::Subject => request.subject().map(|s| format!("subject:{}", s)),
            RateKeySource::Field(name) => body_field(&request.body, name).map(|v| format!("{}:{}", name, v)),
        };
        keyed.unwrap_or_else(|| request.client_ip.clone())
    }
}

fn body_field(body: &[u8], name: &str) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    match value.get(name)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Limits applied to one route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_attempts: u32,
    pub window: Duration,
    pub message: String,
    pub key: RateKeySource,
}

impl RateLimitPolicy {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            message: DEFAULT_MESSAGE.to_string(),
            key: RateKeySource::ClientIp,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            window: config.window(),
            message: config.message.clone(),
            key: RateKeySource::ClientIp,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn keyed_by(mut self, key: RateKeySource) -> Self {
        self.key = key;
        self
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::new(5, Duration::minutes(15))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateKey {
    pub caller: String,
    pub route: Arc<str>,
}

impl RateKey {
    pub fn new(caller: impl Into<String>, route: Arc<str>) -> Self {
        Self {
            caller: caller.into(),
            route,
        }
    }
}

#[derive(Debug, Clone)]
struct RateWindow {
    count: u32,
    started: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    window: Duration,
}

impl RateWindow {
    fn open(now: DateTime<Utc>, window: Duration) -> Self {
        Self {
            count: 1,
            started: now,
            last_seen: now,
            window,
        }
    }

    fn closes_at(&self) -> DateTime<Utc> {
        self.started
            .checked_add_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Fixed-window attempt counter shared by every route that opts in.
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<RateKey, RateWindow>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            clock,
        }
    }

    /// Record one attempt for `key`. Fails once the count passes `max_attempts`
    /// inside the window.
    pub fn attempt(&self, key: &RateKey, policy: &RateLimitPolicy) -> Result<(), DispatchError> {
        let now = self.clock.now();

        let mut entry = self
            .windows
            .entry(key.clone())
            .and_modify(|window| {
                if now > window.closes_at() {
                    *window = RateWindow::open(now, policy.window);
                } else {
                    window.count = window.count.saturating_add(1);
                    window.last_seen = now;
                }
            })
            .or_insert_with(|| RateWindow::open(now, policy.window));

        let window = entry.value_mut();
        window.window = policy.window;
        let exceeded = window.count > policy.max_attempts && now < window.closes_at();
        let count = window.count;
        drop(entry);

        if exceeded {
            tracing::warn!(
                caller = %key.caller,
                route = %key.route,
                attempts = count,
                "Rate limit exceeded"
            );
            return Err(DispatchError::RateLimited(policy.message.clone()));
        }

        tracing::trace!(caller = %key.caller, route = %key.route, attempts = count, "Attempt recorded");
        Ok(())
    }

    /// Forget the window for `key`.
    pub fn reset(&self, key: &RateKey) {
        if self.windows.remove(key).is_some() {
            tracing::debug!(caller = %key.caller, route = %key.route, "Rate window cleared");
        }
    }

    /// Current count for `key`, if a window is open.
    pub fn attempts(&self, key: &RateKey) -> Option<u32> {
        self.windows.get(key).map(|w| w.count)
    }

    /// Time of the latest attempt for `key`.
    pub fn last_seen(&self, key: &RateKey) -> Option<DateTime<Utc>> {
        self.windows.get(key).map(|w| w.last_seen)
    }

    /// Remove every window whose interval has elapsed. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows.retain(|_, window| now <= window.closes_at());
        before.saturating_sub(self.windows.len())
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter() -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (RateLimiter::new(clock.clone()), clock)
    }

    fn key(caller: &str) -> RateKey {
        RateKey::new(caller, Arc::from("POST /auth/login"))
    }

    #[test]
    fn test_sixth_attempt_is_rejected() {
        let (limiter, clock) = limiter();
        let policy = RateLimitPolicy::new(5, Duration::minutes(15));
        let k = key("10.0.0.1");

        for _ in 0..5 {
            assert!(limiter.attempt(&k, &policy).is_ok());
            clock.advance(Duration::seconds(10));
        }

        let err = limiter.attempt(&k, &policy).unwrap_err();
        assert!(matches!(err, DispatchError::RateLimited(ref m) if m == DEFAULT_MESSAGE));
        // The rejected attempt still counts.
        assert_eq!(limiter.attempts(&k), Some(6));
    }

    #[test]
    fn test_window_expiry_resets_count() {
        let (limiter, clock) = limiter();
        let policy = RateLimitPolicy::new(2, Duration::minutes(15));
        let k = key("10.0.0.1");

        limiter.attempt(&k, &policy).unwrap();
        limiter.attempt(&k, &policy).unwrap();
        assert!(limiter.attempt(&k, &policy).is_err());

        clock.advance(Duration::minutes(16));
        assert!(limiter.attempt(&k, &policy).is_ok());
        assert_eq!(limiter.attempts(&k), Some(1));
    }

    #[test]
    fn test_reset_starts_fresh_window() {
        let (limiter, _) = limiter();
        let policy = RateLimitPolicy::new(1, Duration::minutes(15)).message("slow down");
        let k = key("10.0.0.1");

        limiter.attempt(&k, &policy).unwrap();
        assert!(matches!(
            limiter.attempt(&k, &policy),
            Err(DispatchError::RateLimited(ref m)) if m == "slow down"
        ));

        limiter.reset(&k);
        assert!(limiter.attempt(&k, &policy).is_ok());
    }

    #[test]
    fn test_keys_are_independent() {
        let (limiter, _) = limiter();
        let policy = RateLimitPolicy::new(1, Duration::minutes(15));

        limiter.attempt(&key("a"), &policy).unwrap();
        assert!(limiter.attempt(&key("b"), &policy).is_ok());

        let other_route = RateKey::new("a", Arc::from("POST /auth/refresh"));
        assert!(limiter.attempt(&other_route, &policy).is_ok());
    }

    #[test]
    fn test_purge_drops_only_elapsed_windows() {
        let (limiter, clock) = limiter();
        let short = RateLimitPolicy::new(5, Duration::minutes(1));
        let long = RateLimitPolicy::new(5, Duration::hours(1));

        limiter.attempt(&key("short"), &short).unwrap();
        limiter.attempt(&key("long"), &long).unwrap();
        clock.advance(Duration::minutes(2));

        assert_eq!(limiter.purge_expired(), 1);
        assert_eq!(limiter.len(), 1);
        assert!(limiter.attempts(&key("long")).is_some());
    }

    #[test]
    fn test_field_key_falls_back_to_ip() {
        use axum::http::Method;

        let source = RateKeySource::Field("value");
        let login = |body: &'static str| {
            RequestContext::builder(Method::POST, "/auth/login")
                .client_ip("10.0.0.1")
                .body(body)
                .build()
        };

        assert_eq!(source.caller(&login(r#"{"value":"alice","password":"x"}"#)), "value:alice");
        assert_eq!(source.caller(&login(r#"{"value":42}"#)), "value:42");
        assert_eq!(source.caller(&login(r#"{"value":"  "}"#)), "10.0.0.1");
        assert_eq!(source.caller(&login(r#"{"other":"alice"}"#)), "10.0.0.1");
        assert_eq!(source.caller(&login("not json")), "10.0.0.1");
        assert_eq!(RateKeySource::ClientIp.caller(&login(r#"{"value":"alice"}"#)), "10.0.0.1");
        assert_eq!(RateKeySource::Subject.caller(&login("")), "10.0.0.1");
    }

    #[test]
    fn test_oversized_window_does_not_overflow() {
        let (limiter, clock) = limiter();
        let config = RateLimitConfig {
            max_attempts: 1,
            window_secs: u64::MAX,
            ..RateLimitConfig::default()
        };
        let policy = RateLimitPolicy::from_config(&config);
        let k = key("10.0.0.1");

        assert!(limiter.attempt(&k, &policy).is_ok());
        clock.advance(Duration::days(365));
        assert!(limiter.attempt(&k, &policy).is_err());
    }

    #[test]
    fn test_concurrent_attempts_are_all_counted() {
        let limiter = Arc::new(RateLimiter::new(Arc::new(ManualClock::default())));
        let policy = RateLimitPolicy::new(1_000, Duration::minutes(15));
        let k = key("10.0.0.1");

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                let policy = policy.clone();
                let k = k.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let _ = limiter.attempt(&k, &policy);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(limiter.attempts(&k), Some(400));
    }
}
