//! Action Rate Limiting
//!
//! Token buckets keyed by sender and action kind. Time is measured in host
//! ticks so that limits behave the same at any wall-clock speed.

use std::collections::BTreeMap;

use crate::game::player::PlayerId;
use super::ActionKind;

/// Bucket shape: capacity and ticks per refilled token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BucketSpec {
    /// Maximum stored tokens
    pub capacity: u32,
    /// Ticks needed to regain one token
    pub refill_ticks: u32,
}

/// A single token bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenBucket {
    spec: BucketSpec,
    tokens: u32,
    last_refill: u32,
}

impl TokenBucket {
    /// A full bucket as of tick `now`.
    pub fn new(spec: BucketSpec, now: u32) -> Self {
        Self {
            spec,
            tokens: spec.capacity,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: u32) {
        if self.spec.refill_ticks == 0 {
            self.tokens = self.spec.capacity;
            self.last_refill = now;
            return;
        }
        let elapsed = now.saturating_sub(self.last_refill);
        let gained = elapsed / self.spec.refill_ticks;
        if gained == 0 {
            return;
        }
        self.tokens = self.tokens.saturating_add(gained).min(self.spec.capacity);
        if self.tokens == self.spec.capacity {
            self.last_refill = now;
        } else {
            self.last_refill += gained * self.spec.refill_ticks;
        }
    }

    /// Take a token at tick `now`. Returns `false` when the bucket is empty.
    pub fn try_take(&mut self, now: u32) -> bool {
        self.refill(now);
        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }

    /// Tokens available at tick `now`.
    pub fn level(&mut self, now: u32) -> u32 {
        self.refill(now);
        self.tokens
    }
}

/// Buckets for every sender and limited kind.
#[derive(Clone, Debug, Default)]
pub struct RateLimiter {
    buckets: BTreeMap<(PlayerId, ActionKind), TokenBucket>,
}

impl RateLimiter {
    /// Create an empty limiter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Charge one `kind` action from `by` at tick `now`. Kinds without a limit
    /// always pass.
    pub fn check(&mut self, by: PlayerId, kind: ActionKind, now: u32) -> bool {
        let Some(spec) = kind.rate_limit() else {
            return true;
        };
        self.buckets
            .entry((by, kind))
            .or_insert_with(|| TokenBucket::new(spec, now))
            .try_take(now)
    }

    /// Tokens left for `by` and `kind`; `None` for unlimited kinds.
    pub fn level(&mut self, by: PlayerId, kind: ActionKind, now: u32) -> Option<u32> {
        let spec = kind.rate_limit()?;
        Some(
            self.buckets
                .entry((by, kind))
                .or_insert_with(|| TokenBucket::new(spec, now))
                .level(now),
        )
    }

    /// Drop every bucket of a departed player.
    pub fn forget(&mut self, by: PlayerId) {
        self.buckets.retain(|(id, _), _| *id != by);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_drop() {
        let mut limiter = RateLimiter::new();
        let passed = (0..10).filter(|_| limiter.check(1, ActionKind::Chat, 100)).count();
        assert_eq!(passed, 4);
        assert_eq!(limiter.level(1, ActionKind::Chat, 100), Some(0));
        // Other senders have their own bucket.
        assert!(limiter.check(2, ActionKind::Chat, 100));
    }

    #[test]
    fn test_refill_over_time() {
        let mut limiter = RateLimiter::new();
        for _ in 0..4 {
            assert!(limiter.check(1, ActionKind::Chat, 0));
        }
        assert!(!limiter.check(1, ActionKind::Chat, 119));
        assert!(limiter.check(1, ActionKind::Chat, 120));
        assert_eq!(limiter.level(1, ActionKind::Chat, 10_000), Some(4));
    }

    #[test]
    fn test_unlimited_kinds_pass() {
        let mut limiter = RateLimiter::new();
        assert!((0..1000).all(|_| limiter.check(1, ActionKind::PlayerInput, 0)));
        assert_eq!(limiter.level(1, ActionKind::PlayerInput, 0), None);
    }

    #[test]
    fn test_forget_resets() {
        let mut limiter = RateLimiter::new();
        while limiter.check(3, ActionKind::SetAvatar, 0) {}
        limiter.forget(3);
        assert_eq!(limiter.level(3, ActionKind::SetAvatar, 0), Some(2));
    }
}
