//! Placement rate-limit policy hook.
//!
//! The pixel entity consults a [`PlacementPolicy`] before every mutation. The
//! default policy permits everything; enabling `rate_limit` in configuration
//! swaps in [`CooldownPolicy`] without touching the entity.

use crate::config::RateLimitConfig;
use chrono::{DateTime, Duration, Utc};
use pixelplace_types::Placement;
use std::collections::HashSet;
use std::sync::Arc;

/// Pure predicate over a coordinate's retained history.
pub trait PlacementPolicy: Send + Sync {
    fn permits(&self, user_id: &str, history: &[Placement], now: DateTime<Utc>) -> bool;
}

/// Always permits.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PlacementPolicy for AllowAll {
    fn permits(&self, _user_id: &str, _history: &[Placement], _now: DateTime<Utc>) -> bool {
        true
    }
}

/// At most `max_per_period` placements by one user within `cooldown`.
#[derive(Debug, Clone)]
pub struct CooldownPolicy {
    max_per_period: usize,
    cooldown: Duration,
    bypass: HashSet<String>,
}

impl CooldownPolicy {
    pub fn new(max_per_period: usize, cooldown: Duration) -> Self {
        Self {
            max_per_period,
            cooldown,
            bypass: HashSet::new(),
        }
    }

    pub fn with_bypass<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bypass.extend(users.into_iter().map(Into::into));
        self
    }
}

impl PlacementPolicy for CooldownPolicy {
    fn permits(&self, user_id: &str, history: &[Placement], now: DateTime<Utc>) -> bool {
        if self.bypass.contains(user_id) {
            return true;
        }
        let cutoff = now - self.cooldown;
        let recent = history
            .iter()
            .filter(|p| p.user_id == user_id && p.placed_at > cutoff)
            .count();
        recent < self.max_per_period
    }
}

/// Build the policy selected by configuration.
pub fn policy_from_config(config: &RateLimitConfig) -> Arc<dyn PlacementPolicy> {
    if !config.enabled {
        return Arc::new(AllowAll);
    }
    Arc::new(
        CooldownPolicy::new(
            config.max_pixels_per_period,
            Duration::minutes(config.cooldown_minutes),
        )
        .with_bypass(config.bypass_users.iter().cloned()),
    )
}
