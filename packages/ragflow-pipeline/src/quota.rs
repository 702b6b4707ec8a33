//! Per-user daily usage ceiling (spec.md §4.10), grounded in
//! `kubechat/chat/websocket/base_consumer.py::manage_quota_usage`: a
//! per-user counter checked before streaming and incremented only on
//! success, auto-expiring at local midnight. The source keys this in Redis
//! with an `expireat` set to 23:59:59 local time; this workspace has no
//! Redis in its dependency stack, so the counter is an in-process
//! `DashMap` keyed by user, each entry carrying its own expiry instant —
//! functionally equivalent for a single-process deployment, recorded as a
//! deliberate substitution in DESIGN.md.

use chrono::{Local, NaiveTime, TimeZone};
use dashmap::DashMap;

/// Tracks how many turns each user has consumed today against a configured
/// daily ceiling.
#[derive(Default)]
pub struct QuotaTracker {
    counters: DashMap<String, Counter>,
}

struct Counter {
    count: u32,
    expires_at: chrono::DateTime<Local>,
}

impl QuotaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `user` has remaining quota against `daily_quota`. A `None`
    /// quota disables the check entirely.
    pub fn has_remaining(&self, user: &str, daily_quota: Option<u32>) -> bool {
        let Some(quota) = daily_quota else { return true };
        match self.counters.get(user) {
            Some(counter) if counter.expires_at > now() => counter.count < quota,
            _ => true,
        }
    }

    /// Record one successful turn for `user`, resetting the counter first if
    /// its expiry has passed.
    pub fn record_usage(&self, user: &str) {
        let now = now();
        let mut entry = self.counters.entry(user.to_string()).or_insert_with(|| Counter {
            count: 0,
            expires_at: next_local_midnight(now),
        });
        if entry.expires_at <= now {
            entry.count = 0;
            entry.expires_at = next_local_midnight(now);
        }
        entry.count += 1;
    }
}

fn now() -> chrono::DateTime<Local> {
    Local::now()
}

fn next_local_midnight(from: chrono::DateTime<Local>) -> chrono::DateTime<Local> {
    let next_day = from.date_naive().succ_opt().unwrap_or(from.date_naive());
    Local
        .from_local_datetime(&next_day.and_time(NaiveTime::MIN))
        .single()
        .unwrap_or(from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_quota_always_has_remaining() {
        let tracker = QuotaTracker::new();
        assert!(tracker.has_remaining("u1", None));
        for _ in 0..100 {
            tracker.record_usage("u1");
        }
        assert!(tracker.has_remaining("u1", None));
    }

    #[test]
    fn exhausting_quota_blocks_further_usage() {
        let tracker = QuotaTracker::new();
        tracker.record_usage("u1");
        tracker.record_usage("u1");
        assert!(!tracker.has_remaining("u1", Some(2)));
        assert!(tracker.has_remaining("u2", Some(2)));
    }

    #[test]
    fn users_are_tracked_independently() {
        let tracker = QuotaTracker::new();
        tracker.record_usage("u1");
        assert!(tracker.has_remaining("u1", Some(1)));
        assert!(!{
            tracker.record_usage("u1");
            tracker.has_remaining("u1", Some(1))
        });
        assert!(tracker.has_remaining("u2", Some(1)));
    }
}
