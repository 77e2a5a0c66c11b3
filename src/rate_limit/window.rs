//! Quota window learned from document source response headers.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Header names carrying the request budget, checked in order.
const LIMIT_HEADERS: &[&str] = &["ratelimit-limit", "x-ratelimit-limit"];
const REMAINING_HEADERS: &[&str] = &["ratelimit-remaining", "x-ratelimit-remaining"];
const RESET_HEADERS: &[&str] = &["ratelimit-reset", "x-ratelimit-reset"];

/// Most recently advertised request budget.
///
/// A window with unknown `limit` or `remaining` never delays anyone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaWindow {
    pub limit: Option<u64>,
    pub remaining: Option<u64>,
    pub reset_at: Option<Instant>,
}

impl QuotaWindow {
    /// Parse quota signals from response headers.
    ///
    /// Returns `None` when the response carries no quota information at all,
    /// in which case the previous window stays in effect.
    pub fn from_headers(headers: &HashMap<String, String>, now: Instant) -> Option<Self> {
        let limit = header_u64(headers, LIMIT_HEADERS);
        let remaining = header_u64(headers, REMAINING_HEADERS);
        let reset_secs = header_u64(headers, RESET_HEADERS);

        if limit.is_none() && remaining.is_none() && reset_secs.is_none() {
            return None;
        }

        Some(Self {
            limit,
            remaining,
            // A reset too far out to represent is treated as unknown.
            reset_at: reset_secs.and_then(|secs| now.checked_add(Duration::from_secs(secs))),
        })
    }

    /// Remaining capacity as a percentage of the limit.
    pub fn capacity_left_pct(&self) -> Option<f64> {
        match (self.limit, self.remaining) {
            (Some(limit), Some(remaining)) if limit > 0 => {
                Some(remaining as f64 / limit as f64 * 100.0)
            }
            _ => None,
        }
    }

    /// How long a caller must wait before issuing the next request.
    pub fn delay_at(&self, now: Instant, threshold_pct: f64, buffer: Duration) -> Duration {
        if threshold_pct <= 0.0 {
            return Duration::ZERO;
        }
        let Some(capacity) = self.capacity_left_pct() else {
            return Duration::ZERO;
        };
        if capacity > threshold_pct {
            return Duration::ZERO;
        }

        let until_reset = self
            .reset_at
            .map(|reset| reset.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);
        until_reset.saturating_add(buffer)
    }
}

fn header_u64(headers: &HashMap<String, String>, names: &[&str]) -> Option<u64> {
    names.iter().find_map(|name| {
        headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, value)| value.trim().parse::<u64>().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_headers_none_without_quota() {
        let h = headers(&[("content-type", "application/json")]);
        assert!(QuotaWindow::from_headers(&h, Instant::now()).is_none());
    }

    #[test]
    fn test_from_headers_case_insensitive() {
        let now = Instant::now();
        let h = headers(&[
            ("RateLimit-Limit", "100"),
            ("RateLimit-Remaining", "40"),
            ("RateLimit-Reset", "12"),
        ]);
        let window = QuotaWindow::from_headers(&h, now).unwrap();
        assert_eq!(window.limit, Some(100));
        assert_eq!(window.remaining, Some(40));
        assert_eq!(window.reset_at, Some(now + Duration::from_secs(12)));
    }

    #[test]
    fn test_x_prefixed_headers() {
        let h = headers(&[("x-ratelimit-limit", "10"), ("x-ratelimit-remaining", "1")]);
        let window = QuotaWindow::from_headers(&h, Instant::now()).unwrap();
        assert_eq!(window.capacity_left_pct(), Some(10.0));
    }

    #[test]
    fn test_unrepresentable_reset_is_unknown() {
        let max = u64::MAX.to_string();
        let h = headers(&[
            ("ratelimit-limit", "100"),
            ("ratelimit-remaining", "1"),
            ("ratelimit-reset", max.as_str()),
        ]);
        let now = Instant::now();
        let window = QuotaWindow::from_headers(&h, now).unwrap();
        assert_eq!(window.reset_at, None);
        assert_eq!(window.remaining, Some(1));
        assert_eq!(
            window.delay_at(now, 10.0, Duration::from_secs(5)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_unknown_window_never_delays() {
        let window = QuotaWindow::default();
        assert_eq!(
            window.delay_at(Instant::now(), 10.0, Duration::from_secs(5)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_zero_limit_treated_as_unknown() {
        let window = QuotaWindow {
            limit: Some(0),
            remaining: Some(0),
            reset_at: None,
        };
        assert_eq!(window.capacity_left_pct(), None);
    }

    #[test]
    fn test_at_threshold_delays() {
        let now = Instant::now();
        let window = QuotaWindow {
            limit: Some(100),
            remaining: Some(10),
            reset_at: Some(now + Duration::from_secs(20)),
        };
        assert_eq!(
            window.delay_at(now, 10.0, Duration::from_secs(5)),
            Duration::from_secs(25)
        );
    }

    #[test]
    fn test_past_reset_only_waits_buffer() {
        let now = Instant::now();
        let window = QuotaWindow {
            limit: Some(100),
            remaining: Some(0),
            reset_at: Some(now),
        };
        let later = now + Duration::from_secs(30);
        assert_eq!(
            window.delay_at(later, 10.0, Duration::from_secs(5)),
            Duration::from_secs(5)
        );
    }
}
