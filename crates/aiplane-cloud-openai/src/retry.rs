//! Retry policy with exponential backoff, jitter and `Retry-After` support.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Retry behaviour for retryable failures (429, 5xx, connect/timeout).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    #[serde(with = "millis")]
    pub base_delay: Duration,
    pub factor: f64,
    #[serde(with = "millis")]
    pub max_delay: Duration,
    /// Apply +/- 50% random jitter to computed delays
    pub jitter: bool,
    /// Ceiling for a server-requested `Retry-After` wait
    #[serde(with = "millis")]
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            factor: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: true,
            max_retry_after: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let scale = self.factor.powi(retry.min(i32::MAX as u32) as i32);
        let seconds = (self.base_delay.as_secs_f64() * scale).min(self.max_delay.as_secs_f64());
        let delay = Duration::from_secs_f64(seconds.max(0.0));

        if !self.jitter {
            return delay;
        }
        let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
        let random_offset = fastrand::u64(0..=(jitter_ms * 2));
        let total_ms = delay.as_millis() as i64 + (random_offset as i64 - jitter_ms as i64);
        Duration::from_millis(total_ms.max(0) as u64)
    }

    /// Delay before retry number `retry`. A server-provided `Retry-After`
    /// is a floor, capped at `max_retry_after`.
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.backoff(retry);
        match retry_after {
            Some(floor) => backoff.max(floor.min(self.max_retry_after)),
            None => backoff,
        }
    }
}

/// Read the server's requested wait from `retry-after-ms` or `retry-after`
/// (delta seconds or an HTTP-date). Header names must be lowercase.
pub fn parse_retry_after(headers: &BTreeMap<String, String>, now: DateTime<Utc>) -> Option<Duration> {
    if let Some(ms) = headers.get("retry-after-ms") {
        if let Some(wait) = ms
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|ms| Duration::try_from_secs_f64(ms / 1000.0).ok())
        {
            return Some(wait);
        }
    }

    let value = headers.get("retry-after")?.trim();
    if let Ok(secs) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).ok();
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy {
            jitter: false,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            ..Default::default()
        };
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_within_half() {
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(1000),
            ..Default::default()
        };
        for _ in 0..50 {
            let delay = policy.backoff(0);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn test_retry_after_is_a_floor() {
        let policy = RetryPolicy {
            jitter: false,
            ..Default::default()
        };
        assert_eq!(
            policy.delay_for(0, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
        assert_eq!(
            policy.delay_for(6, Some(Duration::from_secs(2))),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_parse_retry_after_forms() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 50).unwrap();

        assert_eq!(
            parse_retry_after(&headers(&[("retry-after", "2")]), now),
            Some(Duration::from_secs(2))
        );
        assert_eq!(
            parse_retry_after(&headers(&[("retry-after-ms", "250")]), now),
            Some(Duration::from_millis(250))
        );
        assert_eq!(
            parse_retry_after(
                &headers(&[("retry-after", "Wed, 21 Oct 2015 07:28:00 GMT")]),
                now
            ),
            Some(Duration::from_secs(10))
        );
        assert_eq!(parse_retry_after(&headers(&[("retry-after", "soon")]), now), None);
        assert_eq!(parse_retry_after(&headers(&[]), now), None);
    }

    #[test]
    fn test_oversized_retry_after_is_ignored_or_capped() {
        let now = Utc::now();
        assert_eq!(parse_retry_after(&headers(&[("retry-after", "1e30")]), now), None);
        assert_eq!(parse_retry_after(&headers(&[("retry-after-ms", "1e30")]), now), None);
        assert_eq!(parse_retry_after(&headers(&[("retry-after", "-3")]), now), None);
        assert_eq!(parse_retry_after(&headers(&[("retry-after", "NaN")]), now), None);

        let policy = RetryPolicy {
            jitter: false,
            ..Default::default()
        };
        let year = parse_retry_after(&headers(&[("retry-after", "31536000")]), now);
        assert_eq!(policy.delay_for(0, year), Duration::from_secs(120));
    }

    #[test]
    fn test_date_in_the_past_means_no_wait() {
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            parse_retry_after(
                &headers(&[("retry-after", "Wed, 21 Oct 2015 07:28:00 GMT")]),
                now
            ),
            Some(Duration::ZERO)
        );
    }
}
