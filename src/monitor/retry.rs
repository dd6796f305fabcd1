// src/monitor/retry.rs — Exponential backoff for transient fetch failures
//
// Retries: network errors, throttling (429), server errors (5xx), and
// network failures while logging in.
// Does NOT retry: login required, captcha, bad payloads, rejected credentials.

use std::time::Duration;

use crate::infra::errors::{AuthError, SourceError};

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_DELAY_MS: u64 = 1_000;
const BACKOFF_FACTOR: f64 = 2.0;
const MAX_DELAY_MS: u64 = 30_000;
const JITTER_FRACTION: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(INITIAL_DELAY_MS),
            backoff_factor: BACKOFF_FACTOR,
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            jitter_fraction: JITTER_FRACTION,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// `attempts` tries with no waiting in between.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            max_attempts: attempts.max(1),
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter_fraction: 0.0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_factor.powi(attempt as i32);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);
        let jitter = deterministic_jitter(attempt, self.jitter_fraction);
        Duration::from_millis((capped_ms * jitter).max(0.0) as u64)
    }

    /// Whether a failure on 0-indexed `attempt` should be tried again.
    pub fn should_retry(&self, attempt: u32, error: &SourceError) -> bool {
        attempt + 1 < self.max_attempts && is_transient(error)
    }
}

pub fn is_transient(error: &SourceError) -> bool {
    match error {
        SourceError::Fetch(e) => e.is_retriable(),
        SourceError::Auth(AuthError::NetworkFailure(_)) => true,
        SourceError::Auth(_) => false,
    }
}

/// Multiplier in [1 - fraction, 1 + fraction], stable per attempt.
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    let hash = (attempt.wrapping_mul(2654435761)) as f64 / u32::MAX as f64;
    1.0 + fraction * (2.0 * hash - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::errors::FetchError;

    #[test]
    fn test_delay_exponential() {
        let p = RetryPolicy::default();
        let d0 = p.delay_for_attempt(0).as_millis();
        let d1 = p.delay_for_attempt(1).as_millis();
        let d2 = p.delay_for_attempt(2).as_millis();
        assert!((800..=1200).contains(&d0), "{d0}");
        assert!((1600..=2400).contains(&d1), "{d1}");
        assert!((3200..=4800).contains(&d2), "{d2}");
    }

    #[test]
    fn test_delay_capped() {
        let p = RetryPolicy::default();
        assert!(p.delay_for_attempt(20).as_millis() <= 36_000);
    }

    #[test]
    fn test_immediate_has_no_delay() {
        let p = RetryPolicy::immediate(3);
        assert_eq!(p.delay_for_attempt(2), Duration::ZERO);
    }

    #[test]
    fn test_transient_classification() {
        let net: SourceError = FetchError::Network {
            url: "u".into(),
            message: "reset".into(),
        }
        .into();
        assert!(is_transient(&net));
        let s502: SourceError = FetchError::Status {
            status: 502,
            url: "u".into(),
        }
        .into();
        assert!(is_transient(&s502));
        assert!(is_transient(&AuthError::NetworkFailure("x".into()).into()));

        assert!(!is_transient(&FetchError::LoginRequired.into()));
        assert!(!is_transient(&FetchError::InvalidPayload("x".into()).into()));
        assert!(!is_transient(&AuthError::CaptchaDetected.into()));
    }

    #[test]
    fn test_should_retry_respects_budget() {
        let p = RetryPolicy::default();
        let err: SourceError = FetchError::Status {
            status: 503,
            url: "u".into(),
        }
        .into();
        assert!(p.should_retry(0, &err));
        assert!(p.should_retry(1, &err));
        assert!(!p.should_retry(2, &err));
        assert!(!RetryPolicy::none().should_retry(0, &err));
    }
}
