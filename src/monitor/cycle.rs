// src/monitor/cycle.rs — One pass over every enabled listing
//
// fetch → normalize → diff → notify, sequentially. Failures stay inside
// the listing that produced them, except a fatal AuthError which ends the
// cycle early.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::retry::RetryPolicy;
use crate::detect::ChangeDetector;
use crate::infra::errors::{AuthError, CycleError, SourceError};
use crate::notify::Notifier;
use crate::session::{Credentials, Session, SessionManager};
use crate::slots::normalize::ResponseNormalizer;
use crate::slots::Listing;

/// Where raw availability payloads come from.
#[async_trait]
pub trait SlotSource: Send {
    async fn fetch(&mut self, listing: &Listing) -> Result<Value, SourceError>;
}

/// Production source: the site's API behind an authenticated session.
///
/// The session is established lazily on the first fetch and kept across
/// cycles.
pub struct SessionSource {
    manager: SessionManager,
    credentials: Credentials,
    session: Option<Session>,
}

impl SessionSource {
    pub fn new(manager: SessionManager, credentials: Credentials) -> Self {
        Self {
            manager,
            credentials,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }
}

#[async_trait]
impl SlotSource for SessionSource {
    async fn fetch(&mut self, listing: &Listing) -> Result<Value, SourceError> {
        let current = match self.session.take() {
            Some(s) if !s.is_expired() => s,
            _ => self.manager.ensure_session(&self.credentials).await?,
        };
        let session = self.session.insert(current);
        let result = self
            .manager
            .fetch_authenticated(session, &self.credentials, listing)
            .await;
        if let Err(SourceError::Auth(e)) = &result {
            if e.is_fatal() {
                // Do not reuse a session the site just refused.
                self.session = None;
            }
        }
        result
    }
}

/// Randomized pause between consecutive listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub min: Duration,
    pub max: Duration,
}

impl Pacing {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn next_delay(&self) -> Duration {
        crate::util::random_duration_between(self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingOutcome {
    /// New slots were found. `notified` is false when delivery failed.
    NewSlots { count: usize, notified: bool },
    NoChange,
    /// The listing was skipped this cycle.
    Skipped { reason: String },
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<(String, ListingOutcome)>,
}

impl CycleReport {
    pub fn new_slot_total(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, o)| match o {
                ListingOutcome::NewSlots { count, .. } => *count,
                _ => 0,
            })
            .sum()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, ListingOutcome::Skipped { .. }))
            .count()
    }

    pub fn outcome(&self, listing_id: &str) -> Option<&ListingOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == listing_id)
            .map(|(_, o)| o)
    }
}

pub struct MonitorCycle {
    normalizer: ResponseNormalizer,
    detector: ChangeDetector,
    notifier: Arc<dyn Notifier>,
    retry: RetryPolicy,
    pacing: Pacing,
}

impl MonitorCycle {
    pub fn new(
        normalizer: ResponseNormalizer,
        detector: ChangeDetector,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            normalizer,
            detector,
            notifier,
            retry: RetryPolicy::default(),
            pacing: Pacing::none(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Visit every listing once. Returns `Err` only for a fatal auth
    /// failure, which abandons the listings not yet visited.
    pub async fn run(
        &self,
        source: &mut dyn SlotSource,
        listings: &[Listing],
    ) -> Result<CycleReport, CycleError> {
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(listings.len());
        tracing::info!("Cycle started: {} listing(s)", listings.len());

        for (i, listing) in listings.iter().enumerate() {
            if i > 0 {
                let pause = self.pacing.next_delay();
                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
            }

            match self.check_listing(source, listing).await {
                Ok(outcome) => outcomes.push((listing.id().to_string(), outcome)),
                Err(err) => {
                    tracing::error!(
                        listing = listing.id(),
                        "Aborting cycle after {} of {} listing(s): {}",
                        i,
                        listings.len(),
                        err
                    );
                    return Err(CycleError::Auth(err));
                }
            }
        }

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };
        tracing::info!(
            "Cycle finished: {} new slot(s), {} listing(s) skipped",
            report.new_slot_total(),
            report.skipped()
        );
        Ok(report)
    }

    /// Process one listing. `Err` carries a fatal auth failure only.
    async fn check_listing(
        &self,
        source: &mut dyn SlotSource,
        listing: &Listing,
    ) -> Result<ListingOutcome, AuthError> {
        let payload = match self.fetch_with_retry(source, listing).await {
            Ok(p) => p,
            Err(SourceError::Auth(e)) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(listing = listing.id(), "Fetch failed, skipping: {}", e);
                return Ok(ListingOutcome::Skipped {
                    reason: e.to_string(),
                });
            }
        };

        let records = match self.normalizer.normalize_detailed(listing.id(), &payload) {
            Ok(n) => n.records,
            Err(e) => {
                tracing::warn!(listing = listing.id(), "Unparseable payload, skipping: {}", e);
                return Ok(ListingOutcome::Skipped {
                    reason: e.to_string(),
                });
            }
        };

        let diff = match self.detector.diff(listing.id(), &records) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(listing = listing.id(), "Snapshot unreadable, skipping: {}", e);
                return Ok(ListingOutcome::Skipped {
                    reason: e.to_string(),
                });
            }
        };

        if diff.new.is_empty() {
            tracing::info!(
                listing = listing.id(),
                "No new slots ({} available)",
                records.len()
            );
            return Ok(ListingOutcome::NoChange);
        }

        tracing::info!(
            listing = listing.id(),
            "Found {} new slot(s) for {}",
            diff.new.len(),
            listing.name
        );
        let notified = match self.notifier.notify(listing, &diff.new).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    listing = listing.id(),
                    notifier = self.notifier.name(),
                    "Notification failed: {}",
                    e
                );
                false
            }
        };

        Ok(ListingOutcome::NewSlots {
            count: diff.new.len(),
            notified,
        })
    }

    async fn fetch_with_retry(
        &self,
        source: &mut dyn SlotSource,
        listing: &Listing,
    ) -> Result<Value, SourceError> {
        let mut attempt = 0;
        loop {
            match source.fetch(listing).await {
                Ok(payload) => return Ok(payload),
                Err(e) if self.retry.should_retry(attempt, &e) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        listing = listing.id(),
                        attempt = attempt + 1,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after error: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_totals() {
        let report = CycleReport {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            outcomes: vec![
                ("a".into(), ListingOutcome::NewSlots { count: 2, notified: true }),
                ("b".into(), ListingOutcome::NoChange),
                ("c".into(), ListingOutcome::Skipped { reason: "x".into() }),
                ("d".into(), ListingOutcome::NewSlots { count: 1, notified: false }),
            ],
        };
        assert_eq!(report.new_slot_total(), 3);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.outcome("b"), Some(&ListingOutcome::NoChange));
        assert!(report.outcome("zzz").is_none());
    }

    #[test]
    fn test_pacing_bounds() {
        let p = Pacing::new(Duration::from_millis(10), Duration::from_millis(20));
        for _ in 0..20 {
            let d = p.next_delay();
            assert!(d >= p.min && d <= p.max);
        }
        assert_eq!(Pacing::none().next_delay(), Duration::ZERO);
    }
}
