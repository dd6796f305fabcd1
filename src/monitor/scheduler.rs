// src/monitor/scheduler.rs — Polling loop
//
// Runs cycles forever with randomized intervals until Ctrl+C. A captcha
// pushes the next cycle out by the configured backoff.

use std::time::Duration;

use super::cycle::{MonitorCycle, SlotSource};
use crate::infra::config::MonitorConfig;
use crate::slots::Listing;
use crate::util::random_duration_between;

/// Timing knobs for the polling loop.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub interval_min: Duration,
    pub interval_max: Duration,
    pub random_delay_max: Duration,
    pub run_immediately: bool,
    pub captcha_backoff: Duration,
}

impl From<&MonitorConfig> for Schedule {
    fn from(m: &MonitorConfig) -> Self {
        Self {
            interval_min: Duration::from_secs(m.interval_min.saturating_mul(60)),
            interval_max: Duration::from_secs(m.interval_max.saturating_mul(60)),
            random_delay_max: Duration::from_secs(m.random_delay_max),
            run_immediately: m.run_immediately,
            captcha_backoff: Duration::from_secs(m.captcha_backoff_minutes.saturating_mul(60)),
        }
    }
}

impl Schedule {
    /// Regular wait between cycles: interval plus extra jitter.
    pub fn next_wait(&self) -> Duration {
        random_duration_between(self.interval_min, self.interval_max)
            + random_duration_between(Duration::ZERO, self.random_delay_max)
    }
}

/// Run cycles until Ctrl+C.
pub async fn run_forever(
    cycle: &MonitorCycle,
    source: &mut dyn SlotSource,
    listings: &[Listing],
    schedule: &Schedule,
) -> anyhow::Result<()> {
    tracing::info!(
        "Monitoring {} listing(s); interval {}-{} min",
        listings.len(),
        schedule.interval_min.as_secs() / 60,
        schedule.interval_max.as_secs() / 60
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut wait = if schedule.run_immediately {
        Duration::ZERO
    } else {
        schedule.next_wait()
    };
    let mut cycles: u64 = 0;

    loop {
        if !wait.is_zero() {
            tracing::info!("Next cycle in {}", format_wait(wait));
        }
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested; stopping after {} cycle(s)", cycles);
                break;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        cycles += 1;
        let outcome = tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested during cycle {}", cycles);
                break;
            }
            outcome = cycle.run(source, listings) => outcome,
        };

        wait = match outcome {
            Ok(_) => schedule.next_wait(),
            Err(e) if e.is_captcha() => {
                tracing::error!(
                    "Captcha detected; backing off for {}",
                    format_wait(schedule.captcha_backoff)
                );
                schedule.captcha_backoff
            }
            Err(e) => {
                tracing::error!("Cycle {} failed: {}", cycles, e);
                schedule.next_wait()
            }
        };
    }

    Ok(())
}

fn format_wait(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}
