// src/cli/notify_test.rs — `notify-test`: send a sample alert

use anyhow::bail;
use chrono::{Local, NaiveTime};

use super::run::build_notifier;
use crate::infra::config::Config;
use crate::slots::{Listing, SlotRecord};

pub async fn run_notify_test(config: &Config, dry_run: bool) -> anyhow::Result<()> {
    if !dry_run {
        let errors: Vec<String> = config
            .validate(true)
            .into_iter()
            .filter(|e| e.contains("notification"))
            .collect();
        if !errors.is_empty() {
            bail!("{}", errors.join("; "));
        }
    }

    let notifier = build_notifier(config, dry_run)?;
    let listing = config
        .enabled_listings()
        .into_iter()
        .next()
        .unwrap_or_else(|| Listing::new("Test Restaurant", "test"));

    let tomorrow = Local::now().date_naive() + chrono::Days::new(1);
    let sample: Vec<SlotRecord> = [(18, 0), (20, 30)]
        .into_iter()
        .filter_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0))
        .map(|t| SlotRecord::new(listing.id(), tomorrow, t, Some(2)).with_price(Some(15000)))
        .collect();

    notifier.notify(&listing, &sample).await?;
    println!("Test notification sent via {}", notifier.name());
    Ok(())
}
