// src/cli/run.rs — `run` and `once`: wire config into the monitoring pipeline

use anyhow::bail;
use std::sync::Arc;
use std::time::Duration;

use crate::detect::store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
use crate::detect::ChangeDetector;
use crate::infra::config::Config;
use crate::infra::paths;
use crate::monitor::{run_forever, MonitorCycle, Pacing, Schedule, SessionSource};
use crate::notify::{EmailNotifier, LogNotifier, Notifier};
use crate::session::store::SessionStore;
use crate::session::{Credentials, SessionManager};
use crate::slots::normalize::ResponseNormalizer;

/// Fail with every configuration problem listed.
pub fn ensure_valid(config: &Config, dry_run: bool) -> anyhow::Result<()> {
    let errors = config.validate(!dry_run);
    if errors.is_empty() {
        return Ok(());
    }
    for e in &errors {
        tracing::error!("config: {}", e);
    }
    bail!("invalid configuration ({} problem(s))", errors.len())
}

pub fn build_notifier(config: &Config, dry_run: bool) -> anyhow::Result<Arc<dyn Notifier>> {
    if dry_run {
        return Ok(Arc::new(LogNotifier));
    }
    match &config.notification.email {
        Some(email) => Ok(Arc::new(EmailNotifier::new(
            email.clone(),
            config.site.clone(),
        ))),
        None => bail!("no notifier configured; add [notification.email] or use --dry-run"),
    }
}

pub fn build_cycle(config: &Config, dry_run: bool) -> anyhow::Result<MonitorCycle> {
    let store: Arc<dyn SnapshotStore> = if dry_run {
        Arc::new(MemorySnapshotStore::new())
    } else {
        Arc::new(FileSnapshotStore::new(paths::snapshots_dir()))
    };
    let m = &config.monitor;
    let pacing = Pacing::new(
        Duration::from_secs(m.listing_delay_min_secs),
        Duration::from_secs(m.listing_delay_max_secs),
    );
    Ok(MonitorCycle::new(
        ResponseNormalizer::new(m.missing_fields),
        ChangeDetector::new(store),
        build_notifier(config, dry_run)?,
    )
    .with_pacing(pacing))
}

pub fn build_session_manager(config: &Config) -> anyhow::Result<SessionManager> {
    SessionManager::new(config.site.clone(), SessionStore::new(paths::session_file_path()))
}

fn build_source(config: &Config) -> anyhow::Result<SessionSource> {
    Ok(SessionSource::new(
        build_session_manager(config)?,
        Credentials::from(&config.account),
    ))
}

pub async fn run_monitor(config: &Config, dry_run: bool) -> anyhow::Result<()> {
    ensure_valid(config, dry_run)?;
    paths::ensure_dirs().await?;

    let cycle = build_cycle(config, dry_run)?;
    let mut source = build_source(config)?;
    let listings = config.enabled_listings();
    let schedule = Schedule::from(&config.monitor);

    if dry_run {
        println!("Dry run: notifications are logged and snapshots are not saved.");
    }
    println!("Monitoring {} listing(s). Press Ctrl+C to stop.", listings.len());
    run_forever(&cycle, &mut source, &listings, &schedule).await
}

pub async fn run_once(config: &Config, dry_run: bool) -> anyhow::Result<()> {
    ensure_valid(config, dry_run)?;
    paths::ensure_dirs().await?;

    let cycle = build_cycle(config, dry_run)?;
    let mut source = build_source(config)?;
    let listings = config.enabled_listings();

    let report = cycle.run(&mut source, &listings).await?;
    for (id, outcome) in &report.outcomes {
        println!("  {id}: {outcome:?}");
    }
    println!(
        "{} new slot(s) across {} listing(s) in {}s",
        report.new_slot_total(),
        report.outcomes.len(),
        (report.finished_at - report.started_at).num_seconds()
    );
    Ok(())
}
