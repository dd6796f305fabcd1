// src/notify/mod.rs — Notification sinks for newly found slots

pub mod email;
pub mod log;

use async_trait::async_trait;

use crate::infra::errors::NotifierError;
use crate::slots::{Listing, SlotRecord};

pub use email::EmailNotifier;
pub use log::LogNotifier;

/// Delivers new-slot alerts. Failures are logged by the caller and never
/// roll back the snapshot.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, listing: &Listing, slots: &[SlotRecord]) -> Result<(), NotifierError>;
}
