// src/notify/log.rs — Notifier that only writes to the log (dry runs)

use async_trait::async_trait;

use super::Notifier;
use crate::infra::errors::NotifierError;
use crate::slots::{Listing, SlotRecord};

#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, listing: &Listing, slots: &[SlotRecord]) -> Result<(), NotifierError> {
        tracing::info!("[dry-run] {} new slot(s) for {}", slots.len(), listing.name);
        for slot in slots {
            let party = slot
                .party_size
                .map(|p| p.to_string())
                .unwrap_or_else(|| "?".into());
            tracing::info!("  {} {} seats={}", slot.date_str(), slot.time_str(), party);
        }
        Ok(())
    }
}
