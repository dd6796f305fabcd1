// src/notify/email.rs — SMTP email notifier
//
// Sends one HTML message per listing with new slots through an SMTP
// STARTTLS relay (Gmail by default, using an app password). lettre's SMTP
// transport is blocking, so delivery runs on a blocking thread.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::fmt::Write as _;

use super::Notifier;
use crate::infra::config::{EmailConfig, SiteConfig};
use crate::infra::errors::NotifierError;
use crate::slots::{Listing, SlotRecord};
use crate::util::escape_html;

pub struct EmailNotifier {
    config: EmailConfig,
    site: SiteConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig, site: SiteConfig) -> Self {
        Self { config, site }
    }

    /// Listing page used for the footer link and as the booking fallback.
    pub fn detail_url(&self, listing: &Listing) -> String {
        listing
            .url
            .clone()
            .unwrap_or_else(|| self.site.detail_url(listing.id()))
    }

    fn build_message(
        &self,
        listing: &Listing,
        slots: &[SlotRecord],
    ) -> Result<lettre::Message, NotifierError> {
        use lettre::message::header::ContentType;

        let from = self
            .config
            .sender_email
            .parse::<lettre::message::Mailbox>()
            .map_err(|e| NotifierError::Build(format!("invalid sender address: {e}")))?;
        let to = self
            .config
            .receiver_email
            .parse::<lettre::message::Mailbox>()
            .map_err(|e| NotifierError::Build(format!("invalid receiver address: {e}")))?;

        let body = render_body(listing, &self.detail_url(listing), slots, Local::now());
        lettre::Message::builder()
            .from(from)
            .to(to)
            .subject(subject(listing))
            .header(ContentType::TEXT_HTML)
            .body(body)
            .map_err(|e| NotifierError::Build(e.to_string()))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    async fn notify(&self, listing: &Listing, slots: &[SlotRecord]) -> Result<(), NotifierError> {
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{SmtpTransport, Transport};

        let message = self.build_message(listing, slots)?;
        let host = self.config.smtp_server.clone();
        let port = self.config.smtp_port;
        let creds = Credentials::new(
            self.config.sender_email.clone(),
            self.config.app_password.clone(),
        );

        let code = tokio::task::spawn_blocking(move || {
            let mailer = SmtpTransport::starttls_relay(&host)
                .map_err(|e| NotifierError::Transport(e.to_string()))?
                .port(port)
                .credentials(creds)
                .build();
            mailer
                .send(&message)
                .map(|response| response.code().to_string())
                .map_err(|e| NotifierError::Transport(e.to_string()))
        })
        .await
        .map_err(|e| NotifierError::Transport(format!("send task failed: {e}")))??;

        tracing::info!(
            "Notification for {} sent to {} ({})",
            listing.name,
            self.config.receiver_email,
            code
        );
        Ok(())
    }
}

pub fn subject(listing: &Listing) -> String {
    format!("[slotwatch] {} - New Reservations Available", listing.name)
}

/// `¥15,000`
pub fn format_price(price: Option<u64>) -> String {
    let Some(price) = price else {
        return "N/A".into();
    };
    let digits = price.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("¥{grouped}")
}

/// HTML body listing every new slot. All dynamic content is escaped.
pub fn render_body(
    listing: &Listing,
    detail_url: &str,
    slots: &[SlotRecord],
    timestamp: DateTime<Local>,
) -> String {
    let name = escape_html(&listing.name);
    let detail = escape_html(detail_url);

    let mut rows = String::new();
    for slot in slots {
        let seats = slot
            .party_size
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".into());
        let link = slot.booking_url.as_deref().unwrap_or(detail_url);
        let _ = writeln!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><a href=\"{}\">Book Now</a></td></tr>",
            escape_html(&slot.date_str()),
            escape_html(&slot.time_str()),
            escape_html(&seats),
            escape_html(&format_price(slot.price)),
            escape_html(link),
        );
    }

    format!(
        "<html>\n<body>\n\
         <h2>New Reservations Available: {name}</h2>\n\
         <p>Found {count} new time slot(s):</p>\n\
         <table border=\"1\" cellpadding=\"5\" cellspacing=\"0\">\n\
         <tr><th>Date</th><th>Time</th><th>Seats</th><th>Price</th><th>Action</th></tr>\n\
         {rows}</table>\n\
         <p><a href=\"{detail}\">View Restaurant Page</a></p>\n\
         <p><small>Timestamp: {ts}</small></p>\n\
         </body>\n</html>\n",
        count = slots.len(),
        ts = timestamp.format("%Y-%m-%d %H:%M:%S"),
    )
}
