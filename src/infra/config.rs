// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::infra::paths;
use crate::slots::normalize::MissingFieldPolicy;
use crate::slots::Listing;

/// Upper bounds that keep durations derived from the config in range.
const MAX_INTERVAL_MINUTES: u64 = 24 * 60;
const MAX_DELAY_SECS: u64 = 60 * 60;
const MAX_CAPTCHA_BACKOFF_MINUTES: u64 = 7 * 24 * 60;
const MAX_SESSION_TTL_HOURS: i64 = 365 * 24;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub site: SiteConfig,

    #[serde(default)]
    pub account: AccountConfig,

    #[serde(default)]
    pub listings: Vec<Listing>,

    #[serde(default)]
    pub notification: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Minutes between cycles (lower bound).
    pub interval_min: u64,
    /// Minutes between cycles (upper bound).
    pub interval_max: u64,
    /// Extra random delay in seconds added to every interval.
    pub random_delay_max: u64,
    pub run_immediately: bool,
    pub listing_delay_min_secs: u64,
    pub listing_delay_max_secs: u64,
    pub captcha_backoff_minutes: u64,
    pub missing_fields: MissingFieldPolicy,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_min: 5,
            interval_max: 10,
            random_delay_max: 120,
            run_immediately: true,
            listing_delay_min_secs: 2,
            listing_delay_max_secs: 5,
            captcha_backoff_minutes: 60,
            missing_fields: MissingFieldPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub login_path: String,
    /// API path template; `{slug}` is replaced by the listing slug.
    pub api_path: String,
    /// Human-facing listing page; `{slug}` is replaced by the listing slug.
    pub detail_path: String,
    pub timeout_secs: u64,
    pub session_ttl_hours: i64,
    pub user_agent: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://omakase.in".into(),
            login_path: "/users/sign_in".into(),
            api_path: "/api/v1/omakase/r/{slug}/online_stock_groups".into(),
            detail_path: "/ja/r/{slug}".into(),
            timeout_secs: 30,
            session_ttl_hours: 24 * 14,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36"
                .into(),
        }
    }
}

impl SiteConfig {
    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Session lifetime, clamped to the range `validate` accepts.
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours.clamp(1, MAX_SESSION_TTL_HOURS))
    }

    pub fn login_url(&self) -> String {
        format!("{}{}", self.base(), self.login_path)
    }

    pub fn api_url(&self, slug: &str) -> String {
        format!("{}{}", self.base(), self.api_path.replace("{slug}", slug))
    }

    pub fn detail_url(&self, slug: &str) -> String {
        format!("{}{}", self.base(), self.detail_path.replace("{slug}", slug))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub email: Option<EmailConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_smtp_server")]
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub sender_email: String,
    pub receiver_email: String,
    /// Usually supplied through SLOTWATCH_SMTP_PASSWORD instead.
    #[serde(default)]
    pub app_password: String,
}

fn default_smtp_server() -> String {
    "smtp.gmail.com".into()
}

fn default_smtp_port() -> u16 {
    587
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            let mut config = Self::default();
            config.apply_env();
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env();
        tracing::debug!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Secrets may live in the environment rather than the file.
    fn apply_env(&mut self) {
        if let Ok(pw) = std::env::var("SLOTWATCH_PASSWORD") {
            if !pw.is_empty() {
                self.account.password = pw;
            }
        }
        if let Ok(pw) = std::env::var("SLOTWATCH_SMTP_PASSWORD") {
            if let Some(email) = self.notification.email.as_mut() {
                if !pw.is_empty() {
                    email.app_password = pw;
                }
            }
        }
    }

    pub fn enabled_listings(&self) -> Vec<Listing> {
        self.listings.iter().filter(|l| l.enabled).cloned().collect()
    }

    /// Return every configuration problem found (empty when valid).
    ///
    /// `require_notifier` is false for dry runs, where no email is sent.
    pub fn validate(&self, require_notifier: bool) -> Vec<String> {
        let mut errors = Vec::new();

        let m = &self.monitor;
        if m.interval_min < 1 {
            errors.push("monitor.interval_min must be at least 1 minute".to_string());
        }
        if m.interval_max < m.interval_min {
            errors.push("monitor.interval_max must be >= interval_min".to_string());
        }
        if m.interval_max > MAX_INTERVAL_MINUTES {
            errors.push(format!(
                "monitor.interval_max must be at most {MAX_INTERVAL_MINUTES} minutes"
            ));
        }
        if m.random_delay_max > MAX_DELAY_SECS {
            errors.push(format!(
                "monitor.random_delay_max must be at most {MAX_DELAY_SECS} seconds"
            ));
        }
        if m.listing_delay_max_secs > MAX_DELAY_SECS {
            errors.push(format!(
                "monitor.listing_delay_max_secs must be at most {MAX_DELAY_SECS} seconds"
            ));
        }
        if m.captcha_backoff_minutes > MAX_CAPTCHA_BACKOFF_MINUTES {
            errors.push(format!(
                "monitor.captcha_backoff_minutes must be at most {MAX_CAPTCHA_BACKOFF_MINUTES}"
            ));
        }
        if m.listing_delay_max_secs < m.listing_delay_min_secs {
            errors.push(
                "monitor.listing_delay_max_secs must be >= listing_delay_min_secs".to_string(),
            );
        }

        if url::Url::parse(&self.site.base_url).is_err() {
            errors.push(format!("site.base_url is not a valid URL: {}", self.site.base_url));
        }
        if !self.site.login_path.starts_with('/') {
            errors.push("site.login_path must start with '/'".to_string());
        }
        if !self.site.api_path.contains("{slug}") {
            errors.push("site.api_path must contain the {slug} placeholder".to_string());
        }
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.site.session_ttl_hours) {
            errors.push(format!(
                "site.session_ttl_hours must be between 1 and {MAX_SESSION_TTL_HOURS}"
            ));
        }

        if self.account.email.is_empty() {
            errors.push("account.email is required".to_string());
        } else if !looks_like_email(&self.account.email) {
            errors.push("account.email is not a valid email address".to_string());
        }
        if self.account.password.is_empty() {
            errors.push(
                "account.password is required (or set SLOTWATCH_PASSWORD)".to_string(),
            );
        }

        if self.listings.is_empty() {
            errors.push("At least one listing must be configured".to_string());
        } else if !self.listings.iter().any(|l| l.enabled) {
            errors.push("At least one listing must be enabled".to_string());
        }
        let mut seen = HashSet::new();
        for (i, listing) in self.listings.iter().enumerate() {
            if listing.name.trim().is_empty() {
                errors.push(format!("listings[{i}].name is required"));
            }
            if listing.slug.trim().is_empty() {
                errors.push(format!("listings[{i}].slug is required"));
            } else if !is_valid_slug(&listing.slug) {
                errors.push(format!(
                    "listings[{i}].slug may only contain letters, digits, '-' and '_'"
                ));
            } else if !seen.insert(listing.slug.as_str()) {
                errors.push(format!("listings[{i}].slug '{}' is duplicated", listing.slug));
            }
        }

        if require_notifier {
            match &self.notification.email {
                None => errors.push("[notification.email] section is required".to_string()),
                Some(email) => {
                    for (field, value) in [
                        ("sender_email", &email.sender_email),
                        ("receiver_email", &email.receiver_email),
                    ] {
                        if value.is_empty() {
                            errors.push(format!("notification.email.{field} is required"));
                        } else if !looks_like_email(value) {
                            errors.push(format!(
                                "notification.email.{field} is not a valid email address"
                            ));
                        }
                    }
                    if email.app_password.is_empty() {
                        errors.push(
                            "notification.email.app_password is required (or set SLOTWATCH_SMTP_PASSWORD)"
                                .to_string(),
                        );
                    }
                }
            }
        }

        errors
    }
}

/// local@domain.tld with no whitespace.
fn looks_like_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || s.chars().any(char::is_whitespace) || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => {
            !host.is_empty() && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

fn is_valid_slug(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_toml() -> &'static str {
        r#"
[account]
email = "me@example.com"
password = "hunter2"

[[listings]]
name = "Sushi Place"
slug = "bu286225"

[notification.email]
sender_email = "bot@example.com"
receiver_email = "me@example.com"
app_password = "app-pw"
"#
    }

    #[test]
    fn test_defaults_reasonable() {
        let c = Config::default();
        assert_eq!(c.monitor.interval_min, 5);
        assert_eq!(c.monitor.interval_max, 10);
        assert_eq!(c.monitor.random_delay_max, 120);
        assert!(c.monitor.run_immediately);
        assert_eq!(c.monitor.missing_fields, MissingFieldPolicy::FailClosed);
        assert_eq!(c.site.login_path, "/users/sign_in");
        assert_eq!(c.site.session_ttl_hours, 336);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.monitor.interval_min, 5);
        assert!(config.listings.is_empty());
        assert!(config.notification.email.is_none());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[monitor]
interval_min = 2
interval_max = 4
random_delay_max = 30
run_immediately = false
listing_delay_min_secs = 1
listing_delay_max_secs = 3
captcha_backoff_minutes = 90
missing_fields = "fail_open"

[site]
base_url = "https://reserve.example.com/"
login_path = "/login"
api_path = "/api/{slug}/slots"
detail_path = "/r/{slug}"
timeout_secs = 10
session_ttl_hours = 12
user_agent = "test-agent"

[account]
email = "me@example.com"
password = "pw"

[[listings]]
name = "A"
slug = "a-1"

[[listings]]
name = "B"
slug = "b_2"
enabled = false
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.monitor.interval_min, 2);
        assert!(!config.monitor.run_immediately);
        assert_eq!(config.monitor.missing_fields, MissingFieldPolicy::FailOpen);
        assert_eq!(config.site.login_url(), "https://reserve.example.com/login");
        assert_eq!(
            config.site.api_url("a-1"),
            "https://reserve.example.com/api/a-1/slots"
        );
        assert_eq!(config.site.detail_url("a-1"), "https://reserve.example.com/r/a-1");
        assert_eq!(config.listings.len(), 2);
        assert!(config.listings[0].enabled);
        assert!(!config.listings[1].enabled);
        assert_eq!(config.enabled_listings().len(), 1);
    }

    #[test]
    fn test_validate_ok() {
        let config: Config = toml::from_str(valid_toml()).unwrap();
        let errors = config.validate(true);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let toml_str = r#"
[monitor]
interval_min = 10
interval_max = 5
random_delay_max = 0
run_immediately = true
listing_delay_min_secs = 2
listing_delay_max_secs = 5
captcha_backoff_minutes = 60

[account]
email = "not-an-email"

[[listings]]
name = ""
slug = "dup"

[[listings]]
name = "x"
slug = "dup"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let errors = config.validate(true);
        let joined = errors.join("\n");
        assert!(joined.contains("interval_max"));
        assert!(joined.contains("account.email is not a valid"));
        assert!(joined.contains("account.password is required"));
        assert!(joined.contains("listings[0].name is required"));
        assert!(joined.contains("duplicated"));
        assert!(joined.contains("[notification.email] section is required"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_durations() {
        let mut config: Config = toml::from_str(valid_toml()).unwrap();
        assert!(config.validate(true).is_empty());

        config.monitor.interval_max = u64::MAX;
        config.monitor.random_delay_max = u64::MAX;
        config.monitor.listing_delay_max_secs = u64::MAX;
        config.monitor.captcha_backoff_minutes = u64::MAX;
        config.site.session_ttl_hours = i64::MAX;
        let joined = config.validate(true).join("\n");
        assert!(joined.contains("interval_max must be at most"));
        assert!(joined.contains("random_delay_max must be at most"));
        assert!(joined.contains("listing_delay_max_secs must be at most"));
        assert!(joined.contains("captcha_backoff_minutes must be at most"));
        assert!(joined.contains("session_ttl_hours must be between"));

        config.site.session_ttl_hours = 0;
        assert!(config
            .validate(true)
            .iter()
            .any(|e| e.contains("session_ttl_hours")));
    }

    #[test]
    fn test_session_ttl_is_clamped() {
        let mut site = SiteConfig::default();
        assert_eq!(site.session_ttl(), chrono::Duration::hours(24 * 14));
        site.session_ttl_hours = i64::MAX;
        assert_eq!(site.session_ttl(), chrono::Duration::hours(MAX_SESSION_TTL_HOURS));
        site.session_ttl_hours = -5;
        assert_eq!(site.session_ttl(), chrono::Duration::hours(1));
    }

    #[test]
    fn test_validate_dry_run_skips_notifier() {
        let toml_str = r#"
[account]
email = "me@example.com"
password = "pw"

[[listings]]
name = "A"
slug = "a"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.validate(false).is_empty());
        assert!(!config.validate(true).is_empty());
    }

    #[test]
    fn test_validate_no_enabled_listing() {
        let toml_str = r#"
[account]
email = "me@example.com"
password = "pw"

[[listings]]
name = "A"
slug = "a"
enabled = false
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let errors = config.validate(false);
        assert!(errors.iter().any(|e| e.contains("must be enabled")));
    }

    #[test]
    fn test_looks_like_email() {
        assert!(looks_like_email("a.b+c@example.co.jp"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("a b@example.com"));
        assert!(!looks_like_email("a@@example.com"));
    }

    #[test]
    fn test_slug_validation() {
        assert!(is_valid_slug("bu286225"));
        assert!(is_valid_slug("a-b_c"));
        assert!(!is_valid_slug("a/b"));
        assert!(!is_valid_slug("../etc"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config: Config = toml::from_str(valid_toml()).unwrap();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.listings.len(), 1);
        assert_eq!(deserialized.account.email, "me@example.com");
    }
}
