// src/cli/login.rs — `login`: establish and save a session

use anyhow::bail;

use super::run::build_session_manager;
use crate::infra::config::Config;
use crate::session::Credentials;

pub async fn run_login(config: &Config, fresh: bool) -> anyhow::Result<()> {
    if config.account.email.is_empty() || config.account.password.is_empty() {
        bail!("account.email and account.password (or SLOTWATCH_PASSWORD) are required");
    }

    let manager = build_session_manager(config)?;
    let credentials = Credentials::from(&config.account);

    let session = if fresh {
        manager.invalidate();
        manager.login(&credentials).await?
    } else {
        manager.ensure_session(&credentials).await?
    };

    println!("Logged in as {}", credentials.email);
    println!("  Cookies:  {}", session.cookies.names().collect::<Vec<_>>().join(", "));
    println!("  Expires:  {}", session.expires_at.format("%Y-%m-%d %H:%M UTC"));
    println!("  Saved to: {}", manager.store().path().display());
    Ok(())
}
