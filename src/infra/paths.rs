// src/infra/paths.rs — Path management
//
// All paths respect the SLOTWATCH_HOME environment variable for isolation.
// When SLOTWATCH_HOME is set, config and data live under that directory.
// When unset, config uses ~/.slotwatch/ and data uses XDG_DATA_HOME/slotwatch.

use directories::ProjectDirs;
use std::path::PathBuf;

/// Returns the SLOTWATCH_HOME override, if set.
fn slotwatch_home() -> Option<PathBuf> {
    std::env::var_os("SLOTWATCH_HOME").map(PathBuf::from)
}

/// Home directory, or the working directory when none can be determined.
pub fn dirs_home() -> PathBuf {
    directories::BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $SLOTWATCH_HOME/ or ~/.slotwatch/
pub fn config_dir() -> PathBuf {
    if let Some(home) = slotwatch_home() {
        return home;
    }
    dirs_home().join(".slotwatch")
}

/// Data directory: $SLOTWATCH_HOME/data/ or ~/.local/share/slotwatch/
pub fn data_dir() -> PathBuf {
    if let Some(home) = slotwatch_home() {
        return home.join("data");
    }
    match ProjectDirs::from("", "", "slotwatch") {
        Some(dirs) => dirs.data_local_dir().to_path_buf(),
        None => config_dir().join("data"),
    }
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Persisted session (cookies + CSRF token)
pub fn session_file_path() -> PathBuf {
    config_dir().join("session.json")
}

/// One snapshot file per listing lives here.
pub fn snapshots_dir() -> PathBuf {
    data_dir().join("snapshots")
}

/// Ensure all required directories exist
pub async fn ensure_dirs() -> anyhow::Result<()> {
    for dir in [config_dir(), data_dir(), snapshots_dir()] {
        tokio::fs::create_dir_all(&dir).await?;
    }
    Ok(())
}
