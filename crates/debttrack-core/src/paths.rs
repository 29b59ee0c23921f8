use anyhow::Result;
use std::path::PathBuf;

const DEBTTRACK_DIR: &str = ".debttrack";
const DB_FILE: &str = "debttrack.db";

/// Environment variable to override the DebtTrack directory.
const DEBTTRACK_DIR_ENV: &str = "DEBTTRACK_DIR";

/// Resolve the DebtTrack data directory.
/// Priority: DEBTTRACK_DIR env var > ~/.debttrack/
pub fn resolve_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DEBTTRACK_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|h| h.join(DEBTTRACK_DIR))
        .ok_or_else(|| anyhow::anyhow!("Failed to determine home directory"))
}

/// Ensure the data directory exists and return the database path inside it.
pub fn ensure_database_path() -> Result<PathBuf> {
    let dir = resolve_data_dir()?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join(DB_FILE))
}
