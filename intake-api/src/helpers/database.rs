use std::path::PathBuf;
use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::database::Database;

/// Returns the path to the contact database based on the operating system
///
/// # Platform-specific paths
///
/// - **macOS**: `~/Library/Application Support/contact-intake/contacts.db`
/// - **Linux**: `~/.local/share/contact-intake/contacts.db`
/// - **Windows**: `%LOCALAPPDATA%\contact-intake\contacts.db`
pub fn get_db_path(config: Option<&DatabaseConfig>) -> anyhow::Result<PathBuf> {
    if let Some(path) = config.and_then(|c| c.path.clone()) {
        return Ok(path);
    }

    let data_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine local data directory"))?;

    Ok(data_dir.join("contact-intake").join("contacts.db"))
}

/// Open the contact database, creating it on first run
pub fn initialize_database(config: Option<&DatabaseConfig>) -> anyhow::Result<Arc<Database>> {
    let db_path = get_db_path(config)?;
    let db = Database::new(&db_path)?;
    tracing::info!("Database initialized at: {}", db_path.display());
    Ok(Arc::new(db))
}
