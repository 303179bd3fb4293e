pub mod check;
pub mod gc;
pub mod init;
pub mod stats;

use anyhow::Result;
use strongroom_core::config::StrongroomConfig;
use strongroom_core::storage::{self, StorageAdapter};

/// Connect with the database section only; cookie settings are irrelevant here
fn connect(config: &StrongroomConfig) -> Result<Box<dyn StorageAdapter>> {
    config.database.validate()?;
    Ok(storage::connect(&config.database)?)
}

#[cfg(test)]
pub(crate) fn test_config(dir: &tempfile::TempDir) -> StrongroomConfig {
    let mut config = StrongroomConfig::in_memory("example.com");
    config.database.host = dir.path().display().to_string();
    config
}
