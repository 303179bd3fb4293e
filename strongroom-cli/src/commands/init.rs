use anyhow::Result;
use strongroom_core::config::StrongroomConfig;

/// Create the session table, leaving an existing one untouched.
pub fn run(config: &StrongroomConfig) -> Result<()> {
    create(config)?;
    println!(
        "Session table \"{}\" ready ({} driver).",
        config.database.table,
        config.database.driver.map(|d| d.to_string()).unwrap_or_default()
    );
    Ok(())
}

fn create(config: &StrongroomConfig) -> Result<()> {
    let mut adapter = super::connect(config)?;
    adapter.create_table()?;
    log::info!("Created table {} if missing", config.database.table);
    adapter.close();
    Ok(())
}
