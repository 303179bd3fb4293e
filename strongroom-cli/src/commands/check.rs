use anyhow::{Context, Result};
use strongroom_core::config::StrongroomConfig;
use strongroom_core::crypto::CryptoGateway;

/// Validate every config section, then connect and query the table.
pub fn run(config: &StrongroomConfig) -> Result<()> {
    config.validate().context("Configuration is invalid")?;
    println!("Configuration OK");

    let mut adapter = super::connect(config)?;
    let counts = adapter
        .count_active(chrono::Utc::now().timestamp())
        .with_context(|| format!("Table \"{}\" is not usable, run `strongroom init`", config.database.table))?;
    adapter.close();
    println!("Database OK ({} driver, {} active sessions)", adapter.driver(), counts.total());

    let crypto = CryptoGateway::default();
    let key = crypto.random_key();
    let sealed = crypto.seal(b"probe", &key)?;
    crypto.open(&sealed, &key)?;
    println!("Encryption OK");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_after_init() {
        let tmp = tempfile::tempdir().unwrap();
        let config = super::super::test_config(&tmp);
        super::super::init::run(&config).unwrap();
        run(&config).unwrap();
    }

    #[test]
    fn fails_without_cookie_domain() {
        let tmp = tempfile::tempdir().unwrap();
        let config = super::super::test_config(&tmp).with_cookie_domain("");
        let err = run(&config).unwrap_err();
        assert!(format!("{:#}", err).contains("Cookie domain empty"));
    }

    #[test]
    fn fails_without_table() {
        let tmp = tempfile::tempdir().unwrap();
        let config = super::super::test_config(&tmp);
        assert!(run(&config).is_err());
    }
}
