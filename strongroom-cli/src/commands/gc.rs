use anyhow::{bail, Result};
use std::time::Duration;
use strongroom_core::config::StrongroomConfig;
use strongroom_core::session::SessionJanitor;
use strongroom_core::storage::{Column, Field, Operator};

/// Sweep once, or keep sweeping every `every` seconds until interrupted.
pub fn run(config: &StrongroomConfig, every: Option<u64>) -> Result<()> {
    match every {
        None => {
            let count = sweep(config)?;
            println!("Deleted {} expired session(s).", count);
            Ok(())
        }
        Some(0) => bail!("--every must be at least 1 second"),
        Some(secs) => watch(config, Duration::from_secs(secs)),
    }
}

fn sweep(config: &StrongroomConfig) -> Result<usize> {
    let mut adapter = super::connect(config)?;
    let now = chrono::Utc::now().timestamp();
    let count = adapter.delete_where(Column::Expire, Operator::Lt, &Field::Int(now))?;
    adapter.close();
    Ok(count)
}

fn watch(config: &StrongroomConfig, interval: Duration) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let _janitor = SessionJanitor::spawn(config, interval)?;
        println!("Sweeping every {}s, press Ctrl-C to stop.", interval.as_secs());
        tokio::signal::ctrl_c().await?;
        log::info!("Janitor stopped");
        Ok::<(), anyhow::Error>(())
    })
}
