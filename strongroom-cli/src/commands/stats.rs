use anyhow::Result;
use strongroom_core::config::StrongroomConfig;
use strongroom_core::storage::SessionCounts;

pub fn run(config: &StrongroomConfig, json: bool) -> Result<()> {
    let counts = collect(config)?;

    if json {
        let report = serde_json::json!({
            "table": config.database.table,
            "visitors": counts.visitors,
            "users": counts.users,
            "total": counts.total(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Active sessions in \"{}\"", config.database.table);
        println!("  visitors: {}", counts.visitors);
        println!("  users:    {}", counts.users);
        println!("  total:    {}", counts.total());
    }
    Ok(())
}

fn collect(config: &StrongroomConfig) -> Result<SessionCounts> {
    let mut adapter = super::connect(config)?;
    let counts = adapter.count_active(chrono::Utc::now().timestamp())?;
    adapter.close();
    Ok(counts)
}
