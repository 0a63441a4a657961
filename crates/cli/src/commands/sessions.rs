//! `parley sessions`: list stored sessions.

use parley_agent::build_cost_model;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let store = super::open_store(&config).await?;
    let cost = build_cost_model(config.eviction.cost_model)?;

    let ids = store.list().await?;
    if ids.is_empty() {
        println!("No stored sessions ({} store).", store.name());
        return Ok(());
    }

    println!("{:<32} {:>8} {:>10} {:>8}", "SESSION", "ENTRIES", "FUNCTIONS", "COST");
    for id in ids {
        let Some(log) = store.load(&id).await? else {
            continue;
        };
        println!(
            "{:<32} {:>8} {:>10} {:>8}",
            id.as_str(),
            log.len(),
            log.function_count(),
            cost.total_cost(&log)
        );
    }
    println!(
        "\nBudgets: {} function entries, cost < {} ({})",
        config.eviction.max_function_entries,
        config.eviction.max_total_cost,
        cost.name()
    );

    Ok(())
}
