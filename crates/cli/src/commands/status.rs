//! `parley status`: show effective configuration.

use parley_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    println!("Parley Status");
    println!("=============");
    println!("  Config dir:      {}", AppConfig::config_dir().display());
    println!("  Provider:        {}", config.default_provider);
    println!("  Model:           {}", parley_providers::resolve_model(&config));
    println!("  Temperature:     {}", config.default_temperature);
    println!("  API key:         {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Max iterations:  {}", config.orchestration.max_iterations);
    println!(
        "  Timeouts:        model {}s, tool {}s",
        config.orchestration.model_timeout_secs, config.orchestration.tool_timeout_secs
    );
    println!(
        "  Eviction:        {} function entries, cost budget {} ({:?})",
        config.eviction.max_function_entries,
        config.eviction.max_total_cost,
        config.eviction.cost_model
    );
    println!(
        "  Trimmer:         {} every {}s",
        if config.trimmer.enabled { "enabled" } else { "disabled" },
        config.trimmer.interval_secs
    );
    println!(
        "  Storage:         {:?} at {}",
        config.storage.backend,
        config.storage.resolved_path().display()
    );
    println!("  Tools:           {}", parley_tools::default_registry().names().join(", "));

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file: run `parley onboard` first");
    }

    Ok(())
}
