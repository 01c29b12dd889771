use colored::Colorize;
use ridedesk_core::get_config_dir;

use super::CliContext;

pub fn cmd_config(ctx: &CliContext) -> anyhow::Result<()> {
    let config = &ctx.config;

    if ctx.is_json() {
        let mut output = serde_json::to_value(config)?;
        output["roster"] = serde_json::to_value(config.roster_seeds())?;
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "Ridedesk Configuration".cyan().bold());
    println!("{}", "═".repeat(40).dimmed());
    println!();

    println!("  {}", "Storage".yellow().bold());
    println!(
        "    {:<16} {}",
        "Snapshot:".bold(),
        config.snapshot_path().display()
    );
    println!("    {:<16} {}", "Pretty JSON:".bold(), config.storage.pretty);

    println!();
    println!("  {}", "Logging".yellow().bold());
    println!("    {:<16} {}", "Level:".bold(), config.log_level());
    println!(
        "    {:<16} {}",
        "JSON format:".bold(),
        config.logging.json_format
    );

    println!();
    println!("  {}", "Assignment".yellow().bold());
    println!(
        "    {:<16} {}",
        "Sweep on close:".bold(),
        config.assignment.sweep_on_close
    );
    println!(
        "    {:<16} {}",
        "Sweep on load:".bold(),
        config.assignment.sweep_on_load
    );
    println!(
        "    {:<16} {}",
        "Event buffer:".bold(),
        config.assignment.event_capacity
    );

    println!();
    println!("  {}", "Polling".yellow().bold());
    println!(
        "    {:<16} {} ms",
        "Interval:".bold(),
        config.polling.interval_ms
    );

    println!();
    let source = if config.roster.is_empty() {
        "built-in"
    } else {
        "configured"
    };
    println!("  {} ({})", "Roster".yellow().bold(), source.dimmed());
    for seed in config.roster_seeds() {
        println!(
            "    {:<16} {} · {} · {} chat(s)",
            seed.id, seed.name, seed.user_type, seed.max_chats
        );
    }

    if let Some(dir) = get_config_dir() {
        println!();
        println!(
            "  {} {}",
            "Config file:".dimmed(),
            dir.join("config.toml").display()
        );
    }

    Ok(())
}
