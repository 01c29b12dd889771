use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use ridedesk_core::{Agent, AgentStatus, UserType};

use super::CliContext;

pub async fn cmd_roster(ctx: &CliContext) -> anyhow::Result<()> {
    let coordinator = ctx.coordinator().await?;
    let agents = coordinator.list_agents().await;

    if ctx.is_json() {
        println!("{}", serde_json::to_string_pretty(&agents)?);
        return Ok(());
    }

    if agents.is_empty() {
        println!("{}", "No agents on the roster.".yellow());
        println!(
            "{}",
            "Add [[roster]] entries to ridedesk.toml to staff the desk.".dimmed()
        );
        return Ok(());
    }

    println!("{}", "Agent Roster".cyan().bold());
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("ID").fg(Color::White),
            Cell::new("Name").fg(Color::White),
            Cell::new("Serves").fg(Color::White),
            Cell::new("Status").fg(Color::White),
            Cell::new("Load").fg(Color::White),
            Cell::new("Email").fg(Color::White),
        ]);

    for agent in &agents {
        table.add_row(vec![
            Cell::new(&agent.id),
            Cell::new(&agent.name),
            Cell::new(format!(
                "{} {}",
                user_type_icon(agent.user_type),
                agent.user_type
            )),
            status_cell(agent),
            Cell::new(format!("{}/{}", agent.active_chats, agent.max_chats)),
            Cell::new(if agent.email.is_empty() {
                "-"
            } else {
                agent.email.as_str()
            }),
        ]);
    }

    println!("{table}");
    println!();

    let available = agents
        .iter()
        .filter(|a| a.status == AgentStatus::Available)
        .count();
    println!(
        "  Total: {} agent(s) ({} available)",
        agents.len(),
        available
    );

    Ok(())
}

pub async fn cmd_stats(ctx: &CliContext) -> anyhow::Result<()> {
    let coordinator = ctx.coordinator().await?;
    let stats = coordinator.stats().await;

    if ctx.is_json() {
        let output = serde_json::json!({
            "revision": coordinator.revision().await,
            "snapshot": ctx.config.snapshot_path().display().to_string(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "Support Desk Statistics".cyan().bold());
    println!("{}", "═".repeat(40).dimmed());
    println!();

    println!("  {}", "Sessions".yellow().bold());
    println!("    Total:         {:>6}", stats.total);
    println!("    Waiting:       {:>6}", stats.waiting);
    println!("    Connected:     {:>6}", stats.connected);
    println!("    Closed:        {:>6}", stats.closed);

    println!();
    println!("  {}", "Agents".yellow().bold());
    println!("    Available:     {:>6}", stats.agents_available);
    println!("    Busy:          {:>6}", stats.agents_busy);
    println!("    Open slots:    {:>6}", stats.open_capacity);

    println!();
    println!(
        "  {} {}",
        "Snapshot:".dimmed(),
        ctx.config.snapshot_path().display()
    );

    Ok(())
}

pub(crate) fn user_type_icon(user_type: UserType) -> &'static str {
    match user_type {
        UserType::Rider => "◎",
        UserType::Driver => "◈",
    }
}

fn status_cell(agent: &Agent) -> Cell {
    match agent.status {
        AgentStatus::Available => Cell::new("available").fg(Color::Green),
        AgentStatus::Busy => Cell::new("busy").fg(Color::Yellow),
    }
}
