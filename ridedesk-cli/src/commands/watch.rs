use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use colored::Colorize;
use ridedesk_core::{SessionChange, SessionFilter, SessionPoller};

use super::sessions::{colored_status, parse_status};
use super::{truncate_id, truncate_string, CliContext};

/// Polls the snapshot file and prints session changes until Ctrl-C.
///
/// Other `ridedesk` processes write the same file, so each tick first pulls
/// newer snapshots into the local coordinator before the poller diffs it.
pub async fn cmd_watch(
    ctx: &CliContext,
    interval_ms: Option<u64>,
    status: Option<&str>,
) -> anyhow::Result<()> {
    let period = match interval_ms {
        Some(0) => anyhow::bail!("--interval-ms must be greater than 0"),
        Some(ms) => Duration::from_millis(ms),
        None => ctx.config.poll_interval(),
    };

    let mut filter = SessionFilter::new();
    if let Some(s) = status {
        filter = filter.with_status(parse_status(s)?);
    }

    let coordinator = Arc::new(ctx.coordinator().await?);
    let poller = SessionPoller::new(coordinator.clone(), period).with_filter(filter);

    let refresher = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = coordinator.refresh_from_store().await {
                    e.log();
                }
            }
        })
    };

    let mut changes = poller.start().await?;

    if !ctx.is_json() {
        println!(
            "{} {} every {} ms (Ctrl-C to stop)",
            "Watching".cyan().bold(),
            ctx.config.snapshot_path().display(),
            period.as_millis()
        );
        println!();
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            batch = changes.recv() => {
                let Some(batch) = batch else { break };
                for change in &batch {
                    print_change(ctx, change)?;
                }
            }
        }
    }

    poller.stop().await;
    refresher.abort();

    if !ctx.is_json() {
        println!();
        println!("{}", "Stopped watching.".dimmed());
    }

    Ok(())
}

fn print_change(ctx: &CliContext, change: &SessionChange) -> anyhow::Result<()> {
    if ctx.is_json() {
        let output = match change {
            SessionChange::Added(s) => serde_json::json!({ "change": "added", "session": s }),
            SessionChange::Updated(s) => serde_json::json!({ "change": "updated", "session": s }),
            SessionChange::Removed(id) => {
                serde_json::json!({ "change": "removed", "sessionId": id })
            }
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    let now = Utc::now().format("%H:%M:%S").to_string().dimmed();
    match change {
        SessionChange::Added(s) | SessionChange::Updated(s) => {
            let marker = if matches!(change, SessionChange::Added(_)) {
                "+".green().bold()
            } else {
                "~".yellow().bold()
            };
            println!(
                "{} {} {} {:<10} {} {}",
                now,
                marker,
                truncate_id(&s.id),
                truncate_string(&s.user_name, 10),
                colored_status(s.status),
                s.last_message
                    .as_deref()
                    .map(|m| truncate_string(m, 40))
                    .unwrap_or_default()
                    .dimmed()
            );
        }
        SessionChange::Removed(id) => {
            println!("{} {} {}", now, "-".red().bold(), truncate_id(id));
        }
    }

    Ok(())
}
