use clap::Subcommand;
use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use ridedesk_core::{ChatSession, MessageSender, SessionFilter, SessionStatus, UserType};

use super::roster::user_type_icon;
use super::{truncate_id, truncate_string, CliContext};

#[derive(Subcommand)]
pub enum SessionsCommand {
    #[command(about = "List sessions, oldest first")]
    List {
        #[arg(long, help = "Filter by status (waiting, connected, closed)")]
        status: Option<String>,

        #[arg(short = 't', long, help = "Filter by user type (rider, driver)")]
        user_type: Option<String>,

        #[arg(short, long, help = "Filter by assigned agent id")]
        agent: Option<String>,
    },

    #[command(about = "Show a session and its full transcript")]
    Show {
        #[arg(help = "Session ID")]
        session_id: String,
    },

    #[command(about = "Open a new session and try to assign an agent")]
    Create {
        #[arg(long, help = "Id of the rider or driver asking for help")]
        user_id: String,

        #[arg(long, help = "Display name of the user")]
        user_name: String,

        #[arg(short = 't', long, help = "User type (rider, driver)")]
        user_type: String,

        #[arg(short, long, help = "Opening message from the user")]
        message: Option<String>,
    },

    #[command(about = "Append a message to a session")]
    Send {
        #[arg(help = "Session ID")]
        session_id: String,

        #[arg(help = "Message text")]
        text: String,

        #[arg(long, default_value = "user", help = "Who is speaking (user, agent)")]
        sender: String,
    },

    #[command(about = "Close a session and free its agent")]
    Close {
        #[arg(help = "Session ID")]
        session_id: String,
    },

    #[command(about = "Retry assignment for every waiting session")]
    Sweep,
}

pub async fn handle_sessions_command(
    ctx: &CliContext,
    cmd: Option<SessionsCommand>,
) -> anyhow::Result<()> {
    match cmd.unwrap_or(SessionsCommand::List {
        status: None,
        user_type: None,
        agent: None,
    }) {
        SessionsCommand::List {
            status,
            user_type,
            agent,
        } => cmd_sessions_list(ctx, status.as_deref(), user_type.as_deref(), agent).await,
        SessionsCommand::Show { session_id } => cmd_sessions_show(ctx, &session_id).await,
        SessionsCommand::Create {
            user_id,
            user_name,
            user_type,
            message,
        } => {
            cmd_sessions_create(ctx, &user_id, &user_name, &user_type, message.as_deref()).await
        }
        SessionsCommand::Send {
            session_id,
            text,
            sender,
        } => cmd_sessions_send(ctx, &session_id, &text, &sender).await,
        SessionsCommand::Close { session_id } => cmd_sessions_close(ctx, &session_id).await,
        SessionsCommand::Sweep => cmd_sessions_sweep(ctx).await,
    }
}

async fn cmd_sessions_list(
    ctx: &CliContext,
    status: Option<&str>,
    user_type: Option<&str>,
    agent: Option<String>,
) -> anyhow::Result<()> {
    let mut filter = SessionFilter::new();
    if let Some(s) = status {
        filter = filter.with_status(parse_status(s)?);
    }
    if let Some(t) = user_type {
        filter = filter.with_user_type(parse_user_type(t)?);
    }
    if let Some(a) = agent {
        filter = filter.with_agent(a);
    }

    let coordinator = ctx.coordinator().await?;
    let sessions = coordinator.list_sessions(&filter).await;

    if ctx.is_json() {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("{}", "No sessions found.".yellow());
        println!(
            "{}",
            "Open one with 'ridedesk sessions create'.".dimmed()
        );
        return Ok(());
    }

    println!("{}", "Support Sessions".cyan().bold());
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Session ID").fg(Color::White),
            Cell::new("User").fg(Color::White),
            Cell::new("Status").fg(Color::White),
            Cell::new("Agent").fg(Color::White),
            Cell::new("Msgs").fg(Color::White),
            Cell::new("Last Message").fg(Color::White),
            Cell::new("Last Activity").fg(Color::White),
        ]);

    for session in &sessions {
        table.add_row(vec![
            Cell::new(truncate_id(&session.id)),
            Cell::new(format!(
                "{} {}",
                user_type_icon(session.user_type),
                truncate_string(&session.user_name, 20)
            )),
            status_cell(session.status),
            Cell::new(session.agent_id.as_deref().unwrap_or("-")),
            Cell::new(session.messages.len()),
            Cell::new(
                session
                    .last_message
                    .as_deref()
                    .map(|m| truncate_string(m, 30))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(session.last_activity().format("%Y-%m-%d %H:%M:%S")),
        ]);
    }

    println!("{table}");
    println!();

    let waiting = sessions.iter().filter(|s| s.is_waiting()).count();
    println!(
        "  Total: {} session(s) ({} waiting)",
        sessions.len(),
        waiting
    );

    Ok(())
}

async fn cmd_sessions_show(ctx: &CliContext, session_id: &str) -> anyhow::Result<()> {
    let coordinator = ctx.coordinator().await?;
    let session = coordinator.get_session(session_id).await?;

    if ctx.is_json() {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    print_session_details(&session);

    println!();
    println!("  {}", "Transcript".yellow().bold());
    if session.messages.is_empty() {
        println!("    {}", "No messages yet.".dimmed());
    }
    for message in &session.messages {
        let who = match message.sender {
            MessageSender::User => session.user_name.green().bold(),
            MessageSender::Agent => session
                .agent_id
                .as_deref()
                .unwrap_or("agent")
                .blue()
                .bold(),
        };
        println!(
            "    {} {} {}",
            message.timestamp.format("%H:%M:%S").to_string().dimmed(),
            who,
            message.text
        );
    }

    Ok(())
}

async fn cmd_sessions_create(
    ctx: &CliContext,
    user_id: &str,
    user_name: &str,
    user_type: &str,
    message: Option<&str>,
) -> anyhow::Result<()> {
    let user_type = parse_user_type(user_type)?;
    let coordinator = ctx.coordinator().await?;
    let session = coordinator
        .create_session(user_id, user_name, user_type, message)
        .await;

    if ctx.is_json() {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    match session.agent_id.as_deref() {
        Some(agent_id) => println!(
            "{} Session {} connected to {}",
            "✓".green().bold(),
            session.id,
            agent_id.cyan()
        ),
        None => println!(
            "{} Session {} is waiting for a free {} agent",
            "…".yellow().bold(),
            session.id,
            session.user_type
        ),
    }

    Ok(())
}

async fn cmd_sessions_send(
    ctx: &CliContext,
    session_id: &str,
    text: &str,
    sender: &str,
) -> anyhow::Result<()> {
    let sender = parse_sender(sender)?;
    let coordinator = ctx.coordinator().await?;
    let message = coordinator.send_message(session_id, text, sender).await?;

    if ctx.is_json() {
        println!("{}", serde_json::to_string_pretty(&message)?);
        return Ok(());
    }

    println!(
        "{} Message #{} sent to {}",
        "✓".green().bold(),
        message.id,
        truncate_id(session_id)
    );

    Ok(())
}

async fn cmd_sessions_close(ctx: &CliContext, session_id: &str) -> anyhow::Result<()> {
    let coordinator = ctx.coordinator().await?;
    coordinator.close_session(session_id).await?;
    let session = coordinator.get_session(session_id).await?;

    if ctx.is_json() {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    println!("{} Session {} closed", "✓".green().bold(), session.id);
    if let Some(agent_id) = session.agent_id.as_deref() {
        let agent = coordinator.get_agent(agent_id).await?;
        println!(
            "  {} {} now at {}/{}",
            "→".blue(),
            agent.id,
            agent.active_chats,
            agent.max_chats
        );
    }

    Ok(())
}

async fn cmd_sessions_sweep(ctx: &CliContext) -> anyhow::Result<()> {
    let coordinator = ctx.coordinator().await?;
    let assigned = coordinator.sweep_waiting().await;
    let still_waiting = coordinator
        .list_sessions(&SessionFilter::new().with_status(SessionStatus::Waiting))
        .await
        .len();

    if ctx.is_json() {
        let output = serde_json::json!({
            "assigned": assigned,
            "waiting": still_waiting,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if assigned == 0 {
        println!("{}", "No waiting sessions could be assigned.".yellow());
    } else {
        println!(
            "{} Assigned {} waiting session(s)",
            "✓".green().bold(),
            assigned
        );
    }
    println!("  Still waiting: {}", still_waiting);

    Ok(())
}

fn print_session_details(s: &ChatSession) {
    println!("{}", "Session Details".cyan().bold());
    println!("{}", "═".repeat(50).dimmed());
    println!();

    println!("  {:<18} {}", "Session ID:".bold(), s.id);
    println!(
        "  {:<18} {} {} ({})",
        "User:".bold(),
        user_type_icon(s.user_type),
        s.user_name,
        s.user_id
    );
    println!("  {:<18} {}", "Status:".bold(), colored_status(s.status));
    println!(
        "  {:<18} {}",
        "Agent:".bold(),
        s.agent_id.as_deref().unwrap_or("-")
    );

    println!();
    println!("  {}", "Timing".yellow().bold());
    println!(
        "  {:<18} {}",
        "Created:".bold(),
        s.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(assigned) = s.assigned_at {
        println!(
            "  {:<18} {}",
            "Assigned:".bold(),
            assigned.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    if let Some(closed) = s.closed_at {
        println!(
            "  {:<18} {}",
            "Closed:".bold(),
            closed.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
}

pub(crate) fn colored_status(status: SessionStatus) -> String {
    match status {
        SessionStatus::Waiting => "waiting".yellow().to_string(),
        SessionStatus::Connected => "connected".green().to_string(),
        SessionStatus::Closed => "closed".dimmed().to_string(),
    }
}

fn status_cell(status: SessionStatus) -> Cell {
    match status {
        SessionStatus::Waiting => Cell::new("waiting").fg(Color::Yellow),
        SessionStatus::Connected => Cell::new("connected").fg(Color::Green),
        SessionStatus::Closed => Cell::new("closed").fg(Color::DarkGrey),
    }
}

pub(crate) fn parse_status(s: &str) -> anyhow::Result<SessionStatus> {
    s.parse().map_err(anyhow::Error::msg)
}

fn parse_user_type(s: &str) -> anyhow::Result<UserType> {
    s.parse().map_err(anyhow::Error::msg)
}

fn parse_sender(s: &str) -> anyhow::Result<MessageSender> {
    s.parse().map_err(anyhow::Error::msg)
}
