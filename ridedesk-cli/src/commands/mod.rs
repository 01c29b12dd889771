pub mod config;
pub mod roster;
pub mod sessions;
pub mod watch;

pub use config::cmd_config;
pub use roster::{cmd_roster, cmd_stats};
pub use sessions::{handle_sessions_command, SessionsCommand};
pub use watch::cmd_watch;

use ridedesk_core::{ChatCoordinator, RidedeskConfig};

/// Settings shared by every subcommand.
pub struct CliContext {
    pub config: RidedeskConfig,
    pub format: String,
}

impl CliContext {
    pub fn new(config: RidedeskConfig, format: String) -> Self {
        Self { config, format }
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }

    pub async fn coordinator(&self) -> anyhow::Result<ChatCoordinator> {
        Ok(ChatCoordinator::from_config(&self.config).await?)
    }
}

pub(crate) fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() > max_len {
        let head: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}…", head)
    } else {
        s.to_string()
    }
}

pub(crate) fn truncate_id(id: &str) -> String {
    if id.chars().count() > 8 {
        let head: String = id.chars().take(8).collect();
        format!("{}…", head)
    } else {
        id.to_string()
    }
}
