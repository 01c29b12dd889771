use serde::{Deserialize, Serialize};

use super::agent::UserType;
use super::session::{ChatSession, SessionStatus};

/// Optional criteria for `list_sessions`. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFilter {
    pub status: Option<SessionStatus>,
    pub user_type: Option<UserType>,
    pub agent_id: Option<String>,
}

impl SessionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_user_type(mut self, user_type: UserType) -> Self {
        self.user_type = Some(user_type);
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn matches(&self, session: &ChatSession) -> bool {
        if let Some(status) = self.status {
            if session.status != status {
                return false;
            }
        }

        if let Some(user_type) = self.user_type {
            if session.user_type != user_type {
                return false;
            }
        }

        if let Some(ref agent_id) = self.agent_id {
            if session.agent_id.as_deref() != Some(agent_id.as_str()) {
                return false;
            }
        }

        true
    }
}

/// Dashboard counters for the support inbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatStats {
    pub total: usize,
    pub waiting: usize,
    pub connected: usize,
    pub closed: usize,
    pub agents_available: usize,
    pub agents_busy: usize,
    pub open_capacity: u32,
}
