use serde::{Deserialize, Serialize};

/// The class of end user a session belongs to, and the class of sessions an
/// agent is allowed to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Rider,
    Driver,
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserType::Rider => write!(f, "rider"),
            UserType::Driver => write!(f, "driver"),
        }
    }
}

impl std::str::FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rider" => Ok(UserType::Rider),
            "driver" => Ok(UserType::Driver),
            other => Err(format!(
                "Unknown user type '{}'. Must be one of: rider, driver",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Available,
    Busy,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Available => write!(f, "available"),
            AgentStatus::Busy => write!(f, "busy"),
        }
    }
}

/// A support representative from the static roster.
///
/// `active_chats` and `status` are only changed through [`Agent::claim_slot`]
/// and [`Agent::release_slot`], which the coordinator calls from its assign
/// and close paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub email: String,
    pub user_type: UserType,
    pub status: AgentStatus,
    pub active_chats: u32,
    pub max_chats: u32,
}

impl Agent {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        user_type: UserType,
        max_chats: u32,
    ) -> Self {
        let mut agent = Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            user_type,
            status: AgentStatus::Available,
            active_chats: 0,
            max_chats,
        };
        agent.refresh_status();
        agent
    }

    pub fn has_capacity(&self) -> bool {
        self.active_chats < self.max_chats
    }

    /// Whether this agent may take a new session of `user_type` right now.
    pub fn is_eligible_for(&self, user_type: UserType) -> bool {
        self.user_type == user_type && self.status == AgentStatus::Available && self.has_capacity()
    }

    pub fn open_slots(&self) -> u32 {
        self.max_chats.saturating_sub(self.active_chats)
    }

    pub(crate) fn claim_slot(&mut self) {
        self.active_chats = (self.active_chats + 1).min(self.max_chats);
        if self.active_chats >= self.max_chats {
            self.status = AgentStatus::Busy;
        }
    }

    pub(crate) fn release_slot(&mut self) {
        self.active_chats = self.active_chats.saturating_sub(1);
        if self.status == AgentStatus::Busy && self.active_chats < self.max_chats {
            self.status = AgentStatus::Available;
        }
    }

    /// Overwrites the counter with a recomputed value and rederives `status`.
    pub(crate) fn reset_active_chats(&mut self, active_chats: u32) {
        self.active_chats = active_chats.min(self.max_chats);
        self.refresh_status();
    }

    fn refresh_status(&mut self) {
        self.status = if self.active_chats >= self.max_chats {
            AgentStatus::Busy
        } else {
            AgentStatus::Available
        };
    }
}
