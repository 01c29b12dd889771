//! Static support-agent roster.
//!
//! Agents are provisioned once at start-up, either from `[[roster]]` entries in
//! the configuration or from the built-in roster below. Order matters: the
//! coordinator assigns to the first eligible agent in roster order.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{RidedeskError, RidedeskResult};
use crate::models::{Agent, UserType};

/// One roster entry as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSeed {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub user_type: UserType,
    #[serde(default = "default_max_chats")]
    pub max_chats: u32,
}

fn default_max_chats() -> u32 {
    3
}

impl AgentSeed {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        user_type: UserType,
        max_chats: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            user_type,
            max_chats,
        }
    }

    pub fn into_agent(self) -> Agent {
        Agent::new(self.id, self.name, self.email, self.user_type, self.max_chats)
    }
}

/// The roster shipped with the admin panel.
pub fn default_roster() -> Vec<AgentSeed> {
    vec![
        AgentSeed::new(
            "agent-rider-1",
            "Priya Nair",
            "priya.nair@ridedesk.support",
            UserType::Rider,
            3,
        ),
        AgentSeed::new(
            "agent-rider-2",
            "Marcus Lee",
            "marcus.lee@ridedesk.support",
            UserType::Rider,
            3,
        ),
        AgentSeed::new(
            "agent-driver-1",
            "Sofia Alvarez",
            "sofia.alvarez@ridedesk.support",
            UserType::Driver,
            2,
        ),
        AgentSeed::new(
            "agent-driver-2",
            "Tomasz Nowak",
            "tomasz.nowak@ridedesk.support",
            UserType::Driver,
            2,
        ),
    ]
}

/// Turns seeds into agents, rejecting duplicate or empty ids.
pub fn build_roster(seeds: Vec<AgentSeed>) -> RidedeskResult<Vec<Agent>> {
    let mut seen = HashSet::new();
    let mut agents = Vec::with_capacity(seeds.len());

    for seed in seeds {
        if seed.id.trim().is_empty() {
            return Err(RidedeskError::invalid_argument(
                "roster.id",
                "Agent id must not be empty",
            ));
        }
        if !seen.insert(seed.id.clone()) {
            return Err(RidedeskError::DuplicateAgent(seed.id));
        }
        agents.push(seed.into_agent());
    }

    Ok(agents)
}
