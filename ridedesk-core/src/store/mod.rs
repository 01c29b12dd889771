mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemorySnapshotStore;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RidedeskError, RidedeskResult};
use crate::models::{Agent, ChatSession, SessionStatus};

/// Full copy of the coordinator state written after every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub revision: u64,
    pub saved_at: DateTime<Utc>,
    pub sessions: Vec<ChatSession>,
    pub agents: Vec<Agent>,
}

impl Snapshot {
    pub fn new(revision: u64, sessions: Vec<ChatSession>, agents: Vec<Agent>) -> Self {
        Self {
            revision,
            saved_at: Utc::now(),
            sessions,
            agents,
        }
    }

    /// Rejects snapshots that cannot be loaded without breaking invariants.
    ///
    /// Every connected session must point at a roster agent of the same user
    /// type, and no agent may hold more connected sessions than `max_chats`.
    /// Stored agent counters are not checked here; the coordinator recomputes
    /// them from connected sessions on load.
    pub fn validate(&self) -> RidedeskResult<()> {
        let mut agents: HashMap<&str, &Agent> = HashMap::with_capacity(self.agents.len());
        for agent in &self.agents {
            if agents.insert(agent.id.as_str(), agent).is_some() {
                return Err(RidedeskError::SnapshotCorrupt(format!(
                    "duplicate agent id '{}'",
                    agent.id
                )));
            }
        }

        let mut session_ids = HashSet::new();
        let mut connected: HashMap<&str, u32> = HashMap::new();
        for session in &self.sessions {
            if !session_ids.insert(session.id.as_str()) {
                return Err(RidedeskError::SnapshotCorrupt(format!(
                    "duplicate session id '{}'",
                    session.id
                )));
            }
            if session.status != SessionStatus::Connected {
                continue;
            }

            let Some(agent_id) = session.agent_id.as_deref() else {
                return Err(RidedeskError::SnapshotCorrupt(format!(
                    "session '{}' is connected without an agent",
                    session.id
                )));
            };
            let Some(agent) = agents.get(agent_id) else {
                return Err(RidedeskError::SnapshotCorrupt(format!(
                    "session '{}' is connected to unknown agent '{}'",
                    session.id, agent_id
                )));
            };
            if agent.user_type != session.user_type {
                return Err(RidedeskError::SnapshotCorrupt(format!(
                    "session '{}' ({}) is connected to {} agent '{}'",
                    session.id, session.user_type, agent.user_type, agent.id
                )));
            }
            *connected.entry(agent_id).or_insert(0) += 1;
        }

        for agent in &self.agents {
            let count = connected.get(agent.id.as_str()).copied().unwrap_or(0);
            if count > agent.max_chats {
                return Err(RidedeskError::SnapshotCorrupt(format!(
                    "agent '{}' holds {} connected sessions but max_chats is {}",
                    agent.id, count, agent.max_chats
                )));
            }
        }

        Ok(())
    }
}

/// Durable home for coordinator snapshots.
///
/// Implementations report failures; the coordinator decides to log and carry
/// on rather than fail the caller.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Human-readable location used in logs and errors.
    fn location(&self) -> String;

    /// Returns `None` on first run.
    async fn load_snapshot(&self) -> RidedeskResult<Option<Snapshot>>;

    async fn save_snapshot(&self, snapshot: &Snapshot) -> RidedeskResult<()>;
}
