use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{ChatSession, Message};

pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEventKind {
    SessionCreated {
        session: ChatSession,
    },
    SessionAssigned {
        session_id: String,
        agent_id: String,
    },
    MessageSent {
        session_id: String,
        message: Message,
    },
    SessionClosed {
        session_id: String,
        released_agent: Option<String>,
    },
}

impl ChatEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChatEventKind::SessionCreated { .. } => "session_created",
            ChatEventKind::SessionAssigned { .. } => "session_assigned",
            ChatEventKind::MessageSent { .. } => "message_sent",
            ChatEventKind::SessionClosed { .. } => "session_closed",
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            ChatEventKind::SessionCreated { session } => &session.id,
            ChatEventKind::SessionAssigned { session_id, .. }
            | ChatEventKind::MessageSent { session_id, .. }
            | ChatEventKind::SessionClosed { session_id, .. } => session_id,
        }
    }
}

/// Change notification published after a coordinator mutation commits.
///
/// `revision` identifies the mutation, not the event. A create that assigns
/// an agent publishes `session_created` and `session_assigned` with the same
/// revision, and a close that sweeps waiting sessions stamps its
/// `session_assigned` events with the close's revision. Events within one
/// revision arrive in the order the mutation produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub revision: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: ChatEventKind,
}

impl ChatEvent {
    pub fn new(revision: u64, kind: ChatEventKind) -> Self {
        Self {
            revision,
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn session_created(revision: u64, session: ChatSession) -> Self {
        Self::new(revision, ChatEventKind::SessionCreated { session })
    }

    pub fn session_assigned(
        revision: u64,
        session_id: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self::new(
            revision,
            ChatEventKind::SessionAssigned {
                session_id: session_id.into(),
                agent_id: agent_id.into(),
            },
        )
    }

    pub fn message_sent(revision: u64, session_id: impl Into<String>, message: Message) -> Self {
        Self::new(
            revision,
            ChatEventKind::MessageSent {
                session_id: session_id.into(),
                message,
            },
        )
    }

    pub fn session_closed(
        revision: u64,
        session_id: impl Into<String>,
        released_agent: Option<String>,
    ) -> Self {
        Self::new(
            revision,
            ChatEventKind::SessionClosed {
                session_id: session_id.into(),
                released_agent,
            },
        )
    }
}

/// Fan-out of [`ChatEvent`]s to any number of subscribers.
///
/// Publishing with no subscribers is fine; slow subscribers miss the oldest
/// events and see `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ChatEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: ChatEvent) {
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
