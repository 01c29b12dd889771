use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent::UserType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Connected,
    Closed,
}

impl SessionStatus {
    /// Allowed moves are `waiting -> connected -> closed` and `waiting -> closed`.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Waiting, SessionStatus::Connected)
                | (SessionStatus::Waiting, SessionStatus::Closed)
                | (SessionStatus::Connected, SessionStatus::Closed)
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Waiting => write!(f, "waiting"),
            SessionStatus::Connected => write!(f, "connected"),
            SessionStatus::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "waiting" => Ok(SessionStatus::Waiting),
            "connected" => Ok(SessionStatus::Connected),
            "closed" => Ok(SessionStatus::Closed),
            other => Err(format!(
                "Unknown session status '{}'. Must be one of: waiting, connected, closed",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSender {
    User,
    Agent,
}

impl std::fmt::Display for MessageSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageSender::User => write!(f, "user"),
            MessageSender::Agent => write!(f, "agent"),
        }
    }
}

impl std::str::FromStr for MessageSender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(MessageSender::User),
            "agent" => Ok(MessageSender::Agent),
            other => Err(format!(
                "Unknown sender '{}'. Must be one of: user, agent",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: u64,
    pub text: String,
    pub sender: MessageSender,
    pub timestamp: DateTime<Utc>,
}

/// One support conversation between an end user and at most one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub user_type: UserType,
    pub agent_id: Option<String>,
    pub status: SessionStatus,
    pub messages: Vec<Message>,
    pub last_message: Option<String>,
    pub last_message_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl ChatSession {
    pub fn new(
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        user_type: UserType,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            user_name: user_name.into(),
            user_type,
            agent_id: None,
            status: SessionStatus::Waiting,
            messages: Vec::new(),
            last_message: None,
            last_message_time: None,
            created_at: Utc::now(),
            assigned_at: None,
            closed_at: None,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.status == SessionStatus::Waiting
    }

    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }

    pub fn is_closed(&self) -> bool {
        self.status == SessionStatus::Closed
    }

    /// Appends a message and keeps the `last_message` cache on the tail.
    ///
    /// `text` is expected to be validated and trimmed by the caller.
    pub(crate) fn push_message(&mut self, text: String, sender: MessageSender) -> Message {
        let next_id = self.messages.last().map(|m| m.id + 1).unwrap_or(1);
        let message = Message {
            id: next_id,
            text,
            sender,
            timestamp: Utc::now(),
        };

        self.last_message = Some(message.text.clone());
        self.last_message_time = Some(message.timestamp);
        self.messages.push(message.clone());

        message
    }

    pub(crate) fn mark_connected(&mut self, agent_id: &str) {
        self.agent_id = Some(agent_id.to_string());
        self.status = SessionStatus::Connected;
        self.assigned_at = Some(Utc::now());
    }

    pub(crate) fn mark_closed(&mut self) {
        self.status = SessionStatus::Closed;
        self.closed_at = Some(Utc::now());
    }

    /// True when the cached `last_message` fields agree with `messages`.
    pub fn last_message_consistent(&self) -> bool {
        match self.messages.last() {
            Some(tail) => {
                self.last_message.as_deref() == Some(tail.text.as_str())
                    && self.last_message_time == Some(tail.timestamp)
            }
            None => self.last_message.is_none() && self.last_message_time.is_none(),
        }
    }

    /// Most recent activity, used by list views that sort newest first.
    pub fn last_activity(&self) -> DateTime<Utc> {
        [
            Some(self.created_at),
            self.last_message_time,
            self.assigned_at,
            self.closed_at,
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(self.created_at)
    }
}
