//! The support-chat coordinator.
//!
//! [`ChatCoordinator`] is the single owner of every chat session and of the
//! agent roster. All mutations run under one async mutex, publish a
//! [`ChatEvent`] while still holding it, and then hand a snapshot to the
//! configured [`SnapshotStore`]. A failed save is logged and never undoes the
//! in-memory change.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::config::RidedeskConfig;
use crate::error::{RidedeskError, RidedeskResult};
use crate::events::{ChatEvent, EventBus, DEFAULT_EVENT_CAPACITY};
use crate::models::{
    Agent, AgentStatus, ChatSession, ChatStats, Message, MessageSender, SessionFilter,
    SessionStatus, UserType,
};
use crate::roster::build_roster;
use crate::store::{JsonFileStore, Snapshot, SnapshotStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Retry assignment for waiting sessions whenever a close frees a slot.
    pub sweep_on_close: bool,
    /// Retry assignment for waiting sessions right after loading a snapshot.
    pub sweep_on_load: bool,
    pub event_capacity: usize,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            sweep_on_close: false,
            sweep_on_load: false,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl CoordinatorSettings {
    pub fn from_config(config: &RidedeskConfig) -> Self {
        Self {
            sweep_on_close: config.assignment.sweep_on_close,
            sweep_on_load: config.assignment.sweep_on_load,
            event_capacity: config.assignment.event_capacity,
        }
    }
}

struct ChatState {
    sessions: HashMap<String, ChatSession>,
    /// Session ids in creation order.
    order: Vec<String>,
    agents: Vec<Agent>,
    revision: u64,
}

/// Copies configured fields from `seed` onto a snapshot agent unless the
/// sessions it already holds would break the new capacity or user type.
fn apply_roster_edits(agent: &mut Agent, seed: &Agent, sessions: &[ChatSession]) {
    if agent.name == seed.name
        && agent.email == seed.email
        && agent.user_type == seed.user_type
        && agent.max_chats == seed.max_chats
    {
        return;
    }

    let held: Vec<&ChatSession> = sessions
        .iter()
        .filter(|s| {
            s.status == SessionStatus::Connected && s.agent_id.as_deref() == Some(agent.id.as_str())
        })
        .collect();
    let fits = held.len() as u32 <= seed.max_chats
        && held.iter().all(|s| s.user_type == seed.user_type);

    if !fits {
        warn!(
            agent_id = %agent.id,
            connected = held.len(),
            snapshot_max_chats = agent.max_chats,
            roster_max_chats = seed.max_chats,
            snapshot_user_type = %agent.user_type,
            roster_user_type = %seed.user_type,
            "Roster edit conflicts with connected sessions, keeping snapshot values"
        );
        return;
    }

    info!(
        agent_id = %agent.id,
        max_chats = seed.max_chats,
        user_type = %seed.user_type,
        "Applying roster changes to snapshot agent"
    );
    agent.name = seed.name.clone();
    agent.email = seed.email.clone();
    agent.user_type = seed.user_type;
    agent.max_chats = seed.max_chats;
}

impl ChatState {
    fn new(agents: Vec<Agent>) -> Self {
        Self {
            sessions: HashMap::new(),
            order: Vec::new(),
            agents,
            revision: 0,
        }
    }

    /// Rebuilds state from a validated snapshot.
    ///
    /// Configured edits to an agent's name, email, user type or capacity are
    /// applied when the agent's connected sessions still fit them. Roster
    /// agents missing from the snapshot are appended.
    fn from_snapshot(snapshot: Snapshot, roster: Vec<Agent>) -> Self {
        let mut agents = snapshot.agents;
        for agent in &mut agents {
            match roster.iter().find(|seed| seed.id == agent.id) {
                Some(seed) => apply_roster_edits(agent, seed, &snapshot.sessions),
                None => warn!(
                    agent_id = %agent.id,
                    "Snapshot agent is not on the configured roster, keeping it"
                ),
            }
        }
        for agent in roster {
            if !agents.iter().any(|a| a.id == agent.id) {
                info!(agent_id = %agent.id, "Adding roster agent missing from snapshot");
                agents.push(agent);
            }
        }

        let mut state = Self {
            sessions: HashMap::with_capacity(snapshot.sessions.len()),
            order: Vec::with_capacity(snapshot.sessions.len()),
            agents,
            revision: snapshot.revision,
        };

        for session in snapshot.sessions {
            state.order.push(session.id.clone());
            state.sessions.insert(session.id.clone(), session);
        }

        state.reconcile_agents();
        state
    }

    /// Recomputes every agent counter from the connected sessions.
    fn reconcile_agents(&mut self) {
        let mut connected: HashMap<&str, u32> = HashMap::new();
        for session in self.sessions.values() {
            if session.status != SessionStatus::Connected {
                continue;
            }
            if let Some(agent_id) = session.agent_id.as_deref() {
                *connected.entry(agent_id).or_insert(0) += 1;
                if !self.agents.iter().any(|a| a.id == agent_id) {
                    warn!(
                        session_id = %session.id,
                        agent_id = %agent_id,
                        "Connected session references an agent that is not on the roster"
                    );
                }
            }
        }

        for agent in &mut self.agents {
            let count = connected.get(agent.id.as_str()).copied().unwrap_or(0);
            if count != agent.active_chats {
                warn!(
                    agent_id = %agent.id,
                    stored = agent.active_chats,
                    actual = count,
                    "Agent chat counter drifted from sessions, recomputing"
                );
            }
            if count > agent.max_chats {
                warn!(
                    agent_id = %agent.id,
                    connected = count,
                    max_chats = agent.max_chats,
                    "Agent holds more sessions than its capacity"
                );
            }
            agent.reset_active_chats(count);
        }
    }

    fn session(&self, session_id: &str) -> RidedeskResult<&ChatSession> {
        self.sessions
            .get(session_id)
            .ok_or_else(|| RidedeskError::SessionNotFound(session_id.to_string()))
    }

    fn session_mut(&mut self, session_id: &str) -> RidedeskResult<&mut ChatSession> {
        self.sessions
            .get_mut(session_id)
            .ok_or_else(|| RidedeskError::SessionNotFound(session_id.to_string()))
    }

    fn first_eligible(&self, user_type: UserType) -> Option<&Agent> {
        self.agents.iter().find(|a| a.is_eligible_for(user_type))
    }

    /// Attempts to connect a waiting session. Returns the chosen agent id.
    fn assign(&mut self, session_id: &str) -> RidedeskResult<Option<String>> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| RidedeskError::SessionNotFound(session_id.to_string()))?;

        if !session.status.can_transition_to(SessionStatus::Connected) {
            debug!(
                session_id = %session_id,
                status = %session.status,
                "Session is not waiting, skipping assignment"
            );
            return Ok(None);
        }

        let user_type = session.user_type;
        let Some(agent) = self.agents.iter_mut().find(|a| a.is_eligible_for(user_type)) else {
            warn!(
                session_id = %session_id,
                user_type = %user_type,
                "No available agent, session stays waiting"
            );
            return Ok(None);
        };

        agent.claim_slot();
        session.mark_connected(&agent.id);

        info!(
            session_id = %session_id,
            agent_id = %agent.id,
            active_chats = agent.active_chats,
            max_chats = agent.max_chats,
            "Session assigned"
        );

        Ok(Some(agent.id.clone()))
    }

    /// Retries assignment for every waiting session in creation order.
    fn sweep(&mut self) -> Vec<(String, String)> {
        let waiting: Vec<String> = self
            .order
            .iter()
            .filter(|id| self.sessions.get(*id).is_some_and(|s| s.is_waiting()))
            .cloned()
            .collect();

        let mut assigned = Vec::new();
        for session_id in waiting {
            if let Ok(Some(agent_id)) = self.assign(&session_id) {
                assigned.push((session_id, agent_id));
            }
        }
        assigned
    }

    fn release_agent(&mut self, agent_id: &str) {
        match self.agents.iter_mut().find(|a| a.id == agent_id) {
            Some(agent) => {
                agent.release_slot();
                debug!(
                    agent_id = %agent_id,
                    active_chats = agent.active_chats,
                    status = %agent.status,
                    "Released agent slot"
                );
            }
            None => warn!(agent_id = %agent_id, "Cannot release unknown agent"),
        }
    }

    fn bump(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn snapshot(&self) -> Snapshot {
        let sessions = self
            .order
            .iter()
            .filter_map(|id| self.sessions.get(id).cloned())
            .collect();
        Snapshot::new(self.revision, sessions, self.agents.clone())
    }
}

/// Owns support-chat sessions and agents, and assigns one to the other.
pub struct ChatCoordinator {
    state: Mutex<ChatState>,
    store: Arc<dyn SnapshotStore>,
    events: EventBus,
    settings: CoordinatorSettings,
    /// Highest revision the store has accepted.
    persisted: Mutex<u64>,
}

impl ChatCoordinator {
    /// Starts with an empty inbox, ignoring anything already in `store`.
    pub fn new(agents: Vec<Agent>, store: Arc<dyn SnapshotStore>) -> Self {
        Self::with_settings(agents, store, CoordinatorSettings::default())
    }

    pub fn with_settings(
        agents: Vec<Agent>,
        store: Arc<dyn SnapshotStore>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self::from_state(ChatState::new(agents), store, settings)
    }

    fn from_state(
        state: ChatState,
        store: Arc<dyn SnapshotStore>,
        settings: CoordinatorSettings,
    ) -> Self {
        let persisted = state.revision;
        Self {
            state: Mutex::new(state),
            store,
            events: EventBus::new(settings.event_capacity),
            settings,
            persisted: Mutex::new(persisted),
        }
    }

    /// Seeds state from the store's snapshot, or from `roster` on first run.
    ///
    /// Load failures are returned: starting empty over an unreadable snapshot
    /// would overwrite it on the first save.
    pub async fn load(
        store: Arc<dyn SnapshotStore>,
        roster: Vec<Agent>,
        settings: CoordinatorSettings,
    ) -> RidedeskResult<Self> {
        let state = match store.load_snapshot().await? {
            Some(snapshot) => {
                snapshot.validate()?;
                info!(
                    location = %store.location(),
                    revision = snapshot.revision,
                    sessions = snapshot.sessions.len(),
                    agents = snapshot.agents.len(),
                    "Loaded chat snapshot"
                );
                ChatState::from_snapshot(snapshot, roster)
            }
            None => {
                info!(
                    location = %store.location(),
                    agents = roster.len(),
                    "No chat snapshot found, starting from roster"
                );
                ChatState::new(roster)
            }
        };

        let sweep_on_load = settings.sweep_on_load;
        let coordinator = Self::from_state(state, store, settings);

        if sweep_on_load {
            coordinator.sweep_waiting().await;
        }

        Ok(coordinator)
    }

    /// Builds the roster, file store and settings described by `config`.
    pub async fn from_config(config: &RidedeskConfig) -> RidedeskResult<Self> {
        let roster = build_roster(config.roster_seeds())?;
        let store = JsonFileStore::new(config.snapshot_path()).with_pretty(config.storage.pretty);
        Self::load(
            Arc::new(store),
            roster,
            CoordinatorSettings::from_config(config),
        )
        .await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    pub async fn revision(&self) -> u64 {
        self.state.lock().await.revision
    }

    /// Opens a new session and immediately tries to hand it to an agent.
    ///
    /// A blank `initial_message` is dropped rather than rejected.
    pub async fn create_session(
        &self,
        user_id: &str,
        user_name: &str,
        user_type: UserType,
        initial_message: Option<&str>,
    ) -> ChatSession {
        let (session, snapshot) = {
            let mut state = self.state.lock().await;

            let mut session = ChatSession::new(user_id, user_name, user_type);
            if let Some(text) = initial_message.map(str::trim).filter(|t| !t.is_empty()) {
                session.push_message(text.to_string(), MessageSender::User);
            }

            let session_id = session.id.clone();
            state.order.push(session_id.clone());
            state.sessions.insert(session_id.clone(), session.clone());
            let revision = state.bump();

            info!(
                session_id = %session_id,
                user_id = %user_id,
                user_type = %user_type,
                "Chat session created"
            );
            self.events
                .publish(ChatEvent::session_created(revision, session.clone()));

            if let Ok(Some(agent_id)) = state.assign(&session_id) {
                self.events
                    .publish(ChatEvent::session_assigned(revision, &session_id, agent_id));
            }

            if let Some(current) = state.sessions.get(&session_id) {
                session = current.clone();
            }
            (session, state.snapshot())
        };

        self.persist(snapshot).await;
        session
    }

    /// Connects a waiting session to the first eligible agent in roster order.
    ///
    /// Returns `false` when nobody is free or the session is no longer waiting.
    pub async fn assign(&self, session_id: &str) -> RidedeskResult<bool> {
        let snapshot = {
            let mut state = self.state.lock().await;
            match state.assign(session_id)? {
                Some(agent_id) => {
                    let revision = state.bump();
                    self.events
                        .publish(ChatEvent::session_assigned(revision, session_id, agent_id));
                    state.snapshot()
                }
                None => return Ok(false),
            }
        };

        self.persist(snapshot).await;
        Ok(true)
    }

    /// Retries assignment for all waiting sessions, oldest first.
    pub async fn sweep_waiting(&self) -> usize {
        let (count, snapshot) = {
            let mut state = self.state.lock().await;
            let assigned = state.sweep();
            if assigned.is_empty() {
                debug!("Sweep found nothing to assign");
                return 0;
            }

            let revision = state.bump();
            for (session_id, agent_id) in &assigned {
                self.events
                    .publish(ChatEvent::session_assigned(revision, session_id, agent_id));
            }
            info!(assigned = assigned.len(), "Sweep assigned waiting sessions");
            (assigned.len(), state.snapshot())
        };

        self.persist(snapshot).await;
        count
    }

    pub async fn send_message(
        &self,
        session_id: &str,
        text: &str,
        sender: MessageSender,
    ) -> RidedeskResult<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RidedeskError::invalid_argument(
                "text",
                "Message text must not be empty",
            ));
        }

        let (message, snapshot) = {
            let mut state = self.state.lock().await;
            let session = state.session_mut(session_id)?;
            if session.is_closed() {
                return Err(RidedeskError::SessionClosed(session_id.to_string()));
            }

            let message = session.push_message(text.to_string(), sender);
            let revision = state.bump();

            debug!(
                session_id = %session_id,
                message_id = message.id,
                sender = %sender,
                "Message appended"
            );
            self.events
                .publish(ChatEvent::message_sent(revision, session_id, message.clone()));

            (message, state.snapshot())
        };

        self.persist(snapshot).await;
        Ok(message)
    }

    /// Closes a session and frees its agent slot. Closing twice is a no-op.
    pub async fn close_session(&self, session_id: &str) -> RidedeskResult<()> {
        let snapshot = {
            let mut state = self.state.lock().await;
            let session = state.session_mut(session_id)?;

            if session.is_closed() {
                debug!(session_id = %session_id, "Session already closed");
                return Ok(());
            }

            let released = if session.is_connected() {
                session.agent_id.clone()
            } else {
                None
            };
            session.mark_closed();

            if let Some(ref agent_id) = released {
                state.release_agent(agent_id);
            }

            let revision = state.bump();
            info!(
                session_id = %session_id,
                released_agent = released.as_deref().unwrap_or("-"),
                "Chat session closed"
            );
            self.events.publish(ChatEvent::session_closed(
                revision,
                session_id,
                released.clone(),
            ));

            if self.settings.sweep_on_close && released.is_some() {
                for (waiting_id, agent_id) in state.sweep() {
                    self.events
                        .publish(ChatEvent::session_assigned(revision, waiting_id, agent_id));
                }
            }

            state.snapshot()
        };

        self.persist(snapshot).await;
        Ok(())
    }

    /// Sessions matching `filter`, in creation order.
    pub async fn list_sessions(&self, filter: &SessionFilter) -> Vec<ChatSession> {
        let state = self.state.lock().await;
        state
            .order
            .iter()
            .filter_map(|id| state.sessions.get(id))
            .filter(|s| filter.matches(s))
            .cloned()
            .collect()
    }

    pub async fn get_session(&self, session_id: &str) -> RidedeskResult<ChatSession> {
        self.state.lock().await.session(session_id).cloned()
    }

    /// The agent `assign` would pick for `user_type` right now, if any.
    pub async fn get_available_agent(&self, user_type: UserType) -> Option<Agent> {
        self.state.lock().await.first_eligible(user_type).cloned()
    }

    pub async fn list_agents(&self) -> Vec<Agent> {
        self.state.lock().await.agents.clone()
    }

    pub async fn get_agent(&self, agent_id: &str) -> RidedeskResult<Agent> {
        self.state
            .lock()
            .await
            .agents
            .iter()
            .find(|a| a.id == agent_id)
            .cloned()
            .ok_or_else(|| RidedeskError::AgentNotFound(agent_id.to_string()))
    }

    pub async fn stats(&self) -> ChatStats {
        let state = self.state.lock().await;
        let mut stats = ChatStats {
            total: state.sessions.len(),
            ..ChatStats::default()
        };

        for session in state.sessions.values() {
            match session.status {
                SessionStatus::Waiting => stats.waiting += 1,
                SessionStatus::Connected => stats.connected += 1,
                SessionStatus::Closed => stats.closed += 1,
            }
        }

        for agent in &state.agents {
            match agent.status {
                AgentStatus::Available => stats.agents_available += 1,
                AgentStatus::Busy => stats.agents_busy += 1,
            }
            stats.open_capacity += agent.open_slots();
        }

        stats
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.state.lock().await.snapshot()
    }

    /// Adopts the store's snapshot when another writer has moved it past our
    /// revision. Returns whether anything was replaced.
    pub async fn refresh_from_store(&self) -> RidedeskResult<bool> {
        let Some(snapshot) = self.store.load_snapshot().await? else {
            return Ok(false);
        };

        let mut state = self.state.lock().await;
        if snapshot.revision <= state.revision {
            return Ok(false);
        }
        snapshot.validate()?;

        let revision = snapshot.revision;
        let roster = state.agents.clone();
        *state = ChatState::from_snapshot(snapshot, roster);
        *self.persisted.lock().await = revision;

        debug!(
            location = %self.store.location(),
            revision = revision,
            "Refreshed state from snapshot"
        );
        Ok(true)
    }

    async fn persist(&self, snapshot: Snapshot) {
        let mut persisted = self.persisted.lock().await;
        if snapshot.revision <= *persisted {
            debug!(
                revision = snapshot.revision,
                persisted = *persisted,
                "Skipping stale snapshot"
            );
            return;
        }

        match self.store.save_snapshot(&snapshot).await {
            Ok(()) => *persisted = snapshot.revision,
            Err(e) => e.log_with_context(&crate::error_context!("save_snapshot")),
        }
    }
}
