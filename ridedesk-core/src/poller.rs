use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use crate::coordinator::ChatCoordinator;
use crate::error::{RidedeskError, RidedeskResult};
use crate::models::{ChatSession, SessionFilter, SessionStatus};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

const CHANGE_BUFFER: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    Added(ChatSession),
    Updated(ChatSession),
    /// The session no longer matches the poller's filter.
    Removed(String),
}

impl SessionChange {
    pub fn session_id(&self) -> &str {
        match self {
            SessionChange::Added(s) | SessionChange::Updated(s) => &s.id,
            SessionChange::Removed(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    status: SessionStatus,
    message_count: usize,
    agent_id: Option<String>,
}

impl From<&ChatSession> for Fingerprint {
    fn from(session: &ChatSession) -> Self {
        Self {
            status: session.status,
            message_count: session.messages.len(),
            agent_id: session.agent_id.clone(),
        }
    }
}

/// Compares `current` with what was rendered last time and updates `seen`.
fn diff_sessions(
    seen: &mut HashMap<String, Fingerprint>,
    current: &[ChatSession],
) -> Vec<SessionChange> {
    let mut changes = Vec::new();
    let mut next = HashMap::with_capacity(current.len());

    for session in current {
        let fingerprint = Fingerprint::from(session);
        match seen.get(&session.id) {
            None => changes.push(SessionChange::Added(session.clone())),
            Some(previous) if *previous != fingerprint => {
                changes.push(SessionChange::Updated(session.clone()))
            }
            Some(_) => {}
        }
        next.insert(session.id.clone(), fingerprint);
    }

    let mut removed: Vec<&String> = seen.keys().filter(|id| !next.contains_key(*id)).collect();
    removed.sort();
    changes.extend(removed.into_iter().cloned().map(SessionChange::Removed));

    *seen = next;
    changes
}

/// Refreshes a session list view on a fixed interval.
///
/// Each tick calls `list_sessions` and forwards only what changed since the
/// previous tick. The first tick reports every matching session as added.
pub struct SessionPoller {
    coordinator: Arc<ChatCoordinator>,
    period: Duration,
    filter: SessionFilter,
    running: Arc<RwLock<bool>>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl SessionPoller {
    pub fn new(coordinator: Arc<ChatCoordinator>, period: Duration) -> Self {
        Self {
            coordinator,
            period,
            filter: SessionFilter::default(),
            running: Arc::new(RwLock::new(false)),
            shutdown_tx: Mutex::new(None),
        }
    }

    pub fn with_filter(mut self, filter: SessionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub async fn start(&self) -> RidedeskResult<mpsc::Receiver<Vec<SessionChange>>> {
        if self.period.is_zero() {
            return Err(RidedeskError::InvalidConfigValue {
                key: "polling.interval_ms".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        {
            let mut running = self.running.write().await;
            if *running {
                return Err(RidedeskError::Internal(
                    "Session poller is already running".to_string(),
                ));
            }
            *running = true;
        }

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        *self.shutdown_tx.lock().await = Some(shutdown_tx);

        let (tx, rx) = mpsc::channel(CHANGE_BUFFER);
        let coordinator = self.coordinator.clone();
        let filter = self.filter.clone();
        let running = self.running.clone();
        let period = self.period;

        info!(interval_ms = period.as_millis() as u64, "Starting session poller");

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut seen = HashMap::new();

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!("Session poller received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        let sessions = coordinator.list_sessions(&filter).await;
                        let changes = diff_sessions(&mut seen, &sessions);
                        if changes.is_empty() {
                            continue;
                        }
                        debug!(changes = changes.len(), "Session poller detected changes");
                        if tx.send(changes).await.is_err() {
                            debug!("Session poller receiver dropped");
                            break;
                        }
                    }
                }
            }

            *running.write().await = false;
            info!("Session poller stopped");
        });

        Ok(rx)
    }

    pub async fn stop(&self) {
        if let Some(tx) = self.shutdown_tx.lock().await.take() {
            let _ = tx.send(());
        }
    }
}
