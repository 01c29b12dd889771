pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod models;
pub mod poller;
pub mod roster;
pub mod store;

pub use config::{
    get_config_dir, get_data_dir, AssignmentConfig, LoggingConfig, PollingConfig,
    RidedeskConfig, StorageConfig,
};
pub use coordinator::{ChatCoordinator, CoordinatorSettings};
pub use error::{CliErrorDisplay, ErrorContext, ErrorKind, RidedeskError, RidedeskResult};
pub use events::{ChatEvent, ChatEventKind, EventBus, DEFAULT_EVENT_CAPACITY};
pub use models::{
    Agent, AgentStatus, ChatSession, ChatStats, Message, MessageSender, SessionFilter,
    SessionStatus, UserType,
};
pub use poller::{SessionChange, SessionPoller, DEFAULT_POLL_INTERVAL};
pub use roster::{build_roster, default_roster, AgentSeed};
pub use store::{JsonFileStore, MemorySnapshotStore, Snapshot, SnapshotStore};
