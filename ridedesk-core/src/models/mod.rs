mod agent;
mod filter;
mod session;

pub use agent::{Agent, AgentStatus, UserType};
pub use filter::{ChatStats, SessionFilter};
pub use session::{ChatSession, Message, MessageSender, SessionStatus};
