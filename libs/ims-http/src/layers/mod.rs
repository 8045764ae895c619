//! Tower layers applied to every outbound request.

mod user_agent;

pub use user_agent::UserAgentLayer;
