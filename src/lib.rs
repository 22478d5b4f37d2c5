pub mod config;
pub mod engine;
pub mod pool;
pub mod runner;
pub mod server;
pub mod types;

pub use config::Config;
pub use pool::{POOL_SIZE, WorkerPool};
pub use runner::{AgentJob, AgentRunner};
pub use types::{AgentOutcome, AgentRequest, AgentResponse};
