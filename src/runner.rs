use anyhow::Result;

use crate::types::AgentOutcome;

/// One invocation's worth of work, handed as a unit to a pool worker.
#[derive(Debug, Clone)]
pub struct AgentJob {
    pub starting_page: String,
    pub instructions: String,
    pub headless: bool,
    pub api_key: String,
}

/// The automation engine as the service sees it: a strictly blocking call that
/// either produces an outcome or fails with a describable error. Implementors
/// must not assume a tokio context; `run` executes on a plain OS thread.
pub trait AgentRunner: Send + Sync {
    fn run(&self, job: AgentJob) -> Result<AgentOutcome>;
}
