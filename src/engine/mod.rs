mod brain;
mod browser;
mod dom;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::runner::{AgentJob, AgentRunner};
use crate::types::{AgentOutcome, MAX_STEPS, Step};

use brain::Brain;
use browser::BrowserSession;

/// Production [`AgentRunner`]: drives a real Chrome session one planner step
/// at a time until the task reports done or the step cap is hit. Each
/// invocation gets a fresh browser; nothing survives between runs.
#[derive(Debug, Default)]
pub struct BrowserAgent;

impl BrowserAgent {
    pub fn new() -> Self {
        Self
    }
}

impl AgentRunner for BrowserAgent {
    fn run(&self, job: AgentJob) -> Result<AgentOutcome> {
        let session = BrowserSession::launch(job.headless)?;
        let session_id = Uuid::new_v4().to_string();
        let act_id = Uuid::new_v4().to_string();

        session
            .navigate(&job.starting_page)
            .with_context(|| format!("failed to open starting page {}", job.starting_page))?;

        let mut brain = Brain::new(&job.api_key);
        brain.start_task(&job.instructions);

        let mut steps_executed: u32 = 0;
        loop {
            if steps_executed >= MAX_STEPS {
                bail!("exceeded maximum of {MAX_STEPS} steps without completing the task");
            }

            let step = brain.decide_next_step()?;
            steps_executed += 1;

            match step {
                Step::Done { summary } => {
                    info!(steps_executed, "task complete");
                    let (parsed_response, valid_json) = parse_structured(&summary);
                    return Ok(AgentOutcome {
                        response: Some(summary),
                        steps_executed,
                        session_id: Some(session_id),
                        act_id: Some(act_id),
                        parsed_response,
                        valid_json,
                    });
                }
                step => {
                    debug!(?step, steps_executed, "executing step");
                    let page = session.execute(&step);
                    brain.observe(&page);
                }
            }
        }
    }
}

/// Structured payload detection: when the final response reads as JSON, it is
/// surfaced as a parsed payload with a validity flag. A payload that looks
/// like JSON but fails to parse keeps the raw text as the payload value with
/// `valid_json = false`; this is still a successful run.
fn parse_structured(response: &str) -> (Option<Value>, Option<bool>) {
    let cleaned = brain::strip_fences(response);
    if !(cleaned.starts_with('{') || cleaned.starts_with('[')) {
        return (None, None);
    }
    match serde_json::from_str(cleaned) {
        Ok(value) => (Some(value), Some(true)),
        Err(_) => (Some(Value::String(response.to_owned())), Some(false)),
    }
}
