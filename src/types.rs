use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of automation steps a single act may execute.
pub const MAX_STEPS: u32 = 30;

fn default_headless() -> bool {
    true
}

/// Body of `POST /agent/run`. Immutable once received, scoped to one invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentRequest {
    pub starting_page: String,
    pub instructions: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
}

/// What a successful agent run produces. Failures never reach this type;
/// they travel as errors and are shaped by [`AgentResponse::failed`].
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub response: Option<String>,
    pub steps_executed: u32,
    pub session_id: Option<String>,
    pub act_id: Option<String>,
    pub parsed_response: Option<Value>,
    pub valid_json: Option<bool>,
}

/// Wire contract for `/agent/run`. Every field is present in the JSON body;
/// absent values serialize as explicit nulls so callers can rely on the shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub success: bool,
    pub response: Option<String>,
    pub error: Option<String>,
    pub steps_executed: u32,
    pub session_id: Option<String>,
    pub act_id: Option<String>,
    pub parsed_response: Option<Value>,
    pub valid_json: Option<bool>,
}

impl AgentResponse {
    pub fn completed(outcome: AgentOutcome) -> Self {
        Self {
            success: true,
            response: outcome.response,
            error: None,
            steps_executed: outcome.steps_executed,
            session_id: outcome.session_id,
            act_id: outcome.act_id,
            parsed_response: outcome.parsed_response,
            valid_json: outcome.valid_json,
        }
    }

    /// Collapse any failure into the one failure shape: the message is carried
    /// verbatim, counters are zeroed and identifiers are null.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            response: None,
            error: Some(message.into()),
            steps_executed: 0,
            session_id: None,
            act_id: None,
            parsed_response: None,
            valid_json: None,
        }
    }
}

/// A single atomic step the planner asks the browser to perform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Step {
    Navigate { url: String },
    WaitFor { selector: String, timeout_ms: u64 },
    TypeInto { selector: String, text: String },
    Click { selector: String },
    PressKey { key: String },
    Extract { selector: String, label: String },
    Done { summary: String },
}

/// What the agent observes after executing a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageState {
    pub url: String,
    pub title: String,
    pub dom_snapshot: String,
    pub extracted: Vec<Extraction>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub label: String,
    pub content: String,
}

/// A message in the conversation history sent to the planner model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

pub const DOM_SNAPSHOT_MAX_CHARS: usize = 4000;
