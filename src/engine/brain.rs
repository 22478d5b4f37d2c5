use anyhow::{Result, anyhow};
use reqwest::blocking::Client;
use serde_json::json;
use tracing::debug;

use crate::types::{ChatMessage, PageState, Step};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-5.2";

const SYSTEM_PROMPT: &str = r#"You are a browser automation agent. You control a real Chrome browser by issuing ONE step at a time as JSON.

Available actions:
- {"action":"Navigate","url":"https://..."}
- {"action":"WaitFor","selector":"[data-eid=\"[e0]\"]","timeout_ms":5000}
- {"action":"TypeInto","selector":"[data-eid=\"[e0]\"]","text":"search query"}
- {"action":"Click","selector":"[data-eid=\"[e0]\"]"}
- {"action":"PressKey","key":"Enter"}
- {"action":"Extract","selector":"body","label":"main_content"}
- {"action":"Done","summary":"Completed: found the answer is 42"}

Rules:
1. Return ONLY a single JSON object per response. No markdown, no explanation.
2. Use the [eN] element IDs from the DOM snapshot to target elements. Use selector format: [data-eid="[eN]"]
3. After Navigate, the system will show you the new page DOM. Decide your next step based on what you see.
4. Use TypeInto to fill inputs, then PressKey with "Enter" to submit. Or Click the submit button.
5. When the task is accomplished, use Done with a summary of what was achieved. If the task asked for data as JSON, the summary must contain only that JSON.
6. If you encounter an error, try an alternative approach. If stuck after 3 attempts, use Done to explain.
7. Keep steps minimal. Do not over-navigate."#;

/// Planner for one act. The conversation lives for the current run only and
/// the model is asked for exactly one step per turn.
pub struct Brain {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    conversation: Vec<ChatMessage>,
}

impl Brain {
    pub fn new(api_key: &str) -> Self {
        let endpoint =
            std::env::var("NOVA_ACT_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let model = std::env::var("NOVA_ACT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Self {
            client: Client::new(),
            endpoint,
            model,
            api_key: api_key.to_string(),
            conversation: vec![ChatMessage {
                role: "system".to_string(),
                content: SYSTEM_PROMPT.to_string(),
            }],
        }
    }

    pub fn start_task(&mut self, instructions: &str) {
        self.conversation.push(ChatMessage {
            role: "user".to_string(),
            content: format!(
                "Task: {instructions}\n\nThe browser is on the starting page. What is your next step?"
            ),
        });
    }

    /// Feed the observed page back to the model.
    pub fn observe(&mut self, page: &PageState) {
        let mut observation = format!(
            "Page URL: {}\nTitle: {}\n\nDOM:\n{}",
            page.url, page.title, page.dom_snapshot
        );

        if let Some(ref err) = page.error {
            observation.push_str(&format!("\n\nERROR from last step: {err}"));
        }

        for extraction in &page.extracted {
            observation.push_str(&format!(
                "\n\nExtracted [{}]: {}",
                extraction.label, extraction.content
            ));
        }

        self.conversation.push(ChatMessage {
            role: "user".to_string(),
            content: observation,
        });
    }

    /// Ask the model for the next step. Blocking; runs on a pool worker.
    pub fn decide_next_step(&mut self) -> Result<Step> {
        let messages: Vec<serde_json::Value> = self
            .conversation
            .iter()
            .map(|m| json!({"role": m.role, "content": m.content}))
            .collect();

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "temperature": 0.2,
            }))
            .send()?;

        let status = response.status();
        let body: serde_json::Value = response.json()?;

        if !status.is_success() {
            let message = body["error"]["message"].as_str().unwrap_or("unknown API error");
            return Err(anyhow!("model API error ({status}): {message}"));
        }

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("no content in model response: {body}"))?;

        debug!(content, "planner reply");

        self.conversation.push(ChatMessage {
            role: "assistant".to_string(),
            content: content.to_string(),
        });

        parse_step(content)
    }
}

/// Parse one [`Step`] out of a model reply, tolerating markdown fences.
pub(super) fn parse_step(content: &str) -> Result<Step> {
    let cleaned = strip_fences(content);
    serde_json::from_str(cleaned)
        .map_err(|e| anyhow!("planner returned an unparseable step: {e}: {cleaned}"))
}

pub(super) fn strip_fences(text: &str) -> &str {
    text.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}
