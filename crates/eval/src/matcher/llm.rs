//! LLM-assisted matcher: LlmMatcher, LlmClient trait, AnthropicClient.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use maze_core::SopGraph;

use super::{Choice, MatchError, ResponseMatcher, ResponseTrace, TraceEntry};

/// Error type for LLM client operations.
#[derive(Debug)]
pub enum LlmError {
    /// Network or HTTP error.
    NetworkError(String),
    /// LLM API returned an error response.
    ApiError { status: u16, message: String },
    /// Failed to parse the LLM response.
    ParseError(String),
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::NetworkError(msg) => write!(f, "LLM network error: {}", msg),
            LlmError::ApiError { status, message } => {
                write!(f, "LLM API error ({}): {}", status, message)
            }
            LlmError::ParseError(msg) => write!(f, "LLM parse error: {}", msg),
        }
    }
}

impl std::error::Error for LlmError {}

/// A message in an LLM conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// Trait for calling an LLM to get a text completion.
///
/// Implementations handle the specifics of the LLM API (Anthropic, OpenAI, etc.).
/// The matcher handles prompt construction and response parsing.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send messages to the LLM and get a text response.
    async fn complete(&self, messages: Vec<Message>, model: &str) -> Result<String, LlmError>;
}

/// A matcher that asks an LLM which decision points a response addressed.
///
/// Serializes the decision points and the response into a structured
/// prompt, calls the LLM, and parses the reply into a validated
/// [`ResponseTrace`]. Claims that name points or actions absent from
/// the definition are never trusted: unknown points are reported as
/// extraneous, unknown actions degrade the point to ambiguous.
pub struct LlmMatcher {
    /// The LLM client to use for completions.
    pub client: Box<dyn LlmClient>,
    /// System prompt override. If empty, the default system prompt is used.
    pub system_prompt: String,
    /// Model identifier (e.g., "claude-sonnet-4-20250514").
    pub model: String,
    /// Maximum number of retries on invalid responses.
    pub max_retries: usize,
}

impl LlmMatcher {
    /// Create a new LlmMatcher with default settings.
    pub fn new(client: Box<dyn LlmClient>, model: String) -> Self {
        Self {
            client,
            system_prompt: String::new(),
            model,
            max_retries: 2,
        }
    }

    fn default_system_prompt() -> String {
        r#"You read a free-text answer and decide which decision points from a procedure it addresses, and which listed action it commits to at each one.

You will receive a JSON object with "decision_points" (each with an id and its candidate actions) and "response" (the free text).
You must respond with a JSON object in exactly this format:

{
  "matches": [
    {"point": "<decision point id>", "action": "<action id, or null if the text addresses the point without committing to one listed action>"}
  ]
}

Rules:
- Only include a point when the text genuinely engages with that decision.
- "point" MUST be an id from the "decision_points" list; "action" MUST be an id listed under that point, or null.
- List matches in the order the text commits to them.
- An empty "matches" array is a valid answer.
- Respond only with valid JSON. Do not include markdown fences or other text."#
            .to_string()
    }

    /// Build the user message from the definition and the response text.
    fn build_user_message(graph: &SopGraph, response: &str) -> String {
        let points: Vec<serde_json::Value> = graph
            .points()
            .iter()
            .map(|p| {
                serde_json::json!({
                    "id": p.id,
                    "actions": p.actions.iter().map(|a| {
                        serde_json::json!({"id": a.id, "text": a.text})
                    }).collect::<Vec<_>>(),
                })
            })
            .collect();
        let points_json =
            serde_json::to_string_pretty(&points).unwrap_or_else(|_| "[]".to_string());
        let response_json =
            serde_json::to_string(response).unwrap_or_else(|_| "\"\"".to_string());

        format!(
            r#"{{
  "decision_points": {points_json},
  "response": {response_json}
}}"#
        )
    }

    /// Parse the LLM reply and validate it against the definition.
    ///
    /// Returns a trace on success, Err(message) on malformed replies
    /// (triggers retry).
    fn parse_reply(reply: &str, graph: &SopGraph) -> Result<ResponseTrace, String> {
        let json_str = strip_code_fences(reply);

        let value: serde_json::Value =
            serde_json::from_str(json_str).map_err(|e| format!("Failed to parse JSON: {}", e))?;

        let matches = value
            .get("matches")
            .and_then(|v| v.as_array())
            .ok_or_else(|| "Reply missing 'matches' array".to_string())?;

        let mut trace = ResponseTrace::default();
        for entry in matches {
            let point_id = entry
                .get("point")
                .and_then(|v| v.as_str())
                .ok_or_else(|| "Match missing 'point' field or it is not a string".to_string())?;

            let Some(point) = graph.get(point_id) else {
                // The model named a point the definition does not have.
                // Record it as extraneous rather than trusting the claim.
                if !trace.extraneous.iter().any(|p| p == point_id) {
                    trace.extraneous.push(point_id.to_string());
                }
                continue;
            };

            let choice = match entry.get("action") {
                None | Some(serde_json::Value::Null) => Choice::Ambiguous(Vec::new()),
                Some(serde_json::Value::String(action_id)) => {
                    if point.action(action_id).is_some() {
                        Choice::Selected(action_id.clone())
                    } else {
                        // Claimed an action that is not a candidate here.
                        Choice::Ambiguous(Vec::new())
                    }
                }
                Some(other) => {
                    return Err(format!(
                        "Match 'action' must be a string or null, got: {}",
                        other
                    ))
                }
            };

            // Repeated claims for one point: agreement on a single
            // action stands; distinct actions are a contradiction.
            if let Some(existing) = trace.entries.iter_mut().find(|e| e.point == point.id) {
                let mut ids = match &existing.choice {
                    Choice::Selected(id) => vec![id.clone()],
                    Choice::Ambiguous(ids) => ids.clone(),
                };
                if let Choice::Selected(id) = &choice {
                    if !ids.contains(id) {
                        ids.push(id.clone());
                    }
                }
                existing.choice = if ids.len() == 1 {
                    Choice::Selected(ids.remove(0))
                } else {
                    Choice::Ambiguous(ids)
                };
                continue;
            }

            trace.entries.push(TraceEntry {
                point: point.id.clone(),
                choice,
            });
        }

        Ok(trace)
    }
}

#[async_trait]
impl ResponseMatcher for LlmMatcher {
    async fn match_response(
        &self,
        response: &str,
        graph: &SopGraph,
    ) -> Result<ResponseTrace, MatchError> {
        let system_prompt = if self.system_prompt.is_empty() {
            Self::default_system_prompt()
        } else {
            self.system_prompt.clone()
        };

        let user_message = Self::build_user_message(graph, response);

        let mut messages: Vec<Message> = vec![
            Message {
                role: "system".to_string(),
                content: system_prompt,
            },
            Message {
                role: "user".to_string(),
                content: user_message,
            },
        ];

        // Retry loop
        let mut attempt = 0;
        loop {
            let reply = self
                .client
                .complete(messages.clone(), &self.model)
                .await
                .map_err(|e| MatchError::Failed(e.to_string()))?;

            match Self::parse_reply(&reply, graph) {
                Ok(trace) => return Ok(trace),
                Err(parse_error) => {
                    if attempt >= self.max_retries {
                        return Err(MatchError::Failed(format!(
                            "max retries ({}) exhausted, last error: {}",
                            self.max_retries, parse_error
                        )));
                    }
                    attempt += 1;

                    // Append the bad reply and a correction prompt
                    messages.push(Message {
                        role: "assistant".to_string(),
                        content: reply,
                    });
                    messages.push(Message {
                        role: "user".to_string(),
                        content: format!(
                            "Your response was invalid: {}. Please try again, responding with valid JSON only.",
                            parse_error
                        ),
                    });
                }
            }
        }
    }
}

/// Strip markdown code fences from a reply, if present.
fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the fence line
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

// -- AnthropicClient (feature-gated) --

#[cfg(feature = "anthropic")]
/// Reference LLM client implementation using the Anthropic Messages API.
///
/// Uses `ureq` for HTTP. Reads the API key from the `ANTHROPIC_API_KEY`
/// environment variable.
pub struct AnthropicClient {
    /// API key for authentication.
    pub api_key: String,
    /// Base URL (default: https://api.anthropic.com).
    pub base_url: String,
}

#[cfg(feature = "anthropic")]
impl AnthropicClient {
    /// Create a new AnthropicClient from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            LlmError::NetworkError("ANTHROPIC_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self::new(api_key))
    }

    /// Create a new AnthropicClient with an explicit API key.
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: "https://api.anthropic.com".to_string(),
        }
    }
}

#[cfg(feature = "anthropic")]
#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, messages: Vec<Message>, model: &str) -> Result<String, LlmError> {
        let api_key = self.api_key.clone();
        let base_url = self.base_url.clone();
        let model = model.to_string();

        // The Anthropic API takes the system prompt as a separate field
        let system: Option<String> = messages
            .iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.clone());

        let non_system: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| {
                serde_json::json!({
                    "role": m.role,
                    "content": m.content,
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": model,
            "max_tokens": 1024,
            "messages": non_system,
        });

        if let Some(sys) = system {
            body["system"] = serde_json::Value::String(sys);
        }

        // Use spawn_blocking to run ureq (sync HTTP) from async context
        let result: Result<String, LlmError> = tokio::task::spawn_blocking(move || {
            let url = format!("{}/v1/messages", base_url);
            let agent = ureq::Agent::new_with_defaults();
            let response = agent
                .post(&url)
                .header("x-api-key", &api_key)
                .header("anthropic-version", "2023-06-01")
                .header("content-type", "application/json")
                .send_json(body);

            match response {
                Ok(resp) => {
                    let json: serde_json::Value = resp.into_body().read_json().map_err(|e| {
                        LlmError::ParseError(format!("Failed to parse Anthropic response: {}", e))
                    })?;
                    // Extract content[0].text
                    let text = json["content"]
                        .as_array()
                        .and_then(|arr| arr.first())
                        .and_then(|c| c["text"].as_str())
                        .map(|s| s.to_string());
                    text.ok_or_else(|| {
                        LlmError::ParseError("No text content in Anthropic response".to_string())
                    })
                }
                Err(e) => {
                    // ureq v3: errors include status errors via the Error type
                    Err(LlmError::NetworkError(e.to_string()))
                }
            }
        })
        .await
        .map_err(|e| LlmError::NetworkError(format!("Task join error: {}", e)))?;

        result
    }
}
