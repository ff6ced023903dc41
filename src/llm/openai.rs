use crate::error::{AgentError, Result};
use crate::llm::{ContentPart, LanguageModel, Message, MessageRole};
use serde_json::{Value, json};
use std::time::Duration;

/// Blocking client for any OpenAI-compatible chat-completions endpoint
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f64>,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AgentError::LlmRequestFailed(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: None,
        })
    }

    /// Builder method: set sampling temperature
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn render_messages(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    MessageRole::System => "system",
                    MessageRole::Human => "user",
                    MessageRole::Ai => "assistant",
                    MessageRole::Tool => "tool",
                };

                let content: Value = if m.content.len() == 1 {
                    match &m.content[0] {
                        ContentPart::Text { text } => json!(text),
                        ContentPart::ImageUrl { url } => {
                            json!([{"type": "image_url", "image_url": {"url": url}}])
                        }
                    }
                } else {
                    json!(
                        m.content
                            .iter()
                            .map(|p| match p {
                                ContentPart::Text { text } => json!({"type": "text", "text": text}),
                                ContentPart::ImageUrl { url } => {
                                    json!({"type": "image_url", "image_url": {"url": url}})
                                }
                            })
                            .collect::<Vec<_>>()
                    )
                };

                let mut rendered = json!({"role": role, "content": content});

                if !m.tool_calls.is_empty() {
                    rendered["tool_calls"] = json!(
                        m.tool_calls
                            .iter()
                            .map(|tc| json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {
                                    "name": tc.name,
                                    "arguments": tc.arguments.to_string()
                                }
                            }))
                            .collect::<Vec<_>>()
                    );
                }
                if m.role == MessageRole::Tool {
                    // Tool acknowledgements must reference the call they answer
                    rendered["tool_call_id"] = json!("1");
                }

                rendered
            })
            .collect()
    }

    fn post(&self, body: Value) -> Result<Value> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| AgentError::LlmRequestFailed(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| AgentError::LlmRequestFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_http_error(status, &text));
        }

        serde_json::from_str(&text)
            .map_err(|e| AgentError::LlmRequestFailed(format!("invalid response body: {}", e)))
    }

    fn message_of(response: &Value) -> Result<&Value> {
        response
            .pointer("/choices/0/message")
            .ok_or_else(|| AgentError::LlmRequestFailed("response has no choices".to_string()))
    }
}

/// Map a non-success chat-completions response to a typed error so the step
/// engine can classify on the variant. A 400 carrying the provider's context
/// overflow code is the authoritative token-limit signal and must trigger the
/// same trim-and-retry path as the local estimate.
fn classify_http_error(status: reqwest::StatusCode, body: &str) -> AgentError {
    match status.as_u16() {
        429 | 503 => AgentError::RateLimited(format!("{}: {}", status, body)),
        400 if body.contains("context_length_exceeded")
            || body.contains("maximum context length") =>
        {
            AgentError::TokenBudgetExhausted(format!("{}: {}", status, body))
        }
        _ => AgentError::LlmRequestFailed(format!("{}: {}", status, body)),
    }
}

impl LanguageModel for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn complete(&self, messages: &[Message]) -> Result<String> {
        let mut body = json!({
            "model": self.model,
            "messages": Self::render_messages(messages),
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }

        let response = self.post(body)?;
        let content = Self::message_of(&response)?
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();
        Ok(content)
    }

    fn complete_structured(
        &self,
        messages: &[Message],
        schema: &Value,
        method: Option<&str>,
    ) -> Result<Value> {
        let mut body = json!({
            "model": self.model,
            "messages": Self::render_messages(messages),
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }

        match method {
            Some(_) => {
                // Named function calling: the model must invoke AgentOutput
                body["tools"] = json!([{
                    "type": "function",
                    "function": {
                        "name": "AgentOutput",
                        "description": "The agent's next decision",
                        "parameters": schema
                    }
                }]);
                body["tool_choice"] =
                    json!({"type": "function", "function": {"name": "AgentOutput"}});

                let response = self.post(body)?;
                let arguments = Self::message_of(&response)?
                    .pointer("/tool_calls/0/function/arguments")
                    .and_then(|a| a.as_str())
                    .ok_or_else(|| {
                        AgentError::InvalidModelOutput("model returned no tool call".to_string())
                    })?;
                serde_json::from_str(arguments)
                    .map_err(|e| AgentError::InvalidModelOutput(format!("bad tool arguments: {}", e)))
            }
            None => {
                body["response_format"] = json!({"type": "json_object"});

                let response = self.post(body)?;
                let content = Self::message_of(&response)?
                    .get("content")
                    .and_then(|c| c.as_str())
                    .ok_or_else(|| {
                        AgentError::InvalidModelOutput("model returned no content".to_string())
                    })?;
                serde_json::from_str(content)
                    .map_err(|e| AgentError::InvalidModelOutput(format!("not valid JSON: {}", e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_plain_messages() {
        let rendered = OpenAiClient::render_messages(&[
            Message::system("rules"),
            Message::human("hello"),
        ]);

        assert_eq!(rendered[0]["role"], "system");
        assert_eq!(rendered[0]["content"], "rules");
        assert_eq!(rendered[1]["role"], "user");
    }

    #[test]
    fn test_render_image_message() {
        let msg = Message::human("state").with_image_base64("QUJD");
        let rendered = OpenAiClient::render_messages(&[msg]);

        let content = rendered[0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["type"], "image_url");
        assert!(
            content[1]["image_url"]["url"]
                .as_str()
                .unwrap()
                .starts_with("data:image/png;base64,")
        );
    }

    #[test]
    fn test_render_tool_call_message() {
        let msg = Message::ai("").with_tool_calls(vec![crate::llm::ToolCall {
            id: "1".to_string(),
            name: "AgentOutput".to_string(),
            arguments: serde_json::json!({"action": []}),
        }]);
        let rendered = OpenAiClient::render_messages(&[msg]);

        assert_eq!(rendered[0]["tool_calls"][0]["function"]["name"], "AgentOutput");
        // Arguments travel as a JSON string per the wire protocol
        assert!(rendered[0]["tool_calls"][0]["function"]["arguments"].is_string());
    }

    #[test]
    fn test_context_overflow_response_maps_to_token_budget() {
        let body = r#"{"error":{"message":"This model's maximum context length is 128000 tokens. However, your messages resulted in 131000 tokens.","type":"invalid_request_error","code":"context_length_exceeded"}}"#;
        let err = classify_http_error(reqwest::StatusCode::BAD_REQUEST, body);
        assert!(matches!(err, AgentError::TokenBudgetExhausted(_)));

        // Other 400s stay generic request failures
        let other = classify_http_error(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"error":{"code":"invalid_api_key"}}"#,
        );
        assert!(matches!(other, AgentError::LlmRequestFailed(_)));
    }

    #[test]
    fn test_rate_limit_statuses_map_to_rate_limited() {
        let err = classify_http_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, AgentError::RateLimited(_)));
        let err = classify_http_error(reqwest::StatusCode::SERVICE_UNAVAILABLE, "overloaded");
        assert!(matches!(err, AgentError::RateLimited(_)));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = OpenAiClient::new("https://api.example.com/v1/", "key", "gpt-4o").unwrap();
        assert_eq!(client.base_url, "https://api.example.com/v1");
        assert_eq!(client.model_name(), "gpt-4o");
    }
}
