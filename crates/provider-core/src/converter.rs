//! Translates between the canonical chat-completion shape and each
//! provider's own request/response/stream-chunk format.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalRequest {
    pub model: String,
    pub messages: Vec<CanonicalMessage>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub n: Option<u32>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub stop: Option<Value>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub presence_penalty: Option<f32>,
    #[serde(default)]
    pub frequency_penalty: Option<f32>,
    #[serde(default)]
    pub logit_bias: Option<Value>,
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalChoice {
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<CanonicalMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<Value>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<CanonicalChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<CanonicalUsage>,
}

pub fn synthetic_id() -> String {
    format!("chatcmpl-{}", &Uuid::new_v4().simple().to_string()[..12])
}

fn map_finish_reason(provider_reason: &str) -> &'static str {
    match provider_reason {
        "end_turn" | "stop_sequence" | "stop" => "stop",
        "max_tokens" | "length" => "length",
        "content_filter" => "content_filter",
        "tool_calls" => "tool_calls",
        _ => "stop",
    }
}

pub trait Converter: Send + Sync {
    /// Builds the provider-specific request body.
    fn to_provider_request(&self, request: &CanonicalRequest) -> Value;

    /// Parses a non-streaming provider response into the canonical shape.
    fn from_provider_response(&self, model: &str, body: &Value) -> CanonicalResponse;

    /// Parses one streaming event into a canonical chunk, or `None` if the
    /// event carries no content (e.g. a provider's opening `message_start`).
    fn from_provider_chunk(&self, model: &str, chunk: &Value) -> Option<CanonicalResponse>;
}

/// OpenAI's wire format already is the canonical shape.
pub struct OpenAiConverter;

impl Converter for OpenAiConverter {
    fn to_provider_request(&self, request: &CanonicalRequest) -> Value {
        serde_json::to_value(request).expect("CanonicalRequest is always representable as JSON")
    }

    fn from_provider_response(&self, model: &str, body: &Value) -> CanonicalResponse {
        serde_json::from_value(body.clone()).unwrap_or_else(|_| CanonicalResponse {
            id: synthetic_id(),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: model.to_string(),
            choices: vec![],
            usage: None,
        })
    }

    fn from_provider_chunk(&self, _model: &str, chunk: &Value) -> Option<CanonicalResponse> {
        serde_json::from_value(chunk.clone()).ok()
    }
}

/// Anthropic's Messages API: system prompt is a top-level field, `max_tokens`
/// is required, and `stop` is named `stop_sequences`.
pub struct AnthropicConverter;

impl Converter for AnthropicConverter {
    fn to_provider_request(&self, request: &CanonicalRequest) -> Value {
        let (system, messages): (Option<String>, Vec<&CanonicalMessage>) = {
            let system = request
                .messages
                .iter()
                .find(|m| m.role == "system")
                .map(|m| m.content.clone());
            let rest = request
                .messages
                .iter()
                .filter(|m| m.role != "system")
                .collect();
            (system, rest)
        };

        let mut body = json!({
            "model": request.model,
            "messages": messages.iter().map(|m| json!({"role": m.role, "content": m.content})).collect::<Vec<_>>(),
            "max_tokens": request.max_tokens.unwrap_or(1000),
            "stream": request.stream,
        });

        if let Some(system) = system {
            body["system"] = json!(system);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(top_p) = request.top_p {
            body["top_p"] = json!(top_p);
        }
        if let Some(stop) = &request.stop {
            body["stop_sequences"] = stop.clone();
        }

        body
    }

    fn from_provider_response(&self, model: &str, body: &Value) -> CanonicalResponse {
        let content = body
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|blocks| blocks.first())
            .and_then(|block| block.get("text"))
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();

        let finish_reason = body
            .get("stop_reason")
            .and_then(|r| r.as_str())
            .map(map_finish_reason)
            .unwrap_or("stop");

        let usage = body.get("usage").map(|u| {
            let prompt = u
                .get("input_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32;
            let completion = u
                .get("output_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32;
            CanonicalUsage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: prompt + completion,
            }
        });

        CanonicalResponse {
            id: body
                .get("id")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(synthetic_id),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: model.to_string(),
            choices: vec![CanonicalChoice {
                index: 0,
                message: Some(CanonicalMessage {
                    role: "assistant".to_string(),
                    content,
                    name: None,
                }),
                delta: None,
                finish_reason: Some(finish_reason.to_string()),
            }],
            usage,
        }
    }

    fn from_provider_chunk(&self, model: &str, chunk: &Value) -> Option<CanonicalResponse> {
        let event_type = chunk.get("type").and_then(|t| t.as_str())?;

        let (delta, finish_reason) = match event_type {
            "content_block_delta" => {
                let text = chunk
                    .get("delta")
                    .and_then(|d| d.get("text"))
                    .and_then(|t| t.as_str())
                    .unwrap_or_default();
                (json!({ "content": text }), None)
            }
            "message_delta" => {
                let reason = chunk
                    .get("delta")
                    .and_then(|d| d.get("stop_reason"))
                    .and_then(|r| r.as_str())
                    .map(map_finish_reason);
                (json!({}), reason.map(str::to_string))
            }
            "message_stop" => (json!({}), Some("stop".to_string())),
            _ => return None,
        };

        Some(CanonicalResponse {
            id: synthetic_id(),
            object: "chat.completion.chunk".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: model.to_string(),
            choices: vec![CanonicalChoice {
                index: 0,
                message: None,
                delta: Some(delta),
                finish_reason,
            }],
            usage: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> CanonicalRequest {
        CanonicalRequest {
            model: "claude-3-5-sonnet-20241022".to_string(),
            messages: vec![
                CanonicalMessage {
                    role: "system".to_string(),
                    content: "be terse".to_string(),
                    name: None,
                },
                CanonicalMessage {
                    role: "user".to_string(),
                    content: "hi".to_string(),
                    name: None,
                },
            ],
            temperature: None,
            top_p: None,
            n: None,
            stream: false,
            stop: None,
            max_tokens: None,
            presence_penalty: None,
            frequency_penalty: None,
            logit_bias: None,
            user: None,
        }
    }

    #[test]
    fn anthropic_splits_system_message_out() {
        let body = AnthropicConverter.to_provider_request(&sample_request());
        assert_eq!(body["system"], "be terse");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn anthropic_defaults_max_tokens_when_absent() {
        let body = AnthropicConverter.to_provider_request(&sample_request());
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn anthropic_finish_reason_mapping() {
        let body = json!({
            "id": "msg_1",
            "content": [{"type": "text", "text": "hello"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 3, "output_tokens": 1},
        });
        let response = AnthropicConverter.from_provider_response("claude-3-5-sonnet-20241022", &body);
        assert_eq!(response.choices[0].finish_reason.as_deref(), Some("stop"));
        assert_eq!(response.usage.unwrap().total_tokens, 4);
    }

    #[test]
    fn anthropic_content_block_delta_becomes_canonical_chunk() {
        let chunk = json!({"type": "content_block_delta", "delta": {"text": "hi"}});
        let canonical = AnthropicConverter
            .from_provider_chunk("claude-3-5-sonnet-20241022", &chunk)
            .unwrap();
        assert_eq!(canonical.choices[0].delta.as_ref().unwrap()["content"], "hi");
    }

    #[test]
    fn anthropic_message_stop_sets_stop_finish_reason() {
        let chunk = json!({"type": "message_stop"});
        let canonical = AnthropicConverter
            .from_provider_chunk("claude-3-5-sonnet-20241022", &chunk)
            .unwrap();
        assert_eq!(canonical.choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn openai_request_is_identity_mapping() {
        let request = sample_request();
        let body = OpenAiConverter.to_provider_request(&request);
        assert_eq!(body["model"], request.model);
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    }
}
