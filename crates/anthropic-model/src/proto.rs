use serde::{Deserialize, Serialize};
use survey_chat_model::{ChatMessage, ChatRequest, Role};

use crate::AnthropicConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ApiError {
    pub r#type: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    ContentBlockDelta {
        index: u32,
        delta: BlockDelta,
    },
    MessageStop,
    Error {
        error: ApiError,
    },
    /// `message_start`, `content_block_start`, `ping` and friends carry
    /// nothing the survey needs.
    #[serde(other)]
    Other,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Message {
    role: &'static str,
    content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    stream: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ChatRequest,
    config: &AnthropicConfig,
) -> MessagesRequest {
    MessagesRequest {
        model: config.model.clone(),
        max_tokens: req.max_tokens.unwrap_or(config.max_tokens),
        system: req.system.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        stream: true,
    }
}

#[inline]
fn create_message(msg: &ChatMessage) -> Message {
    Message {
        role: match msg.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        },
        content: msg.content.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::AnthropicConfigBuilder;

    #[test]
    fn test_create_request() {
        let request = ChatRequest {
            system: Some("You are a friendly interviewer.".to_owned()),
            messages: vec![
                ChatMessage::assistant("What's your role?"),
                ChatMessage::user("CTO"),
            ],
            max_tokens: Some(200),
            ..Default::default()
        };
        let config = AnthropicConfigBuilder::with_api_key("xxx")
            .with_model("custom")
            .build();
        let body = serde_json::to_value(create_request(&request, &config))
            .unwrap();
        assert_eq!(
            body,
            json!({
                "model": "custom",
                "max_tokens": 200,
                "system": "You are a friendly interviewer.",
                "messages": [
                    { "role": "assistant", "content": "What's your role?" },
                    { "role": "user", "content": "CTO" },
                ],
                "stream": true,
            })
        );
    }

    #[test]
    fn test_parse_stream_events() {
        let event: StreamEvent = serde_json::from_str(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hey"}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            StreamEvent::ContentBlockDelta {
                index: 0,
                delta: BlockDelta::TextDelta {
                    text: "Hey".to_owned()
                },
            }
        );

        let event: StreamEvent = serde_json::from_str(
            r#"{"type":"message_start","message":{"id":"msg_1"}}"#,
        )
        .unwrap();
        assert_eq!(event, StreamEvent::Other);

        let event: StreamEvent = serde_json::from_str(
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        )
        .unwrap();
        assert!(matches!(event, StreamEvent::Error { .. }));
    }
}
