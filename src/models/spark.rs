use serde::{ Serialize, Deserialize };

use super::chat::Turn;
use crate::config::SparkConfig;
use crate::error::SparkError;

/// Header status marking the last frame of a reply.
pub const STATUS_FINAL: i64 = 2;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub header: RequestHeader,
    pub parameter: RequestParameter,
    pub payload: RequestPayload,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RequestHeader {
    pub app_id: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RequestParameter {
    pub chat: ChatParameter,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChatParameter {
    pub domain: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RequestPayload {
    pub message: RequestMessage,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RequestMessage {
    pub text: Vec<Turn>,
}

impl ChatRequest {
    /// History is sent as-is, followed by the prompt as the final user turn.
    pub fn new(config: &SparkConfig, history: &[Turn], prompt: &str) -> Self {
        let mut text = Vec::with_capacity(history.len() + 1);
        text.extend_from_slice(history);
        text.push(Turn::user(prompt));
        Self {
            header: RequestHeader { app_id: config.app_id.clone() },
            parameter: RequestParameter {
                chat: ChatParameter {
                    domain: config.domain.clone(),
                    temperature: config.temperature,
                    max_tokens: config.max_tokens,
                },
            },
            payload: RequestPayload { message: RequestMessage { text } },
        }
    }

    pub fn to_json(&self) -> Result<String, SparkError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Deserialize, Debug)]
struct RawFrame {
    header: RawHeader,
    #[serde(default)]
    payload: Option<RawPayload>,
}

#[derive(Deserialize, Debug)]
struct RawHeader {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: i64,
}

#[derive(Deserialize, Debug)]
struct RawPayload {
    #[serde(default)]
    choices: Option<RawChoices>,
}

#[derive(Deserialize, Debug)]
struct RawChoices {
    #[serde(default)]
    text: Vec<RawText>,
}

#[derive(Deserialize, Debug)]
struct RawText {
    #[serde(default)]
    content: String,
}

/// A server push, decoded once at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Content { text: String, is_final: bool },
    Error { code: i64, message: String },
}

impl Frame {
    pub fn decode(raw: &str) -> Result<Frame, SparkError> {
        let frame: RawFrame = serde_json::from_str(raw)?;
        if frame.header.code != 0 {
            return Ok(Frame::Error {
                code: frame.header.code,
                message: frame.header.message.unwrap_or_default(),
            });
        }

        let text = frame.payload
            .and_then(|p| p.choices)
            .map(|c| c.text.into_iter().map(|t| t.content).collect::<String>())
            .unwrap_or_default();

        Ok(Frame::Content {
            text,
            is_final: frame.header.status == STATUS_FINAL,
        })
    }
}
