//! NDJSON message types for Claude Code's stream-json format, and their
//! translation into trace events.

use std::fmt::{Display, Formatter};

use serde::Deserialize;

use crate::trace::{AgentEvent, RunSummary};

/// Output message from Claude Code (stdout).
///
/// Each line of stdout is a complete JSON object of one of these types.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum OutputMessage {
    /// System messages (init, etc.)
    #[serde(rename = "system")]
    System(SystemMessage),

    /// Assistant messages (text, tool use)
    #[serde(rename = "assistant")]
    Assistant(ConversationMessage),

    /// User messages (tool results)
    #[serde(rename = "user")]
    User(ConversationMessage),

    /// Result message (end of the run)
    #[serde(rename = "result")]
    Result(ResultMessage),

    /// Message types we don't track.
    #[serde(other)]
    Other,
}

impl OutputMessage {
    /// Flatten this message into trace events.
    ///
    /// Assistant text blocks are joined into one `assistant_message`; every
    /// tool use and tool result becomes its own event.
    pub fn into_events(self) -> Vec<AgentEvent> {
        match self {
            OutputMessage::System(sys) => vec![AgentEvent::System {
                subtype: sys.subtype,
                session_id: sys.session_id,
                model: sys.model,
            }],
            OutputMessage::Assistant(msg) => {
                let mut texts = Vec::new();
                let mut tools = Vec::new();
                for block in msg.message.content.into_blocks() {
                    match block {
                        ContentBlock::Text { text } if !text.trim().is_empty() => texts.push(text),
                        ContentBlock::ToolUse { id, name, input } => {
                            tools.push(AgentEvent::ToolUse { id, name, input })
                        }
                        _ => {}
                    }
                }
                let mut events = Vec::with_capacity(tools.len() + 1);
                if !texts.is_empty() {
                    events.push(AgentEvent::AssistantMessage {
                        text: texts.join("\n"),
                    });
                }
                events.extend(tools);
                events
            }
            OutputMessage::User(msg) => msg
                .message
                .content
                .into_blocks()
                .into_iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(AgentEvent::UserMessage { text }),
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                    } => Some(AgentEvent::ToolResult {
                        tool_use_id,
                        content: content.map(|c| c.to_string()).unwrap_or_default(),
                        is_error,
                    }),
                    _ => None,
                })
                .collect(),
            OutputMessage::Result(res) => vec![AgentEvent::RunSummary(RunSummary {
                subtype: res.subtype,
                is_error: res.is_error,
                duration_seconds: res.duration_ms.unwrap_or(0) as f64 / 1000.0,
                cost_usd: res.total_cost_usd,
                num_turns: res.num_turns,
                result: res.result,
            })],
            OutputMessage::Other => vec![],
        }
    }
}

/// System message, typically sent at conversation start.
#[derive(Debug, Deserialize)]
pub struct SystemMessage {
    /// Subtype of the system message (e.g., "init")
    pub subtype: String,

    pub session_id: Option<String>,

    pub model: Option<String>,
}

/// An assistant or user message wrapping an API message.
#[derive(Debug, Deserialize)]
pub struct ConversationMessage {
    pub message: ApiMessage,
}

/// A message from the Claude API (nested inside assistant/user messages).
#[derive(Debug, Deserialize)]
pub struct ApiMessage {
    pub content: MessageContent,
}

/// Message content can be a string or array of content blocks.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),

    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// Content blocks, treating string content as a single text block.
    pub fn into_blocks(self) -> Vec<ContentBlock> {
        match self {
            MessageContent::Text(text) => vec![ContentBlock::Text { text }],
            MessageContent::Blocks(blocks) => blocks,
        }
    }
}

/// A content block within a message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,

        #[serde(default)]
        content: Option<ToolResultContent>,

        #[serde(default)]
        is_error: bool,
    },

    /// Thinking and other blocks we don't track.
    #[serde(other)]
    Other,
}

/// Tool result content can be a string or structured.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ToolResultContent {
    Text(String),

    /// Structured result, preserved as JSON.
    Structured(serde_json::Value),
}

impl Display for ToolResultContent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolResultContent::Text(s) => write!(f, "{s}"),
            ToolResultContent::Structured(serde_json::Value::Array(blocks)) => {
                let texts = blocks
                    .iter()
                    .map(|block| block.get("text").and_then(|t| t.as_str()))
                    .collect::<Option<Vec<_>>>();
                match texts {
                    Some(texts) => write!(f, "{}", texts.join("\n")),
                    None => write!(f, "{}", serde_json::Value::Array(blocks.clone())),
                }
            }
            ToolResultContent::Structured(v) => write!(f, "{v}"),
        }
    }
}

/// Result message indicating the end of the run.
#[derive(Debug, Deserialize)]
pub struct ResultMessage {
    /// Result subtype (e.g., "success", "error_max_turns")
    pub subtype: String,

    #[serde(default)]
    pub is_error: bool,

    /// Total duration in milliseconds
    pub duration_ms: Option<u64>,

    /// Number of conversation turns
    pub num_turns: Option<u32>,

    /// Total cost in USD
    pub total_cost_usd: Option<f64>,

    /// Result text (for success)
    pub result: Option<String>,
}
