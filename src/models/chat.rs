use serde::{Deserialize, Serialize};

/// Message author as it appears on the wire. Clients may only speak as
/// `user`; `assistant` entries echo earlier streamed replies. `system`
/// entries are injected by the relay itself, never forwarded from clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Body of `POST /api/chat`. The client resends the full conversation on
/// every turn, so the payload is the sole source of truth for how many
/// turns have already happened.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}
