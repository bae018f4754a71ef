//! Stateless admission checks for the chat endpoint. Every request is
//! evaluated from the message list it carries; no counter survives between
//! requests, so two identical payloads always get identical answers.

use crate::error::ApiError;
use crate::models::chat::{ChatMessage, Role};

/// Number of conversation turns in a payload. A turn is one `user` or
/// `assistant` entry; `system` entries never count and content emptiness
/// is irrelevant. Clients are expected to count with the same rule.
pub fn turn_count(messages: &[ChatMessage]) -> usize {
    messages
        .iter()
        .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        .count()
}

/// Rejects conversations that already reached the turn cap, before any
/// upstream cost is incurred.
pub fn check_turn_cap(messages: &[ChatMessage], max_turns: usize) -> Result<(), ApiError> {
    if turn_count(messages) >= max_turns {
        return Err(ApiError::LimitReached { max_turns });
    }
    Ok(())
}
