use log::debug;
use std::error::Error as StdError;
use std::sync::Arc;

use crate::config::persona::PersonaPrompt;
use crate::llm::{ChatClient, ChunkStream};
use crate::models::chat::{ChatMessage, Role};

/// Bridges a validated conversation to the upstream completion API: injects
/// the persona system prompt, dispatches a single streaming request and
/// hands the delta stream back untouched. One upstream attempt per request,
/// no retries at any stage.
pub struct CompletionRelay {
    client: Arc<dyn ChatClient>,
    persona: PersonaPrompt,
}

impl CompletionRelay {
    pub fn new(client: Arc<dyn ChatClient>, persona: PersonaPrompt) -> Self {
        Self { client, persona }
    }

    pub async fn stream_reply(
        &self,
        history: &[ChatMessage],
    ) -> Result<ChunkStream, Box<dyn StdError + Send + Sync>> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::new(Role::System, self.persona.text()));

        // Only the relay speaks with the system voice; client-supplied
        // system entries are dropped, not forwarded.
        let mut dropped = 0usize;
        for msg in history {
            if msg.role == Role::System {
                dropped += 1;
                continue;
            }
            messages.push(msg.clone());
        }
        if dropped > 0 {
            debug!("Dropped {} client-supplied system message(s)", dropped);
        }

        self.client.stream_chat(&messages).await
    }
}
