pub mod openai;

use async_trait::async_trait;
use futures::Stream;
use std::error::Error as StdError;
use std::pin::Pin;

use crate::models::chat::ChatMessage;

/// Incremental text deltas from the upstream completion API, in arrival
/// order. An `Err` item terminates the stream.
pub type ChunkStream =
    Pin<Box<dyn Stream<Item = Result<String, Box<dyn StdError + Send + Sync>>> + Send>>;

/// Seam between the relay and the completion provider. The production
/// implementation talks to an OpenAI-style endpoint; tests substitute a
/// scripted client.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Dispatches one streaming completion request. An `Err` here means
    /// nothing has been streamed yet; failures after the first byte arrive
    /// as `Err` items inside the returned stream.
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
    ) -> Result<ChunkStream, Box<dyn StdError + Send + Sync>>;
}
