use clap::Parser;

use crate::llm::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "0.0.0.0:3000")]
    pub server_addr: String,

    /// API key for the upstream chat completion API.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Base URL for the upstream chat completion endpoint.
    #[arg(long, env = "CHAT_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub chat_base_url: String,

    /// Model name for chat completion.
    #[arg(long, env = "CHAT_MODEL", default_value = DEFAULT_MODEL)]
    pub chat_model: String,

    /// Sampling temperature for completions. The default favors natural
    /// persona phrasing over reproducibility.
    #[arg(long, env = "CHAT_TEMPERATURE", default_value = "0.7")]
    pub temperature: f32,

    /// Maximum combined user/assistant turns accepted per conversation.
    #[arg(long, env = "MAX_TURNS", default_value = "30")]
    pub max_turns: usize,

    /// Optional path to a plain-text file overriding the built-in persona prompt.
    #[arg(long, env = "PERSONA_PATH")]
    pub persona_path: Option<String>,

    /// Optional directory of built site assets to serve next to the API.
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<String>,
}
