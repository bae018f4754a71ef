pub mod cli;
pub mod config;
pub mod error;
pub mod gate;
pub mod llm;
pub mod models;
pub mod relay;
pub mod server;

use log::info;
use std::error::Error;
use std::sync::Arc;

use cli::Args;
use config::persona::PersonaPrompt;
use llm::openai::OpenAiChatClient;
use relay::CompletionRelay;
use server::api::AppState;
use server::Server;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat Base URL: {}", args.chat_base_url);
    info!("Chat Model: {}", args.chat_model);
    info!("Temperature: {}", args.temperature);
    info!("Max Turns: {}", args.max_turns);
    info!(
        "Persona Path: {}",
        args.persona_path.as_deref().unwrap_or("built-in")
    );
    info!(
        "Static Dir: {}",
        args.static_dir.as_deref().unwrap_or("disabled")
    );
    info!("-------------------------");

    let persona = PersonaPrompt::load(args.persona_path.as_deref())?;
    let client = OpenAiChatClient::new(
        args.api_key.clone(),
        args.chat_model.clone(),
        args.chat_base_url.clone(),
        args.temperature,
    )?;
    let relay = CompletionRelay::new(Arc::new(client), persona);
    let state = AppState::new(Arc::new(relay), args.max_turns);

    let server = Server::new(args.server_addr.clone(), state, args.static_dir.clone());
    server.run().await
}
