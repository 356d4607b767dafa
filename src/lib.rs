pub mod models;
pub mod conversation;
pub mod endpoint;
pub mod llm;
pub mod cli;
pub mod history;
pub mod server;
pub mod terminal;

use cli::{ Args, ChatArgs, Command, ServeArgs };
use conversation::{ ConversationConfig, ConversationController };
use history::initialize_history_store;
use llm::chat::new_client as new_chat_client;
use llm::LlmConfig;
use log::info;
use server::{ AppState, Server };
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    match args.command {
        Command::Serve(serve) => run_proxy(serve).await,
        Command::Chat(chat) => run_chat(chat).await,
    }
}

async fn run_proxy(args: ServeArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let chat_config = LlmConfig {
        llm_type: args.chat_llm_type.parse()?,
        api_key: Some(args.chat_api_key.clone()).filter(|k| !k.is_empty()),
        completion_model: args.chat_model.clone(),
        base_url: args.chat_base_url.clone(),
        reasoning_effort: Some(args.reasoning_effort.clone()),
    };
    let chat_client = new_chat_client(&chat_config)?;

    info!("--- Proxy Configuration ---");
    info!("Server Address: {}", args.server_addr());
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", chat_client.get_model());
    info!("Chat Base URL: {}", chat_client.get_base_url().as_deref().unwrap_or("adapter default"));
    info!("Max Turns: {}", args.max_turns);
    info!("---------------------------");

    let state = AppState { chat_client, max_turns: args.max_turns };
    let server = Server::new(args.server_addr(), state);
    server.run().await
}

async fn run_chat(args: ChatArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let store = initialize_history_store(
        &args.history_type,
        &args.history_host,
        &args.history_redis_prefix
    )?;
    let config = ConversationConfig {
        storage_key: args.storage_key,
        base_url: args.api_url,
    };
    let controller = ConversationController::open_http(config, store).await?;
    terminal::run(Arc::new(controller)).await
}
