use clap::{ Parser, Subcommand };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the chat proxy that forwards conversations to the LLM provider.
    Serve(ServeArgs),
    /// Chat from the terminal through a running proxy.
    Chat(ChatArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    /// Interface the proxy binds to.
    #[arg(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port the proxy listens on.
    #[arg(long, env = "PORT", default_value = "8787")]
    pub port: u16,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "openai")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// API Key for the Chat LLM provider (required for OpenAI)
    #[arg(long, env = "CHAT_API_KEY", default_value = "", hide_env_values = true)]
    pub chat_api_key: String,

    /// Model name for chat completion (e.g., gpt-5, llama3.2)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Reasoning effort requested from models that support it.
    #[arg(long, env = "REASONING_EFFORT", default_value = "low")]
    pub reasoning_effort: String,

    /// Number of most recent turns forwarded upstream.
    #[arg(long, env = "MAX_TURNS", default_value = "30")]
    pub max_turns: usize,
}

impl ServeArgs {
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct ChatArgs {
    /// Base URL of the chat proxy.
    #[arg(long, env = "CHAT_API_URL", default_value = "http://127.0.0.1:8787")]
    pub api_url: String,

    /// Key the conversation log is stored under.
    #[arg(long, env = "CHAT_STORAGE_KEY", default_value = "chat_messages_v1")]
    pub storage_key: String,

    // --- History Store Args ---
    /// History chat store type (file, redis, memory)
    #[arg(long, env = "HISTORY_TYPE", default_value = "file")]
    pub history_type: String,

    /// History store location: a directory for `file`, a URL for `redis` (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "HISTORY_HOST", default_value = ".pocket-chat")]
    pub history_host: String,

    /// Prefix for Redis history keys.
    #[arg(long, env = "HISTORY_REDIS_PREFIX", default_value = "history:")]
    pub history_redis_prefix: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_defaults() {
        let args = Args::try_parse_from(["pocket-chat", "serve", "--chat-api-key", "sk"]).unwrap();
        let Command::Serve(serve) = args.command else {
            panic!("expected serve");
        };
        assert_eq!(serve.max_turns, 30);
        assert_eq!(serve.chat_llm_type, "openai");
        assert_eq!(serve.chat_api_key, "sk");
    }

    #[test]
    fn chat_accepts_overrides() {
        let args = Args::try_parse_from([
            "pocket-chat",
            "chat",
            "--api-url",
            "http://10.0.2.2:8787",
            "--history-type",
            "memory",
        ]).unwrap();
        let Command::Chat(chat) = args.command else {
            panic!("expected chat");
        };
        assert_eq!(chat.api_url, "http://10.0.2.2:8787");
        assert_eq!(chat.history_type, "memory");
    }

    #[test]
    fn server_addr_joins_host_and_port() {
        let args = Args::try_parse_from([
            "pocket-chat",
            "serve",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
        ]).unwrap();
        let Command::Serve(serve) = args.command else {
            panic!("expected serve");
        };
        assert_eq!(serve.server_addr(), "127.0.0.1:9000");
    }
}
