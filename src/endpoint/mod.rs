use async_trait::async_trait;
use log::debug;
use reqwest::Client as HttpClient;
use url::Url;

use crate::models::chat::{ ChatReply, ChatRequest, ChatTurn };

/// Fallback base URL reaching the host machine from an Android emulator.
pub const DEFAULT_API_URL: &str = "http://10.0.2.2:8787";

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("HTTP {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Remote service turning an ordered list of turns into one assistant reply.
#[async_trait]
pub trait ChatEndpoint: Send + Sync {
    async fn submit(&self, turns: &[ChatTurn]) -> Result<String, EndpointError>;
}

pub struct HttpChatEndpoint {
    http: HttpClient,
    chat_url: Url,
}

impl HttpChatEndpoint {
    pub fn new(base_url: &str) -> Result<Self, EndpointError> {
        Self::with_client(HttpClient::new(), base_url)
    }

    pub fn with_client(http: HttpClient, base_url: &str) -> Result<Self, EndpointError> {
        let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))?;
        let chat_url = base.join("chat")?;
        Ok(Self { http, chat_url })
    }

    pub fn chat_url(&self) -> &Url {
        &self.chat_url
    }
}

#[async_trait]
impl ChatEndpoint for HttpChatEndpoint {
    async fn submit(&self, turns: &[ChatTurn]) -> Result<String, EndpointError> {
        let body = ChatRequest { messages: turns.to_vec() };
        debug!("POST {} with {} turns", self.chat_url, turns.len());

        let resp = self.http
            .post(self.chat_url.clone())
            .json(&body)
            .send().await
            .map_err(|e| EndpointError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EndpointError::Status(status.as_u16()));
        }

        let reply = resp
            .json::<ChatReply>().await
            .map_err(|e| EndpointError::MalformedResponse(e.to_string()))?;
        Ok(reply.into_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_url_is_joined_onto_base() {
        let endpoint = HttpChatEndpoint::new("http://10.0.2.2:8787").unwrap();
        assert_eq!(endpoint.chat_url().as_str(), "http://10.0.2.2:8787/chat");

        let endpoint = HttpChatEndpoint::new("https://example.com/api/").unwrap();
        assert_eq!(endpoint.chat_url().as_str(), "https://example.com/api/chat");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(HttpChatEndpoint::new("not a url"), Err(EndpointError::InvalidUrl(_))));
    }

    #[test]
    fn status_error_mentions_code() {
        assert_eq!(EndpointError::Status(500).to_string(), "HTTP 500");
    }
}
