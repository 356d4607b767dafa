use async_trait::async_trait;
use log::debug;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::{ ChatClient, CompletionResponse };
use crate::llm::{ LlmConfig, LlmError };
use crate::models::chat::ChatTurn;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-5";
const DEFAULT_REASONING_EFFORT: &str = "low";

pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    reasoning_effort: String,
    use_chat_completions: bool,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Serialize)]
struct OpenAIResponsesRequest {
    model: String,
    input: Vec<OpenAIMessage>,
    reasoning: OpenAIReasoning,
    stream: bool,
}

#[derive(Serialize)]
struct OpenAIReasoning {
    effort: String,
}

#[derive(Deserialize, Default)]
struct OpenAIResponsesResponse {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OpenAIOutputItem>,
}

#[derive(Deserialize)]
struct OpenAIOutputItem {
    #[serde(default)]
    content: Vec<OpenAIOutputContent>,
}

#[derive(Deserialize)]
struct OpenAIOutputContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

fn to_openai_messages(turns: &[ChatTurn]) -> Vec<OpenAIMessage> {
    turns
        .iter()
        .map(|t| OpenAIMessage {
            role: t.role.as_str().to_string(),
            content: t.content.clone(),
        })
        .collect()
}

impl OpenAIResponsesResponse {
    fn into_text(self) -> String {
        if let Some(text) = self.output_text {
            return text;
        }
        self.output
            .into_iter()
            .flat_map(|item| item.content)
            .filter(|c| c.content_type == "output_text")
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join("")
    }
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        reasoning_effort: Option<String>
    ) -> Result<Self, LlmError> {
        let chat_model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let use_chat_completions = api_url.contains("/chat/completions");
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e|
                LlmError::Config(format!("Invalid API key format: {}", e))
            )?
        );

        let http = HttpClient::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            model: chat_model,
            base_url: api_url,
            reasoning_effort: reasoning_effort.unwrap_or_else(|| DEFAULT_REASONING_EFFORT.to_string()),
            use_chat_completions,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::Config("OpenAI API key is required".to_string()))?;

        Self::new(
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
            config.reasoning_effort.clone()
        )
    }

    fn responses_url(&self) -> String {
        if self.base_url.ends_with("/v1/responses") {
            self.base_url.clone()
        } else {
            format!("{}/v1/responses", self.base_url.trim_end_matches('/'))
        }
    }

    fn build_responses_request(&self, turns: &[ChatTurn]) -> OpenAIResponsesRequest {
        OpenAIResponsesRequest {
            model: self.model.clone(),
            input: to_openai_messages(turns),
            reasoning: OpenAIReasoning { effort: self.reasoning_effort.clone() },
            stream: false,
        }
    }

    async fn complete_responses(&self, turns: &[ChatTurn]) -> Result<String, LlmError> {
        let url = self.responses_url();
        let req = self.build_responses_request(turns);
        debug!("OpenAI responses request: {} turns to {}", turns.len(), url);

        let resp = self.http
            .post(&url)
            .json(&req)
            .send().await?
            .error_for_status()?
            .json::<OpenAIResponsesResponse>().await?;

        Ok(resp.into_text())
    }

    async fn complete_chat(&self, turns: &[ChatTurn]) -> Result<String, LlmError> {
        let req = OpenAIChatRequest {
            model: self.model.clone(),
            messages: to_openai_messages(turns),
        };

        let resp = self.http
            .post(&self.base_url)
            .json(&req)
            .send().await?
            .error_for_status()?
            .json::<OpenAIResponse>().await?;

        let content = resp.choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No response from OpenAI API".to_string()))?
            .message.content;

        Ok(content)
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(&self, turns: &[ChatTurn]) -> Result<CompletionResponse, LlmError> {
        let response = if self.use_chat_completions {
            self.complete_chat(turns).await?
        } else {
            self.complete_responses(turns).await?
        };
        Ok(CompletionResponse { response })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
