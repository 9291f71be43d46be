//! Chat-completion model abstraction and the OpenAI-compatible client.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use leadflow_core::{LlmError, Settings};

/// One message in a chat exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// A completed chat response.
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

/// Seam over the chat model so agents can run against a test double.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, LlmError>;
}

/// OpenAI-compatible chat client.
pub struct OpenAiChat {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl OpenAiChat {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: settings.llm.base_url.clone(),
            api_key: settings.llm.openai_api_key.clone(),
            model: settings.llm.default_model_id.clone(),
            temperature: settings.llm.default_temperature,
        }
    }

    /// Point the client at a different base URL. Test seam.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;

        let body = CompletionRequest {
            model: &self.model,
            temperature: self.temperature,
            messages,
        };

        let started = Instant::now();
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        info!(
            model = %self.model,
            status = status.as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            "chat completion"
        );
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse =
            response.json().await.map_err(|e| LlmError::RequestFailed {
                reason: e.to_string(),
            })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::EmptyResponse {
                reason: "no choices in completion".to_string(),
            })?;

        Ok(ChatCompletion {
            content,
            usage: completion.usage,
        })
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat(base_url: &str) -> OpenAiChat {
        let mut settings = Settings::default();
        settings.llm.openai_api_key = Some("sk-test".to_string());
        OpenAiChat::from_settings(&settings).with_base_url(base_url)
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let chat = OpenAiChat::from_settings(&Settings::default());
        let err = chat.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
    }

    #[tokio::test]
    async fn completion_returns_content_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "messages": [
                    {"role": "system", "content": "be helpful"},
                    {"role": "user", "content": "plan a campaign"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Here is a plan."}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20}
            })))
            .mount(&server)
            .await;

        let completion = chat(&server.uri())
            .complete(&[
                ChatMessage::system("be helpful"),
                ChatMessage::user("plan a campaign"),
            ])
            .await
            .unwrap();

        assert_eq!(completion.content, "Here is a plan.");
        assert_eq!(completion.usage.unwrap().total_tokens, 20);
    }

    #[tokio::test]
    async fn non_success_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = chat(&server.uri())
            .complete(&[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        match err {
            LlmError::UnexpectedStatus { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let err = chat(&server.uri())
            .complete(&[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse { .. }));
    }
}
