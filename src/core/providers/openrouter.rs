use super::scrub::api_error;
use super::traits::Provider;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

pub struct OpenRouterProvider {
    /// Pre-computed `"Bearer <key>"` header value.
    cached_auth_header: Option<String>,
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

fn build_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}

impl OpenRouterProvider {
    pub fn new(api_key: Option<&str>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: Option<&str>, base_url: &str) -> Self {
        Self {
            cached_auth_header: api_key.map(|k| format!("Bearer {k}")),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_client(),
        }
    }

    fn build_request<'a>(
        system_prompt: Option<&'a str>,
        user: MessageContent<'a>,
        model: &'a str,
        temperature: f64,
    ) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system_prompt {
            messages.push(Message {
                role: "system",
                content: MessageContent::Text(sys),
            });
        }
        messages.push(Message {
            role: "user",
            content: user,
        });
        ChatRequest {
            model,
            messages,
            temperature,
        }
    }

    async fn call_api(&self, request: &ChatRequest<'_>) -> anyhow::Result<String> {
        let auth_header = self.cached_auth_header.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "OpenRouter API key not set. Set api_key in config.toml or OPENROUTER_API_KEY."
            )
        })?;

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", auth_header)
            .header("X-Title", "hearth")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error("OpenRouter", response).await);
        }

        let chat: ChatResponse = response.json().await.map_err(anyhow::Error::msg)?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("No response from OpenRouter"))
    }
}

impl Provider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn chat_with_system<'a>(
        &'a self,
        system_prompt: Option<&'a str>,
        message: &'a str,
        model: &'a str,
        temperature: f64,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let request = Self::build_request(
                system_prompt,
                MessageContent::Text(message),
                model,
                temperature,
            );
            self.call_api(&request).await
        })
    }

    fn chat_with_images<'a>(
        &'a self,
        system_prompt: Option<&'a str>,
        message: &'a str,
        image_urls: &'a [String],
        model: &'a str,
        temperature: f64,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let mut parts = Vec::with_capacity(image_urls.len() + 1);
            parts.push(ContentPart::Text { text: message });
            parts.extend(image_urls.iter().map(|url| ContentPart::ImageUrl {
                image_url: ImageUrl { url },
            }));
            let request = Self::build_request(
                system_prompt,
                MessageContent::Parts(parts),
                model,
                temperature,
            );
            self.call_api(&request).await
        })
    }
}
