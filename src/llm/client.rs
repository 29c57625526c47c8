use async_trait::async_trait;
use futures::{stream, StreamExt};
use reqwest::Client;
use tracing::{debug, error};

use super::parser::SseParser;
use super::{BackendError, ChatBackend, ChunkStream, GenerateRequest};
use crate::config::ChatConfig;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Streaming client for the Gemini `streamGenerateContent` endpoint.
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model_name: String,
}

impl GeminiClient {
    pub fn new(base_url: String, api_key: String, model_name: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            model_name,
        }
    }

    pub fn from_config(config: &ChatConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("No API key configured (set GEMINI_API_KEY)"))?;
        Ok(Self::new(
            config.base_url.clone(),
            api_key,
            config.model.clone(),
        ))
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            self.model_name
        )
    }

    pub fn request_body(request: &GenerateRequest) -> serde_json::Value {
        let mut body = serde_json::json!({ "contents": request.contents });

        if !request.tools.is_empty() {
            let declarations: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|t| t.to_function_declaration())
                .collect();
            body["tools"] = serde_json::json!([{ "functionDeclarations": declarations }]);
        }

        body
    }
}

#[async_trait]
impl ChatBackend for GeminiClient {
    async fn stream(&self, request: GenerateRequest) -> Result<ChunkStream, BackendError> {
        debug!(
            model = %self.model_name,
            turns = request.contents.len(),
            tools = request.tools.len(),
            "opening stream"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(&request))
            .send()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), %body, "stream request rejected");
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut parser = SseParser::new();
        let events = response
            .bytes_stream()
            .map(Some)
            .chain(stream::once(async { None }))
            .map(move |chunk| match chunk {
                Some(Ok(bytes)) => stream::iter(parser.push(&bytes)),
                Some(Err(e)) => stream::iter(vec![Err(BackendError::Transport(e.to_string()))]),
                None => stream::iter(parser.finish().into_iter().collect::<Vec<_>>()),
            })
            .flatten();

        Ok(Box::pin(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Turn;
    use crate::tools::{FetchWeatherTool, ToolHandler};

    fn client() -> GeminiClient {
        GeminiClient::new(
            format!("{}/", DEFAULT_BASE_URL),
            "key".to_string(),
            DEFAULT_MODEL.to_string(),
        )
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            client().endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:streamGenerateContent?alt=sse"
        );
    }

    #[test]
    fn test_request_body_with_tools() {
        let request = GenerateRequest {
            contents: vec![Turn::user_text("Weather in Austin?")],
            tools: vec![FetchWeatherTool::new().definition()],
        };

        let body = GeminiClient::request_body(&request);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Weather in Austin?");
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            "fetchWeather"
        );
    }

    #[test]
    fn test_request_body_without_tools() {
        let request = GenerateRequest {
            contents: vec![Turn::user_text("Hi")],
            tools: vec![],
        };
        assert!(GeminiClient::request_body(&request).get("tools").is_none());
    }

    #[test]
    fn test_from_config_requires_key() {
        let mut config = ChatConfig::default();
        config.api_key = None;
        assert!(GeminiClient::from_config(&config).is_err());

        config.api_key = Some("k".to_string());
        let client = GeminiClient::from_config(&config).unwrap();
        assert_eq!(client.model_name(), DEFAULT_MODEL);
    }
}
