use crate::ai_agent::llm::model_provider::{ChatMessage, LLMChatter, LLMModelConfig, LLMResponse};

use reqwest::{header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE}, Client, Response};
use serde::{Deserialize, Serialize};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::result::Result::Ok;


#[derive(Serialize, Debug)]
struct ResponseFormat {
  #[serde(rename = "type")]
  kind: &'static str,
}

#[derive(Serialize, Debug)]
struct ChatCompletionRequest<'a> {
  messages: &'a [ChatMessage],
  model: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  temperature: Option<f32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  top_p: Option<f32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionMessage {
  #[serde(default)]
  content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionChoice {
  message: ChatCompletionMessage,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionResponse {
  choices: Vec<ChatCompletionChoice>,
}

/// Client for OpenAI-style `/chat/completions` endpoints (OpenAI, Groq, Ollama's `/v1`).
pub struct OpenAICompatProvider {
  endpoint : String,
  api_key : Option<String>,
  model_name: String,
  supports_json_mode: bool,
  client : Client
}

impl OpenAICompatProvider {

  pub fn new(endpoint: &str, api_key: Option<String>, model_name: &str, supports_json_mode: bool) -> Self {
    OpenAICompatProvider {
      endpoint: endpoint.to_string(),
      api_key,
      model_name: model_name.to_string(),
      supports_json_mode,
      client: Client::new(),
    }
  }

  fn headers(&self) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(api_key) = &self.api_key {
      let value = HeaderValue::from_str(&format!("Bearer {}", api_key)).context("API key is not a valid header value")?;
      headers.insert(AUTHORIZATION, value);
    }
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    return Ok(headers);
  }
}

#[async_trait]
impl LLMChatter for OpenAICompatProvider {
  async fn chat(&self, messages: Vec<ChatMessage>, config: &LLMModelConfig) -> Result<LLMResponse> {
    let response_format = if config.json_mode && self.supports_json_mode {
      Some(ResponseFormat { kind: "json_object" })
    } else {
      None
    };

    let request = ChatCompletionRequest {
      messages: &messages,
      model: &self.model_name,
      temperature: config.temperature,
      max_tokens: config.max_tokens,
      top_p: config.top_p,
      response_format,
    };

    log::debug!("Sending {} messages to {} ({})", messages.len(), self.endpoint, self.model_name);
    let response: Response = self.client.post(&self.endpoint).headers(self.headers()?).json(&request).send().await
      .with_context(|| format!("Request to {} failed", self.endpoint))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      log::error!("Error getting response from {}: {} {}", self.endpoint, status, body);
      return Err(anyhow!("LLM service returned {}: {}", status, body));
    }

    let completion: ChatCompletionResponse = response.json().await.context("LLM service returned an unreadable body")?;
    let first : ChatCompletionChoice = completion.choices.into_iter().next().ok_or_else(|| anyhow!("No response choices received from LLM service"))?;
    return Ok(LLMResponse {
      content: first.message.content.unwrap_or_default(),
    });
  }
}
