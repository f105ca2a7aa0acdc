use serde::{Serialize, Deserialize};
use std::str::FromStr;
use std::fmt;
use anyhow::{Result};
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelProvider {
  OpenAI,
  Groq,
  Ollama,
}

impl ModelProvider {

  pub fn as_str(&self) -> &'static str {
    match self {
      &ModelProvider::OpenAI => "OpenAI",
      &ModelProvider::Groq => "Groq",
      &ModelProvider::Ollama => "Ollama",
    }
  }

  /// Chat-completions endpoint used when no base url is configured.
  pub fn default_endpoint(&self) -> String {
    match self {
      ModelProvider::OpenAI => "https://api.openai.com/v1/chat/completions".to_string(),
      ModelProvider::Groq => "https://api.groq.com/openai/v1/chat/completions".to_string(),
      ModelProvider::Ollama => {
        let ollama_host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "localhost".to_string());
        format!("http://{}:11434/v1/chat/completions", ollama_host)
      }
    }
  }

  pub fn requires_api_key(&self) -> bool {
    !matches!(self, ModelProvider::Ollama)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMModelConfig {
  pub provider: ModelProvider,
  pub model_name: String,
  #[serde(skip_serializing)]
  pub api_key: Option<String>,
  pub base_url: Option<String>, // Full chat-completions url, for proxies or self-hosted gateways
  pub temperature: Option<f32>,
  pub max_tokens: Option<u32>,
  pub top_p : Option<f32>,
  /// Ask for a JSON object response where the model supports it.
  #[serde(default)]
  pub json_mode: bool,
}

impl LLMModelConfig {
  pub fn with_json_mode(&self, json_mode: bool) -> Self {
    let mut config = self.clone();
    config.json_mode = json_mode;
    return config;
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
  pub role: String, // "system", "user" or "assistant"
  pub content: String,
}

impl ChatMessage {
  pub fn system(content: &str) -> Self {
    ChatMessage { role: "system".to_string(), content: content.to_string() }
  }

  pub fn user(content: &str) -> Self {
    ChatMessage { role: "user".to_string(), content: content.to_string() }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
  pub content: String,
}

impl fmt::Display for ModelProvider {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for ModelProvider {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "openai" => Ok(ModelProvider::OpenAI),
      "groq" => Ok(ModelProvider::Groq),
      "ollama" => Ok(ModelProvider::Ollama),
      _ => Err(format!("Unknown model provider: {}", s)),
    }
  }
}

/// A text-generation backend. Errors from the remote service are returned as-is; callers do not retry.
#[async_trait]
pub trait LLMChatter : Send + Sync {
  async fn chat(&self, messages: Vec<ChatMessage>, config : &LLMModelConfig) -> Result<LLMResponse>;
}
