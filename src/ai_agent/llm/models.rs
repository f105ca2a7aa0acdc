use serde::{Serialize, Deserialize};
use once_cell::sync::Lazy;
use anyhow::{Result, anyhow};


use crate::ai_agent::llm::model_provider::{LLMModelConfig, ModelProvider, LLMChatter};
use crate::ai_agent::llm::openai::OpenAICompatProvider;

pub const DEFAULT_MODEL_NAME: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMModel {
  pub display_name: String,
  pub model_name: String, // The actual name used in API calls
  pub provider: ModelProvider,
}

impl LLMModel {
  pub fn new(display_name: &str, model_name: &str, provider: ModelProvider) -> Self {
    LLMModel {
      display_name: display_name.to_string(),
      model_name: model_name.to_string(),
      provider,
    }
  }

  pub fn has_json_mode(&self) -> bool {
    if self.is_ollama() {
      return self.model_name.contains("llama3") || self.model_name.contains("qwen");
    }
    true
  }

  pub fn is_ollama(&self) -> bool {
    self.provider == ModelProvider::Ollama
  }
}

static AVAILABLE_MODELS: Lazy<Vec<LLMModel>> = Lazy::new(|| vec![
  LLMModel::new("[openai] gpt-4o-mini", "gpt-4o-mini", ModelProvider::OpenAI),
  LLMModel::new("[openai] gpt-4o", "gpt-4o", ModelProvider::OpenAI),
  LLMModel::new("[openai] gpt-4.1-mini", "gpt-4.1-mini", ModelProvider::OpenAI),
  LLMModel::new("[groq] llama-3.3-70b", "llama-3.3-70b-versatile", ModelProvider::Groq),
  LLMModel::new("[groq] llama-3.1-8b", "llama-3.1-8b-instant", ModelProvider::Groq),
  LLMModel::new("[meta] llama3.1 (8B)", "llama3.1:latest", ModelProvider::Ollama),
  LLMModel::new("[alibaba] qwen3 (30B-a3B)", "qwen3:30b-a3b", ModelProvider::Ollama),
]);


pub fn get_available_models() -> &'static [LLMModel] {
  AVAILABLE_MODELS.as_slice()
}

pub fn get_model_info(model_name: &str) -> Option<&'static LLMModel> {
  get_available_models().iter().find(|&model_desc| model_desc.model_name == model_name)
}

/// Builds the chat client for `config`. Called once at startup; the client is then shared.
pub fn get_model(config: &LLMModelConfig) -> Result<Box<dyn LLMChatter>> {
  log::info!("Initializing LLM client for provider: {}, model: {}", config.provider, config.model_name);

  let api_key = config.api_key.clone().filter(|key| !key.trim().is_empty());
  if config.provider.requires_api_key() && api_key.is_none() {
    return Err(anyhow!("{} API key not found. Set it in the environment or .env file", config.provider));
  }

  let endpoint = config.base_url.clone().filter(|url| !url.trim().is_empty()).unwrap_or_else(|| config.provider.default_endpoint());

  // Unknown models are assumed to accept response_format, except on Ollama.
  let supports_json_mode = match get_model_info(&config.model_name) {
    Some(model) => model.has_json_mode(),
    None => config.provider != ModelProvider::Ollama,
  };

  log::info!("LLM endpoint: {}", endpoint);
  let client = OpenAICompatProvider::new(&endpoint, api_key, &config.model_name, supports_json_mode);
  return Ok(Box::new(client));
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config(provider: ModelProvider, api_key: Option<&str>) -> LLMModelConfig {
    LLMModelConfig {
      provider,
      model_name: DEFAULT_MODEL_NAME.to_string(),
      api_key: api_key.map(str::to_string),
      base_url: None,
      temperature: Some(DEFAULT_TEMPERATURE),
      max_tokens: None,
      top_p: None,
      json_mode: false,
    }
  }

  #[test]
  fn hosted_provider_without_key_is_rejected() {
    assert!(get_model(&config(ModelProvider::OpenAI, None)).is_err());
    assert!(get_model(&config(ModelProvider::Groq, Some("  "))).is_err());
    assert!(get_model(&config(ModelProvider::OpenAI, Some("sk-test"))).is_ok());
  }

  #[test]
  fn ollama_needs_no_key() {
    assert!(get_model(&config(ModelProvider::Ollama, None)).is_ok());
  }

  #[test]
  fn catalogue_lookup() {
    let model = get_model_info("gpt-4o-mini").expect("default model is listed");
    assert_eq!(model.provider, ModelProvider::OpenAI);
    assert!(model.has_json_mode());
    assert!(get_model_info("no-such-model").is_none());
  }
}
