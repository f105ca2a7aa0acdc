use std::env;
use std::str::FromStr;

use log;

use crate::ai_agent::agents::advisor::DEFAULT_ADVISOR_CONTEXT_CHARS;
use crate::ai_agent::data::models::DEFAULT_ATTACHMENT_PREFIX_CHARS;
use crate::ai_agent::llm::model_provider::{LLMModelConfig, ModelProvider};
use crate::ai_agent::llm::models::{DEFAULT_MODEL_NAME, DEFAULT_TEMPERATURE};

#[derive(Clone)]
pub struct Config {
  pub openai_api_key: Option<String>,
  pub groq_api_key: Option<String>,
  pub llm_provider: ModelProvider,
  pub llm_model: String,
  pub llm_base_url: Option<String>,
  pub llm_temperature: f32,
  pub history_db_path: String,
  pub app_username: Option<String>,
  pub app_password: Option<String>,
  pub wkhtmltopdf_path: String,
  pub bind_address: String,
  pub port: u16,
  pub attachment_prefix_chars: usize,
  pub advisor_context_chars: usize,
}

impl Default for Config {
  fn default() -> Self {
    Config {
      openai_api_key: None,
      groq_api_key: None,
      llm_provider: ModelProvider::OpenAI,
      llm_model: DEFAULT_MODEL_NAME.to_string(),
      llm_base_url: None,
      llm_temperature: DEFAULT_TEMPERATURE,
      history_db_path: "qrt_history.db".to_string(),
      app_username: None,
      app_password: None,
      wkhtmltopdf_path: "wkhtmltopdf".to_string(),
      bind_address: "127.0.0.1".to_string(),
      port: 8080,
      attachment_prefix_chars: DEFAULT_ATTACHMENT_PREFIX_CHARS,
      advisor_context_chars: DEFAULT_ADVISOR_CONTEXT_CHARS,
    }
  }
}

fn optional_var(key: &str) -> Option<String> {
  env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed_var<T: FromStr>(key: &str, default: T) -> T where T::Err: std::fmt::Display {
  match optional_var(key) {
    Some(raw) => match raw.parse::<T>() {
      Ok(value) => value,
      Err(e) => {
        log::warn!("{}='{}' is invalid ({}), using the default", key, raw, e);
        default
      }
    },
    None => default,
  }
}

impl Config {

  pub fn load() -> Self {
    match dotenv::dotenv() {
      Ok(_) => log::info!("Loaded .env file"),
      Err(_) => log::warn!("No .env file found"),
    }

    let defaults = Config::default();

    let openai_api_key = optional_var("OPENAI_API_KEY");
    let groq_api_key = optional_var("GROQ_API_KEY");
    let llm_provider: ModelProvider = parsed_var("LLM_PROVIDER", defaults.llm_provider.clone());

    let llm_model: String = optional_var("LLM_MODEL").unwrap_or_else(|| {
      log::info!("LLM_MODEL not set, using default {}", DEFAULT_MODEL_NAME);
      defaults.llm_model.clone()
    });

    let history_db_path: String = optional_var("HISTORY_DB_PATH").unwrap_or_else(|| {
      log::info!("HISTORY_DB_PATH not set, using default {}", defaults.history_db_path);
      defaults.history_db_path.clone()
    });

    let app_username = optional_var("APP_USERNAME");
    let app_password = optional_var("APP_PASSWORD");
    if app_username.is_none() || app_password.is_none() {
      log::warn!("APP_USERNAME/APP_PASSWORD not both set, authentication is disabled");
    }

    return Config {
      openai_api_key,
      groq_api_key,
      llm_provider,
      llm_model,
      llm_base_url: optional_var("LLM_BASE_URL"),
      llm_temperature: parsed_var("LLM_TEMPERATURE", defaults.llm_temperature),
      history_db_path,
      app_username,
      app_password,
      wkhtmltopdf_path: optional_var("WKHTMLTOPDF_PATH").unwrap_or(defaults.wkhtmltopdf_path),
      bind_address: optional_var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
      port: parsed_var("PORT", defaults.port),
      attachment_prefix_chars: parsed_var("ATTACHMENT_PREFIX_CHARS", defaults.attachment_prefix_chars),
      advisor_context_chars: parsed_var("ADVISOR_CONTEXT_CHARS", defaults.advisor_context_chars),
    }
  }

  /// Key for the configured provider; Ollama runs without one.
  pub fn api_key_for_provider(&self) -> Option<String> {
    match self.llm_provider {
      ModelProvider::OpenAI => self.openai_api_key.clone(),
      ModelProvider::Groq => self.groq_api_key.clone(),
      ModelProvider::Ollama => None,
    }
  }

  pub fn model_config(&self) -> LLMModelConfig {
    LLMModelConfig {
      provider: self.llm_provider.clone(),
      model_name: self.llm_model.clone(),
      api_key: self.api_key_for_provider(),
      base_url: self.llm_base_url.clone(),
      temperature: Some(self.llm_temperature),
      max_tokens: None,
      top_p: None,
      json_mode: false,
    }
  }

  /// Basic-auth credentials, when both are configured.
  pub fn credentials(&self) -> Option<(String, String)> {
    match (&self.app_username, &self.app_password) {
      (Some(user), Some(password)) => Some((user.clone(), password.clone())),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn model_config_uses_the_provider_key() {
    let config = Config {
      openai_api_key: Some("sk-openai".to_string()),
      groq_api_key: Some("gsk-groq".to_string()),
      llm_provider: ModelProvider::Groq,
      ..Config::default()
    };
    let model_config = config.model_config();
    assert_eq!(model_config.api_key.as_deref(), Some("gsk-groq"));
    assert_eq!(model_config.temperature, Some(DEFAULT_TEMPERATURE));
  }

  #[test]
  fn credentials_need_both_parts() {
    let mut config = Config { app_username: Some("analyst".to_string()), ..Config::default() };
    assert!(config.credentials().is_none());
    config.app_password = Some("secret".to_string());
    assert_eq!(config.credentials(), Some(("analyst".to_string(), "secret".to_string())));
  }

  #[test]
  fn invalid_numbers_fall_back_to_the_default() {
    env::set_var("STRATEGIC_ANALYST_TEST_PORT", "not-a-port");
    assert_eq!(parsed_var("STRATEGIC_ANALYST_TEST_PORT", 8080u16), 8080);
    env::set_var("STRATEGIC_ANALYST_TEST_PORT", " 9090 ");
    assert_eq!(parsed_var("STRATEGIC_ANALYST_TEST_PORT", 8080u16), 9090);
    env::remove_var("STRATEGIC_ANALYST_TEST_PORT");
    assert_eq!(parsed_var("STRATEGIC_ANALYST_TEST_PORT", 8080u16), 8080);
  }
}
