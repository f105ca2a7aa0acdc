use anyhow::{Context, Error};
use std::sync::Arc;

use crate::ai_agent::agents::prompts::{build_user_prompt, SYSTEM_PROMPT};
use crate::ai_agent::data::models::{AnalysisRequest, AnalysisResult};
use crate::ai_agent::data::normalizer::normalize_response;
use crate::ai_agent::llm::model_provider::{ChatMessage, LLMChatter, LLMModelConfig};

pub struct StrategicAnalystAgent {
  llm: Arc<dyn LLMChatter>,
  model_config: LLMModelConfig,
  attachment_prefix_chars: usize,
}

impl StrategicAnalystAgent {
  pub fn new(llm: Arc<dyn LLMChatter>, model_config: LLMModelConfig, attachment_prefix_chars: usize) -> Self {
    StrategicAnalystAgent { llm, model_config, attachment_prefix_chars }
  }

  /// Runs one analysis. An unusable reply degrades inside the normalizer; only LLM failures are errors.
  pub async fn run(&self, request: &AnalysisRequest) -> Result<AnalysisResult, Error> {
    let messages = vec![
      ChatMessage::system(SYSTEM_PROMPT),
      ChatMessage::user(&build_user_prompt(request, self.attachment_prefix_chars)),
    ];

    let config_for_call = self.model_config.with_json_mode(true);

    log::info!("[Strategic Analyst] ({}, {}) Calling LLM for strategic analysis...", request.country, request.technology);
    let response = self.llm.chat(messages, &config_for_call).await.context("Strategic analysis request to the LLM failed")?;
    log::debug!("[Strategic Analyst] LLM raw response: {}", response.content);

    let result = normalize_response(&response.content);
    log::info!("[Strategic Analyst] {} PESTEL factors, {} risks, {} recommendations", result.pestel.len(), result.risks.len(), result.recommendations.len());

    return Ok(result);
  }
}
