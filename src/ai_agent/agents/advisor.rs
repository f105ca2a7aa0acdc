use anyhow::{Context, Error};
use std::sync::Arc;

use crate::ai_agent::agents::prompts::{build_advisor_prompt, ADVISOR_SYSTEM_PROMPT};
use crate::ai_agent::data::models::{truncate_chars, AnalysisResult};
use crate::ai_agent::llm::model_provider::{ChatMessage, LLMChatter, LLMModelConfig};

pub const DEFAULT_ADVISOR_CONTEXT_CHARS: usize = 8000;
const NO_ANALYSIS_CONTEXT: &str = "No analysis available.";

/// Single-turn Q&A with the last analysis as context.
pub struct AdvisorAgent {
  llm: Arc<dyn LLMChatter>,
  model_config: LLMModelConfig,
  context_chars: usize,
}

impl AdvisorAgent {
  pub fn new(llm: Arc<dyn LLMChatter>, model_config: LLMModelConfig, context_chars: usize) -> Self {
    AdvisorAgent { llm, model_config, context_chars }
  }

  /// JSON dump of the analysis, cut to the configured number of characters.
  pub fn context_blob(&self, analysis: Option<&AnalysisResult>) -> Result<String, Error> {
    let analysis = match analysis {
      Some(analysis) => analysis,
      None => return Ok(NO_ANALYSIS_CONTEXT.to_string()),
    };
    let dump = serde_json::to_string(analysis).context("Failed to serialize analysis for advisor context")?;
    return Ok(truncate_chars(&dump, self.context_chars).to_string());
  }

  pub async fn ask(&self, question: &str, analysis: Option<&AnalysisResult>) -> Result<String, Error> {
    let context = self.context_blob(analysis)?;
    let messages = vec![
      ChatMessage::system(ADVISOR_SYSTEM_PROMPT),
      ChatMessage::user(&build_advisor_prompt(question, &context)),
    ];

    log::info!("[Advisor] Calling LLM with {} chars of context...", context.chars().count());
    let response = self.llm.chat(messages, &self.model_config.with_json_mode(false)).await.context("Advisor request to the LLM failed")?;
    log::debug!("[Advisor] LLM raw response: {}", response.content);

    return Ok(response.content);
  }
}
