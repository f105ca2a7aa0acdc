use std::sync::Arc;
use anyhow::Error;

use crate::ai_agent::agents::advisor::AdvisorAgent;
use crate::ai_agent::agents::strategic_analyst::StrategicAnalystAgent;
use crate::ai_agent::data::models::{AnalysisRequest, AnalysisResult};
use crate::ai_agent::llm::model_provider::{LLMChatter, LLMModelConfig};
use crate::app::config::Config;

/// Owns the LLM-backed agents. The chat client is built once and shared between them.
pub struct AgentService {
  analyst: StrategicAnalystAgent,
  advisor: AdvisorAgent,
}

impl AgentService {
  pub fn new(config: &Config, llm: Arc<dyn LLMChatter>) -> Self {
    let model_config: LLMModelConfig = config.model_config();
    let analyst = StrategicAnalystAgent::new(llm.clone(), model_config.clone(), config.attachment_prefix_chars);
    let advisor = AdvisorAgent::new(llm, model_config, config.advisor_context_chars);
    AgentService { analyst, advisor }
  }

  pub async fn run_strategic_analysis(&self, request: &AnalysisRequest) -> Result<AnalysisResult, Error> {
    return self.analyst.run(request).await;
  }

  pub async fn ask_advisor(&self, question: &str, analysis: Option<&AnalysisResult>) -> Result<String, Error> {
    return self.advisor.ask(question, analysis).await;
  }
}
