#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use strategic_analyst::ai_agent::data::history::HistoryStore;
use strategic_analyst::ai_agent::data::models::{AnalysisRequest, Horizon};
use strategic_analyst::ai_agent::llm::model_provider::{ChatMessage, LLMChatter, LLMModelConfig, LLMResponse};
use strategic_analyst::app::config::Config;
use strategic_analyst::app::factory::AppState;

pub const FULL_REPLY: &str = r#"{
  "executive_summary": "Bankable if the grid connection is secured early.",
  "pestel": [
    {"factor": "Political", "points": ["Stable government", "Renewable targets"], "assessment": "Supportive"},
    {"factor": "Economic", "points": ["FX exposure"], "assessment": "Moderate"},
    {"factor": "Environmental", "points": ["High irradiance", "Cyclone season", "Land use"], "assessment": "Favourable"}
  ],
  "swot": {"strengths": ["Irradiance"], "weaknesses": ["Weak grid"], "opportunities": ["Storage"], "threats": ["Curtailment"]},
  "risks": [
    {"category": "Regulatory", "risk": "Permit delay", "probability": 5, "impact": 3, "mitigation": "File early"},
    {"category": "Technical", "risk": "Curtailment", "probability": 2, "impact": 3, "mitigation": "Add BESS"},
    {"category": "Financial", "risk": "FX devaluation", "probability": 2, "impact": 2, "mitigation": "USD indexation"}
  ],
  "legal_fiscal": "VAT exemption on modules.",
  "logistics": "Port clearance about ten days.",
  "recommendations": ["Secure land title", "Launch grid study"]
}"#;

/// Replies with the scripted answers in order, repeating the last one, and records every call.
pub struct ScriptedChatter {
  replies: Vec<String>,
  calls: Mutex<Vec<(Vec<ChatMessage>, LLMModelConfig)>>,
}

impl ScriptedChatter {
  pub fn new(replies: &[&str]) -> Arc<Self> {
    Arc::new(ScriptedChatter {
      replies: replies.iter().map(|reply| reply.to_string()).collect(),
      calls: Mutex::new(Vec::new()),
    })
  }

  pub fn calls(&self) -> Vec<(Vec<ChatMessage>, LLMModelConfig)> {
    self.calls.lock().unwrap().clone()
  }
}

#[async_trait]
impl LLMChatter for ScriptedChatter {
  async fn chat(&self, messages: Vec<ChatMessage>, config: &LLMModelConfig) -> Result<LLMResponse> {
    let mut calls = self.calls.lock().unwrap();
    let index = calls.len().min(self.replies.len().saturating_sub(1));
    calls.push((messages, config.clone()));
    let content = self.replies.get(index).cloned().unwrap_or_default();
    Ok(LLMResponse { content })
  }
}

pub struct FailingChatter;

#[async_trait]
impl LLMChatter for FailingChatter {
  async fn chat(&self, _messages: Vec<ChatMessage>, _config: &LLMModelConfig) -> Result<LLMResponse> {
    Err(anyhow!("LLM service returned 429 Too Many Requests: rate limited"))
  }
}

pub fn sample_request() -> AnalysisRequest {
  AnalysisRequest {
    country: "Mauritius".to_string(),
    technology: "Solar PV".to_string(),
    capacity_mw: 20.0,
    client: "Island Power Ltd".to_string(),
    offtaker: "CEB".to_string(),
    horizon: Horizon::MidTerm,
    notes: "Rooftop and ground-mount mix".to_string(),
    attachments: Default::default(),
  }
}

pub fn app_state(config: &Config, llm: Arc<dyn LLMChatter>) -> (AppState, Arc<HistoryStore>) {
  let history = Arc::new(HistoryStore::open_in_memory().unwrap());
  (AppState::with_components(config, llm, history.clone()), history)
}
