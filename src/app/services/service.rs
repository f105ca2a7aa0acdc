use super::agent_service::AgentService;
use crate::ai_agent::data::history::{HistoryStore, StoreError};
use crate::ai_agent::data::models::{AnalysisRequest, AnalysisResult, FinanceScenario, HistoryEntry, HistoryRecord, RiskRow, SensitivityRequest};
use crate::ai_agent::llm::models::get_available_models;
use crate::ai_agent::tools::charts::{pestel_radar_png, risk_bars_png, risk_heatmap_png};
use crate::ai_agent::tools::exporters::{markdown_to_pdf, risks_from_csv, risks_to_csv, to_markdown_report};
use crate::ai_agent::tools::finance::{quick_scenario, sensitivity_tariff, ScenarioResult, SensitivityRow};

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use serde::{Serialize, Deserialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdvisoryError {
  #[error("invalid request: {0}")]
  InvalidRequest(String),
  #[error("LLM service failure: {0}")]
  Upstream(String),
  #[error(transparent)]
  History(#[from] StoreError),
  #[error(transparent)]
  Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
  Heatmap,
  Priority,
  Pestel,
}

impl FromStr for ChartKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "heatmap" => Ok(ChartKind::Heatmap),
      "priority" | "bars" => Ok(ChartKind::Priority),
      "pestel" | "radar" => Ok(ChartKind::Pestel),
      _ => Err(format!("Unknown chart: {}", s)),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
  pub history_id: Option<i64>,
  pub result: AnalysisResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryDetail {
  #[serde(flatten)]
  pub record: HistoryRecord,
  pub risks: Vec<RiskRow>,
}

pub struct AdvisoryServices {
  agent_service : AgentService,
  history: Arc<HistoryStore>,
  pdf_converter: String,
}

impl AdvisoryServices {

  pub fn new(agent_service: AgentService, history: Arc<HistoryStore>, pdf_converter: &str) -> Self {
    AdvisoryServices { agent_service, history, pdf_converter: pdf_converter.to_string() }
  }

  pub fn get_available_models(&self) -> Vec<HashMap<String, String>> {
    get_available_models().iter().map(|model| {
      let mut map = HashMap::new();
      map.insert("display_name".to_string(), model.display_name.clone());
      map.insert("model_name".to_string(), model.model_name.clone());
      map.insert("provider".to_string(), model.provider.to_string());
      map
    }).collect()
  }

  /// Runs the analysis and appends it to the history log. A failed save is logged, not returned.
  pub async fn run_analysis(&self, request: AnalysisRequest) -> Result<AnalysisOutcome, AdvisoryError> {
    request.validate().map_err(|e| AdvisoryError::InvalidRequest(e.to_string()))?;

    let result = self.agent_service.run_strategic_analysis(&request).await.map_err(|e| AdvisoryError::Upstream(format!("{:#}", e)))?;

    let history_id = match self.history.save(&request.params(), &result) {
      Ok(id) => Some(id),
      Err(e) => {
        log::error!("Analysis finished but could not be saved to history: {}", e);
        None
      }
    };

    return Ok(AnalysisOutcome { history_id, result });
  }

  /// Rejects out-of-range inputs before computing.
  pub fn finance_scenario(&self, scenario: &FinanceScenario) -> Result<ScenarioResult, AdvisoryError> {
    scenario.validate().map_err(|e| AdvisoryError::InvalidRequest(e.to_string()))?;
    Ok(quick_scenario(scenario))
  }

  pub fn tariff_sensitivity(&self, request: &SensitivityRequest) -> Result<Vec<SensitivityRow>, AdvisoryError> {
    request.validate().map_err(|e| AdvisoryError::InvalidRequest(e.to_string()))?;
    Ok(sensitivity_tariff(request))
  }

  pub fn markdown_report(&self, result: &AnalysisResult) -> String {
    to_markdown_report(result)
  }

  pub fn risks_csv(&self, result: &AnalysisResult) -> Result<Vec<u8>, AdvisoryError> {
    Ok(risks_to_csv(&result.risks)?)
  }

  /// `None` when no PDF converter is usable on this host.
  pub async fn pdf_report(&self, result: &AnalysisResult) -> Option<Vec<u8>> {
    let markdown = to_markdown_report(result);
    let converter = self.pdf_converter.clone();
    match tokio::task::spawn_blocking(move || markdown_to_pdf(&markdown, &converter)).await {
      Ok(pdf) => pdf,
      Err(e) => {
        log::error!("PDF conversion task failed: {}", e);
        None
      }
    }
  }

  pub fn chart(&self, kind: ChartKind, result: &AnalysisResult) -> Option<Vec<u8>> {
    match kind {
      ChartKind::Heatmap => risk_heatmap_png(&result.risks),
      ChartKind::Priority => risk_bars_png(&result.risks),
      ChartKind::Pestel => pestel_radar_png(&result.pestel),
    }
  }

  /// Context comes from the analysis in the request, else from a stored history record, else none.
  pub async fn ask_advisor(&self, question: &str, analysis: Option<AnalysisResult>, history_id: Option<i64>) -> Result<String, AdvisoryError> {
    if question.trim().is_empty() {
      return Err(AdvisoryError::InvalidRequest("question must not be empty".to_string()));
    }

    let analysis = match (analysis, history_id) {
      (Some(analysis), _) => Some(analysis),
      (None, Some(id)) => {
        let detail = self.load_history(id)?;
        Some(AnalysisResult {
          executive_summary: detail.record.executive_summary,
          risks: detail.risks,
          ..AnalysisResult::default()
        })
      }
      (None, None) => None,
    };

    self.agent_service.ask_advisor(question, analysis.as_ref()).await.map_err(|e| AdvisoryError::Upstream(format!("{:#}", e)))
  }

  pub fn list_history(&self, limit: u32) -> Result<Vec<HistoryEntry>, AdvisoryError> {
    Ok(self.history.list(limit)?)
  }

  pub fn load_history(&self, id: i64) -> Result<HistoryDetail, AdvisoryError> {
    let record = self.history.load(id)?;
    let risks = match risks_from_csv(record.risks_csv.as_bytes()) {
      Ok(risks) => risks,
      Err(e) => {
        log::warn!("Stored risk table of analysis {} could not be parsed: {:#}", id, e);
        Vec::new()
      }
    };
    return Ok(HistoryDetail { record, risks });
  }
}
