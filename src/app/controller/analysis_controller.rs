use std::sync::Arc;
use std::collections::HashMap;

use crate::ai_agent::data::models::{AnalysisRequest, AnalysisResult, FinanceScenario, HistoryEntry, SensitivityRequest};
use crate::ai_agent::tools::finance::{ScenarioResult, SensitivityRow};
use crate::app::services::service::{AdvisoryError, AdvisoryServices, AnalysisOutcome, ChartKind, HistoryDetail};

pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

pub struct AnalysisController {
  services : Arc<AdvisoryServices>
}

impl AnalysisController {
  pub fn new(services: Arc<AdvisoryServices>) -> Self {
    AnalysisController {services: services}
  }

  pub async fn get_available_models(&self) -> Vec<HashMap<String, String>> {
    return self.services.get_available_models();
  }

  pub async fn run_analysis(&self, request: AnalysisRequest) -> Result<AnalysisOutcome, AdvisoryError> {
    log::info!("Analysis requested: {} / {} ({} MW, {} attachments)", request.country, request.technology, request.capacity_mw, request.attachments.len());
    let outcome = match self.services.run_analysis(request).await {
      Ok(outcome) => outcome,
      Err(e) => {
        log::error!("Analysis failed with error: {}", e);
        return Err(e);
      }
    };
    return Ok(outcome);
  }

  pub async fn finance_scenario(&self, scenario: FinanceScenario) -> Result<ScenarioResult, AdvisoryError> {
    let result = match self.services.finance_scenario(&scenario) {
      Ok(result) => result,
      Err(e) => {
        log::warn!("Rejected finance scenario: {}", e);
        return Err(e);
      }
    };
    log::debug!("Scenario IRR={} LCOE={}", result.irr, result.lcoe);
    return Ok(result);
  }

  pub async fn tariff_sensitivity(&self, request: SensitivityRequest) -> Result<Vec<SensitivityRow>, AdvisoryError> {
    self.services.tariff_sensitivity(&request).map_err(|e| {
      log::warn!("Rejected tariff sensitivity: {}", e);
      e
    })
  }

  pub async fn markdown_report(&self, result: &AnalysisResult) -> String {
    return self.services.markdown_report(result);
  }

  pub async fn risks_csv(&self, result: &AnalysisResult) -> Result<Vec<u8>, AdvisoryError> {
    self.services.risks_csv(result).map_err(|e| {
      log::error!("Cannot export risks to CSV with error: {}", e);
      e
    })
  }

  pub async fn pdf_report(&self, result: &AnalysisResult) -> Option<Vec<u8>> {
    let pdf = self.services.pdf_report(result).await;
    if pdf.is_none() {
      log::warn!("PDF export unavailable, no converter output");
    }
    return pdf;
  }

  pub async fn chart(&self, kind: ChartKind, result: &AnalysisResult) -> Option<Vec<u8>> {
    let png = self.services.chart(kind, result);
    if png.is_none() {
      log::info!("No {:?} chart for this analysis", kind);
    }
    return png;
  }

  pub async fn ask_advisor(&self, question: &str, analysis: Option<AnalysisResult>, history_id: Option<i64>) -> Result<String, AdvisoryError> {
    self.services.ask_advisor(question, analysis, history_id).await.map_err(|e| {
      log::error!("Advisor failed with error: {}", e);
      e
    })
  }

  pub async fn list_history(&self, limit: Option<u32>) -> Result<Vec<HistoryEntry>, AdvisoryError> {
    self.services.list_history(limit.unwrap_or(DEFAULT_HISTORY_LIMIT)).map_err(|e| {
      log::error!("Cannot list history with error: {}", e);
      e
    })
  }

  pub async fn load_history(&self, id: i64) -> Result<HistoryDetail, AdvisoryError> {
    return self.services.load_history(id);
  }
}
