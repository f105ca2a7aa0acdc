use actix_web::middleware::from_fn;
use actix_web::{web, App};
use anyhow::{Context, Result};
use std::sync::Arc;

use crate::ai_agent::data::history::HistoryStore;
use crate::ai_agent::llm::model_provider::LLMChatter;
use crate::ai_agent::llm::models::get_model;
use crate::app::config::Config;
use crate::app::routes::routes::Routes;

use super::auth::{require_credentials, AuthGate};
use super::controller::analysis_controller::AnalysisController;
use super::services::agent_service::AgentService;
use super::services::service::AdvisoryServices;

/// Upper bound for JSON bodies; attachments travel base64-encoded inside them.
const JSON_BODY_LIMIT: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
  pub analysis_controller: Arc<AnalysisController>,
  pub auth_gate: AuthGate,
}

impl AppState {

  /// Builds the LLM client and opens the history database. Both fail fast at startup.
  pub fn new(app_config: &Config) -> Result<Self> {
    let llm: Arc<dyn LLMChatter> = Arc::from(get_model(&app_config.model_config())?);
    let history = HistoryStore::open(&app_config.history_db_path)
      .with_context(|| format!("Failed to open history database at {}", app_config.history_db_path))?;
    return Ok(AppState::with_components(app_config, llm, Arc::new(history)));
  }

  pub fn with_components(app_config: &Config, llm: Arc<dyn LLMChatter>, history: Arc<HistoryStore>) -> Self {
    let agent_service : AgentService = AgentService::new(app_config, llm);
    let advisory_services: Arc<AdvisoryServices> = Arc::new(AdvisoryServices::new(agent_service, history, &app_config.wkhtmltopdf_path));
    let analysis_controller : Arc<AnalysisController> = Arc::new(AnalysisController::new(advisory_services));
    let auth_gate = AuthGate::new(app_config.credentials());
    AppState { analysis_controller, auth_gate }
  }
}

pub struct CreateApp {
  app_state: AppState,
}

impl CreateApp {
  pub fn new(app_state: AppState) -> Self {
    CreateApp { app_state }
  }

  pub fn build_app(&self,) -> App<impl actix_web::dev::ServiceFactory<actix_web::dev::ServiceRequest,Config = (),Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,Error = actix_web::Error,InitError = (),>,> {
    App::new()
    .app_data(web::Data::new(self.app_state.analysis_controller.clone()))
    .app_data(web::Data::new(self.app_state.auth_gate.clone()))
    .app_data(web::JsonConfig::default().limit(JSON_BODY_LIMIT))
    .wrap(from_fn(require_credentials))
    .configure(Routes::configure)
  }
}
