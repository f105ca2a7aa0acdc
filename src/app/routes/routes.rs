use actix_web::{web, HttpResponse, Responder};
use std::collections::BTreeMap;
use std::sync::Arc;
use serde::{Serialize, Deserialize};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::ai_agent::data::history::StoreError;
use crate::ai_agent::data::models::{decode_attachment, AnalysisRequest, AnalysisResult, FinanceScenario, Horizon, SensitivityRequest};
use crate::app::controller::analysis_controller::AnalysisController;
use crate::app::services::service::{AdvisoryError, ChartKind};

#[derive(Deserialize, Serialize)]
pub struct AttachmentUpload {
  pub name: String,
  pub content_base64: String,
}

#[derive(Deserialize, Serialize)]
pub struct AnalysisRequestBody {
  pub country: String,
  pub technology: String,
  pub capacity_mw: f64,
  #[serde(default)]
  pub client: String,
  #[serde(default)]
  pub offtaker: String,
  #[serde(default)]
  pub horizon: Horizon,
  #[serde(default)]
  pub notes: String,
  #[serde(default)]
  pub attachments: Vec<AttachmentUpload>,
}

impl AnalysisRequestBody {
  /// Decodes the uploads. A later upload with the same name replaces the earlier one.
  pub fn into_request(self) -> Result<AnalysisRequest, AdvisoryError> {
    let mut attachments: BTreeMap<String, String> = BTreeMap::new();
    for upload in self.attachments {
      let bytes = STANDARD.decode(upload.content_base64.trim())
        .map_err(|e| AdvisoryError::InvalidRequest(format!("attachment '{}' is not valid base64: {}", upload.name, e)))?;
      attachments.insert(upload.name, decode_attachment(&bytes));
    }

    return Ok(AnalysisRequest {
      country: self.country,
      technology: self.technology,
      capacity_mw: self.capacity_mw,
      client: self.client,
      offtaker: self.offtaker,
      horizon: self.horizon,
      notes: self.notes,
      attachments,
    });
  }
}

#[derive(Deserialize, Serialize)]
pub struct AdvisorRequestBody {
  pub question: String,
  #[serde(default)]
  pub analysis: Option<AnalysisResult>,
  #[serde(default)]
  pub history_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
  pub limit: Option<u32>,
}

fn error_response(e: &AdvisoryError) -> HttpResponse {
  let body = serde_json::json!({"error": e.to_string()});
  match e {
    AdvisoryError::InvalidRequest(_) => HttpResponse::BadRequest().json(body),
    AdvisoryError::Upstream(_) => HttpResponse::BadGateway().json(body),
    AdvisoryError::History(StoreError::NotFound(_)) => HttpResponse::NotFound().json(body),
    AdvisoryError::History(_) | AdvisoryError::Internal(_) => HttpResponse::InternalServerError().json(body),
  }
}

fn binary_response(content_type: &str, file_name: &str, bytes: Vec<u8>) -> HttpResponse {
  HttpResponse::Ok()
    .content_type(content_type)
    .insert_header(("Content-Disposition", format!("attachment; filename=\"{}\"", file_name)))
    .body(bytes)
}

pub struct Routes;

impl Routes {

  #[allow(unused)]
  pub fn new() -> Self {
    Routes {}
  }

  pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(Self::health)));
    cfg.service(web::resource("/models").route(web::get().to(Self::get_models)));
    cfg.service(web::resource("/analysis").route(web::post().to(Self::run_analysis)));
    cfg.service(web::resource("/finance/scenario").route(web::post().to(Self::finance_scenario)));
    cfg.service(web::resource("/finance/sensitivity").route(web::post().to(Self::tariff_sensitivity)));
    cfg.service(web::resource("/export/markdown").route(web::post().to(Self::export_markdown)));
    cfg.service(web::resource("/export/csv").route(web::post().to(Self::export_csv)));
    cfg.service(web::resource("/export/pdf").route(web::post().to(Self::export_pdf)));
    cfg.service(web::resource("/charts/{kind}").route(web::post().to(Self::chart)));
    cfg.service(web::resource("/advisor").route(web::post().to(Self::ask_advisor)));
    cfg.service(web::resource("/history").route(web::get().to(Self::list_history)));
    cfg.service(web::resource("/history/{id}").route(web::get().to(Self::load_history)));
  }

  async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
      "status": "ok",
      "Info": "Strategic analysis service for renewable-energy projects.",
      "code": 200,
    }))
  }

  async fn get_models(controller: web::Data<Arc<AnalysisController>>) -> impl Responder {
    HttpResponse::Ok().json(controller.get_available_models().await)
  }

  async fn run_analysis(controller: web::Data<Arc<AnalysisController>>, body: web::Json<AnalysisRequestBody>) -> impl Responder {
    let request = match body.into_inner().into_request() {
      Ok(request) => request,
      Err(e) => return error_response(&e),
    };

    match controller.run_analysis(request).await {
      Ok(outcome) => HttpResponse::Ok().json(outcome),
      Err(e) => error_response(&e),
    }
  }

  async fn finance_scenario(controller: web::Data<Arc<AnalysisController>>, body: web::Json<FinanceScenario>) -> impl Responder {
    match controller.finance_scenario(body.into_inner()).await {
      Ok(result) => HttpResponse::Ok().json(result),
      Err(e) => error_response(&e),
    }
  }

  async fn tariff_sensitivity(controller: web::Data<Arc<AnalysisController>>, body: web::Json<SensitivityRequest>) -> impl Responder {
    match controller.tariff_sensitivity(body.into_inner()).await {
      Ok(rows) => HttpResponse::Ok().json(rows),
      Err(e) => error_response(&e),
    }
  }

  async fn export_markdown(controller: web::Data<Arc<AnalysisController>>, body: web::Json<AnalysisResult>) -> impl Responder {
    let markdown = controller.markdown_report(&body).await;
    binary_response("text/markdown; charset=utf-8", "report.md", markdown.into_bytes())
  }

  async fn export_csv(controller: web::Data<Arc<AnalysisController>>, body: web::Json<AnalysisResult>) -> impl Responder {
    match controller.risks_csv(&body).await {
      Ok(csv) => binary_response("text/csv; charset=utf-8", "risks.csv", csv),
      Err(e) => error_response(&e),
    }
  }

  async fn export_pdf(controller: web::Data<Arc<AnalysisController>>, body: web::Json<AnalysisResult>) -> impl Responder {
    match controller.pdf_report(&body).await {
      Some(pdf) => binary_response("application/pdf", "report.pdf", pdf),
      None => HttpResponse::NoContent().finish(),
    }
  }

  async fn chart(controller: web::Data<Arc<AnalysisController>>, kind: web::Path<String>, body: web::Json<AnalysisResult>) -> impl Responder {
    let kind: ChartKind = match kind.parse() {
      Ok(kind) => kind,
      Err(e) => return HttpResponse::NotFound().json(serde_json::json!({"error": e})),
    };

    match controller.chart(kind, &body).await {
      Some(png) => HttpResponse::Ok().content_type("image/png").body(png),
      None => HttpResponse::NoContent().finish(),
    }
  }

  async fn ask_advisor(controller: web::Data<Arc<AnalysisController>>, body: web::Json<AdvisorRequestBody>) -> impl Responder {
    let body = body.into_inner();
    match controller.ask_advisor(&body.question, body.analysis, body.history_id).await {
      Ok(answer) => HttpResponse::Ok().json(serde_json::json!({"answer": answer})),
      Err(e) => error_response(&e),
    }
  }

  async fn list_history(controller: web::Data<Arc<AnalysisController>>, query: web::Query<HistoryQuery>) -> impl Responder {
    match controller.list_history(query.limit).await {
      Ok(entries) => HttpResponse::Ok().json(entries),
      Err(e) => error_response(&e),
    }
  }

  async fn load_history(controller: web::Data<Arc<AnalysisController>>, id: web::Path<i64>) -> impl Responder {
    match controller.load_history(id.into_inner()).await {
      Ok(detail) => HttpResponse::Ok().json(detail),
      Err(e) => error_response(&e),
    }
  }
}
