mod common;

use std::sync::Arc;

use actix_web::http::{header, StatusCode};
use actix_web::test;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};

use common::{app_state, FailingChatter, ScriptedChatter, FULL_REPLY};
use strategic_analyst::ai_agent::data::normalizer::normalize_response;
use strategic_analyst::app::config::Config;
use strategic_analyst::app::factory::CreateApp;

fn analysis_body() -> Value {
  json!({
    "country": "Mauritius",
    "technology": "Solar PV",
    "capacity_mw": 20.0,
    "client": "Island Power Ltd",
    "offtaker": "CEB",
    "horizon": "Long-term",
    "attachments": [{"name": "site.txt", "content_base64": STANDARD.encode("Site is 40 ha, flat.")}]
  })
}

#[actix_web::test]
async fn analysis_is_returned_and_saved_to_history() {
  let chatter = ScriptedChatter::new(&[FULL_REPLY]);
  let (state, history) = app_state(&Config::default(), chatter.clone());
  let app = test::init_service(CreateApp::new(state).build_app()).await;

  let req = test::TestRequest::post().uri("/analysis").set_json(analysis_body()).to_request();
  let body: Value = test::call_and_read_body_json(&app, req).await;

  let history_id = body["history_id"].as_i64().unwrap();
  assert_eq!(body["result"]["risks"][0]["priority"], "P1");
  assert_eq!(body["result"]["risks"][0]["score"], 15.0);

  let prompt = &chatter.calls()[0].0[1].content;
  assert!(prompt.contains("Site is 40 ha, flat."));

  let record = history.load(history_id).unwrap();
  assert_eq!(record.executive_summary, "Bankable if the grid connection is secured early.");
  assert_eq!(record.params["attachments"], json!(["site.txt"]));

  let req = test::TestRequest::get().uri(&format!("/history/{}", history_id)).to_request();
  let detail: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(detail["id"], history_id);
  assert_eq!(detail["risks"].as_array().unwrap().len(), 3);
  assert_eq!(detail["risks"][1]["risk"], "Curtailment");

  let req = test::TestRequest::get().uri("/history?limit=10").to_request();
  let entries: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(entries.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn invalid_capacity_is_a_bad_request() {
  let chatter = ScriptedChatter::new(&[FULL_REPLY]);
  let (state, _) = app_state(&Config::default(), chatter.clone());
  let app = test::init_service(CreateApp::new(state).build_app()).await;

  let mut body = analysis_body();
  body["capacity_mw"] = json!(0.0);
  let req = test::TestRequest::post().uri("/analysis").set_json(body).to_request();
  let resp = test::call_service(&app, req).await;

  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert!(chatter.calls().is_empty());
}

#[actix_web::test]
async fn llm_failure_is_a_bad_gateway() {
  let (state, history) = app_state(&Config::default(), Arc::new(FailingChatter));
  let app = test::init_service(CreateApp::new(state).build_app()).await;

  let req = test::TestRequest::post().uri("/analysis").set_json(analysis_body()).to_request();
  let resp = test::call_service(&app, req).await;

  assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
  assert!(history.list(10).unwrap().is_empty());
}

#[actix_web::test]
async fn unknown_history_id_is_not_found() {
  let (state, _) = app_state(&Config::default(), ScriptedChatter::new(&["{}"]));
  let app = test::init_service(CreateApp::new(state).build_app()).await;

  let req = test::TestRequest::get().uri("/history/42").to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn finance_endpoints_compute_metrics() {
  let (state, _) = app_state(&Config::default(), ScriptedChatter::new(&["{}"]));
  let app = test::init_service(CreateApp::new(state).build_app()).await;

  let req = test::TestRequest::post().uri("/finance/scenario")
    .set_json(json!({"capex": 1000.0, "opex": 0.0, "tariff": 1.0, "energy": 500.0, "horizon_years": 2, "discount_rate": 0.0}))
    .to_request();
  let scenario: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(scenario["annual_cashflow"], 500.0);
  assert!(scenario["irr"].as_f64().unwrap().abs() < 1e-6);
  assert!((scenario["lcoe"].as_f64().unwrap() - 1.0).abs() < 1e-9);

  let req = test::TestRequest::post().uri("/finance/sensitivity")
    .set_json(json!({"capex": 1000.0, "opex": 100.0, "energy": 100.0, "tariffs": [2.0, 3.0, 4.0]}))
    .to_request();
  let rows: Value = test::call_and_read_body_json(&app, req).await;
  let rows = rows.as_array().unwrap();
  assert_eq!(rows.len(), 3);
  assert_eq!(rows[0]["tariff"], 2.0);
  assert_eq!(rows[2]["annual_cashflow"], 300.0);
}

#[actix_web::test]
async fn out_of_range_finance_inputs_are_bad_requests() {
  let (state, _) = app_state(&Config::default(), ScriptedChatter::new(&["{}"]));
  let app = test::init_service(CreateApp::new(state).build_app()).await;

  let req = test::TestRequest::post().uri("/finance/scenario")
    .set_json(json!({"capex": 12000000.0, "opex": 300000.0, "tariff": 120.0, "energy": 21000.0, "horizon_years": 3000000000u32}))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body: Value = test::read_body_json(resp).await;
  assert!(body["error"].as_str().unwrap().contains("horizon_years"));

  let req = test::TestRequest::post().uri("/finance/scenario")
    .set_json(json!({"capex": 1000.0, "opex": 0.0, "tariff": 1.0, "energy": 500.0, "horizon_years": 0}))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

  let req = test::TestRequest::post().uri("/finance/sensitivity")
    .set_json(json!({"capex": 1000.0, "opex": 100.0, "energy": 100.0, "tariffs": [2.0], "horizon_years": 500}))
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn exports_and_charts() {
  let (state, _) = app_state(&Config { wkhtmltopdf_path: "/nonexistent/wkhtmltopdf".to_string(), ..Config::default() }, ScriptedChatter::new(&["{}"]));
  let app = test::init_service(CreateApp::new(state).build_app()).await;
  let analysis: Value = serde_json::to_value(normalize_response(FULL_REPLY)).unwrap();

  let req = test::TestRequest::post().uri("/export/markdown").set_json(&analysis).to_request();
  let markdown = test::call_and_read_body(&app, req).await;
  let markdown = String::from_utf8(markdown.to_vec()).unwrap();
  assert!(markdown.starts_with("# Strategic Analysis Report"));
  assert!(markdown.contains("Permit delay"));

  let req = test::TestRequest::post().uri("/export/csv").set_json(&analysis).to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let csv = test::read_body(resp).await;
  assert!(csv.starts_with(b"category,risk,probability,impact,mitigation,score,priority"));

  let req = test::TestRequest::post().uri("/export/pdf").set_json(&analysis).to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::NO_CONTENT);

  let req = test::TestRequest::post().uri("/charts/heatmap").set_json(&analysis).to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "image/png");
  let png = test::read_body(resp).await;
  assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));

  let req = test::TestRequest::post().uri("/charts/pestel").set_json(&analysis).to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let req = test::TestRequest::post().uri("/charts/priority").set_json(json!({"risks": []})).to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::NO_CONTENT);

  let req = test::TestRequest::post().uri("/charts/pie").set_json(&analysis).to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn advisor_can_use_a_stored_analysis() {
  let chatter = ScriptedChatter::new(&[FULL_REPLY, "Secure the grid slot first."]);
  let (state, _) = app_state(&Config::default(), chatter.clone());
  let app = test::init_service(CreateApp::new(state).build_app()).await;

  let req = test::TestRequest::post().uri("/analysis").set_json(analysis_body()).to_request();
  let outcome: Value = test::call_and_read_body_json(&app, req).await;

  let req = test::TestRequest::post().uri("/advisor")
    .set_json(json!({"question": "What is the first step?", "history_id": outcome["history_id"]}))
    .to_request();
  let reply: Value = test::call_and_read_body_json(&app, req).await;
  assert_eq!(reply["answer"], "Secure the grid slot first.");

  let prompt = &chatter.calls()[1].0[1].content;
  assert!(prompt.contains("Bankable if the grid connection is secured early."));
  assert!(prompt.ends_with("Question:\nWhat is the first step?"));

  let req = test::TestRequest::post().uri("/advisor").set_json(json!({"question": "  "})).to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn credentials_gate_everything_but_health() {
  let config = Config {
    app_username: Some("analyst".to_string()),
    app_password: Some("s3cret".to_string()),
    ..Config::default()
  };
  let (state, _) = app_state(&config, ScriptedChatter::new(&["{}"]));
  let app = test::init_service(CreateApp::new(state).build_app()).await;

  let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let resp = test::call_service(&app, test::TestRequest::get().uri("/models").to_request()).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

  let req = test::TestRequest::get().uri("/models")
    .insert_header((header::AUTHORIZATION, format!("Basic {}", STANDARD.encode("analyst:s3cret"))))
    .to_request();
  let models: Value = test::call_and_read_body_json(&app, req).await;
  assert!(models.as_array().unwrap().iter().any(|m| m["model_name"] == "gpt-4o-mini"));
}
