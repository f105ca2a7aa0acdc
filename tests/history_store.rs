use serde_json::json;
use strategic_analyst::ai_agent::data::history::{HistoryStore, StoreError};
use strategic_analyst::ai_agent::data::models::{AnalysisResult, Rating, RiskRow};
use strategic_analyst::ai_agent::tools::exporters::risks_from_csv;

fn analysis(summary: &str) -> AnalysisResult {
  AnalysisResult {
    executive_summary: summary.to_string(),
    risks: vec![RiskRow {
      category: "Regulatory".to_string(),
      risk: "Permit delay, appeal".to_string(),
      probability: Some(Rating::Number(4.0)),
      impact: Some(Rating::Number(3.0)),
      mitigation: "File early".to_string(),
      ..RiskRow::default()
    }],
    ..AnalysisResult::default()
  }
}

#[test]
fn records_survive_reopening_the_database() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("history.db");

  let first_id = {
    let store = HistoryStore::open(&path).unwrap();
    let first = store.save(&json!({"country": "Kenya"}), &analysis("first")).unwrap();
    let second = store.save(&json!({"country": "Chad"}), &analysis("second")).unwrap();
    assert!(second > first);
    first
  };

  let store = HistoryStore::open(&path).unwrap();
  let entries = store.list(50).unwrap();
  assert_eq!(entries.len(), 2);
  assert!(entries[0].id > entries[1].id);

  let record = store.load(first_id).unwrap();
  assert_eq!(record.executive_summary, "first");
  assert_eq!(record.params, json!({"country": "Kenya"}));

  let risks = risks_from_csv(record.risks_csv.as_bytes()).unwrap();
  assert_eq!(risks.len(), 1);
  assert_eq!(risks[0].risk, "Permit delay, appeal");
  assert_eq!(risks[0].probability, Some(Rating::Number(4.0)));
}

#[test]
fn list_respects_the_limit() {
  let store = HistoryStore::open_in_memory().unwrap();
  for n in 0..5 {
    store.save(&json!({"n": n}), &analysis("run")).unwrap();
  }
  assert_eq!(store.list(3).unwrap().len(), 3);
}

#[test]
fn unknown_id_is_not_found() {
  let store = HistoryStore::open_in_memory().unwrap();
  assert!(matches!(store.load(99), Err(StoreError::NotFound(99))));
}
