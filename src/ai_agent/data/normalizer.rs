use serde_json::{Map, Value};

use crate::ai_agent::data::models::{AnalysisResult, PestelRow, Priority, Rating, RiskRow, Swot};

/// Turns the raw model reply into an `AnalysisResult`.
///
/// A reply that is not a JSON object falls back to `AnalysisResult::degraded`, which copies the raw
/// text into the free-text sections and leaves every table empty. Inside an object, absent keys and
/// keys of the wrong type take their default.
pub fn normalize_response(raw: &str) -> AnalysisResult {
  let data: Map<String, Value> = match serde_json::from_str::<Value>(raw) {
    Ok(Value::Object(map)) => map,
    Ok(other) => {
      log::warn!("Model response is JSON but not an object ({}), falling back to raw text", json_kind(&other));
      return AnalysisResult::degraded(raw);
    }
    Err(e) => {
      log::warn!("Model response is not valid JSON: {}. Falling back to raw text", e);
      return AnalysisResult::degraded(raw);
    }
  };

  let mut risks: Vec<RiskRow> = data.get("risks").and_then(Value::as_array).map(|rows| rows.iter().map(risk_row).collect()).unwrap_or_default();

  if !risks.is_empty() && !score_risks(&mut risks) {
    log::info!("Risk table has non-numeric probability/impact, leaving {} rows unscored", risks.len());
  }

  return AnalysisResult {
    executive_summary: text_field(&data, "executive_summary"),
    pestel: data.get("pestel").and_then(Value::as_array).map(|rows| rows.iter().map(pestel_row).collect()).unwrap_or_default(),
    swot: data.get("swot").map(swot).unwrap_or_default(),
    risks,
    legal_fiscal: text_field(&data, "legal_fiscal"),
    logistics: text_field(&data, "logistics"),
    recommendations: data.get("recommendations").map(string_list).unwrap_or_default(),
  };
}

/// Sets `score = probability × impact` and the derived priority on every row.
///
/// All-or-nothing: if any row lacks a numeric probability or impact, no row is touched and `false`
/// is returned. Ratings outside 1..=5 are used as given.
pub fn score_risks(rows: &mut [RiskRow]) -> bool {
  let mut scores: Vec<f64> = Vec::with_capacity(rows.len());
  for row in rows.iter() {
    let probability = row.probability.as_ref().and_then(Rating::as_f64);
    let impact = row.impact.as_ref().and_then(Rating::as_f64);
    match (probability, impact) {
      (Some(p), Some(i)) => scores.push(p * i),
      _ => return false,
    }
  }

  for (row, score) in rows.iter_mut().zip(scores) {
    row.score = Some(score);
    row.priority = Some(Priority::from_score(score));
  }
  return true;
}

fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "bool",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

fn text_field(data: &Map<String, Value>, key: &str) -> String {
  match data.get(key) {
    Some(Value::String(s)) => s.clone(),
    Some(Value::Null) | None => String::new(),
    Some(other) => other.to_string(),
  }
}

fn item_text(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

fn string_list(value: &Value) -> Vec<String> {
  match value {
    Value::Array(items) => items.iter().filter(|v| !v.is_null()).map(item_text).collect(),
    _ => Vec::new(),
  }
}

fn pestel_row(value: &Value) -> PestelRow {
  let row = match value.as_object() {
    Some(row) => row,
    None => return PestelRow { factor: item_text(value), ..PestelRow::default() },
  };
  PestelRow {
    factor: text_field(row, "factor"),
    points: row.get("points").map(string_list).unwrap_or_default(),
    assessment: text_field(row, "assessment"),
  }
}

fn swot(value: &Value) -> Swot {
  let quadrants = match value.as_object() {
    Some(quadrants) => quadrants,
    None => return Swot::default(),
  };
  let quadrant = |key: &str| quadrants.get(key).map(string_list).unwrap_or_default();
  Swot {
    strengths: quadrant("strengths"),
    weaknesses: quadrant("weaknesses"),
    opportunities: quadrant("opportunities"),
    threats: quadrant("threats"),
  }
}

fn rating(value: Option<&Value>) -> Option<Rating> {
  match value? {
    Value::Number(n) => n.as_f64().map(Rating::Number),
    Value::String(s) => Some(Rating::Text(s.clone())),
    Value::Null => None,
    other => Some(Rating::Text(other.to_string())),
  }
}

fn risk_row(value: &Value) -> RiskRow {
  let row = match value.as_object() {
    Some(row) => row,
    None => return RiskRow { risk: item_text(value), ..RiskRow::default() },
  };
  RiskRow {
    category: text_field(row, "category"),
    risk: text_field(row, "risk"),
    probability: rating(row.get("probability")),
    impact: rating(row.get("impact")),
    mitigation: text_field(row, "mitigation"),
    score: None,
    priority: None,
  }
}
