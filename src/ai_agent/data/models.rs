use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use anyhow::{anyhow, Result};
use chrono::NaiveDateTime;
use serde::{Serialize, Deserialize, Deserializer};
use serde_json::Value;

/// Attachment excerpts are cut to this many characters before they reach the prompt.
pub const DEFAULT_ATTACHMENT_PREFIX_CHARS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Horizon {
  #[serde(rename = "Short-term")]
  ShortTerm,
  #[serde(rename = "Mid-term")]
  MidTerm,
  #[serde(rename = "Long-term")]
  LongTerm,
}

impl Horizon {
  pub fn as_str(&self) -> &'static str {
    match self {
      Horizon::ShortTerm => "Short-term",
      Horizon::MidTerm => "Mid-term",
      Horizon::LongTerm => "Long-term",
    }
  }
}

impl Default for Horizon {
  fn default() -> Self {
    Horizon::MidTerm
  }
}

impl fmt::Display for Horizon {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Horizon {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().replace('_', "-").as_str() {
      "short-term" | "short" | "shortterm" => Ok(Horizon::ShortTerm),
      "mid-term" | "mid" | "midterm" | "medium-term" => Ok(Horizon::MidTerm),
      "long-term" | "long" | "longterm" => Ok(Horizon::LongTerm),
      _ => Err(format!("Unknown horizon: {}", s)),
    }
  }
}

impl<'de> Deserialize<'de> for Horizon {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: Deserializer<'de> {
    let s = String::deserialize(deserializer)?;
    Horizon::from_str(&s).map_err(serde::de::Error::custom)
  }
}

/// One project submission. Attachments are already decoded to text and keyed by file name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
  pub country: String,
  pub technology: String,
  pub capacity_mw: f64,
  pub client: String,
  pub offtaker: String,
  #[serde(default)]
  pub horizon: Horizon,
  #[serde(default)]
  pub notes: String,
  #[serde(default)]
  pub attachments: BTreeMap<String, String>,
}

impl AnalysisRequest {
  pub fn validate(&self) -> Result<()> {
    if !self.capacity_mw.is_finite() || self.capacity_mw <= 0.0 {
      return Err(anyhow!("capacity_mw must be a positive number, got {}", self.capacity_mw));
    }
    if self.country.trim().is_empty() {
      return Err(anyhow!("country must not be empty"));
    }
    if self.technology.trim().is_empty() {
      return Err(anyhow!("technology must not be empty"));
    }
    return Ok(());
  }

  /// Parameters as persisted in the history log. Attachment bodies are left out, only their names are kept.
  pub fn params(&self) -> Value {
    let attachment_names: Vec<&String> = self.attachments.keys().collect();
    serde_json::json!({
      "country": self.country,
      "technology": self.technology,
      "capacity_mw": self.capacity_mw,
      "client": self.client,
      "offtaker": self.offtaker,
      "horizon": self.horizon.as_str(),
      "notes": self.notes,
      "attachments": attachment_names,
    })
  }
}

/// Decodes uploaded bytes as UTF-8, dropping invalid sequences instead of replacing them.
pub fn decode_attachment(bytes: &[u8]) -> String {
  let mut text = String::with_capacity(bytes.len());
  for chunk in bytes.utf8_chunks() {
    text.push_str(chunk.valid());
  }
  return text;
}

pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
  match text.char_indices().nth(max_chars) {
    Some((byte_idx, _)) => &text[..byte_idx],
    None => text,
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PestelRow {
  #[serde(default)]
  pub factor: String,
  #[serde(default)]
  pub points: Vec<String>,
  #[serde(default)]
  pub assessment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Swot {
  #[serde(default)]
  pub strengths: Vec<String>,
  #[serde(default)]
  pub weaknesses: Vec<String>,
  #[serde(default)]
  pub opportunities: Vec<String>,
  #[serde(default)]
  pub threats: Vec<String>,
}

impl Swot {
  pub fn is_empty(&self) -> bool {
    self.strengths.is_empty() && self.weaknesses.is_empty() && self.opportunities.is_empty() && self.threats.is_empty()
  }
}

/// A probability or impact rating as the model emitted it: usually a number, sometimes text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rating {
  Number(f64),
  Text(String),
}

impl Rating {
  pub fn as_f64(&self) -> Option<f64> {
    let value = match self {
      Rating::Number(n) => *n,
      Rating::Text(s) => s.trim().parse::<f64>().ok()?,
    };
    value.is_finite().then_some(value)
  }

  /// Reads a CSV cell back into a rating; numeric text becomes a number.
  pub fn from_cell(cell: &str) -> Option<Rating> {
    let cell = cell.trim();
    if cell.is_empty() {
      return None;
    }
    match cell.parse::<f64>() {
      Ok(n) if n.is_finite() => Some(Rating::Number(n)),
      _ => Some(Rating::Text(cell.to_string())),
    }
  }
}

impl fmt::Display for Rating {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Rating::Number(n) => write!(f, "{}", format_number(*n)),
      Rating::Text(s) => write!(f, "{}", s),
    }
  }
}

/// Integral values print without a fractional part ("15", not "15.0").
pub fn format_number(n: f64) -> String {
  if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
    format!("{}", n as i64)
  }
  else {
    format!("{}", n)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
  P1,
  P2,
  P3,
}

impl Priority {
  pub const ALL: [Priority; 3] = [Priority::P1, Priority::P2, Priority::P3];

  pub fn from_score(score: f64) -> Self {
    if score >= 15.0 {
      return Priority::P1;
    }
    if score >= 7.0 {
      return Priority::P2;
    }
    return Priority::P3;
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Priority::P1 => "P1",
      Priority::P2 => "P2",
      Priority::P3 => "P3",
    }
  }

  pub fn index(&self) -> usize {
    match self {
      Priority::P1 => 0,
      Priority::P2 => 1,
      Priority::P3 => 2,
    }
  }
}

impl fmt::Display for Priority {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Priority {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_uppercase().as_str() {
      "P1" => Ok(Priority::P1),
      "P2" => Ok(Priority::P2),
      "P3" => Ok(Priority::P3),
      _ => Err(format!("Unknown priority: {}", s)),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskRow {
  #[serde(default)]
  pub category: String,
  #[serde(default)]
  pub risk: String,
  #[serde(default)]
  pub probability: Option<Rating>,
  #[serde(default)]
  pub impact: Option<Rating>,
  #[serde(default)]
  pub mitigation: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub score: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub priority: Option<Priority>,
}

impl RiskRow {
  pub fn is_scored(&self) -> bool {
    self.score.is_some() && self.priority.is_some()
  }
}

/// Normalized output of one strategic-analysis call. Every field defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
  #[serde(default)]
  pub executive_summary: String,
  #[serde(default)]
  pub pestel: Vec<PestelRow>,
  #[serde(default)]
  pub swot: Swot,
  #[serde(default)]
  pub risks: Vec<RiskRow>,
  #[serde(default)]
  pub legal_fiscal: String,
  #[serde(default)]
  pub logistics: String,
  #[serde(default)]
  pub recommendations: Vec<String>,
}

impl AnalysisResult {
  /// The free-text fallback used whenever the model output cannot be decoded.
  pub fn degraded(raw: &str) -> Self {
    AnalysisResult {
      executive_summary: raw.to_string(),
      legal_fiscal: raw.to_string(),
      logistics: raw.to_string(),
      ..AnalysisResult::default()
    }
  }

  pub fn risks_scored(&self) -> bool {
    !self.risks.is_empty() && self.risks.iter().all(RiskRow::is_scored)
  }
}

/// Longest project life the finance helpers accept.
pub const MAX_HORIZON_YEARS: u32 = 100;
pub const MAX_SENSITIVITY_TARIFFS: usize = 1000;

fn check_horizon(horizon_years: u32) -> Result<()> {
  if horizon_years == 0 || horizon_years > MAX_HORIZON_YEARS {
    return Err(anyhow!("horizon_years must be between 1 and {}, got {}", MAX_HORIZON_YEARS, horizon_years));
  }
  Ok(())
}

fn check_finite(name: &str, value: f64) -> Result<()> {
  if !value.is_finite() {
    return Err(anyhow!("{} must be a finite number, got {}", name, value));
  }
  Ok(())
}

fn check_discount(discount_rate: f64) -> Result<()> {
  check_finite("discount_rate", discount_rate)?;
  if discount_rate <= -1.0 {
    return Err(anyhow!("discount_rate must be above -1, got {}", discount_rate));
  }
  Ok(())
}

fn default_horizon_years() -> u32 {
  25
}

fn default_discount_rate() -> f64 {
  0.08
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinanceScenario {
  pub capex: f64,
  pub opex: f64,
  /// USD per MWh
  pub tariff: f64,
  /// MWh per year
  pub energy: f64,
  #[serde(default = "default_horizon_years")]
  pub horizon_years: u32,
  #[serde(default = "default_discount_rate")]
  pub discount_rate: f64,
}

impl FinanceScenario {
  pub fn new(capex: f64, opex: f64, tariff: f64, energy: f64) -> Self {
    FinanceScenario {
      capex, opex, tariff, energy,
      horizon_years: default_horizon_years(),
      discount_rate: default_discount_rate(),
    }
  }

  pub fn validate(&self) -> Result<()> {
    check_finite("capex", self.capex)?;
    check_finite("opex", self.opex)?;
    check_finite("tariff", self.tariff)?;
    check_finite("energy", self.energy)?;
    check_discount(self.discount_rate)?;
    check_horizon(self.horizon_years)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityRequest {
  pub capex: f64,
  pub opex: f64,
  pub energy: f64,
  pub tariffs: Vec<f64>,
  #[serde(default = "default_horizon_years")]
  pub horizon_years: u32,
  #[serde(default = "default_discount_rate")]
  pub discount_rate: f64,
}

impl SensitivityRequest {
  pub fn validate(&self) -> Result<()> {
    check_finite("capex", self.capex)?;
    check_finite("opex", self.opex)?;
    check_finite("energy", self.energy)?;
    check_discount(self.discount_rate)?;
    check_horizon(self.horizon_years)?;
    if self.tariffs.len() > MAX_SENSITIVITY_TARIFFS {
      return Err(anyhow!("at most {} tariffs per sensitivity run, got {}", MAX_SENSITIVITY_TARIFFS, self.tariffs.len()));
    }
    for tariff in &self.tariffs {
      check_finite("tariff", *tariff)?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub id: i64,
  pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
  pub id: i64,
  pub timestamp: NaiveDateTime,
  pub params: Value,
  pub executive_summary: String,
  pub risks_csv: String,
}
