use std::io::Write;
use std::process::{Command, Stdio};
use anyhow::{anyhow, bail, Context, Result};
use pulldown_cmark::{html, Options, Parser};

use crate::ai_agent::data::models::{format_number, AnalysisResult, Priority, Rating, RiskRow};

pub const RISK_COLUMNS: [&str; 7] = ["category", "risk", "probability", "impact", "mitigation", "score", "priority"];

/// The hand-built markdown table stops after this many risk rows.
pub const MAX_FALLBACK_ROWS: usize = 200;

fn risk_cells(row: &RiskRow) -> [String; 7] {
  [
    row.category.clone(),
    row.risk.clone(),
    row.probability.as_ref().map(Rating::to_string).unwrap_or_default(),
    row.impact.as_ref().map(Rating::to_string).unwrap_or_default(),
    row.mitigation.clone(),
    row.score.map(format_number).unwrap_or_default(),
    row.priority.map(|p| p.to_string()).unwrap_or_default(),
  ]
}

fn markdown_cell(text: &str) -> String {
  text.replace('|', "\\|").replace(&['\r', '\n'][..], " ")
}

fn bullet_list(items: &[String]) -> String {
  items.iter().map(|item| format!("- {}", item)).collect::<Vec<String>>().join("\n")
}

/// Risk table through prettytable, laid out as a markdown pipe table.
#[cfg(feature = "pretty-tables")]
pub fn formatted_risk_table(rows: &[RiskRow]) -> Option<String> {
  use prettytable::{format, Cell, Row, Table};

  let markdown_format = format::FormatBuilder::new()
    .column_separator('|')
    .borders('|')
    .separators(&[format::LinePosition::Title], format::LineSeparator::new('-', '|', '|', '|'))
    .padding(1, 1)
    .build();

  let mut table = Table::new();
  table.set_format(markdown_format);
  table.set_titles(Row::new(RISK_COLUMNS.iter().map(|c| Cell::new(c)).collect()));
  for row in rows {
    table.add_row(Row::new(risk_cells(row).iter().map(|c| Cell::new(&markdown_cell(c))).collect()));
  }

  let mut out: Vec<u8> = Vec::new();
  if let Err(e) = table.print(&mut out) {
    log::warn!("prettytable failed to render the risk table: {}", e);
    return None;
  }
  String::from_utf8(out).ok()
}

#[cfg(not(feature = "pretty-tables"))]
pub fn formatted_risk_table(_rows: &[RiskRow]) -> Option<String> {
  None
}

/// Plain pipe-delimited markdown table, capped at `max_rows` rows.
pub fn pipe_risk_table(rows: &[RiskRow], max_rows: usize) -> String {
  let mut lines: Vec<String> = Vec::with_capacity(rows.len().min(max_rows) + 2);
  lines.push(format!("| {} |", RISK_COLUMNS.join(" | ")));
  lines.push(format!("|{}|", vec!["---"; RISK_COLUMNS.len()].join("|")));
  for row in rows.iter().take(max_rows) {
    let cells: Vec<String> = risk_cells(row).iter().map(|c| markdown_cell(c)).collect();
    lines.push(format!("| {} |", cells.join(" | ")));
  }
  lines.join("\n")
}

fn risk_table_markdown(rows: &[RiskRow]) -> String {
  if rows.is_empty() {
    return String::new();
  }
  match formatted_risk_table(rows) {
    Some(table) => table.trim_end().to_string(),
    None => pipe_risk_table(rows, MAX_FALLBACK_ROWS),
  }
}

pub fn to_markdown_report(result: &AnalysisResult) -> String {
  let mut pestel_md = String::new();
  for row in &result.pestel {
    pestel_md.push_str(&format!("### {}\n", row.factor));
    if !row.points.is_empty() {
      pestel_md.push_str(&bullet_list(&row.points));
      pestel_md.push('\n');
    }
    if !row.assessment.is_empty() {
      pestel_md.push_str(&format!("\n_Assessment:_ {}\n", row.assessment));
    }
    pestel_md.push('\n');
  }

  let swot = &result.swot;

  format!(r#"# Strategic Analysis Report

## Executive Summary
{}

## PESTEL
{}
## SWOT
**Strengths**
{}

**Weaknesses**
{}

**Opportunities**
{}

**Threats**
{}

## Legal & Fiscal
{}

## Logistics & Infrastructure
{}

## Top Risks
{}

## Recommendations
{}
"#,
    result.executive_summary,
    pestel_md,
    bullet_list(&swot.strengths),
    bullet_list(&swot.weaknesses),
    bullet_list(&swot.opportunities),
    bullet_list(&swot.threats),
    result.legal_fiscal,
    result.logistics,
    risk_table_markdown(&result.risks),
    bullet_list(&result.recommendations))
}

/// CSV export of the risk table. The header row is always written, even with no risks.
pub fn risks_to_csv(rows: &[RiskRow]) -> Result<Vec<u8>> {
  let mut writer = csv::Writer::from_writer(Vec::new());
  writer.write_record(RISK_COLUMNS)?;
  for row in rows {
    writer.write_record(risk_cells(row))?;
  }
  writer.into_inner().map_err(|e| anyhow!("Failed to flush risk CSV: {}", e.error()))
}

/// Reads a risk CSV produced by `risks_to_csv` back into rows.
///
/// CSV cells carry no type, so a probability or impact that was numeric text (`"2"`, `" 3 "`) comes back as
/// `Rating::Number`. Its numeric value is unchanged; non-numeric text stays `Rating::Text`.
pub fn risks_from_csv(bytes: &[u8]) -> Result<Vec<RiskRow>> {
  let mut reader = csv::Reader::from_reader(bytes);
  let headers = reader.headers().context("Risk CSV has no header row")?.clone();
  let column = |name: &str| headers.iter().position(|h| h.trim() == name);
  let (category, risk, probability, impact, mitigation, score, priority) = (
    column("category"), column("risk"), column("probability"), column("impact"),
    column("mitigation"), column("score"), column("priority"),
  );

  let mut rows: Vec<RiskRow> = Vec::new();
  for record in reader.records() {
    let record = record.context("Malformed risk CSV record")?;
    let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");
    rows.push(RiskRow {
      category: field(category).to_string(),
      risk: field(risk).to_string(),
      probability: Rating::from_cell(field(probability)),
      impact: Rating::from_cell(field(impact)),
      mitigation: field(mitigation).to_string(),
      score: field(score).trim().parse::<f64>().ok(),
      priority: field(priority).parse::<Priority>().ok(),
    });
  }
  return Ok(rows);
}

pub fn markdown_to_html(md_text: &str) -> String {
  let mut body = String::new();
  html::push_html(&mut body, Parser::new_ext(md_text, Options::ENABLE_TABLES));
  format!("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Strategic Analysis Report</title></head><body>\n{}</body></html>\n", body)
}

/// Best-effort PDF export through an external HTML-to-PDF converter (wkhtmltopdf).
/// Any failure means "no PDF"; it is logged and never returned as an error.
pub fn markdown_to_pdf(md_text: &str, converter: &str) -> Option<Vec<u8>> {
  let html = markdown_to_html(md_text);
  match run_pdf_converter(converter, html) {
    Ok(pdf) => Some(pdf),
    Err(e) => {
      log::warn!("PDF export unavailable: {:#}", e);
      None
    }
  }
}

fn run_pdf_converter(converter: &str, html: String) -> Result<Vec<u8>> {
  let mut child = Command::new(converter)
    .args(["--quiet", "--encoding", "utf-8", "-", "-"])
    .stdin(Stdio::piped())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .spawn()
    .with_context(|| format!("Failed to start PDF converter '{}'", converter))?;

  let mut stdin = child.stdin.take().context("PDF converter stdin unavailable")?;
  let writer = std::thread::spawn(move || stdin.write_all(html.as_bytes()));

  let output = child.wait_with_output().context("PDF converter did not finish")?;
  match writer.join() {
    Ok(write_result) => write_result.context("Failed to send HTML to the PDF converter")?,
    Err(_) => bail!("PDF converter input thread panicked"),
  }

  if !output.status.success() {
    bail!("PDF converter exited with {}: {}", output.status, String::from_utf8_lossy(&output.stderr).trim());
  }
  if !output.stdout.starts_with(b"%PDF") {
    bail!("PDF converter produced no PDF output");
  }
  return Ok(output.stdout);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ai_agent::data::models::{PestelRow, Swot};

  fn scored_row(category: &str, risk: &str, p: f64, i: f64) -> RiskRow {
    RiskRow {
      category: category.to_string(),
      risk: risk.to_string(),
      probability: Some(Rating::Number(p)),
      impact: Some(Rating::Number(i)),
      mitigation: "Mitigate".to_string(),
      score: Some(p * i),
      priority: Some(Priority::from_score(p * i)),
    }
  }

  fn sample_result() -> AnalysisResult {
    AnalysisResult {
      executive_summary: "Summary text".to_string(),
      pestel: vec![PestelRow {
        factor: "Political".to_string(),
        points: vec!["Stable".to_string(), "Pro-RE".to_string()],
        assessment: "Supportive".to_string(),
      }],
      swot: Swot {
        strengths: vec!["Sun".to_string()],
        weaknesses: vec!["Grid".to_string()],
        opportunities: vec!["BESS".to_string()],
        threats: vec!["Cyclones".to_string()],
      },
      risks: vec![scored_row("Regulatory", "Permit | delay", 5.0, 3.0), scored_row("Technical", "Curtailment", 2.0, 3.0)],
      legal_fiscal: "VAT".to_string(),
      logistics: "Port".to_string(),
      recommendations: vec!["Act now".to_string()],
    }
  }

  #[test]
  fn report_sections_appear_in_fixed_order() {
    let md = to_markdown_report(&sample_result());
    let headings = ["## Executive Summary", "## PESTEL", "## SWOT", "## Legal & Fiscal", "## Logistics", "## Top Risks", "## Recommendations"];
    let positions: Vec<usize> = headings.iter().map(|h| md.find(h).unwrap_or_else(|| panic!("missing {}", h))).collect();
    let mut sorted = positions.clone();
    sorted.sort();
    assert_eq!(positions, sorted);
    assert!(md.contains("### Political\n- Stable\n- Pro-RE"));
    assert!(md.contains("- Act now"));
    assert!(md.contains("Permit \\| delay"));
  }

  #[test]
  fn pipe_table_is_capped() {
    let rows: Vec<RiskRow> = (0..250).map(|n| scored_row("Technical", &format!("risk {}", n), 1.0, 1.0)).collect();
    let table = pipe_risk_table(&rows, MAX_FALLBACK_ROWS);
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), MAX_FALLBACK_ROWS + 2);
    assert_eq!(lines[0], "| category | risk | probability | impact | mitigation | score | priority |");
    assert!(lines[MAX_FALLBACK_ROWS + 1].contains("risk 199"));
  }

  #[test]
  fn pipe_table_leaves_unscored_cells_blank() {
    let row = RiskRow {
      category: "Social".to_string(),
      risk: "Opposition".to_string(),
      probability: Some(Rating::Text("high".to_string())),
      impact: Some(Rating::Number(4.0)),
      mitigation: "Engage".to_string(),
      score: None,
      priority: None,
    };
    let table = pipe_risk_table(&[row], MAX_FALLBACK_ROWS);
    assert_eq!(table.lines().nth(2), Some("| Social | Opposition | high | 4 | Engage |  |  |"));
  }

  #[cfg(feature = "pretty-tables")]
  #[test]
  fn formatted_table_is_a_markdown_pipe_table() {
    let table = formatted_risk_table(&sample_result().risks).expect("prettytable output");
    let lines: Vec<&str> = table.lines().filter(|l| !l.trim().is_empty()).collect();
    assert_eq!(lines.len(), 4);
    assert!(lines.iter().all(|l| l.starts_with('|') && l.ends_with('|')));
    assert!(lines[1].chars().all(|c| c == '|' || c == '-'));
    assert!(lines[0].contains("category"));
    assert!(lines[2].contains("P1"));
  }

  #[test]
  fn empty_risk_csv_still_has_header() {
    let bytes = risks_to_csv(&[]).expect("csv");
    assert_eq!(String::from_utf8(bytes).expect("utf8"), "category,risk,probability,impact,mitigation,score,priority\n");
  }

  #[test]
  fn csv_round_trip_preserves_rows_in_order() {
    let rows = sample_result().risks;
    let bytes = risks_to_csv(&rows).expect("csv");
    let parsed = risks_from_csv(&bytes).expect("parse");
    assert_eq!(parsed, rows);
  }

  #[test]
  fn numeric_text_ratings_read_back_as_numbers() {
    let row = RiskRow {
      category: "Technical".to_string(),
      risk: "Curtailment".to_string(),
      probability: Some(Rating::Text("2".to_string())),
      impact: Some(Rating::Text(" 3 ".to_string())),
      mitigation: "Storage".to_string(),
      score: None,
      priority: None,
    };
    let parsed = risks_from_csv(&risks_to_csv(&[row.clone()]).expect("csv")).expect("parse");
    assert_eq!(parsed[0].probability, Some(Rating::Number(2.0)));
    assert_eq!(parsed[0].impact, Some(Rating::Number(3.0)));
    assert_eq!(parsed[0].probability.as_ref().and_then(Rating::as_f64), row.probability.as_ref().and_then(Rating::as_f64));
    assert_eq!(parsed[0].impact.as_ref().and_then(Rating::as_f64), row.impact.as_ref().and_then(Rating::as_f64));
  }

  #[test]
  fn html_renders_tables() {
    let md = to_markdown_report(&sample_result());
    let html = markdown_to_html(&md);
    assert!(html.contains("<h2>Executive Summary</h2>"));
    assert!(html.contains("<table>"));
  }

  #[test]
  fn missing_pdf_converter_yields_none() {
    assert!(markdown_to_pdf("# Title", "/nonexistent/wkhtmltopdf-binary").is_none());
  }
}
