use std::f64::consts::PI;
use std::io::Cursor;
use anyhow::{anyhow, Context, Result};
use image::{ImageFormat, RgbImage};
use once_cell::sync::Lazy;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::register_font;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::ai_agent::data::models::{format_number, PestelRow, Priority, Rating, RiskRow};

const HEATMAP_SIZE: (u32, u32) = (500, 400);
const BARS_SIZE: (u32, u32) = (500, 300);
const RADAR_SIZE: (u32, u32) = (480, 480);
const MARGIN: i32 = 24;

const FONT_FAMILY: &str = "sans-serif";
const TITLE_SIZE: f64 = 18.0;
const LABEL_SIZE: f64 = 13.0;
static CHART_FONT: &[u8] = include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/fonts/DejaVuSans.ttf"));

/// Registered once per process; charts carry their own font so no system fonts are needed.
static FONT_READY: Lazy<bool> = Lazy::new(|| match register_font(FONT_FAMILY, FontStyle::Normal, CHART_FONT) {
  Ok(()) => true,
  Err(_) => {
    log::error!("Bundled chart font could not be parsed");
    false
  }
});

type Canvas<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Score sums on a 5×5 probability/impact grid.
///
/// Row 0 is impact 5 (highest impact on top), column 0 is probability 1. Ratings outside 1..=5 are
/// clamped for placement only. `None` unless every row carries a score.
pub fn heatmap_matrix(risks: &[RiskRow]) -> Option<[[f64; 5]; 5]> {
  if risks.is_empty() {
    return None;
  }
  let mut matrix = [[0.0_f64; 5]; 5];
  for row in risks {
    let probability = row.probability.as_ref().and_then(Rating::as_f64)?;
    let impact = row.impact.as_ref().and_then(Rating::as_f64)?;
    let score = row.score?;
    let p = probability.clamp(1.0, 5.0) as usize - 1;
    let i = impact.clamp(1.0, 5.0) as usize - 1;
    matrix[4 - i][p] += score;
  }
  Some(matrix)
}

/// Total score per priority tier in P1, P2, P3 order. Tiers without risks count as zero.
pub fn priority_totals(risks: &[RiskRow]) -> Option<[f64; 3]> {
  if risks.is_empty() {
    return None;
  }
  let mut totals = [0.0_f64; 3];
  for row in risks {
    let priority: Priority = row.priority?;
    totals[priority.index()] += row.score?;
  }
  Some(totals)
}

/// One spoke per PESTEL factor; the spoke length is the number of points listed for it.
pub fn pestel_spokes(pestel: &[PestelRow]) -> Option<Vec<(String, usize)>> {
  if pestel.is_empty() {
    return None;
  }
  Some(pestel.iter().map(|row| (row.factor.clone(), row.points.len())).collect())
}

pub fn risk_heatmap_png(risks: &[RiskRow]) -> Option<Vec<u8>> {
  let matrix = heatmap_matrix(risks)?;
  chart_or_none("risk heatmap", render_png(HEATMAP_SIZE, |root| draw_heatmap(root, &matrix)))
}

pub fn risk_bars_png(risks: &[RiskRow]) -> Option<Vec<u8>> {
  let totals = priority_totals(risks)?;
  chart_or_none("risk priority bars", render_png(BARS_SIZE, |root| draw_bars(root, &totals)))
}

pub fn pestel_radar_png(pestel: &[PestelRow]) -> Option<Vec<u8>> {
  let spokes = pestel_spokes(pestel)?;
  chart_or_none("PESTEL radar", render_png(RADAR_SIZE, |root| draw_radar(root, &spokes)))
}

fn chart_or_none(name: &str, rendered: Result<Vec<u8>>) -> Option<Vec<u8>> {
  match rendered {
    Ok(png) => Some(png),
    Err(e) => {
      log::warn!("Could not render {}: {:#}", name, e);
      None
    }
  }
}

fn draw_error<E: std::fmt::Debug>(e: E) -> anyhow::Error {
  anyhow!("chart drawing failed: {:?}", e)
}

fn centered(size: f64) -> TextStyle<'static> {
  TextStyle::from((FONT_FAMILY, size).into_font()).color(&BLACK).pos(Pos::new(HPos::Center, VPos::Center))
}

/// Draws the title across the top and returns the area below it.
fn titled<'a>(root: &Canvas<'a>, title: &str) -> Result<Canvas<'a>> {
  root.titled(title, centered(TITLE_SIZE)).map_err(draw_error)
}

fn render_png<F>(size: (u32, u32), draw: F) -> Result<Vec<u8>> where F: FnOnce(&Canvas) -> Result<()> {
  if !*FONT_READY {
    return Err(anyhow!("chart font is unavailable"));
  }

  let (width, height) = size;
  let mut buffer: Vec<u8> = vec![0; (width * height * 3) as usize];
  {
    let root = BitMapBackend::with_buffer(&mut buffer, size).into_drawing_area();
    root.fill(&WHITE).map_err(draw_error)?;
    draw(&root)?;
    root.present().map_err(draw_error)?;
  }

  let image = RgbImage::from_raw(width, height, buffer).context("Chart buffer does not match its dimensions")?;
  let mut png: Vec<u8> = Vec::new();
  image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).context("PNG encoding failed")?;
  Ok(png)
}

fn heat_color(intensity: f64) -> RGBColor {
  let t = intensity.clamp(0.0, 1.0);
  RGBColor(255 - (t * 75.0) as u8, 255 - (t * 215.0) as u8, 255 - (t * 200.0) as u8)
}

/// Grid with probability 1..5 left to right and impact 5..1 top to bottom, each cell labelled with its score sum.
fn draw_heatmap(root: &Canvas, matrix: &[[f64; 5]; 5]) -> Result<()> {
  let body = titled(root, "Risk Heatmap (score sum)")?;
  let (w, h) = body.dim_in_pixel();
  let (w, h) = (w as i32, h as i32);
  let (top, bottom, left, right) = (8, 48, 72, MARGIN);
  let cell_w = (w - left - right) / 5;
  let cell_h = (h - top - bottom) / 5;

  let max = matrix.iter().flatten().cloned().fold(0.0_f64, f64::max);
  let grid = body.margin(top, bottom, left, right);
  for (idx, cell) in grid.split_evenly((5, 5)).iter().enumerate() {
    let value = matrix[idx / 5][idx % 5];
    let intensity = if max > 0.0 { value / max } else { 0.0 };
    cell.fill(&heat_color(intensity)).map_err(draw_error)?;
    let (cw, ch) = cell.dim_in_pixel();
    cell.draw(&Rectangle::new([(0, 0), (cw as i32 - 1, ch as i32 - 1)], BLACK.stroke_width(1))).map_err(draw_error)?;
    cell.draw_text(&format!("{:.0}", value), &centered(LABEL_SIZE), (cw as i32 / 2, ch as i32 / 2)).map_err(draw_error)?;
  }

  for k in 0..5 {
    let x = left + cell_w * k + cell_w / 2;
    body.draw_text(&(k + 1).to_string(), &centered(LABEL_SIZE), (x, h - bottom + 12)).map_err(draw_error)?;
    let y = top + cell_h * k + cell_h / 2;
    body.draw_text(&(5 - k).to_string(), &centered(LABEL_SIZE), (left - 12, y)).map_err(draw_error)?;
  }
  body.draw_text("Probability", &centered(LABEL_SIZE), (left + cell_w * 5 / 2, h - 14)).map_err(draw_error)?;
  body.draw_text("Impact", &centered(LABEL_SIZE), (left / 2 - 6, top + cell_h * 5 / 2)).map_err(draw_error)?;
  Ok(())
}

fn draw_bars(root: &Canvas, totals: &[f64; 3]) -> Result<()> {
  let body = titled(root, "Risk Score by Priority")?;
  let (w, h) = body.dim_in_pixel();
  let (w, h) = (w as i32, h as i32);
  let left = 2 * MARGIN;
  let baseline = h - MARGIN;
  let usable_height = (h - 2 * MARGIN) as f64;
  let slot = (w - left - MARGIN) / 3;
  let max = totals.iter().cloned().fold(0.0_f64, f64::max);
  let colors = [RGBColor(200, 40, 40), RGBColor(240, 160, 40), RGBColor(60, 160, 80)];

  for (idx, total) in totals.iter().enumerate() {
    let bar_height = if max > 0.0 { (total / max * usable_height) as i32 } else { 0 };
    let x0 = left + slot * idx as i32 + slot / 5;
    let x1 = left + slot * (idx as i32 + 1) - slot / 5;
    let mid = (x0 + x1) / 2;
    body.draw(&Rectangle::new([(x0, baseline - bar_height), (x1, baseline)], colors[idx].filled())).map_err(draw_error)?;
    body.draw_text(&format_number(*total), &centered(LABEL_SIZE), (mid, baseline - bar_height - 9)).map_err(draw_error)?;
    body.draw_text(Priority::ALL[idx].as_str(), &centered(LABEL_SIZE), (mid, baseline + 12)).map_err(draw_error)?;
  }
  body.draw(&PathElement::new(vec![(left, baseline), (w - MARGIN, baseline)], BLACK.stroke_width(2))).map_err(draw_error)?;
  body.draw(&PathElement::new(vec![(left, MARGIN), (left, baseline)], BLACK.stroke_width(2))).map_err(draw_error)?;
  body.draw_text("Score", &centered(LABEL_SIZE), (left / 2, MARGIN)).map_err(draw_error)?;
  Ok(())
}

fn radar_point(center: (i32, i32), radius: f64, spoke: usize, spokes: usize) -> (i32, i32) {
  let angle = -PI / 2.0 + 2.0 * PI * spoke as f64 / spokes as f64;
  (center.0 + (radius * angle.cos()).round() as i32, center.1 + (radius * angle.sin()).round() as i32)
}

fn draw_radar(root: &Canvas, spokes: &[(String, usize)]) -> Result<()> {
  let body = titled(root, "PESTEL Radar (relative salience)")?;
  let (w, h) = body.dim_in_pixel();
  let center = (w as i32 / 2, h as i32 / 2);
  let radius = (w.min(h) as i32 / 2 - 2 * MARGIN - 8) as f64;
  let n = spokes.len();
  let max = spokes.iter().map(|(_, len)| *len).max().unwrap_or(0).max(1) as f64;

  for ring in 1..=4 {
    let ring_radius = radius * ring as f64 / 4.0;
    let mut outline: Vec<(i32, i32)> = (0..n.max(3)).map(|k| radar_point(center, ring_radius, k, n.max(3))).collect();
    outline.push(outline[0]);
    body.draw(&PathElement::new(outline, RGBColor(200, 200, 200).stroke_width(1))).map_err(draw_error)?;
  }
  for (k, (factor, _)) in spokes.iter().enumerate() {
    let rim = radar_point(center, radius, k, n);
    body.draw(&PathElement::new(vec![center, rim], RGBColor(160, 160, 160).stroke_width(1))).map_err(draw_error)?;
    body.draw_text(factor, &centered(LABEL_SIZE), radar_point(center, radius + 20.0, k, n)).map_err(draw_error)?;
  }

  let mut shape: Vec<(i32, i32)> = spokes.iter().enumerate().map(|(k, (_, len))| radar_point(center, radius * *len as f64 / max, k, n)).collect();
  if shape.len() >= 3 {
    body.draw(&Polygon::new(shape.clone(), BLUE.mix(0.25).filled())).map_err(draw_error)?;
  }
  shape.push(shape[0]);
  body.draw(&PathElement::new(shape, BLUE.stroke_width(2))).map_err(draw_error)?;
  Ok(())
}
