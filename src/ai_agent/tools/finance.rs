use serde::{Serialize, Deserialize};

use crate::ai_agent::data::models::{FinanceScenario, SensitivityRequest};

/// Floor for the discounted-energy denominator of the LCOE.
pub const LCOE_ENERGY_EPSILON: f64 = 1e-6;

const IRR_TOLERANCE: f64 = 1e-10;
const IRR_MAX_NEWTON_STEPS: usize = 100;
const IRR_MAX_BISECTION_STEPS: usize = 300;
const IRR_LOWER_BOUND: f64 = -0.9999;
const IRR_UPPER_BOUND: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
  /// NaN (serialized as null) when the cashflow series has no internal rate of return.
  pub irr: f64,
  pub lcoe: f64,
  pub annual_cashflow: f64,
  pub payback_year: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityRow {
  pub tariff: f64,
  pub irr: f64,
  pub annual_cashflow: f64,
}

/// Net present value, with `cashflows[0]` at t = 0.
pub fn npv(rate: f64, cashflows: &[f64]) -> f64 {
  let base: f64 = 1.0 + rate;
  cashflows.iter().enumerate().map(|(t, cf)| cf / base.powi(t as i32)).sum()
}

fn npv_derivative(rate: f64, cashflows: &[f64]) -> f64 {
  let base: f64 = 1.0 + rate;
  cashflows.iter().enumerate().skip(1).map(|(t, cf)| -(t as f64) * cf / base.powi(t as i32 + 1)).sum()
}

/// Internal rate of return of a cashflow series (t = 0 first).
///
/// Newton-Raphson from 10%, then bisection over (-1, 1000] if Newton does not settle.
/// Returns NaN when no root exists in that range.
pub fn irr(cashflows: &[f64]) -> f64 {
  if cashflows.len() < 2 || cashflows.iter().any(|cf| !cf.is_finite()) {
    return f64::NAN;
  }
  let has_inflow = cashflows.iter().any(|cf| *cf > 0.0);
  let has_outflow = cashflows.iter().any(|cf| *cf < 0.0);
  if !(has_inflow && has_outflow) {
    return f64::NAN;
  }

  if let Some(rate) = irr_newton(cashflows) {
    return rate;
  }
  return irr_bisection(cashflows).unwrap_or(f64::NAN);
}

fn irr_newton(cashflows: &[f64]) -> Option<f64> {
  let mut rate: f64 = 0.1;
  for _ in 0..IRR_MAX_NEWTON_STEPS {
    let value = npv(rate, cashflows);
    let slope = npv_derivative(rate, cashflows);
    if slope == 0.0 || !slope.is_finite() {
      return None;
    }
    let next = rate - value / slope;
    if !next.is_finite() || next <= IRR_LOWER_BOUND || next > IRR_UPPER_BOUND {
      return None;
    }
    if (next - rate).abs() < IRR_TOLERANCE {
      return Some(next);
    }
    rate = next;
  }
  None
}

fn irr_bisection(cashflows: &[f64]) -> Option<f64> {
  let mut low: f64 = IRR_LOWER_BOUND;
  let mut high: f64 = IRR_UPPER_BOUND;
  let mut npv_low = npv(low, cashflows);
  let npv_high = npv(high, cashflows);
  if !npv_low.is_finite() || !npv_high.is_finite() || npv_low.signum() == npv_high.signum() {
    return None;
  }

  for _ in 0..IRR_MAX_BISECTION_STEPS {
    let mid = (low + high) / 2.0;
    let npv_mid = npv(mid, cashflows);
    if npv_mid == 0.0 || (high - low) / 2.0 < IRR_TOLERANCE {
      return Some(mid);
    }
    if npv_mid.signum() == npv_low.signum() {
      low = mid;
      npv_low = npv_mid;
    }
    else {
      high = mid;
    }
  }
  Some((low + high) / 2.0)
}

/// Levelized cost of energy. Year 0 carries the capex and produces no energy.
pub fn lcoe(capex: f64, opex_annual: f64, energy_annual_mwh: f64, years: u32, discount: f64) -> f64 {
  let base: f64 = 1.0 + discount;
  let mut pv_costs: f64 = capex;
  let mut pv_energy: f64 = 0.0;
  for t in 1..=years {
    let factor = base.powi(t as i32);
    pv_costs += opex_annual / factor;
    pv_energy += energy_annual_mwh / factor;
  }
  return pv_costs / pv_energy.max(LCOE_ENERGY_EPSILON);
}

/// First year whose cumulative cashflow recovers the capex, if any.
pub fn payback_year(capex: f64, annual_cashflows: &[f64]) -> Option<u32> {
  let mut cumulative: f64 = 0.0;
  for (i, cf) in annual_cashflows.iter().enumerate() {
    cumulative += cf;
    if cumulative >= capex {
      return Some(i as u32 + 1);
    }
  }
  None
}

fn flat_series(capex: f64, annual_cashflow: f64, years: u32) -> Vec<f64> {
  let mut series: Vec<f64> = Vec::with_capacity(years as usize + 1);
  series.push(-capex);
  series.extend(std::iter::repeat(annual_cashflow).take(years as usize));
  series
}

/// Expects input that passed `FinanceScenario::validate`; the horizon sizes the cashflow series.
pub fn quick_scenario(scenario: &FinanceScenario) -> ScenarioResult {
  let annual_cashflow: f64 = scenario.tariff * scenario.energy - scenario.opex;
  let series = flat_series(scenario.capex, annual_cashflow, scenario.horizon_years);

  return ScenarioResult {
    irr: irr(&series),
    lcoe: lcoe(scenario.capex, scenario.opex, scenario.energy, scenario.horizon_years, scenario.discount_rate),
    annual_cashflow,
    payback_year: payback_year(scenario.capex, &series[1..]),
  };
}

/// One row per tariff, in input order, with capex/opex/energy held fixed.
/// Expects input that passed `SensitivityRequest::validate`.
pub fn sensitivity_tariff(request: &SensitivityRequest) -> Vec<SensitivityRow> {
  request.tariffs.iter().map(|&tariff| {
    let scenario = FinanceScenario {
      capex: request.capex,
      opex: request.opex,
      tariff,
      energy: request.energy,
      horizon_years: request.horizon_years,
      discount_rate: request.discount_rate,
    };
    let result = quick_scenario(&scenario);
    SensitivityRow { tariff, irr: result.irr, annual_cashflow: result.annual_cashflow }
  }).collect()
}
