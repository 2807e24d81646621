pub mod analysis_model;
pub mod cost_analyzer;
pub mod performance_analyzer;
pub mod risk_analyzer;
pub mod tax_analyzer;

pub use analysis_model::*;
pub use cost_analyzer::*;
pub use performance_analyzer::*;
pub use risk_analyzer::*;
pub use tax_analyzer::*;

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use std::collections::HashMap;

use crate::constants::DEFAULT_CORRELATION;
use crate::params::MarketAssumptions;
use crate::portfolio::PortfolioSnapshot;
use crate::rebalance::RebalanceAction;

/// Post-trade weights (fractions, not percents) keyed by symbol,
/// derived by applying the actions' value deltas to the snapshot.
pub(crate) fn weights_after_actions(
    portfolio: &PortfolioSnapshot,
    actions: &[RebalanceAction],
) -> HashMap<String, Decimal> {
    let mut values: HashMap<String, Decimal> = portfolio
        .holdings
        .iter()
        .map(|h| (h.symbol.clone(), h.market_value()))
        .collect();
    for action in actions {
        let entry = values.entry(action.symbol.clone()).or_insert(Decimal::ZERO);
        *entry = (*entry + action.change_value).max(Decimal::ZERO);
    }
    values.retain(|_, v| !v.is_zero());

    if portfolio.total_value.is_zero() {
        return HashMap::new();
    }
    values
        .into_iter()
        .map(|(symbol, value)| (symbol, value / portfolio.total_value))
        .collect()
}

/// Current weights as fractions.
pub(crate) fn weights_before(portfolio: &PortfolioSnapshot) -> HashMap<String, Decimal> {
    portfolio
        .current_weights()
        .into_iter()
        .map(|(symbol, weight)| (symbol, weight / dec!(100)))
        .collect()
}

/// Weighted expected return over the given weights. Symbols with no
/// configured return fall back to the snapshot-level estimate and push
/// a warning (degraded, not fatal).
pub(crate) fn expected_return(
    weights: &HashMap<String, Decimal>,
    portfolio: &PortfolioSnapshot,
    assumptions: &MarketAssumptions,
    warnings: &mut Vec<String>,
) -> Decimal {
    let mut total = Decimal::ZERO;
    for (symbol, weight) in weights {
        let er = match assumptions.expected_returns.get(symbol) {
            Some(er) => *er,
            None => {
                warnings.push(format!(
                    "No expected return configured for '{symbol}'; using portfolio estimate"
                ));
                portfolio.metrics.expected_return
            }
        };
        total += *weight * er;
    }
    total
}

/// sqrt(w' * Sigma * w) over the configured volatilities and pairwise
/// correlations. Missing data degrades to defaults with a warning.
pub(crate) fn portfolio_volatility(
    weights: &HashMap<String, Decimal>,
    portfolio: &PortfolioSnapshot,
    assumptions: &MarketAssumptions,
    warnings: &mut Vec<String>,
) -> Decimal {
    let symbols: Vec<&String> = weights.keys().collect();
    if symbols.is_empty() {
        return Decimal::ZERO;
    }

    let mut vols: HashMap<&String, Decimal> = HashMap::new();
    for symbol in &symbols {
        let vol = match assumptions.volatilities.get(*symbol) {
            Some(v) => *v,
            None => {
                warnings.push(format!(
                    "No volatility configured for '{symbol}'; using portfolio estimate"
                ));
                portfolio.metrics.volatility
            }
        };
        vols.insert(symbol, vol);
    }

    let mut missing_correlation = false;
    let mut variance = Decimal::ZERO;
    for a in &symbols {
        for b in &symbols {
            let rho = match assumptions.correlation(a, b) {
                Some(rho) => rho,
                None => {
                    missing_correlation = true;
                    DEFAULT_CORRELATION
                }
            };
            variance += weights[*a] * weights[*b] * vols[a] * vols[b] * rho;
        }
    }
    if missing_correlation {
        warnings.push(format!(
            "Missing correlation data; assuming {} for unconfigured pairs",
            DEFAULT_CORRELATION
        ));
    }

    variance.max(Decimal::ZERO).sqrt().unwrap_or(Decimal::ZERO)
}

/// Splits total volatility into market-driven, residual and crowding
/// components from the average pairwise correlation and the Herfindahl
/// index of the weight vector.
pub(crate) fn decompose_risk(
    weights: &HashMap<String, Decimal>,
    total_risk: Decimal,
    average_correlation: Decimal,
) -> analysis_model::PortfolioRisk {
    let avg_corr = average_correlation.max(Decimal::ZERO);
    let systematic_risk = total_risk * avg_corr.sqrt().unwrap_or(Decimal::ZERO);
    let specific_variance = total_risk * total_risk - systematic_risk * systematic_risk;
    let specific_risk = specific_variance
        .max(Decimal::ZERO)
        .sqrt()
        .unwrap_or(Decimal::ZERO);
    let herfindahl: Decimal = weights.values().map(|w| *w * *w).sum();
    let concentration_risk = herfindahl.max(Decimal::ZERO).sqrt().unwrap_or(Decimal::ZERO);

    analysis_model::PortfolioRisk {
        total_risk,
        systematic_risk,
        specific_risk,
        concentration_risk,
    }
}

/// One-sided normal quantile for the configured confidence level.
/// Only the common levels are tabulated; anything else degrades to the
/// 95% z-score with a warning.
pub(crate) fn z_score(confidence: Decimal, warnings: &mut Vec<String>) -> Decimal {
    if confidence == dec!(0.90) {
        dec!(1.282)
    } else if confidence == dec!(0.95) {
        dec!(1.645)
    } else if confidence == dec!(0.99) {
        dec!(2.326)
    } else {
        warnings.push(format!(
            "Unsupported confidence level {confidence}; using 95% z-score"
        ));
        dec!(1.645)
    }
}
