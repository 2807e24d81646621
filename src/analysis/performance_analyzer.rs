use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use std::collections::HashMap;

use crate::errors::Result;
use crate::params::{MarketAssumptions, RiskParameters, SimulationParameters};
use crate::portfolio::{PortfolioSnapshot, SnapshotMetrics};
use crate::rebalance::RebalanceAction;

use super::analysis_model::{PerformanceAnalysis, PerformanceMetrics};
use super::{expected_return, portfolio_volatility, weights_after_actions, weights_before, z_score};

/// Estimates the full metric set for a weight vector. The engine ships
/// a closed-form default; callers with a real pricing model plug in
/// their own implementation.
pub trait PerformanceEstimator: Send + Sync {
    fn estimate(
        &self,
        weights: &HashMap<String, Decimal>,
        portfolio: &PortfolioSnapshot,
        assumptions: &MarketAssumptions,
        risk: &RiskParameters,
        time_horizon_years: Decimal,
        warnings: &mut Vec<String>,
    ) -> PerformanceMetrics;
}

/// Closed-form estimator over the configured expected returns,
/// volatilities and correlations, with normal-approximation tail
/// metrics. Downside deviation and drawdown are scaled from total
/// volatility rather than simulated.
pub struct DefaultEstimator;

impl PerformanceEstimator for DefaultEstimator {
    fn estimate(
        &self,
        weights: &HashMap<String, Decimal>,
        portfolio: &PortfolioSnapshot,
        assumptions: &MarketAssumptions,
        risk: &RiskParameters,
        time_horizon_years: Decimal,
        warnings: &mut Vec<String>,
    ) -> PerformanceMetrics {
        let annualized_return = expected_return(weights, portfolio, assumptions, warnings);
        let volatility = portfolio_volatility(weights, portfolio, assumptions, warnings);

        let total_return = (Decimal::ONE + annualized_return)
            .powd(time_horizon_years)
            - Decimal::ONE;

        let excess = annualized_return - assumptions.risk_free_rate;
        let sharpe_ratio = safe_ratio(excess, volatility);

        let z = z_score(risk.confidence_level, warnings);
        let value_at_risk = (z * volatility - annualized_return).max(Decimal::ZERO);
        let conditional_value_at_risk = value_at_risk * dec!(1.25);

        let max_drawdown = (volatility * dec!(1.5)).min(Decimal::ONE);

        let beta = portfolio.metrics.beta;
        let downside_deviation = volatility * dec!(0.7);

        PerformanceMetrics {
            total_return,
            annualized_return,
            volatility,
            sharpe_ratio,
            max_drawdown,
            value_at_risk,
            conditional_value_at_risk,
            beta,
            information_ratio: Decimal::ZERO,
            tracking_error: Decimal::ZERO,
            calmar_ratio: safe_ratio(annualized_return, max_drawdown),
            sortino_ratio: safe_ratio(excess, downside_deviation),
            treynor_ratio: safe_ratio(excess, beta),
        }
    }
}

fn safe_ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

/// Before/after metric sets plus the element-wise improvement delta.
/// Tracking error and information ratio on the `after` side are taken
/// relative to the current book.
pub fn analyze_performance(
    portfolio: &PortfolioSnapshot,
    actions: &[RebalanceAction],
    params: &SimulationParameters,
) -> Result<PerformanceAnalysis> {
    analyze_performance_with(&DefaultEstimator, portfolio, actions, params)
}

pub fn analyze_performance_with(
    estimator: &dyn PerformanceEstimator,
    portfolio: &PortfolioSnapshot,
    actions: &[RebalanceAction],
    params: &SimulationParameters,
) -> Result<PerformanceAnalysis> {
    portfolio.validate()?;
    let mut warnings = Vec::new();

    let before_weights = weights_before(portfolio);
    let after_weights = weights_after_actions(portfolio, actions);

    let before = estimator.estimate(
        &before_weights,
        portfolio,
        &params.market_assumptions,
        &params.risk_parameters,
        params.time_horizon_years,
        &mut warnings,
    );
    let mut after = estimator.estimate(
        &after_weights,
        portfolio,
        &params.market_assumptions,
        &params.risk_parameters,
        params.time_horizon_years,
        &mut warnings,
    );

    after.tracking_error = tracking_error(&before_weights, &after_weights, &before, &after);
    after.information_ratio = safe_ratio(
        after.annualized_return - before.annualized_return,
        after.tracking_error,
    );

    let improvement = PerformanceMetrics::improvement(&after, &before);
    Ok(PerformanceAnalysis {
        before,
        after,
        improvement,
        warnings,
    })
}

/// sqrt(sum of squared active weights) scaled by the average of the two
/// books' volatilities.
fn tracking_error(
    before_weights: &HashMap<String, Decimal>,
    after_weights: &HashMap<String, Decimal>,
    before: &PerformanceMetrics,
    after: &PerformanceMetrics,
) -> Decimal {
    let mut symbols: Vec<&String> = before_weights.keys().collect();
    for symbol in after_weights.keys() {
        if !before_weights.contains_key(symbol) {
            symbols.push(symbol);
        }
    }

    let mut sum_squares = Decimal::ZERO;
    for symbol in symbols {
        let b = before_weights.get(symbol).copied().unwrap_or(Decimal::ZERO);
        let a = after_weights.get(symbol).copied().unwrap_or(Decimal::ZERO);
        let active = a - b;
        sum_squares += active * active;
    }
    let avg_vol = (before.volatility + after.volatility) / dec!(2);
    sum_squares.sqrt().unwrap_or(Decimal::ZERO) * avg_vol
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::{Holding, TargetAllocation, WeightTarget};
    use crate::rebalance::compute_actions;
    use chrono::Utc;

    fn portfolio() -> PortfolioSnapshot {
        PortfolioSnapshot::new(
            vec![Holding {
                symbol: "VTI".to_string(),
                quantity: dec!(300),
                price: dec!(100),
                weight: Decimal::ZERO,
                cost_basis: dec!(24000),
                holding_period_days: 400,
                jurisdiction: "US".to_string(),
                liquidity_score: dec!(8),
                asset_class: "equity".to_string(),
                sector: "technology".to_string(),
                geography: "north_america".to_string(),
                currency: "USD".to_string(),
            }],
            dec!(20000),
            SnapshotMetrics::default(),
            Utc::now(),
        )
        .unwrap()
    }

    fn configured_params() -> SimulationParameters {
        let mut params = SimulationParameters::default();
        params
            .market_assumptions
            .expected_returns
            .insert("VTI".to_string(), dec!(0.07));
        params
            .market_assumptions
            .volatilities
            .insert("VTI".to_string(), dec!(0.16));
        params
    }

    #[test]
    fn before_and_after_are_identical_without_actions() {
        let portfolio = portfolio();
        let analysis = analyze_performance(&portfolio, &[], &configured_params()).unwrap();
        assert_eq!(
            analysis.improvement.annualized_return,
            Decimal::ZERO
        );
        assert_eq!(analysis.improvement.volatility, Decimal::ZERO);
        assert_eq!(analysis.after.tracking_error, Decimal::ZERO);
    }

    #[test]
    fn selling_down_an_exposure_reduces_volatility() {
        let portfolio = portfolio();
        let mut allocation = TargetAllocation::new("test");
        allocation.holdings.push(WeightTarget {
            key: "VTI".to_string(),
            target_weight: dec!(40),
            tolerance: dec!(5),
            min_weight: Decimal::ZERO,
            max_weight: dec!(100),
            priority: 1,
        });
        let params = configured_params();
        let actions = compute_actions(&portfolio, &allocation, &params).unwrap();
        let analysis = analyze_performance(&portfolio, &actions, &params).unwrap();

        assert!(analysis.after.volatility < analysis.before.volatility);
        assert!(analysis.improvement.volatility < Decimal::ZERO);
        assert!(analysis.after.tracking_error > Decimal::ZERO);
    }

    #[test]
    fn missing_expected_return_degrades_with_warning() {
        let portfolio = portfolio();
        let analysis =
            analyze_performance(&portfolio, &[], &SimulationParameters::default()).unwrap();
        assert!(analysis
            .warnings
            .iter()
            .any(|w| w.contains("No expected return configured")));
        // Neutral fallback: snapshot-level estimate, weighted at 60%.
        assert_eq!(analysis.before.annualized_return, dec!(0.036));
    }

    #[test]
    fn sharpe_uses_configured_risk_free_rate() {
        let portfolio = portfolio();
        let params = configured_params();
        let analysis = analyze_performance(&portfolio, &[], &params).unwrap();
        // er = 0.6 * 0.07 = 0.042; vol = 0.6 * 0.16 = 0.096
        let expected = (dec!(0.042) - dec!(0.03)) / dec!(0.096);
        let diff = (analysis.before.sharpe_ratio - expected).abs();
        assert!(diff < dec!(0.000001), "sharpe off by {}", diff);
    }
}
