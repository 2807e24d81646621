use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::analysis::{DefaultEstimator, PerformanceEstimator};
use crate::errors::Result;
use crate::params::{MarketAssumptions, SimulationParameters, StressScenario};
use crate::portfolio::PortfolioSnapshot;
use crate::rebalance::RebalanceAction;

use super::scenario_model::ScenarioResult;

/// Baseline regimes evaluated for every rebalance. Custom regimes from
/// the risk parameters are appended after these.
fn baseline_regimes() -> Vec<StressScenario> {
    vec![
        StressScenario {
            name: "bull".to_string(),
            probability: dec!(0.25),
            return_shock: dec!(0.15),
            volatility_multiplier: dec!(0.9),
        },
        StressScenario {
            name: "bear".to_string(),
            probability: dec!(0.25),
            return_shock: dec!(-0.20),
            volatility_multiplier: dec!(1.4),
        },
        StressScenario {
            name: "neutral".to_string(),
            probability: dec!(0.5),
            return_shock: Decimal::ZERO,
            volatility_multiplier: Decimal::ONE,
        },
    ]
}

/// Evaluates the post-trade book under each regime by shifting the
/// market assumptions and re-running the default estimator.
pub fn generate_scenarios(
    portfolio: &PortfolioSnapshot,
    actions: &[RebalanceAction],
    params: &SimulationParameters,
) -> Result<Vec<ScenarioResult>> {
    portfolio.validate()?;

    let weights = crate::analysis::weights_after_actions(portfolio, actions);
    let estimator = DefaultEstimator;

    let mut regimes = baseline_regimes();
    regimes.extend(params.risk_parameters.stress_test_scenarios.iter().cloned());

    let mut results = Vec::with_capacity(regimes.len());
    for regime in regimes {
        let shifted = shift_assumptions(&params.market_assumptions, &regime);
        let mut warnings = Vec::new();

        let performance = estimator.estimate(
            &weights,
            portfolio,
            &shifted,
            &params.risk_parameters,
            params.time_horizon_years,
            &mut warnings,
        );
        let total_risk =
            crate::analysis::portfolio_volatility(&weights, portfolio, &shifted, &mut warnings);
        let risk = crate::analysis::decompose_risk(&weights, total_risk, Decimal::ZERO);

        debug!(
            "Scenario '{}': expected return {}, volatility {}",
            regime.name, performance.annualized_return, performance.volatility
        );
        results.push(ScenarioResult {
            regime: regime.name,
            probability: regime.probability,
            performance,
            risk,
        });
    }
    Ok(results)
}

fn shift_assumptions(assumptions: &MarketAssumptions, regime: &StressScenario) -> MarketAssumptions {
    let mut shifted = assumptions.clone();
    for value in shifted.expected_returns.values_mut() {
        *value += regime.return_shock;
    }
    for value in shifted.volatilities.values_mut() {
        *value *= regime.volatility_multiplier;
    }
    shifted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::{Holding, SnapshotMetrics};
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
                sector: "broad".to_string(),
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
    fn emits_the_three_baseline_regimes() {
        let results =
            generate_scenarios(&portfolio(), &[], &configured_params()).unwrap();
        let regimes: Vec<&str> = results.iter().map(|r| r.regime.as_str()).collect();
        assert_eq!(regimes, vec!["bull", "bear", "neutral"]);
    }

    #[test]
    fn custom_stress_scenarios_are_appended() {
        let mut params = configured_params();
        params.risk_parameters.stress_test_scenarios.push(StressScenario {
            name: "stagflation".to_string(),
            probability: dec!(0.1),
            return_shock: dec!(-0.1),
            volatility_multiplier: dec!(1.2),
        });
        let results = generate_scenarios(&portfolio(), &[], &params).unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results[3].regime, "stagflation");
    }

    #[test]
    fn bull_beats_bear_on_expected_return() {
        let results =
            generate_scenarios(&portfolio(), &[], &configured_params()).unwrap();
        let bull = results.iter().find(|r| r.regime == "bull").unwrap();
        let bear = results.iter().find(|r| r.regime == "bear").unwrap();
        assert!(
            bull.performance.annualized_return > bear.performance.annualized_return
        );
        assert!(bear.risk.total_risk > bull.risk.total_risk);
    }
}
