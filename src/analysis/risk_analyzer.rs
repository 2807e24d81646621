use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

use crate::constants::STRESS_TEST_CONFIDENCE;
use crate::errors::Result;
use crate::params::SimulationParameters;
use crate::portfolio::PortfolioSnapshot;
use crate::rebalance::RebalanceAction;

use super::analysis_model::{
    ConcentrationSummary, CorrelationSummary, RiskAnalysis, RiskAttribution, StressTestResult,
};
use super::{portfolio_volatility, weights_after_actions};

/// Aggregates portfolio-level risk for the post-trade book:
/// decomposition, concentration, correlations, attribution, stress
/// tests and risk-budget utilization.
pub fn analyze_risk(
    portfolio: &PortfolioSnapshot,
    actions: &[RebalanceAction],
    params: &SimulationParameters,
) -> Result<RiskAnalysis> {
    portfolio.validate()?;
    let mut warnings = Vec::new();

    let weights = weights_after_actions(portfolio, actions);
    let assumptions = &params.market_assumptions;

    let total_risk = portfolio_volatility(&weights, portfolio, assumptions, &mut warnings);

    let correlation_summary = summarize_correlations(&weights, params);
    let portfolio_risk = super::decompose_risk(&weights, total_risk, correlation_summary.average);

    let concentration = summarize_concentration(portfolio, &weights, &mut warnings);
    let attribution = attribute_risk(
        portfolio,
        &weights,
        total_risk,
        portfolio_risk.systematic_risk,
        &mut warnings,
    );

    let stress_tests = params
        .risk_parameters
        .stress_test_scenarios
        .iter()
        .map(|scenario| {
            let impact = scenario.return_shock * portfolio.metrics.beta;
            StressTestResult {
                scenario: scenario.name.clone(),
                probability: scenario.probability,
                impact,
                confidence: STRESS_TEST_CONFIDENCE,
                expected_loss: (impact.min(Decimal::ZERO).abs()
                    * scenario.probability
                    * STRESS_TEST_CONFIDENCE
                    * portfolio.total_value),
            }
        })
        .collect();

    let budget = params.risk_parameters.risk_budget;
    let risk_budget_utilization = if budget.is_zero() {
        warnings.push("Risk budget is zero; utilization not computed".to_string());
        Decimal::ZERO
    } else {
        total_risk / budget
    };

    Ok(RiskAnalysis {
        portfolio_risk,
        concentration,
        correlation_summary,
        attribution,
        stress_tests,
        risk_budget_utilization,
        warnings,
    })
}

fn summarize_correlations(
    weights: &HashMap<String, Decimal>,
    params: &SimulationParameters,
) -> CorrelationSummary {
    let symbols: Vec<&String> = weights.keys().collect();
    let mut sum = Decimal::ZERO;
    let mut highest = dec!(-1);
    let mut lowest = Decimal::ONE;
    let mut count = 0u32;

    for (i, a) in symbols.iter().enumerate() {
        for b in symbols.iter().skip(i + 1) {
            if let Some(rho) = params.market_assumptions.correlation(a, b) {
                sum += rho;
                highest = highest.max(rho);
                lowest = lowest.min(rho);
                count += 1;
            }
        }
    }

    if count == 0 {
        return CorrelationSummary::default();
    }
    CorrelationSummary {
        average: sum / Decimal::from(count),
        highest,
        lowest,
        pair_count: count,
    }
}

fn summarize_concentration(
    portfolio: &PortfolioSnapshot,
    weights: &HashMap<String, Decimal>,
    warnings: &mut Vec<String>,
) -> ConcentrationSummary {
    let mut by_sector: HashMap<String, Decimal> = HashMap::new();
    let mut by_geography: HashMap<String, Decimal> = HashMap::new();
    let mut by_currency: HashMap<String, Decimal> = HashMap::new();
    let mut top_symbol = String::new();
    let mut top_weight = Decimal::ZERO;

    for (symbol, weight) in weights {
        if *weight > top_weight {
            top_weight = *weight;
            top_symbol = symbol.clone();
        }
        match portfolio.holding(symbol) {
            Some(h) => {
                *by_sector.entry(h.sector.clone()).or_default() += *weight;
                *by_geography.entry(h.geography.clone()).or_default() += *weight;
                *by_currency.entry(h.currency.clone()).or_default() += *weight;
            }
            None => {
                // A pure buy from zero; classification unknown until settled.
                warnings.push(format!(
                    "'{symbol}' has no classification in the snapshot; bucketed as unclassified"
                ));
                *by_sector.entry("unclassified".to_string()).or_default() += *weight;
                *by_geography.entry("unclassified".to_string()).or_default() += *weight;
                *by_currency.entry("unclassified".to_string()).or_default() += *weight;
            }
        }
    }

    ConcentrationSummary {
        top_holding_symbol: top_symbol,
        top_holding_weight: top_weight,
        by_sector,
        by_geography,
        by_currency,
    }
}

fn attribute_risk(
    portfolio: &PortfolioSnapshot,
    weights: &HashMap<String, Decimal>,
    total_risk: Decimal,
    systematic_risk: Decimal,
    warnings: &mut Vec<String>,
) -> RiskAttribution {
    let mut equity_weight = Decimal::ZERO;
    let mut bond_weight = Decimal::ZERO;
    let mut other_weight = Decimal::ZERO;
    let mut foreign_weight = Decimal::ZERO;

    for (symbol, weight) in weights {
        match portfolio.holding(symbol) {
            Some(h) => {
                match h.asset_class.as_str() {
                    "equity" => equity_weight += *weight,
                    "bond" | "fixed_income" => bond_weight += *weight,
                    _ => other_weight += *weight,
                }
                if h.currency != "USD" {
                    foreign_weight += *weight;
                }
            }
            None => other_weight += *weight,
        }
    }

    let invested = equity_weight + bond_weight + other_weight;
    if invested.is_zero() {
        warnings.push("No invested weight; risk attribution is empty".to_string());
        return RiskAttribution::default();
    }

    let equity = systematic_risk * equity_weight / invested;
    let bond = systematic_risk * bond_weight / invested;
    let currency = total_risk * foreign_weight / invested * dec!(0.25);
    let specific = (total_risk - equity - bond - currency).max(Decimal::ZERO);

    RiskAttribution {
        equity,
        bond,
        currency,
        specific,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::StressScenario;
    use crate::portfolio::{Holding, SnapshotMetrics};
    use chrono::Utc;

    fn holding(symbol: &str, value: Decimal, asset_class: &str, currency: &str) -> Holding {
        Holding {
            symbol: symbol.to_string(),
            quantity: value / dec!(100),
            price: dec!(100),
            weight: Decimal::ZERO,
            cost_basis: value,
            holding_period_days: 400,
            jurisdiction: "US".to_string(),
            liquidity_score: dec!(8),
            asset_class: asset_class.to_string(),
            sector: "broad".to_string(),
            geography: "north_america".to_string(),
            currency: currency.to_string(),
        }
    }

    fn two_asset_portfolio() -> PortfolioSnapshot {
        PortfolioSnapshot::new(
            vec![
                holding("VTI", dec!(30000), "equity", "USD"),
                holding("BND", dec!(10000), "bond", "USD"),
            ],
            dec!(10000),
            SnapshotMetrics::default(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn volatility_uses_configured_inputs_without_warnings() {
        let portfolio = two_asset_portfolio();
        let mut params = SimulationParameters::default();
        let assumptions = &mut params.market_assumptions;
        assumptions.volatilities.insert("VTI".to_string(), dec!(0.18));
        assumptions.volatilities.insert("BND".to_string(), dec!(0.05));
        assumptions.correlations.push(crate::params::CorrelationEntry {
            symbol_a: "VTI".to_string(),
            symbol_b: "BND".to_string(),
            coefficient: dec!(-0.1),
        });

        let analysis = analyze_risk(&portfolio, &[], &params).unwrap();
        assert!(analysis.portfolio_risk.total_risk > Decimal::ZERO);
        assert!(analysis.warnings.is_empty());
        assert_eq!(analysis.correlation_summary.pair_count, 1);
        assert_eq!(analysis.correlation_summary.average, dec!(-0.1));
    }

    #[test]
    fn missing_market_data_degrades_with_warnings() {
        let portfolio = two_asset_portfolio();
        let analysis =
            analyze_risk(&portfolio, &[], &SimulationParameters::default()).unwrap();
        // Falls back to snapshot volatility and default correlation.
        assert!(analysis.portfolio_risk.total_risk > Decimal::ZERO);
        assert!(!analysis.warnings.is_empty());
    }

    #[test]
    fn stress_tests_follow_configured_scenarios() {
        let portfolio = two_asset_portfolio();
        let mut params = SimulationParameters::default();
        params.risk_parameters.stress_test_scenarios.push(StressScenario {
            name: "rate_spike".to_string(),
            probability: dec!(0.1),
            return_shock: dec!(-0.25),
            volatility_multiplier: dec!(1.5),
        });

        let analysis = analyze_risk(&portfolio, &[], &params).unwrap();
        assert_eq!(analysis.stress_tests.len(), 1);
        let stress = &analysis.stress_tests[0];
        assert_eq!(stress.scenario, "rate_spike");
        // beta 1.0: expected loss = 0.25 * 0.1 * 0.8 * 50,000 = 1,000
        assert_eq!(stress.expected_loss, dec!(1000));
    }

    #[test]
    fn concentration_tracks_top_holding() {
        let portfolio = two_asset_portfolio();
        let analysis =
            analyze_risk(&portfolio, &[], &SimulationParameters::default()).unwrap();
        assert_eq!(analysis.concentration.top_holding_symbol, "VTI");
        assert_eq!(analysis.concentration.top_holding_weight, dec!(0.6));
    }

    #[test]
    fn budget_utilization_is_risk_over_budget() {
        let portfolio = two_asset_portfolio();
        let mut params = SimulationParameters::default();
        params.risk_parameters.risk_budget = Decimal::ZERO;
        let analysis = analyze_risk(&portfolio, &[], &params).unwrap();
        assert_eq!(analysis.risk_budget_utilization, Decimal::ZERO);
        assert!(analysis
            .warnings
            .iter()
            .any(|w| w.contains("Risk budget is zero")));
    }
}
