use rust_decimal::Decimal;

use crate::errors::Result;
use crate::params::SimulationParameters;
use crate::portfolio::PortfolioSnapshot;
use crate::rebalance::RebalanceAction;

use super::analysis_model::TaxAnalysis;

/// Totals the actions' tax implications, splits capital-gains from
/// income tax and lists jurisdiction-specific considerations.
pub fn analyze_tax(
    portfolio: &PortfolioSnapshot,
    actions: &[RebalanceAction],
    params: &SimulationParameters,
) -> Result<TaxAnalysis> {
    portfolio.validate()?;
    let mut warnings = Vec::new();

    let capital_gains_tax: Decimal = actions
        .iter()
        .map(|a| a.tax_implications.estimated_tax)
        .sum();

    // Expected cash income over one year, taxed at the income rate.
    let tax = &params.tax_assumptions;
    let income_tax =
        portfolio.cash_balance * params.market_assumptions.risk_free_rate * tax.income_rate;

    let total_estimated_tax = capital_gains_tax + income_tax;

    let after_tax_return = if portfolio.total_value.is_zero() {
        Decimal::ZERO
    } else {
        portfolio.metrics.expected_return - total_estimated_tax / portfolio.total_value
    };

    let loss_harvesting_candidates: Vec<String> = actions
        .iter()
        .filter(|a| a.tax_implications.loss_harvesting)
        .map(|a| a.symbol.clone())
        .collect();
    let gain_deferral_candidates: Vec<String> = actions
        .iter()
        .filter(|a| a.tax_implications.gain_deferral)
        .map(|a| a.symbol.clone())
        .collect();

    let jurisdiction_considerations =
        jurisdiction_considerations(&tax.jurisdiction, &mut warnings);

    Ok(TaxAnalysis {
        total_estimated_tax,
        capital_gains_tax,
        income_tax,
        after_tax_return,
        loss_harvesting_candidates,
        gain_deferral_candidates,
        jurisdiction_considerations,
        warnings,
    })
}

fn jurisdiction_considerations(jurisdiction: &str, warnings: &mut Vec<String>) -> Vec<String> {
    match jurisdiction {
        "US" => vec![
            "Wash-sale rule: repurchasing within 30 days voids harvested losses".to_string(),
            "Long-term rates apply after a 12-month holding period".to_string(),
            "State-level capital gains tax may apply in addition".to_string(),
        ],
        "AU" => vec![
            "50% CGT discount for assets held over 12 months".to_string(),
            "Franking credits may offset tax on dividend income".to_string(),
        ],
        "CA" => vec![
            "50% of capital gains are included in taxable income".to_string(),
            "Superficial-loss rule mirrors the US wash-sale restriction".to_string(),
        ],
        "UK" => vec![
            "Annual CGT exempt amount applies before any liability".to_string(),
            "Bed-and-breakfasting rules restrict same-asset repurchases within 30 days"
                .to_string(),
        ],
        "DE" => vec![
            "Flat 25% Abgeltungsteuer plus solidarity surcharge on gains".to_string(),
            "Loss offsetting is restricted by asset category".to_string(),
        ],
        other => {
            warnings.push(format!(
                "No jurisdiction rules configured for '{other}'; review tax treatment manually"
            ));
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::{Holding, SnapshotMetrics, TargetAllocation, WeightTarget};
    use crate::rebalance::compute_actions;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn portfolio_with(cost_basis: Decimal, holding_period_days: i64) -> PortfolioSnapshot {
        PortfolioSnapshot::new(
            vec![Holding {
                symbol: "VTI".to_string(),
                quantity: dec!(100),
                price: dec!(100),
                weight: Decimal::ZERO,
                cost_basis,
                holding_period_days,
                jurisdiction: "US".to_string(),
                liquidity_score: dec!(8),
                asset_class: "equity".to_string(),
                sector: "broad".to_string(),
                geography: "north_america".to_string(),
                currency: "USD".to_string(),
            }],
            dec!(10000),
            SnapshotMetrics::default(),
            Utc::now(),
        )
        .unwrap()
    }

    fn liquidate_all() -> TargetAllocation {
        let mut allocation = TargetAllocation::new("exit");
        allocation.holdings.push(WeightTarget {
            key: "VTI".to_string(),
            target_weight: Decimal::ZERO,
            tolerance: dec!(1),
            min_weight: Decimal::ZERO,
            max_weight: dec!(100),
            priority: 1,
        });
        allocation
    }

    #[test]
    fn totals_capital_gains_across_actions() {
        let portfolio = portfolio_with(dec!(8000), 400);
        let params = SimulationParameters::default();
        let actions = compute_actions(&portfolio, &liquidate_all(), &params).unwrap();
        let analysis = analyze_tax(&portfolio, &actions, &params).unwrap();

        // 2,000 long-term gain at 20%
        assert_eq!(analysis.capital_gains_tax, dec!(400));
        assert!(analysis.total_estimated_tax >= analysis.capital_gains_tax);
        assert!(analysis.after_tax_return < portfolio.metrics.expected_return);
    }

    #[test]
    fn collects_harvesting_and_deferral_candidates() {
        let losing = portfolio_with(dec!(15000), 100);
        let params = SimulationParameters::default();
        let actions = compute_actions(&losing, &liquidate_all(), &params).unwrap();
        let analysis = analyze_tax(&losing, &actions, &params).unwrap();
        assert_eq!(analysis.loss_harvesting_candidates, vec!["VTI".to_string()]);
        assert!(analysis.gain_deferral_candidates.is_empty());
    }

    #[test]
    fn unknown_jurisdiction_warns() {
        let portfolio = portfolio_with(dec!(8000), 400);
        let mut params = SimulationParameters::default();
        params.tax_assumptions.jurisdiction = "ZZ".to_string();
        let analysis = analyze_tax(&portfolio, &[], &params).unwrap();
        assert!(analysis.jurisdiction_considerations.is_empty());
        assert!(!analysis.warnings.is_empty());
    }

    #[test]
    fn australian_jurisdiction_mentions_franking() {
        let portfolio = portfolio_with(dec!(8000), 400);
        let mut params = SimulationParameters::default();
        params.tax_assumptions.jurisdiction = "AU".to_string();
        let analysis = analyze_tax(&portfolio, &[], &params).unwrap();
        assert!(analysis
            .jurisdiction_considerations
            .iter()
            .any(|c| c.contains("Franking")));
    }
}
