use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::errors::Result;
use crate::params::SimulationParameters;
use crate::portfolio::PortfolioSnapshot;
use crate::rebalance::RebalanceAction;

use super::analysis_model::{CostAnalysis, CostBreakdown};
use super::{expected_return, weights_after_actions, weights_before};

/// Sums per-action costs, buckets them by the configured ratios and
/// estimates how long the rebalance takes to pay for itself.
pub fn analyze_cost(
    portfolio: &PortfolioSnapshot,
    actions: &[RebalanceAction],
    params: &SimulationParameters,
) -> Result<CostAnalysis> {
    portfolio.validate()?;
    let mut warnings = Vec::new();

    let total_transaction_cost: Decimal = actions.iter().map(|a| a.transaction_cost).sum();
    let total_market_impact: Decimal = actions.iter().map(|a| a.market_impact).sum();
    let total_cost = total_transaction_cost + total_market_impact;

    let costs = &params.transaction_costs;
    let commissions = total_cost * costs.commission_ratio;
    let fees = total_cost * costs.fees_ratio;
    let spread = total_cost * costs.spread_ratio;
    let other = (total_cost - commissions - fees - spread).max(Decimal::ZERO);

    let cost_ratio = if portfolio.total_value.is_zero() {
        Decimal::ZERO
    } else {
        total_cost / portfolio.total_value
    };

    // Expected incremental return, in currency per year, from moving to
    // the post-trade weights.
    let er_before = expected_return(
        &weights_before(portfolio),
        portfolio,
        &params.market_assumptions,
        &mut warnings,
    );
    let er_after = expected_return(
        &weights_after_actions(portfolio, actions),
        portfolio,
        &params.market_assumptions,
        &mut warnings,
    );
    let incremental_annual = (er_after - er_before) * portfolio.total_value;

    let break_even_months = if incremental_annual > Decimal::ZERO {
        total_cost / (incremental_annual / dec!(12))
    } else {
        if !actions.is_empty() && total_cost > Decimal::ZERO {
            warnings.push(
                "Expected incremental return is not positive; rebalance never breaks even"
                    .to_string(),
            );
        }
        Decimal::ZERO
    };

    Ok(CostAnalysis {
        total_transaction_cost,
        total_market_impact,
        total_cost,
        cost_ratio,
        breakdown: CostBreakdown {
            commissions,
            fees,
            spread,
            other,
        },
        break_even_months,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::{Holding, SnapshotMetrics, TargetAllocation, WeightTarget};
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

    fn sell_actions() -> (PortfolioSnapshot, Vec<RebalanceAction>, SimulationParameters) {
        let portfolio = portfolio();
        let mut allocation = TargetAllocation::new("test");
        allocation.holdings.push(WeightTarget {
            key: "VTI".to_string(),
            target_weight: dec!(50),
            tolerance: dec!(5),
            min_weight: Decimal::ZERO,
            max_weight: dec!(100),
            priority: 1,
        });
        let params = SimulationParameters::default();
        let actions = compute_actions(&portfolio, &allocation, &params).unwrap();
        (portfolio, actions, params)
    }

    #[test]
    fn totals_and_buckets_add_up() {
        let (portfolio, actions, params) = sell_actions();
        let analysis = analyze_cost(&portfolio, &actions, &params).unwrap();

        // One sell of 5,000 at 0.1% variable + 5 fixed
        assert_eq!(analysis.total_transaction_cost, dec!(10));
        assert!(analysis.total_cost >= analysis.total_transaction_cost);

        let bucket_sum = analysis.breakdown.commissions
            + analysis.breakdown.fees
            + analysis.breakdown.spread
            + analysis.breakdown.other;
        assert_eq!(bucket_sum, analysis.total_cost);
    }

    #[test]
    fn no_actions_means_zero_cost() {
        let portfolio = portfolio();
        let analysis =
            analyze_cost(&portfolio, &[], &SimulationParameters::default()).unwrap();
        assert_eq!(analysis.total_cost, Decimal::ZERO);
        assert_eq!(analysis.break_even_months, Decimal::ZERO);
    }

    #[test]
    fn positive_incremental_return_yields_break_even() {
        let (portfolio, actions, mut params) = sell_actions();
        // Trimming a position with a negative outlook raises the book's
        // expected return, so the trade eventually pays for itself.
        params
            .market_assumptions
            .expected_returns
            .insert("VTI".to_string(), dec!(-0.10));
        let analysis = analyze_cost(&portfolio, &actions, &params).unwrap();
        assert!(analysis.break_even_months > Decimal::ZERO);
    }
}
