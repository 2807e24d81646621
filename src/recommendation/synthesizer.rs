use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::cmp::Reverse;

use crate::analysis::{CostAnalysis, PerformanceAnalysis, RiskAnalysis, TaxAnalysis};
use crate::constants::BATCH_EXECUTION_THRESHOLD;
use crate::portfolio::PortfolioSnapshot;
use crate::rebalance::{Priority, RebalanceAction};
use crate::scenario::ScenarioResult;

use super::recommendation_model::{
    ExpectedImpact, Recommendation, RecommendationType, Timeframe,
};

/// Everything a rule may look at. Rules are heuristic and composable;
/// new rule types plug in without changing the synthesis contract.
pub struct RuleContext<'a> {
    pub portfolio: &'a PortfolioSnapshot,
    pub actions: &'a [RebalanceAction],
    pub cost: &'a CostAnalysis,
    pub risk: &'a RiskAnalysis,
    pub performance: &'a PerformanceAnalysis,
    pub tax: &'a TaxAnalysis,
    pub scenarios: &'a [ScenarioResult],
}

pub trait RecommendationRule: Send + Sync {
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Recommendation>;
}

/// Large batches carry single-day execution risk.
pub struct ExecutionTimingRule;

impl RecommendationRule for ExecutionTimingRule {
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Recommendation> {
        if ctx.actions.len() <= BATCH_EXECUTION_THRESHOLD {
            return None;
        }
        Some(Recommendation {
            recommendation_type: RecommendationType::ExecutionTiming,
            title: "Stagger trade execution".to_string(),
            description: format!(
                "{} trades in a single session concentrates execution risk; spread them over several days",
                ctx.actions.len()
            ),
            rationale: format!(
                "Action count exceeds the batching threshold of {}",
                BATCH_EXECUTION_THRESHOLD
            ),
            expected_impact: ExpectedImpact {
                cost: -ctx.cost.total_market_impact / ctx.portfolio.total_value.max(Decimal::ONE),
                risk: dec!(-0.01),
                return_impact: Decimal::ZERO,
            },
            implementation_steps: vec![
                "Group actions by priority".to_string(),
                "Execute high-priority trades first".to_string(),
                "Spread the remainder across 3-5 sessions".to_string(),
            ],
            priority: Priority::Medium,
            timeframe: Timeframe::ShortTerm,
            confidence: dec!(0.7),
        })
    }
}

/// Fires when any action is flagged for loss harvesting or gain
/// deferral.
pub struct TaxOptimizationRule;

impl RecommendationRule for TaxOptimizationRule {
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Recommendation> {
        let harvests = &ctx.tax.loss_harvesting_candidates;
        let deferrals = &ctx.tax.gain_deferral_candidates;
        if harvests.is_empty() && deferrals.is_empty() {
            return None;
        }

        let mut steps = Vec::new();
        for symbol in harvests {
            steps.push(format!("Realize the loss on {symbol} to offset gains elsewhere"));
        }
        for symbol in deferrals {
            steps.push(format!(
                "Defer the sale of {symbol} until the gain qualifies as long-term"
            ));
        }

        Some(Recommendation {
            recommendation_type: RecommendationType::TaxOptimization,
            title: "Optimize tax treatment of sales".to_string(),
            description: format!(
                "{} harvestable loss(es) and {} deferrable gain(s) identified",
                harvests.len(),
                deferrals.len()
            ),
            rationale: "Timing sales around the long-term boundary and harvesting losses reduces the estimated liability".to_string(),
            expected_impact: ExpectedImpact {
                cost: -ctx.tax.total_estimated_tax
                    / ctx.portfolio.total_value.max(Decimal::ONE),
                risk: Decimal::ZERO,
                return_impact: Decimal::ZERO,
            },
            implementation_steps: steps,
            priority: Priority::High,
            timeframe: Timeframe::MediumTerm,
            confidence: dec!(0.85),
        })
    }
}

/// Fires when total rebalance cost exceeds 50 basis points of value.
pub struct CostEfficiencyRule;

impl RecommendationRule for CostEfficiencyRule {
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Recommendation> {
        if ctx.cost.cost_ratio <= dec!(0.005) {
            return None;
        }
        Some(Recommendation {
            recommendation_type: RecommendationType::CostEfficiency,
            title: "Reduce transaction costs".to_string(),
            description: format!(
                "Estimated costs are {:.2}% of portfolio value",
                ctx.cost.cost_ratio * dec!(100)
            ),
            rationale: "Costs above 50bp materially delay break-even".to_string(),
            expected_impact: ExpectedImpact {
                cost: -ctx.cost.cost_ratio / dec!(2),
                risk: Decimal::ZERO,
                return_impact: Decimal::ZERO,
            },
            implementation_steps: vec![
                "Use limit orders for low-liquidity positions".to_string(),
                "Skip low-priority trades inside their tolerance band".to_string(),
            ],
            priority: Priority::Medium,
            timeframe: Timeframe::Immediate,
            confidence: dec!(0.6),
        })
    }
}

/// Fires when the post-trade book still has a single position above 40%.
pub struct ConcentrationRule;

impl RecommendationRule for ConcentrationRule {
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<Recommendation> {
        let top = &ctx.risk.concentration;
        if top.top_holding_weight <= dec!(0.4) {
            return None;
        }
        Some(Recommendation {
            recommendation_type: RecommendationType::RiskReduction,
            title: format!("Reduce concentration in {}", top.top_holding_symbol),
            description: format!(
                "{} remains {:.1}% of the portfolio after the proposed trades",
                top.top_holding_symbol,
                top.top_holding_weight * dec!(100)
            ),
            rationale: "Single-name exposure above 40% dominates portfolio risk".to_string(),
            expected_impact: ExpectedImpact {
                cost: Decimal::ZERO,
                risk: -ctx.risk.portfolio_risk.concentration_risk / dec!(4),
                return_impact: Decimal::ZERO,
            },
            implementation_steps: vec![format!(
                "Add a holding-level target with a tighter maximum weight for {}",
                top.top_holding_symbol
            )],
            priority: Priority::High,
            timeframe: Timeframe::MediumTerm,
            confidence: dec!(0.75),
        })
    }
}

pub fn default_rules() -> Vec<Box<dyn RecommendationRule>> {
    vec![
        Box::new(ExecutionTimingRule),
        Box::new(TaxOptimizationRule),
        Box::new(CostEfficiencyRule),
        Box::new(ConcentrationRule),
    ]
}

/// Runs the default rule set and ranks by priority then confidence
/// descending. Rules never conflict; no resolution pass is needed.
pub fn synthesize(ctx: &RuleContext<'_>) -> Vec<Recommendation> {
    synthesize_with(&default_rules(), ctx)
}

pub fn synthesize_with(
    rules: &[Box<dyn RecommendationRule>],
    ctx: &RuleContext<'_>,
) -> Vec<Recommendation> {
    let mut recommendations: Vec<Recommendation> =
        rules.iter().filter_map(|rule| rule.evaluate(ctx)).collect();
    recommendations.sort_by_key(|r| (r.priority.rank(), Reverse(r.confidence)));
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze_cost, analyze_performance, analyze_risk, analyze_tax};
    use crate::params::SimulationParameters;
    use crate::portfolio::{Holding, SnapshotMetrics, TargetAllocation, WeightTarget};
    use crate::rebalance::compute_actions;
    use crate::scenario::generate_scenarios;
    use chrono::Utc;

    struct Fixture {
        portfolio: PortfolioSnapshot,
        actions: Vec<RebalanceAction>,
        cost: CostAnalysis,
        risk: RiskAnalysis,
        performance: PerformanceAnalysis,
        tax: TaxAnalysis,
        scenarios: Vec<ScenarioResult>,
    }

    impl Fixture {
        fn ctx(&self) -> RuleContext<'_> {
            RuleContext {
                portfolio: &self.portfolio,
                actions: &self.actions,
                cost: &self.cost,
                risk: &self.risk,
                performance: &self.performance,
                tax: &self.tax,
                scenarios: &self.scenarios,
            }
        }
    }

    fn fixture(target: TargetAllocation) -> Fixture {
        let portfolio = PortfolioSnapshot::new(
            vec![
                Holding {
                    symbol: "NVDA".to_string(),
                    quantity: dec!(100),
                    price: dec!(300),
                    weight: Decimal::ZERO,
                    cost_basis: dec!(45000),
                    holding_period_days: 100,
                    jurisdiction: "US".to_string(),
                    liquidity_score: dec!(9),
                    asset_class: "equity".to_string(),
                    sector: "technology".to_string(),
                    geography: "north_america".to_string(),
                    currency: "USD".to_string(),
                },
                Holding {
                    symbol: "BND".to_string(),
                    quantity: dec!(100),
                    price: dec!(100),
                    weight: Decimal::ZERO,
                    cost_basis: dec!(10500),
                    holding_period_days: 500,
                    jurisdiction: "US".to_string(),
                    liquidity_score: dec!(9),
                    asset_class: "bond".to_string(),
                    sector: "fixed_income".to_string(),
                    geography: "north_america".to_string(),
                    currency: "USD".to_string(),
                },
            ],
            dec!(10000),
            SnapshotMetrics::default(),
            Utc::now(),
        )
        .unwrap();

        let params = SimulationParameters::default();
        let actions = compute_actions(&portfolio, &target, &params).unwrap();
        let cost = analyze_cost(&portfolio, &actions, &params).unwrap();
        let risk = analyze_risk(&portfolio, &actions, &params).unwrap();
        let performance = analyze_performance(&portfolio, &actions, &params).unwrap();
        let tax = analyze_tax(&portfolio, &actions, &params).unwrap();
        let scenarios = generate_scenarios(&portfolio, &actions, &params).unwrap();

        Fixture {
            portfolio,
            actions,
            cost,
            risk,
            performance,
            tax,
            scenarios,
        }
    }

    fn target(symbol: &str, weight: Decimal) -> WeightTarget {
        WeightTarget {
            key: symbol.to_string(),
            target_weight: weight,
            tolerance: dec!(1),
            min_weight: Decimal::ZERO,
            max_weight: dec!(100),
            priority: 1,
        }
    }

    #[test]
    fn harvesting_flag_triggers_tax_recommendation() {
        // NVDA sold at a loss (cost basis above market value)
        let mut allocation = TargetAllocation::new("derisk");
        allocation.holdings.push(target("NVDA", dec!(20)));
        allocation.holdings.push(target("BND", dec!(20)));
        let fixture = fixture(allocation);

        let recommendations = synthesize(&fixture.ctx());
        assert!(recommendations
            .iter()
            .any(|r| r.recommendation_type == RecommendationType::TaxOptimization));
    }

    #[test]
    fn ranked_by_priority_then_confidence() {
        let mut allocation = TargetAllocation::new("derisk");
        allocation.holdings.push(target("NVDA", dec!(20)));
        allocation.holdings.push(target("BND", dec!(20)));
        let fixture = fixture(allocation);

        let recommendations = synthesize(&fixture.ctx());
        for pair in recommendations.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                a.priority.rank() < b.priority.rank()
                    || (a.priority.rank() == b.priority.rank() && a.confidence >= b.confidence)
            );
        }
    }

    #[test]
    fn quiet_book_produces_no_recommendations() {
        // Targets match current weights: NVDA 60%, BND 20%
        let mut allocation = TargetAllocation::new("hold");
        allocation.holdings.push(target("NVDA", dec!(60)));
        allocation.holdings.push(target("BND", dec!(20)));
        let fixture = fixture(allocation);
        assert!(fixture.actions.is_empty());

        let recommendations = synthesize(&fixture.ctx());
        // Concentration may still fire on the standing NVDA position.
        assert!(recommendations
            .iter()
            .all(|r| r.recommendation_type == RecommendationType::RiskReduction));
    }
}
