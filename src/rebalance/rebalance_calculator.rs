use chrono::{Duration, Utc};
use log::{debug, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::constants::{
    DEFAULT_LIQUIDITY_SCORE, HIGH_PRIORITY_DRIFT, HIGH_PRIORITY_VALUE, MEDIUM_PRIORITY_DRIFT,
    MEDIUM_PRIORITY_VALUE,
};
use crate::errors::{Result, ValidationError};
use crate::params::SimulationParameters;
use crate::portfolio::{Holding, PortfolioSnapshot, TargetAllocation};
use crate::Error;

use super::rebalance_model::{
    CapitalGainsType, Priority, RebalanceAction, TaxImplication, TradeSide,
};

/// Turns (current, target) into a prioritized list of trade actions.
///
/// A holding inside its tolerance band produces no action. Targets with
/// no current position are pure buys from zero; current positions with
/// no holding-level target are full liquidations. When the allocation
/// carries no holding-level targets at all, nothing is liquidated.
pub fn compute_actions(
    portfolio: &PortfolioSnapshot,
    target: &TargetAllocation,
    params: &SimulationParameters,
) -> Result<Vec<RebalanceAction>> {
    portfolio.validate()?;
    for warning in target.validate()? {
        warn!("Target allocation '{}': {}", target.name, warning);
    }

    let weights = portfolio.current_weights();
    let mut actions = Vec::new();

    for holding_target in &target.holdings {
        let symbol = &holding_target.key;
        let current_weight = weights.get(symbol).copied().unwrap_or(Decimal::ZERO);
        let drift = current_weight - holding_target.target_weight;

        if drift.abs() <= holding_target.tolerance {
            continue;
        }

        let holding = portfolio.holding(symbol);
        let price = match holding {
            Some(h) => h.price,
            None => match params.market_assumptions.reference_prices.get(symbol) {
                Some(p) => *p,
                None => {
                    return Err(Error::Validation(ValidationError::MissingField(format!(
                        "marketAssumptions.referencePrices.{symbol}"
                    ))))
                }
            },
        };
        if price <= Decimal::ZERO {
            return Err(Error::Validation(ValidationError::InvalidInput(format!(
                "Price for '{symbol}' must be positive"
            ))));
        }

        if let Some(action) = build_action(
            portfolio,
            params,
            symbol,
            holding,
            price,
            current_weight,
            holding_target.target_weight,
        ) {
            actions.push(action);
        }
    }

    // Full liquidation for positions the target says nothing about.
    if !target.holdings.is_empty() {
        for holding in &portfolio.holdings {
            if target.holding_target(&holding.symbol).is_some() {
                continue;
            }
            let current_weight = weights
                .get(&holding.symbol)
                .copied()
                .unwrap_or(Decimal::ZERO);
            if let Some(action) = build_action(
                portfolio,
                params,
                &holding.symbol,
                Some(holding),
                holding.price,
                current_weight,
                Decimal::ZERO,
            ) {
                actions.push(action);
            }
        }
    }

    actions.sort_by_key(|a| a.priority.rank());
    debug!(
        "Computed {} rebalance action(s) for snapshot {}",
        actions.len(),
        portfolio.id
    );
    Ok(actions)
}

#[allow(clippy::too_many_arguments)]
fn build_action(
    portfolio: &PortfolioSnapshot,
    params: &SimulationParameters,
    symbol: &str,
    holding: Option<&Holding>,
    price: Decimal,
    current_weight: Decimal,
    target_weight: Decimal,
) -> Option<RebalanceAction> {
    let current_quantity = holding.map(|h| h.quantity).unwrap_or(Decimal::ZERO);
    let current_value = current_quantity * price;

    let target_value = portfolio.total_value * target_weight / dec!(100);
    let change_value = target_value - current_value;
    let target_quantity = (target_value / price).round();
    let change_quantity = target_quantity - current_quantity;

    if change_quantity.is_zero() {
        return None;
    }

    let side = if change_quantity > Decimal::ZERO {
        TradeSide::Buy
    } else {
        TradeSide::Sell
    };

    let costs = &params.transaction_costs;
    let transaction_cost = change_value.abs() * costs.variable_rate + costs.fixed_cost;

    let liquidity = holding
        .map(|h| h.liquidity_score)
        .unwrap_or(DEFAULT_LIQUIDITY_SCORE)
        .max(dec!(0.1));
    let market_impact = change_value.abs() * costs.market_impact_coefficient / liquidity;

    let drift = current_weight - target_weight;
    let priority = classify_priority(change_value, drift);

    let (tax, execution_date) = match (side, holding) {
        (TradeSide::Sell, Some(h)) => estimate_sale_tax(h, change_quantity, price, params),
        _ => (TaxImplication::none(), Utc::now()),
    };

    Some(RebalanceAction {
        symbol: symbol.to_string(),
        side,
        current_quantity,
        target_quantity,
        change_quantity,
        current_value,
        target_value,
        change_value,
        current_weight,
        target_weight,
        drift,
        transaction_cost,
        market_impact,
        tax_implications: tax,
        suggested_execution_date: execution_date,
        priority,
    })
}

fn classify_priority(change_value: Decimal, drift: Decimal) -> Priority {
    let value = change_value.abs();
    let drift = drift.abs();
    if value > HIGH_PRIORITY_VALUE || drift > HIGH_PRIORITY_DRIFT {
        Priority::High
    } else if value > MEDIUM_PRIORITY_VALUE || drift > MEDIUM_PRIORITY_DRIFT {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Tax implications of a (partial) sale. Gains are classified long-term
/// past the configured threshold; losses are flagged for harvesting and
/// short-term gains for deferral past the long-term boundary.
fn estimate_sale_tax(
    holding: &Holding,
    change_quantity: Decimal,
    price: Decimal,
    params: &SimulationParameters,
) -> (TaxImplication, chrono::DateTime<Utc>) {
    let tax = &params.tax_assumptions;
    let sold_quantity = change_quantity.abs().min(holding.quantity);
    let sold_value = sold_quantity * price;

    let cost_basis_portion = if holding.quantity.is_zero() {
        Decimal::ZERO
    } else {
        holding.cost_basis * (sold_quantity / holding.quantity)
    };
    let capital_gain = sold_value - cost_basis_portion;

    let long_term = holding.holding_period_days > tax.long_term_threshold_days;
    let gains_type = if long_term {
        CapitalGainsType::LongTerm
    } else {
        CapitalGainsType::ShortTerm
    };
    let rate = if long_term {
        tax.long_term_rate
    } else {
        tax.short_term_rate
    };
    let estimated_tax = (capital_gain * rate).max(Decimal::ZERO);

    let loss_harvesting = capital_gain < Decimal::ZERO;
    let gain_deferral = capital_gain > Decimal::ZERO && !long_term;

    let execution_date = if gain_deferral {
        let days_remaining = tax.long_term_threshold_days - holding.holding_period_days + 1;
        Utc::now() + Duration::days(days_remaining.max(1))
    } else {
        Utc::now()
    };

    (
        TaxImplication {
            estimated_tax,
            capital_gain,
            capital_gains_type: Some(gains_type),
            loss_harvesting,
            gain_deferral,
        },
        execution_date,
    )
}
