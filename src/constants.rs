use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Decimal precision for valuation calculations
pub const DECIMAL_PRECISION: u32 = 6;

/// Absolute trade value above which an action is high priority
pub const HIGH_PRIORITY_VALUE: Decimal = dec!(10000);

/// Drift (in weight points) above which an action is high priority
pub const HIGH_PRIORITY_DRIFT: Decimal = dec!(20);

/// Absolute trade value above which an action is medium priority
pub const MEDIUM_PRIORITY_VALUE: Decimal = dec!(5000);

/// Drift (in weight points) above which an action is medium priority
pub const MEDIUM_PRIORITY_DRIFT: Decimal = dec!(10);

/// Holding period (days) separating short-term from long-term gains
pub const DEFAULT_LONG_TERM_THRESHOLD_DAYS: i64 = 365;

/// Allowed deviation of asset-class target weights from 100%
pub const DEFAULT_ALLOCATION_SUM_SLACK: Decimal = dec!(1);

/// Liquidity score assumed for symbols not currently held
pub const DEFAULT_LIQUIDITY_SCORE: Decimal = dec!(5);

/// Number of actions above which single-day execution is discouraged
pub const BATCH_EXECUTION_THRESHOLD: usize = 5;

/// Pairwise correlation assumed when no coefficient is configured
pub const DEFAULT_CORRELATION: Decimal = dec!(0.25);

/// Confidence applied to stress-test impact estimates
pub const STRESS_TEST_CONFIDENCE: Decimal = dec!(0.8);
