//! Per-account risk state machine - drawdown, target and trailing stop.
//!
//! Two states: normal and trailing. Trailing is absorbing - once armed it
//! stays armed until process restart. The exit decision itself is advisory
//! output re-derived on every update, never stored.

use rust_decimal::Decimal;
use serde::Serialize;

/// Risk thresholds for one account, fixed at construction.
#[derive(Debug, Clone)]
pub struct RiskLimits {
    /// Hard stop-loss (positive number; breach is `mtm < -max_loss`)
    pub max_loss: Decimal,
    /// Trailing arms once max MTM exceeds `max_loss * trail_after`
    pub trail_after: Decimal,
    /// Giveback fraction of the MTM high-water mark
    pub trail_percent: Decimal,
    /// Take-profit level
    pub target: Decimal,
}

impl RiskLimits {
    pub fn new(max_loss: f64, trail_after: f64, trail_percent: f64, target: f64) -> Self {
        Self {
            max_loss: Decimal::try_from(max_loss.abs()).unwrap_or(Decimal::MAX),
            trail_after: Decimal::try_from(trail_after).unwrap_or(Decimal::MAX),
            trail_percent: Decimal::try_from(trail_percent).unwrap_or(Decimal::ONE),
            target: Decimal::try_from(target.abs()).unwrap_or(Decimal::MAX),
        }
    }
}

/// What the caller must do after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskVerdict {
    pub is_trailing: bool,
    /// Cancel pending bracket orders, then flatten - in that order.
    pub must_exit_all: bool,
}

/// Mutable per-account risk record.
#[derive(Debug, Clone, Default)]
pub struct RiskState {
    mtm: Decimal,
    max_mtm: Decimal,
    trailing: bool,
}

impl RiskState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mtm(&self) -> Decimal {
        self.mtm
    }

    pub fn max_mtm(&self) -> Decimal {
        self.max_mtm
    }

    pub fn is_trailing(&self) -> bool {
        self.trailing
    }

    /// Fold a reported MTM into the state and derive the verdict.
    ///
    /// Order matters: the high-water mark and trailing flag are updated
    /// first, so a single call that both arms trailing and breaches the
    /// giveback threshold exits immediately.
    pub fn update(&mut self, reported_mtm: Decimal, limits: &RiskLimits) -> RiskVerdict {
        self.mtm = reported_mtm;
        if reported_mtm > self.max_mtm {
            self.max_mtm = reported_mtm;
        }
        if !self.trailing && self.max_mtm > limits.max_loss * limits.trail_after {
            self.trailing = true;
        }

        let giveback_floor = self.max_mtm * (Decimal::ONE - limits.trail_percent);
        let must_exit_all = self.mtm < -limits.max_loss
            || self.mtm > limits.target
            || (self.trailing && self.mtm < giveback_floor);

        RiskVerdict {
            is_trailing: self.trailing,
            must_exit_all,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> RiskLimits {
        RiskLimits::new(10_000.0, 0.5, 0.2, 50_000.0)
    }

    #[test]
    fn test_trailing_giveback_sequence() {
        let limits = limits();
        let mut state = RiskState::new();

        let v = state.update(Decimal::ZERO, &limits);
        assert!(!v.is_trailing);
        assert!(!v.must_exit_all);

        // 6000 > 10000 * 0.5 arms trailing on the same call
        let v = state.update(Decimal::from(6_000), &limits);
        assert!(v.is_trailing);
        assert!(!v.must_exit_all);
        assert_eq!(state.max_mtm(), Decimal::from(6_000));

        // giveback floor is 6000 * 0.8 = 4800
        let v = state.update(Decimal::from(4_000), &limits);
        assert!(v.is_trailing);
        assert!(v.must_exit_all);
    }

    #[test]
    fn test_trailing_is_monotonic() {
        let limits = limits();
        let mut state = RiskState::new();

        state.update(Decimal::from(6_000), &limits);
        assert!(state.is_trailing());

        // Deep drawdown does not disarm trailing
        let v = state.update(Decimal::from(-9_000), &limits);
        assert!(v.is_trailing);
        let v = state.update(Decimal::ZERO, &limits);
        assert!(v.is_trailing);
    }

    #[test]
    fn test_verdict_is_pure_per_call() {
        let limits = limits();
        let mut state = RiskState::new();
        state.update(Decimal::from(6_000), &limits);

        let first = state.update(Decimal::from(4_000), &limits);
        let second = state.update(Decimal::from(4_000), &limits);
        assert_eq!(first, second);
    }

    #[test]
    fn test_hard_stop_breach() {
        let limits = limits();
        let mut state = RiskState::new();

        let v = state.update(Decimal::from(-9_999), &limits);
        assert!(!v.must_exit_all);
        let v = state.update(Decimal::from(-10_001), &limits);
        assert!(v.must_exit_all);
    }

    #[test]
    fn test_target_reached() {
        let limits = limits();
        let mut state = RiskState::new();

        let v = state.update(Decimal::from(50_001), &limits);
        assert!(v.must_exit_all);
    }

    #[test]
    fn test_sentinel_limits_never_trigger() {
        let limits = RiskLimits::new(1e10, 1e3, 1e3, 1e10);
        let mut state = RiskState::new();

        let v = state.update(Decimal::from(-5_000_000), &limits);
        assert!(!v.is_trailing);
        assert!(!v.must_exit_all);
    }

    #[test]
    fn test_negative_limits_taken_absolute() {
        let limits = RiskLimits::new(-10_000.0, 0.5, 0.2, -50_000.0);
        assert_eq!(limits.max_loss, Decimal::from(10_000));
        assert_eq!(limits.target, Decimal::from(50_000));
    }
}
