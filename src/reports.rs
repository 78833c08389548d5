//! Symbol-level summary across the whole pool - net position, break-even
//! and average pending prices.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::{OrderType, PendingOrder, Position, Symbol};

#[derive(Debug, Clone, Serialize)]
pub struct SymbolSummary {
    pub symbol: Symbol,
    /// Net quantity across all accounts
    pub quantity: i64,
    /// Break-even price: |net_amount / net_quantity|, absent when flat
    pub bep: Option<Decimal>,
    /// Mean last-traded price over the contributing position rows
    pub ltp: Decimal,
    /// Quantity-weighted average price of pending LIMIT orders
    pub limit_avg_price: Option<Decimal>,
    /// Quantity-weighted average trigger of pending SL orders
    pub sl_avg_price: Option<Decimal>,
}

#[derive(Default)]
struct PositionAcc {
    quantity: i64,
    net_amount: Decimal,
    ltp_sum: Decimal,
    rows: i64,
}

#[derive(Default)]
struct PendingAcc {
    value: Decimal,
    quantity: i64,
}

impl PendingAcc {
    fn average(&self) -> Option<Decimal> {
        (self.quantity != 0).then(|| self.value / Decimal::from(self.quantity))
    }
}

/// Collapse pool-wide positions and pending orders into one row per symbol.
///
/// A pending order's notional uses the trigger price when one is set,
/// otherwise the limit price.
pub fn summarize(positions: &[Position], pending: &[PendingOrder]) -> Vec<SymbolSummary> {
    let mut by_symbol: BTreeMap<String, PositionAcc> = BTreeMap::new();
    for position in positions {
        let acc = by_symbol.entry(position.symbol.to_string()).or_default();
        acc.quantity += position.quantity;
        acc.net_amount += position.net_amount;
        acc.ltp_sum += position.ltp;
        acc.rows += 1;
    }

    let mut pending_by_key: BTreeMap<(String, OrderType), PendingAcc> = BTreeMap::new();
    for order in pending {
        let price = if order.trigger_price > Decimal::ZERO {
            order.trigger_price
        } else {
            order.price
        };
        let acc = pending_by_key
            .entry((order.symbol.to_string(), order.order_type))
            .or_default();
        acc.value += price * Decimal::from(order.quantity);
        acc.quantity += order.quantity;
    }

    by_symbol
        .into_iter()
        .map(|(symbol, acc)| {
            let bep = (acc.quantity != 0)
                .then(|| (acc.net_amount / Decimal::from(acc.quantity)).round_dp(2).abs());
            let ltp = if acc.rows > 0 {
                acc.ltp_sum / Decimal::from(acc.rows)
            } else {
                Decimal::ZERO
            };
            let limit_avg_price = pending_by_key
                .get(&(symbol.clone(), OrderType::Limit))
                .and_then(PendingAcc::average);
            let sl_avg_price = pending_by_key
                .get(&(symbol.clone(), OrderType::StopLimit))
                .and_then(PendingAcc::average);
            SymbolSummary {
                symbol: Symbol::new(symbol),
                quantity: acc.quantity,
                bep,
                ltp,
                limit_avg_price,
                sl_avg_price,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Product, Segment, Side};

    fn position(symbol: &str, quantity: i64, net_amount: i64, ltp: i64) -> Position {
        Position {
            symbol: Symbol::new(symbol),
            exchange: Segment::Nfo,
            product: Product::Nrml,
            quantity,
            net_amount: Decimal::from(net_amount),
            ltp: Decimal::from(ltp),
        }
    }

    fn pending(
        symbol: &str,
        order_type: OrderType,
        quantity: i64,
        price: i64,
        trigger: i64,
    ) -> PendingOrder {
        PendingOrder {
            oms_order_id: "x".to_string(),
            symbol: Symbol::new(symbol),
            exchange: Segment::Nfo,
            side: Side::Sell,
            order_type,
            product: Product::Nrml,
            quantity,
            price: Decimal::from(price),
            trigger_price: Decimal::from(trigger),
            status: "open".to_string(),
            leg_indicator: None,
        }
    }

    #[test]
    fn test_bep_is_net_amount_over_net_quantity() {
        let rows = summarize(
            &[position("ABC", 100, -8_250, 85), position("ABC", 100, -8_350, 85)],
            &[],
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, 200);
        // |(-8250 + -8350) / 200| = 83
        assert_eq!(rows[0].bep, Some(Decimal::from(83)));
    }

    #[test]
    fn test_flat_symbol_has_no_bep() {
        let rows = summarize(&[position("ABC", 100, -8_000, 80), position("ABC", -100, 8_100, 80)], &[]);
        assert_eq!(rows[0].quantity, 0);
        assert_eq!(rows[0].bep, None);
    }

    #[test]
    fn test_pending_average_prefers_trigger() {
        let rows = summarize(
            &[position("ABC", 100, -8_000, 80)],
            &[
                pending("ABC", OrderType::StopLimit, 50, 70, 72),
                pending("ABC", OrderType::StopLimit, 50, 70, 74),
                pending("ABC", OrderType::Limit, 100, 90, 0),
            ],
        );
        assert_eq!(rows[0].sl_avg_price, Some(Decimal::from(73)));
        assert_eq!(rows[0].limit_avg_price, Some(Decimal::from(90)));
    }

    #[test]
    fn test_symbols_are_grouped_separately() {
        let rows = summarize(
            &[position("ABC", 100, -8_000, 80), position("XYZ", -50, 4_000, 80)],
            &[],
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, Symbol::new("ABC"));
        assert_eq!(rows[1].symbol, Symbol::new("XYZ"));
    }
}
