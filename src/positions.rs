//! Position resolution and exit/stop/target order construction.
//!
//! Resolution is a read-through query against the gateway; construction is
//! pure - (position, parameters) in, order request out. Nothing here touches
//! risk state.

use rust_decimal::Decimal;
use tracing::warn;

use crate::core::{
    BrokerGateway, OrderRequest, OrderType, Position, Product, Result, Segment, Side, Symbol,
    Validity,
};

/// NFO exit quantities are floored to a multiple of this.
pub const NFO_LOT: i64 = 50;

/// Find the open position matching `symbol` and `product`.
///
/// At most one match is expected per (symbol, product) pair. If the venue
/// returns more, that is a data anomaly: it is logged and the first match is
/// used. Zero matches is a normal no-op, not an error.
pub async fn resolve(
    gateway: &dyn BrokerGateway,
    symbol: &Symbol,
    product: Product,
) -> Result<Option<Position>> {
    let positions = gateway.positions().await?;
    let mut matches = positions
        .into_iter()
        .filter(|p| &p.symbol == symbol && p.product == product);

    let first = matches.next();
    let extra = matches.count();
    if extra > 0 {
        warn!(
            client_id = gateway.client_id(),
            %symbol,
            %product,
            extra,
            "venue returned multiple positions for one (symbol, product); using the first"
        );
    }
    Ok(first)
}

/// Clamp an exit percentage to [0, 1] by absolute value.
fn clamp_percent(percent: f64) -> f64 {
    percent.abs().min(1.0)
}

/// Portion of the position to close, truncated toward zero, then floored to
/// the NFO lot multiple on the derivatives segment.
fn exit_quantity(position: &Position, percent: f64) -> i64 {
    let percent = clamp_percent(percent);
    let quantity = (position.quantity as f64 * percent) as i64;
    let quantity = quantity.abs();
    match position.exchange {
        Segment::Nfo => (quantity / NFO_LOT) * NFO_LOT,
        Segment::Nse => quantity,
    }
}

/// Market order closing `percent` of the position. `None` when there is
/// nothing to close.
pub fn exit_order(position: &Position, percent: f64) -> Option<OrderRequest> {
    let quantity = exit_quantity(position, percent);
    if quantity == 0 {
        return None;
    }
    Some(OrderRequest {
        symbol: position.symbol.clone(),
        exchange: position.exchange,
        product: position.product,
        side: position.closing_side(),
        quantity,
        order_type: OrderType::Market,
        price: None,
        trigger_price: None,
        validity: Validity::Day,
    })
}

/// Stop-limit order closing `percent` of the position at `trigger_price`.
///
/// The limit price is the trigger shifted 1% in the direction of the closing
/// side: up for a BUY (closing a short), down for a SELL (closing a long),
/// so the limit leg still fills after the trigger fires.
pub fn stop_order(
    position: &Position,
    trigger_price: Decimal,
    percent: f64,
) -> Option<OrderRequest> {
    let quantity = exit_quantity(position, percent);
    if quantity == 0 {
        return None;
    }
    let side = position.closing_side();
    let offset = match side {
        Side::Buy => Decimal::new(1, 2),
        Side::Sell => Decimal::new(-1, 2),
    };
    let price = trigger_price + offset * trigger_price;
    Some(OrderRequest {
        symbol: position.symbol.clone(),
        exchange: position.exchange,
        product: position.product,
        side,
        quantity,
        order_type: OrderType::StopLimit,
        price: Some(price),
        trigger_price: Some(trigger_price),
        validity: Validity::Day,
    })
}

/// Limit order closing `percent` of the position at `price`.
pub fn target_order(position: &Position, price: Decimal, percent: f64) -> Option<OrderRequest> {
    let quantity = exit_quantity(position, percent);
    if quantity == 0 {
        return None;
    }
    Some(OrderRequest {
        symbol: position.symbol.clone(),
        exchange: position.exchange,
        product: position.product,
        side: position.closing_side(),
        quantity,
        order_type: OrderType::Limit,
        price: Some(price),
        trigger_price: None,
        validity: Validity::Day,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockGateway;

    fn position(quantity: i64, exchange: Segment) -> Position {
        Position {
            symbol: Symbol::new("ABC"),
            exchange,
            product: Product::Nrml,
            quantity,
            net_amount: Decimal::ZERO,
            ltp: Decimal::ZERO,
        }
    }

    #[test]
    fn test_percent_is_clamped() {
        let pos = position(200, Segment::Nse);
        let full = exit_order(&pos, 1.0).unwrap();
        let over = exit_order(&pos, 1.5).unwrap();
        let negative = exit_order(&pos, -1.0).unwrap();
        assert_eq!(full.quantity, over.quantity);
        assert_eq!(full.quantity, negative.quantity);
        assert_eq!(full.quantity, 200);
    }

    #[test]
    fn test_zero_quantity_is_noop() {
        let pos = position(0, Segment::Nse);
        assert!(exit_order(&pos, 1.0).is_none());
        assert!(stop_order(&pos, Decimal::from(100), 1.0).is_none());
        assert!(target_order(&pos, Decimal::from(100), 1.0).is_none());
    }

    #[test]
    fn test_nfo_quantity_floored_to_lot() {
        let pos = position(170, Segment::Nfo);
        let order = exit_order(&pos, 1.0).unwrap();
        assert_eq!(order.quantity, 150);
        assert_eq!(order.quantity % NFO_LOT, 0);

        // Below one lot there is nothing tradeable
        let pos = position(40, Segment::Nfo);
        assert!(exit_order(&pos, 1.0).is_none());
    }

    #[test]
    fn test_short_position_exits_with_buy() {
        let pos = position(-200, Segment::Nfo);
        let order = exit_order(&pos, 0.5).unwrap();
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.quantity, 100);
        assert_eq!(order.order_type, OrderType::Market);
        assert_eq!(order.validity, Validity::Day);
    }

    #[test]
    fn test_long_position_exits_with_sell() {
        let pos = position(200, Segment::Nse);
        let order = exit_order(&pos, 0.25).unwrap();
        assert_eq!(order.side, Side::Sell);
        assert_eq!(order.quantity, 50);
    }

    #[test]
    fn test_stop_limit_offset_buy_side() {
        let pos = position(-100, Segment::Nse);
        let order = stop_order(&pos, Decimal::from(100), 1.0).unwrap();
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.order_type, OrderType::StopLimit);
        assert_eq!(order.trigger_price, Some(Decimal::from(100)));
        assert_eq!(order.price, Some(Decimal::from(101)));
    }

    #[test]
    fn test_stop_limit_offset_sell_side() {
        let pos = position(100, Segment::Nse);
        let order = stop_order(&pos, Decimal::from(200), 1.0).unwrap();
        assert_eq!(order.side, Side::Sell);
        assert_eq!(order.price, Some(Decimal::from(198)));
    }

    #[tokio::test]
    async fn test_resolve_no_match_is_none() {
        let gateway = MockGateway::new("AA1").with_positions(vec![position(100, Segment::Nse)]);
        let found = resolve(&gateway, &Symbol::new("OTHER"), Product::Nrml)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_resolve_filters_by_product() {
        let mut mis = position(100, Segment::Nse);
        mis.product = Product::Mis;
        let gateway = MockGateway::new("AA1")
            .with_positions(vec![mis, position(-200, Segment::Nse)]);
        let found = resolve(&gateway, &Symbol::new("ABC"), Product::Nrml)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.quantity, -200);
    }

    #[tokio::test]
    async fn test_resolve_duplicate_rows_uses_first() {
        let gateway = MockGateway::new("AA1")
            .with_positions(vec![position(100, Segment::Nse), position(300, Segment::Nse)]);
        let found = resolve(&gateway, &Symbol::new("ABC"), Product::Nrml)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.quantity, 100);
    }

    #[test]
    fn test_target_uses_caller_price() {
        let pos = position(-150, Segment::Nfo);
        let order = target_order(&pos, Decimal::new(8255, 2), 1.0).unwrap();
        assert_eq!(order.order_type, OrderType::Limit);
        assert_eq!(order.price, Some(Decimal::new(8255, 2)));
        assert_eq!(order.trigger_price, None);
        assert_eq!(order.quantity, 150);
    }
}
