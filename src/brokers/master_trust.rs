//! MasterTrust gateway adapter - maps wire rows to core types and implements
//! the condition-based modify/cancel operations over the venue's per-order
//! endpoints.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::core::{
    BrokerGateway, BrokerReply, OrderFilter, OrderModifications, OrderRequest, PendingOrder,
    Position, Result, Symbol,
};
use crate::master_trust_api::model::{OrderRow, PositionRow};
use crate::master_trust_api::MasterTrustClient;

pub struct MasterTrust {
    client: MasterTrustClient,
}

impl MasterTrust {
    pub fn new(client: MasterTrustClient) -> Self {
        Self { client }
    }

    fn map_position(&self, row: PositionRow) -> Option<Position> {
        let exchange = match row.exchange.parse() {
            Ok(exchange) => exchange,
            Err(_) => {
                warn!(
                    client_id = self.client.client_id(),
                    exchange = %row.exchange,
                    "position on unsupported exchange, ignoring"
                );
                return None;
            }
        };
        let product = match row.product.parse() {
            Ok(product) => product,
            Err(_) => {
                warn!(
                    client_id = self.client.client_id(),
                    product = %row.product,
                    "position with unsupported product, ignoring"
                );
                return None;
            }
        };
        Some(Position {
            symbol: Symbol::new(&row.symbol),
            exchange,
            product,
            quantity: row.net_quantity,
            net_amount: row.net_amount(),
            ltp: row.ltp,
        })
    }

    fn map_order(&self, row: OrderRow) -> Option<PendingOrder> {
        let exchange = row.exchange.parse().ok()?;
        let side = row.order_side.parse().ok()?;
        let order_type = row.order_type.parse().ok()?;
        let product = row.product.parse().ok()?;
        Some(PendingOrder {
            oms_order_id: row.oms_order_id,
            symbol: Symbol::new(&row.symbol),
            exchange,
            side,
            order_type,
            product,
            quantity: row.quantity,
            price: row.price,
            trigger_price: row.trigger_price,
            status: row.order_status,
            leg_indicator: row.leg_order_indicator,
        })
    }

    /// Pending orders selected by `filter`, first `limit` only when set.
    async fn matching_orders(&self, filter: &OrderFilter) -> Result<Vec<PendingOrder>> {
        let mut matched: Vec<PendingOrder> = self
            .pending_orders()
            .await?
            .into_iter()
            .filter(|order| filter.matches(order))
            .collect();
        if filter.limit > 0 {
            matched.truncate(filter.limit);
        }
        Ok(matched)
    }
}

#[async_trait]
impl BrokerGateway for MasterTrust {
    async fn authenticate(&self) -> Result<()> {
        self.client.authenticate().await
    }

    async fn positions(&self) -> Result<Vec<Position>> {
        let rows = self.client.positions().await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| self.map_position(row))
            .collect())
    }

    async fn pending_orders(&self) -> Result<Vec<PendingOrder>> {
        let rows = self.client.pending_orders().await?;
        Ok(rows.into_iter().filter_map(|row| self.map_order(row)).collect())
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<BrokerReply> {
        let params = json!({
            "client_id": self.client.client_id(),
            "trading_symbol": order.symbol,
            "exchange": order.exchange,
            "order_side": order.side,
            "order_type": order.order_type,
            "quantity": order.quantity,
            "price": order.price.unwrap_or(Decimal::ZERO),
            "trigger_price": order.trigger_price.unwrap_or(Decimal::ZERO),
            "product": order.product,
            "validity": order.validity,
            "user_order_id": Uuid::new_v4().simple().to_string(),
        });
        self.client.place_order(&params).await
    }

    async fn modify_orders_by_conditions(
        &self,
        modifications: &OrderModifications,
        filter: &OrderFilter,
    ) -> Result<BrokerReply> {
        let matched = self.matching_orders(filter).await?;
        let mut replies: Vec<Value> = Vec::with_capacity(matched.len());
        let mut failed = 0usize;
        for order in &matched {
            let params = json!({
                "client_id": self.client.client_id(),
                "oms_order_id": order.oms_order_id,
                "trading_symbol": order.symbol,
                "exchange": order.exchange,
                "order_side": order.side,
                "order_type": order.order_type,
                "product": order.product,
                "quantity": modifications.quantity.unwrap_or(order.quantity),
                "price": modifications.price.unwrap_or(order.price),
                "trigger_price": modifications.trigger_price.unwrap_or(order.trigger_price),
            });
            match self.client.modify_order(&params).await {
                Ok(reply) => replies.push(reply),
                Err(e) => {
                    failed += 1;
                    warn!(
                        client_id = self.client.client_id(),
                        oms_order_id = %order.oms_order_id,
                        error = %e,
                        "order modify failed"
                    );
                }
            }
        }
        Ok(json!({
            "matched": matched.len(),
            "modified": replies.len(),
            "failed": failed,
            "replies": replies,
        }))
    }

    async fn cancel_orders_by_conditions(&self, filter: &OrderFilter) -> Result<BrokerReply> {
        let matched = self.matching_orders(filter).await?;
        let mut replies: Vec<Value> = Vec::with_capacity(matched.len());
        let mut failed = 0usize;
        for order in &matched {
            match self
                .client
                .cancel_order(&order.oms_order_id, order.leg_indicator.as_deref())
                .await
            {
                Ok(reply) => replies.push(reply),
                Err(e) => {
                    failed += 1;
                    warn!(
                        client_id = self.client.client_id(),
                        oms_order_id = %order.oms_order_id,
                        error = %e,
                        "order cancel failed"
                    );
                }
            }
        }
        Ok(json!({
            "matched": matched.len(),
            "cancelled": replies.len(),
            "failed": failed,
            "replies": replies,
        }))
    }

    async fn cancel_all_orders(&self) -> Result<BrokerReply> {
        self.cancel_orders_by_conditions(&OrderFilter::default()).await
    }

    async fn mtm(&self, positions: Option<&[Position]>) -> Result<Decimal> {
        match positions {
            // Pre-fetched core positions carry no contract multiplier; the
            // venue rows do, so the fresh path uses them.
            Some(positions) => Ok(positions
                .iter()
                .map(|p| p.net_amount + Decimal::from(p.quantity) * p.ltp)
                .sum()),
            None => {
                let rows = self.client.positions().await?;
                Ok(rows.iter().map(PositionRow::mtm).sum())
            }
        }
    }

    fn client_id(&self) -> &str {
        self.client.client_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{OrderType, Product, Segment, Side};
    use std::path::PathBuf;

    fn adapter() -> MasterTrust {
        MasterTrust::new(MasterTrustClient::new(
            "https://venue.example/api/v1",
            "AA1234",
            "pw",
            "0000",
            "secret",
            PathBuf::from("/tmp/token_aa1234.tok"),
        ))
    }

    #[test]
    fn test_map_position_row() {
        let row: PositionRow = serde_json::from_value(serde_json::json!({
            "trading_symbol": "nifty24augfut",
            "exchange": "NFO",
            "product": "NRML",
            "net_quantity": -50,
            "buy_amount": 0.0,
            "sell_amount": 412500.0,
            "ltp": 8200.0,
        }))
        .unwrap();
        let position = adapter().map_position(row).unwrap();
        assert_eq!(position.symbol, Symbol::new("NIFTY24AUGFUT"));
        assert_eq!(position.exchange, Segment::Nfo);
        assert_eq!(position.product, Product::Nrml);
        assert_eq!(position.quantity, -50);
        assert_eq!(position.net_amount, Decimal::from(412_500));
    }

    #[test]
    fn test_unsupported_exchange_row_is_dropped() {
        let row: PositionRow = serde_json::from_value(serde_json::json!({
            "trading_symbol": "GOLD24AUGFUT",
            "exchange": "MCX",
            "product": "NRML",
        }))
        .unwrap();
        assert!(adapter().map_position(row).is_none());
    }

    #[test]
    fn test_map_order_row() {
        let row: OrderRow = serde_json::from_value(serde_json::json!({
            "oms_order_id": "240806000123",
            "trading_symbol": "ABC",
            "exchange": "NSE",
            "product": "BO",
            "order_side": "SELL",
            "order_type": "SL",
            "quantity": 10,
            "price": 99.5,
            "trigger_price": 100.0,
            "order_status": "trigger pending",
            "leg_order_indicator": "2",
        }))
        .unwrap();
        let order = adapter().map_order(row).unwrap();
        assert_eq!(order.side, Side::Sell);
        assert_eq!(order.order_type, OrderType::StopLimit);
        assert_eq!(order.product, Product::Bo);
        assert_eq!(order.leg_indicator.as_deref(), Some("2"));
    }
}
