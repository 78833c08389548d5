//! A single trading account: identity, capital scaling, exclusive gateway
//! handle and risk state ownership.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::{
    BrokerGateway, BrokerReply, ClientId, Command, OrderFilter, OrderRequest, PlaceOrder, Position,
    Product, Result, Segment, Symbol,
};
use crate::positions;
use crate::risk::{RiskLimits, RiskState, RiskVerdict};

/// Outcome of one risk sweep step for one account.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSweep {
    pub client_id: ClientId,
    pub as_of: DateTime<Utc>,
    pub mtm: Decimal,
    pub max_mtm: Decimal,
    pub is_trailing: bool,
    pub must_exit_all: bool,
    pub positions: Vec<Position>,
}

pub struct Account {
    client_id: ClientId,
    capital: f64,
    allowed_segments: Vec<Segment>,
    gateway: Arc<dyn BrokerGateway>,
    limits: RiskLimits,
    risk: Mutex<RiskState>,
}

/// Segment membership by venue exchange code: 1 = NSE, 2 = NFO, 3 = both.
fn segments_for(client_id: &ClientId, exc_code: u8) -> Vec<Segment> {
    match exc_code {
        1 => vec![Segment::Nse],
        2 => vec![Segment::Nfo],
        3 => vec![Segment::Nse, Segment::Nfo],
        other => {
            warn!(%client_id, exc_code = other, "unknown exc_code, defaulting to NSE only");
            vec![Segment::Nse]
        }
    }
}

impl Account {
    pub fn new(
        client_id: ClientId,
        capital: f64,
        exc_code: u8,
        limits: RiskLimits,
        gateway: Arc<dyn BrokerGateway>,
    ) -> Self {
        let allowed_segments = segments_for(&client_id, exc_code);
        Self {
            client_id,
            capital,
            allowed_segments,
            gateway,
            limits,
            risk: Mutex::new(RiskState::new()),
        }
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn gateway(&self) -> &dyn BrokerGateway {
        self.gateway.as_ref()
    }

    pub fn allows(&self, segment: Segment) -> bool {
        self.allowed_segments.contains(&segment)
    }

    /// Requested base quantity scaled by this account's capital multiplier
    /// and rounded to the nearest lot multiple:
    /// `round(capital * quantity / lot_size) * lot_size`.
    ///
    /// Ties round half away from zero (`f64::round`), so 2.5 lots becomes 3.
    pub fn normalized_quantity(&self, quantity: i64, lot_size: i64) -> i64 {
        let lot_size = lot_size.max(1);
        let lots = self.capital * quantity as f64 / lot_size as f64;
        lots.round() as i64 * lot_size
    }

    /// Fold a reported MTM into this account's risk state.
    pub fn update_risk(&self, reported_mtm: Decimal) -> RiskVerdict {
        self.risk.lock().update(reported_mtm, &self.limits)
    }

    /// (mtm, max_mtm, is_trailing) as of the last update.
    pub fn risk_snapshot(&self) -> (Decimal, Decimal, bool) {
        let risk = self.risk.lock();
        (risk.mtm(), risk.max_mtm(), risk.is_trailing())
    }

    /// Run one command against this account. `Ok(None)` means the command was
    /// a no-op here (e.g. no position matched an exit).
    pub async fn execute(&self, command: &Command) -> Result<Option<BrokerReply>> {
        match command {
            Command::Place(place) => self.place(place).await.map(Some),
            Command::Modify {
                modifications,
                filter,
            } => self
                .gateway
                .modify_orders_by_conditions(modifications, filter)
                .await
                .map(Some),
            Command::Cancel { filter } => self
                .gateway
                .cancel_orders_by_conditions(filter)
                .await
                .map(Some),
            Command::ExitBySymbol {
                symbol,
                percent,
                product,
            } => self.exit_position(symbol, *percent, *product).await,
            Command::StopBySymbol {
                symbol,
                trigger_price,
                percent,
                product,
            } => {
                self.stop_for_position(symbol, *trigger_price, *percent, *product)
                    .await
            }
            Command::TargetBySymbol {
                symbol,
                price,
                percent,
                product,
            } => {
                self.target_for_position(symbol, *price, *percent, *product)
                    .await
            }
            Command::ExitAll => self.flatten_all().await.map(Some),
            Command::CancelAll => self.gateway.cancel_all_orders().await.map(Some),
        }
    }

    async fn place(&self, place: &PlaceOrder) -> Result<BrokerReply> {
        let quantity = self.normalized_quantity(place.quantity, place.lot_size);
        let order = OrderRequest {
            symbol: place.symbol.clone(),
            exchange: place.exchange,
            product: place.product,
            side: place.side,
            quantity,
            order_type: place.order_type,
            price: place.price,
            trigger_price: place.trigger_price,
            validity: place.validity,
        };
        info!(
            client_id = %self.client_id,
            %order.symbol,
            side = %order.side,
            quantity,
            "placing order"
        );
        self.gateway.place_order(&order).await
    }

    /// Close `percent` of the matching position with a market order.
    pub async fn exit_position(
        &self,
        symbol: &Symbol,
        percent: f64,
        product: Product,
    ) -> Result<Option<BrokerReply>> {
        let Some(position) = positions::resolve(self.gateway.as_ref(), symbol, product).await?
        else {
            debug!(client_id = %self.client_id, %symbol, "no position to exit");
            return Ok(None);
        };
        match positions::exit_order(&position, percent) {
            Some(order) => self.gateway.place_order(&order).await.map(Some),
            None => {
                debug!(client_id = %self.client_id, %symbol, "exit quantity is zero");
                Ok(None)
            }
        }
    }

    /// Protect `percent` of the matching position with a stop-limit order.
    pub async fn stop_for_position(
        &self,
        symbol: &Symbol,
        trigger_price: Decimal,
        percent: f64,
        product: Product,
    ) -> Result<Option<BrokerReply>> {
        let Some(position) = positions::resolve(self.gateway.as_ref(), symbol, product).await?
        else {
            debug!(client_id = %self.client_id, %symbol, "no position to protect");
            return Ok(None);
        };
        match positions::stop_order(&position, trigger_price, percent) {
            Some(order) => self.gateway.place_order(&order).await.map(Some),
            None => Ok(None),
        }
    }

    /// Book profit on `percent` of the matching position with a limit order.
    pub async fn target_for_position(
        &self,
        symbol: &Symbol,
        price: Decimal,
        percent: f64,
        product: Product,
    ) -> Result<Option<BrokerReply>> {
        let Some(position) = positions::resolve(self.gateway.as_ref(), symbol, product).await?
        else {
            debug!(client_id = %self.client_id, %symbol, "no position for target");
            return Ok(None);
        };
        match positions::target_order(&position, price, percent) {
            Some(order) => self.gateway.place_order(&order).await.map(Some),
            None => Ok(None),
        }
    }

    /// Market-exit every open position. Best-effort: each exit is attempted
    /// even if a previous one failed; failures are logged and summarized.
    pub async fn flatten_all(&self) -> Result<BrokerReply> {
        let open = self.gateway.positions().await?;
        let orders: Vec<OrderRequest> = open
            .iter()
            .filter_map(|p| positions::exit_order(p, 1.0))
            .collect();

        let results =
            futures::future::join_all(orders.iter().map(|o| self.gateway.place_order(o))).await;

        let mut replies = Vec::with_capacity(results.len());
        for (order, result) in orders.iter().zip(results) {
            match result {
                Ok(reply) => replies.push(reply),
                Err(e) => {
                    warn!(
                        client_id = %self.client_id,
                        symbol = %order.symbol,
                        error = %e,
                        "flatten order failed"
                    );
                }
            }
        }
        Ok(serde_json::json!({
            "flattened": replies.len(),
            "attempted": orders.len(),
            "replies": replies,
        }))
    }

    /// Cancel open bracket-order legs. Best-effort.
    async fn cancel_bracket_orders(&self) {
        let filter = OrderFilter {
            product: Some(Product::Bo),
            status: Some("open".to_string()),
            ..Default::default()
        };
        if let Err(e) = self.gateway.cancel_orders_by_conditions(&filter).await {
            warn!(client_id = %self.client_id, error = %e, "bracket cancel failed");
        }
    }

    /// One risk sweep step: refresh MTM, update the state machine, and if it
    /// says so, cancel pending orders and flatten - cancel first, because an
    /// unresolved pending order can re-open a position after the flatten.
    pub async fn sweep_risk(&self) -> Result<AccountSweep> {
        let open = self.gateway.positions().await?;
        let mtm = self.gateway.mtm(Some(&open)).await?;
        let verdict = self.update_risk(mtm);
        let (_, max_mtm, _) = self.risk_snapshot();

        let drawdown = (max_mtm - mtm) / (max_mtm + Decimal::ONE);
        info!(
            client_id = %self.client_id,
            mtm = %mtm.round(),
            max_mtm = %max_mtm.round(),
            drawdown = %drawdown.round_dp(2),
            trailing = verdict.is_trailing,
            "risk sweep"
        );

        if verdict.must_exit_all {
            warn!(client_id = %self.client_id, "risk breach - exiting all positions");
            match self.gateway.pending_orders().await {
                Ok(pending) if !pending.is_empty() => {
                    self.cancel_bracket_orders().await;
                    if let Err(e) = self.gateway.cancel_all_orders().await {
                        warn!(client_id = %self.client_id, error = %e, "cancel-all failed");
                    }
                }
                Ok(_) => debug!(client_id = %self.client_id, "no pending orders to cancel"),
                Err(e) => {
                    warn!(client_id = %self.client_id, error = %e, "pending order query failed")
                }
            }
            if let Err(e) = self.flatten_all().await {
                warn!(client_id = %self.client_id, error = %e, "flatten failed");
            }
        }

        Ok(AccountSweep {
            client_id: self.client_id.clone(),
            as_of: Utc::now(),
            mtm,
            max_mtm,
            is_trailing: verdict.is_trailing,
            must_exit_all: verdict.must_exit_all,
            positions: open,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{OrderType, PendingOrder, Side};
    use crate::testutil::MockGateway;

    fn account_with(capital: f64, gateway: MockGateway) -> Account {
        Account::new(
            ClientId::new("TEST1"),
            capital,
            3,
            RiskLimits::new(10_000.0, 0.5, 0.2, 50_000.0),
            Arc::new(gateway),
        )
    }

    fn nfo_position(quantity: i64) -> Position {
        Position {
            symbol: Symbol::new("NIFTY24AUGFUT"),
            exchange: Segment::Nfo,
            product: Product::Nrml,
            quantity,
            net_amount: Decimal::ZERO,
            ltp: Decimal::ZERO,
        }
    }

    #[test]
    fn test_normalized_quantity_rounds_to_lot() {
        let account = account_with(1.0, MockGateway::new("TEST1"));
        // 60 / 50 = 1.2 lots -> 1 lot
        assert_eq!(account.normalized_quantity(60, 50), 50);
        // 125 / 50 = 2.5 lots -> 3 lots (half away from zero)
        assert_eq!(account.normalized_quantity(125, 50), 150);
        assert_eq!(account.normalized_quantity(0, 50), 0);
    }

    #[test]
    fn test_normalized_quantity_applies_capital_first() {
        let account = account_with(2.0, MockGateway::new("TEST1"));
        // 2.0 * 30 = 60 -> 1.2 lots -> 50
        assert_eq!(account.normalized_quantity(30, 50), 50);
    }

    #[test]
    fn test_unknown_exc_code_falls_back_to_nse() {
        let account = Account::new(
            ClientId::new("TEST1"),
            1.0,
            9,
            RiskLimits::new(1e10, 1e3, 1e3, 1e10),
            Arc::new(MockGateway::new("TEST1")),
        );
        assert!(account.allows(Segment::Nse));
        assert!(!account.allows(Segment::Nfo));
    }

    #[tokio::test]
    async fn test_exit_without_position_is_noop() {
        let account = account_with(1.0, MockGateway::new("TEST1"));
        let reply = account
            .exit_position(&Symbol::new("ABC"), 1.0, Product::Mis)
            .await
            .unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_sweep_call_order() {
        let gateway = Arc::new(
            MockGateway::new("TEST1")
                .with_positions(vec![nfo_position(-100)])
                .with_pending(vec![PendingOrder {
                    oms_order_id: "1".to_string(),
                    symbol: Symbol::new("NIFTY24AUGFUT"),
                    exchange: Segment::Nfo,
                    side: Side::Sell,
                    order_type: OrderType::Limit,
                    product: Product::Bo,
                    quantity: 50,
                    price: Decimal::from(100),
                    trigger_price: Decimal::ZERO,
                    status: "open".to_string(),
                    leg_indicator: None,
                }]),
        );
        *gateway.mtm_value.lock() = Decimal::from(-20_000);

        let account = Account::new(
            ClientId::new("TEST1"),
            1.0,
            2,
            RiskLimits::new(10_000.0, 0.5, 0.2, 50_000.0),
            gateway.clone(),
        );
        let sweep = account.sweep_risk().await.unwrap();
        assert!(sweep.must_exit_all);

        let calls = gateway.calls();
        let cancel_at = calls
            .iter()
            .position(|c| c.starts_with("cancel_by_conditions"))
            .expect("bracket cancel must run");
        let place_at = calls
            .iter()
            .position(|c| c.starts_with("place"))
            .expect("flatten must place an exit order");
        assert!(cancel_at < place_at, "cancel must precede flatten: {calls:?}");
    }

    #[tokio::test]
    async fn test_sweep_without_breach_leaves_orders_alone() {
        let gateway = Arc::new(MockGateway::new("TEST1").with_positions(vec![nfo_position(100)]));
        *gateway.mtm_value.lock() = Decimal::from(500);

        let account = Account::new(
            ClientId::new("TEST1"),
            1.0,
            2,
            RiskLimits::new(10_000.0, 0.5, 0.2, 50_000.0),
            gateway.clone(),
        );
        let sweep = account.sweep_risk().await.unwrap();
        assert!(!sweep.must_exit_all);
        assert!(gateway.calls().iter().all(|c| !c.starts_with("place")));
    }
}
