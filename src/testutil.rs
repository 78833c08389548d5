//! Test support - an in-memory gateway that records its call sequence.

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::{
    BrokerGateway, BrokerReply, Error, OrderFilter, OrderModifications, OrderRequest, PendingOrder,
    Position, Result,
};

/// Scriptable gateway for tests. Set `fail` to make every venue call error.
pub struct MockGateway {
    client_id: String,
    pub positions: Mutex<Vec<Position>>,
    pub pending: Mutex<Vec<PendingOrder>>,
    pub mtm_value: Mutex<Decimal>,
    pub fail: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl MockGateway {
    pub fn new(client_id: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            positions: Mutex::new(vec![]),
            pending: Mutex::new(vec![]),
            mtm_value: Mutex::new(Decimal::ZERO),
            fail: AtomicBool::new(false),
            calls: Mutex::new(vec![]),
        }
    }

    pub fn with_positions(self, positions: Vec<Position>) -> Self {
        *self.positions.lock() = positions;
        self
    }

    pub fn with_pending(self, pending: Vec<PendingOrder>) -> Self {
        *self.pending.lock() = pending;
        self
    }

    pub fn failing(self) -> Self {
        self.fail.store(true, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(Error::Broker("simulated venue failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BrokerGateway for MockGateway {
    async fn authenticate(&self) -> Result<()> {
        self.record("authenticate");
        self.check()
    }

    async fn positions(&self) -> Result<Vec<Position>> {
        self.record("positions");
        self.check()?;
        Ok(self.positions.lock().clone())
    }

    async fn pending_orders(&self) -> Result<Vec<PendingOrder>> {
        self.record("pending_orders");
        self.check()?;
        Ok(self.pending.lock().clone())
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<BrokerReply> {
        self.record(format!(
            "place {} {} {} {}",
            order.side, order.quantity, order.symbol, order.order_type
        ));
        self.check()?;
        Ok(serde_json::json!({ "status": "success", "client_id": self.client_id }))
    }

    async fn modify_orders_by_conditions(
        &self,
        _modifications: &OrderModifications,
        _filter: &OrderFilter,
    ) -> Result<BrokerReply> {
        self.record("modify_by_conditions");
        self.check()?;
        Ok(serde_json::json!({ "status": "success" }))
    }

    async fn cancel_orders_by_conditions(&self, filter: &OrderFilter) -> Result<BrokerReply> {
        match filter.product {
            Some(product) => self.record(format!("cancel_by_conditions product={product}")),
            None => self.record("cancel_by_conditions"),
        }
        self.check()?;
        Ok(serde_json::json!({ "status": "success" }))
    }

    async fn cancel_all_orders(&self) -> Result<BrokerReply> {
        self.record("cancel_all_orders");
        self.check()?;
        Ok(serde_json::json!({ "status": "success" }))
    }

    async fn mtm(&self, _positions: Option<&[Position]>) -> Result<Decimal> {
        self.record("mtm");
        self.check()?;
        Ok(*self.mtm_value.lock())
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }
}
