//! Core traits - the broker capability the rest of the crate depends on

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::core::{types::*, Result};

/// Per-account venue capability.
///
/// One implementation per venue; every account exclusively owns one handle.
/// All operations are fallible per account - callers isolate failures and
/// never let one account's error touch another's.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// Establish (or revalidate) the session with the venue
    async fn authenticate(&self) -> Result<()>;

    /// All open positions for this account
    async fn positions(&self) -> Result<Vec<Position>>;

    /// All pending (unfilled) orders for this account
    async fn pending_orders(&self) -> Result<Vec<PendingOrder>>;

    /// Place a single order
    async fn place_order(&self, order: &OrderRequest) -> Result<BrokerReply>;

    /// Modify every pending order matching `filter`
    async fn modify_orders_by_conditions(
        &self,
        modifications: &OrderModifications,
        filter: &OrderFilter,
    ) -> Result<BrokerReply>;

    /// Cancel every pending order matching `filter`
    async fn cancel_orders_by_conditions(&self, filter: &OrderFilter) -> Result<BrokerReply>;

    /// Cancel every pending order
    async fn cancel_all_orders(&self) -> Result<BrokerReply>;

    /// Mark-to-market for this account.
    ///
    /// Pass a pre-fetched position list to avoid a second venue round trip.
    async fn mtm(&self, positions: Option<&[Position]>) -> Result<Decimal>;

    /// Broker-side client id
    fn client_id(&self) -> &str;
}
