//! Wire models for the MasterTrust REST API.

use rust_decimal::Decimal;
use serde::Deserialize;

fn one() -> Decimal {
    Decimal::ONE
}

/// Standard response envelope: `{"status": "...", "message": "...", "data": ...}`
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub status: String,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionData {
    pub auth_token: String,
}

/// One position row as reported by the venue.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionRow {
    #[serde(rename = "trading_symbol")]
    pub symbol: String,
    pub exchange: String,
    pub product: String,
    #[serde(default)]
    pub net_quantity: i64,
    #[serde(default)]
    pub buy_amount: Decimal,
    #[serde(default)]
    pub sell_amount: Decimal,
    #[serde(default)]
    pub ltp: Decimal,
    /// Contract multiplier, 1 for equities
    #[serde(default = "one")]
    pub multiplier: Decimal,
    #[serde(default)]
    pub average_buy_price: Decimal,
    #[serde(default)]
    pub average_sell_price: Decimal,
}

impl PositionRow {
    /// Realized cash flow of the row (sells minus buys).
    pub fn net_amount(&self) -> Decimal {
        self.sell_amount - self.buy_amount
    }

    /// Mark-to-market: realized plus open quantity at last traded price.
    pub fn mtm(&self) -> Decimal {
        self.net_amount() + Decimal::from(self.net_quantity) * self.ltp * self.multiplier
    }
}

/// One pending order row as reported by the venue.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRow {
    pub oms_order_id: String,
    #[serde(rename = "trading_symbol")]
    pub symbol: String,
    pub exchange: String,
    pub product: String,
    pub order_side: String,
    pub order_type: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub trigger_price: Decimal,
    #[serde(default)]
    pub order_status: String,
    #[serde(default)]
    pub leg_order_indicator: Option<String>,
}
