//! Core types - strong typing for order routing across accounts

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::error::Error;

/// Venue reply payload, passed through to the caller untouched.
pub type BrokerReply = serde_json::Value;

/// Trading symbol (e.g. "NIFTY24AUGFUT"), normalized to upper case
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Broker client id, normalized to upper case
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Exchange segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Segment {
    Nse,
    Nfo,
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Segment::Nse => write!(f, "NSE"),
            Segment::Nfo => write!(f, "NFO"),
        }
    }
}

impl std::str::FromStr for Segment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_uppercase().as_str() {
            "NSE" => Ok(Segment::Nse),
            "NFO" => Ok(Segment::Nfo),
            other => Err(Error::Config(format!("unknown exchange segment: {other}"))),
        }
    }
}

/// Position product type: intraday, carry-forward or bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Product {
    Mis,
    Nrml,
    Bo,
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Product::Mis => write!(f, "MIS"),
            Product::Nrml => write!(f, "NRML"),
            Product::Bo => write!(f, "BO"),
        }
    }
}

impl std::str::FromStr for Product {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_uppercase().as_str() {
            "MIS" => Ok(Product::Mis),
            "NRML" => Ok(Product::Nrml),
            "BO" => Ok(Product::Bo),
            other => Err(Error::Config(format!("unknown product: {other}"))),
        }
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(Error::Config(format!("unknown side: {other}"))),
        }
    }
}

/// Order type. `StopLimit` is the venue's "SL" (trigger + limit price).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderType {
    #[serde(rename = "MARKET")]
    Market,
    #[serde(rename = "LIMIT")]
    Limit,
    #[serde(rename = "SL")]
    StopLimit,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
            OrderType::StopLimit => write!(f, "SL"),
        }
    }
}

impl std::str::FromStr for OrderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_uppercase().as_str() {
            "MARKET" => Ok(OrderType::Market),
            "LIMIT" => Ok(OrderType::Limit),
            "SL" => Ok(OrderType::StopLimit),
            other => Err(Error::Config(format!("unknown order type: {other}"))),
        }
    }
}

/// Order validity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Validity {
    Day,
    Ioc,
}

impl std::fmt::Display for Validity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Validity::Day => write!(f, "DAY"),
            Validity::Ioc => write!(f, "IOC"),
        }
    }
}

impl std::str::FromStr for Validity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_uppercase().as_str() {
            "DAY" => Ok(Validity::Day),
            "IOC" => Ok(Validity::Ioc),
            other => Err(Error::Config(format!("unknown validity: {other}"))),
        }
    }
}

/// A fully-specified order ready to send to the venue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub exchange: Segment,
    pub product: Product,
    pub side: Side,
    pub quantity: i64,
    pub order_type: OrderType,
    pub price: Option<Decimal>,
    pub trigger_price: Option<Decimal>,
    pub validity: Validity,
}

/// Venue-reported open position. Quantity is signed: negative means short.
///
/// Never cached across requests - always read through the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub exchange: Segment,
    pub product: Product,
    pub quantity: i64,
    pub net_amount: Decimal,
    pub ltp: Decimal,
}

impl Position {
    /// Side of the order that would close this position.
    ///
    /// Negative quantity (short) closes with a BUY, positive with a SELL.
    /// Downstream exit/stop/target construction relies on this convention.
    pub fn closing_side(&self) -> Side {
        if self.quantity < 0 { Side::Buy } else { Side::Sell }
    }
}

/// Venue-reported pending (unfilled) order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingOrder {
    pub oms_order_id: String,
    pub symbol: Symbol,
    pub exchange: Segment,
    pub side: Side,
    pub order_type: OrderType,
    pub product: Product,
    pub quantity: i64,
    pub price: Decimal,
    pub trigger_price: Decimal,
    /// Venue status string, e.g. "open" or "trigger pending"
    pub status: String,
    pub leg_indicator: Option<String>,
}

/// Conditions selecting a subset of pending orders
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderFilter {
    pub symbol: Option<Symbol>,
    pub product: Option<Product>,
    pub side: Option<Side>,
    pub order_type: Option<OrderType>,
    pub status: Option<String>,
    /// Apply to the first `limit` matches only; 0 means all
    #[serde(default)]
    pub limit: usize,
}

impl OrderFilter {
    pub fn matches(&self, order: &PendingOrder) -> bool {
        if let Some(symbol) = &self.symbol {
            if symbol != &order.symbol {
                return false;
            }
        }
        if let Some(product) = self.product {
            if product != order.product {
                return false;
            }
        }
        if let Some(side) = self.side {
            if side != order.side {
                return false;
            }
        }
        if let Some(order_type) = self.order_type {
            if order_type != order.order_type {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if !status.eq_ignore_ascii_case(&order.status) {
                return false;
            }
        }
        true
    }
}

/// Field changes applied to the orders matched by an [`OrderFilter`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderModifications {
    pub quantity: Option<i64>,
    pub price: Option<Decimal>,
    pub trigger_price: Option<Decimal>,
}

/// A raw place request before per-account quantity scaling.
///
/// `quantity` is the requested base quantity; each account scales it by its
/// capital multiplier and rounds to `lot_size` before sending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub symbol: Symbol,
    pub exchange: Segment,
    pub product: Product,
    pub side: Side,
    pub quantity: i64,
    pub order_type: OrderType,
    pub price: Option<Decimal>,
    pub trigger_price: Option<Decimal>,
    pub validity: Validity,
    pub lot_size: i64,
}

/// A command mirrored across the account pool.
///
/// Immutable once built; per-account copies are taken before account-specific
/// fields (quantity) are filled in.
#[derive(Debug, Clone)]
pub enum Command {
    Place(PlaceOrder),
    Modify {
        modifications: OrderModifications,
        filter: OrderFilter,
    },
    Cancel {
        filter: OrderFilter,
    },
    ExitBySymbol {
        symbol: Symbol,
        percent: f64,
        product: Product,
    },
    StopBySymbol {
        symbol: Symbol,
        trigger_price: Decimal,
        percent: f64,
        product: Product,
    },
    TargetBySymbol {
        symbol: Symbol,
        price: Decimal,
        percent: f64,
        product: Product,
    },
    /// Flatten every open position on every account
    ExitAll,
    /// Cancel every pending order on every account
    CancelAll,
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Place(_) => "place",
            Command::Modify { .. } => "modify",
            Command::Cancel { .. } => "cancel",
            Command::ExitBySymbol { .. } => "exit_by_symbol",
            Command::StopBySymbol { .. } => "stop_by_symbol",
            Command::TargetBySymbol { .. } => "target_by_symbol",
            Command::ExitAll => "exit_all",
            Command::CancelAll => "cancel_all",
        }
    }
}

/// Per-account result of a dispatched command
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Venue reply, or null when the command was a no-op for this account
    Success(BrokerReply),
    Failure(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountOutcome {
    pub client_id: ClientId,
    pub outcome: Outcome,
}

/// Aggregated result of one dispatch: one entry per attempted account,
/// none for accounts skipped by eligibility filtering.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchResult {
    pub outcomes: Vec<AccountOutcome>,
}

impl DispatchResult {
    pub fn successes(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Success(_)))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.len() - self.successes()
    }
}
