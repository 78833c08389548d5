//! Raw argument parsing - the boundary between URL-ish command strings and
//! typed commands.
//!
//! Arguments arrive as `key=value` pairs separated by `/`, e.g.
//! `exc=NFO/sym=NIFTY24AUGFUT/qty=50/ot=MARKET/side=BUY`. Short keys are
//! expanded through a shortcut table. Malformed numeric values fall back to
//! documented defaults here, at the boundary - never silently deeper in.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::warn;

use crate::core::{
    Command, Error, OrderFilter, OrderModifications, OrderType, PlaceOrder, Product, Result,
    Segment, Side, Symbol, Validity,
};

fn builtin_shortcuts() -> HashMap<String, String> {
    [
        ("exc", "exchange"),
        ("sym", "symbol"),
        ("qty", "quantity"),
        ("prd", "product"),
        ("ot", "order_type"),
        ("pr", "price"),
        ("trg", "trigger_price"),
        ("val", "validity"),
        ("sd", "side"),
        ("l", "lot_size"),
        ("n", "count"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub struct CommandBuilder {
    shortcuts: HashMap<String, String>,
    default_lot_size: i64,
}

impl CommandBuilder {
    /// `extra` shortcut entries from config are merged over the built-ins.
    pub fn new(extra: &HashMap<String, String>, default_lot_size: i64) -> Self {
        let mut shortcuts = builtin_shortcuts();
        shortcuts.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            shortcuts,
            default_lot_size,
        }
    }

    /// Split a raw argument path into expanded key/value pairs.
    /// Segments without `=` are dropped.
    pub fn expand(&self, raw: &str) -> HashMap<String, String> {
        raw.split('/')
            .filter_map(|pair| pair.split_once('='))
            .map(|(key, value)| {
                let key = self
                    .shortcuts
                    .get(key)
                    .map(String::as_str)
                    .unwrap_or(key)
                    .to_string();
                (key, value.to_string())
            })
            .collect()
    }

    /// Build a Place command. `symbol` and `side` are required; everything
    /// else has a documented default.
    pub fn place(&self, raw: &str) -> Result<Command> {
        let args = self.expand(raw);
        let symbol = args
            .get("symbol")
            .ok_or_else(|| Error::Config("symbol is required".to_string()))?;
        let side: Side = args
            .get("side")
            .ok_or_else(|| Error::Config("side is required".to_string()))?
            .parse()?;

        let exchange = match args.get("exchange") {
            Some(raw) => raw.parse::<Segment>()?,
            None => Segment::Nse,
        };
        let product = match args.get("product") {
            Some(raw) => raw.parse::<Product>()?,
            None => Product::Mis,
        };
        let order_type = match args.get("order_type") {
            Some(raw) => raw.parse::<OrderType>()?,
            None => OrderType::Market,
        };
        let validity = match args.get("validity") {
            Some(raw) => raw.parse::<Validity>()?,
            None => Validity::Day,
        };

        Ok(Command::Place(PlaceOrder {
            symbol: Symbol::new(symbol),
            exchange,
            product,
            side,
            quantity: numeric_or_default(&args, "quantity", 0),
            order_type,
            price: decimal_arg(&args, "price"),
            trigger_price: decimal_arg(&args, "trigger_price"),
            validity,
            lot_size: numeric_or_default(&args, "lot_size", self.default_lot_size),
        }))
    }

    /// Build a Modify command. A positive trigger price targets orders in
    /// "trigger pending" state, otherwise "open" orders are targeted.
    pub fn modify(&self, raw: &str) -> Result<Command> {
        let args = self.expand(raw);
        let trigger_price = decimal_arg(&args, "trigger_price").filter(|t| *t > Decimal::ZERO);
        let status = if trigger_price.is_some() {
            "trigger pending"
        } else {
            "open"
        };
        let quantity: i64 = numeric_or_default(&args, "quantity", 0);

        let modifications = OrderModifications {
            quantity: (quantity != 0).then_some(quantity),
            price: decimal_arg(&args, "price"),
            trigger_price,
        };
        let filter = OrderFilter {
            status: Some(status.to_string()),
            ..self.filter(&args)?
        };
        Ok(Command::Modify {
            modifications,
            filter,
        })
    }

    /// Build a Cancel command from filter conditions alone.
    pub fn cancel(&self, raw: &str) -> Result<Command> {
        let args = self.expand(raw);
        Ok(Command::Cancel {
            filter: self.filter(&args)?,
        })
    }

    fn filter(&self, args: &HashMap<String, String>) -> Result<OrderFilter> {
        Ok(OrderFilter {
            symbol: args.get("symbol").map(Symbol::new),
            product: parse_opt(args, "product")?,
            side: parse_opt(args, "side")?,
            order_type: parse_opt(args, "order_type")?,
            status: args.get("status").cloned(),
            limit: numeric_or_default(args, "count", 0usize),
        })
    }
}

fn parse_opt<T: FromStr<Err = Error>>(
    args: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>> {
    args.get(key).map(|raw| raw.parse()).transpose()
}

/// Parse a numeric argument, falling back to `default` when the value is
/// absent or not a number. The fallback is policy, not an error.
fn numeric_or_default<T: FromStr + Copy + std::fmt::Display>(
    args: &HashMap<String, String>,
    key: &str,
    default: T,
) -> T {
    match args.get(key) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, %default, "malformed numeric argument, using default");
            default
        }),
    }
}

fn decimal_arg(args: &HashMap<String, String>, key: &str) -> Option<Decimal> {
    let raw = args.get(key)?;
    match Decimal::from_str(raw) {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "malformed price argument, ignoring");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> CommandBuilder {
        CommandBuilder::new(&HashMap::new(), 50)
    }

    #[test]
    fn test_expand_applies_shortcuts() {
        let args = builder().expand("exc=NFO/sym=nifty24augfut/qty=100/pr=82.8");
        assert_eq!(args.get("exchange").unwrap(), "NFO");
        assert_eq!(args.get("symbol").unwrap(), "nifty24augfut");
        assert_eq!(args.get("quantity").unwrap(), "100");
        assert_eq!(args.get("price").unwrap(), "82.8");
    }

    #[test]
    fn test_expand_keeps_unknown_keys() {
        let args = builder().expand("exchange=NSE/foo=bar");
        assert_eq!(args.get("exchange").unwrap(), "NSE");
        assert_eq!(args.get("foo").unwrap(), "bar");
    }

    #[test]
    fn test_place_full_arguments() {
        let cmd = builder()
            .place("exc=NFO/sym=nifty24augfut/qty=100/ot=LIMIT/pr=82.8/side=BUY/prd=NRML/l=25")
            .unwrap();
        let Command::Place(place) = cmd else {
            panic!("expected place");
        };
        assert_eq!(place.symbol, Symbol::new("NIFTY24AUGFUT"));
        assert_eq!(place.exchange, Segment::Nfo);
        assert_eq!(place.product, Product::Nrml);
        assert_eq!(place.side, Side::Buy);
        assert_eq!(place.quantity, 100);
        assert_eq!(place.order_type, OrderType::Limit);
        assert_eq!(place.price, Some(Decimal::new(828, 1)));
        assert_eq!(place.lot_size, 25);
    }

    #[test]
    fn test_place_defaults() {
        let cmd = builder().place("sym=TATAPOWER-EQ/side=SELL").unwrap();
        let Command::Place(place) = cmd else {
            panic!("expected place");
        };
        assert_eq!(place.exchange, Segment::Nse);
        assert_eq!(place.product, Product::Mis);
        assert_eq!(place.order_type, OrderType::Market);
        assert_eq!(place.validity, Validity::Day);
        assert_eq!(place.quantity, 0);
        assert_eq!(place.lot_size, 50);
    }

    #[test]
    fn test_place_malformed_lot_size_falls_back() {
        let cmd = builder()
            .place("sym=ABC/side=BUY/qty=100/l=abc")
            .unwrap();
        let Command::Place(place) = cmd else {
            panic!("expected place");
        };
        assert_eq!(place.lot_size, 50);
    }

    #[test]
    fn test_place_requires_symbol_and_side() {
        assert!(builder().place("qty=100/side=BUY").is_err());
        assert!(builder().place("sym=ABC/qty=100").is_err());
    }

    #[test]
    fn test_modify_with_trigger_targets_trigger_pending() {
        let cmd = builder().modify("sym=ABC/trg=105.5/pr=105").unwrap();
        let Command::Modify {
            modifications,
            filter,
        } = cmd
        else {
            panic!("expected modify");
        };
        assert_eq!(filter.status.as_deref(), Some("trigger pending"));
        assert_eq!(modifications.trigger_price, Some(Decimal::new(1055, 1)));
        assert_eq!(modifications.price, Some(Decimal::from(105)));
        assert_eq!(modifications.quantity, None);
    }

    #[test]
    fn test_modify_without_trigger_targets_open() {
        let cmd = builder().modify("sym=ABC/pr=99/qty=50").unwrap();
        let Command::Modify {
            modifications,
            filter,
        } = cmd
        else {
            panic!("expected modify");
        };
        assert_eq!(filter.status.as_deref(), Some("open"));
        assert_eq!(modifications.trigger_price, None);
        assert_eq!(modifications.quantity, Some(50));
    }

    #[test]
    fn test_cancel_filter_and_count() {
        let cmd = builder().cancel("sym=ABC/prd=BO/n=2").unwrap();
        let Command::Cancel { filter } = cmd else {
            panic!("expected cancel");
        };
        assert_eq!(filter.symbol, Some(Symbol::new("ABC")));
        assert_eq!(filter.product, Some(Product::Bo));
        assert_eq!(filter.limit, 2);
    }

    #[test]
    fn test_config_shortcuts_override_builtins() {
        let extra = HashMap::from([("s".to_string(), "symbol".to_string())]);
        let builder = CommandBuilder::new(&extra, 50);
        let args = builder.expand("s=ABC");
        assert_eq!(args.get("symbol").unwrap(), "ABC");
    }
}
