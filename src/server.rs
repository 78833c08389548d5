//! HTTP control surface - a thin adapter over the dispatcher.
//!
//! Every handler parses its arguments, builds one `Command` and hands it to
//! the dispatcher; no order or risk logic lives here.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::args::CommandBuilder;
use crate::core::{ClientId, Command, Product, Symbol};
use crate::dispatch::Dispatcher;
use crate::reports;

pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub builder: CommandBuilder,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/order/{*args}", get(place))
        .route("/modify/{*args}", get(modify))
        .route("/cancel/{*args}", get(cancel))
        .route("/me/{symbol}", get(exit_mis))
        .route("/ne/{symbol}", get(exit_nrml))
        .route("/stop/{symbol}/{trigger}", get(stop))
        .route("/target/{symbol}/{price}", get(target))
        .route("/panic", get(panic_exit))
        .route("/cancel_all", get(cancel_all))
        .route("/positions", get(positions))
        .route("/pending", get(pending))
        .route("/mtm", get(mtm))
        .route("/risk", get(risk_sweep))
        .route("/report", get(report))
        .route("/users", get(users))
        .route("/enable/{client_id}", get(enable))
        .route("/disable/{client_id}", get(disable))
        .with_state(state)
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn percent(query: &HashMap<String, String>) -> f64 {
    query
        .get("p")
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(1.0)
}

fn product(query: &HashMap<String, String>, default: Product) -> Result<Product, Response> {
    match query.get("prd") {
        Some(raw) => raw.parse().map_err(|e: crate::core::Error| bad_request(e.to_string())),
        None => Ok(default),
    }
}

async fn index() -> &'static str {
    "fleet-oms: see /order, /positions, /mtm"
}

async fn place(State(state): State<Arc<AppState>>, Path(args): Path<String>) -> Response {
    match state.builder.place(&args) {
        Ok(command) => Json(state.dispatcher.dispatch(command).await).into_response(),
        Err(e) => bad_request(e.to_string()),
    }
}

async fn modify(State(state): State<Arc<AppState>>, Path(args): Path<String>) -> Response {
    match state.builder.modify(&args) {
        Ok(command) => Json(state.dispatcher.dispatch(command).await).into_response(),
        Err(e) => bad_request(e.to_string()),
    }
}

async fn cancel(State(state): State<Arc<AppState>>, Path(args): Path<String>) -> Response {
    match state.builder.cancel(&args) {
        Ok(command) => Json(state.dispatcher.dispatch(command).await).into_response(),
        Err(e) => bad_request(e.to_string()),
    }
}

async fn exit_mis(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let command = Command::ExitBySymbol {
        symbol: Symbol::new(symbol),
        percent: percent(&query),
        product: Product::Mis,
    };
    Json(state.dispatcher.dispatch(command).await).into_response()
}

async fn exit_nrml(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let command = Command::ExitBySymbol {
        symbol: Symbol::new(symbol),
        percent: percent(&query),
        product: Product::Nrml,
    };
    Json(state.dispatcher.dispatch(command).await).into_response()
}

async fn stop(
    State(state): State<Arc<AppState>>,
    Path((symbol, trigger)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let Ok(trigger_price) = Decimal::from_str(&trigger) else {
        return bad_request(format!("bad trigger price: {trigger}"));
    };
    let product = match product(&query, Product::Nrml) {
        Ok(product) => product,
        Err(response) => return response,
    };
    let command = Command::StopBySymbol {
        symbol: Symbol::new(symbol),
        trigger_price,
        percent: percent(&query),
        product,
    };
    Json(state.dispatcher.dispatch(command).await).into_response()
}

async fn target(
    State(state): State<Arc<AppState>>,
    Path((symbol, price)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let Ok(price) = Decimal::from_str(&price) else {
        return bad_request(format!("bad target price: {price}"));
    };
    let product = match product(&query, Product::Nrml) {
        Ok(product) => product,
        Err(response) => return response,
    };
    let command = Command::TargetBySymbol {
        symbol: Symbol::new(symbol),
        price,
        percent: percent(&query),
        product,
    };
    Json(state.dispatcher.dispatch(command).await).into_response()
}

async fn panic_exit(State(state): State<Arc<AppState>>) -> Response {
    Json(state.dispatcher.dispatch(Command::ExitAll).await).into_response()
}

async fn cancel_all(State(state): State<Arc<AppState>>) -> Response {
    Json(state.dispatcher.dispatch(Command::CancelAll).await).into_response()
}

async fn positions(State(state): State<Arc<AppState>>) -> Response {
    Json(state.dispatcher.positions_all().await).into_response()
}

async fn pending(State(state): State<Arc<AppState>>) -> Response {
    Json(state.dispatcher.pending_all().await).into_response()
}

async fn mtm(State(state): State<Arc<AppState>>) -> Response {
    Json(state.dispatcher.mtm_all().await).into_response()
}

/// Run a risk sweep now instead of waiting for the next scheduled one.
async fn risk_sweep(State(state): State<Arc<AppState>>) -> Response {
    Json(state.dispatcher.sweep_risk().await).into_response()
}

async fn report(State(state): State<Arc<AppState>>) -> Response {
    let positions = state.dispatcher.positions_all().await;
    let pending = state.dispatcher.pending_all().await;
    Json(reports::summarize(&positions, &pending)).into_response()
}

async fn users(State(state): State<Arc<AppState>>) -> Response {
    Json(state.dispatcher.registry().client_ids()).into_response()
}

async fn enable(State(state): State<Arc<AppState>>, Path(client_id): Path<String>) -> Response {
    let enabled = state.dispatcher.registry().enable(&ClientId::new(client_id));
    Json(json!({ "enabled": enabled })).into_response()
}

async fn disable(State(state): State<Arc<AppState>>, Path(client_id): Path<String>) -> Response {
    let disabled = state.dispatcher.registry().disable(&ClientId::new(client_id));
    Json(json!({ "disabled": disabled })).into_response()
}
