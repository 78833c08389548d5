use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

use fleet_oms::account::Account;
use fleet_oms::args::CommandBuilder;
use fleet_oms::brokers::MasterTrust;
use fleet_oms::core::{AppConfig, BrokerGateway, ClientId};
use fleet_oms::dispatch::Dispatcher;
use fleet_oms::master_trust_api::MasterTrustClient;
use fleet_oms::registry::AccountRegistry;
use fleet_oms::risk::RiskLimits;
use fleet_oms::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fleet_oms=debug"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .init();

    let config = AppConfig::load_default()?;
    std::fs::create_dir_all(&config.venue.token_dir)?;

    // Accounts that fail to construct or authenticate are skipped, not fatal:
    // the rest of the pool keeps trading.
    let mut accounts: Vec<Arc<Account>> = Vec::with_capacity(config.accounts.len());
    for entry in &config.accounts {
        let client_id = ClientId::new(&entry.client_id);
        let credentials = (
            std::env::var(&entry.password_env),
            std::env::var(&entry.pin_env),
            std::env::var(&entry.secret_env),
        );
        let (Ok(password), Ok(pin), Ok(secret)) = credentials else {
            tracing::error!(%client_id, "missing credential environment variables, skipping");
            continue;
        };

        let token_file = std::path::Path::new(&config.venue.token_dir)
            .join(format!("token_{client_id}.tok"));
        let gateway = Arc::new(MasterTrust::new(MasterTrustClient::new(
            config.venue.base_url.clone(),
            client_id.as_str(),
            password,
            pin,
            secret,
            token_file,
        )));

        if let Err(e) = gateway.authenticate().await {
            tracing::error!(%client_id, error = %e, "authentication failed, skipping account");
            continue;
        }

        let limits = RiskLimits::new(
            entry.max_loss,
            entry.trail_after,
            entry.trail_percent,
            entry.target,
        );
        tracing::info!(%client_id, capital = entry.capital, "account ready");
        accounts.push(Arc::new(Account::new(
            client_id,
            entry.capital,
            entry.exc_code,
            limits,
            gateway,
        )));
    }

    if accounts.is_empty() {
        anyhow::bail!("no account could be brought up");
    }
    tracing::info!(accounts = accounts.len(), "fleet-oms starting");

    let registry = Arc::new(AccountRegistry::new(accounts));
    let dispatcher = Arc::new(Dispatcher::new(
        registry,
        config.server.max_in_flight,
        Duration::from_secs(config.server.task_timeout_secs),
    ));

    // Periodic risk sweep: refresh MTM everywhere and enforce forced exits.
    let sweeper = dispatcher.clone();
    let poll = Duration::from_secs(config.server.risk_poll_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            sweeper.sweep_risk().await;
        }
    });

    let state = Arc::new(AppState {
        dispatcher,
        builder: CommandBuilder::new(&config.shortcuts, config.server.default_lot_size),
    });

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "control surface listening");
    axum::serve(listener, server::router(state)).await?;
    Ok(())
}
