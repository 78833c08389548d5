//! Concurrent command fan-out across the account pool.
//!
//! One task per eligible account, bounded by a semaphore, joined as a set.
//! Failures stay local: a venue error, a timeout or a panic in one account's
//! task becomes that account's `Failure` entry and nothing else.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::account::{Account, AccountSweep};
use crate::core::{
    AccountOutcome, ClientId, Command, DispatchResult, Outcome, PendingOrder, Position, Result,
};
use crate::registry::AccountRegistry;

/// Per-account MTM report row.
#[derive(Debug, Clone, Serialize)]
pub struct MtmRow {
    pub client_id: ClientId,
    pub mtm: Decimal,
    pub max_mtm: Decimal,
}

pub struct Dispatcher {
    registry: Arc<AccountRegistry>,
    max_in_flight: usize,
    task_timeout: Duration,
}

impl Dispatcher {
    /// `max_in_flight` of 0 means one slot per account (no queueing).
    pub fn new(registry: Arc<AccountRegistry>, max_in_flight: usize, task_timeout: Duration) -> Self {
        Self {
            registry,
            max_in_flight,
            task_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<AccountRegistry> {
        &self.registry
    }

    /// Accounts a command will be attempted on.
    ///
    /// Place skips disabled accounts and accounts without the requested
    /// segment. Modify/Cancel skip only disabled accounts - they may still
    /// need to unwind risk on a freshly disabled account. Exit-class commands
    /// and the panic commands run everywhere: disabling gates new exposure,
    /// never risk unwind.
    fn eligible(&self, command: &Command) -> Vec<Arc<Account>> {
        self.registry
            .accounts()
            .iter()
            .filter(|account| {
                let client_id = account.client_id();
                match command {
                    Command::Place(place) => {
                        if !self.registry.is_enabled(client_id) {
                            debug!(%client_id, "skipping disabled account");
                            false
                        } else if !account.allows(place.exchange) {
                            debug!(%client_id, exchange = %place.exchange, "segment not allowed");
                            false
                        } else {
                            true
                        }
                    }
                    Command::Modify { .. } | Command::Cancel { .. } => {
                        self.registry.is_enabled(client_id)
                    }
                    _ => true,
                }
            })
            .cloned()
            .collect()
    }

    /// Run one command against every eligible account and aggregate the
    /// per-account outcomes. Never fails as a whole.
    pub async fn dispatch(&self, command: Command) -> DispatchResult {
        let eligible = self.eligible(&command);
        info!(
            kind = command.kind(),
            accounts = eligible.len(),
            "dispatching command"
        );

        let command = Arc::new(command);
        let outcomes = self
            .fan_out(eligible, move |account| {
                let command = command.clone();
                async move { account.execute(&command).await }
            })
            .await
            .into_iter()
            .map(|(client_id, result)| {
                let outcome = match result {
                    Ok(Some(reply)) => Outcome::Success(reply),
                    Ok(None) => Outcome::Success(serde_json::Value::Null),
                    Err(reason) => Outcome::Failure(reason),
                };
                AccountOutcome { client_id, outcome }
            })
            .collect();

        DispatchResult { outcomes }
    }

    /// One full risk sweep: refresh MTM on every account, update each state
    /// machine and enforce forced exits. Accounts that fail to report are
    /// logged and skipped until the next sweep.
    pub async fn sweep_risk(&self) -> Vec<AccountSweep> {
        let accounts = self.registry.accounts().to_vec();
        let results = self
            .fan_out(accounts, |account| async move { account.sweep_risk().await })
            .await;

        let mut sweeps = Vec::with_capacity(results.len());
        let mut combined = Decimal::ZERO;
        for (client_id, result) in results {
            match result {
                Ok(sweep) => {
                    combined += sweep.mtm;
                    sweeps.push(sweep);
                }
                Err(reason) => warn!(%client_id, %reason, "risk sweep failed for account"),
            }
        }
        info!(combined_mtm = %combined.round(), accounts = sweeps.len(), "risk sweep complete");
        sweeps
    }

    /// All open positions across the pool.
    pub async fn positions_all(&self) -> Vec<Position> {
        let accounts = self.registry.accounts().to_vec();
        self.fan_out(accounts, |account| async move {
            account.gateway().positions().await
        })
        .await
        .into_iter()
        .filter_map(|(_, result)| result.ok())
        .flatten()
        .collect()
    }

    /// All pending orders across the pool.
    pub async fn pending_all(&self) -> Vec<PendingOrder> {
        let accounts = self.registry.accounts().to_vec();
        self.fan_out(accounts, |account| async move {
            account.gateway().pending_orders().await
        })
        .await
        .into_iter()
        .filter_map(|(_, result)| result.ok())
        .flatten()
        .collect()
    }

    /// Fresh MTM plus the recorded high-water mark, per account.
    pub async fn mtm_all(&self) -> Vec<MtmRow> {
        let accounts = self.registry.accounts().to_vec();
        self.fan_out(accounts, |account| async move {
            let mtm = account.gateway().mtm(None).await?;
            let (_, max_mtm, _) = account.risk_snapshot();
            Ok(MtmRow {
                client_id: account.client_id().clone(),
                mtm,
                max_mtm,
            })
        })
        .await
        .into_iter()
        .filter_map(|(_, result)| result.ok())
        .collect()
    }

    /// Spawn `run` for each account into a bounded join set and collect one
    /// result per account. Timeouts and panics are folded into the per-account
    /// error string; the aggregate itself always returns.
    async fn fan_out<T, F, Fut>(
        &self,
        accounts: Vec<Arc<Account>>,
        run: F,
    ) -> Vec<(ClientId, std::result::Result<T, String>)>
    where
        T: Send + 'static,
        F: Fn(Arc<Account>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let permits = if self.max_in_flight == 0 {
            accounts.len().max(1)
        } else {
            self.max_in_flight
        };
        let semaphore = Arc::new(Semaphore::new(permits));
        let task_timeout = self.task_timeout;

        let mut tasks = JoinSet::new();
        let mut names: HashMap<tokio::task::Id, ClientId> = HashMap::new();
        for account in accounts {
            let client_id = account.client_id().clone();
            let semaphore = semaphore.clone();
            let fut = run(account);
            let handle = tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Err("dispatch pool closed".to_string()),
                };
                // The timeout bounds the venue call, not the queue wait.
                match tokio::time::timeout(task_timeout, fut).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!("timed out after {}s", task_timeout.as_secs())),
                }
            });
            names.insert(handle.id(), client_id);
        }

        let mut results = Vec::with_capacity(names.len());
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, result)) => {
                    let client_id = names
                        .remove(&id)
                        .unwrap_or_else(|| ClientId::new("UNKNOWN"));
                    if let Err(reason) = &result {
                        warn!(%client_id, %reason, "account task failed");
                    }
                    results.push((client_id, result));
                }
                Err(join_error) => {
                    let client_id = names
                        .remove(&join_error.id())
                        .unwrap_or_else(|| ClientId::new("UNKNOWN"));
                    error!(%client_id, error = %join_error, "account task panicked");
                    results.push((client_id, Err("account task panicked".to_string())));
                }
            }
        }
        results
    }
}
