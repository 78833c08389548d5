//! Account registry - the configured pool and its enable/disable status.
//!
//! The account list is fixed after startup. The disabled set is the only
//! cross-account mutable state and lives behind a single lock; it is never
//! iterated or read except through the methods here.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;

use crate::account::Account;
use crate::core::{ClientId, Error, Position, Product, Result, Symbol};
use crate::risk::RiskVerdict;

pub struct AccountRegistry {
    accounts: Vec<Arc<Account>>,
    disabled: RwLock<HashSet<ClientId>>,
}

impl AccountRegistry {
    pub fn new(accounts: Vec<Arc<Account>>) -> Self {
        Self {
            accounts,
            disabled: RwLock::new(HashSet::new()),
        }
    }

    pub fn accounts(&self) -> &[Arc<Account>] {
        &self.accounts
    }

    pub fn get(&self, client_id: &ClientId) -> Option<Arc<Account>> {
        self.accounts
            .iter()
            .find(|a| a.client_id() == client_id)
            .cloned()
    }

    pub fn client_ids(&self) -> Vec<ClientId> {
        self.accounts.iter().map(|a| a.client_id().clone()).collect()
    }

    pub fn is_enabled(&self, client_id: &ClientId) -> bool {
        !self.disabled.read().contains(client_id)
    }

    /// Block new order placement for the account. Modification and
    /// cancellation of existing orders stay allowed - a disabled account may
    /// still need to unwind risk.
    ///
    /// Returns the disabled set afterwards. Unknown ids are ignored.
    pub fn disable(&self, client_id: &ClientId) -> Vec<ClientId> {
        let mut disabled = self.disabled.write();
        if self.accounts.iter().any(|a| a.client_id() == client_id) {
            disabled.insert(client_id.clone());
        }
        disabled.iter().cloned().collect()
    }

    /// Re-enable a previously disabled account. Returns the enabled set.
    pub fn enable(&self, client_id: &ClientId) -> Vec<ClientId> {
        let mut disabled = self.disabled.write();
        disabled.remove(client_id);
        self.accounts
            .iter()
            .map(|a| a.client_id())
            .filter(|id| !disabled.contains(id))
            .cloned()
            .collect()
    }

    /// Fold a reported MTM into one account's risk state.
    pub fn update_risk(&self, client_id: &ClientId, reported_mtm: Decimal) -> Result<RiskVerdict> {
        let account = self
            .get(client_id)
            .ok_or_else(|| Error::UnknownAccount(client_id.to_string()))?;
        Ok(account.update_risk(reported_mtm))
    }

    /// Read-through position lookup on one account.
    pub async fn resolve_position(
        &self,
        client_id: &ClientId,
        symbol: &Symbol,
        product: Product,
    ) -> Result<Option<Position>> {
        let account = self
            .get(client_id)
            .ok_or_else(|| Error::UnknownAccount(client_id.to_string()))?;
        crate::positions::resolve(account.gateway(), symbol, product).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskLimits;
    use crate::testutil::MockGateway;

    fn registry_of(ids: &[&str]) -> AccountRegistry {
        let accounts = ids
            .iter()
            .map(|id| {
                Arc::new(Account::new(
                    ClientId::new(*id),
                    1.0,
                    3,
                    RiskLimits::new(1e10, 1e3, 1e3, 1e10),
                    Arc::new(MockGateway::new(id)),
                ))
            })
            .collect();
        AccountRegistry::new(accounts)
    }

    #[test]
    fn test_disable_enable_roundtrip() {
        let registry = registry_of(&["AA1", "BB2"]);
        let aa1 = ClientId::new("AA1");

        assert!(registry.is_enabled(&aa1));
        let disabled = registry.disable(&aa1);
        assert_eq!(disabled, vec![aa1.clone()]);
        assert!(!registry.is_enabled(&aa1));

        let enabled = registry.enable(&aa1);
        assert!(registry.is_enabled(&aa1));
        assert_eq!(enabled.len(), 2);
    }

    #[test]
    fn test_disable_unknown_id_is_ignored() {
        let registry = registry_of(&["AA1"]);
        let disabled = registry.disable(&ClientId::new("NOPE"));
        assert!(disabled.is_empty());
    }

    #[test]
    fn test_update_risk_unknown_account() {
        let registry = registry_of(&["AA1"]);
        let err = registry
            .update_risk(&ClientId::new("NOPE"), Decimal::ZERO)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownAccount(_)));
    }

    #[test]
    fn test_update_risk_returns_verdict() {
        let registry = registry_of(&["AA1"]);
        let verdict = registry
            .update_risk(&ClientId::new("AA1"), Decimal::from(100))
            .unwrap();
        assert!(!verdict.must_exit_all);
    }
}
