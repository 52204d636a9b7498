use ce_common::Birr;
use chrono::Duration;
use log::*;

use crate::{
    db_types::{Contract, NewContract, Payment, Principal},
    traits::{MarketplaceDatabase, MarketplaceError},
};

pub const DEFAULT_CONTRACT_DURATION_DAYS: i64 = 30;

/// `ContractApi` fronts the prepaid contract wallets: creation, renewal and queries.
///
/// The ledger itself — the guarded balance debit — is exercised from order placement; this API
/// never mutates a balance directly except through renewal credits.
pub struct ContractApi<B> {
    db: B,
}

impl<B> ContractApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> ContractApi<B>
where B: MarketplaceDatabase
{
    /// Opens a new contract with a lounge.
    ///
    /// The contract starts *inactive* with its full balance loaded; the pending funding payment
    /// created alongside it must complete at the gateway before the reconciler activates the
    /// wallet. A user can hold at most one active contract per lounge.
    pub async fn create_contract(
        &self,
        principal: &Principal,
        lounge_id: i64,
        amount: Birr,
        duration_days: Option<i64>,
    ) -> Result<(Contract, Payment), MarketplaceError> {
        if !amount.is_positive() {
            return Err(MarketplaceError::InvalidAmount(amount));
        }
        let duration_days = duration_days.unwrap_or(DEFAULT_CONTRACT_DURATION_DAYS);
        if duration_days <= 0 {
            return Err(MarketplaceError::InvalidRequest(format!("contract duration of {duration_days} days")));
        }
        let contract = NewContract { user_id: principal.id, lounge_id, total_amount: amount, duration_days };
        let (contract, payment) = self.db.create_contract(contract).await?;
        debug!(
            "📜️ Contract [{}] created for user #{} at lounge #{lounge_id}: {amount} for {duration_days} days. \
             Awaiting payment [{}] to activate.",
            contract.id, principal.id, payment.id
        );
        Ok((contract, payment))
    }

    /// Renews an existing contract owned by the acting user.
    ///
    /// The renewal credit is applied immediately and atomically with the pending renewal payment:
    /// total and remaining balance both grow by `amount`, the renewal count increments, and the
    /// expiry extends by the duration measured from the *stored* expiry — even when the contract
    /// had already lapsed.
    pub async fn renew_contract(
        &self,
        principal: &Principal,
        contract_id: i64,
        amount: Birr,
        duration_days: Option<i64>,
    ) -> Result<(Contract, Payment), MarketplaceError> {
        if !amount.is_positive() {
            return Err(MarketplaceError::InvalidAmount(amount));
        }
        let duration = Duration::days(duration_days.unwrap_or(DEFAULT_CONTRACT_DURATION_DAYS));
        let (contract, payment) = self.db.renew_contract(contract_id, principal.id, amount, duration).await?;
        debug!(
            "📜️ Contract [{contract_id}] renewed with {amount}; now expires {} (renewal #{})",
            contract.expires_at, contract.renewal_count
        );
        Ok((contract, payment))
    }

    pub async fn my_contracts(&self, principal: &Principal) -> Result<Vec<Contract>, MarketplaceError> {
        self.db.contracts_for_user(principal.id).await
    }

    /// Fetches one contract. Restricted to its owner and admins.
    pub async fn contract_by_id(&self, principal: &Principal, contract_id: i64) -> Result<Contract, MarketplaceError> {
        let contract = self.db.fetch_contract(contract_id).await?.ok_or(MarketplaceError::ContractNotFound)?;
        if !principal.is_admin() && contract.user_id != principal.id {
            return Err(MarketplaceError::NotAuthorized("you may not view this contract".into()));
        }
        Ok(contract)
    }

    /// The acting user's active contract with the given lounge, if one exists.
    pub async fn active_contract_for_lounge(
        &self,
        principal: &Principal,
        lounge_id: i64,
    ) -> Result<Option<Contract>, MarketplaceError> {
        self.db.active_contract_for_lounge(principal.id, lounge_id).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
