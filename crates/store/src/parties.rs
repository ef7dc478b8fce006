//! Supplier payable accounts.

use std::collections::BTreeMap;

use landed_core::ports::PartyAccounts;
use landed_shared::AppResult;
use landed_shared::types::{AccountId, CompanyId, SupplierId};

/// Payable accounts per supplier and company, with per-company defaults.
#[derive(Debug, Clone, Default)]
pub struct StaticParties {
    supplier_accounts: BTreeMap<(SupplierId, CompanyId), AccountId>,
    company_defaults: BTreeMap<CompanyId, AccountId>,
}

impl StaticParties {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the payable account of one supplier in one company.
    #[must_use]
    pub fn with_supplier_account(
        mut self,
        supplier: impl Into<SupplierId>,
        company: impl Into<CompanyId>,
        account: impl Into<AccountId>,
    ) -> Self {
        self.supplier_accounts
            .insert((supplier.into(), company.into()), account.into());
        self
    }

    /// Sets the default payable account of a company.
    #[must_use]
    pub fn with_company_default(
        mut self,
        company: impl Into<CompanyId>,
        account: impl Into<AccountId>,
    ) -> Self {
        self.company_defaults.insert(company.into(), account.into());
        self
    }
}

impl PartyAccounts for StaticParties {
    fn payable_account(
        &self,
        supplier: &SupplierId,
        company: &CompanyId,
    ) -> AppResult<Option<AccountId>> {
        Ok(self
            .supplier_accounts
            .get(&(supplier.clone(), company.clone()))
            .or_else(|| self.company_defaults.get(company))
            .cloned())
    }
}
