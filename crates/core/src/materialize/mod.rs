//! Secondary invoice materialization.
//!
//! Externally funded charge rows are billed to their supplier on a secondary
//! invoice whose `original_invoice` is the voucher's primary target. One
//! invoice is created per (supplier, currency) group. Every group is its own
//! checkpoint: a failing group never undoes the invoices of earlier groups.

mod check;
mod grouping;

pub use check::{ChargeCheck, InvoicedRow, check_charges};
pub use grouping::{ChargeEntry, ChargeGrouping, GroupKey, SupplierGroup, group_charges};

use std::collections::BTreeSet;

use chrono::NaiveDate;
use landed_shared::ExchangeRatePolicy;
use landed_shared::types::{AccountId, CompanyId, CurrencyCode, InvoiceId, SupplierId};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::document::{ChargeRow, ChargeRowRef, ChargeVoucher, Invoice};
use crate::error::{ReconcileError, ReconcileResult};
use crate::ports::{
    DocumentStore, DraftLine, ExchangeRates, InvoiceLifecycle, PartyAccounts,
    SecondaryInvoiceDraft,
};
use crate::reconcile::{FailureScope, RunReport};

/// Creates, submits and links secondary invoices.
pub struct Materializer<'a> {
    store: &'a dyn DocumentStore,
    lifecycle: &'a dyn InvoiceLifecycle,
    rates: &'a dyn ExchangeRates,
    parties: &'a dyn PartyAccounts,
    policy: ExchangeRatePolicy,
}

impl<'a> Materializer<'a> {
    /// Creates a materializer.
    #[must_use]
    pub fn new(
        store: &'a dyn DocumentStore,
        lifecycle: &'a dyn InvoiceLifecycle,
        rates: &'a dyn ExchangeRates,
        parties: &'a dyn PartyAccounts,
        policy: ExchangeRatePolicy,
    ) -> Self {
        Self {
            store,
            lifecycle,
            rates,
            parties,
            policy,
        }
    }

    /// Bills the externally funded rows of `voucher` against `target`.
    ///
    /// Rows already billed by a live invoice are skipped (a linked draft is
    /// submitted so an interrupted run resumes). Everything done or failed
    /// is recorded in `report`.
    pub fn materialize(
        &self,
        voucher: &ChargeVoucher,
        target: &InvoiceId,
        base_currency: &CurrencyCode,
        report: &mut RunReport,
    ) {
        let mut to_bill: Vec<&ChargeRow> = Vec::new();
        for row in voucher.charges.iter().filter(|row| row.externally_funded) {
            let origin = row.row_ref(&voucher.id);
            match self.existing_invoice(row, &origin) {
                Ok(Some(existing)) => self.resume(&origin, row, &existing, report),
                Ok(None) => to_bill.push(row),
                Err(e) => report.fail(FailureScope::ChargeRow(origin), e),
            }
        }

        let grouping = group_charges(&voucher.id, to_bill, base_currency);
        for error in grouping.unassigned {
            let scope = match &error {
                ReconcileError::MissingChargeField { idx, .. } => {
                    FailureScope::ChargeRow(ChargeRowRef {
                        voucher: voucher.id.clone(),
                        idx: *idx,
                    })
                }
                _ => FailureScope::Invoice(target.clone()),
            };
            report.fail(scope, error);
        }

        for ((supplier, currency), group) in grouping.groups {
            let scope = FailureScope::Supplier {
                supplier: supplier.clone(),
                currency: currency.clone(),
            };
            if !group.is_valid() {
                for error in group.invalid {
                    report.fail(scope.clone(), error);
                }
                continue;
            }
            if let Err(e) =
                self.bill_group(voucher, target, base_currency, &supplier, &currency, group, report)
            {
                report.fail(scope, e);
            }
        }
    }

    /// All invoices (any status) billing a charge of `voucher`.
    ///
    /// Combines the cached row links with the store's charge-origin lookup.
    ///
    /// # Errors
    ///
    /// Returns a `Collaborator` error if the store fails.
    pub fn secondary_invoices(&self, voucher: &ChargeVoucher) -> ReconcileResult<BTreeSet<InvoiceId>> {
        let mut found = BTreeSet::new();
        for row in voucher.charges.iter().filter(|row| row.externally_funded) {
            if let Some(linked) = row.secondary_invoice.as_ref().filter(|id| !id.is_blank()) {
                found.insert(linked.clone());
            }
            let origin = row.row_ref(&voucher.id);
            found.extend(self.invoices_billing(&origin)?);
        }
        Ok(found)
    }

    fn invoices_billing(&self, origin: &ChargeRowRef) -> ReconcileResult<Vec<InvoiceId>> {
        self.store.invoices_with_charge_origin(origin).map_err(|e| {
            ReconcileError::collaborator(
                format!("Finding invoices of charge voucher {} row {}", origin.voucher, origin.idx),
                e,
            )
        })
    }

    fn load_invoice(&self, id: &InvoiceId) -> ReconcileResult<Option<Invoice>> {
        self.store
            .invoice(id)
            .map_err(|e| ReconcileError::collaborator(format!("Loading invoice {id}"), e))
    }

    /// The live invoice already billing `row`, if any.
    fn existing_invoice(
        &self,
        row: &ChargeRow,
        origin: &ChargeRowRef,
    ) -> ReconcileResult<Option<Invoice>> {
        if let Some(linked) = row.secondary_invoice.as_ref().filter(|id| !id.is_blank()) {
            match self.load_invoice(linked)? {
                Some(invoice) if invoice.status.is_live() => return Ok(Some(invoice)),
                Some(_) => debug!(invoice = %linked, row = origin.idx, "Linked invoice is cancelled"),
                None => debug!(invoice = %linked, row = origin.idx, "Linked invoice no longer exists"),
            }
        }

        // The cached link may not be persisted yet; ask the store directly.
        for id in self.invoices_billing(origin)? {
            if let Some(invoice) = self.load_invoice(&id)? {
                if invoice.status.is_live() {
                    return Ok(Some(invoice));
                }
            }
        }
        Ok(None)
    }

    fn resume(
        &self,
        origin: &ChargeRowRef,
        row: &ChargeRow,
        existing: &Invoice,
        report: &mut RunReport,
    ) {
        if row.secondary_invoice.as_ref() != Some(&existing.id) {
            if let Err(e) = self.store.link_charge_row(origin, &existing.id) {
                report.fail(
                    FailureScope::ChargeRow(origin.clone()),
                    ReconcileError::collaborator(format!("Linking invoice {}", existing.id), e),
                );
            }
        }
        if existing.status.is_draft() {
            match self.lifecycle.submit(&existing.id) {
                Ok(()) => {
                    info!(invoice = %existing.id, "Resumed submission of secondary invoice");
                    report.submitted_invoices.push(existing.id.clone());
                }
                Err(e) => report.fail(
                    FailureScope::Invoice(existing.id.clone()),
                    ReconcileError::collaborator(format!("Submitting invoice {}", existing.id), e),
                ),
            }
        }
        report.already_invoiced.push(InvoicedRow {
            idx: origin.idx,
            invoice: existing.id.clone(),
        });
    }

    fn payable_account(
        &self,
        supplier: &SupplierId,
        company: &CompanyId,
    ) -> ReconcileResult<AccountId> {
        self.parties
            .payable_account(supplier, company)
            .map_err(|e| {
                ReconcileError::collaborator(format!("Resolving payable account of {supplier}"), e)
            })?
            .ok_or_else(|| ReconcileError::PayableAccountMissing {
                supplier: supplier.clone(),
                company: company.clone(),
            })
    }

    /// Rate converting `currency` into `base_currency`, subject to the policy.
    fn conversion_rate(
        &self,
        currency: &CurrencyCode,
        base_currency: &CurrencyCode,
        as_of: NaiveDate,
        report: &mut RunReport,
    ) -> ReconcileResult<Decimal> {
        if currency == base_currency {
            return Ok(Decimal::ONE);
        }

        let unresolved = || ReconcileError::NoExchangeRate {
            from: currency.clone(),
            to: base_currency.clone(),
            date: as_of,
        };
        let resolved = match self.rates.exchange_rate(currency, base_currency, as_of) {
            Ok(rate) if rate > Decimal::ZERO => return Ok(rate),
            Ok(_) => unresolved(),
            Err(e) => {
                debug!(from = %currency, to = %base_currency, error = %e, "Exchange rate lookup failed");
                unresolved()
            }
        };

        match self.policy {
            ExchangeRatePolicy::Strict => Err(resolved),
            ExchangeRatePolicy::FallbackToOne => {
                warn!(
                    from = %currency,
                    to = %base_currency,
                    date = %as_of,
                    "No exchange rate found, falling back to 1"
                );
                report.warnings.push(resolved);
                Ok(Decimal::ONE)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn bill_group(
        &self,
        voucher: &ChargeVoucher,
        target: &InvoiceId,
        base_currency: &CurrencyCode,
        supplier: &SupplierId,
        currency: &CurrencyCode,
        group: SupplierGroup,
        report: &mut RunReport,
    ) -> ReconcileResult<()> {
        let payable_account = self.payable_account(supplier, &voucher.company)?;
        let conversion_rate =
            self.conversion_rate(currency, base_currency, voucher.posting_date, report)?;

        let origins: Vec<ChargeRowRef> = group.entries.iter().map(|e| e.origin.clone()).collect();
        let draft = SecondaryInvoiceDraft {
            company: voucher.company.clone(),
            supplier: supplier.clone(),
            payable_account,
            currency: currency.clone(),
            conversion_rate,
            posting_date: voucher.posting_date,
            original_invoice: target.clone(),
            lines: group
                .entries
                .into_iter()
                .map(|entry| DraftLine {
                    item_code: entry.service_item,
                    qty: Decimal::ONE,
                    rate: entry.amount,
                    charge_origin: entry.origin,
                })
                .collect(),
        };

        let invoice = self.lifecycle.create(draft).map_err(|e| {
            ReconcileError::collaborator(format!("Creating invoice for supplier {supplier}"), e)
        })?;
        report.created_invoices.push(invoice.clone());
        info!(
            invoice = %invoice,
            supplier = %supplier,
            currency = %currency,
            voucher = %voucher.id,
            rows = origins.len(),
            "Secondary invoice created"
        );

        // Link before submitting so a failed submit is resumed, not duplicated.
        for origin in &origins {
            if let Err(e) = self.store.link_charge_row(origin, &invoice) {
                report.fail(
                    FailureScope::ChargeRow(origin.clone()),
                    ReconcileError::collaborator(format!("Linking invoice {invoice}"), e),
                );
            }
        }

        self.lifecycle.submit(&invoice).map_err(|e| {
            ReconcileError::collaborator(format!("Submitting invoice {invoice}"), e)
        })?;
        report.submitted_invoices.push(invoice);
        Ok(())
    }
}
