//! Reconciliation orchestrator.
//!
//! Sequences locating, materializing, extracting, group writes and totals for
//! every lifecycle event. Group writes and totals of one target always run
//! under that target's lock.

use std::collections::{BTreeMap, BTreeSet};

use landed_shared::ReconcileConfig;
use landed_shared::types::{CompanyId, CurrencyCode, InvoiceId, VoucherId};
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::report::{FailureScope, RefreshOutcome, RunReport};
use crate::apportion::apportion_candidates;
use crate::document::{AllocationCandidate, AllocationTotals, ChargeVoucher, Invoice, SourceRef};
use crate::error::{ReconcileError, ReconcileResult};
use crate::extract::{AllocationExtractor, ExtractOptions};
use crate::ledger::{AllocationLedger, TargetLocks};
use crate::locator::SourceLocator;
use crate::materialize::{ChargeCheck, Materializer, check_charges};
use crate::ports::{DocumentStore, ExchangeRates, InvoiceLifecycle, PartyAccounts, TaxService};
use crate::totals::TotalsAggregator;

/// The external collaborators a reconciler works against.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    /// Document storage.
    pub store: &'a dyn DocumentStore,
    /// Invoice creation and lifecycle.
    pub lifecycle: &'a dyn InvoiceLifecycle,
    /// Itemised tax computation.
    pub taxes: &'a dyn TaxService,
    /// Exchange rates.
    pub rates: &'a dyn ExchangeRates,
    /// Party accounts.
    pub parties: &'a dyn PartyAccounts,
}

/// Entry point for lifecycle events and manual refreshes.
///
/// A single reconciler may be shared between threads; its target locks
/// serialize work on the same invoice.
pub struct Reconciler<'a> {
    store: &'a dyn DocumentStore,
    lifecycle: &'a dyn InvoiceLifecycle,
    locator: SourceLocator<'a>,
    extractor: AllocationExtractor<'a>,
    ledger: AllocationLedger<'a>,
    totals: TotalsAggregator<'a>,
    materializer: Materializer<'a>,
    locks: TargetLocks,
    config: ReconcileConfig,
}

impl<'a> Reconciler<'a> {
    /// Creates a reconciler.
    #[must_use]
    pub fn new(collaborators: Collaborators<'a>, config: ReconcileConfig) -> Self {
        let Collaborators {
            store,
            lifecycle,
            taxes,
            rates,
            parties,
        } = collaborators;
        Self {
            store,
            lifecycle,
            locator: SourceLocator::new(store),
            extractor: AllocationExtractor::new(taxes, ExtractOptions::from(&config)),
            ledger: AllocationLedger::new(store),
            totals: TotalsAggregator::new(store),
            materializer: Materializer::new(
                store,
                lifecycle,
                rates,
                parties,
                config.exchange_rate_policy,
            ),
            locks: TargetLocks::new(),
            config,
        }
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Handles the submission of a voucher or a cost invoice.
    ///
    /// # Errors
    ///
    /// Fails only when the source itself cannot be processed (missing, not
    /// submitted, misconfigured). Failures of individual groups, suppliers
    /// and targets are collected in the returned report.
    pub fn on_source_submit(&self, source: &SourceRef) -> ReconcileResult<RunReport> {
        match source {
            SourceRef::ChargeVoucher(id) => self.submit_voucher(id),
            SourceRef::Invoice(id) => self.submit_invoice(id),
        }
    }

    /// Handles the cancellation of a voucher or a cost invoice.
    ///
    /// # Errors
    ///
    /// Fails only when the source document cannot be loaded.
    pub fn on_source_cancel(&self, source: &SourceRef) -> ReconcileResult<RunReport> {
        match source {
            SourceRef::ChargeVoucher(id) => self.cancel_voucher(id),
            SourceRef::Invoice(id) => self.cancel_invoice(id),
        }
    }

    /// Re-runs submit-time reconciliation for every live source of a draft target.
    ///
    /// Vouchers whose primary target is `target` are materialized first, so
    /// supplier groups that failed earlier get billed once their cause is
    /// fixed. A non-draft target only gets its totals recomputed. Groups whose
    /// source is no longer live are dropped.
    ///
    /// # Errors
    ///
    /// Fails if the target does not exist or its sources cannot be located.
    pub fn refresh(&self, target: &InvoiceId) -> ReconcileResult<RefreshOutcome> {
        let invoice = self.load_invoice(target)?;
        let mut report = RunReport::new();

        if !invoice.status.is_draft() {
            let totals = self.refresh_totals(target)?;
            report.totals.insert(target.clone(), totals);
            debug!(target = %target, "Target is not a draft, totals recomputed only");
            return Ok(RefreshOutcome {
                rows_written: 0,
                totals,
                report,
            });
        }

        let mut live: BTreeSet<SourceRef> = BTreeSet::new();

        for voucher_id in self.locator.find_charge_vouchers(target)? {
            let source = SourceRef::ChargeVoucher(voucher_id.clone());
            live.insert(source.clone());
            let prepared = self
                .load_voucher(&voucher_id)
                .and_then(|voucher| self.prepare_voucher(voucher))
                .and_then(|(voucher, targets, base)| {
                    let voucher = match targets.first() {
                        Some((primary, _)) if primary == target => {
                            self.materialize_voucher(&voucher.id, primary, &base, &mut report)?
                        }
                        _ => voucher,
                    };
                    Ok((voucher, targets, base))
                });
            match prepared {
                Ok((voucher, targets, base)) => live.extend(self.reconcile_voucher(
                    &voucher,
                    &targets,
                    &base,
                    Some(target),
                    &mut report,
                )),
                Err(e) => report.fail(
                    FailureScope::Group {
                        target: target.clone(),
                        source,
                    },
                    e,
                ),
            }
        }

        for secondary in self.locator.find_secondary_invoices(target)? {
            let source = SourceRef::Invoice(secondary.clone());
            if !live.insert(source.clone()) {
                continue;
            }
            match self.load_invoice(&secondary) {
                Ok(invoice) => {
                    let _guard = self.locks.acquire(target);
                    self.write_invoice_group(&invoice, target, &mut report);
                }
                Err(e) => report.fail(
                    FailureScope::Group {
                        target: target.clone(),
                        source,
                    },
                    e,
                ),
            }
        }

        let _guard = self.locks.acquire(target);
        self.prune_stale_groups(target, &live, &mut report)?;
        let totals = self.totals.recompute_totals(target)?;
        report.totals.insert(target.clone(), totals);

        let rows_written = report.rows_written();
        info!(
            target = %target,
            sources = live.len(),
            rows_written,
            failures = report.failures.len(),
            "Allocations refreshed"
        );
        Ok(RefreshOutcome {
            rows_written,
            totals,
            report,
        })
    }

    /// Recomputes the totals of any invoice, whatever its status.
    ///
    /// # Errors
    ///
    /// Returns a `Collaborator` error if the store fails.
    pub fn refresh_totals(&self, target: &InvoiceId) -> ReconcileResult<AllocationTotals> {
        let _guard = self.locks.acquire(target);
        self.totals.recompute_totals(target)
    }

    /// Rewrites the group of a submitted cost invoice on its original invoice.
    ///
    /// Unlike `on_source_submit`, every precondition is a hard error.
    ///
    /// # Errors
    ///
    /// - `InvoiceNotFound` if the invoice or its original invoice is missing
    /// - `NoOriginalInvoice` if the invoice is not a cost invoice
    /// - `SourceNotSubmitted` if the invoice is not submitted
    /// - any ledger or totals error
    pub fn recalculate_from_invoice(&self, id: &InvoiceId) -> ReconcileResult<RunReport> {
        let invoice = self.load_invoice(id)?;
        let target = invoice
            .original_invoice
            .clone()
            .ok_or_else(|| ReconcileError::NoOriginalInvoice(id.clone()))?;
        self.load_invoice(&target)?;
        let source = SourceRef::Invoice(id.clone());
        if !invoice.status.is_submitted() {
            return Err(ReconcileError::SourceNotSubmitted(source));
        }

        let mut report = RunReport::new();
        let _guard = self.locks.acquire(&target);
        let extraction = self.extractor.from_invoice(&invoice);
        report.warnings.extend(extraction.warnings);
        report
            .groups
            .push(self.ledger.replace_group(&target, &source, extraction.rows)?);
        let totals = self.totals.recompute_totals(&target)?;
        report.totals.insert(target, totals);
        Ok(report)
    }

    /// Readiness report for a voucher's externally funded rows.
    ///
    /// # Errors
    ///
    /// Returns `VoucherNotFound` if the voucher is missing.
    pub fn check_charges(&self, id: &VoucherId) -> ReconcileResult<ChargeCheck> {
        Ok(check_charges(&self.load_voucher(id)?))
    }

    fn submit_voucher(&self, id: &VoucherId) -> ReconcileResult<RunReport> {
        let voucher = self.load_voucher(id)?;
        if !voucher.status.is_submitted() {
            return Err(ReconcileError::SourceNotSubmitted(SourceRef::ChargeVoucher(
                id.clone(),
            )));
        }
        let (_, targets, base) = self.prepare_voucher(voucher)?;
        let mut report = RunReport::new();

        let Some((primary, _)) = targets.first() else {
            info!(voucher = %id, "Voucher has no invoice targets");
            return Ok(report);
        };

        let voucher = self.materialize_voucher(id, primary, &base, &mut report)?;
        self.reconcile_voucher(&voucher, &targets, &base, None, &mut report);
        info!(
            voucher = %id,
            targets = targets.len(),
            created = report.created_invoices.len(),
            rows_written = report.rows_written(),
            failures = report.failures.len(),
            "Voucher reconciled"
        );
        Ok(report)
    }

    fn submit_invoice(&self, id: &InvoiceId) -> ReconcileResult<RunReport> {
        let invoice = self.load_invoice(id)?;
        if !invoice.status.is_submitted() {
            return Err(ReconcileError::SourceNotSubmitted(SourceRef::Invoice(
                id.clone(),
            )));
        }
        let mut report = RunReport::new();
        let Some(target) = invoice.original_invoice.clone() else {
            debug!(invoice = %id, "Invoice has no original invoice, nothing to allocate");
            return Ok(report);
        };

        let _guard = self.locks.acquire(&target);
        if self.write_invoice_group(&invoice, &target, &mut report) {
            self.recompute(&target, &mut report);
        }
        Ok(report)
    }

    fn cancel_voucher(&self, id: &VoucherId) -> ReconcileResult<RunReport> {
        let voucher = self.load_voucher(id)?;
        let targets = voucher.invoice_target_ids();
        let mut report = RunReport::new();

        // Groups to retract, per target.
        let mut retract: BTreeMap<InvoiceId, Vec<SourceRef>> = targets
            .iter()
            .map(|target| (target.clone(), vec![SourceRef::ChargeVoucher(id.clone())]))
            .collect();

        let secondaries = match self.materializer.secondary_invoices(&voucher) {
            Ok(found) => found,
            Err(e) => {
                report.fail(FailureScope::Voucher(id.clone()), e);
                BTreeSet::new()
            }
        };
        for secondary in secondaries {
            let invoice = match self.load_invoice(&secondary) {
                Ok(invoice) => invoice,
                Err(e) => {
                    report.fail(FailureScope::Invoice(secondary), e);
                    continue;
                }
            };
            if invoice.status.is_live() {
                if let Err(e) = self.lifecycle.cancel(&secondary) {
                    report.fail(
                        FailureScope::Invoice(secondary.clone()),
                        ReconcileError::collaborator(format!("Cancelling invoice {secondary}"), e),
                    );
                    continue;
                }
                info!(invoice = %secondary, voucher = %id, "Secondary invoice cancelled");
                report.cancelled_invoices.push(secondary.clone());
            }
            if let Some(target) = invoice.original_invoice.or_else(|| targets.first().cloned()) {
                retract
                    .entry(target)
                    .or_default()
                    .push(SourceRef::Invoice(secondary));
            }
        }

        for (target, sources) in retract {
            let _guard = self.locks.acquire(&target);
            let mut retracted = false;
            for source in sources {
                match self.ledger.retract_group(&target, &source) {
                    Ok(write) => {
                        report.groups.push(write);
                        retracted = true;
                    }
                    Err(e) => report.fail(
                        FailureScope::Group {
                            target: target.clone(),
                            source,
                        },
                        e,
                    ),
                }
            }
            if retracted {
                self.recompute(&target, &mut report);
            }
        }

        info!(
            voucher = %id,
            cancelled = report.cancelled_invoices.len(),
            failures = report.failures.len(),
            "Voucher cancellation reconciled"
        );
        Ok(report)
    }

    fn cancel_invoice(&self, id: &InvoiceId) -> ReconcileResult<RunReport> {
        let invoice = self.load_invoice(id)?;
        let mut report = RunReport::new();
        let Some(target) = invoice.original_invoice else {
            debug!(invoice = %id, "Invoice has no original invoice, nothing to retract");
            return Ok(report);
        };

        let source = SourceRef::Invoice(id.clone());
        let _guard = self.locks.acquire(&target);
        match self.ledger.retract_group(&target, &source) {
            Ok(write) => {
                report.groups.push(write);
                self.recompute(&target, &mut report);
            }
            Err(e) => report.fail(FailureScope::Group { target, source }, e),
        }
        Ok(report)
    }

    /// Bills the voucher's funded rows against `primary` and returns the
    /// voucher as stored afterwards.
    ///
    /// Runs under the primary target's lock and reads the voucher inside it,
    /// so two runs on one voucher never both miss an existing invoice.
    fn materialize_voucher(
        &self,
        id: &VoucherId,
        primary: &InvoiceId,
        base_currency: &CurrencyCode,
        report: &mut RunReport,
    ) -> ReconcileResult<ChargeVoucher> {
        let _guard = self.locks.acquire(primary);
        let voucher = self.load_voucher(id)?;
        self.materializer
            .materialize(&voucher, primary, base_currency, report);
        // Materialization links rows to new invoices; work on the stored state.
        self.load_voucher(id)
    }

    /// Validates a submitted voucher's links and resolves its base currency.
    fn prepare_voucher(
        &self,
        voucher: ChargeVoucher,
    ) -> ReconcileResult<(ChargeVoucher, Vec<(InvoiceId, Decimal)>, CurrencyCode)> {
        let targets = voucher.invoice_targets()?;
        let base = self.base_currency(&voucher.company)?;
        Ok((voucher, targets, base))
    }

    /// Writes the voucher's groups on every target (or only on `scope`).
    ///
    /// The voucher's own charges are apportioned across its targets; its
    /// submitted secondary invoices are written on the primary target.
    /// Returns the sources considered live on the processed targets.
    fn reconcile_voucher(
        &self,
        voucher: &ChargeVoucher,
        targets: &[(InvoiceId, Decimal)],
        base_currency: &CurrencyCode,
        scope: Option<&InvoiceId>,
        report: &mut RunReport,
    ) -> BTreeSet<SourceRef> {
        let mut live = BTreeSet::new();
        let voucher_source = SourceRef::ChargeVoucher(voucher.id.clone());
        let in_scope = |target: &InvoiceId| scope.is_none_or(|only| only == target);

        let own = self.extractor.from_voucher(voucher, base_currency);
        let weights: Vec<Decimal> = targets.iter().map(|(_, weight)| *weight).collect();
        let mut shares: Vec<Vec<AllocationCandidate>> =
            match apportion_candidates(&own, &weights, self.config.amount_precision) {
                Ok(shares) => shares,
                Err(e) => {
                    for (target, _) in targets.iter().filter(|(t, _)| in_scope(t)) {
                        live.insert(voucher_source.clone());
                        report.fail(
                            FailureScope::Group {
                                target: target.clone(),
                                source: voucher_source.clone(),
                            },
                            ReconcileError::Apportion(e.clone()),
                        );
                    }
                    return live;
                }
            };

        for (position, (target, _)) in targets.iter().enumerate() {
            if !in_scope(target) {
                continue;
            }
            let _guard = self.locks.acquire(target);
            let mut changed = false;

            live.insert(voucher_source.clone());
            let candidates = std::mem::take(&mut shares[position]);
            changed |= self.write_group(target, &voucher_source, candidates, report);

            if position == 0 {
                for invoice in self.linked_secondaries(voucher, target, report) {
                    live.insert(SourceRef::Invoice(invoice.id.clone()));
                    changed |= self.write_invoice_group(&invoice, target, report);
                }
            }

            if changed {
                self.recompute(target, report);
            }
        }
        live
    }

    /// Submitted secondary invoices of `voucher` whose original invoice is `target`.
    fn linked_secondaries(
        &self,
        voucher: &ChargeVoucher,
        target: &InvoiceId,
        report: &mut RunReport,
    ) -> Vec<Invoice> {
        let ids = match self.materializer.secondary_invoices(voucher) {
            Ok(ids) => ids,
            Err(e) => {
                report.fail(FailureScope::Invoice(target.clone()), e);
                return Vec::new();
            }
        };

        let mut invoices = Vec::new();
        for id in ids {
            match self.store.invoice(&id) {
                Ok(Some(invoice))
                    if invoice.status.is_submitted()
                        && invoice.original_invoice.as_ref() == Some(target) =>
                {
                    invoices.push(invoice);
                }
                Ok(Some(_)) => debug!(invoice = %id, "Secondary invoice not submitted, skipped"),
                Ok(None) => debug!(invoice = %id, "Secondary invoice no longer exists"),
                Err(e) => report.fail(
                    FailureScope::Invoice(id.clone()),
                    ReconcileError::collaborator(format!("Loading invoice {id}"), e),
                ),
            }
        }
        invoices
    }

    /// Extracts and writes a cost invoice's group. Caller holds the target lock.
    fn write_invoice_group(
        &self,
        invoice: &Invoice,
        target: &InvoiceId,
        report: &mut RunReport,
    ) -> bool {
        let extraction = self.extractor.from_invoice(invoice);
        report.warnings.extend(extraction.warnings);
        self.write_group(
            target,
            &SourceRef::Invoice(invoice.id.clone()),
            extraction.rows,
            report,
        )
    }

    /// Replaces one group, recording the outcome. Caller holds the target lock.
    fn write_group(
        &self,
        target: &InvoiceId,
        source: &SourceRef,
        candidates: Vec<AllocationCandidate>,
        report: &mut RunReport,
    ) -> bool {
        match self.ledger.replace_group(target, source, candidates) {
            Ok(write) => {
                report.groups.push(write);
                true
            }
            Err(e) => {
                report.fail(
                    FailureScope::Group {
                        target: target.clone(),
                        source: source.clone(),
                    },
                    e,
                );
                false
            }
        }
    }

    /// Drops groups whose source is not in `live`. Caller holds the target lock.
    fn prune_stale_groups(
        &self,
        target: &InvoiceId,
        live: &BTreeSet<SourceRef>,
        report: &mut RunReport,
    ) -> ReconcileResult<()> {
        let stale: BTreeSet<SourceRef> = self
            .store
            .allocation_rows(target)
            .map_err(|e| {
                ReconcileError::collaborator(format!("Loading allocation rows of {target}"), e)
            })?
            .into_iter()
            .map(|row| row.source)
            .filter(|source| !live.contains(source))
            .collect();

        for source in stale {
            info!(target = %target, source = %source, "Dropping group of a source that is no longer live");
            self.write_group(target, &source, Vec::new(), report);
        }
        Ok(())
    }

    /// Recomputes totals, recording the outcome. Caller holds the target lock.
    fn recompute(&self, target: &InvoiceId, report: &mut RunReport) {
        match self.totals.recompute_totals(target) {
            Ok(totals) => {
                report.totals.insert(target.clone(), totals);
            }
            Err(e) => report.fail(FailureScope::Invoice(target.clone()), e),
        }
    }

    fn base_currency(&self, company: &CompanyId) -> ReconcileResult<CurrencyCode> {
        self.store
            .company_currency(company)
            .map_err(|e| {
                ReconcileError::collaborator(format!("Loading base currency of {company}"), e)
            })?
            .ok_or_else(|| ReconcileError::CompanyCurrencyMissing(company.clone()))
    }

    fn load_invoice(&self, id: &InvoiceId) -> ReconcileResult<Invoice> {
        self.store
            .invoice(id)
            .map_err(|e| ReconcileError::collaborator(format!("Loading invoice {id}"), e))?
            .ok_or_else(|| ReconcileError::InvoiceNotFound(id.clone()))
    }

    fn load_voucher(&self, id: &VoucherId) -> ReconcileResult<ChargeVoucher> {
        self.store
            .charge_voucher(id)
            .map_err(|e| ReconcileError::collaborator(format!("Loading charge voucher {id}"), e))?
            .ok_or_else(|| ReconcileError::VoucherNotFound(id.clone()))
    }
}
