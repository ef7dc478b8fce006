//! Allocation rows contributed by a cost invoice's line items.

use rust_decimal::Decimal;
use tracing::warn;

use super::tax::{base_tax_from_rates, itemised_base_tax, rate_sum};
use super::{ExtractOptions, Extraction};
use crate::document::{AllocationCandidate, Invoice, InvoiceItem, TaxRow};
use crate::error::ReconcileError;
use crate::ports::{ItemisedTax, TaxService};

/// Itemised tax of an invoice, fetched on first use.
struct ItemisedLookup<'a> {
    taxes: &'a dyn TaxService,
    rows: Vec<TaxRow>,
    cached: Option<ItemisedTax>,
}

impl<'a> ItemisedLookup<'a> {
    fn new(taxes: &'a dyn TaxService, invoice: &Invoice, options: &ExtractOptions) -> Self {
        let rows = invoice
            .taxes
            .iter()
            .filter(|row| !options.excluded_tax_accounts.contains(&row.account_head))
            .cloned()
            .collect();
        Self {
            taxes,
            rows,
            cached: None,
        }
    }

    fn base_tax(&mut self, invoice: &Invoice, key: &str, warnings: &mut Vec<ReconcileError>) -> Decimal {
        if self.rows.is_empty() {
            return Decimal::ZERO;
        }
        if self.cached.is_none() {
            match self.taxes.itemised_tax(&self.rows) {
                Ok(itemised) => self.cached = Some(itemised),
                Err(e) => {
                    warn!(invoice = %invoice.id, error = %e, "Itemised tax unavailable, tax defaults to zero");
                    warnings.push(ReconcileError::collaborator(
                        format!("Computing itemised tax of invoice {}", invoice.id),
                        e,
                    ));
                    self.cached = Some(ItemisedTax::new());
                }
            }
        }
        let Some(itemised) = self.cached.as_ref() else {
            return Decimal::ZERO;
        };
        itemised_base_tax(itemised, key).unwrap_or_else(|| {
            warn!(invoice = %invoice.id, item = %key, "Itemised tax overflows, tax defaults to zero");
            warnings.push(ReconcileError::Overflow(format!(
                "summing itemised tax of {key} on invoice {}",
                invoice.id
            )));
            Decimal::ZERO
        })
    }
}

fn rate_tax(
    invoice: &Invoice,
    item: &InvoiceItem,
    warnings: &mut Vec<ReconcileError>,
) -> Decimal {
    let Some(text) = item.item_tax_rate.as_deref() else {
        return Decimal::ZERO;
    };
    let computed = rate_sum(text).and_then(|sum| {
        base_tax_from_rates(item.base_net_amount, sum).ok_or_else(|| {
            format!("tax of {sum}% on {} overflows", item.base_net_amount)
        })
    });
    match computed {
        Ok(tax) => tax,
        Err(reason) => {
            let key = item.tax_key().unwrap_or_default().to_string();
            warn!(invoice = %invoice.id, item = %key, %reason, "Malformed item tax rate");
            warnings.push(ReconcileError::MalformedTaxRate { item: key, reason });
            Decimal::ZERO
        }
    }
}

/// One candidate per line with an item code and a positive base net amount.
pub fn invoice_candidates(
    invoice: &Invoice,
    taxes: &dyn TaxService,
    options: &ExtractOptions,
) -> Extraction {
    let mut extraction = Extraction::default();
    let mut itemised = ItemisedLookup::new(taxes, invoice, options);

    for item in &invoice.items {
        let Some(code) = item.code() else { continue };
        if item.base_net_amount <= Decimal::ZERO {
            continue;
        }

        let mut base_tax = rate_tax(invoice, item, &mut extraction.warnings);
        if base_tax.is_zero() {
            if let Some(key) = item.tax_key() {
                base_tax = itemised.base_tax(invoice, key, &mut extraction.warnings);
            }
        }

        extraction.rows.push(AllocationCandidate {
            service_item: code.clone(),
            base_amount: item.base_net_amount,
            base_tax_amount: base_tax,
            amount: item.amount,
            currency: invoice.currency.clone(),
        });
    }

    extraction
}
