//! Grouping externally funded charges by (supplier, currency).

use std::collections::BTreeMap;

use landed_shared::types::{CurrencyCode, ItemCode, SupplierId, VoucherId};
use rust_decimal::Decimal;

use super::check::missing_fields;
use crate::document::{ChargeRow, ChargeRowRef};
use crate::error::ReconcileError;

/// One charge row to bill on a secondary invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeEntry {
    /// Row being billed.
    pub origin: ChargeRowRef,
    /// Service item billed.
    pub service_item: ItemCode,
    /// Amount in transaction currency.
    pub amount: Decimal,
}

/// Charges billed by one supplier in one currency.
#[derive(Debug, Default)]
pub struct SupplierGroup {
    /// Billable entries in row order.
    pub entries: Vec<ChargeEntry>,
    /// Rows of this group with missing fields; any entry here fails the group.
    pub invalid: Vec<ReconcileError>,
}

impl SupplierGroup {
    /// Returns true if every row of the group is complete.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.invalid.is_empty()
    }
}

/// Key of a supplier group.
pub type GroupKey = (SupplierId, CurrencyCode);

/// Output of `group_charges`.
#[derive(Debug, Default)]
pub struct ChargeGrouping {
    /// Groups keyed by (supplier, currency).
    pub groups: BTreeMap<GroupKey, SupplierGroup>,
    /// Rows without a supplier, which belong to no group.
    pub unassigned: Vec<ReconcileError>,
}

/// Groups externally funded rows by (supplier, transaction currency).
///
/// Pure: the caller decides which rows take part. A row missing its supplier
/// fails on its own; a row missing its item or amount invalidates its group.
#[must_use]
pub fn group_charges<'r>(
    voucher: &VoucherId,
    rows: impl IntoIterator<Item = &'r ChargeRow>,
    base_currency: &CurrencyCode,
) -> ChargeGrouping {
    let mut grouping = ChargeGrouping::default();

    for row in rows.into_iter().filter(|row| row.externally_funded) {
        let Some(supplier) = row.billing_supplier() else {
            grouping.unassigned.extend(missing_fields(row));
            continue;
        };
        let key = (supplier.clone(), row.currency_or(base_currency).clone());
        let group = grouping.groups.entry(key).or_default();

        match row.item() {
            Some(item) if !row.amount.is_zero() => group.entries.push(ChargeEntry {
                origin: row.row_ref(voucher),
                service_item: item.clone(),
                amount: row.amount,
            }),
            _ => group.invalid.extend(missing_fields(row)),
        }
    }

    grouping
}
