//! Allocation rows contributed by a voucher's own charges.

use landed_shared::types::CurrencyCode;
use rust_decimal::Decimal;

use crate::document::{AllocationCandidate, ChargeRow, ChargeVoucher};

/// Returns true if the row is carried by the voucher itself.
///
/// Externally funded rows are billed through a secondary invoice and reach
/// the target through that invoice instead.
#[must_use]
pub fn is_own_charge(row: &ChargeRow) -> bool {
    !row.externally_funded && row.item().is_some() && row.base_amount > Decimal::ZERO
}

/// One candidate per own charge row, in row order. Base tax is always zero.
#[must_use]
pub fn voucher_candidates(
    voucher: &ChargeVoucher,
    base_currency: &CurrencyCode,
) -> Vec<AllocationCandidate> {
    voucher
        .charges
        .iter()
        .filter(|row| is_own_charge(row))
        .filter_map(|row| {
            row.item().map(|item| AllocationCandidate {
                service_item: item.clone(),
                base_amount: row.base_amount,
                base_tax_amount: Decimal::ZERO,
                amount: row.amount,
                currency: row.currency_or(base_currency).clone(),
            })
        })
        .collect()
}
