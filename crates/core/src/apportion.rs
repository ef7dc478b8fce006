//! Apportioning charges across several invoice targets.
//!
//! A voucher linked to more than one invoice splits each of its own-funded
//! charges by receipt amount. Shares are computed with the Largest Remainder
//! Method so that the per-target amounts always sum exactly to the charge:
//!
//! 1. Compute exact shares.
//! 2. Round each share toward zero.
//! 3. Hand the leftover units to the shares with the largest fractional parts,
//!    earlier targets first on ties.

use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use thiserror::Error;

use crate::document::AllocationCandidate;

/// Errors raised while apportioning.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApportionError {
    /// There is nothing to apportion across.
    #[error("Cannot apportion across zero targets")]
    NoWeights,

    /// A weight is negative.
    #[error("Apportioning weight {index} is negative: {weight}")]
    NegativeWeight {
        /// Position of the weight.
        index: usize,
        /// The offending weight.
        weight: Decimal,
    },

    /// An intermediate amount does not fit in a decimal.
    #[error("Apportioning {total} overflows")]
    Overflow {
        /// The amount being split.
        total: Decimal,
    },
}

fn checked_sum(values: &[Decimal]) -> Option<Decimal> {
    values.iter().try_fold(Decimal::ZERO, |sum, v| sum.checked_add(*v))
}

/// Splits `total` proportionally to `weights`.
///
/// Shares carry `decimal_places` digits, or the scale of `total` when that is
/// larger, so the total itself is never rounded. All-zero weights split the
/// total equally.
///
/// # Errors
///
/// - `ApportionError::NoWeights` for an empty weight list
/// - `ApportionError::NegativeWeight` for a negative weight
/// - `ApportionError::Overflow` if a share cannot be computed
///
/// # Example
///
/// ```
/// use rust_decimal_macros::dec;
/// use landed_core::apportion::split;
///
/// let shares = split(dec!(100), &[dec!(1), dec!(1), dec!(1)], 2).unwrap();
/// assert_eq!(shares, vec![dec!(33.34), dec!(33.33), dec!(33.33)]);
/// ```
pub fn split(
    total: Decimal,
    weights: &[Decimal],
    decimal_places: u32,
) -> Result<Vec<Decimal>, ApportionError> {
    if weights.is_empty() {
        return Err(ApportionError::NoWeights);
    }
    if let Some((index, weight)) = weights
        .iter()
        .enumerate()
        .find(|(_, weight)| weight.is_sign_negative() && !weight.is_zero())
    {
        return Err(ApportionError::NegativeWeight {
            index,
            weight: *weight,
        });
    }
    if weights.len() == 1 {
        return Ok(vec![total]);
    }

    let overflow = || ApportionError::Overflow { total };

    let weight_sum = checked_sum(weights).ok_or_else(overflow)?;
    let (weights, weight_sum) = if weight_sum.is_zero() {
        (vec![Decimal::ONE; weights.len()], Decimal::from(weights.len()))
    } else {
        (weights.to_vec(), weight_sum)
    };

    let decimal_places = decimal_places.max(total.scale());
    let unit = Decimal::new(1, decimal_places);

    let exact = weights
        .iter()
        .map(|w| total.checked_mul(*w)?.checked_div(weight_sum))
        .collect::<Option<Vec<Decimal>>>()
        .ok_or_else(overflow)?;
    let mut shares: Vec<Decimal> = exact
        .iter()
        .map(|a| a.round_dp_with_strategy(decimal_places, RoundingStrategy::ToZero))
        .collect();

    let remainder = checked_sum(&shares)
        .and_then(|sum| total.checked_sub(sum))
        .ok_or_else(overflow)?;
    let units = remainder
        .checked_div(unit)
        .ok_or_else(overflow)?
        .abs()
        .round_dp_with_strategy(0, RoundingStrategy::ToZero)
        .to_usize()
        .unwrap_or(0);
    if units == 0 {
        return Ok(shares);
    }

    let step = if remainder.is_sign_negative() { -unit } else { unit };

    // Largest fractional remainder first; stable sort keeps index order on ties.
    let mut order: Vec<usize> = (0..shares.len()).collect();
    order.sort_by(|&a, &b| {
        let frac_a = (exact[a] - shares[a]).abs();
        let frac_b = (exact[b] - shares[b]).abs();
        frac_b.cmp(&frac_a)
    });

    for &i in order.iter().cycle().take(units) {
        shares[i] = shares[i].checked_add(step).ok_or_else(overflow)?;
    }

    Ok(shares)
}

/// Splits every candidate across targets weighted by `weights`.
///
/// Returns one candidate list per target, in weight order. Base amount, base
/// tax and transaction amount are split independently; shares whose base
/// amount rounds to zero are dropped.
///
/// # Errors
///
/// Propagates `split` errors.
pub fn apportion_candidates(
    candidates: &[AllocationCandidate],
    weights: &[Decimal],
    decimal_places: u32,
) -> Result<Vec<Vec<AllocationCandidate>>, ApportionError> {
    let mut per_target: Vec<Vec<AllocationCandidate>> = vec![Vec::new(); weights.len()];
    if weights.is_empty() {
        return Err(ApportionError::NoWeights);
    }

    for candidate in candidates {
        let base = split(candidate.base_amount, weights, decimal_places)?;
        let tax = split(candidate.base_tax_amount, weights, decimal_places)?;
        let amount = split(candidate.amount, weights, decimal_places)?;

        for (i, rows) in per_target.iter_mut().enumerate() {
            if base[i].is_zero() {
                continue;
            }
            rows.push(AllocationCandidate {
                service_item: candidate.service_item.clone(),
                base_amount: base[i],
                base_tax_amount: tax[i],
                amount: amount[i],
                currency: candidate.currency.clone(),
            });
        }
    }

    Ok(per_target)
}
