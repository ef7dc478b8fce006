//! Property-based tests for apportioning.
//!
//! - Shares always sum to the total.
//! - Every share is within one unit of its exact proportional value.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::apportion::split;

/// Strategy to generate positive charge amounts (0.01 to 1,000,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate receipt weights (2 to 10 targets, zeros allowed).
fn weights() -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec((0i64..10_000_000i64).prop_map(|c| Decimal::new(c, 2)), 2..10)
}

/// Strategy to generate decimal places (0 to 4).
fn decimal_places() -> impl Strategy<Value = u32> {
    0u32..=4
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* total and weights, the shares SHALL sum exactly to the total.
    #[test]
    fn prop_split_sum_equals_total(
        total in positive_amount(),
        weights in weights(),
        dp in decimal_places(),
    ) {
        let shares = split(total, &weights, dp).unwrap();
        prop_assert_eq!(shares.len(), weights.len());
        prop_assert_eq!(shares.iter().copied().sum::<Decimal>(), total);
    }

    /// *For any* split, no share SHALL be negative or deviate from its exact
    /// value by a full unit or more.
    #[test]
    fn prop_split_shares_are_fair(
        total in positive_amount(),
        weights in weights(),
        dp in decimal_places(),
    ) {
        let shares = split(total, &weights, dp).unwrap();
        let weight_sum: Decimal = weights.iter().copied().sum();
        let unit = Decimal::new(1, dp.max(total.scale()));

        for (share, weight) in shares.iter().zip(&weights) {
            prop_assert!(!share.is_sign_negative() || share.is_zero());
            let exact = if weight_sum.is_zero() {
                total / Decimal::from(weights.len())
            } else {
                total * *weight / weight_sum
            };
            prop_assert!((*share - exact).abs() < unit);
        }
    }

    /// *For any* target with zero weight among non-zero ones, its share SHALL be zero.
    #[test]
    fn prop_zero_weight_gets_nothing(
        total in positive_amount(),
        weight in (1i64..10_000_000i64).prop_map(|c| Decimal::new(c, 2)),
    ) {
        let shares = split(total, &[Decimal::ZERO, weight], 2).unwrap();
        prop_assert!(shares[0].is_zero());
        prop_assert_eq!(shares[1], total);
    }
}
