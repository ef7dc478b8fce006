//! Property-based tests for whole reconciliation runs.
//!
//! - Refresh is idempotent.
//! - Stored totals always equal the sum of the stored rows.
//! - A voucher's own charges are conserved across its targets.
//! - Cancelling a voucher removes everything its submission wrote.

#![allow(clippy::cast_possible_truncation)]

mod common;

use common::{World, draft_invoice, funded_charge, inv, own_charge, voucher, voucher_source};
use landed_core::document::{AllocationRow, AllocationTotals, ChargeRow, DocStatus};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy to generate positive charge amounts (0.01 to 10,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate a voucher's own charges (1 to 5 rows).
fn own_charges() -> impl Strategy<Value = Vec<ChargeRow>> {
    prop::collection::vec((0usize..3, positive_amount()), 1..5).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (item, amount))| {
                own_charge(i as u32 + 1, ["FREIGHT01", "INSURANCE", "SVC01"][item], amount)
            })
            .collect()
    })
}

/// Strategy to generate receipt amounts (1 to 4 targets, zeros allowed).
fn receipt_amounts() -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec((0i64..500_000i64).prop_map(|c| Decimal::new(c, 2)), 1..4)
}

fn target_ids(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("PINV-{i}")).collect()
}

/// Seeds draft targets and a submitted voucher, then submits it.
fn submit(world: &World, charges: Vec<ChargeRow>, amounts: &[Decimal]) -> Vec<String> {
    let ids = target_ids(amounts.len());
    for id in &ids {
        world.store.insert_invoice(draft_invoice(id));
    }
    let receipts: Vec<(&str, Decimal)> = ids
        .iter()
        .map(String::as_str)
        .zip(amounts.iter().copied())
        .collect();
    world.store.insert_voucher(voucher("LCV-1", &receipts, charges));
    world
        .reconciler()
        .on_source_submit(&voucher_source("LCV-1"))
        .unwrap();
    ids
}

fn sorted_rows(world: &World, target: &str) -> Vec<AllocationRow> {
    let mut rows = world.rows(target);
    rows.sort_by(|a, b| a.id.cmp(&b.id));
    rows
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// *For any* voucher, own charges SHALL be conserved across targets.
    #[test]
    fn prop_own_charges_are_conserved(charges in own_charges(), amounts in receipt_amounts()) {
        let world = World::new();
        let expected: Decimal = charges.iter().map(|c| c.base_amount).sum();
        let ids = submit(&world, charges, &amounts);

        let allocated: Decimal = ids
            .iter()
            .map(|id| world.invoice(id).totals.total_allocated_cost)
            .sum();
        prop_assert_eq!(allocated, expected);
    }

    /// *For any* target, stored totals SHALL equal the sum of its rows.
    #[test]
    fn prop_totals_match_rows(charges in own_charges(), amounts in receipt_amounts()) {
        let world = World::new();
        let ids = submit(&world, charges, &amounts);

        for id in &ids {
            let rows = world.rows(id);
            prop_assert_eq!(Some(world.invoice(id).totals), AllocationTotals::from_rows(&rows));
        }
    }

    /// *For any* target, refreshing twice SHALL leave the same rows.
    #[test]
    fn prop_refresh_is_idempotent(
        charges in own_charges(),
        amounts in receipt_amounts(),
        funded in positive_amount(),
    ) {
        let world = World::new();
        let mut charges = charges;
        let idx = charges.len() as u32 + 1;
        charges.push(funded_charge(idx, "SVC09", "SUP-1", funded));
        let ids = submit(&world, charges, &amounts);
        let reconciler = world.reconciler();

        for id in &ids {
            let before = sorted_rows(&world, id);
            let first = reconciler.refresh(&inv(id)).unwrap();
            let after_first = sorted_rows(&world, id);
            let second = reconciler.refresh(&inv(id)).unwrap();
            let after_second = sorted_rows(&world, id);

            prop_assert_eq!(&after_first, &before);
            prop_assert_eq!(&after_second, &before);
            prop_assert_eq!(first.totals, second.totals);
            prop_assert!(first.report.created_invoices.is_empty());
        }
        prop_assert_eq!(world.store.invoices_for(&inv("PINV-1")).len(), 1);
    }

    /// *For any* voucher, cancelling it SHALL undo its submission.
    #[test]
    fn prop_cancel_reverses_submit(
        charges in own_charges(),
        amounts in receipt_amounts(),
        funded in positive_amount(),
    ) {
        let world = World::new();
        let mut charges = charges;
        let idx = charges.len() as u32 + 1;
        charges.push(funded_charge(idx, "SVC09", "SUP-1", funded));
        let ids = submit(&world, charges, &amounts);

        world.set_voucher_status("LCV-1", DocStatus::Cancelled);
        let report = world
            .reconciler()
            .on_source_cancel(&voucher_source("LCV-1"))
            .unwrap();

        prop_assert!(report.is_clean());
        for id in &ids {
            prop_assert!(world.rows(id).is_empty());
            prop_assert_eq!(world.invoice(id).totals, AllocationTotals::default());
        }
        for secondary in world.store.invoices_for(&inv("PINV-1")) {
            prop_assert_eq!(secondary.status, DocStatus::Cancelled);
        }
    }
}
