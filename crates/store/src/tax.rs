//! Itemised tax from the per-row `item_wise_tax_detail` breakdown.
//!
//! Each tax row stores a JSON object keyed by item code. A value is either
//! `[rate, amount]` or `{"tax_rate": .., "tax_amount": ..}`. The tax row's
//! description names the component.

use std::str::FromStr;

use landed_core::document::TaxRow;
use landed_core::ports::{ItemisedTax, TaxService};
use landed_shared::{AppError, AppResult};
use rust_decimal::Decimal;
use serde_json::Value;

/// Tax service reading the breakdown stored on each tax row.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemwiseTaxDetail;

fn decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Null => Some(Decimal::ZERO),
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) if s.trim().is_empty() => Some(Decimal::ZERO),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn tax_amount(value: &Value) -> Option<Decimal> {
    match value {
        Value::Array(parts) => parts.get(1).map_or(Some(Decimal::ZERO), decimal),
        Value::Object(fields) => fields.get("tax_amount").map_or(Some(Decimal::ZERO), decimal),
        other => decimal(other),
    }
}

impl TaxService for ItemwiseTaxDetail {
    fn itemised_tax(&self, taxes: &[TaxRow]) -> AppResult<ItemisedTax> {
        let mut itemised = ItemisedTax::new();
        for row in taxes {
            let Some(detail) = row.item_wise_tax_detail.as_deref().filter(|d| !d.trim().is_empty())
            else {
                continue;
            };
            let parsed: Value = serde_json::from_str(detail).map_err(|e| {
                AppError::Computation(format!("Invalid tax breakdown on {}: {e}", row.account_head))
            })?;
            let Value::Object(items) = parsed else {
                return Err(AppError::Computation(format!(
                    "Tax breakdown on {} is not an object",
                    row.account_head
                )));
            };

            for (item, value) in items {
                let amount = tax_amount(&value).ok_or_else(|| {
                    AppError::Computation(format!(
                        "Invalid tax amount for {item} on {}",
                        row.account_head
                    ))
                })?;
                let component = itemised
                    .entry(item.clone())
                    .or_default()
                    .entry(row.description.clone())
                    .or_default();
                component.tax_amount =
                    component.tax_amount.checked_add(amount).ok_or_else(|| {
                        AppError::Computation(format!(
                            "Tax amount for {item} on {} overflows",
                            row.account_head
                        ))
                    })?;
            }
        }
        Ok(itemised)
    }
}
