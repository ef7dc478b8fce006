//! Item-level tax computation for invoice lines.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

use crate::ports::ItemisedTax;

/// Sums the percentages of an `item_tax_rate` map.
///
/// A map that is not a JSON object carries no rates. Null or empty values
/// count as zero.
///
/// # Errors
///
/// Returns a description of the problem if the text is not valid JSON, a
/// rate is not a number or the rates overflow.
pub fn rate_sum(item_tax_rate: &str) -> Result<Decimal, String> {
    if item_tax_rate.trim().is_empty() {
        return Ok(Decimal::ZERO);
    }
    let parsed: Value = serde_json::from_str(item_tax_rate).map_err(|e| e.to_string())?;
    let Value::Object(rates) = parsed else {
        return Ok(Decimal::ZERO);
    };

    rates.iter().try_fold(Decimal::ZERO, |sum, (component, rate)| {
        let rate = match rate {
            Value::Null => Decimal::ZERO,
            Value::Number(n) => parse_decimal(&n.to_string())
                .ok_or_else(|| format!("rate of {component} is not a decimal: {n}"))?,
            Value::String(s) if s.trim().is_empty() => Decimal::ZERO,
            Value::String(s) => parse_decimal(s.trim())
                .ok_or_else(|| format!("rate of {component} is not a number: {s:?}"))?,
            other => return Err(format!("rate of {component} is not a number: {other}")),
        };
        sum.checked_add(rate)
            .ok_or_else(|| format!("rate of {component} overflows the rate sum"))
    })
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Base tax of a line: `base_net * rate_sum / 100`, unrounded.
///
/// Returns `None` if the product overflows.
#[must_use]
pub fn base_tax_from_rates(base_net: Decimal, rate_sum: Decimal) -> Option<Decimal> {
    base_net
        .checked_mul(rate_sum)?
        .checked_div(Decimal::ONE_HUNDRED)
}

/// Base tax of `key` in an itemised breakdown.
///
/// Only components with a non-zero tax amount count; each contributes its
/// base tax amount, or its transaction tax amount when no base amount is known.
/// Returns `None` if the components overflow.
#[must_use]
pub fn itemised_base_tax(itemised: &ItemisedTax, key: &str) -> Option<Decimal> {
    let Some(components) = itemised.get(key) else {
        return Some(Decimal::ZERO);
    };
    components
        .values()
        .filter(|tax| !tax.tax_amount.is_zero())
        .map(|tax| {
            tax.base_tax_amount
                .filter(|base| !base.is_zero())
                .unwrap_or(tax.tax_amount)
        })
        .try_fold(Decimal::ZERO, Decimal::checked_add)
}
