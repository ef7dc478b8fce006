//! Exchange rate table.

use chrono::NaiveDate;
use landed_core::ports::ExchangeRates;
use landed_shared::types::CurrencyCode;
use landed_shared::{AppError, AppResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Exchange rate between two currencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    /// Source currency code.
    pub from_currency: CurrencyCode,
    /// Target currency code.
    pub to_currency: CurrencyCode,
    /// Exchange rate (1 from_currency = rate to_currency).
    pub rate: Decimal,
    /// Date this rate is effective.
    pub effective_date: NaiveDate,
}

impl ExchangeRate {
    /// Creates a new exchange rate.
    #[must_use]
    pub fn new(
        from_currency: impl Into<CurrencyCode>,
        to_currency: impl Into<CurrencyCode>,
        rate: Decimal,
        effective_date: NaiveDate,
    ) -> Self {
        Self {
            from_currency: from_currency.into(),
            to_currency: to_currency.into(),
            rate,
            effective_date,
        }
    }

    /// Returns the inverse rate.
    #[must_use]
    pub fn inverse(&self) -> Self {
        Self {
            from_currency: self.to_currency.clone(),
            to_currency: self.from_currency.clone(),
            rate: Decimal::ONE / self.rate,
            effective_date: self.effective_date,
        }
    }
}

/// Error types for exchange rate operations.
#[derive(Debug, thiserror::Error)]
pub enum RateError {
    /// Rate must be positive.
    #[error("Exchange rate must be positive")]
    NonPositiveRate,

    /// Currencies must be different.
    #[error("From and to currencies must be different")]
    SameCurrency,

    /// Exchange rate not found.
    #[error("No exchange rate found for {0}/{1} on or before {2}")]
    RateNotFound(CurrencyCode, CurrencyCode, NaiveDate),
}

impl From<RateError> for AppError {
    fn from(err: RateError) -> Self {
        match err {
            RateError::RateNotFound(..) => Self::NotFound(err.to_string()),
            RateError::NonPositiveRate | RateError::SameCurrency => {
                Self::Validation(err.to_string())
            }
        }
    }
}

/// How an exchange rate was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLookupMethod {
    /// Direct rate found (from_currency -> to_currency).
    Direct,
    /// Inverse rate calculated (to_currency -> from_currency, then inverted).
    Inverse,
}

/// Result of an exchange rate lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLookup {
    /// The exchange rate.
    pub rate: Decimal,
    /// How the rate was obtained.
    pub method: RateLookupMethod,
    /// The effective date of the rate.
    pub effective_date: NaiveDate,
}

/// Immutable table of dated exchange rates.
#[derive(Debug, Clone, Default)]
pub struct StaticRates {
    rates: Vec<ExchangeRate>,
}

impl StaticRates {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rate.
    ///
    /// # Errors
    ///
    /// Returns an error if the rate is not positive or both currencies match.
    pub fn with_rate(mut self, rate: ExchangeRate) -> Result<Self, RateError> {
        if rate.rate <= Decimal::ZERO {
            return Err(RateError::NonPositiveRate);
        }
        if rate.from_currency == rate.to_currency {
            return Err(RateError::SameCurrency);
        }
        self.rates.push(rate);
        Ok(self)
    }

    fn latest(&self, from: &CurrencyCode, to: &CurrencyCode, date: NaiveDate) -> Option<&ExchangeRate> {
        self.rates
            .iter()
            .filter(|r| &r.from_currency == from && &r.to_currency == to && r.effective_date <= date)
            .max_by_key(|r| r.effective_date)
    }

    /// Finds a rate for a currency pair on or before a date.
    ///
    /// Lookup priority:
    /// 1. Direct rate (from -> to)
    /// 2. Inverse rate (to -> from, then invert)
    ///
    /// # Errors
    ///
    /// Returns `RateError::RateNotFound` if neither exists.
    pub fn find_rate(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
        date: NaiveDate,
    ) -> Result<RateLookup, RateError> {
        if let Some(direct) = self.latest(from, to, date) {
            return Ok(RateLookup {
                rate: direct.rate,
                method: RateLookupMethod::Direct,
                effective_date: direct.effective_date,
            });
        }
        if let Some(reverse) = self.latest(to, from, date) {
            let inverse = reverse.inverse();
            return Ok(RateLookup {
                rate: inverse.rate,
                method: RateLookupMethod::Inverse,
                effective_date: inverse.effective_date,
            });
        }
        Err(RateError::RateNotFound(from.clone(), to.clone(), date))
    }
}

impl ExchangeRates for StaticRates {
    fn exchange_rate(
        &self,
        from: &CurrencyCode,
        to: &CurrencyCode,
        as_of: NaiveDate,
    ) -> AppResult<Decimal> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        Ok(self.find_rate(from, to, as_of)?.rate)
    }
}
