//! Application configuration management.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::types::AccountId;

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Reconciliation engine configuration.
    #[serde(default)]
    pub reconciliation: ReconcileConfig,
}

/// What to do when no exchange rate can be resolved for a secondary invoice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeRatePolicy {
    /// Fail the supplier group and report it.
    #[default]
    Strict,
    /// Use a rate of 1.0 and log a warning.
    FallbackToOne,
}

/// Reconciliation engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    /// Behaviour for unresolved exchange rates.
    #[serde(default)]
    pub exchange_rate_policy: ExchangeRatePolicy,
    /// Tax accounts ignored by the itemised-tax fallback.
    #[serde(default)]
    pub excluded_tax_accounts: BTreeSet<AccountId>,
    /// Decimal places for computed tax and apportioned amounts.
    #[serde(default = "default_amount_precision")]
    pub amount_precision: u32,
}

fn default_amount_precision() -> u32 {
    2
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            exchange_rate_policy: ExchangeRatePolicy::default(),
            excluded_tax_accounts: BTreeSet::new(),
            amount_precision: default_amount_precision(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from `.env`, config files and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("LANDED").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
