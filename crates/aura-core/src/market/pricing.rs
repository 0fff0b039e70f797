//! # Price Conversion
//!
//! Fixed-rate USD→crypto conversion for deterministic payment amounts.
//! USDC is a stablecoin pinned at 1.0; the SOL rate is configurable.

use aura_types::CryptoCurrency;
use tracing::debug;

/// Default fixed rate: 1 SOL = $100.
pub const DEFAULT_SOL_USD_RATE: f64 = 100.0;

/// Converts fiat prices into cryptocurrency amounts.
#[derive(Clone, Copy, Debug)]
pub struct PriceConverter {
    sol_usd_rate: f64,
}

impl PriceConverter {
    /// Converter with a configured SOL/USD rate.
    pub fn new(sol_usd_rate: f64) -> Self {
        Self { sol_usd_rate }
    }

    /// Convert a USD amount into native currency units.
    pub fn usd_to_crypto(&self, usd_amount: f64, currency: CryptoCurrency) -> f64 {
        let rate = match currency {
            CryptoCurrency::Sol => self.sol_usd_rate,
            CryptoCurrency::Usdc => 1.0,
        };
        let crypto_amount = usd_amount / rate;
        debug!(
            event = "currency_conversion",
            usd_amount,
            currency = %currency,
            rate,
            crypto_amount,
            "converted"
        );
        crypto_amount
    }
}

impl Default for PriceConverter {
    fn default() -> Self {
        Self::new(DEFAULT_SOL_USD_RATE)
    }
}
