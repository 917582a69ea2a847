//! Odds resolution.
//!
//! Defines the `OddsProvider` trait and the resolver that walks the
//! configured providers in order, accepting the first price above the
//! minimum and otherwise degrading to the fallback constant:
//! - `odds_latest`: latest market odds index
//! - `predictions_odds`: the odds block the model saw at prediction time

pub mod latest;
pub mod predictions;

use tracing::debug;

use crate::config::OddsConfig;
use crate::data::InputSnapshot;
use crate::types::{OddsSource, Side};
use latest::OddsLatestProvider;
use predictions::PredictionsOddsProvider;

/// A source of decimal prices for (fixture, side) pairs.
#[cfg_attr(test, mockall::automock)]
pub trait OddsProvider {
    /// Tag recorded on picks priced by this provider.
    fn tag(&self) -> OddsSource;

    /// Decimal price for the outcome, if this provider has one.
    fn price(&self, fixture_id: u64, side: Side) -> Option<f64>;
}

/// Result of a resolution: the price and where it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedOdds {
    pub decimal_odds: f64,
    pub source: OddsSource,
}

impl ResolvedOdds {
    pub fn is_fallback(&self) -> bool {
        self.source == OddsSource::Fallback
    }
}

/// Ordered chain of providers with a constant fallback. Never fails.
pub struct OddsResolver<'a> {
    providers: Vec<Box<dyn OddsProvider + 'a>>,
    min_price: f64,
    fallback_odds: f64,
}

impl<'a> OddsResolver<'a> {
    pub fn new(providers: Vec<Box<dyn OddsProvider + 'a>>, min_price: f64, fallback_odds: f64) -> Self {
        Self {
            providers,
            min_price,
            fallback_odds,
        }
    }

    /// Build the provider chain named in the configuration.
    pub fn from_config(cfg: &OddsConfig, inputs: &'a InputSnapshot) -> Self {
        let providers = cfg
            .providers
            .iter()
            .filter_map(|tag| -> Option<Box<dyn OddsProvider + 'a>> {
                match tag {
                    OddsSource::OddsLatest => Some(Box::new(OddsLatestProvider::new(&inputs.odds_latest))),
                    OddsSource::PredictionsOdds => {
                        Some(Box::new(PredictionsOddsProvider::new(&inputs.predictions)))
                    }
                    OddsSource::Fallback => None,
                }
            })
            .collect();
        Self::new(providers, cfg.min_price, cfg.fallback_odds)
    }

    /// Price for the outcome from the first provider quoting above the
    /// minimum; the fallback constant otherwise.
    pub fn resolve(&self, fixture_id: u64, side: Side) -> ResolvedOdds {
        for provider in &self.providers {
            if let Some(price) = provider.price(fixture_id, side) {
                if price.is_finite() && price > self.min_price {
                    return ResolvedOdds {
                        decimal_odds: price,
                        source: provider.tag(),
                    };
                }
                debug!(fixture_id, %side, price, provider = %provider.tag(), "Price below minimum, trying next");
            }
        }
        debug!(fixture_id, %side, fallback = self.fallback_odds, "No usable price, using fallback");
        ResolvedOdds {
            decimal_odds: self.fallback_odds,
            source: OddsSource::Fallback,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
