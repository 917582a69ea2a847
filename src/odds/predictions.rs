//! Prediction-time odds provider: the prices recorded alongside the
//! model's probabilities.

use crate::data::PredictionsIndex;
use crate::types::{OddsSource, Side};

use super::OddsProvider;

pub struct PredictionsOddsProvider<'a> {
    index: &'a PredictionsIndex,
}

impl<'a> PredictionsOddsProvider<'a> {
    pub fn new(index: &'a PredictionsIndex) -> Self {
        Self { index }
    }
}

impl OddsProvider for PredictionsOddsProvider<'_> {
    fn tag(&self) -> OddsSource {
        OddsSource::PredictionsOdds
    }

    fn price(&self, fixture_id: u64, side: Side) -> Option<f64> {
        self.index
            .get(&fixture_id)
            .and_then(|p| p.odds_original.get(side))
    }
}
