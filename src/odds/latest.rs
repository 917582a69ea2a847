//! Latest market odds index provider.

use crate::data::OddsLatestIndex;
use crate::types::{OddsSource, Side};

use super::OddsProvider;

pub struct OddsLatestProvider<'a> {
    index: &'a OddsLatestIndex,
}

impl<'a> OddsLatestProvider<'a> {
    pub fn new(index: &'a OddsLatestIndex) -> Self {
        Self { index }
    }
}

impl OddsProvider for OddsLatestProvider<'_> {
    fn tag(&self) -> OddsSource {
        OddsSource::OddsLatest
    }

    fn price(&self, fixture_id: u64, side: Side) -> Option<f64> {
        self.index.get(&fixture_id).and_then(|e| e.market.get(side))
    }
}
