//! Market snapshot capture at pick creation.

use chrono::{DateTime, Utc};

use crate::data::OddsLatestEntry;
use crate::types::{Pick, ThreeWay};

/// Three-way market state frozen onto a pick.
#[derive(Debug, Clone, PartialEq)]
pub struct OddsSnapshot {
    pub market: ThreeWay,
    /// 1/odds per outcome, renormalised to sum to 1.
    pub implied: ThreeWay,
    /// Σ(1/odds) − 1
    pub overround: f64,
    pub provider: String,
    pub captured_at: DateTime<Utc>,
}

impl OddsSnapshot {
    /// Capture all three prices, or nothing if any is missing.
    pub fn capture(entry: &OddsLatestEntry, now: DateTime<Utc>) -> Option<Self> {
        let m = entry.market;
        let market = ThreeWay {
            home_win: m.home_win?,
            draw: m.draw?,
            away_win: m.away_win?,
        };

        let (h, d, a) = (1.0 / market.home_win, 1.0 / market.draw, 1.0 / market.away_win);
        let total = h + d + a;
        if !(total.is_finite() && total > 0.0) {
            return None;
        }

        Some(Self {
            market,
            implied: ThreeWay {
                home_win: h / total,
                draw: d / total,
                away_win: a / total,
            },
            overround: total - 1.0,
            provider: entry
                .provider
                .clone()
                .unwrap_or_else(|| "odds_latest".to_string()),
            captured_at: now,
        })
    }

    pub fn apply_to(self, pick: &mut Pick) {
        pick.market_snapshot = Some(self.market);
        pick.snapshot_implied = Some(self.implied);
        pick.snapshot_overround = Some(self.overround);
        pick.snapshot_provider = Some(self.provider);
        pick.snapshot_at = Some(self.captured_at);
    }
}
