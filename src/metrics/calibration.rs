//! Probability calibration of the picks' model estimates.
//!
//! Compares each settled pick's model probability against whether it
//! actually won: Brier scores overall and per source, a ten-bin
//! reliability curve, and a coarse over/under-confidence diagnosis.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::Pick;

// ---------------------------------------------------------------------------
// Calibration data
// ---------------------------------------------------------------------------

/// A single probability–outcome pair.
#[derive(Debug, Clone)]
pub struct CalibrationPoint {
    pub source: String,
    pub estimated_probability: f64,
    pub won: bool,
}

impl CalibrationPoint {
    pub fn from_pick(pick: &Pick) -> Option<Self> {
        if !pick.settled {
            return None;
        }
        let p = pick.model_prob();
        if !(p.is_finite() && (0.0..=1.0).contains(&p)) {
            return None;
        }
        Some(Self {
            source: pick.source.to_string(),
            estimated_probability: p,
            won: pick.is_win(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationReport {
    pub total_predictions: usize,
    pub overall_brier: f64,
    pub source_brier: BTreeMap<String, f64>,
    pub calibration_curve: Vec<CalibrationBucket>,
    pub diagnosis: CalibrationDiagnosis,
}

/// One bin of the reliability curve, e.g. all estimates in [0.6, 0.7).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationBucket {
    pub bin_start: f64,
    pub bin_end: f64,
    pub mean_predicted: f64,
    pub actual_rate: f64,
    pub count: usize,
    /// |mean_predicted - actual_rate|
    pub deviation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationDiagnosis {
    WellCalibrated,
    OverConfident,
    UnderConfident,
    InsufficientData,
}

// ---------------------------------------------------------------------------
// Calibrator
// ---------------------------------------------------------------------------

pub struct Calibrator {
    points: Vec<CalibrationPoint>,
    num_bins: usize,
}

impl Calibrator {
    fn new() -> Self {
        Self {
            points: Vec::new(),
            num_bins: 10,
        }
    }

    pub fn from_picks(picks: &[&Pick]) -> Self {
        let mut cal = Self::new();
        for point in picks.iter().filter_map(|p| CalibrationPoint::from_pick(p)) {
            cal.add_point(point);
        }
        cal
    }

    pub fn add_point(&mut self, point: CalibrationPoint) {
        self.points.push(point);
    }

    pub fn count(&self) -> usize {
        self.points.len()
    }

    pub fn report(&self) -> CalibrationReport {
        if self.points.is_empty() {
            return CalibrationReport {
                total_predictions: 0,
                overall_brier: 0.0,
                source_brier: BTreeMap::new(),
                calibration_curve: Vec::new(),
                diagnosis: CalibrationDiagnosis::InsufficientData,
            };
        }

        let refs: Vec<&CalibrationPoint> = self.points.iter().collect();
        let curve = self.calibration_curve();
        CalibrationReport {
            total_predictions: self.points.len(),
            overall_brier: brier(&refs),
            source_brier: self.source_brier(),
            diagnosis: self.diagnose(&curve),
            calibration_curve: curve,
        }
    }

    fn source_brier(&self) -> BTreeMap<String, f64> {
        let mut by_source: BTreeMap<String, Vec<&CalibrationPoint>> = BTreeMap::new();
        for p in &self.points {
            by_source.entry(p.source.clone()).or_default().push(p);
        }
        by_source
            .into_iter()
            .map(|(source, points)| (source, brier(&points)))
            .collect()
    }

    /// Ten equal-width bins over [0, 1]; the top bin is closed.
    fn calibration_curve(&self) -> Vec<CalibrationBucket> {
        let width = 1.0 / self.num_bins as f64;
        (0..self.num_bins)
            .map(|i| {
                let bin_start = i as f64 * width;
                let bin_end = bin_start + width;
                let last = i == self.num_bins - 1;
                let in_bin: Vec<&CalibrationPoint> = self
                    .points
                    .iter()
                    .filter(|p| {
                        let x = p.estimated_probability;
                        x >= bin_start && (x < bin_end || (last && x <= bin_end))
                    })
                    .collect();

                if in_bin.is_empty() {
                    return CalibrationBucket {
                        bin_start,
                        bin_end,
                        mean_predicted: (bin_start + bin_end) / 2.0,
                        actual_rate: 0.0,
                        count: 0,
                        deviation: 0.0,
                    };
                }

                let count = in_bin.len();
                let mean_predicted =
                    in_bin.iter().map(|p| p.estimated_probability).sum::<f64>() / count as f64;
                let actual_rate = in_bin.iter().filter(|p| p.won).count() as f64 / count as f64;
                CalibrationBucket {
                    bin_start,
                    bin_end,
                    mean_predicted,
                    actual_rate,
                    count,
                    deviation: (mean_predicted - actual_rate).abs(),
                }
            })
            .collect()
    }

    fn diagnose(&self, curve: &[CalibrationBucket]) -> CalibrationDiagnosis {
        let populated: Vec<&CalibrationBucket> = curve.iter().filter(|b| b.count >= 3).collect();
        if populated.len() < 2 {
            return CalibrationDiagnosis::InsufficientData;
        }

        // Estimates too high where the model is confident, too low where
        // it is not, signal overconfidence.
        let mut over = 0;
        let mut under = 0;
        for bucket in populated {
            if bucket.deviation < 0.05 {
                continue;
            }
            let mid = (bucket.bin_start + bucket.bin_end) / 2.0;
            let predicted_high = bucket.mean_predicted > bucket.actual_rate;
            if mid > 0.5 {
                if predicted_high {
                    over += 1;
                } else {
                    under += 1;
                }
            } else if predicted_high {
                under += 1;
            } else {
                over += 1;
            }
        }

        if over > under + 1 {
            CalibrationDiagnosis::OverConfident
        } else if under > over + 1 {
            CalibrationDiagnosis::UnderConfident
        } else {
            CalibrationDiagnosis::WellCalibrated
        }
    }
}

/// Brier = (1/N) Σ (p − outcome)²; 0 is perfect.
fn brier(points: &[&CalibrationPoint]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    points
        .iter()
        .map(|p| {
            let outcome = if p.won { 1.0 } else { 0.0 };
            (p.estimated_probability - outcome).powi(2)
        })
        .sum::<f64>()
        / points.len() as f64
}

/// Calibration report for settled picks, `None` below `min_picks`.
pub fn calibration(picks: &[&Pick], min_picks: usize) -> Option<CalibrationReport> {
    let cal = Calibrator::from_picks(picks);
    if cal.count() == 0 || cal.count() < min_picks {
        return None;
    }
    Some(cal.report())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
