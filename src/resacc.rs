//! This module allows accumulating analysis results across events
//!
//! Histogram-like sinks are not binned. Each one only keeps its number of
//! entries and dropped tuples, plus the per-dimension sum, sum of squares,
//! minimum and maximum of the values it received, which is what the summary
//! statistics of the output are computed from. Candidate rows are kept in
//! full.

use crate::{
    config::Configuration,
    numeric::{all_finite, Float},
    recorder::{CandidateRow, Recorder, SinkKey},
    resfin::{FinalResults, Summary},
};
use prefix_num_ops::real::*;
use std::collections::BTreeMap;

/// Running statistics of one histogram-like sink
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tally {
    /// Number of recorded tuples
    entries: u64,

    /// Number of tuples dropped for holding non-finite values
    dropped: u64,

    /// Per-dimension sum of values
    sums: Vec<Float>,

    /// Per-dimension sum of squared values
    sums_sq: Vec<Float>,

    /// Per-dimension minimum
    min: Vec<Float>,

    /// Per-dimension maximum
    max: Vec<Float>,
}
//
impl Tally {
    /// Record one tuple of values
    fn record(&mut self, values: &[Float]) {
        if !all_finite(values) {
            self.dropped += 1;
            return;
        }
        if self.entries == 0 {
            self.sums = vec![0.; values.len()];
            self.sums_sq = vec![0.; values.len()];
            self.min = values.to_owned();
            self.max = values.to_owned();
        }
        debug_assert_eq!(values.len(), self.sums.len(), "Inconsistent tuple arity");
        self.entries += 1;
        for (idx, &value) in values.iter().enumerate() {
            self.sums[idx] += value;
            self.sums_sq[idx] += value * value;
            self.min[idx] = self.min[idx].min(value);
            self.max[idx] = self.max[idx].max(value);
        }
    }

    /// Integrate the statistics of another tally
    fn merge(&mut self, other: Self) {
        self.dropped += other.dropped;
        if other.entries == 0 {
            return;
        }
        if self.entries == 0 {
            *self = Self {
                dropped: self.dropped,
                ..other
            };
            return;
        }
        self.entries += other.entries;
        for idx in 0..self.sums.len() {
            self.sums[idx] += other.sums[idx];
            self.sums_sq[idx] += other.sums_sq[idx];
            self.min[idx] = self.min[idx].min(other.min[idx]);
            self.max[idx] = self.max[idx].max(other.max[idx]);
        }
    }

    /// Compute the summary statistics
    fn finalize(self) -> Summary {
        let n = self.entries as Float;
        let mean = self.sums.iter().map(|sum| sum / n).collect::<Vec<_>>();
        let std_dev = self
            .sums_sq
            .iter()
            .zip(&mean)
            .map(|(sum_sq, mean)| sqrt((sum_sq / n - mean * mean).max(0.)))
            .collect();
        Summary {
            entries: self.entries,
            dropped: self.dropped,
            mean,
            std_dev,
            min: self.min,
            max: self.max,
        }
    }
}

/// This struct accumulates intermediary results during the analysis, and
/// ultimately computes the final results (see FinalResults).
pub struct ResultsAccumulator<'cfg> {
    /// Per-sink statistics
    tallies: BTreeMap<SinkKey, Tally>,

    /// Per-candidate rows, in recording order
    rows: Vec<CandidateRow>,

    /// Configuration of the analysis
    cfg: &'cfg Configuration,
}
//
impl<'cfg> ResultsAccumulator<'cfg> {
    /// Prepare for results accumulation
    pub fn new(cfg: &'cfg Configuration) -> Self {
        Self {
            tallies: BTreeMap::new(),
            rows: Vec::new(),
            cfg,
        }
    }

    /// Integrate results from another ResultsAccumulator
    ///
    /// Rows from `other` are appended after those of `self`, so merging in
    /// a fixed order yields reproducible output.
    ///
    #[allow(clippy::needless_pass_by_value)]
    pub fn merge(&mut self, other: Self) {
        for (key, tally) in other.tallies {
            self.tallies.entry(key).or_default().merge(tally);
        }
        self.rows.extend(other.rows);
    }

    /// Turn the accumulated data into final results
    pub fn finalize(self) -> FinalResults<'cfg> {
        FinalResults {
            summaries: self
                .tallies
                .into_iter()
                .map(|(key, tally)| (key, tally.finalize()))
                .collect(),
            rows: self.rows,
            cfg: self.cfg,
        }
    }
}
//
impl Recorder for ResultsAccumulator<'_> {
    fn fill(&mut self, key: SinkKey, values: &[Float]) {
        self.tallies.entry(key).or_default().record(values);
    }

    fn record_row(&mut self, row: CandidateRow) {
        self.rows.push(row);
    }
}
