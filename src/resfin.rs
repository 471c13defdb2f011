//! This module contains the final results of the analysis, and the derived
//! quantities that are displayed at the end of a run

use crate::{
    config::Configuration,
    numeric::Float,
    recorder::{
        CandidateRow, ChargeSplit, EventObservable, Origin, PairObservable, SignCorrelation,
        SinkKey, Topology,
    },
    selection::MassWindow,
};
use std::collections::BTreeMap;

/// Summary statistics of one histogram-like sink
#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    /// Number of recorded tuples
    pub entries: u64,

    /// Number of tuples dropped for holding non-finite values
    pub dropped: u64,

    /// Per-dimension mean
    pub mean: Vec<Float>,

    /// Per-dimension standard deviation
    pub std_dev: Vec<Float>,

    /// Per-dimension minimum
    pub min: Vec<Float>,

    /// Per-dimension maximum
    pub max: Vec<Float>,
}

/// Final results of the analysis
pub struct FinalResults<'cfg> {
    /// Per-sink summaries, in key order
    pub summaries: BTreeMap<SinkKey, Summary>,

    /// Per-candidate rows
    pub rows: Vec<CandidateRow>,

    /// Configuration of the analysis (for further derivation)
    pub cfg: &'cfg Configuration,
}
//
impl<'cfg> FinalResults<'cfg> {
    /// Number of tuples recorded into a sink
    pub fn entries(&self, key: SinkKey) -> u64 {
        self.summaries.get(&key).map_or(0, |summary| summary.entries)
    }

    /// Number of events which reached the analysis
    pub fn num_events(&self) -> u64 {
        self.entries(SinkKey::Event(EventObservable::Processed))
    }

    /// Number of events which passed the event selection
    pub fn num_accepted_events(&self) -> u64 {
        self.entries(SinkKey::Event(EventObservable::EventsVsRun))
    }

    /// Number of events fed to the mixer, and how many of them were mixed
    pub fn num_pooled_events(&self) -> (u64, u64) {
        self.summaries
            .get(&SinkKey::Event(EventObservable::PoolFill))
            .map_or((0, 0), |summary| {
                // The third dimension is 1 for mixed events, 0 otherwise
                let mixed_fraction = summary.mean.get(2).copied().unwrap_or(0.);
                let mixed = mixed_fraction * summary.entries as Float;
                (summary.entries, mixed.round() as u64)
            })
    }

    /// Number of selected peak-window pairs of a given origin and sign
    pub fn num_peak_pairs(&self, origin: Origin, sign: SignCorrelation) -> u64 {
        self.summaries
            .iter()
            .filter(|(key, _)| {
                matches!(
                    key,
                    SinkKey::Pair {
                        observable: PairObservable::MassPt,
                        origin: o,
                        class: Some(class),
                    } if *o == origin
                        && class.sign == sign
                        && class.window == MassWindow::Peak
                        && class.topology == Topology::Direct
                        && class.charge == ChargeSplit::Inclusive
                )
            })
            .map(|(_, summary)| summary.entries)
            .sum()
    }

    /// Display an overview of the results on stdout
    pub fn print_overview(&self) {
        let (pooled, mixed) = self.num_pooled_events();
        println!();
        println!("Events          : {}", self.num_events());
        println!("... accepted    : {}", self.num_accepted_events());
        println!("... pooled      : {pooled}");
        println!("... mixed       : {mixed}");
        println!();
        println!("Peak pairs      :    RS     |    WS");
        for origin in [Origin::SameEvent, Origin::Mixed] {
            let rs = self.num_peak_pairs(origin, SignCorrelation::RightSign);
            let ws = self.num_peak_pairs(origin, SignCorrelation::WrongSign);
            let ratio = rs as Float / ws as Float;
            println!("{:<16}: {rs:>9} | {ws:>9} | {ratio:.4}", format!("{origin:?}"));
        }
        let dropped = self
            .summaries
            .values()
            .map(|summary| summary.dropped)
            .sum::<u64>();
        if dropped > 0 {
            println!();
            println!("Non-finite tuples dropped: {dropped}");
        }
    }
}
