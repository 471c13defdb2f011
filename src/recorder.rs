//! Output capability through which the analysis reports what it measures
//!
//! The analysis never owns histograms directly. It hands tuples of values to a
//! `Recorder`, tagged with a `SinkKey` saying what they are, and lets the
//! recorder decide what to do with them.

use crate::{extract::V0Species, numeric::Float, selection::MassWindow};
use std::fmt::{self, Display, Formatter};

/// Where the V0 of a pair comes from
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Origin {
    /// Lepton and V0 come from the same event
    SameEvent,

    /// The V0 comes from a previous event of the same mixing pool
    Mixed,
}

/// Charge correlation between the lepton and the V0 of a pair
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SignCorrelation {
    /// Compatible with a semileptonic baryon decay
    RightSign,

    /// Background-like charge combination
    WrongSign,
}
//
impl SignCorrelation {
    /// Classify a lepton charge / V0 species combination
    pub fn classify(lepton_charge: i8, species: V0Species) -> Self {
        if lepton_charge * species.parent_charge() > 0 {
            SignCorrelation::RightSign
        } else {
            SignCorrelation::WrongSign
        }
    }
}

/// Whether a pair is measured as is, or with the V0 flipped about the lepton
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Topology {
    Direct,
    Away,
}

/// Lepton charge split of the classified fills
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChargeSplit {
    /// Every lepton
    Inclusive,

    /// Positive leptons only
    Positive,

    /// Negative leptons only
    Negative,
}
//
impl ChargeSplit {
    /// Charge-specific split of a lepton
    pub fn of(charge: i8) -> Self {
        if charge > 0 {
            ChargeSplit::Positive
        } else {
            ChargeSplit::Negative
        }
    }
}

/// Event-level quantities
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventObservable {
    /// (run number) of every event reaching the analysis
    Processed,

    /// (magnetic field) of events rejected for a weak field
    RejectedMagneticField,

    /// (run - offset) of events without a primary vertex
    NoPrimaryVertex,

    /// (centrality) of events rejected for an out-of-range centrality
    RejectedCentrality,

    /// (centrality) of accepted events
    Centrality,

    /// (run - offset) of accepted events
    EventsVsRun,

    /// (run - offset, electron count) of accepted events
    ElectronsVsRun,

    /// (run - offset, V0 count) of accepted events
    V0sVsRun,

    /// (vertex z, centrality) of accepted events which fall outside of the
    /// mixing pools
    Unpooled,

    /// (pool id, count after append, mixed) of events fed to the mixer
    PoolFill,
}

/// Pair-level quantities
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PairObservable {
    /// (mass, pt, centrality) of every pair
    Inclusive,

    /// (mass, pt, centrality)
    MassPt,

    /// (mass, electron pt, centrality)
    MassVsElectronPt,

    /// (electron pt, centrality)
    ElectronPt,

    /// (electron pt, electron η, centrality)
    ElectronPtVsEta,

    /// (electron pt, V0 pt, centrality)
    ElectronPtVsV0Pt,

    /// (electron pt, electron d0, centrality)
    ElectronPtVsD0,

    /// (electron pt, V0 proper decay length, centrality)
    ElectronPtVsDecayLength,

    /// (pair pt, V0 proper decay length, centrality)
    PairPtVsDecayLength,

    /// (electron pt, V0 DCA, centrality)
    ElectronPtVsDca,

    /// (Δφ, Δη) between the electron and the proton at the reference radius
    ProtonSeparation,

    /// (Δφ, Δη) between the electron and the pion at the reference radius
    PionSeparation,
}

/// Classification of a selected pair
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairClass {
    pub sign: SignCorrelation,
    pub window: MassWindow,
    pub topology: Topology,
    pub charge: ChargeSplit,
}

/// Identifier of a histogram-like sink
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SinkKey {
    Event(EventObservable),
    Pair {
        observable: PairObservable,
        origin: Origin,
        class: Option<PairClass>,
    },
}
//
impl Display for SinkKey {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            SinkKey::Event(observable) => write!(f, "event/{observable:?}"),
            SinkKey::Pair {
                observable,
                origin,
                class: None,
            } => write!(f, "pair/{observable:?}/{origin:?}"),
            SinkKey::Pair {
                observable,
                origin,
                class: Some(class),
            } => write!(
                f,
                "pair/{observable:?}/{origin:?}/{:?}/{:?}/{:?}/{:?}",
                class.sign, class.window, class.topology, class.charge
            ),
        }
    }
}

/// One row of per-candidate variables
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateRow {
    pub origin: Origin,
    pub species: V0Species,
    pub run_number: i32,
    pub event_in_file: u32,
    pub lepton_charge: i8,
    pub values: [Float; CandidateRow::NUM_VALUES],
}
//
impl CandidateRow {
    /// Number of floating-point columns
    pub const NUM_VALUES: usize = 29;

    /// Names of the floating-point columns, in storage order
    pub const VALUE_NAMES: [&'static str; Self::NUM_VALUES] = [
        "centrality",
        "mass",
        "pt",
        "rapidity",
        "px",
        "py",
        "pz",
        "electron_px",
        "electron_py",
        "electron_pz",
        "v0_px",
        "v0_py",
        "v0_pz",
        "v0_mass",
        "v0_decay_length",
        "v0_dca",
        "primary_vertex_x",
        "primary_vertex_y",
        "primary_vertex_z",
        "v0_vertex_x",
        "v0_vertex_y",
        "v0_vertex_z",
        "proton_px",
        "proton_py",
        "proton_pz",
        "pion_px",
        "pion_py",
        "pion_pz",
        "flip_mass",
    ];

    /// Names of all columns, in output order
    pub fn column_names() -> impl Iterator<Item = &'static str> {
        ["origin", "species", "run", "event", "charge"]
            .into_iter()
            .chain(Self::VALUE_NAMES)
    }
}

/// Destination of everything the analysis measures
pub trait Recorder {
    /// Record one tuple of values into a histogram-like sink
    fn fill(&mut self, key: SinkKey, values: &[Float]);

    /// Record one row of per-candidate variables
    fn record_row(&mut self, row: CandidateRow);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_correlation() {
        use SignCorrelation::*;
        use V0Species::*;
        assert_eq!(SignCorrelation::classify(1, Lambda), RightSign);
        assert_eq!(SignCorrelation::classify(-1, AntiLambda), RightSign);
        assert_eq!(SignCorrelation::classify(1, AntiLambda), WrongSign);
        assert_eq!(SignCorrelation::classify(-1, Lambda), WrongSign);

        // Conjugating both the lepton and the V0 preserves the class
        let [lambda, anti_lambda] = V0Species::ALL;
        for charge in [-1, 1] {
            assert_eq!(
                SignCorrelation::classify(charge, lambda),
                SignCorrelation::classify(-charge, anti_lambda)
            );
        }
    }

    #[test]
    fn key_names() {
        let key = SinkKey::Pair {
            observable: PairObservable::MassPt,
            origin: Origin::Mixed,
            class: Some(PairClass {
                sign: SignCorrelation::RightSign,
                window: MassWindow::Peak,
                topology: Topology::Away,
                charge: ChargeSplit::of(-1),
            }),
        };
        assert_eq!(key.to_string(), "pair/MassPt/Mixed/RightSign/Peak/Away/Negative");
        assert_eq!(
            SinkKey::Event(EventObservable::EventsVsRun).to_string(),
            "event/EventsVsRun"
        );
        assert_eq!(CandidateRow::column_names().count(), 5 + CandidateRow::NUM_VALUES);
    }
}
