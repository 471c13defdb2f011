//! Candidate selection, as provided by the experiment's cut objects
//!
//! The analysis only depends on the `CandidateSelector` trait. `WindowCuts`
//! is a simple implementation driven by the configuration file.

use crate::{
    candidate::PairKinematics,
    config::CutParameters,
    event::{Event, Track, V0},
    extract::V0Species,
    momentum::{from_xyzm, invariant_mass},
    numeric::{masses, Float},
};
use prefix_num_ops::real::*;

/// Outcome of the single-track electron selection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackDecision {
    /// The track fails the electron cuts
    Rejected,

    /// The track passes the electron cuts but comes from a photon conversion
    Conversion,

    /// The track passes the electron cuts
    Selected,
}

/// Λ invariant mass region of a V0 candidate
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MassWindow {
    /// Signal region around the Λ mass
    Peak,

    /// Background regions on both sides of the signal region
    Sideband,
}

/// Selection decisions needed by the analysis
pub trait CandidateSelector {
    /// Apply the single-track electron cuts to a track, whose PID information
    /// is carried by `pid_track`
    fn select_track(&self, track: &Track, pid_track: &Track, event: &Event) -> TrackDecision;

    /// Apply the single-V0 cuts
    fn select_v0(&self, v0: &V0, event: &Event) -> bool;

    /// Decide whether a V0 is a Λ or a Λ̄
    fn species(&self, v0: &V0) -> V0Species;

    /// Mass region of a V0 with a given invariant mass
    fn mass_window(&self, mass: Float) -> Option<MassWindow>;

    /// Apply the electron-V0 pair cuts
    fn select_pair(&self, pair: &PairKinematics) -> bool;
}

/// Opposite-sign electron pairs below this mass are photon conversions
const CONVERSION_MASS_MAX: Float = 0.05;

/// Mass window based candidate selection
#[derive(Clone, Debug)]
pub struct WindowCuts {
    params: CutParameters,
}
//
impl WindowCuts {
    /// Set up the selection from the configured cut parameters
    pub fn new(params: &CutParameters) -> Self {
        Self {
            params: params.clone(),
        }
    }

    /// Truth that a track has an opposite-sign partner with which it forms a
    /// low-mass e⁺e⁻ pair
    fn is_conversion(track: &Track, event: &Event) -> bool {
        let p_track = from_xyzm(&track.momentum, masses::ELECTRON);
        event
            .tracks
            .iter()
            .filter(|other| other.id != track.id && other.charge * track.charge < 0)
            .any(|other| {
                let p_other = from_xyzm(&other.momentum, masses::ELECTRON);
                invariant_mass(&(p_track + p_other)) < CONVERSION_MASS_MAX
            })
    }
}
//
impl CandidateSelector for WindowCuts {
    fn select_track(&self, track: &Track, pid_track: &Track, event: &Event) -> TrackDecision {
        let accepted = (track.filter_map & self.params.track_filter_mask) != 0
            && track.charge != 0
            && pid_track.charge == track.charge
            && track.pt() >= self.params.min_lepton_pt
            && abs(track.eta()) <= self.params.max_lepton_eta;
        if !accepted {
            TrackDecision::Rejected
        } else if Self::is_conversion(track, event) {
            TrackDecision::Conversion
        } else {
            TrackDecision::Selected
        }
    }

    fn select_v0(&self, v0: &V0, _event: &Event) -> bool {
        let mass = match self.species(v0) {
            V0Species::Lambda => v0.mass_lambda,
            V0Species::AntiLambda => v0.mass_anti_lambda,
        };
        v0.momentum.norm() > 0. && self.mass_window(mass).is_some()
    }

    fn species(&self, v0: &V0) -> V0Species {
        if abs(v0.mass_lambda - masses::LAMBDA) < self.params.lambda_mass_tolerance {
            V0Species::Lambda
        } else {
            V0Species::AntiLambda
        }
    }

    fn mass_window(&self, mass: Float) -> Option<MassWindow> {
        let distance = abs(mass - masses::LAMBDA);
        if distance < self.params.peak_half_width {
            Some(MassWindow::Peak)
        } else if distance >= self.params.sideband_inner && distance < self.params.sideband_outer {
            Some(MassWindow::Sideband)
        } else {
            None
        }
    }

    fn select_pair(&self, pair: &PairKinematics) -> bool {
        pair.cos_opening_angle > 0.
    }
}
