//! This module defines the reconstructed events handed over to the analysis

use crate::{
    momentum::{pseudorapidity, transverse, ThreeVector},
    numeric::{masses, Float},
};
use std::collections::{hash_map::Entry, HashMap};

/// Reconstructed track
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    /// Track identifier
    ///
    /// Tracking-only surrogate tracks carry `-(id + 1)`, where `id` is the
    /// identifier of the global track which holds their PID information.
    ///
    pub id: i32,

    /// Momentum at the primary vertex (GeV/c)
    pub momentum: ThreeVector,

    /// Electric charge in units of e
    pub charge: i8,

    /// Signed transverse impact parameter to the primary vertex (cm)
    pub d0: Float,

    /// Position of the track once propagated to the reference radius (cm)
    pub position_at_radius: ThreeVector,

    /// Reconstruction filter bits
    pub filter_map: u32,

    /// Number of TPC clusters
    pub tpc_clusters: u16,
}
//
impl Track {
    /// Transverse momentum
    pub fn pt(&self) -> Float {
        transverse(&self.momentum)
    }

    /// Pseudorapidity
    pub fn eta(&self) -> Float {
        pseudorapidity(&self.momentum)
    }

    /// Truth that this is a tracking-only surrogate of another track
    pub fn is_surrogate(&self) -> bool {
        self.id < 0
    }
}

/// Reconstructed V0 (neutral two-prong decay) candidate
#[derive(Clone, Debug, PartialEq)]
pub struct V0 {
    /// Total momentum (GeV/c)
    pub momentum: ThreeVector,

    /// Invariant mass under the Λ → p π⁻ hypothesis
    pub mass_lambda: Float,

    /// Invariant mass under the Λ̄ → p̄ π⁺ hypothesis
    pub mass_anti_lambda: Float,

    /// Position of the decay vertex (cm)
    pub decay_vertex: ThreeVector,

    /// Distance of closest approach of the V0 to the primary vertex (cm)
    pub dca_to_primary: Float,

    /// Identifiers of the positive and negative daughter tracks
    pub daughter_ids: [i32; 2],

    /// Momenta of the positive and negative daughters
    pub daughter_momenta: [ThreeVector; 2],

    /// Positions of the positive and negative daughters at the reference
    /// radius
    pub daughter_positions: [ThreeVector; 2],
}
//
impl V0 {
    /// Index of the positive daughter in the daughter arrays
    pub const POSITIVE: usize = 0;

    /// Index of the negative daughter in the daughter arrays
    pub const NEGATIVE: usize = 1;

    /// Proper decay length, assuming the Λ mass
    pub fn proper_decay_length(&self, primary_vertex: &ThreeVector) -> Float {
        (self.decay_vertex - primary_vertex).norm() * masses::LAMBDA / self.momentum.norm()
    }

    /// Truth that a track is one of the V0 daughters
    pub fn has_daughter(&self, track_id: i32) -> bool {
        self.daughter_ids.contains(&track_id)
    }
}

/// Reconstructed collision event
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// Position of the event in the processed stream
    pub sequence: u64,

    /// Run number
    pub run_number: i32,

    /// Number of the event within its input file
    pub event_in_file: u32,

    /// Primary vertex position (cm), if one was reconstructed
    pub primary_vertex: Option<ThreeVector>,

    /// Centrality percentile
    pub centrality: Float,

    /// Magnetic field (kG)
    pub magnetic_field: Float,

    /// Reconstructed tracks
    pub tracks: Vec<Track>,

    /// Reconstructed V0s
    pub v0s: Vec<V0>,
}

/// Per-event lookup table from track identifiers to tracks
///
/// Used to resolve tracking-only surrogates to the global tracks holding
/// their PID information. Only lives as long as the event it was built from.
///
pub struct TrackReferences<'event> {
    tracks: &'event [Track],
    by_id: HashMap<i32, usize>,
}
//
impl<'event> TrackReferences<'event> {
    /// Index the global tracks of an event
    pub fn new(tracks: &'event [Track]) -> Self {
        let mut by_id = HashMap::with_capacity(tracks.len());
        for (index, track) in tracks.iter().enumerate() {
            if track.is_surrogate() {
                continue;
            }
            match by_id.entry(track.id) {
                Entry::Vacant(entry) => {
                    entry.insert(index);
                }
                Entry::Occupied(mut entry) => {
                    // Tracks without filter bits nor TPC clusters never
                    // replace a stored track
                    if track.filter_map == 0 && track.tpc_clusters == 0 {
                        continue;
                    }
                    let stored: &Track = &tracks[*entry.get()];
                    if stored.filter_map != 0 || stored.tpc_clusters != 0 {
                        tracing::warn!(
                            id = track.id,
                            stored_clusters = stored.tpc_clusters,
                            new_clusters = track.tpc_clusters,
                            stored_filter_map = stored.filter_map,
                            new_filter_map = track.filter_map,
                            "Global track information already present"
                        );
                    }
                    entry.insert(index);
                }
            }
        }
        Self { tracks, by_id }
    }

    /// Global track with a given identifier
    pub fn get(&self, id: i32) -> Option<&'event Track> {
        self.by_id.get(&id).map(|&index| &self.tracks[index])
    }

    /// Track which holds the PID information of a given track
    pub fn pid_track(&self, track: &'event Track) -> Option<&'event Track> {
        if track.is_surrogate() {
            // -(id + 1) cannot overflow for negative identifiers
            self.get(-1 - track.id)
        } else {
            Some(track)
        }
    }
}
