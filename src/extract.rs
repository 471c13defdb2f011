//! Per-event extraction of the electrons and V0s used for pairing, and the
//! event records in which they are kept for event mixing

use crate::{
    event::{Event, Track, TrackReferences, V0},
    momentum::{from_xyzm, Momentum, ThreeVector},
    numeric::{masses, Float},
    selection::{CandidateSelector, TrackDecision},
};
use thiserror::Error;

/// Number of V0 species buckets
pub const NUM_SPECIES: usize = 2;

/// Particle/antiparticle identity of a V0 candidate
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum V0Species {
    /// Λ → p π⁻
    Lambda,

    /// Λ̄ → p̄ π⁺
    AntiLambda,
}
//
impl V0Species {
    /// All species, in the order in which their buckets are visited
    pub const ALL: [V0Species; NUM_SPECIES] = [V0Species::Lambda, V0Species::AntiLambda];

    /// Charge of the parent baryon expected to produce this V0 in a
    /// semileptonic decay along with a positive lepton
    pub fn parent_charge(self) -> i8 {
        match self {
            V0Species::Lambda => 1,
            V0Species::AntiLambda => -1,
        }
    }

    /// Bucket index of this species
    pub fn bucket(self) -> usize {
        self as usize
    }

    /// Mass of a V0 under this species hypothesis
    pub fn hypothesis_mass(self, v0: &V0) -> Float {
        match self {
            V0Species::Lambda => v0.mass_lambda,
            V0Species::AntiLambda => v0.mass_anti_lambda,
        }
    }
}

/// Electron-like track, as needed for pairing
#[derive(Clone, Debug, PartialEq)]
pub struct LeptonTrack {
    /// Identifier of the track holding the PID information
    pub pid_id: i32,

    /// 4-momentum under the electron mass hypothesis
    pub momentum: Momentum,

    /// Electric charge
    pub charge: i8,

    /// Signed transverse impact parameter (cm)
    pub d0: Float,

    /// Position at the reference radius (cm)
    pub position: ThreeVector,
}
//
impl LeptonTrack {
    /// Extract the pairing information from a track
    pub fn new(track: &Track, pid_track: &Track) -> Self {
        Self {
            pid_id: pid_track.id,
            momentum: from_xyzm(&track.momentum, masses::ELECTRON),
            charge: track.charge,
            d0: track.d0,
            position: track.position_at_radius,
        }
    }
}

/// Auxiliary V0 data needed by the pair cuts
#[derive(Clone, Debug, PartialEq)]
pub struct V0Aux {
    /// Position of the (anti)proton daughter at the reference radius
    pub proton_position: ThreeVector,

    /// Position of the pion daughter at the reference radius
    pub pion_position: ThreeVector,

    /// Decay vertex position
    pub decay_vertex: ThreeVector,

    /// Momentum of the (anti)proton daughter
    pub proton_momentum: ThreeVector,

    /// Momentum of the pion daughter
    pub pion_momentum: ThreeVector,
}

/// V0 candidate extracted from an event
#[derive(Clone, Debug, PartialEq)]
pub struct V0Candidate {
    /// 4-momentum under the species mass hypothesis
    pub momentum: Momentum,

    /// Proper decay length (cm)
    pub decay_length: Float,

    /// Distance of closest approach to the primary vertex (cm)
    pub dca: Float,

    /// Auxiliary data
    pub aux: V0Aux,
}
//
impl V0Candidate {
    /// Extract the pairing information from a V0 of known species
    pub fn new(v0: &V0, species: V0Species, primary_vertex: &ThreeVector) -> Self {
        let (proton, pion) = match species {
            V0Species::Lambda => (V0::POSITIVE, V0::NEGATIVE),
            V0Species::AntiLambda => (V0::NEGATIVE, V0::POSITIVE),
        };
        Self {
            momentum: from_xyzm(&v0.momentum, species.hypothesis_mass(v0)),
            decay_length: v0.proper_decay_length(primary_vertex),
            dca: v0.dca_to_primary,
            aux: V0Aux {
                proton_position: v0.daughter_positions[proton],
                pion_position: v0.daughter_positions[pion],
                decay_vertex: v0.decay_vertex,
                proton_momentum: v0.daughter_momenta[proton],
                pion_momentum: v0.daughter_momenta[pion],
            },
        }
    }

    /// Borrow this candidate for pairing
    pub fn view(&self, species: V0Species) -> V0View<'_> {
        V0View {
            species,
            momentum: &self.momentum,
            decay_length: self.decay_length,
            dca: self.dca,
            aux: &self.aux,
        }
    }
}

/// Borrowed V0 candidate, whether from the current event or a stored one
#[derive(Clone, Copy, Debug)]
pub struct V0View<'a> {
    pub species: V0Species,
    pub momentum: &'a Momentum,
    pub decay_length: Float,
    pub dca: Float,
    pub aux: &'a V0Aux,
}

/// Stored columns disagree on the number of candidates they hold
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error(
    "{species:?} columns disagree: {momenta} momenta, {decay_lengths} decay lengths, \
     {dcas} DCAs, {aux} auxiliary vectors"
)]
pub struct ColumnMismatch {
    pub species: V0Species,
    pub momenta: usize,
    pub decay_lengths: usize,
    pub dcas: usize,
    pub aux: usize,
}

/// Parallel columns of the V0 candidates of one species
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CandidateColumns {
    pub(crate) momenta: Vec<Momentum>,
    pub(crate) decay_lengths: Vec<Float>,
    pub(crate) dcas: Vec<Float>,
    pub(crate) aux: Vec<V0Aux>,
}
//
impl CandidateColumns {
    /// Append a candidate to every column
    pub fn push(&mut self, candidate: V0Candidate) {
        self.momenta.push(candidate.momentum);
        self.decay_lengths.push(candidate.decay_length);
        self.dcas.push(candidate.dca);
        self.aux.push(candidate.aux);
    }

    /// Number of candidates, checking that all columns agree on it
    pub fn checked_len(&self, species: V0Species) -> Result<usize, ColumnMismatch> {
        let len = self.momenta.len();
        if self.decay_lengths.len() == len && self.dcas.len() == len && self.aux.len() == len {
            Ok(len)
        } else {
            Err(ColumnMismatch {
                species,
                momenta: len,
                decay_lengths: self.decay_lengths.len(),
                dcas: self.dcas.len(),
                aux: self.aux.len(),
            })
        }
    }

    /// Iterate over the candidates, after checking column consistency
    pub fn iter(
        &self,
        species: V0Species,
    ) -> Result<impl Iterator<Item = V0View<'_>> + '_, ColumnMismatch> {
        let len = self.checked_len(species)?;
        Ok((0..len).map(move |idx| V0View {
            species,
            momentum: &self.momenta[idx],
            decay_length: self.decay_lengths[idx],
            dca: self.dcas[idx],
            aux: &self.aux[idx],
        }))
    }

    /// Number of candidates according to the momentum column
    pub fn len(&self) -> usize {
        self.momenta.len()
    }
}

/// Per-species V0 columns
pub type SpeciesBuckets = [CandidateColumns; NUM_SPECIES];

/// Snapshot of an event as stored in a mixing pool
#[derive(Clone, Debug, PartialEq)]
pub struct EventRecord {
    /// Primary vertex z coordinate
    pub vertex_z: Float,

    /// Centrality percentile
    pub centrality: Float,

    /// Free-form identification of the event
    pub event_info: String,

    /// V0 candidates, per species
    pub buckets: SpeciesBuckets,
}
//
impl EventRecord {
    /// Candidates of one species
    pub fn bucket(&self, species: V0Species) -> &CandidateColumns {
        &self.buckets[species.bucket()]
    }
}

/// Electrons and V0s of the current event, in the layout of event records
///
/// A fresh working list is built for every event. It is either appended to
/// a mixing pool as a new event record, or dropped at the end of the event.
///
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkingList {
    /// Electron-like tracks to be paired with stored V0s
    pub leptons: Vec<LeptonTrack>,

    /// V0 candidates, per species
    pub buckets: SpeciesBuckets,
}
//
impl WorkingList {
    /// Total number of V0 candidates, across species
    pub fn num_candidates(&self) -> usize {
        self.buckets.iter().map(CandidateColumns::len).sum()
    }

    /// Package the V0 candidates into an event record
    pub fn into_record(self, vertex_z: Float, centrality: Float, event_info: String) -> EventRecord {
        EventRecord {
            vertex_z,
            centrality,
            event_info,
            buckets: self.buckets,
        }
    }
}

/// V0 passing the selection, along with its source V0
pub struct SelectedV0<'event> {
    pub v0: &'event V0,
    pub species: V0Species,
    pub candidate: V0Candidate,
}

/// Output of the per-event extraction
pub struct Extraction<'event> {
    /// Number of tracks passing the electron cuts, conversions included
    pub num_passing_tracks: usize,

    /// Electrons used for same-event pairing (conversions excluded)
    pub electrons: Vec<LeptonTrack>,

    /// V0s used for same-event pairing
    pub v0s: Vec<SelectedV0<'event>>,

    /// Lists kept for event mixing
    pub working: WorkingList,
}

/// Run the electron and V0 selections on an event
///
/// When `mix_without_conversion` is set, conversion electrons are kept out of
/// the mixing lepton list like they are kept out of same-event pairing.
///
pub fn extract<'event>(
    event: &'event Event,
    primary_vertex: &ThreeVector,
    refs: &TrackReferences<'event>,
    selector: &impl CandidateSelector,
    mix_without_conversion: bool,
) -> Extraction<'event> {
    let mut extraction = Extraction {
        num_passing_tracks: 0,
        electrons: Vec::new(),
        v0s: Vec::new(),
        working: WorkingList::default(),
    };

    for track in &event.tracks {
        // Surrogates whose original cannot be found carry no usable PID
        let Some(pid_track) = refs.pid_track(track) else {
            continue;
        };
        let decision = selector.select_track(track, pid_track, event);
        if decision == TrackDecision::Rejected {
            continue;
        }
        extraction.num_passing_tracks += 1;

        let lepton = LeptonTrack::new(track, pid_track);
        let is_conversion = decision == TrackDecision::Conversion;
        if !(is_conversion && mix_without_conversion) {
            extraction.working.leptons.push(lepton.clone());
        }
        if !is_conversion {
            extraction.electrons.push(lepton);
        }
    }

    for v0 in &event.v0s {
        if !selector.select_v0(v0, event) {
            continue;
        }
        let species = selector.species(v0);
        let candidate = V0Candidate::new(v0, species, primary_vertex);
        extraction.working.buckets[species.bucket()].push(candidate.clone());
        extraction.v0s.push(SelectedV0 {
            v0,
            species,
            candidate,
        });
    }

    extraction
}
