//! This module provides a toy source of reconstructed events
//!
//! The events are not meant to be physically accurate. They only need to
//! exercise every path of the analysis: rejected events, events outside of
//! the mixing pools, surrogate tracks, V0 daughters among the electron
//! candidates, and V0 masses populating both the peak and the sidebands.

use crate::{
    event::{Event, Track, V0},
    momentum::ThreeVector,
    numeric::{floats::consts::PI, masses, Float},
    random::RandomGenerator,
};
use prefix_num_ops::real::*;

/// Run numbers of the generated events, spanning all known run periods and
/// one unknown run
const RUN_NUMBERS: [i32; 4] = [120_000, 168_500, 195_400, 246_000];

/// Radius at which track positions are reported (cm)
const REFERENCE_RADIUS: Float = 125.;

/// Filter bit of tracking-only surrogate tracks
const SURROGATE_FILTER_BIT: u32 = 1 << 7;

/// Generator of toy events
pub struct EventGenerator {
    /// Standard deviation of the primary vertex z coordinate (cm)
    vertex_z_sigma: Float,

    /// Maximal number of primary tracks per event
    max_tracks: usize,

    /// Maximal number of V0s per event
    max_v0s: usize,
}
//
impl EventGenerator {
    /// Set up the default toy event source
    pub fn new() -> Self {
        Self {
            vertex_z_sigma: 6.,
            max_tracks: 8,
            max_v0s: 3,
        }
    }

    /// Generate the event with a given sequence number
    pub fn generate(&self, sequence: u64, rng: &mut RandomGenerator) -> Event {
        let [run_roll, field_roll, vertex_roll, cent_roll, ntrk_roll, nv0_roll] =
            rng.random_array::<6>();
        let run_number = RUN_NUMBERS[((run_roll * RUN_NUMBERS.len() as Float) as usize)
            .min(RUN_NUMBERS.len() - 1)];

        // A few events are recorded with the magnet off or without vertex
        let magnetic_field = if field_roll < 0.02 {
            0.
        } else if field_roll < 0.51 {
            -5.
        } else {
            5.
        };
        let primary_vertex = (vertex_roll >= 0.01).then(|| {
            ThreeVector::new(
                0.01 * gaussian(rng),
                0.01 * gaussian(rng),
                self.vertex_z_sigma * gaussian(rng),
            )
        });

        // Centrality overflows its range now and then
        let centrality = 105. * cent_roll;

        let mut tracks = Vec::new();
        let num_tracks = 1 + (ntrk_roll * self.max_tracks as Float) as usize;
        for _ in 0..num_tracks {
            let id = tracks.len() as i32;
            let momentum = isotropic(rng) * (0.3 - 0.7 * ln(rng.random_positive()));
            let charge = if rng.random() < 0.5 { -1 } else { 1 };
            tracks.push(track(id, momentum, charge, rng));
        }

        let mut v0s = Vec::new();
        let num_v0s = (nv0_roll * (self.max_v0s + 1) as Float) as usize;
        let origin = primary_vertex.unwrap_or_else(ThreeVector::zeros);
        for _ in 0..num_v0s {
            let v0 = self.v0(&origin, &mut tracks, rng);
            v0s.push(v0);
        }

        // Tracking-only copies of some tracks, pointing to their original
        let num_globals = tracks.len();
        for idx in 0..num_globals {
            if rng.random() < 0.1 {
                let original = &tracks[idx];
                let mut surrogate = original.clone();
                surrogate.id = -original.id - 1;
                surrogate.filter_map = SURROGATE_FILTER_BIT;
                surrogate.momentum *= 1. + 0.01 * gaussian(rng);
                tracks.push(surrogate);
            }
        }

        Event {
            sequence,
            run_number,
            event_in_file: (sequence % 1000) as u32,
            primary_vertex,
            centrality,
            magnetic_field,
            tracks,
            v0s,
        }
    }

    /// Generate a V0, appending its daughters to the event's tracks
    fn v0(&self, origin: &ThreeVector, tracks: &mut Vec<Track>, rng: &mut RandomGenerator) -> V0 {
        let direction = isotropic(rng);
        let momentum = direction * (0.5 - ln(rng.random_positive()));
        let decay_vertex = origin + direction * (-5. * ln(rng.random_positive()));

        // Λ/Λ̄ masses are mostly on peak, with a flat background underneath
        let is_lambda = rng.random() < 0.5;
        let measured_mass = if rng.random() < 0.7 {
            masses::LAMBDA + 0.003 * gaussian(rng)
        } else {
            masses::LAMBDA + 0.08 * (rng.random() - 0.5)
        };
        let other_mass = masses::LAMBDA + 0.1 + 0.2 * rng.random();
        let (mass_lambda, mass_anti_lambda) = if is_lambda {
            (measured_mass, other_mass)
        } else {
            (other_mass, measured_mass)
        };

        // Daughters share the momentum unevenly, the baryon takes the most
        let baryon_share = 0.7 + 0.2 * rng.random();
        let kick = isotropic(rng) * 0.05;
        let (positive_share, negative_share) = if is_lambda {
            (baryon_share, 1. - baryon_share)
        } else {
            (1. - baryon_share, baryon_share)
        };
        let positive_momentum = momentum * positive_share + kick;
        let negative_momentum = momentum * negative_share - kick;

        let positive_id = tracks.len() as i32;
        let positive = track(positive_id, positive_momentum, 1, rng);
        let negative = track(positive_id + 1, negative_momentum, -1, rng);
        let daughter_positions = [positive.position_at_radius, negative.position_at_radius];
        tracks.push(positive);
        tracks.push(negative);

        V0 {
            momentum,
            mass_lambda,
            mass_anti_lambda,
            decay_vertex,
            dca_to_primary: 0.1 * rng.random(),
            daughter_ids: [positive_id, positive_id + 1],
            daughter_momenta: [positive_momentum, negative_momentum],
            daughter_positions,
        }
    }
}
//
impl Default for EventGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a global track with a given momentum
fn track(id: i32, momentum: ThreeVector, charge: i8, rng: &mut RandomGenerator) -> Track {
    Track {
        id,
        momentum,
        charge,
        d0: 0.005 * gaussian(rng),
        position_at_radius: momentum.normalize() * REFERENCE_RADIUS,
        filter_map: 1,
        tpc_clusters: 70 + (90. * rng.random()) as u16,
    }
}

/// Random unit vector, uniformly distributed on the sphere
fn isotropic(rng: &mut RandomGenerator) -> ThreeVector {
    let [cos_theta_roll, phi_roll] = rng.random_array::<2>();
    let cos_theta = 2. * cos_theta_roll - 1.;
    let sin_theta = sqrt(1. - cos_theta * cos_theta);
    let phi = 2. * PI * phi_roll;
    ThreeVector::new(sin_theta * cos(phi), sin_theta * sin(phi), cos_theta)
}

/// Normally distributed random number (Box-Muller)
fn gaussian(rng: &mut RandomGenerator) -> Float {
    let radius = sqrt(-2. * ln(rng.random_positive()));
    radius * cos(2. * PI * rng.random())
}
