//! This module computes the kinematics of electron-V0 pairs and reports them
//! to a `Recorder`

use crate::{
    config::Configuration,
    extract::{LeptonTrack, V0View},
    momentum::{
        delta_azimuth, invariant_mass, pseudorapidity, transverse, xyz, Momentum, ThreeVector, E,
        X, Y, Z,
    },
    numeric::{masses, Float},
    recorder::{
        CandidateRow, ChargeSplit, Origin, PairClass, PairObservable, Recorder, SignCorrelation,
        SinkKey, Topology,
    },
    selection::CandidateSelector,
};
use prefix_num_ops::real::*;

/// Reflect a vector about the direction of `axis`
///
/// Applying this twice with the same axis gives back the original vector.
///
pub fn flip_about(v: &ThreeVector, axis: &ThreeVector) -> ThreeVector {
    let unit = axis.normalize();
    v - 2. * v.dot(&unit) * unit
}

/// Kinematics of an electron-V0 pair
#[derive(Clone, Debug, PartialEq)]
pub struct PairKinematics {
    /// Summed 4-momentum, with nominal electron and Λ masses
    pub sum: Momentum,

    /// Invariant mass
    pub mass: Float,

    /// Transverse momentum
    pub pt: Float,

    /// Rapidity
    pub rapidity: Float,

    /// Cosine of the angle between the electron and the V0
    pub cos_opening_angle: Float,

    /// Invariant mass of the flipped pair, with the same energy
    pub flip_mass: Float,

    /// Transverse momentum of the flipped pair
    pub flip_pt: Float,
}
//
impl PairKinematics {
    /// Compute the pair kinematics from the electron and V0 3-momenta
    pub fn new(lepton: &ThreeVector, v0: &ThreeVector) -> Self {
        let energy = sqrt(lepton.norm_squared() + masses::ELECTRON * masses::ELECTRON)
            + sqrt(v0.norm_squared() + masses::LAMBDA * masses::LAMBDA);
        let p_sum = lepton + v0;
        let sum = Momentum::new(p_sum[X], p_sum[Y], p_sum[Z], energy);
        let rapidity = 0.5 * ln((sum[E] + sum[Z]) / (sum[E] - sum[Z]));
        let cos_opening_angle = lepton.dot(v0) / (lepton.norm() * v0.norm());

        let p_flip = lepton + flip_about(v0, lepton);
        let flip_mass = sqrt(energy * energy - p_flip.norm_squared());

        Self {
            mass: invariant_mass(&sum),
            pt: transverse(&p_sum),
            rapidity,
            cos_opening_angle,
            flip_mass,
            flip_pt: transverse(&p_flip),
            sum,
        }
    }
}

/// Separation in (Δφ, Δη) of two positions at the reference radius
pub fn angular_separation(a: &ThreeVector, b: &ThreeVector) -> (Float, Float) {
    (
        delta_azimuth(a, b),
        pseudorapidity(a) - pseudorapidity(b),
    )
}

/// Event-level information attached to every pair of an event
#[derive(Clone, Debug, PartialEq)]
pub struct EventContext {
    pub centrality: Float,
    pub primary_vertex: ThreeVector,
    pub run_number: i32,
    pub event_in_file: u32,
}

/// Builds electron-V0 candidates and dispatches them to a recorder
pub struct CandidateBuilder<'sel, S: CandidateSelector> {
    selector: &'sel S,
    low_mass_max: Float,
    flip_mass_max: Float,
    write_rows: bool,
}
//
impl<'sel, S: CandidateSelector> CandidateBuilder<'sel, S> {
    /// Prepare candidate building
    pub fn new(cfg: &Configuration, selector: &'sel S) -> Self {
        Self {
            selector,
            low_mass_max: cfg.low_mass_max,
            flip_mass_max: cfg.flip_mass_max,
            write_rows: cfg.write_candidate_rows,
        }
    }

    /// Build one candidate and record everything that is known about it
    pub fn build(
        &self,
        lepton: &LeptonTrack,
        v0: V0View,
        origin: Origin,
        context: &EventContext,
        recorder: &mut impl Recorder,
    ) {
        let p_lepton = xyz(&lepton.momentum);
        let p_v0 = xyz(v0.momentum);
        let pair = PairKinematics::new(&p_lepton, &p_v0);
        let v0_mass = invariant_mass(v0.momentum);
        let centrality = context.centrality;

        if self.write_rows {
            recorder.record_row(CandidateRow {
                origin,
                species: v0.species,
                run_number: context.run_number,
                event_in_file: context.event_in_file,
                lepton_charge: lepton.charge,
                values: [
                    centrality,
                    pair.mass,
                    pair.pt,
                    pair.rapidity,
                    pair.sum[X],
                    pair.sum[Y],
                    pair.sum[Z],
                    p_lepton[X],
                    p_lepton[Y],
                    p_lepton[Z],
                    p_v0[X],
                    p_v0[Y],
                    p_v0[Z],
                    v0_mass,
                    v0.decay_length,
                    v0.dca,
                    context.primary_vertex[X],
                    context.primary_vertex[Y],
                    context.primary_vertex[Z],
                    v0.aux.decay_vertex[X],
                    v0.aux.decay_vertex[Y],
                    v0.aux.decay_vertex[Z],
                    v0.aux.proton_momentum[X],
                    v0.aux.proton_momentum[Y],
                    v0.aux.proton_momentum[Z],
                    v0.aux.pion_momentum[X],
                    v0.aux.pion_momentum[Y],
                    v0.aux.pion_momentum[Z],
                    pair.flip_mass,
                ],
            });
        }

        let inclusive = SinkKey::Pair {
            observable: PairObservable::Inclusive,
            origin,
            class: None,
        };
        recorder.fill(inclusive, &[pair.mass, pair.pt, centrality]);

        let Some(window) = self.selector.mass_window(v0_mass) else {
            return;
        };
        let sign = SignCorrelation::classify(lepton.charge, v0.species);
        let splits = [ChargeSplit::Inclusive, ChargeSplit::of(lepton.charge)];
        let lepton_pt = transverse(&p_lepton);

        if self.selector.select_pair(&pair) {
            let (proton_dphi, proton_deta) =
                angular_separation(&lepton.position, &v0.aux.proton_position);
            let (pion_dphi, pion_deta) =
                angular_separation(&lepton.position, &v0.aux.pion_position);
            for charge in splits {
                let mut fill = |observable, values: &[Float]| {
                    let class = PairClass {
                        sign,
                        window,
                        topology: Topology::Direct,
                        charge,
                    };
                    let key = SinkKey::Pair {
                        observable,
                        origin,
                        class: Some(class),
                    };
                    recorder.fill(key, values);
                };
                fill(PairObservable::MassPt, &[pair.mass, pair.pt, centrality]);
                fill(
                    PairObservable::MassVsElectronPt,
                    &[pair.mass, lepton_pt, centrality],
                );
                if pair.mass < self.low_mass_max {
                    use PairObservable::*;
                    fill(ElectronPt, &[lepton_pt, centrality]);
                    fill(
                        ElectronPtVsEta,
                        &[lepton_pt, pseudorapidity(&p_lepton), centrality],
                    );
                    fill(
                        ElectronPtVsV0Pt,
                        &[lepton_pt, transverse(&p_v0), centrality],
                    );
                    fill(ElectronPtVsD0, &[lepton_pt, lepton.d0, centrality]);
                    fill(
                        ElectronPtVsDecayLength,
                        &[lepton_pt, v0.decay_length, centrality],
                    );
                    fill(
                        PairPtVsDecayLength,
                        &[pair.pt, v0.decay_length, centrality],
                    );
                    fill(ElectronPtVsDca, &[lepton_pt, v0.dca, centrality]);
                }
                fill(PairObservable::ProtonSeparation, &[proton_dphi, proton_deta]);
                fill(PairObservable::PionSeparation, &[pion_dphi, pion_deta]);
            }
        }

        if pair.flip_mass < self.flip_mass_max && pair.cos_opening_angle < 0. {
            for charge in splits {
                let mut fill = |observable, values: &[Float]| {
                    let class = PairClass {
                        sign,
                        window,
                        topology: Topology::Away,
                        charge,
                    };
                    let key = SinkKey::Pair {
                        observable,
                        origin,
                        class: Some(class),
                    };
                    recorder.fill(key, values);
                };
                fill(
                    PairObservable::MassPt,
                    &[pair.flip_mass, pair.flip_pt, centrality],
                );
                if pair.flip_mass < self.low_mass_max {
                    fill(
                        PairObservable::PairPtVsDecayLength,
                        &[pair.flip_pt, v0.decay_length, centrality],
                    );
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        config::tests::test_config,
        extract::{tests::candidate, V0Species},
        momentum::from_xyzm,
        selection::{MassWindow, WindowCuts},
    };
    use assert_approx_eq::assert_approx_eq;
    use std::collections::BTreeMap;

    /// Recorder which remembers everything it is told
    #[derive(Default)]
    pub(crate) struct MemoryRecorder {
        pub(crate) fills: BTreeMap<SinkKey, Vec<Vec<Float>>>,
        pub(crate) rows: Vec<CandidateRow>,
    }
    //
    impl MemoryRecorder {
        pub(crate) fn count(&self, key: &SinkKey) -> usize {
            self.fills.get(key).map_or(0, Vec::len)
        }

        pub(crate) fn count_pairs(&self, observable: PairObservable, origin: Origin) -> usize {
            self.fills
                .iter()
                .filter(|(key, _)| {
                    matches!(key, SinkKey::Pair { observable: o, origin: g, .. }
                             if *o == observable && *g == origin)
                })
                .map(|(_, fills)| fills.len())
                .sum()
        }
    }
    //
    impl Recorder for MemoryRecorder {
        fn fill(&mut self, key: SinkKey, values: &[Float]) {
            self.fills.entry(key).or_default().push(values.to_owned());
        }

        fn record_row(&mut self, row: CandidateRow) {
            self.rows.push(row);
        }
    }

    pub(crate) fn lepton(momentum: [Float; 3], charge: i8) -> LeptonTrack {
        let momentum = ThreeVector::from(momentum);
        LeptonTrack {
            pid_id: 0,
            momentum: from_xyzm(&momentum, masses::ELECTRON),
            charge,
            d0: 0.002,
            position: momentum.normalize() * 125.,
        }
    }

    pub(crate) fn context() -> EventContext {
        EventContext {
            centrality: 25.,
            primary_vertex: ThreeVector::new(0.01, -0.02, 1.5),
            run_number: 120000,
            event_in_file: 4,
        }
    }

    fn class_key(
        observable: PairObservable,
        origin: Origin,
        sign: SignCorrelation,
        topology: Topology,
        charge: ChargeSplit,
    ) -> SinkKey {
        SinkKey::Pair {
            observable,
            origin,
            class: Some(PairClass {
                sign,
                window: MassWindow::Peak,
                topology,
                charge,
            }),
        }
    }

    #[test]
    fn pair_kinematics() {
        let e = ThreeVector::new(1., 0., 0.);
        let v = ThreeVector::new(0., 2., 0.);
        let pair = PairKinematics::new(&e, &v);
        let energy = sqrt(1. + masses::ELECTRON.powi(2)) + sqrt(4. + masses::LAMBDA.powi(2));
        assert_approx_eq!(pair.sum[E], energy, 1e-12);
        assert_approx_eq!(pair.mass, sqrt(energy * energy - 5.), 1e-12);
        assert_approx_eq!(pair.pt, sqrt(5.), 1e-12);
        assert_approx_eq!(pair.rapidity, 0., 1e-12);
        assert_approx_eq!(pair.cos_opening_angle, 0., 1e-12);

        // A V0 orthogonal to the electron is left alone by the flip
        assert_approx_eq!(pair.flip_mass, pair.mass, 1e-9);
        assert_approx_eq!(pair.flip_pt, pair.pt, 1e-9);
    }

    #[test]
    fn flip_is_an_involution() {
        let axes = [
            ThreeVector::new(1., 0., 0.),
            ThreeVector::new(0.3, -0.7, 2.1),
            ThreeVector::new(-5., 4., 0.01),
        ];
        let vectors = [
            ThreeVector::new(0., 1., 0.),
            ThreeVector::new(1.2, 3.4, -0.5),
            ThreeVector::new(-0.1, 0.02, 7.),
        ];
        for axis in &axes {
            for v in &vectors {
                let flipped = flip_about(v, axis);
                assert_approx_eq!(flipped.norm(), v.norm(), 1e-9);
                let back = flip_about(&flipped, axis);
                assert_approx_eq!((back - v).norm(), 0., 1e-9);
            }
        }

        // The component along the axis changes sign
        let flipped = flip_about(&ThreeVector::new(2., 1., 0.), &ThreeVector::new(3., 0., 0.));
        assert_eq!(flipped, ThreeVector::new(-2., 1., 0.));
    }

    #[test]
    fn separation() {
        let a = ThreeVector::new(125., 0., 0.);
        let b = ThreeVector::new(0., 125., 0.);
        let (dphi, deta) = angular_separation(&a, &b);
        assert_approx_eq!(dphi, -crate::numeric::floats::consts::FRAC_PI_2, 1e-12);
        assert_approx_eq!(deta, 0., 1e-12);
    }

    #[test]
    fn right_sign_near_pair_dispatch() {
        let cfg = test_config();
        let cuts = WindowCuts::new(&cfg.cuts);
        let builder = CandidateBuilder::new(&cfg, &cuts);
        let mut recorder = MemoryRecorder::default();

        // Soft collinear e+ Λ pair, well below the low mass limit
        let e = lepton([0.6, 0.1, 0.], 1);
        let v0 = candidate([0.8, 0.2, 0.1], V0Species::Lambda);
        builder.build(
            &e,
            v0.view(V0Species::Lambda),
            Origin::Mixed,
            &context(),
            &mut recorder,
        );

        assert_eq!(recorder.rows.len(), 1);
        assert_eq!(recorder.rows[0].origin, Origin::Mixed);
        assert_eq!(recorder.rows[0].run_number, 120000);
        let column = |name| {
            let idx = CandidateRow::VALUE_NAMES.iter().position(|&n| n == name).unwrap();
            recorder.rows[0].values[idx]
        };
        assert_eq!(column("centrality"), 25.);
        assert_eq!(column("v0_vertex_z"), v0.aux.decay_vertex[Z]);
        assert_eq!(column("proton_px"), 0.8 * 0.8);
        assert_eq!(column("pion_py"), 0.2 * 0.2);
        assert_eq!(column("primary_vertex_z"), 1.5);
        let inclusive = SinkKey::Pair {
            observable: PairObservable::Inclusive,
            origin: Origin::Mixed,
            class: None,
        };
        assert_eq!(recorder.count(&inclusive), 1);
        assert_eq!(recorder.fills[&inclusive][0][2], 25.);

        for charge in [ChargeSplit::Inclusive, ChargeSplit::Positive] {
            let key = |observable| {
                class_key(
                    observable,
                    Origin::Mixed,
                    SignCorrelation::RightSign,
                    Topology::Direct,
                    charge,
                )
            };
            assert_eq!(recorder.count(&key(PairObservable::MassPt)), 1);
            assert_eq!(recorder.count(&key(PairObservable::ElectronPtVsD0)), 1);
            assert_eq!(recorder.count(&key(PairObservable::ProtonSeparation)), 1);
        }
        assert_eq!(recorder.count_pairs(PairObservable::MassPt, Origin::SameEvent), 0);

        // Near-side pairs have no away-side counterpart
        assert_eq!(
            recorder.count(&class_key(
                PairObservable::MassPt,
                Origin::Mixed,
                SignCorrelation::RightSign,
                Topology::Away,
                ChargeSplit::Inclusive,
            )),
            0
        );
        assert_eq!(recorder.count_pairs(PairObservable::MassPt, Origin::Mixed), 2);
    }

    #[test]
    fn wrong_sign_away_pair_dispatch() {
        let cfg = test_config();
        let cuts = WindowCuts::new(&cfg.cuts);
        let builder = CandidateBuilder::new(&cfg, &cuts);
        let mut recorder = MemoryRecorder::default();

        // Back-to-back e- Λ pair fails the pair selection, but its flip is
        // a low mass near-side pair
        let e = lepton([0.6, 0.1, 0.], -1);
        let v0 = candidate([-0.8, -0.2, -0.1], V0Species::Lambda);
        builder.build(
            &e,
            v0.view(V0Species::Lambda),
            Origin::SameEvent,
            &context(),
            &mut recorder,
        );

        assert_eq!(recorder.count_pairs(PairObservable::Inclusive, Origin::SameEvent), 1);
        assert_eq!(recorder.count_pairs(PairObservable::MassVsElectronPt, Origin::SameEvent), 0);
        for charge in [ChargeSplit::Inclusive, ChargeSplit::Negative] {
            let key = |observable| {
                class_key(
                    observable,
                    Origin::SameEvent,
                    SignCorrelation::WrongSign,
                    Topology::Away,
                    charge,
                )
            };
            assert_eq!(recorder.count(&key(PairObservable::MassPt)), 1);
            assert_eq!(recorder.count(&key(PairObservable::PairPtVsDecayLength)), 1);
        }
    }

    #[test]
    fn out_of_window_v0s_only_fill_inclusive() {
        let mut cfg = test_config();
        cfg.write_candidate_rows = false;
        let cuts = WindowCuts::new(&cfg.cuts);
        let builder = CandidateBuilder::new(&cfg, &cuts);
        let mut recorder = MemoryRecorder::default();

        let e = lepton([0.6, 0.1, 0.], 1);
        let mut v0 = candidate([0.8, 0.2, 0.1], V0Species::Lambda);
        v0.momentum = from_xyzm(&xyz(&v0.momentum), masses::LAMBDA + 0.1);
        builder.build(
            &e,
            v0.view(V0Species::Lambda),
            Origin::SameEvent,
            &context(),
            &mut recorder,
        );

        assert!(recorder.rows.is_empty());
        assert_eq!(recorder.fills.len(), 1);
    }
}
