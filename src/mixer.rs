//! Event mixing: pairing of the leptons of the current event with the V0s of
//! previous events of the same pool

use crate::{
    config::Configuration,
    extract::{ColumnMismatch, EventRecord, LeptonTrack, V0Species, V0View},
    numeric::Float,
    pool::{Pool, PoolId, PoolIndexer},
};
use thiserror::Error;

/// Internal consistency violations detected while mixing
#[derive(Debug, Error)]
pub enum MixingError {
    /// A stored event record has columns of different lengths
    #[error("Event record {event_info} of pool {pool} is corrupted")]
    ColumnMismatch {
        pool: PoolId,
        event_info: String,
        #[source]
        source: ColumnMismatch,
    },
}

/// What happened to a pool while processing one event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MixOutcome {
    /// Pool of the event
    pub pool: PoolId,

    /// Whether the event was paired with stored events
    pub mixed: bool,

    /// Number of lepton-V0 pairs which were built
    pub num_pairs: usize,

    /// Whether the pool was emptied before the event was stored
    pub reset: bool,

    /// Number of records in the pool once the event is stored
    pub count_after: usize,
}

/// Event mixing logic, shared by all pools
#[derive(Clone, Debug)]
pub struct Mixer {
    indexer: PoolIndexer,
    mix_depth: usize,
    retention_multiple: usize,
}
//
impl Mixer {
    /// Set up event mixing from the configuration
    pub fn new(cfg: &Configuration) -> Self {
        Self::with_parameters(
            PoolIndexer::new(&cfg.vtx_edges, &cfg.cent_edges),
            cfg.mix_depth,
            cfg.retention_multiple,
        )
    }

    /// Set up event mixing with explicit parameters
    pub fn with_parameters(indexer: PoolIndexer, mix_depth: usize, retention_multiple: usize) -> Self {
        assert!(mix_depth > 0, "Mixing depth should have been checked");
        assert!(retention_multiple > 0, "Retention should have been checked");
        Self {
            indexer,
            mix_depth,
            retention_multiple,
        }
    }

    /// Number of pools needed by this mixer
    pub fn num_pools(&self) -> usize {
        self.indexer.num_pools()
    }

    /// Pool of an event, if any
    pub fn pool_of(&self, vertex_z: Float, centrality: Float) -> Option<PoolId> {
        self.indexer.index(vertex_z, centrality)
    }

    /// Pair the current leptons with the stored V0s if the pool is deep
    /// enough, reset the pool if it is full, then store the current event
    ///
    /// `pair` is called once per (stored V0, current lepton) pair, iterating
    /// over stored records from oldest to newest, then over species buckets,
    /// then over stored V0s, then over leptons.
    ///
    pub fn mix_and_store(
        &self,
        pool_id: PoolId,
        pool: &mut Pool,
        leptons: &[LeptonTrack],
        record: EventRecord,
        mut pair: impl FnMut(&LeptonTrack, V0View),
    ) -> Result<MixOutcome, MixingError> {
        debug_assert_eq!(
            self.pool_of(record.vertex_z, record.centrality),
            Some(pool_id),
            "Event record {} was routed to the wrong pool",
            record.event_info
        );
        let count_before = pool.len();
        let mixed = count_before >= self.mix_depth;
        let mut num_pairs = 0;
        if mixed {
            for stored in pool.recent(self.mix_depth) {
                for species in V0Species::ALL {
                    let candidates = stored.bucket(species).iter(species).map_err(|source| {
                        MixingError::ColumnMismatch {
                            pool: pool_id,
                            event_info: stored.event_info.clone(),
                            source,
                        }
                    })?;
                    for v0 in candidates {
                        for lepton in leptons {
                            pair(lepton, v0);
                            num_pairs += 1;
                        }
                    }
                }
            }
        }

        let reset = count_before >= self.retention_multiple * self.mix_depth;
        if reset {
            tracing::debug!(pool_id, count_before, "Resetting mixing pool");
            pool.reset();
        }
        pool.append(record);

        Ok(MixOutcome {
            pool: pool_id,
            mixed,
            num_pairs,
            reset,
            count_after: pool.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        candidate::tests::lepton,
        extract::{tests::candidate, WorkingList},
        momentum::X,
    };

    fn mixer(mix_depth: usize, retention_multiple: usize) -> Mixer {
        let indexer = PoolIndexer::new(&[-10., 10.], &[0., 100.]);
        Mixer::with_parameters(indexer, mix_depth, retention_multiple)
    }

    /// Record with `num_lambdas` Λ and `num_anti` Λ̄, tagged through the x
    /// momentum component of their V0s
    fn record(tag: usize, num_lambdas: usize, num_anti: usize) -> EventRecord {
        let mut working = WorkingList::default();
        for idx in 0..num_lambdas {
            let px = (100 * tag + idx) as Float;
            working.buckets[V0Species::Lambda.bucket()]
                .push(candidate([px, 1., 0.], V0Species::Lambda));
        }
        for idx in 0..num_anti {
            let px = (100 * tag + 50 + idx) as Float;
            working.buckets[V0Species::AntiLambda.bucket()]
                .push(candidate([px, 1., 0.], V0Species::AntiLambda));
        }
        working.into_record(0., 10., format!("Ev{tag}_esd0_E0_V{}", num_lambdas + num_anti))
    }

    #[test]
    fn mixing_threshold_and_append() {
        let mixer = mixer(3, 20);
        let mut pool = Pool::default();
        let leptons = [lepton([1., 0., 0.], 1)];
        for event in 0..10 {
            let count_before = pool.len();
            let outcome = mixer
                .mix_and_store(0, &mut pool, &leptons, record(event, 1, 1), |_, _| {})
                .unwrap();
            assert_eq!(outcome.mixed, count_before >= 3);
            assert_eq!(outcome.count_after, count_before + 1);
            assert_eq!(pool.len(), count_before + 1);
            assert!(!outcome.reset);
        }
    }

    #[test]
    fn pairing_completeness_and_order() {
        let mixer = mixer(2, 20);
        let mut pool = Pool::default();
        pool.append(record(1, 2, 1));
        pool.append(record(2, 1, 2));
        pool.append(record(3, 2, 2));

        let leptons = [
            lepton([1., 0., 0.], 1),
            lepton([0., 1., 0.], -1),
            lepton([0., 0., 1.], 1),
        ];
        let mut seen = Vec::new();
        let outcome = mixer
            .mix_and_store(0, &mut pool, &leptons, record(4, 0, 0), |lepton, v0| {
                seen.push((v0.momentum[X], v0.species, lepton.charge));
            })
            .unwrap();

        // Only the two most recent records take part, 3 V0s and 4 V0s
        assert_eq!(outcome.num_pairs, (3 + 4) * leptons.len());
        assert_eq!(seen.len(), outcome.num_pairs);

        // Records, then buckets, then V0s, then leptons
        let v0_order = seen
            .chunks(leptons.len())
            .map(|chunk| (chunk[0].0, chunk[0].1))
            .collect::<Vec<_>>();
        use V0Species::*;
        assert_eq!(
            v0_order,
            vec![
                (200., Lambda),
                (250., AntiLambda),
                (251., AntiLambda),
                (300., Lambda),
                (301., Lambda),
                (350., AntiLambda),
                (351., AntiLambda),
            ]
        );
        for chunk in seen.chunks(leptons.len()) {
            let charges = chunk.iter().map(|entry| entry.2).collect::<Vec<_>>();
            assert_eq!(charges, vec![1, -1, 1]);
        }
    }

    #[test]
    fn events_without_leptons_are_still_stored() {
        let mixer = mixer(1, 20);
        let mut pool = Pool::default();
        pool.append(record(1, 3, 3));
        let mut calls = 0;
        let outcome = mixer
            .mix_and_store(0, &mut pool, &[], record(2, 1, 0), |_, _| calls += 1)
            .unwrap();
        assert!(outcome.mixed);
        assert_eq!(outcome.num_pairs, 0);
        assert_eq!(calls, 0);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn retention_reset() {
        let mixer = mixer(2, 3);
        let mut pool = Pool::default();
        for event in 0..6 {
            pool.append(record(event, 1, 0));
        }
        let outcome = mixer
            .mix_and_store(0, &mut pool, &[], record(6, 1, 0), |_, _| {})
            .unwrap();
        assert!(outcome.reset);
        assert_eq!(outcome.count_after, 1);
        assert_eq!(pool.recent(10)[0].event_info, "Ev6_esd0_E0_V1");
    }

    #[test]
    fn end_to_end_scenario() {
        let mixer = mixer(2, 3);
        let mut pool = Pool::default();
        let leptons = [lepton([1., 0., 0.], 1)];

        let mut outcomes = Vec::new();
        for event in 1..=8 {
            let outcome = mixer
                .mix_and_store(0, &mut pool, &leptons, record(event, 1, 0), |_, _| {})
                .unwrap();
            outcomes.push(outcome);
        }

        let mixed = outcomes.iter().map(|o| o.mixed).collect::<Vec<_>>();
        assert_eq!(mixed, [false, false, true, true, true, true, true, false]);
        let resets = outcomes.iter().map(|o| o.reset).collect::<Vec<_>>();
        assert_eq!(resets, [false, false, false, false, false, false, true, false]);
        let counts = outcomes.iter().map(|o| o.count_after).collect::<Vec<_>>();
        assert_eq!(counts, [1, 2, 3, 4, 5, 6, 1, 2]);

        // Each mixed event sees one V0 in each of the two previous events
        assert!(outcomes
            .iter()
            .filter(|o| o.mixed)
            .all(|o| o.num_pairs == 2));
    }

    #[test]
    fn corrupted_records_are_reported() {
        let mixer = mixer(1, 20);
        let mut pool = Pool::default();
        let mut corrupted = record(1, 2, 0);
        corrupted.buckets[V0Species::Lambda.bucket()].decay_lengths.pop();
        pool.append(corrupted);

        let leptons = [lepton([1., 0., 0.], 1)];
        let result = mixer.mix_and_store(0, &mut pool, &leptons, record(2, 1, 0), |_, _| {});
        match result {
            Err(MixingError::ColumnMismatch {
                pool,
                event_info,
                source,
            }) => {
                assert_eq!(pool, 0);
                assert_eq!(event_info, "Ev1_esd0_E0_V2");
                assert_eq!(source.decay_lengths, 1);
            }
            other => panic!("Unexpected mixing result {other:?}"),
        }
    }
}
