//! Per-event analysis: event selection, same-event pairing and event mixing

use crate::{
    candidate::{CandidateBuilder, EventContext},
    config::Configuration,
    event::{Event, TrackReferences},
    extract::extract,
    mixer::{MixOutcome, Mixer, MixingError},
    numeric::Float,
    pool::{Pool, PoolId},
    recorder::{EventObservable, Origin, Recorder, SinkKey},
    selection::CandidateSelector,
};
use prefix_num_ops::real::*;

/// Range of accepted centralities (%)
const CENTRALITY_RANGE: std::ops::Range<Float> = 0.0..100.0;

/// Electron-Λ analysis of a stream of events
pub struct AnalysisTask<'cfg, S: CandidateSelector> {
    /// Configuration of the analysis
    cfg: &'cfg Configuration,

    /// Electron, V0 and pair selection
    selector: S,

    /// Event mixing logic
    mixer: Mixer,
}
//
impl<'cfg, S: CandidateSelector> AnalysisTask<'cfg, S> {
    /// Set up the analysis
    pub fn new(cfg: &'cfg Configuration, selector: S) -> Self {
        Self {
            cfg,
            selector,
            mixer: Mixer::new(cfg),
        }
    }

    /// Number of mixing pools to be allocated
    pub fn num_pools(&self) -> usize {
        if self.cfg.do_event_mixing {
            self.mixer.num_pools()
        } else {
            0
        }
    }

    /// Mixing pool of an event, if event mixing is enabled and the event
    /// falls within the pool binning
    pub fn pool_of(&self, event: &Event) -> Option<PoolId> {
        if !self.cfg.do_event_mixing {
            return None;
        }
        let vertex = event.primary_vertex.as_ref()?;
        self.mixer.pool_of(vertex.z, event.centrality)
    }

    /// Analyze one event
    ///
    /// `pool` must be the pool designated by `pool_of()` for this event, or
    /// `None` if there is no such pool. Returns what happened to the pool,
    /// if the event made it to the mixing stage.
    ///
    pub fn process_event(
        &self,
        event: &Event,
        pool: Option<(PoolId, &mut Pool)>,
        recorder: &mut impl Recorder,
    ) -> Result<Option<MixOutcome>, MixingError> {
        let cfg = self.cfg;
        let run = (event.run_number - cfg.run_offsets.offset(event.run_number)) as Float;
        let mut fill_event = |observable, values: &[Float]| {
            recorder.fill(SinkKey::Event(observable), values);
        };

        // Event selection
        fill_event(EventObservable::Processed, &[event.run_number as Float]);
        if abs(event.magnetic_field) < cfg.min_magnetic_field {
            tracing::debug!(event.sequence, event.magnetic_field, "Rejected: weak field");
            fill_event(EventObservable::RejectedMagneticField, &[event.magnetic_field]);
            return Ok(None);
        }
        let Some(primary_vertex) = event.primary_vertex else {
            tracing::debug!(event.sequence, "Rejected: no primary vertex");
            fill_event(EventObservable::NoPrimaryVertex, &[run]);
            return Ok(None);
        };
        if !CENTRALITY_RANGE.contains(&event.centrality) {
            tracing::debug!(event.sequence, event.centrality, "Rejected: centrality");
            fill_event(EventObservable::RejectedCentrality, &[event.centrality]);
            return Ok(None);
        }
        fill_event(EventObservable::Centrality, &[event.centrality]);
        fill_event(EventObservable::EventsVsRun, &[run]);

        // Electron and V0 selection
        let refs = TrackReferences::new(&event.tracks);
        let extraction = extract(
            event,
            &primary_vertex,
            &refs,
            &self.selector,
            cfg.mix_without_conversion,
        );
        fill_event(
            EventObservable::ElectronsVsRun,
            &[run, extraction.num_passing_tracks as Float],
        );
        fill_event(EventObservable::V0sVsRun, &[run, extraction.v0s.len() as Float]);

        // Same-event pairing, excluding electrons which are V0 daughters
        let builder = CandidateBuilder::new(cfg, &self.selector);
        let context = EventContext {
            centrality: event.centrality,
            primary_vertex,
            run_number: event.run_number,
            event_in_file: event.event_in_file,
        };
        for selected_v0 in &extraction.v0s {
            let v0 = selected_v0.candidate.view(selected_v0.species);
            for electron in &extraction.electrons {
                if selected_v0.v0.has_daughter(electron.pid_id) {
                    continue;
                }
                builder.build(electron, v0, Origin::SameEvent, &context, recorder);
            }
        }

        // Event mixing
        if !cfg.do_event_mixing {
            return Ok(None);
        }
        let Some((pool_id, pool)) = pool else {
            tracing::debug!(event.sequence, primary_vertex.z, event.centrality, "No mixing pool");
            recorder.fill(
                SinkKey::Event(EventObservable::Unpooled),
                &[primary_vertex.z, event.centrality],
            );
            return Ok(None);
        };
        debug_assert_eq!(self.pool_of(event), Some(pool_id));
        let mut working = extraction.working;
        let leptons = std::mem::take(&mut working.leptons);
        let event_info = format!(
            "Ev{}_esd{}_E{}_V{}",
            event.sequence,
            event.event_in_file,
            leptons.len(),
            working.num_candidates()
        );
        let record = working.into_record(primary_vertex.z, event.centrality, event_info);
        let outcome = self
            .mixer
            .mix_and_store(pool_id, pool, &leptons, record, |lepton, v0| {
                builder.build(lepton, v0, Origin::Mixed, &context, recorder);
            })?;
        tracing::trace!(
            event.sequence,
            pool = outcome.pool,
            outcome.num_pairs,
            outcome.reset,
            "Event stored in its mixing pool"
        );
        recorder.fill(
            SinkKey::Event(EventObservable::PoolFill),
            &[
                pool_id as Float,
                outcome.count_after as Float,
                if outcome.mixed { 1. } else { 0. },
            ],
        );
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        candidate::tests::MemoryRecorder,
        config::tests::test_config,
        event::tests::track,
        extract::{tests::v0, V0Species},
        momentum::ThreeVector,
        pool::RingPoolStore,
        recorder::PairObservable,
        selection::WindowCuts,
    };

    /// Event with two electrons and two V0s, the first V0 sharing a track
    /// with the first electron
    fn test_event(sequence: u64) -> Event {
        Event {
            sequence,
            run_number: 168000,
            event_in_file: 2,
            primary_vertex: Some(ThreeVector::new(0.01, 0.02, 2.)),
            centrality: 25.,
            magnetic_field: -5.,
            tracks: vec![
                track(0, [0.6, 0.1, 0.], 1),
                track(1, [0., -0.7, 0.2], -1),
            ],
            v0s: vec![
                v0([0.8, 0.2, 0.1], V0Species::Lambda, [0, 9]),
                v0([-0.3, 0.9, 0.], V0Species::AntiLambda, [20, 21]),
            ],
        }
    }

    fn event_count(recorder: &MemoryRecorder, observable: EventObservable) -> usize {
        recorder.count(&SinkKey::Event(observable))
    }

    #[test]
    fn event_rejections() {
        let cfg = test_config();
        let task = AnalysisTask::new(&cfg, WindowCuts::new(&cfg.cuts));
        let mut recorder = MemoryRecorder::default();

        let mut weak_field = test_event(1);
        weak_field.magnetic_field = 0.0005;
        let mut no_vertex = test_event(2);
        no_vertex.primary_vertex = None;
        let mut peripheral = test_event(3);
        peripheral.centrality = 100.;
        let mut unknown = test_event(4);
        unknown.centrality = Float::NAN;
        for event in [weak_field, no_vertex, peripheral, unknown] {
            let outcome = task.process_event(&event, None, &mut recorder).unwrap();
            assert_eq!(outcome, None);
        }

        assert_eq!(event_count(&recorder, EventObservable::Processed), 4);
        assert_eq!(event_count(&recorder, EventObservable::RejectedMagneticField), 1);
        assert_eq!(event_count(&recorder, EventObservable::NoPrimaryVertex), 1);
        assert_eq!(event_count(&recorder, EventObservable::RejectedCentrality), 2);
        assert_eq!(event_count(&recorder, EventObservable::EventsVsRun), 0);
        assert_eq!(recorder.count_pairs(PairObservable::Inclusive, Origin::SameEvent), 0);
    }

    #[test]
    fn same_event_pairing_skips_v0_daughters() {
        let mut cfg = test_config();
        cfg.do_event_mixing = false;
        let task = AnalysisTask::new(&cfg, WindowCuts::new(&cfg.cuts));
        let mut recorder = MemoryRecorder::default();
        let event = test_event(1);
        assert_eq!(task.pool_of(&event), None);
        assert_eq!(task.num_pools(), 0);

        let outcome = task.process_event(&event, None, &mut recorder).unwrap();
        assert_eq!(outcome, None);

        // Λ x e- and Λ̄ x (e+, e-), the Λ x e+ pair shares a track
        assert_eq!(recorder.count_pairs(PairObservable::Inclusive, Origin::SameEvent), 3);
        assert_eq!(recorder.rows.len(), 3);
        assert_eq!(recorder.count_pairs(PairObservable::Inclusive, Origin::Mixed), 0);

        // Run tallies are offset by the period start
        let run_tally = &recorder.fills[&SinkKey::Event(EventObservable::ElectronsVsRun)];
        assert_eq!(run_tally, &vec![vec![98., 2.]]);
    }

    #[test]
    fn mixing_through_the_task() {
        let cfg = test_config();
        let task = AnalysisTask::new(&cfg, WindowCuts::new(&cfg.cuts));
        let mut store = RingPoolStore::new(task.num_pools());
        let mut recorder = MemoryRecorder::default();
        assert_eq!(store.len(), 4);

        for sequence in 1..=7 {
            let event = test_event(sequence);
            let pool_id = task.pool_of(&event);
            assert_eq!(pool_id, Some(2));
            let pool = pool_id.map(|id| (id, store.get_mut(id)));
            let outcome = task
                .process_event(&event, pool, &mut recorder)
                .unwrap()
                .unwrap();
            assert_eq!(outcome.pool, 2);
            assert_eq!(outcome.mixed, sequence > 5);
        }

        // Events 6 and 7 each see 5 stored events of 2 V0s, with 2 leptons
        assert_eq!(recorder.count_pairs(PairObservable::Inclusive, Origin::Mixed), 40);
        assert_eq!(store.count(2), 7);
        assert_eq!(store.get(2).recent(1)[0].event_info, "Ev7_esd2_E2_V2");
        assert_eq!(event_count(&recorder, EventObservable::PoolFill), 7);
    }

    #[test]
    fn out_of_range_events_are_not_pooled() {
        let cfg = test_config();
        let task = AnalysisTask::new(&cfg, WindowCuts::new(&cfg.cuts));
        let mut recorder = MemoryRecorder::default();
        let mut event = test_event(1);
        event.primary_vertex = Some(ThreeVector::new(0., 0., 12.));
        assert_eq!(task.pool_of(&event), None);

        let outcome = task.process_event(&event, None, &mut recorder).unwrap();
        assert_eq!(outcome, None);
        assert_eq!(event_count(&recorder, EventObservable::Unpooled), 1);
        assert_eq!(recorder.count_pairs(PairObservable::Inclusive, Origin::SameEvent), 3);
    }
}
