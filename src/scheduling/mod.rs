//! This module takes care of scheduling the analysis work, encapsulating use
//! of multiple threads and anything else that will come in the future

#[cfg(feature = "multi-threading")]
mod multi_threading;
#[cfg(any(test, not(feature = "multi-threading")))]
mod sequential;

use crate::{
    analysis::AnalysisTask, config::Configuration, event::Event, evgen::EventGenerator,
    mixer::MixingError, pool::RingPoolStore, random::RandomGenerator,
    resacc::ResultsAccumulator, resfin::FinalResults, selection::CandidateSelector, Result,
};
use eyre::WrapErr;

/// Size of the event batches
///
/// Events are produced by the event source in batches of a certain size, and
/// each batch is analyzed as a whole before the next one is produced. This
/// bounds memory usage while leaving enough events in flight for the events
/// of different mixing pools to be analyzed in parallel.
///
const EVENT_BATCH_SIZE: usize = 10_000;

/// Run the analysis in the manner that was configured at build time
///
/// Events are produced by the toy event source, whose random number
/// generator is seeded from the configuration. Returns the finalized
/// analysis results.
///
pub fn run_analysis<'cfg, S>(
    cfg: &'cfg Configuration,
    evgen: &EventGenerator,
    task: &AnalysisTask<'cfg, S>,
) -> Result<FinalResults<'cfg>>
where
    S: CandidateSelector + Sync,
{
    let (results, _store) = analyze_stream(cfg, evgen, task, EVENT_BATCH_SIZE, |events, store| {
        // ...in sequential mode
        #[cfg(not(feature = "multi-threading"))]
        {
            sequential::analyze_batch(cfg, task, events, store)
        }

        // ...in multi-threaded mode
        #[cfg(feature = "multi-threading")]
        {
            multi_threading::analyze_batch(cfg, task, events, store)
        }
    })?;
    Ok(results)
}

/// Produce `cfg.num_events` events in batches of `batch_size`, and analyze
/// each batch with `analyze_batch`
///
/// The mixing pools persist across batches. They are returned along with
/// the results so that their final state can be inspected.
///
fn analyze_stream<'cfg, S: CandidateSelector>(
    cfg: &'cfg Configuration,
    evgen: &EventGenerator,
    task: &AnalysisTask<'cfg, S>,
    batch_size: usize,
    mut analyze_batch: impl FnMut(
        &[Event],
        &mut RingPoolStore,
    ) -> std::result::Result<ResultsAccumulator<'cfg>, MixingError>,
) -> Result<(FinalResults<'cfg>, RingPoolStore)> {
    // Check that the user is being reasonable (should have already been checked
    // at configuration time, but bugs can happen...)
    assert!(cfg.num_events > 0, "Must analyze at least one event");
    assert!(batch_size > 0, "Batches must hold at least one event");

    let mut rng = RandomGenerator::new(cfg.seed);
    let mut store = RingPoolStore::new(task.num_pools());
    let mut accumulator = ResultsAccumulator::new(cfg);

    let mut num_events = cfg.num_events;
    let mut sequence = 0;
    while num_events > 0 {
        // Produce the next batch of events
        let batch_size = num_events.min(batch_size);
        let batch = (sequence..sequence + batch_size as u64)
            .map(|seq| evgen.generate(seq, &mut rng))
            .collect::<Vec<_>>();

        // Analyze it
        let batch_result = analyze_batch(&batch, &mut store).wrap_err_with(|| {
            format!("Failed to analyze events {sequence} to {}", sequence + batch_size as u64 - 1)
        })?;
        accumulator.merge(batch_result);

        tracing::info!(
            first_event = sequence,
            num_events = batch_size,
            "Analyzed a batch of events"
        );
        sequence += batch_size as u64;
        num_events -= batch_size;
    }

    for pool_id in 0..store.len() {
        tracing::debug!(pool_id, count = store.count(pool_id), "Final pool occupancy");
    }
    Ok((accumulator.finalize(), store))
}
