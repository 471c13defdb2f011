//! Multi-threaded back-end of the analysis

use crate::{
    analysis::AnalysisTask, config::Configuration, event::Event, mixer::MixingError,
    pool::RingPoolStore, resacc::ResultsAccumulator, selection::CandidateSelector,
};
use rayon::prelude::*;

/// Number of unpooled events analyzed by each parallel task
const UNPOOLED_CHUNK_SIZE: usize = 256;

/// Analyze a batch of events in multi-threaded mode
///
/// Events are grouped by mixing pool, keeping their stream order within each
/// pool. Each pool is then processed by a parallel task which has exclusive
/// access to it, so that events of the same pool are mixed one after the
/// other while different pools are mixed concurrently. Events without a pool
/// do not touch the pool store and are analyzed in independent chunks.
///
/// Task results are merged in a fixed order (unpooled events first, then
/// pools in identifier order), which makes the output reproducible.
///
pub fn analyze_batch<'cfg, S: CandidateSelector + Sync>(
    cfg: &'cfg Configuration,
    task: &AnalysisTask<'cfg, S>,
    events: &[Event],
    store: &mut RingPoolStore,
) -> Result<ResultsAccumulator<'cfg>, MixingError> {
    // Partition events by pool
    let mut pool_events = vec![Vec::new(); store.len()];
    let mut unpooled = Vec::new();
    for event in events {
        match task.pool_of(event) {
            Some(id) => pool_events[id].push(event),
            None => unpooled.push(event),
        }
    }

    // Analyze events without a pool
    let unpooled_results = unpooled
        .par_chunks(UNPOOLED_CHUNK_SIZE)
        .map(|chunk| -> Result<_, MixingError> {
            let mut accumulator = ResultsAccumulator::new(cfg);
            for event in chunk {
                task.process_event(event, None, &mut accumulator)?;
            }
            Ok(accumulator)
        })
        .collect::<Result<Vec<_>, MixingError>>()?;

    // Analyze events pool by pool
    let pool_results = store
        .pools_mut()
        .par_iter_mut()
        .zip(pool_events)
        .enumerate()
        .map(|(pool_id, (pool, events))| -> Result<_, MixingError> {
            let mut accumulator = ResultsAccumulator::new(cfg);
            for event in events {
                task.process_event(event, Some((pool_id, &mut *pool)), &mut accumulator)?;
            }
            Ok(accumulator)
        })
        .collect::<Result<Vec<_>, MixingError>>()?;

    // Merge the results in a reproducible order
    let mut accumulator = ResultsAccumulator::new(cfg);
    for result in unpooled_results.into_iter().chain(pool_results) {
        accumulator.merge(result);
    }
    Ok(accumulator)
}
