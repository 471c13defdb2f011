//! Sequential back-end of the analysis

use crate::{
    analysis::AnalysisTask, config::Configuration, event::Event, mixer::MixingError,
    pool::RingPoolStore, resacc::ResultsAccumulator, selection::CandidateSelector,
};

/// Analyze a batch of events in sequential mode, in stream order
pub fn analyze_batch<'cfg, S: CandidateSelector>(
    cfg: &'cfg Configuration,
    task: &AnalysisTask<'cfg, S>,
    events: &[Event],
    store: &mut RingPoolStore,
) -> Result<ResultsAccumulator<'cfg>, MixingError> {
    let mut accumulator = ResultsAccumulator::new(cfg);
    for event in events {
        let pool = task.pool_of(event).map(|id| (id, store.get_mut(id)));
        task.process_event(event, pool, &mut accumulator)?;
    }
    Ok(accumulator)
}
