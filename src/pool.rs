//! Event mixing pools, keyed by primary vertex position and centrality

use crate::{extract::EventRecord, numeric::Float};

/// Identifier of an event mixing pool
pub type PoolId = usize;

/// Maps event characteristics to the mixing pool where the event belongs
///
/// Pools are laid out with the centrality bin varying fastest, so that the
/// pool of vertex bin `v` and centrality bin `c` is `c + num_cent_bins * v`.
///
#[derive(Clone, Debug)]
pub struct PoolIndexer {
    vtx_edges: Vec<Float>,
    cent_edges: Vec<Float>,
}
//
impl PoolIndexer {
    /// Set up pool indexing from ascending bin edges
    pub fn new(vtx_edges: &[Float], cent_edges: &[Float]) -> Self {
        debug_assert!(vtx_edges.windows(2).all(|pair| pair[0] < pair[1]));
        debug_assert!(cent_edges.windows(2).all(|pair| pair[0] < pair[1]));
        Self {
            vtx_edges: vtx_edges.to_owned(),
            cent_edges: cent_edges.to_owned(),
        }
    }

    /// Number of vertex-z bins
    pub fn num_vtx_bins(&self) -> usize {
        self.vtx_edges.len().saturating_sub(1)
    }

    /// Number of centrality bins
    pub fn num_cent_bins(&self) -> usize {
        self.cent_edges.len().saturating_sub(1)
    }

    /// Total number of pools
    pub fn num_pools(&self) -> usize {
        self.num_vtx_bins() * self.num_cent_bins()
    }

    /// Pool of an event, if its vertex and centrality are within range
    pub fn index(&self, vertex_z: Float, centrality: Float) -> Option<PoolId> {
        let vtx_bin = find_bin(&self.vtx_edges, vertex_z)?;
        let cent_bin = find_bin(&self.cent_edges, centrality)?;
        Some(cent_bin + self.num_cent_bins() * vtx_bin)
    }
}

/// Bin `i` such that `edges[i] <= value < edges[i + 1]`, if any
fn find_bin(edges: &[Float], value: Float) -> Option<usize> {
    let (&first, &last) = (edges.first()?, edges.last()?);
    // NaN fails both comparisons
    if !(value >= first && value < last) {
        return None;
    }
    Some(edges.partition_point(|&edge| edge <= value) - 1)
}

/// Rolling buffer of the event records of one pool
#[derive(Clone, Debug, Default)]
pub struct Pool {
    records: Vec<EventRecord>,
}
//
impl Pool {
    /// Append a record at the end of the pool
    pub fn append(&mut self, record: EventRecord) {
        self.records.push(record);
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Drop every stored record
    pub fn reset(&mut self) {
        self.records = Vec::new();
    }

    /// Most recent records, oldest first
    ///
    /// Yields fewer than `depth` records if the pool is not that full.
    ///
    pub fn recent(&self, depth: usize) -> &[EventRecord] {
        let start = self.records.len().saturating_sub(depth);
        &self.records[start..]
    }
}

/// Store owning one pool per pool identifier
///
/// Records are appended to, and pools reset through, the `Pool` handed out
/// by `get_mut()` or `pools_mut()`, which lets the mixer work on one pool
/// while other pools are mixed concurrently. Pool identifiers are produced by a `PoolIndexer` with matching binning,
/// so an out-of-range identifier is a bug and causes a panic.
///
#[derive(Debug)]
pub struct RingPoolStore {
    pools: Box<[Pool]>,
}
//
impl RingPoolStore {
    /// Create `num_pools` empty pools
    pub fn new(num_pools: usize) -> Self {
        Self {
            pools: (0..num_pools).map(|_| Pool::default()).collect(),
        }
    }

    /// Access a pool
    pub fn get(&self, id: PoolId) -> &Pool {
        &self.pools[id]
    }

    /// Access a pool mutably
    pub fn get_mut(&mut self, id: PoolId) -> &mut Pool {
        &mut self.pools[id]
    }

    /// Number of records in a pool
    pub fn count(&self, id: PoolId) -> usize {
        self.get(id).len()
    }

    /// Number of pools
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// All pools, in identifier order
    #[cfg(feature = "multi-threading")]
    pub fn pools_mut(&mut self) -> &mut [Pool] {
        &mut self.pools
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::extract::WorkingList;

    /// Event record without any V0 candidate
    pub(crate) fn empty_record(tag: usize) -> EventRecord {
        WorkingList::default().into_record(0., 10., format!("Ev{tag}_esd0_E0_V0"))
    }

    fn indexer() -> PoolIndexer {
        PoolIndexer::new(&[-10., 0., 10.], &[0., 50., 100.])
    }

    #[test]
    fn pool_lookup() {
        let indexer = indexer();
        assert_eq!(indexer.num_pools(), 4);
        assert_eq!(indexer.index(-5., 10.), Some(0));
        assert_eq!(indexer.index(-5., 60.), Some(1));
        assert_eq!(indexer.index(5., 10.), Some(2));
        assert_eq!(indexer.index(5., 60.), Some(3));
    }

    #[test]
    fn pool_lookup_edges() {
        let indexer = indexer();

        // Lower edges are inclusive, upper edges exclusive
        assert_eq!(indexer.index(-10., 0.), Some(0));
        assert_eq!(indexer.index(0., 50.), Some(3));
        assert_eq!(indexer.index(10., 10.), None);
        assert_eq!(indexer.index(5., 100.), None);
        assert_eq!(indexer.index(-10.01, 10.), None);
        assert_eq!(indexer.index(5., -0.5), None);
        assert_eq!(indexer.index(Float::NAN, 10.), None);
        assert_eq!(indexer.index(5., Float::NAN), None);
    }

    #[test]
    fn pool_ids_stay_in_bounds() {
        let indexer = PoolIndexer::new(&[-10., -5., 0., 5., 10.], &[0., 10., 30., 100.]);
        let num_pools = indexer.num_pools();
        assert_eq!(num_pools, 12);
        let mut seen = vec![false; num_pools];
        for vz in -120..120 {
            for cent in -10..110 {
                if let Some(id) = indexer.index(vz as Float / 10., cent as Float) {
                    assert!(id < num_pools);
                    seen[id] = true;
                }
            }
        }
        assert!(seen.into_iter().all(|s| s));
    }

    #[test]
    fn append_reset_and_recent() {
        let mut store = RingPoolStore::new(4);
        assert_eq!(store.len(), 4);
        for tag in 0..5 {
            let before = store.count(2);
            store.get_mut(2).append(empty_record(tag));
            assert_eq!(store.count(2), before + 1);
        }
        assert_eq!(store.count(0), 0);

        let recent = store.get(2).recent(3);
        let infos = recent.iter().map(|r| r.event_info.as_str()).collect::<Vec<_>>();
        assert_eq!(infos, ["Ev2_esd0_E0_V0", "Ev3_esd0_E0_V0", "Ev4_esd0_E0_V0"]);
        assert_eq!(store.get(2).recent(10).len(), 5);

        store.get_mut(2).reset();
        assert_eq!(store.count(2), 0);
        store.get_mut(2).append(empty_record(5));
        assert_eq!(store.count(2), 1);
    }

    #[test]
    #[should_panic]
    fn out_of_range_pool_panics() {
        let store = RingPoolStore::new(4);
        store.count(4);
    }
}
