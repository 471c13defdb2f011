//! Mechanism for loading and sharing the analysis configuration

use crate::{numeric::Float, Result};

use eyre::{ensure, eyre, WrapErr};

use std::{fs, path::Path, str::FromStr};

/// Analysis configuration
pub struct Configuration {
    /// Number of events to be produced by the toy event source
    pub num_events: usize,

    /// Seed of the toy event source
    pub seed: u64,

    /// Whether mixed-event pairing is performed at all
    pub do_event_mixing: bool,

    /// Whether electrons tagged as photon conversions are kept out of the
    /// lepton list used for mixing
    pub mix_without_conversion: bool,

    /// Whether one columnar row is written per candidate
    pub write_candidate_rows: bool,

    /// Number of stored events that a pool must hold before mixing starts,
    /// which is also the number of stored events paired with each new event
    pub mix_depth: usize,

    /// Pools holding `retention_multiple * mix_depth` events are reset
    pub retention_multiple: usize,

    /// Ascending vertex-z bin edges (cm), one more than the number of bins
    pub vtx_edges: Vec<Float>,

    /// Ascending centrality bin edges (%), one more than the number of bins
    pub cent_edges: Vec<Float>,

    /// Single-track and V0 selection parameters
    pub cuts: CutParameters,

    /// Pairs above this mass only fill the inclusive observables
    pub low_mass_max: Float,

    /// Flipped pairs above this mass are not recorded
    pub flip_mass_max: Float,

    /// Events with a weaker magnetic field (kG) are rejected
    pub min_magnetic_field: Float,

    /// Run number offsets of the known data taking periods
    pub run_offsets: RunOffsets,
}

/// Parameters of the built-in candidate selection
#[derive(Clone, Debug, PartialEq)]
pub struct CutParameters {
    /// Minimal electron transverse momentum (GeV/c)
    pub min_lepton_pt: Float,

    /// Maximal electron |η|
    pub max_lepton_eta: Float,

    /// Reconstruction filter bits, any of which selects a track as an
    /// electron candidate
    pub track_filter_mask: u32,

    /// Tolerance on the Λ mass used to decide the V0 species
    pub lambda_mass_tolerance: Float,

    /// Half width of the Λ peak window
    pub peak_half_width: Float,

    /// Inner distance of the sidebands from the Λ mass
    pub sideband_inner: Float,

    /// Outer distance of the sidebands from the Λ mass
    pub sideband_outer: Float,
}
//
impl Configuration {
    /// Load the configuration from a file, check it, and log it
    pub fn load(file_name: impl AsRef<Path>) -> Result<Self> {
        let file_name = file_name.as_ref();
        let config_str = fs::read_to_string(file_name)
            .wrap_err_with(|| format!("Could not read {}", file_name.display()))?;
        let config = Self::parse(&config_str)?;
        config.log();
        Ok(config)
    }

    /// Decode and check a configuration from the contents of a file
    pub fn parse(config_str: &str) -> Result<Self> {
        // Configuration items are the first non-whitespace chunk of text on
        // each line, anything after it is a comment. Blank lines are ignored.
        let mut config_iter = config_str
            .lines()
            .filter_map(|line| line.split_whitespace().next());

        // Fetch the next configuration item, tagging it with the name of the
        // field which it is supposed to fill for error reporting.
        let mut next_item = |name: &'static str| -> Result<ConfigItem> {
            config_iter
                .next()
                .map(|data| ConfigItem::new(name, data))
                .ok_or_else(|| eyre!("Missing configuration of {}", name))
        };

        let num_events = next_item("num_events")?.parse::<usize>()?;
        let seed = next_item("seed")?.parse::<u64>()?;
        let do_event_mixing = next_item("do_event_mixing")?.parse_bool()?;
        let mix_without_conversion = next_item("mix_without_conversion")?.parse_bool()?;
        let write_candidate_rows = next_item("write_candidate_rows")?.parse_bool()?;
        let mix_depth = next_item("mix_depth")?.parse::<usize>()?;
        let retention_multiple = next_item("retention_multiple")?.parse::<usize>()?;

        // Bin edge arrays are prefixed by their number of bins
        let mut next_edges = |count_name: &'static str, edge_name: &'static str| {
            let num_bins = next_item(count_name)?.parse::<usize>()?;
            (0..=num_bins)
                .map(|_| next_item(edge_name)?.parse::<Float>())
                .collect::<Result<Vec<_>>>()
        };

        let vtx_edges = next_edges("num_vtx_bins", "vtx_edges")?;
        let cent_edges = next_edges("num_cent_bins", "cent_edges")?;
        let cuts = CutParameters {
            min_lepton_pt: next_item("min_lepton_pt")?.parse::<Float>()?,
            max_lepton_eta: next_item("max_lepton_eta")?.parse::<Float>()?,
            track_filter_mask: next_item("track_filter_mask")?.parse::<u32>()?,
            lambda_mass_tolerance: next_item("lambda_mass_tolerance")?.parse::<Float>()?,
            peak_half_width: next_item("peak_half_width")?.parse::<Float>()?,
            sideband_inner: next_item("sideband_inner")?.parse::<Float>()?,
            sideband_outer: next_item("sideband_outer")?.parse::<Float>()?,
        };
        let low_mass_max = next_item("low_mass_max")?.parse::<Float>()?;
        let flip_mass_max = next_item("flip_mass_max")?.parse::<Float>()?;
        let min_magnetic_field = next_item("min_magnetic_field")?.parse::<Float>()?;
        let num_run_offsets = next_item("num_run_offsets")?.parse::<usize>()?;
        let mut run_ranges = Vec::with_capacity(num_run_offsets);
        for _ in 0..num_run_offsets {
            run_ranges.push(RunRange {
                first: next_item("run_range_start")?.parse::<i32>()?,
                last: next_item("run_range_end")?.parse::<i32>()?,
                offset: next_item("run_offset")?.parse::<i32>()?,
            });
        }
        let run_offsets = RunOffsets::new(run_ranges)?;

        let config = Configuration {
            num_events,
            seed,
            do_event_mixing,
            mix_without_conversion,
            write_candidate_rows,
            mix_depth,
            retention_multiple,
            vtx_edges,
            cent_edges,
            cuts,
            low_mass_max,
            flip_mass_max,
            min_magnetic_field,
            run_offsets,
        };
        config.check()?;
        Ok(config)
    }

    /// Number of vertex-z bins
    pub fn num_vtx_bins(&self) -> usize {
        self.vtx_edges.len().saturating_sub(1)
    }

    /// Number of centrality bins
    pub fn num_cent_bins(&self) -> usize {
        self.cent_edges.len().saturating_sub(1)
    }

    /// Reject configurations which cannot lead to a sensible run
    fn check(&self) -> Result<()> {
        // A sensible run must process at least one event
        ensure!(self.num_events > 0, "Please process at least one event");

        ensure!(self.mix_depth > 0, "The mixing depth must be at least 1");
        ensure!(
            self.retention_multiple > 0,
            "The pool retention multiple must be at least 1"
        );

        check_edges("vertex-z", &self.vtx_edges)?;
        check_edges("centrality", &self.cent_edges)?;
        if self.do_event_mixing {
            ensure!(
                self.num_vtx_bins() * self.num_cent_bins() > 0,
                "Event mixing is enabled, but no mixing pool is configured"
            );
        }

        let cuts = &self.cuts;
        ensure!(
            cuts.track_filter_mask != 0,
            "The track filter mask must select at least one filter bit"
        );
        ensure!(
            cuts.peak_half_width > 0.,
            "The Λ peak window must have a positive width"
        );
        ensure!(
            cuts.peak_half_width <= cuts.sideband_inner && cuts.sideband_inner < cuts.sideband_outer,
            "The Λ sidebands must lie outside of the peak window"
        );
        Ok(())
    }

    /// Log the configuration
    pub fn log(&self) {
        tracing::info!(self.num_events, self.seed, "Event source");
        tracing::info!(
            self.do_event_mixing,
            self.mix_without_conversion,
            self.mix_depth,
            self.retention_multiple,
            "Event mixing"
        );
        tracing::info!(vtx_edges = ?self.vtx_edges, cent_edges = ?self.cent_edges, "Pool binning");
        tracing::info!(cuts = ?self.cuts, "Selection");
        tracing::info!(
            self.low_mass_max,
            self.flip_mass_max,
            self.min_magnetic_field,
            self.write_candidate_rows,
            "Recording"
        );
        tracing::info!(run_offsets = ?self.run_offsets, "Run offsets");
    }
}

/// Check that bin edges are finite and strictly ascending
fn check_edges(what: &str, edges: &[Float]) -> Result<()> {
    ensure!(
        edges.iter().all(|edge| edge.is_finite()),
        "The {} bin edges must be finite",
        what
    );
    ensure!(
        edges.windows(2).all(|pair| pair[0] < pair[1]),
        "The {} bin edges must be strictly ascending",
        what
    );
    Ok(())
}

/// Inclusive range of run numbers sharing a common offset
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunRange {
    pub first: i32,
    pub last: i32,
    pub offset: i32,
}

/// Sorted table of run number offsets, one per data taking period
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunOffsets(Vec<RunRange>);
//
impl RunOffsets {
    /// Build the table, rejecting empty or overlapping ranges
    pub fn new(mut ranges: Vec<RunRange>) -> Result<Self> {
        ensure!(
            ranges.iter().all(|range| range.first <= range.last),
            "Run ranges must not be empty"
        );
        ranges.sort_by_key(|range| range.first);
        ensure!(
            ranges.windows(2).all(|pair| pair[0].last < pair[1].first),
            "Run ranges must not overlap"
        );
        Ok(Self(ranges))
    }

    /// Offset of a run number, zero when no period matches
    pub fn offset(&self, run_number: i32) -> i32 {
        let idx = self.0.partition_point(|range| range.last < run_number);
        match self.0.get(idx) {
            Some(range) if range.first <= run_number => range.offset,
            _ => 0,
        }
    }
}

/// A value from the configuration file, tagged with the struct field which it
/// is supposed to map for error reporting purposes.
struct ConfigItem<'data> {
    name: &'static str,
    data: &'data str,
}
//
impl<'data> ConfigItem<'data> {
    /// Build a config item from a struct field tag and raw iterator data
    fn new(name: &'static str, data: &'data str) -> Self {
        Self { name, data }
    }

    /// Parse this data using Rust's standard parsing logic
    fn parse<T: FromStr>(self) -> Result<T>
    where
        <T as FromStr>::Err: std::error::Error + Send + Sync + 'static,
    {
        self.data
            .parse::<T>()
            .wrap_err_with(|| format!("Could not parse configuration of {}", self.name))
    }

    /// Parse this data using special logic which handles Fortran's bool syntax
    fn parse_bool(self) -> Result<bool> {
        match self.data.to_lowercase().as_str() {
            ".true." => Ok(true),
            ".false." => Ok(false),
            _ => self.parse::<bool>(),
        }
    }
}
