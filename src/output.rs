//! This module is in charge of outputting the final analysis results to the
//! standard output and various files

use crate::{
    config::Configuration,
    numeric::{floats, Float},
    recorder::{CandidateRow, EventObservable, SinkKey},
    resfin::{FinalResults, Summary},
    Result,
};
use eyre::WrapErr;
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
    time::Duration,
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Number of significant digits in file output
const SIG_DIGITS: usize = (floats::DIGITS - 1) as usize;

/// Output the analysis results to the console and to disk
pub fn dump_results(res_fin: &FinalResults, elapsed_time: Duration, output_dir: &Path) -> Result<()> {
    let cfg = res_fin.cfg;

    // Print out an overview on stdout
    res_fin.print_overview();

    // Compute a timestamp of when the run ended
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .wrap_err("Failed to format the end-of-run timestamp")?;

    let create = |name: &str| -> Result<BufWriter<File>> {
        let path = output_dir.join(name);
        let file = File::create(&path)
            .wrap_err_with(|| format!("Failed to create {}", path.display()))?;
        Ok(BufWriter::new(file))
    };

    // Write execution timings
    {
        let mut tim_file = create("mixing.times")?;
        write_timings(&mut tim_file, cfg, &timestamp, elapsed_time)
            .and_then(|()| tim_file.flush())
            .wrap_err("Failed to write the timings")?;
    }

    // Write the main results file
    {
        let mut dat_file = create("mixing.data")?;
        write_data(&mut dat_file, cfg, res_fin)
            .and_then(|()| dat_file.flush())
            .wrap_err("Failed to write the results")?;
    }

    // Write the per-candidate rows, if requested
    if cfg.write_candidate_rows {
        let mut row_file = create("candidates.tsv")?;
        write_rows(&mut row_file, &res_fin.rows)
            .and_then(|()| row_file.flush())
            .wrap_err("Failed to write the candidate rows")?;
    }

    tracing::info!(output_dir = %output_dir.display(), "Results written");
    Ok(())
}

/// Write the timings of the run
fn write_timings(
    file: &mut impl Write,
    cfg: &Configuration,
    timestamp: &str,
    elapsed_time: Duration,
) -> io::Result<()> {
    writeln_entry(file, timestamp)?;
    let elapsed_secs = elapsed_time.as_secs_f64() as Float;
    writeln_entry(file, "---------------------------------------------")?;
    writeln_entry(file, ("Elapsed time (s)", elapsed_secs))?;
    let secs_per_ev = elapsed_secs / (cfg.num_events as Float);
    writeln_entry(file, ("Elapsed time per event (s)", secs_per_ev))
}

/// Write the configuration echo, the event tallies and the sink summaries
fn write_data(file: &mut impl Write, cfg: &Configuration, res_fin: &FinalResults) -> io::Result<()> {
    let cuts = &cfg.cuts;
    writeln_entry(file, ("Number of events", cfg.num_events))?;
    writeln_entry(file, ("Random seed", cfg.seed as usize))?;
    writeln_entry(file, ("Event mixing", cfg.do_event_mixing))?;
    writeln_entry(file, ("Mixing without conversions", cfg.mix_without_conversion))?;
    writeln_entry(file, ("Mixing depth", cfg.mix_depth))?;
    writeln_entry(file, ("Pool retention multiple", cfg.retention_multiple))?;
    writeln_entry(file, ("Vertex-z bins", cfg.num_vtx_bins()))?;
    writeln_entry(file, ("Centrality bins", cfg.num_cent_bins()))?;
    writeln_entry(file, ("Minimal electron pt (GeV/c)", cuts.min_lepton_pt))?;
    writeln_entry(file, ("Maximal electron |eta|", cuts.max_lepton_eta))?;
    writeln_entry(file, ("Track filter mask", cuts.track_filter_mask as usize))?;
    writeln_entry(file, ("Lambda mass tolerance (GeV)", cuts.lambda_mass_tolerance))?;
    writeln_entry(file, ("Peak half width (GeV)", cuts.peak_half_width))?;
    writeln_entry(file, ("Sideband inner edge (GeV)", cuts.sideband_inner))?;
    writeln_entry(file, ("Sideband outer edge (GeV)", cuts.sideband_outer))?;
    writeln_entry(file, ("Low mass limit (GeV)", cfg.low_mass_max))?;
    writeln_entry(file, ("Flipped mass limit (GeV)", cfg.flip_mass_max))?;
    writeln_entry(file, ("Minimal magnetic field (kG)", cfg.min_magnetic_field))?;
    writeln_entry(file, "---------------------------------------------")?;

    let event_count = |observable| res_fin.entries(SinkKey::Event(observable)) as usize;
    let (pooled, mixed) = res_fin.num_pooled_events();
    writeln_entry(file, ("Processed events", res_fin.num_events() as usize))?;
    let weak_field = event_count(EventObservable::RejectedMagneticField);
    writeln_entry(file, ("... rejected for weak field", weak_field))?;
    let no_vertex = event_count(EventObservable::NoPrimaryVertex);
    writeln_entry(file, ("... rejected for missing vertex", no_vertex))?;
    let centrality = event_count(EventObservable::RejectedCentrality);
    writeln_entry(file, ("... rejected for centrality", centrality))?;
    writeln_entry(file, ("Accepted events", res_fin.num_accepted_events() as usize))?;
    let unpooled = event_count(EventObservable::Unpooled);
    writeln_entry(file, ("... outside of mixing pools", unpooled))?;
    writeln_entry(file, ("... stored in mixing pools", pooled as usize))?;
    writeln_entry(file, ("... mixed with stored events", mixed as usize))?;
    writeln_entry(file, "---------------------------------------------")?;

    // One line per sink: name, entries, dropped, then mean/std/min/max of
    // each dimension
    writeln!(file)?;
    for (key, summary) in &res_fin.summaries {
        write_summary(file, key, summary)?;
    }
    Ok(())
}

/// Write the summary statistics of one sink
fn write_summary(file: &mut impl Write, key: &SinkKey, summary: &Summary) -> io::Result<()> {
    write!(file, "{key:<64}{:>10}{:>6}", summary.entries, summary.dropped)?;
    let dimensions = summary
        .mean
        .iter()
        .zip(&summary.std_dev)
        .zip(summary.min.iter().zip(&summary.max));
    for ((mean, std_dev), (min, max)) in dimensions {
        write!(file, " |")?;
        for &x in [mean, std_dev, min, max] {
            write!(file, " ")?;
            write_engineering(file, x, SIG_DIGITS)?;
        }
    }
    writeln!(file)
}

/// Write the per-candidate rows as tab-separated values
fn write_rows(file: &mut impl Write, rows: &[CandidateRow]) -> io::Result<()> {
    let header = CandidateRow::column_names().collect::<Vec<_>>().join("\t");
    writeln!(file, "{header}")?;
    for row in rows {
        write!(
            file,
            "{:?}\t{:?}\t{}\t{}\t{}",
            row.origin, row.species, row.run_number, row.event_in_file, row.lepton_charge
        )?;
        for &value in &row.values {
            write!(file, "\t")?;
            write_engineering(file, value, SIG_DIGITS)?;
        }
        writeln!(file)?;
    }
    Ok(())
}

/// Write one line of the results files
fn writeln_entry(file: &mut impl Write, data: impl Entry) -> io::Result<()> {
    write!(file, " ")?;
    data.write(file)?;
    writeln!(file)
}

/// Things which can be written as an entry of the results files
trait Entry: Sized {
    /// Write down `self` to the output file
    fn write(self, file: &mut impl Write) -> io::Result<()>;
}

impl Entry for &str {
    fn write(self, file: &mut impl Write) -> io::Result<()> {
        write!(file, "{self}")
    }
}

impl Entry for usize {
    fn write(self, file: &mut impl Write) -> io::Result<()> {
        write!(file, "{self}")
    }
}

impl Entry for bool {
    // Booleans are written the way the configuration file accepts them
    fn write(self, file: &mut impl Write) -> io::Result<()> {
        write!(file, "{}", if self { ".true." } else { ".false." })
    }
}

impl Entry for Float {
    fn write(self, file: &mut impl Write) -> io::Result<()> {
        write_engineering(file, self, SIG_DIGITS)
    }
}

impl<T: Entry> Entry for (&str, T) {
    // Key-value output that uses fixed-size columns for better readability
    fn write(self, file: &mut impl Write) -> io::Result<()> {
        write!(file, "{:<31}: ", self.0)?;
        self.1.write(file)
    }
}

/// Write a floating-point number using "engineering" notation
///
/// Like the %g format of C's printf, this switches to scientific notation
/// when naive notation would need too many leading zeroes, or more digits
/// than the requested number of significant digits.
///
fn write_engineering(writer: &mut impl Write, x: Float, sig_digits: usize) -> io::Result<()> {
    if x == 0. || !x.is_finite() {
        // No order of magnitude to speak of
        return write!(writer, "{x}");
    }

    let magnitude = x.abs().log10();
    let mut precision = sig_digits - 1;
    if magnitude < -3. || magnitude > sig_digits as Float {
        return write!(writer, "{x:.precision$e}");
    }

    // Rust's precision is a number of digits after the decimal point, so it
    // must be adjusted to the magnitude of the number. A leading zero is not
    // a significant digit.
    precision = (precision as isize - magnitude.trunc() as isize).max(0) as usize;
    if magnitude < 0. {
        precision += 1;
    }
    let digits = format!("{x:.precision$}");
    if digits.contains('.') {
        write!(writer, "{}", digits.trim_end_matches('0').trim_end_matches('.'))
    } else {
        write!(writer, "{digits}")
    }
}
