//! Electron-Λ event mixing: a correlation analysis with a mixed-event
//! background
//!
//!
//! # Introduction (for the physicist)
//!
//! This program studies the correlations between electrons and Λ baryons
//! produced in heavy ion collisions, as a handle on charmed baryon production
//! through the semileptonic decay Λc⁺ → e⁺ Λ ν. Right-sign pairs (e⁺ Λ and
//! e⁻ Λ̄) contain the signal, wrong-sign pairs (e⁻ Λ and e⁺ Λ̄) are used as a
//! background estimate.
//!
//! The uncorrelated part of the background is estimated by event mixing:
//! electrons from the current event are paired with Λ candidates from
//! previous events which had a similar primary vertex position and
//! centrality.
//!
//!
//! # Introduction (for the computer guy)
//!
//! The program is organized as a pipeline:
//!
//! * read in parameters and set up the analysis
//! * loop over batches of (toy) reconstructed events,
//!     * selecting events, electrons and V0s,
//!     * pairing them within the event,
//!     * pairing the event's electrons with V0s from the event's mixing pool,
//!       then storing the event's V0s in the pool,
//!     * recording what was measured
//! * then display / store the result.
//!
//! Events of different mixing pools are independent, which is what the
//! multi-threaded mode takes advantage of.

#![warn(missing_docs)]

mod analysis;
mod candidate;
mod config;
mod event;
mod evgen;
mod extract;
mod mixer;
mod momentum;
mod numeric;
mod output;
mod pool;
mod random;
mod recorder;
mod resacc;
mod resfin;
mod scheduling;
mod selection;

use crate::{
    analysis::AnalysisTask, config::Configuration, evgen::EventGenerator,
    selection::WindowCuts,
};
use clap::Parser;
use eyre::WrapErr;
use std::{path::PathBuf, time::Instant};
use tracing_subscriber::{fmt, EnvFilter};

/// We'll use eyre's type-erased result type throughout the application
type Result<T> = eyre::Result<T>;

/// Command-line interface
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Configuration file of the analysis
    #[arg(long, short, default_value = "mixing.cfg")]
    config: PathBuf,

    /// Override the number of events to be analyzed
    #[arg(long, short)]
    num_events: Option<usize>,

    /// Directory where the results files are written
    #[arg(long, short, default_value = ".")]
    output_dir: PathBuf,
}

/// This will act as our main function, with suitable error handling
fn main() -> Result<()> {
    let args = Cli::parse();

    // Log to stderr, "info" and above unless RUST_LOG says otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    // ### CONFIGURATION READOUT ###

    let mut cfg = Configuration::load(&args.config).wrap_err_with(|| {
        format!("Failed to load the configuration from {}", args.config.display())
    })?;
    if let Some(num_events) = args.num_events {
        eyre::ensure!(num_events > 0, "Must analyze at least one event");
        tracing::info!(num_events, "Overriding the configured number of events");
        cfg.num_events = num_events;
    }

    // ### ANALYSIS INITIALIZATION ###

    // The clock is started after configuration I/O
    let saved_time = Instant::now();

    let task = AnalysisTask::new(&cfg, WindowCuts::new(&cfg.cuts));
    let evgen = EventGenerator::new();

    // ### ANALYSIS EXECUTION ###

    let result = match scheduling::run_analysis(&cfg, &evgen, &task) {
        Ok(result) => result,
        Err(report) => {
            tracing::error!("Analysis aborted: {report:#}");
            return Err(report);
        }
    };

    // ### RESULTS DISPLAY AND STORAGE ###

    let elapsed_time = saved_time.elapsed();
    output::dump_results(&result, elapsed_time, &args.output_dir)
        .wrap_err("Failed to output the results")?;

    Ok(())
}
