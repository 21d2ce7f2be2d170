use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use clap::Parser;
use crossbeam_channel::bounded;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use mzlipid::{
    AnalysisConfig, AnalysisContext, ChromatogramAccessError, DirectoryRuleSource, ParseError,
    RuleRepository, ScanProvider,
};

use crate::io::{read_element_table, read_hits, read_scans};
use crate::proc::{identify_hits, CancellationToken};
use crate::progress::ProgressRecord;
use crate::time_range::TimeRange;
use crate::types::BUFFER_SIZE;
use crate::write::{collate_results, write_output};

#[derive(Debug, Error)]
pub enum MZLipiderError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("Failed to read JSON input: {0}")]
    JSONError(
        #[source]
        #[from]
        serde_json::Error,
    ),
    #[error("The configuration could not be loaded: {0}")]
    ConfigError(
        #[source]
        #[from]
        figment::Error,
    ),
    #[error("The element table could not be parsed: {0}")]
    ElementTableError(
        #[source]
        #[from]
        ParseError,
    ),
    #[error("A scan could not be loaded: {0}")]
    ScanError(
        #[source]
        #[from]
        ChromatogramAccessError,
    ),
    #[error("Failed to build the thread pool: {0}")]
    ThreadPoolError(
        #[source]
        #[from]
        rayon::ThreadPoolBuildError,
    ),
}

fn default_output_file() -> PathBuf {
    PathBuf::from("-")
}

fn default_threads() -> i32 {
    -1
}

fn default_write_buffer_size() -> usize {
    BUFFER_SIZE
}

/// Structural confirmation of lipid MS1 hits from their MS/MS fragments.
///
/// Read a list of MS1 hits and a scan cache, score each hit against the fragmentation rules
/// for its class and adduct, and write one JSON result per line.
#[derive(Parser, Debug, Clone, Deserialize, Serialize)]
#[command(author, version)]
pub struct MZLipider {
    /// The path to read the MS1 hits from, a JSON array
    #[arg()]
    pub hits_file: PathBuf,

    /// The path to read the scan cache from, optionally gzip compressed
    #[arg(short = 's', long = "scans")]
    pub scans: PathBuf,

    /// The directory holding the fragmentation rule files, named `<class>_<adduct>.frag.txt`
    #[arg(short = 'R', long = "rules")]
    pub rules: PathBuf,

    /// The path to write the output file to, or if '-' is passed, write to STDOUT
    #[arg(short = 'o', long = "output-file", default_value = "-")]
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `mzlipider.toml` in the working directory.
    /// Environment variables prefixed with `MZLIPIDER_` will be read too.
    #[arg(long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// An element table to use in place of the built-in one
    #[arg(long = "element-table")]
    pub element_table: Option<PathBuf>,

    /// The number of threads to use, passing a value < 1 to use all available threads
    #[arg(
        short='t',
        long="threads",
        default_value_t=-1,
    )]
    #[serde(default = "default_threads")]
    pub threads: i32,

    /// The retention time range of hits to process, denoted (start?)-(stop?)
    #[arg(
        short='r',
        long="time-range",
        value_parser=TimeRange::from_str,
        value_name="BEGIN-END",
        long_help=r#"The retention time range of hits to process, denoted (start?)-(stop?)

If a start is not specified, processing begins from the start of the run.
If a stop is not specified, processing stops at the end of the run.
"#
    )]
    pub time_range: Option<TimeRange>,

    /// The size of the buffer for queueing writing of results to the output stream
    #[arg(short = 'w', long="write-buffer-size", default_value_t=BUFFER_SIZE)]
    #[serde(default = "default_write_buffer_size")]
    pub write_buffer_size: usize,

    #[arg(
        skip,
        help = "Mass tolerances, retention windows and peak finding parameters"
    )]
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl MZLipider {
    fn create_threadpool(&self) -> Result<rayon::ThreadPool, MZLipiderError> {
        let num_threads = if self.threads > 0 {
            self.threads as usize
        } else {
            thread::available_parallelism()?.into()
        };
        debug!("Using {} cores", num_threads);
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?)
    }

    fn make_context(&self) -> Result<AnalysisContext, MZLipiderError> {
        let context = match self.element_table.as_ref() {
            Some(path) => {
                info!("Element Table: {}", path.display());
                AnalysisContext::new(self.analysis, read_element_table(path)?)
            }
            None => AnalysisContext::with_default_table(self.analysis)?,
        };
        Ok(context)
    }

    fn make_writer(&self) -> Result<Box<dyn Write + Send>, MZLipiderError> {
        if self.output_file == Path::new("-") {
            Ok(Box::new(io::BufWriter::new(io::stdout())))
        } else {
            Ok(Box::new(io::BufWriter::new(fs::File::create(
                &self.output_file,
            )?)))
        }
    }

    pub fn main(&self) -> Result<(), MZLipiderError> {
        self.run(&CancellationToken::new())?;
        Ok(())
    }

    /// Run the whole workflow, checking `cancellation` before each hit
    pub fn run(&self, cancellation: &CancellationToken) -> Result<ProgressRecord, MZLipiderError> {
        info!(
            "mzlipider v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
        );
        info!("Hits: {}", self.hits_file.display());
        info!("Scans: {}", self.scans.display());
        info!("Rules: {}", self.rules.display());
        info!("Output: {}", self.output_file.display());

        let context = self.make_context()?;
        let scans = read_scans(&self.scans)?;
        match scans.time_range() {
            Some((start, end)) => info!("Loaded {} scans from {start:0.3} to {end:0.3}", scans.len()),
            None => warn!("The scan cache is empty"),
        }

        let time_range = self.time_range.unwrap_or_default();
        let hits: Vec<_> = read_hits(&self.hits_file)?
            .into_iter()
            .filter(|hit| time_range.contains(hit.retention_time))
            .enumerate()
            .collect();
        if self.time_range.is_some() {
            info!(
                "{} hits fall between {} and {}",
                hits.len(),
                time_range.start,
                time_range.end
            );
        }

        let writer = self.make_writer()?;
        let rules = RuleRepository::new(DirectoryRuleSource::new(&self.rules));
        let pool = self.create_threadpool()?;
        self.run_workflow(context, scans, rules, hits, writer, pool, cancellation)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_workflow<W: Write + Send + 'static>(
        &self,
        context: AnalysisContext,
        scans: mzlipid::InMemoryScanCache,
        rules: RuleRepository,
        hits: Vec<(usize, mzlipid::Ms1Hit)>,
        writer: W,
        pool: rayon::ThreadPool,
        cancellation: &CancellationToken,
    ) -> Result<ProgressRecord, MZLipiderError> {
        let buffer_size = self.write_buffer_size.max(1);
        let (send_solved, recv_solved) = bounded(buffer_size);
        let (send_collated, recv_collated) = bounded(buffer_size);

        let scans = Arc::new(scans);
        let rules = Arc::new(rules);
        let cancellation = cancellation.clone();

        let start = Instant::now();
        let proc_rules = Arc::clone(&rules);
        let proc_task = thread::spawn(move || {
            pool.install(|| {
                identify_hits(
                    &context,
                    &scans,
                    &proc_rules,
                    hits,
                    send_solved,
                    &cancellation,
                )
            })
        });

        let collate_task = thread::spawn(move || collate_results(recv_solved, send_collated));

        let write_task = thread::spawn(move || write_output(writer, recv_collated));

        let prog = match proc_task.join() {
            Ok(prog) => {
                info!("Hits: {}", prog.hits);
                info!(
                    "Fragments Detected: {} | Position Correct: {}",
                    prog.fragments_detected, prog.position_correct
                );
                info!(
                    "Head Group Only: {} | No MSn: {} | Discarded: {}",
                    prog.head_group_detected, prog.no_msn_present, prog.discarded
                );
                info!("Not Found: {}", prog.not_found);
                info!("Skipped: {}", prog.skipped);
                debug!("{} rule sets compiled", rules.compilations());
                prog
            }
            Err(e) => {
                warn!("Failed to join identification task: {e:?}");
                ProgressRecord::default()
            }
        };
        let processing_elapsed = Instant::now() - start;
        info!("Elapsed Time: {:0.3?}", processing_elapsed);

        if let Err(e) = collate_task.join() {
            warn!("Failed to join collator task: {e:?}")
        }

        match write_task.join() {
            Ok(o) => {
                o?;
            }
            Err(e) => {
                warn!("Failed to join writer task: {e:?}");
            }
        }

        let elapsed = Instant::now() - start;
        if (elapsed.as_secs_f64() - processing_elapsed.as_secs_f64()) > 2.0 {
            info!("Total Elapsed Time: {:0.3?}", elapsed);
        }
        Ok(prog)
    }
}
