//! Batch orchestration: bring every requested table up to date.
//!
//! Targets are independent.  A failure is reported for its target and the
//! remaining targets are still attempted.
//!
//! With the `parallel` feature, tables for distinct targets are checked,
//! rendered and written concurrently.  Digests are always recorded from the
//! calling thread, one target at a time, so the shared state file is never
//! written concurrently.

use std::fs;
use std::path::{Path, PathBuf};

use crate::encoding::LegacyEncoding;
use crate::error::CodetabError;
use crate::generator::{GenerateOptions, Generator, Outcome};
use crate::state::{DigestStore, Manifest, MarkerFile, MANIFEST_FILE};

/// Default output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "Generated";

// ── BuildOptions ─────────────────────────────────────────────────────────────

/// Where recorded digests are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateBackend {
    /// `codetab.manifest.json` inside the output directory.
    Manifest,
    /// A marker-bearing text file.  Holds one digest, so one target only.
    Marker(PathBuf),
}

/// Configuration for [`build_all`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub output_dir: PathBuf,
    pub targets:    Vec<LegacyEncoding>,
    pub force:      bool,
    pub state:      StateBackend,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            targets:    LegacyEncoding::ALL.to_vec(),
            force:      false,
            state:      StateBackend::Manifest,
        }
    }
}

// ── TargetReport ─────────────────────────────────────────────────────────────

/// Result of one target within a batch.
#[derive(Debug)]
pub struct TargetReport {
    pub encoding: LegacyEncoding,
    pub path:     PathBuf,
    pub result:   Result<Outcome, CodetabError>,
}

impl TargetReport {
    pub fn is_ok(&self) -> bool { self.result.is_ok() }
}

// ── build_all ────────────────────────────────────────────────────────────────

/// Create the output directory, open the digest store and generate every
/// target in `opts`.  Duplicate targets are generated once.
///
/// Errors only for batch-level problems (output directory, store).  Per
/// target failures are in the returned reports.
pub fn build_all(opts: &BuildOptions) -> Result<Vec<TargetReport>, CodetabError> {
    let mut targets: Vec<LegacyEncoding> = Vec::with_capacity(opts.targets.len());
    for &t in &opts.targets {
        if !targets.contains(&t) {
            targets.push(t);
        }
    }

    if !opts.output_dir.exists() {
        fs::create_dir_all(&opts.output_dir)?;
    }
    let generators: Vec<Generator> = targets
        .iter()
        .map(|&e| Generator::new(e, &opts.output_dir))
        .collect();
    let gen_opts = GenerateOptions { force: opts.force, ..Default::default() };

    match &opts.state {
        StateBackend::Manifest => {
            let mut store = Manifest::load(manifest_path(&opts.output_dir))?;
            Ok(run(&generators, &mut store, &gen_opts))
        }
        StateBackend::Marker(path) => {
            if generators.len() > 1 {
                return Err(CodetabError::MarkerTargets(generators.len()));
            }
            let mut store = MarkerFile::new(path);
            Ok(run(&generators, &mut store, &gen_opts))
        }
    }
}

/// Manifest path used by [`build_all`] for `output_dir`.
pub fn manifest_path<P: AsRef<Path>>(output_dir: P) -> PathBuf {
    output_dir.as_ref().join(MANIFEST_FILE)
}

#[cfg(not(feature = "parallel"))]
fn run<S: DigestStore + ?Sized>(
    generators: &[Generator],
    store:      &mut S,
    opts:       &GenerateOptions,
) -> Vec<TargetReport> {
    generators
        .iter()
        .map(|g| report(g, g.generate(&mut *store, opts)))
        .collect()
}

#[cfg(feature = "parallel")]
fn run<S: DigestStore + ?Sized>(
    generators: &[Generator],
    store:      &mut S,
    opts:       &GenerateOptions,
) -> Vec<TargetReport> {
    use crate::generator::{record_outcome, write_table};
    use rayon::prelude::*;

    // Snapshot the records first; the store is not touched from workers.
    let expected: Vec<_> = generators
        .iter()
        .map(|g| store.recorded(g.encoding().name()))
        .collect();

    let written: Vec<Result<Outcome, CodetabError>> = generators
        .par_iter()
        .zip(expected.into_par_iter())
        .map(|(g, expected)| {
            let expected = expected?;
            write_table(g.encoding().code_page(), g.output(), expected.as_ref(), opts)
        })
        .collect();

    generators
        .iter()
        .zip(written)
        .map(|(g, result)| {
            let result = result.and_then(|o| record_outcome(&mut *store, g.encoding().name(), o));
            report(g, result)
        })
        .collect()
}

fn report(g: &Generator, result: Result<Outcome, CodetabError>) -> TargetReport {
    match &result {
        Ok(outcome) => log::debug!("{}: {outcome}", g.encoding()),
        Err(e)      => log::warn!("{}: generation failed: {e}", g.encoding()),
    }
    TargetReport {
        encoding: g.encoding(),
        path:     g.output().to_owned(),
        result,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
