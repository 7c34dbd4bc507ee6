//! Table generator: enumerate the 16-bit code space and emit a `.codetab`.
//!
//! # Table layout
//! ```text
//! # this file is auto generated, do not modify it unless you know what you are doing!
//! # 这是自动生成的文件，如果你不知道你在干什么，请不要修改这个文件！
//! # source, target
//! 0xb0a1, 0x554a # 啊
//! 0xb0a2, 0x963f # 阿
//! ```
//! Records are strictly ascending by source.  Hex fields are lowercase and at
//! least four digits wide; scalars above U+FFFF keep all their digits.
//!
//! # Change detection
//! A table is rewritten only when the digest recorded for its target does
//! not match the file on disk (or either is missing).  The order of the
//! steps is fixed:
//!
//! ```text
//! CHECKING ─┬─> SKIPPED
//!           └─> GENERATING ─> WRITTEN ─> DIGESTED ─> RECORDED
//! ```
//!
//! Any failure before RECORDED leaves the previous record in place.  Since
//! that record no longer matches the file, the next run regenerates.

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use crate::digest::{file_digest, is_current, Digest};
use crate::encoding::{display_char, CodePage, CodeUnit, LegacyEncoding};
use crate::error::CodetabError;
use crate::state::DigestStore;

/// File extension of generated tables.
pub const TABLE_EXTENSION: &str = "codetab";

/// Fixed table header: bilingual warning, then the column header.
pub const TABLE_HEADER: &str = "\
# this file is auto generated, do not modify it unless you know what you are doing!
# 这是自动生成的文件，如果你不知道你在干什么，请不要修改这个文件！
# source, target
";

/// The whole code space.
pub const FULL_RANGE: RangeInclusive<CodeUnit> = 0..=CodeUnit::MAX;

// ── MappingRecord ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MappingRecord {
    pub source: CodeUnit,
    pub target: char,
}

impl fmt::Display for MappingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:04x}, 0x{:04x} # {}",
            self.source,
            self.target as u32,
            display_char(self.target),
        )
    }
}

/// Every record `page` yields over `range`, ascending.
pub fn enumerate<C: CodePage + ?Sized>(
    page:  &C,
    range: RangeInclusive<CodeUnit>,
) -> impl Iterator<Item = MappingRecord> + '_ {
    range.filter_map(move |source| {
        page.classify(source)
            .scalar()
            .map(|target| MappingRecord { source, target })
    })
}

/// A fully rendered table, not yet on disk.
#[derive(Debug, Clone)]
pub struct RenderedTable {
    pub text:    String,
    pub records: usize,
}

pub fn render_table<C: CodePage + ?Sized>(page: &C, range: RangeInclusive<CodeUnit>) -> RenderedTable {
    use std::fmt::Write as _;

    let mut text = String::from(TABLE_HEADER);
    let mut records = 0;
    for record in enumerate(page, range) {
        // Writing into a String cannot fail.
        let _ = writeln!(text, "{record}");
        records += 1;
    }
    RenderedTable { text, records }
}

// ── Options / outcome ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Code units to probe.  Narrower ranges are for tests and previews.
    pub range: RangeInclusive<CodeUnit>,
    /// Regenerate even when the recorded digest matches.
    pub force: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self { range: FULL_RANGE, force: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The table on disk already matched the recorded digest.
    Unchanged(Digest),
    Regenerated { digest: Digest, records: usize },
}

impl Outcome {
    pub fn digest(&self) -> &Digest {
        match self {
            Outcome::Unchanged(d)              => d,
            Outcome::Regenerated { digest, .. } => digest,
        }
    }

    pub fn is_regenerated(&self) -> bool {
        matches!(self, Outcome::Regenerated { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Unchanged(d) => write!(f, "unchanged, digest={d}"),
            Outcome::Regenerated { digest, records } => {
                write!(f, "regenerated, digest={digest} ({records} records)")
            }
        }
    }
}

// ── Generation ───────────────────────────────────────────────────────────────

/// Check, and if needed render and write, the table for `page`.
///
/// Does not record anything: on `Regenerated` the caller owns recording the
/// digest (see [`record_outcome`]).
pub fn write_table<C: CodePage + ?Sized>(
    page:     &C,
    output:   &Path,
    expected: Option<&Digest>,
    opts:     &GenerateOptions,
) -> Result<Outcome, CodetabError> {
    if !opts.force {
        if let Some(expected) = expected {
            if is_current(output, expected) {
                log::debug!("{}: {} is current, skipped", page.name(), output.display());
                return Ok(Outcome::Unchanged(*expected));
            }
        }
    }

    log::debug!("{}: probing {:#06x}..={:#06x}", page.name(), opts.range.start(), opts.range.end());
    let table = render_table(page, opts.range.clone());

    let mut file = File::create(output)?;
    file.write_all(table.text.as_bytes())?;
    file.sync_all()?;
    drop(file);

    let digest = file_digest(output)?;
    Ok(Outcome::Regenerated { digest, records: table.records })
}

/// Record a regenerated table's digest in `store`.  `Unchanged` is a no-op.
pub fn record_outcome<S: DigestStore + ?Sized>(
    store:   &mut S,
    target:  &str,
    outcome: Outcome,
) -> Result<Outcome, CodetabError> {
    if let Outcome::Regenerated { digest, records } = outcome {
        store.record(target, &digest, records)?;
        log::info!("{target}: regenerated {records} records, digest {digest}");
    }
    Ok(outcome)
}

/// Bring the table for `page` at `output` up to date and record its digest.
pub fn generate<C: CodePage + ?Sized, S: DigestStore + ?Sized>(
    page:   &C,
    output: &Path,
    store:  &mut S,
    opts:   &GenerateOptions,
) -> Result<Outcome, CodetabError> {
    let expected = store.recorded(page.name())?;
    let outcome = write_table(page, output, expected.as_ref(), opts)?;
    record_outcome(store, page.name(), outcome)
}

// ── Generator ────────────────────────────────────────────────────────────────

/// One supported encoding bound to its output path.
#[derive(Debug, Clone)]
pub struct Generator {
    encoding: LegacyEncoding,
    output:   PathBuf,
}

impl Generator {
    /// Generator writing `<output_dir>/<name>.codetab`.
    pub fn new<P: AsRef<Path>>(encoding: LegacyEncoding, output_dir: P) -> Self {
        let output = output_dir
            .as_ref()
            .join(format!("{}.{TABLE_EXTENSION}", encoding.name()));
        Self { encoding, output }
    }

    pub fn with_path<P: Into<PathBuf>>(encoding: LegacyEncoding, output: P) -> Self {
        Self { encoding, output: output.into() }
    }

    pub fn encoding(&self) -> LegacyEncoding { self.encoding }

    pub fn output(&self) -> &Path { &self.output }

    pub fn generate<S: DigestStore + ?Sized>(
        &self,
        store: &mut S,
        opts:  &GenerateOptions,
    ) -> Result<Outcome, CodetabError> {
        generate(self.encoding.code_page(), &self.output, store, opts)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
