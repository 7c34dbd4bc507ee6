//! Code page registry: a closed set of legacy double-byte encodings.
//!
//! # Identity rules
//! Every supported encoding is a [`LegacyEncoding`] variant with a frozen
//! lowercase name.  That name is:
//!   - The stem of the generated table file (`<name>.codetab`).
//!   - The key under which the table digest is recorded.
//!
//! Each variant resolves to exactly one statically registered [`CodePage`].
//! There is no runtime lookup by module or plugin; an unknown name is an
//! error.
//!
//! # Byte order
//! A [`CodeUnit`] is always probed in big-endian order: `0xB0A1` is the byte
//! sequence `B0 A1`.

use std::ops::RangeInclusive;

use encoding_rs::Encoding;

use crate::error::CodetabError;

/// A candidate 2-byte sequence, big-endian.
pub type CodeUnit = u16;

// ── Classification ───────────────────────────────────────────────────────────

/// Outcome of probing one code unit against a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Decodes to exactly one Unicode scalar.
    Valid(char),
    /// Undecodable, or decodes to zero or several scalars.
    Invalid,
}

impl Classification {
    /// Classify decoder output: only a single scalar is a mapping.
    pub fn from_decoded(decoded: &str) -> Self {
        let mut chars = decoded.chars();
        match (chars.next(), chars.next()) {
            (Some(ch), None) => Classification::Valid(ch),
            _                => Classification::Invalid,
        }
    }

    pub fn scalar(self) -> Option<char> {
        match self {
            Classification::Valid(ch) => Some(ch),
            Classification::Invalid   => None,
        }
    }
}

// ── CodePage trait ───────────────────────────────────────────────────────────

pub trait CodePage: Send + Sync {
    /// Stable lowercase name; used for file names and digest records.
    fn name(&self) -> &str;
    fn classify(&self, code: CodeUnit) -> Classification;
}

// ── LegacyEncoding enum ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LegacyEncoding {
    Gb2312,
    Gbk,
    ShiftJis,
    EucKr,
    Big5,
    FalcomSjis,
}

impl LegacyEncoding {
    pub const ALL: [LegacyEncoding; 6] = [
        LegacyEncoding::Gb2312,
        LegacyEncoding::Gbk,
        LegacyEncoding::ShiftJis,
        LegacyEncoding::EucKr,
        LegacyEncoding::Big5,
        LegacyEncoding::FalcomSjis,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LegacyEncoding::Gb2312     => "gb2312",
            LegacyEncoding::Gbk        => "gbk",
            LegacyEncoding::ShiftJis   => "shift_jis",
            LegacyEncoding::EucKr      => "euc_kr",
            LegacyEncoding::Big5       => "big5",
            LegacyEncoding::FalcomSjis => "falcom_sjis",
        }
    }

    /// Parse a target name.  Case-insensitive; `-` and `_` are interchangeable.
    pub fn from_name(s: &str) -> Result<Self, CodetabError> {
        let norm = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|e| e.name() == norm)
            .ok_or_else(|| CodetabError::UnknownEncoding(s.to_owned()))
    }

    /// The statically registered decoder for this encoding.
    pub fn code_page(self) -> &'static dyn CodePage {
        match self {
            LegacyEncoding::Gb2312     => &Gb2312Page,
            LegacyEncoding::Gbk        => &GbkPage,
            LegacyEncoding::ShiftJis   => &ShiftJisPage,
            LegacyEncoding::EucKr      => &EucKrPage,
            LegacyEncoding::Big5       => &Big5Page,
            LegacyEncoding::FalcomSjis => &FalcomSjisPage,
        }
    }
}

impl std::fmt::Display for LegacyEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for LegacyEncoding {
    type Err = CodetabError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::from_name(s) }
}

// ── Built-in code pages ──────────────────────────────────────────────────────

/// Decode the two bytes of `code` with no replacement characters.
fn decode_strict(encoding: &'static Encoding, code: CodeUnit) -> Classification {
    let bytes = code.to_be_bytes();
    match encoding.decode_without_bom_handling_and_without_replacement(&bytes) {
        Some(decoded) => Classification::from_decoded(&decoded),
        None          => Classification::Invalid,
    }
}

/// EUC-CN.  Decoded through GBK, restricted to the cells GB2312 defines.
///
/// GBK fills some GB2312 gaps and remaps two punctuation cells; those are
/// undone here.  The user-defined rows (private use in GBK) are rejected.
pub struct Gb2312Page;
impl CodePage for Gb2312Page {
    fn name(&self) -> &str { LegacyEncoding::Gb2312.name() }
    fn classify(&self, code: CodeUnit) -> Classification {
        let [lead, trail] = code.to_be_bytes();
        if !(0xA1..=0xF7).contains(&lead) || !(0xA1..=0xFE).contains(&trail) {
            return Classification::Invalid;
        }
        if GBK_ONLY_CELLS.iter().any(|cells| cells.contains(&code)) {
            return Classification::Invalid;
        }
        match code {
            0xA1A4 => return Classification::Valid('\u{30FB}'), // KATAKANA MIDDLE DOT
            0xA1AA => return Classification::Valid('\u{2015}'), // HORIZONTAL BAR
            _ => {}
        }
        match decode_strict(encoding_rs::GBK, code) {
            Classification::Valid(ch) if is_private_use(ch) => Classification::Invalid,
            other => other,
        }
    }
}

/// Cells inside the EUC-CN rows that only GBK assigns.
const GBK_ONLY_CELLS: [RangeInclusive<CodeUnit>; 4] = [
    0xA2A1..=0xA2AA, // small roman numerals
    0xA2E3..=0xA2E3, // euro sign
    0xA6D9..=0xA6F5, // vertical presentation forms
    0xA8BB..=0xA8C0, // pinyin additions
];

fn is_private_use(ch: char) -> bool {
    ('\u{E000}'..='\u{F8FF}').contains(&ch)
}

pub struct GbkPage;
impl CodePage for GbkPage {
    fn name(&self) -> &str { LegacyEncoding::Gbk.name() }
    fn classify(&self, code: CodeUnit) -> Classification {
        decode_strict(encoding_rs::GBK, code)
    }
}

pub struct ShiftJisPage;
impl CodePage for ShiftJisPage {
    fn name(&self) -> &str { LegacyEncoding::ShiftJis.name() }
    fn classify(&self, code: CodeUnit) -> Classification {
        decode_strict(encoding_rs::SHIFT_JIS, code)
    }
}

pub struct EucKrPage;
impl CodePage for EucKrPage {
    fn name(&self) -> &str { LegacyEncoding::EucKr.name() }
    fn classify(&self, code: CodeUnit) -> Classification {
        decode_strict(encoding_rs::EUC_KR, code)
    }
}

pub struct Big5Page;
impl CodePage for Big5Page {
    fn name(&self) -> &str { LegacyEncoding::Big5.name() }
    fn classify(&self, code: CodeUnit) -> Classification {
        decode_strict(encoding_rs::BIG5, code)
    }
}

/// Falcom's Shift JIS dialect.  The decoder is byte-driven, so a code unit is
/// valid only if it consumes both bytes into a single character.  Sequences
/// the decoder hands back as undecoded (`Err`) are invalid.
pub struct FalcomSjisPage;
impl CodePage for FalcomSjisPage {
    fn name(&self) -> &str { LegacyEncoding::FalcomSjis.name() }
    fn classify(&self, code: CodeUnit) -> Classification {
        let mut bytes = code.to_be_bytes().into_iter();
        match falcom_sjis::decode_char(&mut bytes) {
            Some(Ok(ch)) if bytes.next().is_none() => Classification::Valid(ch),
            _ => Classification::Invalid,
        }
    }
}

/// Human-readable rendering of a decoded character for table comments.
///
/// Control characters would break the one-record-per-line layout, so they
/// are written as `\u{..}` escapes.
pub fn display_char(ch: char) -> String {
    if ch.is_control() {
        ch.escape_unicode().to_string()
    } else {
        ch.to_string()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
