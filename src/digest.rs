//! Content digests and the recorded-digest marker.
//!
//! Every table artifact is identified by the SHA-1 of its raw bytes.  The
//! digest is a change-detection key only: it decides whether a table needs
//! to be rewritten, it is never used to authenticate anything.
//!
//! # Marker format
//! A marker-bearing text file carries exactly one recorded digest between two
//! literal sentinel lines:
//!
//! ```text
//! # begin
//! TABLE_HASH = 'd55fcddd97ee1f9836bc020d4a7c9af4a4bccc68'
//! # end
//! ```
//!
//! [`rewrite_digest_marker`] replaces the whole span (sentinels included) and
//! leaves every byte outside it untouched.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest as _, Sha1};

use crate::error::CodetabError;

pub const MARKER_BEGIN: &str = "# begin";
pub const MARKER_END:   &str = "# end";
/// Name the digest literal is assigned to inside the marker span.
pub const MARKER_NAME:  &str = "TABLE_HASH";

/// Byte length of a SHA-1 digest.
pub const DIGEST_LEN: usize = 20;

// ── Digest ───────────────────────────────────────────────────────────────────

/// A 160-bit SHA-1 content digest.  Displays as 40 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    pub fn of(bytes: &[u8]) -> Self {
        let hash = Sha1::digest(bytes);
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(&hash);
        Digest(out)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] { &self.0 }

    pub fn to_hex(&self) -> String { hex::encode(self.0) }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = CodetabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != DIGEST_LEN * 2 {
            return Err(CodetabError::InvalidDigest(s.to_owned()));
        }
        let mut out = [0u8; DIGEST_LEN];
        hex::decode_to_slice(s, &mut out)
            .map_err(|_| CodetabError::InvalidDigest(s.to_owned()))?;
        Ok(Digest(out))
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ── File digests ─────────────────────────────────────────────────────────────

/// SHA-1 of the entire file at `path`.
pub fn file_digest<P: AsRef<Path>>(path: P) -> io::Result<Digest> {
    Ok(Digest::of(&fs::read(path)?))
}

/// Whether the file at `path` hashes to `expected`.
///
/// A missing or unreadable file is never current.
pub fn is_current<P: AsRef<Path>>(path: P, expected: &Digest) -> bool {
    match file_digest(path.as_ref()) {
        Ok(actual) => actual == *expected,
        Err(e) => {
            log::debug!("no digest for {}: {e}", path.as_ref().display());
            false
        }
    }
}

// ── Marker ───────────────────────────────────────────────────────────────────

/// Byte range `[start, end)` of the marker span, sentinels included.
fn marker_span(text: &str, path: &Path) -> Result<(usize, usize), CodetabError> {
    let start = text.find(MARKER_BEGIN).ok_or_else(|| CodetabError::MarkerNotFound {
        path:   path.display().to_string(),
        marker: MARKER_BEGIN,
    })?;
    let after = start + MARKER_BEGIN.len();
    let end = text[after..].find(MARKER_END).ok_or_else(|| CodetabError::MarkerNotFound {
        path:   path.display().to_string(),
        marker: MARKER_END,
    })?;
    Ok((start, after + end + MARKER_END.len()))
}

/// Render the replacement block for a marker span.
pub fn marker_block(digest: &Digest) -> String {
    format!("{MARKER_BEGIN}\n{MARKER_NAME} = '{digest}'\n{MARKER_END}")
}

/// Replace the marker span in `path` with a block recording `digest`.
///
/// Full read-modify-write of the file; not atomic.
pub fn rewrite_digest_marker<P: AsRef<Path>>(path: P, digest: &Digest) -> Result<(), CodetabError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let (start, end) = marker_span(&text, path)?;

    let mut patched = String::with_capacity(text.len());
    patched.push_str(&text[..start]);
    patched.push_str(&marker_block(digest));
    patched.push_str(&text[end..]);
    fs::write(path, patched)?;
    Ok(())
}

/// Digest recorded in the marker span of `path`.
///
/// `Ok(None)` when the span holds no parseable `TABLE_HASH` assignment.
pub fn read_digest_marker<P: AsRef<Path>>(path: P) -> Result<Option<Digest>, CodetabError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let (start, end) = marker_span(&text, path)?;

    let recorded = text[start..end]
        .lines()
        .filter_map(|line| line.trim().strip_prefix(MARKER_NAME))
        .filter_map(|rest| rest.trim_start().strip_prefix('='))
        .map(|value| value.trim().trim_matches(|c: char| c == '\'' || c == '"'))
        .find_map(|value| value.parse::<Digest>().ok());
    Ok(recorded)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn sha1_known_vectors() {
        assert_eq!(Digest::of(b"").to_hex(), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert_eq!(Digest::of(b"abc").to_hex(), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn parse_rejects_wrong_length_and_non_hex() {
        assert!("abc".parse::<Digest>().is_err());
        assert!("zz39a3ee5e6b4b0d3255bfef95601890afd80709".parse::<Digest>().is_err());
        let d: Digest = "da39a3ee5e6b4b0d3255bfef95601890afd80709".parse().unwrap();
        assert_eq!(d, Digest::of(b""));
    }

    #[test]
    fn missing_file_is_not_current() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.codetab");
        assert!(file_digest(&missing).is_err());
        assert!(!is_current(&missing, &Digest::of(b"")));
    }

    #[test]
    fn is_current_compares_content() {
        let f = NamedTempFile::new().unwrap();
        fs::write(f.path(), b"abc").unwrap();
        assert!(is_current(f.path(), &Digest::of(b"abc")));
        assert!(!is_current(f.path(), &Digest::of(b"abd")));
    }

    #[test]
    fn rewrite_replaces_only_the_span() {
        let f = NamedTempFile::new().unwrap();
        fs::write(
            f.path(),
            "header\n# begin\nTABLE_HASH = 'old'\n# end\n\nfooter # end\n",
        ).unwrap();

        let d = Digest::of(b"abc");
        rewrite_digest_marker(f.path(), &d).unwrap();

        let text = fs::read_to_string(f.path()).unwrap();
        assert_eq!(
            text,
            "header\n# begin\nTABLE_HASH = 'a9993e364706816aba3e25717850c26c9cd0d89d'\n# end\n\nfooter # end\n",
        );
        assert_eq!(read_digest_marker(f.path()).unwrap(), Some(d));
    }

    #[test]
    fn rewrite_is_stable_when_repeated() {
        let f = NamedTempFile::new().unwrap();
        fs::write(f.path(), "# begin\n# end\n").unwrap();
        let d = Digest::of(b"x");
        rewrite_digest_marker(f.path(), &d).unwrap();
        let once = fs::read_to_string(f.path()).unwrap();
        rewrite_digest_marker(f.path(), &d).unwrap();
        assert_eq!(once, fs::read_to_string(f.path()).unwrap());
    }

    #[test]
    fn missing_sentinels_are_reported() {
        let f = NamedTempFile::new().unwrap();
        fs::write(f.path(), "no markers here\n").unwrap();
        match rewrite_digest_marker(f.path(), &Digest::of(b"")) {
            Err(CodetabError::MarkerNotFound { marker, .. }) => assert_eq!(marker, MARKER_BEGIN),
            other => panic!("expected MarkerNotFound, got {other:?}"),
        }

        // `# end` before `# begin` does not count.
        fs::write(f.path(), "# end\n# begin\n").unwrap();
        match read_digest_marker(f.path()) {
            Err(CodetabError::MarkerNotFound { marker, .. }) => assert_eq!(marker, MARKER_END),
            other => panic!("expected MarkerNotFound, got {other:?}"),
        }
        assert_eq!(fs::read_to_string(f.path()).unwrap(), "# end\n# begin\n");
    }

    #[test]
    fn empty_span_reads_as_none() {
        let f = NamedTempFile::new().unwrap();
        fs::write(f.path(), "# begin\nTABLE_HASH = ''\n# end\n").unwrap();
        assert_eq!(read_digest_marker(f.path()).unwrap(), None);
    }

    #[test]
    fn digest_serializes_as_hex_string() {
        let d = Digest::of(b"abc");
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, "\"a9993e364706816aba3e25717850c26c9cd0d89d\"");
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}
