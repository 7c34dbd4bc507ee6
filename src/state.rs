//! Recorded digests: where the "last written table" state lives.
//!
//! The default backend is a sidecar JSON [`Manifest`] next to the generated
//! tables, keyed by encoding name.  [`MarkerFile`] keeps the older layout
//! where one digest is embedded between `# begin` / `# end` lines of a text
//! file.
//!
//! Either way the record is a cache key.  Anything unreadable reads as "no
//! record", which forces regeneration.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::digest::{read_digest_marker, rewrite_digest_marker, Digest};
use crate::error::CodetabError;

/// Manifest file name inside the output directory.
pub const MANIFEST_FILE: &str = "codetab.manifest.json";

pub trait DigestStore {
    /// Digest recorded for `target` by the last successful generation.
    fn recorded(&self, target: &str) -> Result<Option<Digest>, CodetabError>;
    fn record(&mut self, target: &str, digest: &Digest, records: usize) -> Result<(), CodetabError>;
}

// ── Manifest ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub digest:       Digest,
    pub records:      usize,
    /// Unix seconds, UTC.
    pub generated_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ManifestData {
    #[serde(default)]
    pub tables: BTreeMap<String, ManifestEntry>,
}

impl ManifestData {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    data: ManifestData,
}

impl Manifest {
    /// Load the manifest at `path`.
    ///
    /// A missing file is an empty manifest.  So is a file that fails to
    /// parse; that case is logged, and every table it covered is rebuilt.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CodetabError> {
        let path = path.as_ref().to_owned();
        let data = match fs::read(&path) {
            Ok(bytes) => ManifestData::from_bytes(&bytes).unwrap_or_else(|e| {
                log::warn!("ignoring unreadable manifest {}: {e}", path.display());
                ManifestData::default()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => ManifestData::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn entry(&self, target: &str) -> Option<&ManifestEntry> {
        self.data.tables.get(target)
    }

    pub fn data(&self) -> &ManifestData { &self.data }

    /// Write `data` to a sibling temp file and rename it into place.
    fn persist(&self, data: &ManifestData) -> Result<(), CodetabError> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, data.to_bytes()?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl DigestStore for Manifest {
    fn recorded(&self, target: &str) -> Result<Option<Digest>, CodetabError> {
        Ok(self.entry(target).map(|e| e.digest))
    }

    fn record(&mut self, target: &str, digest: &Digest, records: usize) -> Result<(), CodetabError> {
        let mut next = self.data.clone();
        next.tables.insert(target.to_owned(), ManifestEntry {
            digest: *digest,
            records,
            generated_at: Utc::now().timestamp(),
        });
        // In-memory state only advances once the file is on disk.
        self.persist(&next)?;
        self.data = next;
        Ok(())
    }
}

// ── MarkerFile ───────────────────────────────────────────────────────────────

/// A text file holding a single digest between `# begin` and `# end`.
///
/// There is one slot, so the target name is not part of the record.
#[derive(Debug, Clone)]
pub struct MarkerFile {
    path: PathBuf,
}

impl MarkerFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path { &self.path }
}

impl DigestStore for MarkerFile {
    fn recorded(&self, _target: &str) -> Result<Option<Digest>, CodetabError> {
        read_digest_marker(&self.path)
    }

    fn record(&mut self, _target: &str, digest: &Digest, _records: usize) -> Result<(), CodetabError> {
        rewrite_digest_marker(&self.path, digest)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_manifest_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let m = Manifest::load(dir.path().join(MANIFEST_FILE)).unwrap();
        assert_eq!(m.recorded("gb2312").unwrap(), None);
        assert!(m.data().tables.is_empty());
    }

    #[test]
    fn record_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        let d = Digest::of(b"table");

        let mut m = Manifest::load(&path).unwrap();
        m.record("gb2312", &d, 7445).unwrap();
        assert!(!dir.path().join(format!("{MANIFEST_FILE}.tmp")).exists());

        let reloaded = Manifest::load(&path).unwrap();
        assert_eq!(reloaded.recorded("gb2312").unwrap(), Some(d));
        assert_eq!(reloaded.entry("gb2312").unwrap().records, 7445);
        assert_eq!(reloaded.recorded("big5").unwrap(), None);
    }

    #[test]
    fn corrupt_manifest_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        fs::write(&path, "{ not json").unwrap();
        let m = Manifest::load(&path).unwrap();
        assert_eq!(m.recorded("gb2312").unwrap(), None);
    }

    #[test]
    fn manifest_json_shape() {
        let mut data = ManifestData::default();
        data.tables.insert("gbk".into(), ManifestEntry {
            digest:       Digest::of(b"abc"),
            records:      2,
            generated_at: 0,
        });
        let json: serde_json::Value = serde_json::from_slice(&data.to_bytes().unwrap()).unwrap();
        assert_eq!(json["tables"]["gbk"]["digest"], "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(json["tables"]["gbk"]["records"], 2);
    }

    #[test]
    fn failed_persist_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone").join(MANIFEST_FILE);
        let mut m = Manifest::load(&path).unwrap();
        assert!(m.record("gbk", &Digest::of(b"x"), 1).is_err());
        assert_eq!(m.recorded("gbk").unwrap(), None);
    }

    #[test]
    fn marker_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gb2312.state");
        fs::write(&path, "# generated tables\n# begin\nTABLE_HASH = ''\n# end\n").unwrap();

        let mut store = MarkerFile::new(&path);
        assert_eq!(store.recorded("gb2312").unwrap(), None);

        let d = Digest::of(b"table");
        store.record("gb2312", &d, 1).unwrap();
        assert_eq!(store.recorded("gb2312").unwrap(), Some(d));
        assert!(fs::read_to_string(&path).unwrap().starts_with("# generated tables\n"));
    }

    #[test]
    fn marker_file_without_sentinels_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.state");
        fs::write(&path, "nothing\n").unwrap();
        assert!(matches!(
            MarkerFile::new(&path).recorded("gb2312"),
            Err(CodetabError::MarkerNotFound { .. })
        ));
    }
}
