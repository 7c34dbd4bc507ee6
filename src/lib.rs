pub mod error;
pub mod digest;
pub mod encoding;
pub mod generator;
pub mod state;
pub mod batch;

pub use error::CodetabError;
pub use digest::{Digest, file_digest, is_current, rewrite_digest_marker, read_digest_marker};
pub use encoding::{CodePage, CodeUnit, Classification, LegacyEncoding};
pub use generator::{GenerateOptions, Generator, MappingRecord, Outcome, generate};
pub use state::{DigestStore, Manifest, MarkerFile};
pub use batch::{BuildOptions, StateBackend, TargetReport, build_all};
