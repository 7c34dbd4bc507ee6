use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodetabError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// The marker-bearing file lacks one of the `# begin` / `# end` sentinels.
    #[error("Digest marker `{marker}` not found in {path}")]
    MarkerNotFound { path: String, marker: &'static str },
    #[error("Invalid digest '{0}': expected 40 hex characters")]
    InvalidDigest(String),
    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("A marker file records a single digest, but {0} targets were requested")]
    MarkerTargets(usize),
    #[error("Unknown encoding '{0}'")]
    UnknownEncoding(String),
}
