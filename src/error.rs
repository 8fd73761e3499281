//! Error types for every stage of a fetch run
//!
//! Each collaborator has its own error enum so callers can tell a broken
//! SFTP link from a rejected ciphertext. The pipeline wraps per-file failures
//! in [`Error::File`] together with the filename and the [`Stage`] that failed.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Failures talking to the remote SFTP server
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        source: io::Error,
    },

    #[error("SSH session setup failed: {0}")]
    Session(#[source] ssh2::Error),

    #[error("host key verification failed for {host}: {reason}")]
    HostKey { host: String, reason: String },

    #[error("authentication failed for user '{user}': {source}")]
    Auth { user: String, source: ssh2::Error },

    #[error("failed to list directory '{dir}': {source}")]
    Listing { dir: String, source: ssh2::Error },

    #[error("failed to open remote file '{path}': {source}")]
    Open { path: String, source: ssh2::Error },

    #[error("failed to download '{path}': {source}")]
    Download { path: String, source: io::Error },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failures reading from or writing to the content store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("bucket '{bucket}' is not available: {message}")]
    BucketUnavailable { bucket: String, message: String },

    #[error("failed to look up location of bucket '{bucket}': {message}")]
    Location { bucket: String, message: String },

    #[error("failed to look up key '{key}': {message}")]
    Lookup { key: String, message: String },

    #[error("failed to upload key '{key}': {message}")]
    Upload { key: String, message: String },

    #[error("failed to start storage runtime: {0}")]
    Runtime(#[source] io::Error),
}

/// Failures turning a downloaded payload into plaintext
#[derive(Debug, thiserror::Error)]
pub enum DecryptError {
    #[error("no matching key")]
    NoMatchingKey,

    #[error("unexpected content")]
    UnexpectedContent,

    #[error("integrity check failed")]
    IntegrityCheckFailed,

    #[error("malformed encrypted message: {0}")]
    MalformedEnvelope(String),

    #[error("unable to load decryption keys from {path}: {message}")]
    KeyBundle { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failures announcing a stored file on the message bus
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to connect to message broker {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        source: amiquip::Error,
    },

    #[error("failed to open channel: {0}")]
    Channel(#[source] amiquip::Error),

    #[error("failed to declare exchange '{exchange}': {source}")]
    Declare {
        exchange: String,
        source: amiquip::Error,
    },

    #[error("failed to publish to '{exchange}' with routing key '{routing_key}': {source}")]
    Publish {
        exchange: String,
        routing_key: String,
        source: amiquip::Error,
    },

    #[error("publish channel unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("broker did not confirm message to '{exchange}' with routing key '{routing_key}': {reason}")]
    Unconfirmed {
        exchange: String,
        routing_key: String,
        reason: String,
    },
}

/// Missing or invalid settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read configuration from {path}: {source}")]
    Unreadable { path: PathBuf, source: io::Error },

    #[error("invalid configuration in {path}: {message}")]
    Invalid { path: PathBuf, message: String },

    #[error("missing setting: {0}")]
    Missing(&'static str),
}

/// Processing step a file was in when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Lookup,
    Download,
    Decrypt,
    Upload,
    ResolveUrl,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Lookup => "lookup",
            Stage::Download => "download",
            Stage::Decrypt => "decrypt",
            Stage::Upload => "upload",
            Stage::ResolveUrl => "resolve url",
            Stage::Publish => "publish",
        };
        f.write_str(name)
    }
}

/// Top-level error for a fetch run
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Decrypt(#[from] DecryptError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("listing remote files failed: {0}")]
    Listing(#[source] TransportError),

    #[error("{stage} failed for '{filename}': {source}")]
    File {
        filename: String,
        stage: Stage,
        source: Box<Error>,
    },

    #[error("failed to write status line: {0}")]
    Output(#[source] io::Error),
}

impl Error {
    /// Attaches the filename and stage to a collaborator failure
    pub fn in_file<E: Into<Error>>(filename: &str, stage: Stage, err: E) -> Self {
        Error::File {
            filename: filename.to_string(),
            stage,
            source: Box::new(err.into()),
        }
    }

    /// Stage of a per-file failure, if this is one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::File { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
