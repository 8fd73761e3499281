//! SFTP fetch utility library
//!
//! Polls an SFTP drop folder, skips files already present in the content
//! store, optionally decrypts OpenPGP payloads, uploads them to S3 and
//! announces their URLs on RabbitMQ.

pub mod app;
pub mod artifact;
pub mod cli;
pub mod config;
pub mod decrypt;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod publish;
pub mod remote;
pub mod request;
pub mod store;

pub use artifact::Artifact;
pub use cli::{parse_args, CliCommand, CliOptions};
pub use config::{parse_config, Config};
pub use error::{Error, Stage};
pub use logging::{log, set_log_file};
pub use pipeline::{Pipeline, RunSummary};
pub use request::{FilenamePattern, ProcessingRequest};

/// Name of the program, used in usage and version output
pub const PROGRAM_NAME: &str = "sftp-fetch";

/// Current version of the program (from Cargo.toml)
pub const PROGRAM_VERSION: &str = env!("CARGO_PKG_VERSION");
