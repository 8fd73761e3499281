//! Wiring between the command line, the configuration and the pipeline

use std::io::Write;

use crate::cli::CliOptions;
use crate::config::Config;
use crate::decrypt::Decryptor;
use crate::error::{ConfigError, Error};
use crate::logging::log;
use crate::pipeline::{Pipeline, RunSummary};
use crate::publish::RabbitPublisher;
use crate::remote::SftpSource;
use crate::request::ProcessingRequest;
use crate::store::S3Store;

/// Builds the run parameters from command line and configuration
///
/// `--routing-key` beats `rabbit.routingkey`, which beats the empty key.
/// `--days` beats `fetch.days`; one of the two must be present.
///
/// # Errors
/// `ConfigError::Missing` when no fetch window is given anywhere
pub fn build_request(options: &CliOptions, config: &Config) -> Result<ProcessingRequest, ConfigError> {
    let routing_key = options
        .routing_key
        .clone()
        .or_else(|| config.rabbit.routing_key.clone())
        .unwrap_or_default();

    let days = options
        .days
        .or(config.fetch_days)
        .ok_or(ConfigError::Missing("fetch.days"))?;

    let mut request = ProcessingRequest::new(routing_key, days)
        .with_dry_run(options.noop)
        .with_overwrite(options.overwrite);
    if let Some(pattern) = &options.pattern {
        request = request.with_pattern(pattern.clone());
    }

    Ok(request)
}

/// Connects every collaborator and runs one pipeline pass
///
/// The decryption keys are loaded first so a bad key bundle fails before any
/// network connection is made. The SFTP session is disconnected when the
/// run ends, whatever the outcome.
pub fn run<W: Write>(config: &Config, request: &ProcessingRequest, out: &mut W) -> Result<RunSummary, Error> {
    let decryptor = Decryptor::from_key_path(config.decryption_key_path.as_deref())?;
    let _ = log(&format!("Using {} decryptor", decryptor.name()));

    let source = scopeguard::guard(SftpSource::connect(&config.sftp)?, |source| source.close());
    let store = S3Store::connect(&config.s3)?;
    let publisher = RabbitPublisher::connect(&config.rabbit)?;

    if request.dry_run() {
        let _ = log("Dry run: nothing will be downloaded, stored or announced");
    }

    let pipeline = Pipeline::new(&*source, &store, &publisher, &decryptor);
    pipeline.run(request, out)
}
