//! Fetch, dedupe and process loop
//!
//! One run lists the remote candidates once, then handles each filename start
//! to finish before looking at the next one. Every collaborator failure stops
//! the run; files completed before it stay processed and everything else is
//! picked up again by the next run.

use std::io::Write;

use crate::decrypt::Decryptor;
use crate::error::{Error, Stage};
use crate::logging::{log, log_for_file};
use crate::publish::Publisher;
use crate::remote::RemoteSource;
use crate::request::ProcessingRequest;
use crate::store::{dedupe_decision, ContentStore, DedupeDecision};

/// Counts reported at the end of a run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub listed: usize,
    pub processed: usize,
    pub skipped: usize,
    pub would_process: usize,
}

/// What happened to one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Skipped,
    WouldProcess,
    Processed,
}

impl Outcome {
    fn status_line(&self, filename: &str) -> String {
        match self {
            Outcome::Skipped => format!("Previously seen: {}", filename),
            Outcome::WouldProcess => format!("Would process: {}", filename),
            Outcome::Processed => format!("Processed: {}", filename),
        }
    }
}

pub struct Pipeline<'a, R, S, P> {
    source: &'a R,
    store: &'a S,
    publisher: &'a P,
    decryptor: &'a Decryptor,
}

impl<'a, R, S, P> Pipeline<'a, R, S, P>
where
    R: RemoteSource,
    S: ContentStore,
    P: Publisher,
{
    pub fn new(source: &'a R, store: &'a S, publisher: &'a P, decryptor: &'a Decryptor) -> Self {
        Pipeline {
            source,
            store,
            publisher,
            decryptor,
        }
    }

    /// Runs one pass over the remote candidates
    ///
    /// Writes one status line per candidate to `out`. Candidates come from a
    /// set, so the order of the lines is unspecified.
    ///
    /// # Errors
    /// - `Error::Listing` if the candidate listing fails
    /// - `Error::File` with the filename and failing stage for any per-file
    ///   failure, including the dedupe lookup
    /// - `Error::Output` if a status line cannot be written
    pub fn run<W: Write>(&self, request: &ProcessingRequest, out: &mut W) -> Result<RunSummary, Error> {
        let _ = log(&format!(
            "Listing files modified in the last {} day(s) matching '{}'",
            request.days_to_fetch(),
            request.pattern()
        ));

        let candidates = self
            .source
            .list_candidates(request.days_to_fetch(), request.pattern())
            .map_err(Error::Listing)?;

        let mut summary = RunSummary {
            listed: candidates.len(),
            ..RunSummary::default()
        };
        let _ = log(&format!("Found {} candidate file(s)", summary.listed));

        for filename in &candidates {
            let outcome = self.process_file(filename, request)?;
            match outcome {
                Outcome::Skipped => summary.skipped += 1,
                Outcome::WouldProcess => summary.would_process += 1,
                Outcome::Processed => summary.processed += 1,
            }
            writeln!(out, "{}", outcome.status_line(filename)).map_err(Error::Output)?;
        }
        out.flush().map_err(Error::Output)?;

        let _ = log(&format!(
            "Run complete: {} listed, {} processed, {} previously seen, {} would process",
            summary.listed, summary.processed, summary.skipped, summary.would_process
        ));

        Ok(summary)
    }

    fn process_file(&self, filename: &str, request: &ProcessingRequest) -> Result<Outcome, Error> {
        let exists = self
            .store
            .key_exists(filename)
            .map_err(|e| Error::in_file(filename, Stage::Lookup, e))?;

        if dedupe_decision(exists, request.overwrite()) == DedupeDecision::Skip {
            return Ok(Outcome::Skipped);
        }
        if exists {
            let _ = log_for_file(filename, "Previously seen, processing again (overwrite)");
        }

        if request.dry_run() {
            return Ok(Outcome::WouldProcess);
        }

        let downloaded = self
            .source
            .download(filename)
            .map_err(|e| Error::in_file(filename, Stage::Download, e))?;
        if let Ok(size) = downloaded.len() {
            let _ = log_for_file(filename, &format!("Downloaded {} bytes", size));
        }

        let plaintext = self
            .decryptor
            .decrypt(downloaded)
            .map_err(|e| Error::in_file(filename, Stage::Decrypt, e))?;

        self.store
            .store(filename, &plaintext)
            .map_err(|e| Error::in_file(filename, Stage::Upload, e))?;
        drop(plaintext);

        let location = self
            .store
            .resource_url_for(filename)
            .map_err(|e| Error::in_file(filename, Stage::ResolveUrl, e))?;

        self.publisher
            .publish(request.routing_key(), &location)
            .map_err(|e| Error::in_file(filename, Stage::Publish, e))?;
        let _ = log_for_file(
            filename,
            &format!("Announced {} with routing key '{}'", location, request.routing_key()),
        );

        Ok(Outcome::Processed)
    }
}
