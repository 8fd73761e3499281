//! Remote file sources
//!
//! The pipeline only needs two things from the remote side: the set of
//! candidate filenames for a run, and a way to fetch one of them into a local
//! [`Artifact`]. `RemoteSource` captures that; `SftpSource` implements it over
//! SSH. Candidate selection itself is a pure function over listed entries so
//! it can be tested without a server.

pub mod sftp;

pub use sftp::SftpSource;

use crate::artifact::Artifact;
use crate::error::TransportError;
use crate::request::FilenamePattern;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub filename: String,
    pub modified_at: DateTime<Utc>,
}

/// Source of files to fetch
#[cfg_attr(test, mockall::automock)]
pub trait RemoteSource {
    /// Lists files modified within the last `max_age_days` days whose name
    /// fully matches `pattern`
    ///
    /// The result is a set: callers must not rely on any ordering.
    ///
    /// # Errors
    /// Any listing failure. Partial listings are never returned.
    fn list_candidates(
        &self,
        max_age_days: u32,
        pattern: &FilenamePattern,
    ) -> Result<HashSet<String>, TransportError>;

    /// Downloads one file into a fresh temporary artifact
    fn download(&self, filename: &str) -> Result<Artifact, TransportError>;
}

/// Oldest modification time (unix seconds) still eligible for a run
///
/// `now` minus `max_age_days` whole days, truncated to whole seconds. A
/// window reaching past the earliest representable date admits every file.
pub fn cutoff_timestamp(now: DateTime<Utc>, max_age_days: u32) -> i64 {
    now.checked_sub_signed(Duration::days(i64::from(max_age_days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
        .timestamp()
}

/// Applies the age and name filters to a listing
///
/// An entry is kept iff it was modified at or after `cutoff` (unix seconds)
/// and its filename fully matches `pattern`.
pub fn select_candidates<I>(entries: I, cutoff: i64, pattern: &FilenamePattern) -> HashSet<String>
where
    I: IntoIterator<Item = RemoteFile>,
{
    entries
        .into_iter()
        .filter(|entry| entry.modified_at.timestamp() >= cutoff)
        .filter(|entry| pattern.matches(&entry.filename))
        .map(|entry| entry.filename)
        .collect()
}

/// Joins the configured remote folder and a filename
pub fn remote_path(folder: &str, filename: &str) -> String {
    if folder.is_empty() {
        filename.to_string()
    } else if folder.ends_with('/') {
        format!("{}{}", folder, filename)
    } else {
        format!("{}/{}", folder, filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn file(name: &str, modified_at: DateTime<Utc>) -> RemoteFile {
        RemoteFile {
            filename: name.to_string(),
            modified_at,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_cutoff_timestamp() {
        let cutoff = cutoff_timestamp(now(), 2);
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2024, 3, 13, 12, 0, 0).unwrap().timestamp());
        assert_eq!(cutoff_timestamp(now(), 0), now().timestamp());
    }

    #[test]
    fn test_cutoff_with_huge_window_admits_everything() {
        let cutoff = cutoff_timestamp(now(), u32::MAX);
        assert_eq!(cutoff, DateTime::<Utc>::MIN_UTC.timestamp());

        let entries = vec![
            file("ancient.csv", DateTime::<Utc>::from_timestamp(0, 0).unwrap()),
            file("fresh.csv", now()),
        ];
        let selected = select_candidates(entries, cutoff, &FilenamePattern::default());
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_cutoff_truncates_to_whole_seconds() {
        let with_millis = now() + Duration::milliseconds(750);
        assert_eq!(cutoff_timestamp(with_millis, 1), cutoff_timestamp(now(), 1));
    }

    #[test]
    fn test_select_excludes_old_files() {
        let cutoff = cutoff_timestamp(now(), 1);
        let entries = vec![
            file("fresh.csv", now() - Duration::hours(3)),
            file("stale.csv", now() - Duration::days(2)),
        ];
        let selected = select_candidates(entries, cutoff, &FilenamePattern::default());
        assert_eq!(selected, HashSet::from(["fresh.csv".to_string()]));
    }

    #[test]
    fn test_select_keeps_file_exactly_at_cutoff() {
        let cutoff = cutoff_timestamp(now(), 1);
        let entries = vec![
            file("edge.csv", now() - Duration::days(1)),
            file("just-over.csv", now() - Duration::days(1) - Duration::seconds(1)),
        ];
        let selected = select_candidates(entries, cutoff, &FilenamePattern::default());
        assert_eq!(selected, HashSet::from(["edge.csv".to_string()]));
    }

    #[test]
    fn test_select_excludes_non_matching_names_regardless_of_age() {
        let cutoff = cutoff_timestamp(now(), 7);
        let pattern = FilenamePattern::new(r".*\.csv").unwrap();
        let entries = vec![
            file("report.csv", now()),
            file("report.csv.tmp", now()),
            file("notes.txt", now() - Duration::hours(1)),
        ];
        let selected = select_candidates(entries, cutoff, &pattern);
        assert_eq!(selected, HashSet::from(["report.csv".to_string()]));
    }

    #[test]
    fn test_select_collapses_duplicates() {
        let cutoff = cutoff_timestamp(now(), 1);
        let entries = vec![file("a.csv", now()), file("a.csv", now())];
        assert_eq!(select_candidates(entries, cutoff, &FilenamePattern::default()).len(), 1);
    }

    #[test]
    fn test_remote_path() {
        assert_eq!(remote_path("", "a.csv"), "a.csv");
        assert_eq!(remote_path("/outgoing/", "a.csv"), "/outgoing/a.csv");
        assert_eq!(remote_path("/outgoing", "a.csv"), "/outgoing/a.csv");
        assert_eq!(remote_path("outgoing", "a.csv"), "outgoing/a.csv");
    }
}
