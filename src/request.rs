use regex::Regex;
use std::fmt;

/// Regular expression that must match a whole filename
///
/// `regex::Regex::is_match` searches for a match anywhere in the input, so the
/// pattern is wrapped in `^(?:...)$` once at construction.
#[derive(Clone)]
pub struct FilenamePattern {
    source: String,
    regex: Regex,
}

impl FilenamePattern {
    /// Pattern used when none is given on the command line
    pub const MATCH_EVERYTHING: &'static str = ".*";

    /// Compiles a pattern for full-name matching
    ///
    /// # Errors
    /// Returns the regex compilation error for invalid patterns
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))?;
        Ok(FilenamePattern {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, filename: &str) -> bool {
        self.regex.is_match(filename)
    }

    /// The pattern as the user wrote it
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl Default for FilenamePattern {
    fn default() -> Self {
        FilenamePattern::new(Self::MATCH_EVERYTHING).expect("match-everything pattern compiles")
    }
}

impl fmt::Debug for FilenamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FilenamePattern({:?})", self.source)
    }
}

impl fmt::Display for FilenamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for FilenamePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Parameters of one pipeline run
///
/// Built once per invocation and only read afterwards. The builder methods
/// consume the request, so a request handed to the pipeline cannot change.
///
/// # Example
/// ```text
/// // let request = ProcessingRequest::new("reports", 3).with_overwrite(true);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingRequest {
    routing_key: String,
    days_to_fetch: u32,
    pattern: FilenamePattern,
    dry_run: bool,
    overwrite: bool,
}

impl ProcessingRequest {
    /// Request matching every filename, no dry run, no overwrite
    pub fn new(routing_key: impl Into<String>, days_to_fetch: u32) -> Self {
        ProcessingRequest {
            routing_key: routing_key.into(),
            days_to_fetch,
            pattern: FilenamePattern::default(),
            dry_run: false,
            overwrite: false,
        }
    }

    pub fn with_pattern(mut self, pattern: FilenamePattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub fn days_to_fetch(&self) -> u32 {
        self.days_to_fetch
    }

    pub fn pattern(&self) -> &FilenamePattern {
        &self.pattern
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_requires_full_match() {
        let pattern = FilenamePattern::new(r"report.*\.csv").unwrap();
        assert!(pattern.matches("report.csv"));
        assert!(pattern.matches("report-2024-01-01.csv"));
        assert!(!pattern.matches("old-report.csv"));
        assert!(!pattern.matches("report.csv.gpg"));
    }

    #[test]
    fn test_pattern_alternation_is_anchored_as_a_whole() {
        let pattern = FilenamePattern::new("a|b").unwrap();
        assert!(pattern.matches("a"));
        assert!(pattern.matches("b"));
        assert!(!pattern.matches("ab"));
        assert!(!pattern.matches("xa"));
    }

    #[test]
    fn test_default_pattern_matches_everything() {
        let pattern = FilenamePattern::default();
        assert!(pattern.matches("anything.txt"));
        assert!(pattern.matches(""));
        assert_eq!(pattern.as_str(), ".*");
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        assert!(FilenamePattern::new("(unclosed").is_err());
    }

    #[test]
    fn test_request_builder() {
        let request = ProcessingRequest::new("reports", 4)
            .with_pattern(FilenamePattern::new(r".*\.gpg").unwrap())
            .with_dry_run(true)
            .with_overwrite(true);
        assert_eq!(request.routing_key(), "reports");
        assert_eq!(request.days_to_fetch(), 4);
        assert_eq!(request.pattern().as_str(), r".*\.gpg");
        assert!(request.dry_run());
        assert!(request.overwrite());
    }

    #[test]
    fn test_request_defaults() {
        let request = ProcessingRequest::new("", 1);
        assert!(!request.dry_run());
        assert!(!request.overwrite());
        assert_eq!(request.pattern(), &FilenamePattern::default());
    }
}
