//! Milestone catalogue for the HyperExecute CLI log.
//!
//! Every observable event is inferred from a known substring appearing in
//! the log. The substrings here track CLI wording; matching is
//! case-insensitive, so casing differences between CLI releases don't
//! matter. If the CLI rewords a line, this is the only file to touch.

/// The CLI accepted the trigger and started processing the request.
pub const TRIGGERED: &str = "Generating TraceID for tracking request";

/// The test archive is being created for upload.
pub const UPLOAD_STARTED: &str = "Creating archive";

/// The archive finished uploading (the CLI reports its remote location).
pub const UPLOAD_DONE: &str = "Archive location";

/// The CLI connected to the HyperExecute server.
pub const SERVER_CONNECTED: &str = "Connection established";

/// Label preceding the job URL. The extractor owns the full pattern.
pub const JOB_LINK_LABEL: &str = "Job Link:";

/// The CLI's tracking workers shut down — the run is over, with or without
/// a job link having been printed.
pub const TRACKING_FINISHED: &str = "goroutines have finished";

/// Configuration errors the CLI can report instead of starting the job.
///
/// Declaration order is priority order: when several substrings are present
/// in the same log, the first-declared kind wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidCredentials,
    ProjectNotFound,
    YamlParseError,
    YamlConfigError,
    YamlNotFound,
    None,
}

impl ErrorKind {
    /// The log substring that identifies this error.
    pub fn term(self) -> &'static str {
        match self {
            ErrorKind::InvalidCredentials => "Invalid user/key credentials",
            ErrorKind::ProjectNotFound => "Project not found",
            ErrorKind::YamlParseError => "failed to parse yaml",
            ErrorKind::YamlConfigError => "invalid value in yaml",
            ErrorKind::YamlNotFound => "yaml file not found",
            ErrorKind::None => "",
        }
    }

    /// Remediation message shown to the user when this error is detected.
    pub fn remediation(self) -> &'static str {
        match self {
            ErrorKind::InvalidCredentials => {
                "Invalid LambdaTest credentials. Check the configured username and access key, then trigger the job again."
            }
            ErrorKind::ProjectNotFound => {
                "Project not found on LambdaTest. Verify the project name in the HyperExecute YAML, then trigger the job again."
            }
            ErrorKind::YamlParseError => {
                "The HyperExecute YAML could not be parsed. Fix the YAML syntax, then trigger the job again."
            }
            ErrorKind::YamlConfigError => {
                "The HyperExecute YAML contains an invalid value. Fix the reported field, then trigger the job again."
            }
            ErrorKind::YamlNotFound => {
                "No HyperExecute YAML was found. Generate the config file before triggering the job."
            }
            ErrorKind::None => "No configuration errors detected.",
        }
    }
}

/// The prioritized error candidates raced by the detector, highest first.
pub const ERROR_CANDIDATES: [ErrorKind; 5] = [
    ErrorKind::InvalidCredentials,
    ErrorKind::ProjectNotFound,
    ErrorKind::YamlParseError,
    ErrorKind::YamlConfigError,
    ErrorKind::YamlNotFound,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_candidate_has_a_term_and_remediation() {
        for kind in ERROR_CANDIDATES {
            assert!(!kind.term().is_empty(), "{kind:?} has no term");
            assert!(
                kind.remediation().contains("again") || kind.remediation().contains("before"),
                "{kind:?} remediation should tell the user what to do next"
            );
        }
    }

    #[test]
    fn candidate_order_is_priority_order() {
        assert_eq!(ERROR_CANDIDATES[0], ErrorKind::InvalidCredentials);
        assert_eq!(ERROR_CANDIDATES[1], ErrorKind::ProjectNotFound);
    }

    #[test]
    fn none_is_not_a_candidate() {
        assert!(!ERROR_CANDIDATES.contains(&ErrorKind::None));
    }
}
