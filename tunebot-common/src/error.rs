// ================================================================
// File: tunebot-common/src/error.rs
// ================================================================

use std::time::Duration;
use thiserror::Error;

/// Coarse classification used by the orchestrator to decide how loudly
/// a failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input or an expected outcome (timeout, nothing found). Reply and move on.
    UserRecoverable,
    /// Search, media or voice backend failed. Logged, generic reply, no retry.
    CollaboratorFailure,
    /// Programming fault. Aborts the current command only.
    InvariantViolation,
}

#[derive(Debug, Error)]
pub enum Error {
    // User-recoverable outcomes:
    #[error("Empty search query")]
    EmptyQuery,

    #[error("Requester is not in a voice channel")]
    NoVoiceChannel,

    #[error("Search returned no results")]
    EmptyResult,

    #[error("No selection within {0:?}")]
    SelectionTimeout(Duration),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("A selection is already pending for message {0}")]
    DuplicateSelectionInProgress(String),

    // Collaborator failures:
    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),

    #[error("Media unavailable: {0}")]
    MediaUnavailable(String),

    #[error("Voice connect error: {0}")]
    VoiceConnect(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    // Invariant violations:
    #[error("Index out of range: {0}")]
    IndexOutOfRange(String),

    #[error("Voice session not connected: {0}")]
    NotConnected(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EmptyQuery
            | Error::NoVoiceChannel
            | Error::EmptyResult
            | Error::SelectionTimeout(_)
            | Error::InvalidSelection(_)
            | Error::DuplicateSelectionInProgress(_) => ErrorKind::UserRecoverable,

            Error::SearchUnavailable(_)
            | Error::MediaUnavailable(_)
            | Error::VoiceConnect(_)
            | Error::Platform(_)
            | Error::Http(_)
            | Error::Json(_)
            | Error::Config(_)
            | Error::Parse(_) => ErrorKind::CollaboratorFailure,

            Error::IndexOutOfRange(_) | Error::NotConnected(_) => ErrorKind::InvariantViolation,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::UserRecoverable
    }

    /// Reply text shown to the user who issued the command.
    pub fn user_message(&self) -> String {
        match self {
            Error::EmptyQuery => "Please enter a search query!".to_string(),
            Error::NoVoiceChannel => "Join a voice channel first!".to_string(),
            Error::EmptyResult => "No search results.".to_string(),
            Error::SelectionTimeout(window) => {
                format!("Please pick a video within {} seconds!", window.as_secs())
            }
            Error::InvalidSelection(_) => "The selected video has no playable info.".to_string(),
            Error::DuplicateSelectionInProgress(_) => {
                "A selection is already in progress for this message.".to_string()
            }
            _ => "An error occurred.".to_string(),
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Parse(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Parse(s.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Platform(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_outcomes_are_classified() {
        assert!(Error::EmptyQuery.is_recoverable());
        assert!(Error::SelectionTimeout(Duration::from_secs(30)).is_recoverable());
        assert!(Error::DuplicateSelectionInProgress("1".into()).is_recoverable());
        assert_eq!(Error::SearchUnavailable("down".into()).kind(), ErrorKind::CollaboratorFailure);
        assert_eq!(Error::VoiceConnect("rejected".into()).kind(), ErrorKind::CollaboratorFailure);
        assert_eq!(Error::NotConnected("1".into()).kind(), ErrorKind::InvariantViolation);
        assert_eq!(Error::IndexOutOfRange("7".into()).kind(), ErrorKind::InvariantViolation);
    }

    #[test]
    fn backend_and_setup_failures_are_collaborator_failures() {
        let json = serde_json::from_str::<u32>("nope").unwrap_err();
        for err in [
            Error::Platform("shard closed".into()),
            Error::Config("missing token".into()),
            Error::Parse("bad id".into()),
            Error::from("bad id"),
            Error::Json(json),
        ] {
            assert_eq!(err.kind(), ErrorKind::CollaboratorFailure, "{err}");
        }
    }

    #[test]
    fn collaborator_failures_get_a_generic_reply() {
        assert_eq!(Error::MediaUnavailable("gone".into()).user_message(), "An error occurred.");
        assert_eq!(
            Error::SelectionTimeout(Duration::from_secs(30)).user_message(),
            "Please pick a video within 30 seconds!"
        );
    }
}
