//! User-facing error reporting for the completion pipeline.
//!
//! Nothing in the pipeline is allowed to propagate an unhandled failure up
//! to the editor host; every boundary is a catch point. This crate holds
//! the error shape those boundaries report: a short title, a message, and
//! optional recovery suggestions, categorized by where in the pipeline the
//! failure belongs.

use anyhow::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline error categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorKind {
    /// Settings file missing, corrupt, or incomplete.
    Configuration,
    /// Transport/auth/rate-limit failure at a provider boundary.
    Provider,
    /// Unreadable directory or file during context building.
    Context,
    /// Provider returned non-JSON or malformed JSON.
    Parse,
    /// Missing operation prerequisite (no editor, no diagnostic, no code).
    Precondition,
    /// Anything that escaped classification.
    Unknown,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "Configuration",
            ErrorKind::Provider => "Provider",
            ErrorKind::Context => "Context",
            ErrorKind::Parse => "Parse",
            ErrorKind::Precondition => "Precondition",
            ErrorKind::Unknown => "Error",
        }
    }
}

/// An error formatted for the user, with recovery suggestions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserError {
    pub title: String,
    pub message: String,
    pub suggestions: Vec<String>,
    pub kind: ErrorKind,
}

impl UserError {
    pub fn new(title: impl Into<String>, message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            suggestions: Vec::new(),
            kind,
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new("Nothing to do", message, ErrorKind::Precondition)
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn into_error(self) -> Error {
        Error::new(self)
    }

    pub fn format(&self) -> String {
        let mut out = format!("{}: {}\n  {}\n", self.kind.label(), self.title, self.message);
        if !self.suggestions.is_empty() {
            out.push_str("  Suggestions:\n");
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                out.push_str(&format!("    {}. {}\n", i + 1, suggestion));
            }
        }
        out
    }
}

impl fmt::Display for UserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

impl std::error::Error for UserError {}

/// Classify an arbitrary error into a [`UserError`] based on its message.
/// Best-effort: unrecognized messages land in [`ErrorKind::Unknown`].
pub fn classify(error: &Error) -> UserError {
    if let Some(user) = error.downcast_ref::<UserError>() {
        return user.clone();
    }

    let message = error.to_string();
    let lower = message.to_lowercase();

    if lower.contains("api key") || lower.contains("settings") || lower.contains("config") {
        return UserError::new("Configuration error", &message, ErrorKind::Configuration)
            .with_suggestion("Open the sidebar settings panel and submit an API key and model")
            .with_suggestion("Check .tandem/settings.json in your workspace");
    }
    if lower.contains("timed out")
        || lower.contains("connection")
        || lower.contains("network")
        || lower.contains("rate limit")
        || lower.contains("fetching")
    {
        return UserError::new("Provider error", &message, ErrorKind::Provider)
            .with_suggestion("Check your network connection")
            .with_suggestion("Try again shortly or switch providers");
    }
    if lower.contains("parsing") || lower.contains("json") {
        return UserError::new("Response parse error", &message, ErrorKind::Parse);
    }
    if lower.contains("permission denied") || lower.contains("reading directory") {
        return UserError::new("Context error", &message, ErrorKind::Context);
    }

    UserError::new("Unexpected error", &message, ErrorKind::Unknown)
}
