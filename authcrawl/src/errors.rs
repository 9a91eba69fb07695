//! Error types for the authcrawl engine.
//!
//! The taxonomy separates construction-time configuration errors (never
//! retried) from transient service interruptions (retryable) and fatal
//! processing errors (not retryable). Thread-level cancellation is its own
//! variant and bypasses the interruption latch entirely.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// The main error type for authcrawl operations.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// A configuration error occurred. Fatal; never retried.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A transient service interruption. The document should be
    /// rescheduled, not failed.
    #[error("{0}")]
    Interrupted(#[from] ServiceInterruption),

    /// A fetch-layer failure that is not worth retrying.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// The controlling thread asked this work to stop immediately.
    #[error("crawl cancelled")]
    Cancelled,

    /// A generic internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrawlError {
    /// Returns true if the error represents a transient condition that
    /// should lead to the document being rescheduled.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }
}

/// Error raised when configuration cannot be turned into a working engine.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A regular expression in a trust or login rule failed to compile.
    #[error("invalid regular expression '{pattern}' in {context}: {source}")]
    InvalidPattern {
        /// The offending pattern text.
        pattern: String,
        /// Where the pattern came from (e.g. "trust rule 3").
        context: String,
        /// The underlying compile error.
        #[source]
        source: regex::Error,
    },

    /// The content matcher's overlap must be strictly smaller than its
    /// capacity; anything else leaves the retained-suffix step undefined.
    #[error("content window overlap {overlap} must be smaller than capacity {capacity}")]
    OverlapNotBelowCapacity {
        /// Configured overlap, in characters.
        overlap: usize,
        /// Configured capacity, in characters.
        capacity: usize,
    },

    /// A configured certificate could not be decoded.
    #[error("invalid certificate '{subject}': {detail}")]
    InvalidCertificate {
        /// Subject of the certificate node that failed to decode.
        subject: String,
        /// What went wrong.
        detail: String,
    },
}

impl ConfigError {
    /// Builds an [`ConfigError::InvalidPattern`] from a failed compile.
    pub(crate) fn bad_pattern(
        pattern: &str,
        context: impl Into<String>,
        source: regex::Error,
    ) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            context: context.into(),
            source,
        }
    }
}

/// A transient interruption reported by an external service.
///
/// Carries enough detail for the job layer to reschedule the in-progress
/// document: the original message, the time before which a retry is
/// pointless, and an optional cap on retry attempts.
#[derive(Debug, Clone, Error)]
#[error("service interruption: {message} (retry at {retry_at})")]
pub struct ServiceInterruption {
    /// Human-readable description of the original failure.
    pub message: String,
    /// Earliest time a retry makes sense.
    pub retry_at: DateTime<Utc>,
    /// Maximum number of retries before the document is failed, if bounded.
    pub max_retries: Option<u32>,
}

impl ServiceInterruption {
    /// Creates an interruption that is retryable after the given delay.
    #[must_use]
    pub fn retry_after(message: impl Into<String>, delay: Duration) -> Self {
        Self {
            message: message.into(),
            retry_at: Utc::now() + delay,
            max_retries: None,
        }
    }

    /// Caps the number of retries.
    #[must_use]
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = Some(max);
        self
    }
}
