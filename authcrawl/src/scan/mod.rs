//! Policy-driven document scanners.
//!
//! Each scanner consumes router callbacks (or fetch-layer notifications)
//! and reduces one document to a single decision: the winning link, the
//! captured login form, or the presence of expected content.

mod content;
mod form;
mod link;
mod redirect;

pub use content::ContentRegionMatcher;
pub use form::{ElementCategory, FormActionCapture, FormData, FormElement, SubmitMethod};
pub use link::LinkCandidateSelector;
pub use redirect::RedirectCandidateSelector;

use tracing::debug;
use url::Url;

/// Tri-state outcome of a document scan.
///
/// Once a non-[`Unset`] value is assigned it is immutable for the
/// remainder of the scan: the first match wins.
///
/// [`Unset`]: TargetResult::Unset
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TargetResult {
    /// No match found yet, or the scan is incomplete.
    #[default]
    Unset,
    /// A qualifying condition matched but no explicit target URL was
    /// supplied.
    FoundUnspecified,
    /// An explicit target URL is known.
    Found(String),
}

impl TargetResult {
    /// Returns true once a non-`Unset` value has been assigned.
    #[must_use]
    pub fn is_set(&self) -> bool {
        !matches!(self, Self::Unset)
    }

    /// The explicit target URL, if one is known.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Found(url) => Some(url),
            _ => None,
        }
    }

    /// Assigns a value unless one is already set (first match wins).
    pub(crate) fn set_once(&mut self, value: TargetResult) {
        if !self.is_set() {
            *self = value;
        }
    }

    /// Replaces any already-found result with the explicit override URL.
    ///
    /// An unset result stays unset: the override redirects a detection, it
    /// does not fabricate one.
    pub(crate) fn apply_override(&mut self, override_url: Option<&str>) {
        if self.is_set() {
            if let Some(url) = override_url {
                *self = Self::Found(url.to_string());
            }
        }
    }
}

/// Resolves a raw discovered URL against a document base.
///
/// Returns `None` for anything that cannot serve as a navigation target:
/// unparseable URLs, schemes other than http/https, missing hosts, or
/// serialized forms containing non-printable or non-ASCII characters.
/// Failures are silently skipped by callers; they are never fatal.
pub(crate) fn resolve_candidate(base: Option<&Url>, raw_url: &str) -> Option<String> {
    let resolved = match base {
        Some(base) => base.join(raw_url),
        None => Url::parse(raw_url),
    };
    let resolved = match resolved {
        Ok(url) => url,
        Err(err) => {
            debug!(raw_url, %err, "skipping unresolvable link candidate");
            return None;
        }
    };
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.host_str()?;
    let serialized = resolved.to_string();
    if !serialized.chars().all(|c| c >= ' ' && c <= '\u{7f}') {
        return None;
    }
    Some(serialized)
}

/// Parses a base URI, tolerating malformed input.
///
/// A malformed base does not abort the scan; candidates are then resolved
/// as absolute URLs only.
pub(crate) fn parse_base(base_uri: &str) -> Option<Url> {
    Url::parse(base_uri).ok()
}
