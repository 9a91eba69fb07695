//! First-match-wins link selection.

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::html::{DocumentHandler, ScanFlow};
use crate::login::LoginParameters;

use super::{parse_base, resolve_candidate, TargetResult};

/// Picks the single best-matching link in a document to use as the next
/// hop of a login sequence.
///
/// Candidates arrive in document order from anchor, stylesheet-link, and
/// frame tags; image sources are never navigation targets. Each candidate
/// is resolved against the document base (failures silently skipped) and
/// tested against the optional preferred-link pattern; without a pattern,
/// any resolvable URL qualifies. The first qualifying URL wins and the
/// scan stops.
#[derive(Debug)]
pub struct LinkCandidateSelector {
    base: Option<Url>,
    preferred: Option<Regex>,
    result: TargetResult,
}

impl LinkCandidateSelector {
    /// Creates a selector for one document.
    ///
    /// `base_uri` is the fetched page's URL; `preferred` is the optional
    /// preferred-link pattern.
    #[must_use]
    pub fn new(base_uri: &str, preferred: Option<Regex>) -> Self {
        Self {
            base: parse_base(base_uri),
            preferred,
            result: TargetResult::Unset,
        }
    }

    /// The scan result so far.
    #[must_use]
    pub fn result(&self) -> &TargetResult {
        &self.result
    }

    /// Applies the login rule's explicit override URL and returns the
    /// final result.
    #[must_use]
    pub fn into_result(mut self, params: Option<&LoginParameters>) -> TargetResult {
        self.result
            .apply_override(params.and_then(LoginParameters::override_target_url));
        self.result
    }

    fn note_candidate(&mut self, raw_url: &str) -> ScanFlow {
        if self.result.is_set() {
            return ScanFlow::Stop;
        }
        debug!(raw_url, "testing link candidate");
        let Some(resolved) = resolve_candidate(self.base.as_ref(), raw_url) else {
            return ScanFlow::Continue;
        };
        let qualifies = match &self.preferred {
            Some(pattern) => {
                let hit = pattern.is_match(&resolved);
                debug!(
                    url = %resolved,
                    matched = hit,
                    "preferred link lookup"
                );
                hit
            }
            None => true,
        };
        if qualifies {
            self.result = TargetResult::Found(resolved);
            return ScanFlow::Stop;
        }
        ScanFlow::Continue
    }
}

impl DocumentHandler for LinkCandidateSelector {
    fn anchor_href(&mut self, raw_url: &str) -> ScanFlow {
        self.note_candidate(raw_url)
    }

    fn stylesheet_href(&mut self, raw_url: &str) -> ScanFlow {
        self.note_candidate(raw_url)
    }

    fn frame_src(&mut self, raw_url: &str) -> ScanFlow {
        self.note_candidate(raw_url)
    }

    // Images are deliberately not navigation candidates.
}
