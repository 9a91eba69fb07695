//! Redirection-target selection.

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::login::LoginParameters;

use super::{parse_base, resolve_candidate, TargetResult};

/// Picks a qualifying HTTP-redirect target as the next hop of a login
/// sequence.
///
/// Unlike the tag-driven selectors this one is fed from the fetch layer:
/// the orchestrator notes the redirect target of a 3xx response. Targets
/// are resolved against the current URI and tested against the optional
/// redirection pattern; the first qualifying target wins.
#[derive(Debug)]
pub struct RedirectCandidateSelector {
    base: Option<Url>,
    pattern: Option<Regex>,
    result: TargetResult,
}

impl RedirectCandidateSelector {
    /// Creates a selector for one fetch.
    #[must_use]
    pub fn new(base_uri: &str, pattern: Option<Regex>) -> Self {
        Self {
            base: parse_base(base_uri),
            pattern,
            result: TargetResult::Unset,
        }
    }

    /// Notes a redirect target reported by the fetch layer.
    pub fn note_redirect(&mut self, raw_target: &str) {
        if self.result.is_set() {
            return;
        }
        let Some(resolved) = resolve_candidate(self.base.as_ref(), raw_target) else {
            return;
        };
        let qualifies = match &self.pattern {
            Some(pattern) => {
                let hit = pattern.is_match(&resolved);
                debug!(url = %resolved, matched = hit, "redirection target lookup");
                hit
            }
            None => true,
        };
        if qualifies {
            self.result = TargetResult::Found(resolved);
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
}
