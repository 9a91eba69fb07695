//! The capability interface exposed to the tag-event layer.

use super::AttributeSet;

/// Whether a scan should keep going after a callback.
///
/// A handler that has everything it needs (for example, a first-match-wins
/// selector whose result is set) may return [`ScanFlow::Stop`] to terminate
/// the scan early; the router then stops dispatching and the finish
/// callback is never invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanFlow {
    /// Keep scanning.
    #[default]
    Continue,
    /// Terminate the scan; no further events will be dispatched.
    Stop,
}

impl ScanFlow {
    /// Returns true for [`ScanFlow::Stop`].
    #[must_use]
    pub fn is_stop(self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// Callbacks a document scan can receive from the [`super::TagEventRouter`].
///
/// Every method has a default no-op implementation so listeners implement
/// only the capabilities they need. All callbacks except [`finish`] return
/// a [`ScanFlow`]; the default is to continue.
///
/// [`finish`]: DocumentHandler::finish
pub trait DocumentHandler {
    /// A `form` tag opened.
    fn form_start(&mut self, attributes: &AttributeSet) -> ScanFlow {
        let _ = attributes;
        ScanFlow::Continue
    }

    /// An input-like field inside the current form. For `select` options
    /// and `textarea` bodies the router synthesizes the attribute set.
    fn form_input(&mut self, attributes: &AttributeSet) -> ScanFlow {
        let _ = attributes;
        ScanFlow::Continue
    }

    /// The current form closed.
    fn form_end(&mut self) -> ScanFlow {
        ScanFlow::Continue
    }

    /// An `a` tag with a non-empty `href`.
    fn anchor_href(&mut self, raw_url: &str) -> ScanFlow {
        let _ = raw_url;
        ScanFlow::Continue
    }

    /// A `link` tag with a non-empty `href`.
    fn stylesheet_href(&mut self, raw_url: &str) -> ScanFlow {
        let _ = raw_url;
        ScanFlow::Continue
    }

    /// An `img` tag with a non-empty `src`.
    fn image_src(&mut self, raw_url: &str) -> ScanFlow {
        let _ = raw_url;
        ScanFlow::Continue
    }

    /// A `frame` tag with a non-empty `src`.
    fn frame_src(&mut self, raw_url: &str) -> ScanFlow {
        let _ = raw_url;
        ScanFlow::Continue
    }

    /// A `meta` tag with its full attribute set.
    fn meta_tag(&mut self, attributes: &AttributeSet) -> ScanFlow {
        let _ = attributes;
        ScanFlow::Continue
    }

    /// One character of document text.
    fn text_char(&mut self, c: char) -> ScanFlow {
        let _ = c;
        ScanFlow::Continue
    }

    /// End of document. Called exactly once, and only if the scan was not
    /// terminated early.
    fn finish(&mut self) {}
}
