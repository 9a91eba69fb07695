//! Fans tokenizer events out to capability-specific listeners.

use tracing::debug;

use super::{AttributeSet, DocumentHandler, ScanFlow, TagEvent};

/// Tracks where we are relative to the one form scope the router models.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum FormScope {
    #[default]
    Outside,
    InForm,
    InSelect {
        name: Option<String>,
        multiple: bool,
    },
    InTextarea,
}

/// Routes tag events to an ordered list of [`DocumentHandler`] listeners.
///
/// The router recognizes exactly the tag names `a`, `link`, `img`, `frame`,
/// `meta`, `form`, and the input-field tags inside forms; everything else
/// passes through unnoticed. It holds routing state (form nesting) but no
/// match state — policy lives entirely in the listeners.
///
/// Listeners are invoked in registration order for every event. Any
/// listener returning [`ScanFlow::Stop`] terminates the scan: no further
/// events are dispatched and `finish` is not invoked.
#[derive(Debug, Default)]
pub struct TagEventRouter {
    scope: FormScope,
    stopped: bool,
    finished: bool,
}

impl TagEventRouter {
    /// Creates a router for one document scan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drives a full event stream through the router.
    ///
    /// Returns [`ScanFlow::Stop`] if any listener terminated the scan
    /// early. The finish callback fires exactly once, after the stream is
    /// exhausted or an explicit [`TagEvent::End`] arrives, and never after
    /// an early stop.
    pub fn scan<I>(&mut self, events: I, handlers: &mut [&mut dyn DocumentHandler]) -> ScanFlow
    where
        I: IntoIterator<Item = TagEvent>,
    {
        for event in events {
            if self.route(&event, handlers).is_stop() {
                return ScanFlow::Stop;
            }
        }
        self.end_of_document(handlers);
        ScanFlow::Continue
    }

    /// Drives a full event stream to a single listener.
    pub fn scan_one<I>(&mut self, events: I, handler: &mut dyn DocumentHandler) -> ScanFlow
    where
        I: IntoIterator<Item = TagEvent>,
    {
        self.scan(events, &mut [handler])
    }

    /// Routes a single event.
    pub fn route(
        &mut self,
        event: &TagEvent,
        handlers: &mut [&mut dyn DocumentHandler],
    ) -> ScanFlow {
        if self.stopped {
            return ScanFlow::Stop;
        }
        let flow = match event {
            TagEvent::Open { name, attributes } => self.route_open(name, attributes, handlers),
            TagEvent::Close { name } => self.route_close(name, handlers),
            TagEvent::Text(c) => dispatch(handlers, |h| h.text_char(*c)),
            TagEvent::End => {
                self.end_of_document(handlers);
                ScanFlow::Continue
            }
        };
        if flow.is_stop() {
            debug!("document scan stopped early");
            self.stopped = true;
        }
        flow
    }

    /// Invokes finish on every listener, once, unless the scan stopped.
    fn end_of_document(&mut self, handlers: &mut [&mut dyn DocumentHandler]) {
        if self.stopped || self.finished {
            return;
        }
        self.finished = true;
        for handler in handlers.iter_mut() {
            handler.finish();
        }
    }

    fn route_open(
        &mut self,
        name: &str,
        attributes: &AttributeSet,
        handlers: &mut [&mut dyn DocumentHandler],
    ) -> ScanFlow {
        // Link-bearing tags are recognized regardless of form scope.
        if name.eq_ignore_ascii_case("a") {
            if let Some(href) = nonempty(attributes.get("href")) {
                let flow = dispatch(handlers, |h| h.anchor_href(href));
                if flow.is_stop() {
                    return flow;
                }
            }
        } else if name.eq_ignore_ascii_case("link") {
            if let Some(href) = nonempty(attributes.get("href")) {
                let flow = dispatch(handlers, |h| h.stylesheet_href(href));
                if flow.is_stop() {
                    return flow;
                }
            }
        } else if name.eq_ignore_ascii_case("img") {
            if let Some(src) = nonempty(attributes.get("src")) {
                let flow = dispatch(handlers, |h| h.image_src(src));
                if flow.is_stop() {
                    return flow;
                }
            }
        } else if name.eq_ignore_ascii_case("frame") {
            if let Some(src) = nonempty(attributes.get("src")) {
                let flow = dispatch(handlers, |h| h.frame_src(src));
                if flow.is_stop() {
                    return flow;
                }
            }
        } else if name.eq_ignore_ascii_case("meta") {
            let flow = dispatch(handlers, |h| h.meta_tag(attributes));
            if flow.is_stop() {
                return flow;
            }
        }

        self.route_form_open(name, attributes, handlers)
    }

    fn route_form_open(
        &mut self,
        name: &str,
        attributes: &AttributeSet,
        handlers: &mut [&mut dyn DocumentHandler],
    ) -> ScanFlow {
        match &self.scope {
            FormScope::Outside => {
                if name.eq_ignore_ascii_case("form") {
                    self.scope = FormScope::InForm;
                    return dispatch(handlers, |h| h.form_start(attributes));
                }
            }
            FormScope::InForm => {
                if name.eq_ignore_ascii_case("input") {
                    // Only fields that can transmit data are interesting.
                    if let Some(ty) = attributes.get("type") {
                        if !ty.eq_ignore_ascii_case("button")
                            && !ty.eq_ignore_ascii_case("reset")
                            && !ty.eq_ignore_ascii_case("image")
                        {
                            return dispatch(handlers, |h| h.form_input(attributes));
                        }
                    }
                } else if name.eq_ignore_ascii_case("select") {
                    self.scope = FormScope::InSelect {
                        name: attributes.get("name").map(str::to_string),
                        multiple: attributes.contains("multiple"),
                    };
                } else if name.eq_ignore_ascii_case("textarea") {
                    self.scope = FormScope::InTextarea;
                    let mut pairs: Vec<(String, String)> = vec![
                        ("type".to_string(), "textarea".to_string()),
                        // The real default value would require tracking the
                        // element body; known limitation.
                        ("value".to_string(), String::new()),
                    ];
                    if let Some(n) = attributes.get("name") {
                        pairs.push(("name".to_string(), n.to_string()));
                    }
                    let synthesized = AttributeSet::from_pairs(pairs);
                    return dispatch(handlers, |h| h.form_input(&synthesized));
                } else if name.eq_ignore_ascii_case("button") {
                    let ty = attributes.get("type");
                    if ty.is_none() || ty.is_some_and(|t| t.eq_ignore_ascii_case("submit")) {
                        return dispatch(handlers, |h| h.form_input(attributes));
                    }
                }
            }
            FormScope::InSelect { name: select_name, multiple } => {
                if name.eq_ignore_ascii_case("option") {
                    let mut pairs: Vec<(String, String)> =
                        vec![("type".to_string(), "select".to_string())];
                    if let Some(n) = select_name {
                        pairs.push(("name".to_string(), n.clone()));
                    }
                    if *multiple {
                        pairs.push(("multiple".to_string(), "multiple".to_string()));
                    }
                    if let Some(v) = attributes.get("value") {
                        pairs.push(("value".to_string(), v.to_string()));
                    }
                    if attributes.contains("selected") {
                        pairs.push(("selected".to_string(), "selected".to_string()));
                    }
                    let synthesized = AttributeSet::from_pairs(pairs);
                    return dispatch(handlers, |h| h.form_input(&synthesized));
                }
            }
            FormScope::InTextarea => {}
        }
        ScanFlow::Continue
    }

    fn route_close(
        &mut self,
        name: &str,
        handlers: &mut [&mut dyn DocumentHandler],
    ) -> ScanFlow {
        match &self.scope {
            FormScope::Outside => {}
            FormScope::InForm => {
                if name.eq_ignore_ascii_case("form") {
                    self.scope = FormScope::Outside;
                    return dispatch(handlers, |h| h.form_end());
                }
            }
            FormScope::InSelect { .. } => {
                if name.eq_ignore_ascii_case("select") {
                    self.scope = FormScope::InForm;
                } else if name.eq_ignore_ascii_case("form") {
                    self.scope = FormScope::Outside;
                    return dispatch(handlers, |h| h.form_end());
                }
            }
            FormScope::InTextarea => {
                if name.eq_ignore_ascii_case("textarea") {
                    self.scope = FormScope::InForm;
                } else if name.eq_ignore_ascii_case("form") {
                    self.scope = FormScope::Outside;
                    return dispatch(handlers, |h| h.form_end());
                }
            }
        }
        ScanFlow::Continue
    }
}

/// Dispatches one callback to every listener in order, stopping on the
/// first that asks to stop.
fn dispatch<F>(handlers: &mut [&mut dyn DocumentHandler], mut call: F) -> ScanFlow
where
    F: FnMut(&mut dyn DocumentHandler) -> ScanFlow,
{
    for handler in handlers.iter_mut() {
        if call(&mut **handler).is_stop() {
            return ScanFlow::Stop;
        }
    }
    ScanFlow::Continue
}

fn nonempty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
