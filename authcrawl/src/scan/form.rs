//! Login-form recognition and field accumulation.

use regex::Regex;
use std::collections::HashSet;
use tracing::debug;
use url::Url;

use crate::html::{AttributeSet, DocumentHandler, ScanFlow};
use crate::login::LoginParameters;

use super::{parse_base, resolve_candidate};

/// How a captured form should be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitMethod {
    /// Parameters go in the query string.
    #[default]
    Get,
    /// Parameters go in the request body.
    Post,
}

/// How a form element's value may be overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementCategory {
    /// Free-form value (text, hidden, password, submit, textarea): an
    /// override simply replaces the value.
    FreeForm,
    /// One-of-many (radio, single select): an override enables exactly the
    /// matching value and disables the rest.
    FixedExclusive,
    /// Any-of-many (checkbox, multiple select): an override clears the
    /// family once, then enables matching values.
    FixedInclusive,
}

/// One submittable form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormElement {
    /// Field name.
    pub name: String,
    /// Field value.
    pub value: String,
    /// Override category.
    pub category: ElementCategory,
    /// Disabled elements are skipped on submission.
    pub enabled: bool,
}

/// The accumulated, submittable state of one captured form.
///
/// Multipart posts are not handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormData {
    action: String,
    method: SubmitMethod,
    elements: Vec<FormElement>,
}

impl FormData {
    fn new(action: String, method: SubmitMethod) -> Self {
        Self {
            action,
            method,
            elements: Vec::new(),
        }
    }

    /// The resolved URL the form submits to.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// The submit method.
    #[must_use]
    pub fn method(&self) -> SubmitMethod {
        self.method
    }

    /// Iterates the enabled elements, in document order.
    pub fn active_elements(&self) -> impl Iterator<Item = &FormElement> {
        self.elements.iter().filter(|e| e.enabled)
    }

    /// All elements, enabled or not.
    #[must_use]
    pub fn elements(&self) -> &[FormElement] {
        &self.elements
    }

    /// Interprets one routed input event and appends the resulting
    /// element, if it carries a usable name and type.
    fn add_element(&mut self, attributes: &AttributeSet) {
        let Some(ty) = attributes.get("type") else {
            return;
        };
        let Some(name) = attributes.get("name") else {
            return;
        };
        let name = name.to_string();
        let value = attributes.get_or_empty("value").to_string();
        let ty = ty.to_ascii_lowercase();
        let element = match ty.as_str() {
            "submit" => FormElement {
                name,
                value: if value.is_empty() {
                    "Submit Form".to_string()
                } else {
                    value
                },
                category: ElementCategory::FreeForm,
                enabled: true,
            },
            "hidden" | "text" | "password" | "textarea" => FormElement {
                name,
                value,
                category: ElementCategory::FreeForm,
                enabled: true,
            },
            "select" => FormElement {
                name,
                value,
                category: if attributes.contains("multiple") {
                    ElementCategory::FixedInclusive
                } else {
                    ElementCategory::FixedExclusive
                },
                enabled: attributes.contains("selected"),
            },
            "radio" => FormElement {
                name,
                value,
                category: ElementCategory::FixedExclusive,
                enabled: attributes.contains("checked"),
            },
            "checkbox" => FormElement {
                name,
                value,
                category: ElementCategory::FixedInclusive,
                enabled: attributes.contains("checked"),
            },
            _ => return,
        };
        self.elements.push(element);
    }

    /// Applies a login rule's ordered parameter overrides.
    ///
    /// Each (name pattern, value) pair applies to every element whose name
    /// the pattern matches. Free-form values are replaced outright;
    /// fixed-exclusive elements stay enabled only when their value equals
    /// the override; fixed-inclusive families are cleared once per apply
    /// call, then matching values re-enabled.
    pub fn apply_overrides(&mut self, params: &LoginParameters) {
        let mut cleared: HashSet<String> = HashSet::new();
        for rule in params.parameters() {
            for index in 0..self.elements.len() {
                if !rule.name_pattern().is_match(&self.elements[index].name) {
                    continue;
                }
                match self.elements[index].category {
                    ElementCategory::FreeForm => {
                        self.elements[index].value = rule.value().to_string();
                    }
                    ElementCategory::FixedExclusive => {
                        let keep = self.elements[index].value == rule.value();
                        self.elements[index].enabled = keep;
                    }
                    ElementCategory::FixedInclusive => {
                        let family = self.elements[index].name.clone();
                        if !cleared.contains(&family) {
                            for other in &mut self.elements {
                                if other.name == family {
                                    other.enabled = false;
                                }
                            }
                            cleared.insert(family);
                        }
                        if self.elements[index].value == rule.value() {
                            self.elements[index].enabled = true;
                        }
                    }
                }
            }
        }
    }
}

/// Recognizes the login form matching a form-name pattern and accumulates
/// its submittable fields.
///
/// Without a pattern any form qualifies. A missing `action` attribute
/// means "submit to the current page"; the action is resolved like any
/// other link candidate, and a form whose action cannot be resolved is
/// ignored. Each completed matching form replaces any earlier capture.
#[derive(Debug)]
pub struct FormActionCapture {
    parent_uri: String,
    base: Option<Url>,
    name_pattern: Option<Regex>,
    current: Option<FormData>,
    captured: Option<FormData>,
}

impl FormActionCapture {
    /// Creates a capture for one document.
    #[must_use]
    pub fn new(base_uri: &str, name_pattern: Option<Regex>) -> Self {
        Self {
            parent_uri: base_uri.to_string(),
            base: parse_base(base_uri),
            name_pattern,
            current: None,
            captured: None,
        }
    }

    /// Consumes the capture, applying parameter overrides from the login
    /// rule to the captured form, if any.
    #[must_use]
    pub fn into_form_data(self, params: Option<&LoginParameters>) -> Option<FormData> {
        let mut form = self.captured?;
        if let Some(params) = params {
            form.apply_overrides(params);
        }
        Some(form)
    }
}

impl DocumentHandler for FormActionCapture {
    fn form_start(&mut self, attributes: &AttributeSet) -> ScanFlow {
        let form_name = attributes.get_or_empty("name");
        debug!(form_name, "saw form");
        let usable = match &self.name_pattern {
            Some(pattern) => pattern.is_match(form_name),
            None => true,
        };
        if !usable {
            return ScanFlow::Continue;
        }
        let action_raw = attributes.get("action").unwrap_or(&self.parent_uri);
        let Some(action) = resolve_candidate(self.base.as_ref(), action_raw) else {
            return ScanFlow::Continue;
        };
        let method = match attributes.get("method") {
            Some(m) if m.eq_ignore_ascii_case("post") => SubmitMethod::Post,
            _ => SubmitMethod::Get,
        };
        self.current = Some(FormData::new(action, method));
        ScanFlow::Continue
    }

    fn form_input(&mut self, attributes: &AttributeSet) -> ScanFlow {
        if let Some(form) = &mut self.current {
            debug!(
                field_type = attributes.get_or_empty("type"),
                field_name = attributes.get_or_empty("name"),
                "saw form element"
            );
            form.add_element(attributes);
        }
        ScanFlow::Continue
    }

    fn form_end(&mut self) -> ScanFlow {
        if let Some(form) = self.current.take() {
            self.captured = Some(form);
        }
        ScanFlow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::{TagEvent, TagEventRouter};
    use crate::login::LoginParameters;

    const BASE: &str = "https://site.example/login";

    fn capture(events: Vec<TagEvent>, pattern: Option<&str>) -> FormActionCapture {
        let mut cap = FormActionCapture::new(BASE, pattern.map(|p| Regex::new(p).unwrap()));
        let mut router = TagEventRouter::new();
        router.scan_one(events, &mut cap);
        cap
    }

    fn login_form_events() -> Vec<TagEvent> {
        vec![
            TagEvent::open(
                "form",
                vec![("name", "signin"), ("action", "/do-login"), ("method", "POST")],
            ),
            TagEvent::open("input", vec![("type", "text"), ("name", "user"), ("value", "")]),
            TagEvent::open(
                "input",
                vec![("type", "password"), ("name", "pass"), ("value", "")],
            ),
            TagEvent::open(
                "input",
                vec![("type", "hidden"), ("name", "csrf"), ("value", "tok123")],
            ),
            TagEvent::open("input", vec![("type", "submit"), ("name", "go")]),
            TagEvent::close("form"),
            TagEvent::End,
        ]
    }

    #[test]
    fn test_captures_matching_form() {
        let cap = capture(login_form_events(), Some("^signin$"));
        let form = cap.into_form_data(None).unwrap();
        assert_eq!(form.action(), "https://site.example/do-login");
        assert_eq!(form.method(), SubmitMethod::Post);
        let names: Vec<&str> = form.active_elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["user", "pass", "csrf", "go"]);
    }

    #[test]
    fn test_name_pattern_gates_capture() {
        let cap = capture(login_form_events(), Some("^search$"));
        assert!(cap.into_form_data(None).is_none());
    }

    #[test]
    fn test_actionless_form_submits_to_current_page() {
        let events = vec![
            TagEvent::open("form", vec![("name", "signin")]),
            TagEvent::close("form"),
            TagEvent::End,
        ];
        let cap = capture(events, None);
        let form = cap.into_form_data(None).unwrap();
        assert_eq!(form.action(), "https://site.example/login");
        assert_eq!(form.method(), SubmitMethod::Get);
    }

    #[test]
    fn test_unfinished_form_contributes_nothing() {
        let events = vec![
            TagEvent::open("form", vec![("name", "signin"), ("action", "/x")]),
            TagEvent::open("input", vec![("type", "text"), ("name", "user")]),
            TagEvent::End,
        ];
        let cap = capture(events, None);
        assert!(cap.into_form_data(None).is_none());
    }

    #[test]
    fn test_last_completed_form_wins() {
        let events = vec![
            TagEvent::open("form", vec![("name", "signin"), ("action", "/first")]),
            TagEvent::close("form"),
            TagEvent::open("form", vec![("name", "signin"), ("action", "/second")]),
            TagEvent::close("form"),
            TagEvent::End,
        ];
        let cap = capture(events, None);
        let form = cap.into_form_data(None).unwrap();
        assert_eq!(form.action(), "https://site.example/second");
    }

    #[test]
    fn test_submit_value_defaults() {
        let events = vec![
            TagEvent::open("form", vec![("name", "f"), ("action", "/s")]),
            TagEvent::open("input", vec![("type", "submit"), ("name", "go")]),
            TagEvent::close("form"),
            TagEvent::End,
        ];
        let form = capture(events, None).into_form_data(None).unwrap();
        assert_eq!(form.elements()[0].value, "Submit Form");
    }

    #[test]
    fn test_free_form_override() {
        let cap = capture(login_form_events(), None);
        let params = LoginParameters::new()
            .with_parameter("^user$", "alice")
            .with_parameter("^pass$", "s3cret");
        let form = cap.into_form_data(Some(&params)).unwrap();
        let user = form.elements().iter().find(|e| e.name == "user").unwrap();
        let pass = form.elements().iter().find(|e| e.name == "pass").unwrap();
        let csrf = form.elements().iter().find(|e| e.name == "csrf").unwrap();
        assert_eq!(user.value, "alice");
        assert_eq!(pass.value, "s3cret");
        assert_eq!(csrf.value, "tok123");
    }

    #[test]
    fn test_exclusive_override_enables_only_match() {
        let events = vec![
            TagEvent::open("form", vec![("name", "f"), ("action", "/s")]),
            TagEvent::open(
                "input",
                vec![("type", "radio"), ("name", "realm"), ("value", "staff"), ("checked", "")],
            ),
            TagEvent::open(
                "input",
                vec![("type", "radio"), ("name", "realm"), ("value", "admin")],
            ),
            TagEvent::close("form"),
            TagEvent::End,
        ];
        let cap = capture(events, None);
        let params = LoginParameters::new().with_parameter("^realm$", "admin");
        let form = cap.into_form_data(Some(&params)).unwrap();
        let values: Vec<&str> = form.active_elements().map(|e| e.value.as_str()).collect();
        assert_eq!(values, vec!["admin"]);
    }

    #[test]
    fn test_inclusive_override_clears_family_once() {
        let events = vec![
            TagEvent::open("form", vec![("name", "f"), ("action", "/s")]),
            TagEvent::open(
                "input",
                vec![("type", "checkbox"), ("name", "opts"), ("value", "a"), ("checked", "")],
            ),
            TagEvent::open(
                "input",
                vec![("type", "checkbox"), ("name", "opts"), ("value", "b"), ("checked", "")],
            ),
            TagEvent::open(
                "input",
                vec![("type", "checkbox"), ("name", "opts"), ("value", "c")],
            ),
            TagEvent::close("form"),
            TagEvent::End,
        ];
        let cap = capture(events, None);
        let params = LoginParameters::new().with_parameter("^opts$", "c");
        let form = cap.into_form_data(Some(&params)).unwrap();
        let values: Vec<&str> = form.active_elements().map(|e| e.value.as_str()).collect();
        assert_eq!(values, vec!["c"]);
    }

    #[test]
    fn test_select_options_respect_selection() {
        let events = vec![
            TagEvent::open("form", vec![("name", "f"), ("action", "/s")]),
            TagEvent::open("select", vec![("name", "lang")]),
            TagEvent::open("option", vec![("value", "en"), ("selected", "")]),
            TagEvent::open("option", vec![("value", "fr")]),
            TagEvent::close("select"),
            TagEvent::close("form"),
            TagEvent::End,
        ];
        let form = capture(events, None).into_form_data(None).unwrap();
        let values: Vec<&str> = form.active_elements().map(|e| e.value.as_str()).collect();
        assert_eq!(values, vec!["en"]);
        assert_eq!(form.elements().len(), 2);
        assert_eq!(
            form.elements()[0].category,
            ElementCategory::FixedExclusive
        );
    }
}
