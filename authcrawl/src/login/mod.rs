//! Login-sequence rules and their orchestration.

mod orchestrator;

#[cfg(test)]
mod integration_tests;

pub use orchestrator::{DocumentOutcome, FetchedDocument, SequentialLoginOrchestrator};

use regex::Regex;

use crate::config::{LoginPageNode, ParameterNode, SequenceNode};
use crate::errors::ConfigError;

/// One (parameter-name pattern, literal value) pair of a login rule.
#[derive(Debug, Clone)]
pub struct ParameterOverride {
    name_pattern: Regex,
    value: String,
}

impl ParameterOverride {
    /// The pattern selecting which form fields this override applies to.
    #[must_use]
    pub fn name_pattern(&self) -> &Regex {
        &self.name_pattern
    }

    /// The value to supply.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// The override bundle associated with one point in a login sequence.
///
/// All patterns are optional; a detector whose pattern is absent does not
/// run for this rule.
#[derive(Debug, Clone, Default)]
pub struct LoginParameters {
    override_target_url: Option<String>,
    redirection_pattern: Option<Regex>,
    link_pattern: Option<Regex>,
    form_name_pattern: Option<Regex>,
    content_pattern: Option<Regex>,
    parameters: Vec<ParameterOverride>,
}

impl LoginParameters {
    /// Creates an empty rule.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles a rule from its configuration node.
    ///
    /// # Errors
    ///
    /// A malformed regular expression anywhere in the node is fatal.
    pub fn from_config(node: &LoginPageNode, context: &str) -> Result<Self, ConfigError> {
        let compile = |pattern: &Option<String>, what: &str| -> Result<Option<Regex>, ConfigError> {
            pattern
                .as_deref()
                .map(|p| {
                    Regex::new(p)
                        .map_err(|err| ConfigError::bad_pattern(p, format!("{context} {what}"), err))
                })
                .transpose()
        };
        let mut parameters = Vec::with_capacity(node.parameters.len());
        for (index, parameter) in node.parameters.iter().enumerate() {
            parameters.push(compile_parameter(parameter, context, index)?);
        }
        Ok(Self {
            override_target_url: node.override_target_url.clone(),
            redirection_pattern: compile(&node.redirection_pattern, "redirection pattern")?,
            link_pattern: compile(&node.link_pattern, "link pattern")?,
            form_name_pattern: compile(&node.form_name_pattern, "form name pattern")?,
            content_pattern: compile(&node.content_pattern, "content pattern")?,
            parameters,
        })
    }

    /// Sets the explicit override target URL.
    #[must_use]
    pub fn with_override_target_url(mut self, url: impl Into<String>) -> Self {
        self.override_target_url = Some(url.into());
        self
    }

    /// Sets the redirection pattern.
    #[must_use]
    pub fn with_redirection_pattern(mut self, pattern: Regex) -> Self {
        self.redirection_pattern = Some(pattern);
        self
    }

    /// Sets the preferred-link pattern.
    #[must_use]
    pub fn with_link_pattern(mut self, pattern: Regex) -> Self {
        self.link_pattern = Some(pattern);
        self
    }

    /// Sets the form-name pattern.
    #[must_use]
    pub fn with_form_name_pattern(mut self, pattern: Regex) -> Self {
        self.form_name_pattern = Some(pattern);
        self
    }

    /// Sets the content pattern.
    #[must_use]
    pub fn with_content_pattern(mut self, pattern: Regex) -> Self {
        self.content_pattern = Some(pattern);
        self
    }

    /// Appends a (name pattern, value) parameter pair.
    ///
    /// # Panics
    ///
    /// Panics on a malformed pattern; intended for tests and hand-built
    /// rules. Configuration goes through [`LoginParameters::from_config`].
    #[must_use]
    pub fn with_parameter(mut self, name_pattern: &str, value: impl Into<String>) -> Self {
        self.parameters.push(ParameterOverride {
            name_pattern: Regex::new(name_pattern).expect("valid parameter name pattern"),
            value: value.into(),
        });
        self
    }

    /// The explicit override target URL, if any.
    #[must_use]
    pub fn override_target_url(&self) -> Option<&str> {
        self.override_target_url.as_deref()
    }

    /// The redirection pattern, if any.
    #[must_use]
    pub fn redirection_pattern(&self) -> Option<&Regex> {
        self.redirection_pattern.as_ref()
    }

    /// The preferred-link pattern, if any.
    #[must_use]
    pub fn link_pattern(&self) -> Option<&Regex> {
        self.link_pattern.as_ref()
    }

    /// The form-name pattern, if any.
    #[must_use]
    pub fn form_name_pattern(&self) -> Option<&Regex> {
        self.form_name_pattern.as_ref()
    }

    /// The content pattern, if any.
    #[must_use]
    pub fn content_pattern(&self) -> Option<&Regex> {
        self.content_pattern.as_ref()
    }

    /// The ordered parameter overrides.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterOverride] {
        &self.parameters
    }
}

fn compile_parameter(
    node: &ParameterNode,
    context: &str,
    index: usize,
) -> Result<ParameterOverride, ConfigError> {
    let name_pattern = Regex::new(&node.name_pattern).map_err(|err| {
        ConfigError::bad_pattern(
            &node.name_pattern,
            format!("{context} parameter {index}"),
            err,
        )
    })?;
    Ok(ParameterOverride {
        name_pattern,
        value: node.value.clone(),
    })
}

/// The sequence credential contract: which login rules apply at a given
/// step of a sequence.
pub trait SequenceCredentials: Send + Sync {
    /// Key ordering this sequence among others.
    fn sequence_key(&self) -> &str;

    /// The rules applicable to a document, in declaration order. More than
    /// one may apply.
    fn login_parameters(&self, document_uri: &str) -> Vec<&LoginParameters>;
}

/// Sequence credentials compiled from configuration.
#[derive(Debug, Clone)]
pub struct StaticSequenceCredentials {
    sequence_key: String,
    pages: Vec<(Regex, LoginParameters)>,
}

impl StaticSequenceCredentials {
    /// Compiles a sequence from its configuration node.
    ///
    /// # Errors
    ///
    /// A malformed regular expression anywhere in the sequence is fatal.
    pub fn from_config(node: &SequenceNode) -> Result<Self, ConfigError> {
        let mut pages = Vec::with_capacity(node.pages.len());
        for (index, page) in node.pages.iter().enumerate() {
            let context = format!("sequence '{}' page {index}", node.sequence_key);
            let url_pattern = Regex::new(&page.url_pattern).map_err(|err| {
                ConfigError::bad_pattern(&page.url_pattern, format!("{context} url pattern"), err)
            })?;
            let parameters = LoginParameters::from_config(page, &context)?;
            pages.push((url_pattern, parameters));
        }
        Ok(Self {
            sequence_key: node.sequence_key.clone(),
            pages,
        })
    }
}

impl SequenceCredentials for StaticSequenceCredentials {
    fn sequence_key(&self) -> &str {
        &self.sequence_key
    }

    fn login_parameters(&self, document_uri: &str) -> Vec<&LoginParameters> {
        self.pages
            .iter()
            .filter(|(pattern, _)| pattern.is_match(document_uri))
            .map(|(_, parameters)| parameters)
            .collect()
    }
}
