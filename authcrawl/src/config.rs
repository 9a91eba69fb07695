//! Persisted configuration formats.
//!
//! These nodes are what the connector stores; compiling them into working
//! engine pieces (and validating every regular expression) happens in
//! [`crate::trust::TrustResolver::from_config`],
//! [`crate::trust::StaticCertificateSource::from_config`], and
//! [`crate::login::StaticSequenceCredentials::from_config`].

use serde::{Deserialize, Serialize};

/// One ordered trust rule node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrustRuleNode {
    /// Regular expression a URL must match for this rule to apply.
    pub url_pattern: String,
    /// When true, a matching URL skips certificate validation entirely.
    #[serde(default)]
    pub trust_everything: bool,
    /// Named certificate store to trust for matching URLs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
}

/// A named certificate store embedded in configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrustStoreNode {
    /// Store name, referenced by [`TrustRuleNode::store`].
    pub name: String,
    /// The store's certificates.
    pub certificates: Vec<CertificateNode>,
}

/// One certificate, base64-encoded DER.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CertificateNode {
    /// Subject line, for display and error messages.
    pub subject: String,
    /// DER bytes, base64-encoded.
    pub der_base64: String,
}

/// One login-page rule within a sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LoginPageNode {
    /// Regular expression a document URL must match for this rule to
    /// apply.
    pub url_pattern: String,
    /// Explicit next-hop URL that overrides whatever a detector finds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_target_url: Option<String>,
    /// Pattern a redirect target must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirection_pattern: Option<String>,
    /// Pattern the preferred link must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_pattern: Option<String>,
    /// Pattern the login form's name must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_name_pattern: Option<String>,
    /// Pattern the page text must contain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_pattern: Option<String>,
    /// Ordered (field-name pattern, value) pairs for form filling.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterNode>,
}

/// One form-parameter override.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParameterNode {
    /// Regular expression selecting the form fields to fill.
    pub name_pattern: String,
    /// Literal value to fill in.
    pub value: String,
}

/// One login sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SequenceNode {
    /// Key ordering this sequence among others.
    pub sequence_key: String,
    /// The sequence's login-page rules, in order.
    pub pages: Vec<LoginPageNode>,
}
