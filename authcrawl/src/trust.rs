//! URL-to-trust-material resolution for TLS connections.
//!
//! An ordered list of rules maps URLs to certificate stores. Resolution
//! either short-circuits to "accept all" (skip certificate validation),
//! produces the union of every matching store's certificates, or — when
//! nothing matches — an empty set, which fails closed.

use base64::Engine as _;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

use crate::config::{CertificateNode, TrustRuleNode, TrustStoreNode};
use crate::errors::{ConfigError, CrawlError};

/// One certificate, as stored configuration supplies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// Subject line, used for logging only.
    pub subject: String,
    /// DER-encoded certificate bytes.
    pub der: Vec<u8>,
}

/// Supplies named certificate stores to the resolver.
#[cfg_attr(test, mockall::automock)]
pub trait CertificateSource {
    /// Returns the certificates of a named store.
    ///
    /// # Errors
    ///
    /// A rule naming a store the source cannot supply is a resolution-time
    /// error, not something to skip.
    fn store(&self, name: &str) -> Result<Vec<Certificate>, CrawlError>;
}

/// A certificate source backed by configuration-embedded stores.
#[derive(Debug, Default)]
pub struct StaticCertificateSource {
    stores: HashMap<String, Vec<Certificate>>,
}

impl StaticCertificateSource {
    /// Decodes configuration store nodes into an in-memory source.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidCertificate`] when embedded DER fails to
    /// decode.
    pub fn from_config(nodes: &[TrustStoreNode]) -> Result<Self, ConfigError> {
        let mut stores = HashMap::new();
        for node in nodes {
            let mut certificates = Vec::with_capacity(node.certificates.len());
            for cert in &node.certificates {
                certificates.push(decode_certificate(cert)?);
            }
            stores.insert(node.name.clone(), certificates);
        }
        Ok(Self { stores })
    }
}

impl CertificateSource for StaticCertificateSource {
    fn store(&self, name: &str) -> Result<Vec<Certificate>, CrawlError> {
        self.stores.get(name).cloned().ok_or_else(|| {
            CrawlError::Internal(format!("unknown certificate store '{name}'"))
        })
    }
}

fn decode_certificate(node: &CertificateNode) -> Result<Certificate, ConfigError> {
    let der = base64::engine::general_purpose::STANDARD
        .decode(node.der_base64.trim())
        .map_err(|err| ConfigError::InvalidCertificate {
            subject: node.subject.clone(),
            detail: err.to_string(),
        })?;
    Ok(Certificate {
        subject: node.subject.clone(),
        der,
    })
}

/// A certificate together with the alias it received during one merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedCertificate {
    /// Monotonically increasing alias, unique within one resolution call,
    /// so certificates from different stores can never collide.
    pub alias: usize,
    /// The certificate itself.
    pub certificate: Certificate,
}

/// The merged certificate set produced by one resolution call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustBundle {
    entries: Vec<TrustedCertificate>,
}

impl TrustBundle {
    /// Merges a store's certificates, assigning fresh aliases.
    fn merge(&mut self, certificates: Vec<Certificate>) {
        for certificate in certificates {
            let alias = self.entries.len();
            self.entries.push(TrustedCertificate { alias, certificate });
        }
    }

    /// The merged certificates, in merge order.
    #[must_use]
    pub fn certificates(&self) -> &[TrustedCertificate] {
        &self.entries
    }

    /// Returns true when no rule contributed certificates; connections
    /// should then fail closed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of merged certificates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The trust material to use for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustDecision {
    /// Skip certificate validation entirely.
    AcceptAll,
    /// Validate against exactly these certificates. An empty bundle means
    /// "trust nothing".
    Certificates(TrustBundle),
}

impl TrustDecision {
    /// Returns true for the accept-all sentinel.
    #[must_use]
    pub fn is_accept_all(&self) -> bool {
        matches!(self, Self::AcceptAll)
    }
}

#[derive(Debug, Clone)]
enum TrustAction {
    TrustEverything,
    Store(String),
}

#[derive(Debug, Clone)]
struct TrustRule {
    pattern: Regex,
    action: TrustAction,
}

/// Maps a URL to the trust material governing a TLS connection to it.
///
/// Rules are evaluated in declaration order and a URL may match several;
/// the first matching "trust everything" rule wins outright. Resolution is
/// deliberately uncached: each call rebuilds the merged set from scratch,
/// a known cost under high rule counts.
#[derive(Debug, Clone, Default)]
pub struct TrustResolver {
    rules: Vec<TrustRule>,
}

impl TrustResolver {
    /// Compiles an ordered rule list from configuration.
    ///
    /// # Errors
    ///
    /// A malformed regular expression in any rule is fatal.
    pub fn from_config(nodes: &[TrustRuleNode]) -> Result<Self, ConfigError> {
        let mut rules = Vec::with_capacity(nodes.len());
        for (index, node) in nodes.iter().enumerate() {
            let pattern = Regex::new(&node.url_pattern).map_err(|err| {
                ConfigError::bad_pattern(&node.url_pattern, format!("trust rule {index}"), err)
            })?;
            let action = if node.trust_everything {
                TrustAction::TrustEverything
            } else {
                TrustAction::Store(node.store.clone().unwrap_or_default())
            };
            rules.push(TrustRule { pattern, action });
        }
        Ok(Self { rules })
    }

    /// Number of configured rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Produces the trust material for a connection to `url`.
    ///
    /// # Errors
    ///
    /// Fails when a matching rule names a store the source cannot supply.
    pub fn resolve(
        &self,
        url: &str,
        source: &dyn CertificateSource,
    ) -> Result<TrustDecision, CrawlError> {
        let mut bundle = TrustBundle::default();
        for rule in &self.rules {
            if !rule.pattern.is_match(url) {
                continue;
            }
            match &rule.action {
                TrustAction::TrustEverything => {
                    debug!(url, "trust rule matched: accepting all certificates");
                    return Ok(TrustDecision::AcceptAll);
                }
                TrustAction::Store(name) => {
                    let certificates = source.store(name)?;
                    debug!(
                        url,
                        store = name.as_str(),
                        count = certificates.len(),
                        "trust rule matched: merging store"
                    );
                    bundle.merge(certificates);
                }
            }
        }
        Ok(TrustDecision::Certificates(bundle))
    }
}
