//! # Authcrawl
//!
//! The authenticated-crawl decision engine of a web crawler.
//!
//! Given a fetched page's raw markup, authcrawl:
//!
//! - **Recognizes tags, forms, and links incrementally** — tokenizer
//!   events fan out to capability-specific listeners without a parse tree
//! - **Picks the next hop of a login sequence** — regular-expression
//!   policies select a single winning link, form, redirect, or content
//!   region per document
//! - **Resolves TLS trust material per URL** — ordered rules map URLs to
//!   certificate stores, with an explicit accept-all sentinel
//! - **Cancels cooperatively** — a pollable bridge over an external
//!   liveness check that preserves the original failure across the break
//!
//! Transport, scheduling, and persistence stay outside; their contracts
//! live in [`fetch`], [`cancellation`], and [`login`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use authcrawl::prelude::*;
//!
//! let trust = TrustResolver::from_config(&trust_rules)?;
//! let credentials = StaticSequenceCredentials::from_config(&sequence)?;
//! let orchestrator =
//!     SequentialLoginOrchestrator::new(&client, &tokenizer, &trust, &certificates)
//!         .with_credentials(&credentials)
//!         .with_user_agent("crawler/1.0");
//! let mut bridge = CancellationBridge::new(probe);
//! let outcome = orchestrator.run(&mut bridge, "https://site.example/doc").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod errors;
pub mod fetch;
pub mod html;
pub mod login;
pub mod scan;
pub mod testing;
pub mod trust;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::{
        ActivityProbe, CancellationBridge, CancellationState, PollOutcome, ProbeStatus,
    };
    pub use crate::config::{
        CertificateNode, LoginPageNode, ParameterNode, SequenceNode, TrustRuleNode,
        TrustStoreNode,
    };
    pub use crate::errors::{ConfigError, CrawlError, ServiceInterruption};
    pub use crate::fetch::{
        ConnectionTarget, FetchClient, FetchConnection, FetchKind, FetchRequest, FetchStatus,
        SessionCookies,
    };
    pub use crate::html::{
        AttributeSet, DocumentHandler, HtmlTokenizer, ScanFlow, TagEvent, TagEventRouter,
    };
    pub use crate::login::{
        DocumentOutcome, FetchedDocument, LoginParameters, SequenceCredentials,
        SequentialLoginOrchestrator, StaticSequenceCredentials,
    };
    pub use crate::scan::{
        ContentRegionMatcher, FormActionCapture, FormData, LinkCandidateSelector,
        RedirectCandidateSelector, TargetResult,
    };
    pub use crate::trust::{
        Certificate, CertificateSource, StaticCertificateSource, TrustBundle, TrustDecision,
        TrustResolver,
    };
}
