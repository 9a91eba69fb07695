//! Drives one document's authenticated fetch sequence.

use tracing::{debug, warn};
use url::Url;

use crate::cancellation::{ActivityProbe, CancellationBridge, CancellationState, PollOutcome};
use crate::errors::CrawlError;
use crate::fetch::{
    ConnectionTarget, FetchClient, FetchKind, FetchRequest, FetchStatus, SessionCookies,
};
use crate::html::{HtmlTokenizer, TagEventRouter};
use crate::scan::{
    ContentRegionMatcher, FormActionCapture, FormData, LinkCandidateSelector,
    RedirectCandidateSelector, TargetResult,
};
use crate::trust::{CertificateSource, TrustBundle, TrustDecision, TrustResolver};

use super::{LoginParameters, SequenceCredentials};

/// Fetches one document may spend before its login sequence is abandoned.
pub const DEFAULT_HOP_BUDGET: usize = 10;

const ERROR_EXCERPT_CHARS: usize = 1024;

/// Whether the loop believes it is inside a login sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Normal,
    Login,
}

/// The successfully fetched final document of a sequence.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// URL the content was fetched from.
    pub uri: String,
    /// HTTP status of the final fetch.
    pub status: u16,
    /// Response headers, in wire order.
    pub headers: Vec<(String, String)>,
    /// Decoded response body.
    pub body: String,
    /// Cookies accumulated during the login sequence, for the caller to
    /// persist.
    pub cookies: Option<SessionCookies>,
}

/// How one document's sequence ended.
#[derive(Debug, Clone)]
pub enum DocumentOutcome {
    /// The document (or the page the sequence settled on) was fetched and
    /// is ready for downstream processing.
    Fetched(FetchedDocument),
    /// No usable document was produced; the status and context say why.
    Unreachable {
        /// Status of the failing fetch.
        status: FetchStatus,
        /// Context for logging and retry decisions.
        context: String,
    },
}

/// Composes the scanners, the trust resolver, and the cancellation bridge
/// into a bounded fetch → parse → decide loop.
///
/// A page is part of a login sequence when one of the four detectors
/// matches an applicable rule, with strict precedence
/// form > link > redirection > content. Duplicate matches of the same
/// kind poison that kind for the document. The loop runs on one controller
/// task; its only suspension point is the fetch call.
pub struct SequentialLoginOrchestrator<'a> {
    client: &'a dyn FetchClient,
    tokenizer: &'a dyn HtmlTokenizer,
    trust: &'a TrustResolver,
    certificates: &'a dyn CertificateSource,
    credentials: Option<&'a dyn SequenceCredentials>,
    user_agent: String,
    from_address: Option<String>,
    hop_budget: usize,
}

impl<'a> SequentialLoginOrchestrator<'a> {
    /// Creates an orchestrator over the given collaborators.
    #[must_use]
    pub fn new(
        client: &'a dyn FetchClient,
        tokenizer: &'a dyn HtmlTokenizer,
        trust: &'a TrustResolver,
        certificates: &'a dyn CertificateSource,
    ) -> Self {
        Self {
            client,
            tokenizer,
            trust,
            certificates,
            credentials: None,
            user_agent: "authcrawl".to_string(),
            from_address: None,
            hop_budget: DEFAULT_HOP_BUDGET,
        }
    }

    /// Attaches the sequence credentials that make login detection run.
    #[must_use]
    pub fn with_credentials(mut self, credentials: &'a dyn SequenceCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets the User-Agent header value.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the From header value.
    #[must_use]
    pub fn with_from_address(mut self, from: impl Into<String>) -> Self {
        self.from_address = Some(from.into());
        self
    }

    /// Caps the fetches one document's sequence may perform.
    #[must_use]
    pub fn with_hop_budget(mut self, budget: usize) -> Self {
        self.hop_budget = budget.max(1);
        self
    }

    /// Runs the sequence for one document.
    ///
    /// # Errors
    ///
    /// Transient interruptions surface as [`CrawlError::Interrupted`] (the
    /// document should be rescheduled); configuration and fatal errors
    /// propagate with their original message; a thread-level stop returns
    /// [`CrawlError::Cancelled`].
    pub async fn run<P: ActivityProbe>(
        &self,
        bridge: &mut CancellationBridge<P>,
        document_uri: &str,
    ) -> Result<DocumentOutcome, CrawlError> {
        let mut loop_state = CancellationState::Running;
        let mut session = SessionState::Normal;
        let mut current_uri = document_uri.to_string();
        let mut pending_form: Option<FormData> = None;
        let mut cookies: Option<SessionCookies> = None;
        let mut hops = 0usize;
        let mut sequence_abandoned = false;

        loop {
            match bridge.poll() {
                PollOutcome::Continue { .. } => {}
                PollOutcome::BreakRequested => {
                    loop_state.advance(CancellationState::BreakRequested);
                    debug!(state = ?loop_state, "unwinding fetch loop");
                    bridge.rethrow()?;
                    return Err(CrawlError::Internal(
                        "break requested without a latched cause".to_string(),
                    ));
                }
                PollOutcome::Cancelled => {
                    loop_state.advance(CancellationState::Cancelled);
                    return Err(CrawlError::Cancelled);
                }
            }

            hops += 1;
            if hops > self.hop_budget {
                if sequence_abandoned {
                    // Second pass over the budget: give up outright.
                    return Ok(DocumentOutcome::Unreachable {
                        status: FetchStatus::NotAttempted,
                        context: format!(
                            "login sequence exhausted its hop budget of {}",
                            self.hop_budget
                        ),
                    });
                }
                warn!(
                    document = document_uri,
                    budget = self.hop_budget,
                    "hop budget exhausted; abandoning login sequence"
                );
                sequence_abandoned = true;
                session = SessionState::Normal;
                pending_form = None;
                current_uri = document_uri.to_string();
            }

            let Ok(url) = Url::parse(&current_uri) else {
                return Ok(DocumentOutcome::Unreachable {
                    status: FetchStatus::MalformedUrl,
                    context: format!("target URL '{current_uri}' could not be parsed"),
                });
            };
            let Some(host) = url.host_str().map(str::to_string) else {
                return Ok(DocumentOutcome::Unreachable {
                    status: FetchStatus::MalformedUrl,
                    context: format!("target URL '{current_uri}' has no host"),
                });
            };

            // Only https connections need real trust material.
            let trust_decision = if url.scheme() == "https" {
                self.trust.resolve(&current_uri, self.certificates)?
            } else {
                TrustDecision::Certificates(TrustBundle::default())
            };

            let mut connection = self
                .client
                .connect(ConnectionTarget {
                    scheme: url.scheme(),
                    host: &host,
                    port: url.port(),
                    trust: &trust_decision,
                })
                .await?;

            let kind = match session {
                SessionState::Login => FetchKind::Login,
                SessionState::Normal => FetchKind::Standard,
            };
            connection.begin_fetch(kind);
            debug!(url = %current_uri, kind = kind.label(), "fetching");

            let path = path_and_query(&url);
            let request = FetchRequest {
                path: &path,
                user_agent: &self.user_agent,
                from: self.from_address.as_deref(),
                follow_redirects: false,
                host_override: Some(&host),
                form_data: pending_form.as_ref(),
                cookies: cookies.as_ref(),
            };
            let fetch_result = connection.execute_fetch(request).await;
            pending_form = None;
            if let Err(err) = fetch_result {
                connection.done_fetch();
                connection.destroy();
                return Err(err);
            }

            let status = connection.response_status();
            let mut page: Option<String> = None;
            let mut headers: Vec<(String, String)> = Vec::new();
            let mut location: Option<String> = None;
            let mut failure_context = String::new();
            if status.is_usable() {
                if session == SessionState::Login {
                    if let Some(fresh) = connection.last_fetch_cookies() {
                        cookies = Some(fresh);
                    }
                }
                match connection.response_body() {
                    Ok(body) => {
                        headers = connection.response_headers().to_vec();
                        location = connection.response_header("location").map(str::to_string);
                        page = Some(body);
                    }
                    Err(err) => {
                        connection.done_fetch();
                        connection.destroy();
                        return Err(err);
                    }
                }
            } else {
                let excerpt = connection
                    .limited_response_body(ERROR_EXCERPT_CHARS)
                    .unwrap_or_else(|_| "undecodable".to_string());
                failure_context = format!(
                    "it failed to fetch (status={}, message='{excerpt}')",
                    status.code()
                );
            }
            connection.done_fetch();
            connection.close();

            // Decide whether this page is part of the login sequence.
            let mut decision = Detection::default();
            if !sequence_abandoned {
                if let (Some(body), Some(credentials)) = (&page, self.credentials) {
                    decision =
                        self.detect(credentials, &current_uri, body, location.as_deref());
                }
            }
            let is_login_page = decision.is_login_page();

            match session {
                SessionState::Normal if is_login_page => {
                    debug!(url = %current_uri, "page matches a login rule; entering login sequence");
                    session = SessionState::Login;
                }
                SessionState::Login if page.is_some() && !is_login_page => {
                    debug!(url = %current_uri, "page no longer matches; exiting login sequence");
                    session = SessionState::Normal;
                    if current_uri != document_uri {
                        current_uri = document_uri.to_string();
                        continue;
                    }
                    // The last fetch stands on its own.
                }
                _ => {}
            }

            if page.is_some() && session == SessionState::Login {
                let next = match decision {
                    Detection {
                        form: Some(form), ..
                    } => {
                        let action = form.action().to_string();
                        pending_form = Some(form);
                        Some(action)
                    }
                    Detection { link: Some(link), .. } => Some(link),
                    Detection {
                        redirect: Some(redirect),
                        ..
                    } => Some(redirect),
                    Detection { content, .. } => content.and_then(|c| match c {
                        TargetResult::Found(url) => Some(url),
                        _ => None,
                    }),
                };
                match next {
                    Some(target) if !target.is_empty() => {
                        debug!(from = %current_uri, to = %target, "following login sequence hop");
                        current_uri = target;
                    }
                    _ => {
                        // A recognized login page without a usable next hop
                        // ends the sequence; go back to the original.
                        warn!(
                            url = %current_uri,
                            "could not find a usable link to the next page; exiting login sequence"
                        );
                        session = SessionState::Normal;
                        pending_form = None;
                        current_uri = document_uri.to_string();
                    }
                }
                continue;
            }

            if let Some(body) = page {
                let final_status = match status {
                    FetchStatus::Http(code) => code,
                    _ => 0,
                };
                return Ok(DocumentOutcome::Fetched(FetchedDocument {
                    uri: current_uri,
                    status: final_status,
                    headers,
                    body,
                    cookies,
                }));
            }

            if session == SessionState::Login {
                // The hop target turned out to be unusable; the sequence is
                // fundamentally wrong for this site.
                warn!(
                    url = %current_uri,
                    context = failure_context.as_str(),
                    "page unsuitable for login sequence"
                );
            }
            return Ok(DocumentOutcome::Unreachable {
                status,
                context: failure_context,
            });
        }
    }

    /// Runs the four detectors over every applicable rule, with strict
    /// precedence and same-kind poisoning.
    fn detect(
        &self,
        credentials: &dyn SequenceCredentials,
        current_uri: &str,
        body: &str,
        location: Option<&str>,
    ) -> Detection {
        let mut detection = Detection::default();
        let mut form_poisoned = false;
        let mut link_poisoned = false;
        let mut redirect_poisoned = false;
        let mut content_poisoned = false;

        for rule in credentials.login_parameters(current_uri) {
            if let Some(form) = self.find_form(current_uri, body, rule) {
                if detection.form.is_some() {
                    warn!(
                        sequence = credentials.sequence_key(),
                        url = current_uri,
                        "more than one form rule matched; ignoring all form matches"
                    );
                    form_poisoned = true;
                    detection.form = None;
                } else if !form_poisoned {
                    detection.form = Some(form);
                    detection.link = None;
                    detection.redirect = None;
                }
            } else if let Some(link) = self.find_link(current_uri, body, rule) {
                if detection.link.is_some() {
                    warn!(
                        sequence = credentials.sequence_key(),
                        url = current_uri,
                        "more than one link rule matched; ignoring all link matches"
                    );
                    link_poisoned = true;
                    detection.link = None;
                } else if !link_poisoned && !form_poisoned && detection.form.is_none() {
                    detection.link = Some(link);
                    detection.redirect = None;
                }
            } else if let Some(redirect) = self.find_redirect(current_uri, location, rule) {
                if detection.redirect.is_some() {
                    warn!(
                        sequence = credentials.sequence_key(),
                        url = current_uri,
                        "more than one redirection rule matched; ignoring all redirection matches"
                    );
                    redirect_poisoned = true;
                    detection.redirect = None;
                } else if !redirect_poisoned
                    && !link_poisoned
                    && !form_poisoned
                    && detection.form.is_none()
                    && detection.link.is_none()
                {
                    detection.redirect = Some(redirect);
                }
            } else if let Some(content) = self.find_content(body, rule) {
                if detection.content.is_some() {
                    warn!(
                        sequence = credentials.sequence_key(),
                        url = current_uri,
                        "more than one content rule matched; ignoring all content matches"
                    );
                    content_poisoned = true;
                    detection.content = None;
                } else if !content_poisoned
                    && !redirect_poisoned
                    && !link_poisoned
                    && !form_poisoned
                    && detection.form.is_none()
                    && detection.link.is_none()
                    && detection.redirect.is_none()
                {
                    detection.content = Some(content);
                }
            }
        }
        detection
    }

    fn find_form(
        &self,
        current_uri: &str,
        body: &str,
        rule: &LoginParameters,
    ) -> Option<FormData> {
        let pattern = rule.form_name_pattern()?;
        let mut capture = FormActionCapture::new(current_uri, Some(pattern.clone()));
        let mut router = TagEventRouter::new();
        router.scan_one(self.tokenizer.tokenize(body), &mut capture);
        capture.into_form_data(Some(rule))
    }

    fn find_link(&self, current_uri: &str, body: &str, rule: &LoginParameters) -> Option<String> {
        let pattern = rule.link_pattern()?;
        let mut selector = LinkCandidateSelector::new(current_uri, Some(pattern.clone()));
        let mut router = TagEventRouter::new();
        router.scan_one(self.tokenizer.tokenize(body), &mut selector);
        match selector.into_result(Some(rule)) {
            TargetResult::Found(url) => Some(url),
            _ => None,
        }
    }

    fn find_redirect(
        &self,
        current_uri: &str,
        location: Option<&str>,
        rule: &LoginParameters,
    ) -> Option<String> {
        let pattern = rule.redirection_pattern()?;
        let mut selector = RedirectCandidateSelector::new(current_uri, Some(pattern.clone()));
        if let Some(target) = location {
            selector.note_redirect(target);
        }
        match selector.into_result(Some(rule)) {
            TargetResult::Found(url) => Some(url),
            _ => None,
        }
    }

    fn find_content(&self, body: &str, rule: &LoginParameters) -> Option<TargetResult> {
        let pattern = rule.content_pattern()?;
        let mut matcher = ContentRegionMatcher::new(vec![pattern.clone()]);
        let mut router = TagEventRouter::new();
        router.scan_one(self.tokenizer.tokenize(body), &mut matcher);
        let result = matcher.into_result(Some(rule));
        result.is_set().then_some(result)
    }
}

/// What the rule sweep found on one page.
#[derive(Debug, Default)]
struct Detection {
    form: Option<FormData>,
    link: Option<String>,
    redirect: Option<String>,
    content: Option<TargetResult>,
}

impl Detection {
    fn is_login_page(&self) -> bool {
        self.form.is_some()
            || self.link.is_some()
            || self.redirect.is_some()
            || self.content.is_some()
    }
}

fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}
