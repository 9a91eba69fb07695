//! The fetch-connection contract.
//!
//! The HTTP/TLS transport and its pooling live outside this crate; these
//! traits describe exactly what the decision engine needs from them. A
//! connection's lifecycle is begin-fetch → execute-fetch → read response →
//! done-fetch → close (return to pool) or destroy (discard).

use async_trait::async_trait;

use crate::errors::CrawlError;
use crate::scan::FormData;
use crate::trust::TrustDecision;

/// Why a fetch is being made; transports may throttle kinds differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// An ordinary page fetch.
    Standard,
    /// A fetch inside a login sequence.
    Login,
}

impl FetchKind {
    /// Activity-log label for this kind of fetch.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Standard => "fetch",
            Self::Login => "login",
        }
    }
}

/// Outcome code of one fetch: an ordinary HTTP status, or a negative
/// sentinel for failures that never produced one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// An HTTP status code.
    Http(u16),
    /// No fetch was attempted.
    NotAttempted,
    /// The fetch was abandoned after a circular redirect.
    CircularRedirect,
    /// The target URL could not be parsed.
    MalformedUrl,
    /// A lifecycle method was called out of sequence.
    OutOfSequence,
    /// The transport failed with an I/O error.
    IoFailure,
    /// The fetch was interrupted.
    Interrupted,
    /// An unclassified failure.
    Unknown,
}

impl FetchStatus {
    /// The wire representation: HTTP codes as-is, sentinels negative.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Http(code) => i32::from(*code),
            Self::NotAttempted => -1,
            Self::CircularRedirect => -100,
            Self::MalformedUrl => -101,
            Self::OutOfSequence => -102,
            Self::IoFailure => -103,
            Self::Interrupted => -104,
            Self::Unknown => -220,
        }
    }

    /// Returns true for the statuses whose response bodies are worth
    /// examining: success, or a redirect carrying a Location header.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Http(200 | 301 | 302))
    }

    /// Returns true for a redirect status.
    #[must_use]
    pub fn is_redirect(&self) -> bool {
        matches!(self, Self::Http(301 | 302))
    }
}

/// The opaque cookie payload threaded from one login-sequence fetch to
/// the next. The engine never inspects the entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCookies {
    entries: Vec<String>,
}

impl SessionCookies {
    /// Wraps raw cookie strings.
    #[must_use]
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries }
    }

    /// The raw cookie strings, in the order the transport produced them.
    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Returns true when no cookies are carried.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything one execute-fetch call needs.
#[derive(Debug, Default)]
pub struct FetchRequest<'a> {
    /// Path and query of the target URL.
    pub path: &'a str,
    /// User-Agent header value.
    pub user_agent: &'a str,
    /// From header value, if any.
    pub from: Option<&'a str>,
    /// Whether the transport may follow redirects itself. The login
    /// orchestrator keeps this off so it can see each hop.
    pub follow_redirects: bool,
    /// Overrides the Host header when set.
    pub host_override: Option<&'a str>,
    /// Form data to submit with the request.
    pub form_data: Option<&'a FormData>,
    /// Cookies to send.
    pub cookies: Option<&'a SessionCookies>,
}

/// Where a pooled connection must be opened to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget<'a> {
    /// `http` or `https`.
    pub scheme: &'a str,
    /// Host name.
    pub host: &'a str,
    /// Port, if explicit.
    pub port: Option<u16>,
    /// Trust material for TLS handshakes.
    pub trust: &'a TrustDecision,
}

/// One pooled fetch connection. Consumed, not implemented, by this crate.
#[async_trait]
pub trait FetchConnection: Send {
    /// Declares the kind of fetch about to happen.
    fn begin_fetch(&mut self, kind: FetchKind);

    /// Executes the fetch.
    ///
    /// # Errors
    ///
    /// Transient transport failures surface as
    /// [`CrawlError::Interrupted`]; anything else is fatal for this
    /// document.
    async fn execute_fetch(&mut self, request: FetchRequest<'_>) -> Result<(), CrawlError>;

    /// Status of the last fetch.
    fn response_status(&self) -> FetchStatus;

    /// All response headers, in wire order.
    fn response_headers(&self) -> &[(String, String)];

    /// First value of a response header, by case-insensitive name.
    fn response_header(&self, name: &str) -> Option<&str> {
        self.response_headers()
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The response body, decoded to text.
    ///
    /// # Errors
    ///
    /// Fails when the body cannot be read or decoded.
    fn response_body(&self) -> Result<String, CrawlError>;

    /// At most `max_chars` characters of the response body, for error
    /// context.
    ///
    /// # Errors
    ///
    /// Fails when the body cannot be read or decoded.
    fn limited_response_body(&self, max_chars: usize) -> Result<String, CrawlError> {
        let body = self.response_body()?;
        Ok(body.chars().take(max_chars).collect())
    }

    /// Cookies the transport collected during the last fetch.
    fn last_fetch_cookies(&self) -> Option<SessionCookies>;

    /// Marks the fetch as fully consumed.
    fn done_fetch(&mut self);

    /// Returns the connection to its pool.
    fn close(self: Box<Self>);

    /// Discards the connection instead of pooling it.
    fn destroy(self: Box<Self>);
}

/// Hands out connections to targets. Consumed, not implemented, here.
#[async_trait]
pub trait FetchClient: Send + Sync {
    /// Obtains a connection for the given target.
    ///
    /// # Errors
    ///
    /// Transport-level failures to reach the target.
    async fn connect(
        &self,
        target: ConnectionTarget<'_>,
    ) -> Result<Box<dyn FetchConnection>, CrawlError>;
}
