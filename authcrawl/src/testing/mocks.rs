//! Scripted collaborator mocks that record what the engine asked of them.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::cancellation::{ActivityProbe, ProbeStatus};
use crate::errors::CrawlError;
use crate::fetch::{
    ConnectionTarget, FetchClient, FetchConnection, FetchKind, FetchRequest, FetchStatus,
    SessionCookies,
};
use crate::trust::TrustDecision;

/// One pre-scripted page a [`ScriptedFetchClient`] can serve.
#[derive(Debug, Clone)]
pub struct ScriptedPage {
    /// HTTP status to report.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: String,
    /// Cookies the "transport" collected during this fetch.
    pub cookies: Option<SessionCookies>,
}

impl ScriptedPage {
    /// A 200 page with the given body.
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
            cookies: None,
        }
    }

    /// A redirect to the given location.
    #[must_use]
    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("Location".to_string(), location.into())],
            body: String::new(),
            cookies: None,
        }
    }

    /// Attaches cookies to the page.
    #[must_use]
    pub fn with_cookies(mut self, entries: Vec<&str>) -> Self {
        self.cookies = Some(SessionCookies::new(
            entries.into_iter().map(str::to_string).collect(),
        ));
        self
    }
}

/// What one execute-fetch call looked like, as the client recorded it.
#[derive(Debug, Clone)]
pub struct FetchRecord {
    /// Reconstructed absolute URL.
    pub url: String,
    /// Declared fetch kind.
    pub kind: FetchKind,
    /// Active form fields submitted, in order.
    pub form_fields: Vec<(String, String)>,
    /// Cookies sent with the request.
    pub cookies: Option<SessionCookies>,
}

/// A fetch client serving pre-scripted pages keyed by absolute URL.
///
/// A URL may carry a second, cookie-gated variant that is served once the
/// request sends any cookies — enough to model a session taking effect.
#[derive(Debug, Default)]
pub struct ScriptedFetchClient {
    pages: HashMap<String, ScriptedPage>,
    cookie_pages: HashMap<String, ScriptedPage>,
    records: Arc<Mutex<Vec<FetchRecord>>>,
    trust_log: Arc<Mutex<Vec<TrustDecision>>>,
}

impl ScriptedFetchClient {
    /// Creates an empty client; unknown URLs come back as 404.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a page at an absolute URL.
    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, page: ScriptedPage) -> Self {
        self.pages.insert(url.into(), page);
        self
    }

    /// Scripts the variant served once the request carries cookies.
    #[must_use]
    pub fn with_page_after_login(mut self, url: impl Into<String>, page: ScriptedPage) -> Self {
        self.cookie_pages.insert(url.into(), page);
        self
    }

    /// The trust decisions passed to connect, in order.
    #[must_use]
    pub fn trust_decisions(&self) -> Vec<TrustDecision> {
        self.trust_log.lock().clone()
    }

    /// The fetches performed so far, in order.
    #[must_use]
    pub fn records(&self) -> Vec<FetchRecord> {
        self.records.lock().clone()
    }

    /// URLs fetched so far, in order.
    #[must_use]
    pub fn fetched_urls(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.url.clone()).collect()
    }
}

#[async_trait]
impl FetchClient for ScriptedFetchClient {
    async fn connect(
        &self,
        target: ConnectionTarget<'_>,
    ) -> Result<Box<dyn FetchConnection>, CrawlError> {
        let base = match target.port {
            Some(port) => format!("{}://{}:{port}", target.scheme, target.host),
            None => format!("{}://{}", target.scheme, target.host),
        };
        self.trust_log.lock().push(target.trust.clone());
        Ok(Box::new(ScriptedConnection {
            base,
            pages: self.pages.clone(),
            cookie_pages: self.cookie_pages.clone(),
            records: Arc::clone(&self.records),
            kind: FetchKind::Standard,
            current: None,
            empty_headers: Vec::new(),
        }))
    }
}

#[derive(Debug)]
struct ScriptedConnection {
    base: String,
    pages: HashMap<String, ScriptedPage>,
    cookie_pages: HashMap<String, ScriptedPage>,
    records: Arc<Mutex<Vec<FetchRecord>>>,
    kind: FetchKind,
    current: Option<ScriptedPage>,
    empty_headers: Vec<(String, String)>,
}

#[async_trait]
impl FetchConnection for ScriptedConnection {
    fn begin_fetch(&mut self, kind: FetchKind) {
        self.kind = kind;
    }

    async fn execute_fetch(&mut self, request: FetchRequest<'_>) -> Result<(), CrawlError> {
        let url = format!("{}{}", self.base, request.path);
        let form_fields = request
            .form_data
            .map(|form| {
                form.active_elements()
                    .map(|e| (e.name.clone(), e.value.clone()))
                    .collect()
            })
            .unwrap_or_default();
        self.records.lock().push(FetchRecord {
            url: url.clone(),
            kind: self.kind,
            form_fields,
            cookies: request.cookies.cloned(),
        });
        let has_cookies = request.cookies.is_some_and(|c| !c.is_empty());
        let page = if has_cookies {
            self.cookie_pages.get(&url).or_else(|| self.pages.get(&url))
        } else {
            self.pages.get(&url)
        };
        self.current = Some(page.cloned().unwrap_or(ScriptedPage {
            status: 404,
            headers: Vec::new(),
            body: "not found".to_string(),
            cookies: None,
        }));
        Ok(())
    }

    fn response_status(&self) -> FetchStatus {
        match &self.current {
            Some(page) => FetchStatus::Http(page.status),
            None => FetchStatus::NotAttempted,
        }
    }

    fn response_headers(&self) -> &[(String, String)] {
        match &self.current {
            Some(page) => &page.headers,
            None => &self.empty_headers,
        }
    }

    fn response_body(&self) -> Result<String, CrawlError> {
        match &self.current {
            Some(page) => Ok(page.body.clone()),
            None => Err(CrawlError::Fetch("no fetch executed".to_string())),
        }
    }

    fn last_fetch_cookies(&self) -> Option<SessionCookies> {
        self.current.as_ref().and_then(|p| p.cookies.clone())
    }

    fn done_fetch(&mut self) {}

    fn close(self: Box<Self>) {}

    fn destroy(self: Box<Self>) {}
}

/// A liveness probe that plays back a scripted sequence of statuses, then
/// reports active forever.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    script: VecDeque<ProbeStatus>,
    polls: usize,
}

impl ScriptedProbe {
    /// A probe that always reports active.
    #[must_use]
    pub fn always_active() -> Self {
        Self::default()
    }

    /// A probe playing back the given statuses in order.
    #[must_use]
    pub fn with_script(script: Vec<ProbeStatus>) -> Self {
        Self {
            script: script.into(),
            polls: 0,
        }
    }

    /// How many times the probe was consulted.
    #[must_use]
    pub fn polls(&self) -> usize {
        self.polls
    }
}

impl ActivityProbe for ScriptedProbe {
    fn check_still_active(&mut self) -> ProbeStatus {
        self.polls += 1;
        self.script.pop_front().unwrap_or(ProbeStatus::Active)
    }
}
