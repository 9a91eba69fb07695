//! End-to-end tests driving the orchestrator against scripted
//! collaborators.

use pretty_assertions::assert_eq;

use crate::cancellation::{CancellationBridge, ProbeStatus};
use crate::config::{LoginPageNode, ParameterNode, SequenceNode};
use crate::errors::{CrawlError, ServiceInterruption};
use crate::fetch::FetchKind;
use crate::testing::{ScriptedFetchClient, ScriptedPage, ScriptedProbe, SimpleTokenizer};
use crate::trust::{StaticCertificateSource, TrustResolver};

use super::{DocumentOutcome, SequentialLoginOrchestrator, StaticSequenceCredentials};

const HOME: &str = "https://portal.example/home";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("authcrawl=debug")
        .with_test_writer()
        .try_init();
}

fn empty_trust() -> (TrustResolver, StaticCertificateSource) {
    (TrustResolver::default(), StaticCertificateSource::default())
}

fn page_node(url_pattern: &str) -> LoginPageNode {
    LoginPageNode {
        url_pattern: url_pattern.to_string(),
        ..LoginPageNode::default()
    }
}

fn credentials(pages: Vec<LoginPageNode>) -> StaticSequenceCredentials {
    StaticSequenceCredentials::from_config(&SequenceNode {
        sequence_key: "portal".to_string(),
        pages,
    })
    .unwrap()
}

fn login_form_body() -> &'static str {
    concat!(
        "<html><body>",
        "<form name=\"signin\" action=\"/do-login\" method=\"post\">",
        "<input type=\"text\" name=\"user\" value=\"\">",
        "<input type=\"password\" name=\"pass\" value=\"\">",
        "<input type=\"hidden\" name=\"csrf\" value=\"tok123\">",
        "<input type=\"submit\" name=\"go\">",
        "</form>",
        "</body></html>"
    )
}

#[tokio::test]
async fn test_form_login_sequence_end_to_end() {
    init_tracing();
    let client = ScriptedFetchClient::new()
        .with_page(HOME, ScriptedPage::ok(login_form_body()))
        .with_page(
            "https://portal.example/do-login",
            ScriptedPage::ok("<p>LOGIN-OK, redirecting</p>").with_cookies(vec!["session=abc123"]),
        )
        .with_page_after_login(HOME, ScriptedPage::ok("<p>Welcome back, alice</p>"));

    let mut form_rule = page_node("/home$");
    form_rule.form_name_pattern = Some("^signin$".to_string());
    form_rule.parameters = vec![
        ParameterNode {
            name_pattern: "^user$".to_string(),
            value: "alice".to_string(),
        },
        ParameterNode {
            name_pattern: "^pass$".to_string(),
            value: "s3cret".to_string(),
        },
    ];
    let mut content_rule = page_node("/do-login$");
    content_rule.content_pattern = Some("LOGIN-OK".to_string());
    content_rule.override_target_url = Some(HOME.to_string());
    let credentials = credentials(vec![form_rule, content_rule]);

    let tokenizer = SimpleTokenizer;
    let (trust, certificates) = empty_trust();
    let orchestrator = SequentialLoginOrchestrator::new(&client, &tokenizer, &trust, &certificates)
        .with_credentials(&credentials)
        .with_user_agent("authcrawl-test");
    let mut bridge = CancellationBridge::new(ScriptedProbe::always_active());

    let outcome = orchestrator.run(&mut bridge, HOME).await.unwrap();

    let DocumentOutcome::Fetched(document) = outcome else {
        panic!("expected a fetched document");
    };
    assert_eq!(document.uri, HOME);
    assert!(document.body.contains("Welcome back"));
    assert!(document.cookies.is_some());

    let records = client.records();
    assert_eq!(
        client.fetched_urls(),
        vec![
            HOME.to_string(),
            "https://portal.example/do-login".to_string(),
            HOME.to_string(),
        ]
    );
    // The form submission happens on the second fetch, inside the login
    // sequence, with the overridden values plus untouched hidden fields.
    assert_eq!(records[0].kind, FetchKind::Standard);
    assert_eq!(records[1].kind, FetchKind::Login);
    assert_eq!(
        records[1].form_fields,
        vec![
            ("user".to_string(), "alice".to_string()),
            ("pass".to_string(), "s3cret".to_string()),
            ("csrf".to_string(), "tok123".to_string()),
            ("go".to_string(), "Submit Form".to_string()),
        ]
    );
    // The session cookie collected on the login hop is sent on the next.
    let sent = records[2].cookies.as_ref().expect("cookies sent");
    assert_eq!(sent.entries(), vec!["session=abc123".to_string()]);
}

#[tokio::test]
async fn test_preferred_link_sequence() {
    let body = concat!(
        "<a href=\"/a\">first</a>",
        "<a href=\"/b\">second</a>",
        "<a href=\"/c\">third</a>"
    );
    let client = ScriptedFetchClient::new()
        .with_page(HOME, ScriptedPage::ok(body))
        .with_page(
            "https://portal.example/b",
            ScriptedPage::ok("step two").with_cookies(vec!["session=1"]),
        )
        .with_page_after_login(HOME, ScriptedPage::ok("plain home"));

    let mut link_rule = page_node("/home$");
    link_rule.link_pattern = Some("/b$".to_string());
    let credentials = credentials(vec![link_rule]);

    let tokenizer = SimpleTokenizer;
    let (trust, certificates) = empty_trust();
    let orchestrator = SequentialLoginOrchestrator::new(&client, &tokenizer, &trust, &certificates)
        .with_credentials(&credentials);
    let mut bridge = CancellationBridge::new(ScriptedProbe::always_active());

    let outcome = orchestrator.run(&mut bridge, HOME).await.unwrap();
    let DocumentOutcome::Fetched(document) = outcome else {
        panic!("expected a fetched document");
    };
    assert_eq!(document.body, "plain home");
    // /a resolves first in document order, but only /b matches the rule.
    assert_eq!(
        client.fetched_urls(),
        vec![
            HOME.to_string(),
            "https://portal.example/b".to_string(),
            HOME.to_string(),
        ]
    );
}

#[tokio::test]
async fn test_redirect_rule_follows_matching_location() {
    let client = ScriptedFetchClient::new()
        .with_page(HOME, ScriptedPage::redirect(302, "/sso/start"))
        .with_page(
            "https://portal.example/sso/start",
            ScriptedPage::ok("sso page").with_cookies(vec!["sso=tok"]),
        )
        .with_page_after_login(HOME, ScriptedPage::ok("home content"));

    let mut redirect_rule = page_node("/home$");
    redirect_rule.redirection_pattern = Some("/sso/".to_string());
    let credentials = credentials(vec![redirect_rule]);

    let tokenizer = SimpleTokenizer;
    let (trust, certificates) = empty_trust();
    let orchestrator = SequentialLoginOrchestrator::new(&client, &tokenizer, &trust, &certificates)
        .with_credentials(&credentials);
    let mut bridge = CancellationBridge::new(ScriptedProbe::always_active());

    let outcome = orchestrator.run(&mut bridge, HOME).await.unwrap();
    let DocumentOutcome::Fetched(document) = outcome else {
        panic!("expected a fetched document");
    };
    assert_eq!(document.body, "home content");
    assert_eq!(
        client.fetched_urls(),
        vec![
            HOME.to_string(),
            "https://portal.example/sso/start".to_string(),
            HOME.to_string(),
        ]
    );
}

#[tokio::test]
async fn test_form_rule_outranks_link_rule() -> anyhow::Result<()> {
    let body = concat!(
        "<a href=\"/a\">a link that also matches</a>",
        "<form name=\"signin\" action=\"/do-login\">",
        "<input type=\"text\" name=\"user\" value=\"\">",
        "</form>"
    );
    let client = ScriptedFetchClient::new()
        .with_page(HOME, ScriptedPage::ok(body))
        .with_page(
            "https://portal.example/do-login",
            ScriptedPage::ok("logged in").with_cookies(vec!["session=9"]),
        )
        .with_page_after_login(HOME, ScriptedPage::ok("home, signed in"));

    let mut link_rule = page_node("/home$");
    link_rule.link_pattern = Some("/a$".to_string());
    let mut form_rule = page_node("/home$");
    form_rule.form_name_pattern = Some("^signin$".to_string());
    let credentials = credentials(vec![link_rule, form_rule]);

    let tokenizer = SimpleTokenizer;
    let (trust, certificates) = empty_trust();
    let orchestrator = SequentialLoginOrchestrator::new(&client, &tokenizer, &trust, &certificates)
        .with_credentials(&credentials);
    let mut bridge = CancellationBridge::new(ScriptedProbe::always_active());

    let outcome = orchestrator.run(&mut bridge, HOME).await?;
    let DocumentOutcome::Fetched(document) = outcome else {
        panic!("expected a fetched document");
    };
    assert_eq!(document.body, "home, signed in");
    // The form's action wins over the matching link.
    assert_eq!(
        client.fetched_urls()[1],
        "https://portal.example/do-login".to_string()
    );
    Ok(())
}

#[tokio::test]
async fn test_duplicate_link_rules_poison_link_detection() -> anyhow::Result<()> {
    let body = concat!("<a href=\"/a\">one</a>", "<a href=\"/b\">two</a>");
    let client = ScriptedFetchClient::new().with_page(HOME, ScriptedPage::ok(body));

    // Two rules of the same kind both match: all bets are off, the page is
    // not treated as a login page at all.
    let mut first = page_node("/home$");
    first.link_pattern = Some("/a$".to_string());
    let mut second = page_node("/home$");
    second.link_pattern = Some("/b$".to_string());
    let credentials = credentials(vec![first, second]);

    let tokenizer = SimpleTokenizer;
    let (trust, certificates) = empty_trust();
    let orchestrator = SequentialLoginOrchestrator::new(&client, &tokenizer, &trust, &certificates)
        .with_credentials(&credentials);
    let mut bridge = CancellationBridge::new(ScriptedProbe::always_active());

    let outcome = orchestrator.run(&mut bridge, HOME).await?;
    let DocumentOutcome::Fetched(document) = outcome else {
        panic!("expected a fetched document");
    };
    assert!(document.body.contains("one"));
    assert_eq!(client.records().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_hop_budget_bounds_a_cyclic_sequence() {
    // The page keeps matching a link rule that points back at itself.
    let client = ScriptedFetchClient::new().with_page(
        HOME,
        ScriptedPage::ok("<a href=\"/home\">again</a>"),
    );
    let mut link_rule = page_node("/home$");
    link_rule.link_pattern = Some("/home$".to_string());
    let credentials = credentials(vec![link_rule]);

    let tokenizer = SimpleTokenizer;
    let (trust, certificates) = empty_trust();
    let orchestrator = SequentialLoginOrchestrator::new(&client, &tokenizer, &trust, &certificates)
        .with_credentials(&credentials)
        .with_hop_budget(3);
    let mut bridge = CancellationBridge::new(ScriptedProbe::always_active());

    let outcome = orchestrator.run(&mut bridge, HOME).await.unwrap();
    let DocumentOutcome::Fetched(document) = outcome else {
        panic!("expected the abandoned sequence to settle on the document");
    };
    assert!(document.body.contains("again"));
    // Budget of 3 sequence hops, plus the final fetch after abandonment.
    assert_eq!(client.records().len(), 4);
}

#[tokio::test]
async fn test_transient_interruption_surfaces_original_cause() {
    let client = ScriptedFetchClient::new().with_page(
        HOME,
        ScriptedPage::ok("<a href=\"/b\">next</a>"),
    );
    let mut link_rule = page_node("/home$");
    link_rule.link_pattern = Some("/b$".to_string());
    let credentials = credentials(vec![link_rule]);

    let tokenizer = SimpleTokenizer;
    let (trust, certificates) = empty_trust();
    let orchestrator = SequentialLoginOrchestrator::new(&client, &tokenizer, &trust, &certificates)
        .with_credentials(&credentials);
    let probe = ScriptedProbe::with_script(vec![
        ProbeStatus::Active,
        ProbeStatus::Interrupted(ServiceInterruption::retry_after(
            "job paused",
            chrono::Duration::minutes(5),
        )),
    ]);
    let mut bridge = CancellationBridge::new(probe);

    let err = orchestrator.run(&mut bridge, HOME).await.unwrap_err();
    match err {
        CrawlError::Interrupted(cause) => assert_eq!(cause.message, "job paused"),
        other => panic!("expected the latched interruption, got {other}"),
    }
    // Only the first hop was fetched before the break.
    assert_eq!(client.records().len(), 1);
}

#[tokio::test]
async fn test_thread_stop_cancels_before_any_fetch() {
    let client = ScriptedFetchClient::new();
    let credentials = credentials(vec![]);
    let tokenizer = SimpleTokenizer;
    let (trust, certificates) = empty_trust();
    let orchestrator = SequentialLoginOrchestrator::new(&client, &tokenizer, &trust, &certificates)
        .with_credentials(&credentials);
    let mut bridge =
        CancellationBridge::new(ScriptedProbe::with_script(vec![ProbeStatus::Stop]));

    let err = orchestrator.run(&mut bridge, HOME).await.unwrap_err();
    assert!(matches!(err, CrawlError::Cancelled));
    assert!(client.records().is_empty());
}

#[tokio::test]
async fn test_http_error_is_unreachable_with_context() {
    let client = ScriptedFetchClient::new();
    let tokenizer = SimpleTokenizer;
    let (trust, certificates) = empty_trust();
    let orchestrator =
        SequentialLoginOrchestrator::new(&client, &tokenizer, &trust, &certificates);
    let mut bridge = CancellationBridge::new(ScriptedProbe::always_active());

    let outcome = orchestrator.run(&mut bridge, HOME).await.unwrap();
    let DocumentOutcome::Unreachable { status, context } = outcome else {
        panic!("expected an unreachable outcome");
    };
    assert_eq!(status.code(), 404);
    assert!(context.contains("status=404"));
}

#[tokio::test]
async fn test_plain_document_without_credentials() {
    let client =
        ScriptedFetchClient::new().with_page(HOME, ScriptedPage::ok("just a page"));
    let tokenizer = SimpleTokenizer;
    let (trust, certificates) = empty_trust();
    let orchestrator =
        SequentialLoginOrchestrator::new(&client, &tokenizer, &trust, &certificates);
    let mut bridge = CancellationBridge::new(ScriptedProbe::always_active());

    let outcome = orchestrator.run(&mut bridge, HOME).await.unwrap();
    let DocumentOutcome::Fetched(document) = outcome else {
        panic!("expected a fetched document");
    };
    assert_eq!(document.status, 200);
    assert_eq!(document.body, "just a page");
    // One poll per loop iteration.
    assert_eq!(client.records().len(), 1);
}

#[tokio::test]
async fn test_https_uses_trust_resolution() {
    use crate::config::TrustRuleNode;

    let client = ScriptedFetchClient::new().with_page(HOME, ScriptedPage::ok("secure"));
    let tokenizer = SimpleTokenizer;
    let trust = TrustResolver::from_config(&[TrustRuleNode {
        url_pattern: "^https://portal\\.example/".to_string(),
        trust_everything: true,
        store: None,
    }])
    .unwrap();
    let certificates = StaticCertificateSource::default();
    let orchestrator =
        SequentialLoginOrchestrator::new(&client, &tokenizer, &trust, &certificates);
    let mut bridge = CancellationBridge::new(ScriptedProbe::always_active());

    orchestrator.run(&mut bridge, HOME).await.unwrap();
    let decisions = client.trust_decisions();
    assert_eq!(decisions.len(), 1);
    assert!(decisions[0].is_accept_all());
}
