// Workflow tests against a scripted backend

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use status_registry::core::{RegistrationError, RegistrationState, RegistrationWorkflow, SearchState, SearchWorkflow};
use status_registry::models::{FieldPath, RelationshipSubmission};
use status_registry::services::{ApiError, ApiErrorKind, Backend, BrowserError, ExternalBrowser};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio_test::{assert_pending, assert_ready};

type Reply = Result<Value, ApiError>;

#[derive(Debug, Clone)]
struct Call {
    method: Method,
    path: String,
    body: Option<Value>,
}

/// Backend whose replies are released by the test
#[derive(Default)]
struct ScriptedBackend {
    pending: Mutex<HashMap<String, VecDeque<oneshot::Receiver<Reply>>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    fn reply(&self, path: &str) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(rx);
        tx
    }

    fn respond_now(&self, path: &str, reply: Reply) {
        self.reply(path).send(reply).unwrap();
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, ApiError> {
        self.calls.lock().unwrap().push(Call {
            method,
            path: path.to_string(),
            body: body.cloned(),
        });

        let rx = self
            .pending
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(|queue| queue.pop_front());

        match rx {
            Some(rx) => rx.await.unwrap_or_else(|_| Err(ApiError::network("reply dropped"))),
            None => Err(ApiError::network(format!("no scripted reply for {}", path))),
        }
    }
}

struct FakeBrowser {
    openable: bool,
    opened: Mutex<Vec<String>>,
}

impl FakeBrowser {
    fn new(openable: bool) -> Self {
        Self {
            openable,
            opened: Mutex::new(vec![]),
        }
    }

    fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExternalBrowser for FakeBrowser {
    async fn can_open(&self, _url: &str) -> bool {
        self.openable
    }

    async fn open(&self, url: &str) -> Result<(), BrowserError> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

fn relationship(name1: &str, name2: &str) -> Value {
    json!({
        "person1": {"name": name1, "city": "Austin", "state": "TX"},
        "person2": {"name": name2, "city": "Austin", "state": "TX"},
        "relationship_start_date": "2023-06-15"
    })
}

fn valid_draft() -> Vec<(FieldPath, &'static str)> {
    vec![
        (FieldPath::Person1Name, " Ann Smith "),
        (FieldPath::Person1Email, "Ann@Example.com"),
        (FieldPath::Person1City, "Austin"),
        (FieldPath::Person1State, "TX"),
        (FieldPath::Person2Name, "Bob Jones"),
        (FieldPath::Person2Email, "bob@example.com"),
        (FieldPath::Person2City, "Dallas "),
        (FieldPath::Person2State, "tx"),
        (FieldPath::RelationshipStartDate, "2023-06-15"),
    ]
}

fn registration(
    backend: &Arc<ScriptedBackend>,
    browser: &Arc<FakeBrowser>,
) -> RegistrationWorkflow<ScriptedBackend, FakeBrowser> {
    let workflow = RegistrationWorkflow::new(backend.clone(), browser.clone());
    for (path, value) in valid_draft() {
        workflow.update_field(path, value);
    }
    workflow
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_blank_queries_never_hit_the_network() {
    let backend = Arc::new(ScriptedBackend::default());
    let workflow = SearchWorkflow::new(backend.clone());

    for raw in ["", " ", "   ", "\t", "\n", " \t \r\n "] {
        let state = workflow.submit_query(raw).await;
        assert!(matches!(state, SearchState::Rejected { .. }), "query {:?}", raw);
    }

    assert!(backend.calls().is_empty());
    assert_eq!(workflow.current_sequence(), 6);
}

#[tokio::test]
async fn test_query_is_trimmed_and_encoded() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.respond_now("/search?name=Mary%20Ann", Ok(json!({"results": []})));
    let workflow = SearchWorkflow::new(backend.clone());

    let state = workflow.submit_query("  Mary Ann  ").await;

    assert_eq!(state, SearchState::Empty { query: "Mary Ann".to_string() });
    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, Method::GET);
    assert!(calls[0].body.is_none());
}

#[test]
fn test_stale_search_response_is_discarded() {
    let backend = Arc::new(ScriptedBackend::default());
    let alice = backend.reply("/search?name=Alice");
    let bob = backend.reply("/search?name=Bob");
    let workflow = SearchWorkflow::new(backend.clone());

    let mut first = tokio_test::task::spawn(workflow.submit_query("Alice"));
    assert_pending!(first.poll());
    let mut second = tokio_test::task::spawn(workflow.submit_query("Bob"));
    assert_pending!(second.poll());
    assert_eq!(workflow.state(), SearchState::Searching { query: "Bob".to_string() });

    bob.send(Ok(json!({"results": [relationship("Bob", "Carol")]}))).unwrap();
    let state = assert_ready!(second.poll());
    assert_eq!(state.results()[0].person1.name, "Bob");

    alice.send(Ok(json!({"results": [relationship("Alice", "Dan")]}))).unwrap();
    let _ = assert_ready!(first.poll());

    let state = workflow.state();
    assert_eq!(state.results().len(), 1);
    assert_eq!(state.results()[0].person1.name, "Bob");
}

#[test]
fn test_earlier_response_cannot_end_a_later_search() {
    let backend = Arc::new(ScriptedBackend::default());
    let alice = backend.reply("/search?name=Alice");
    let bob = backend.reply("/search?name=Bob");
    let workflow = SearchWorkflow::new(backend.clone());

    let mut first = tokio_test::task::spawn(workflow.submit_query("Alice"));
    assert_pending!(first.poll());
    let mut second = tokio_test::task::spawn(workflow.submit_query("Bob"));
    assert_pending!(second.poll());

    alice.send(Err(ApiError::server("boom"))).unwrap();
    let _ = assert_ready!(first.poll());
    assert_eq!(workflow.state(), SearchState::Searching { query: "Bob".to_string() });

    bob.send(Ok(json!({"results": []}))).unwrap();
    let state = assert_ready!(second.poll());
    assert_eq!(state, SearchState::Empty { query: "Bob".to_string() });
}

#[test]
fn test_reset_supersedes_in_flight_search() {
    let backend = Arc::new(ScriptedBackend::default());
    let alice = backend.reply("/search?name=Alice");
    let workflow = SearchWorkflow::new(backend.clone());

    let mut search = tokio_test::task::spawn(workflow.submit_query("Alice"));
    assert_pending!(search.poll());
    workflow.reset();

    alice.send(Ok(json!({"results": [relationship("Alice", "Dan")]}))).unwrap();
    let _ = assert_ready!(search.poll());
    assert_eq!(workflow.state(), SearchState::Idle);
}

#[tokio::test]
async fn test_same_query_is_always_reissued() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.respond_now("/search?name=Smith", Ok(json!({"results": [relationship("Ann Smith", "Bob")]})));
    backend.respond_now("/search?name=Smith", Ok(json!({"results": []})));
    let workflow = SearchWorkflow::new(backend.clone());

    assert!(matches!(workflow.submit_query("Smith").await, SearchState::Success { .. }));
    assert!(matches!(workflow.submit_query("Smith").await, SearchState::Empty { .. }));
    assert_eq!(backend.calls().len(), 2);
}

#[tokio::test]
async fn test_search_failure_keeps_error_kind() {
    let backend = Arc::new(ScriptedBackend::default());
    let workflow = SearchWorkflow::new(backend.clone());

    // No scripted reply: the backend reports a network failure
    let state = workflow.submit_query("Smith").await;
    match state {
        SearchState::Failed { query, error } => {
            assert_eq!(query, "Smith");
            assert_eq!(error.kind, ApiErrorKind::Network);
        }
        other => panic!("unexpected state {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_search_payload_is_a_parse_error() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.respond_now("/search?name=Smith", Ok(json!({"results": "nope"})));
    let workflow = SearchWorkflow::new(backend.clone());

    let state = workflow.submit_query("Smith").await;
    assert!(matches!(state, SearchState::Failed { ref error, .. } if error.kind == ApiErrorKind::Parse));
}

#[tokio::test]
async fn test_subscribers_see_search_transitions() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.respond_now("/search?name=Smith", Ok(json!({"results": []})));
    let workflow = SearchWorkflow::new(backend.clone());
    let mut rx = workflow.subscribe();

    workflow.submit_query("Smith").await;

    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), SearchState::Empty { query: "Smith".to_string() });
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_any_missing_field_fails_validation_without_request() {
    for field in FieldPath::REQUIRED {
        for blank in ["", "   "] {
            let backend = Arc::new(ScriptedBackend::default());
            let browser = Arc::new(FakeBrowser::new(true));
            let workflow = registration(&backend, &browser);
            workflow.update_field(field, blank);

            match workflow.submit().await {
                RegistrationState::ValidationFailed(err) => assert_eq!(err.field, field),
                other => panic!("{}: unexpected state {:?}", field, other),
            }
            assert!(backend.calls().is_empty(), "{} issued a request", field);
        }
    }
}

#[tokio::test]
async fn test_invalid_email_fails_validation_without_request() {
    let invalid = [
        "ann",
        "ann@",
        "ann@example",
        "@example.com",
        "ann smith@example.com",
        "ann@ex ample.com",
        " ann@example.com",
        "ann@example.com ",
    ];

    for field in [FieldPath::Person1Email, FieldPath::Person2Email] {
        for email in invalid {
            let backend = Arc::new(ScriptedBackend::default());
            let browser = Arc::new(FakeBrowser::new(true));
            let workflow = registration(&backend, &browser);
            workflow.update_field(field, email);

            match workflow.submit().await {
                RegistrationState::ValidationFailed(err) => assert_eq!(err.field, field, "{}", email),
                other => panic!("{}: unexpected state {:?}", email, other),
            }
            assert!(backend.calls().is_empty());
        }
    }
}

#[tokio::test]
async fn test_submission_is_normalized() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.respond_now("/create-checkout-session", Ok(json!({"url": "https://pay.example/abc"})));
    let browser = Arc::new(FakeBrowser::new(true));
    let workflow = registration(&backend, &browser);

    workflow.submit().await;

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, Method::POST);
    assert_eq!(calls[0].path, "/create-checkout-session");
    assert_eq!(
        calls[0].body,
        Some(json!({
            "person1": {"name": "Ann Smith", "email": "ann@example.com", "city": "Austin", "state": "TX"},
            "person2": {"name": "Bob Jones", "email": "bob@example.com", "city": "Dallas", "state": "tx"},
            "relationship_start_date": "2023-06-15"
        }))
    );
}

#[tokio::test]
async fn test_retry_after_server_error_sends_identical_body() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.respond_now("/create-checkout-session", Err(ApiError::server("temporarily unavailable")));
    backend.respond_now("/create-checkout-session", Ok(json!({"url": "https://pay.example/abc"})));
    let browser = Arc::new(FakeBrowser::new(true));
    let workflow = registration(&backend, &browser);

    let state = workflow.submit().await;
    assert_eq!(
        state,
        RegistrationState::SubmitFailed(RegistrationError::Server("temporarily unavailable".to_string()))
    );

    let state = workflow.submit().await;
    assert!(matches!(state, RegistrationState::AwaitingExternalPayment { .. }));

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].body, calls[1].body);
}

#[test]
fn test_submit_while_submitting_is_a_no_op() {
    let backend = Arc::new(ScriptedBackend::default());
    let reply = backend.reply("/create-checkout-session");
    let browser = Arc::new(FakeBrowser::new(true));
    let workflow = registration(&backend, &browser);

    let mut first = tokio_test::task::spawn(workflow.submit());
    assert_pending!(first.poll());
    assert_eq!(workflow.state(), RegistrationState::Submitting);

    let mut second = tokio_test::task::spawn(workflow.submit());
    let state = assert_ready!(second.poll());
    assert_eq!(state, RegistrationState::Submitting);
    assert_eq!(backend.calls().len(), 1);

    reply.send(Ok(json!({"url": "https://pay.example/abc"}))).unwrap();
    let _ = assert_ready!(first.poll());
    assert_eq!(backend.calls().len(), 1);
    assert_eq!(browser.opened(), vec!["https://pay.example/abc".to_string()]);
}

#[tokio::test]
async fn test_backend_rejection_keeps_draft() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.respond_now("/create-checkout-session", Ok(json!({"error": "duplicate relationship"})));
    let browser = Arc::new(FakeBrowser::new(true));
    let workflow = registration(&backend, &browser);
    let before = workflow.draft();

    let state = workflow.submit().await;

    assert_eq!(
        state,
        RegistrationState::SubmitFailed(RegistrationError::Server("duplicate relationship".to_string()))
    );
    assert_eq!(state.notice().as_deref(), Some("duplicate relationship"));
    assert_eq!(workflow.draft(), before);
    assert!(browser.opened().is_empty());

    workflow.update_field(FieldPath::Person2Name, "Bobby Jones");
    assert_eq!(workflow.state(), RegistrationState::Editing);
}

#[tokio::test]
async fn test_unopenable_payment_page() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.respond_now("/create-checkout-session", Ok(json!({"url": "https://pay.example/abc"})));
    let browser = Arc::new(FakeBrowser::new(false));
    let workflow = registration(&backend, &browser);

    let state = workflow.submit().await;

    assert_eq!(state, RegistrationState::SubmitFailed(RegistrationError::CannotOpenPaymentPage));
    assert!(browser.opened().is_empty());
}

#[tokio::test]
async fn test_response_without_url_or_error() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.respond_now("/create-checkout-session", Ok(json!({})));
    let browser = Arc::new(FakeBrowser::new(true));
    let workflow = registration(&backend, &browser);

    let state = workflow.submit().await;

    assert_eq!(
        state,
        RegistrationState::SubmitFailed(RegistrationError::Parse("Failed to create checkout session".to_string()))
    );
}

#[tokio::test]
async fn test_network_failure_returns_to_editable_state() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.respond_now("/create-checkout-session", Err(ApiError::network("connection refused")));
    let browser = Arc::new(FakeBrowser::new(true));
    let workflow = registration(&backend, &browser);

    let state = workflow.submit().await;

    assert!(matches!(state, RegistrationState::SubmitFailed(RegistrationError::Network(_))));
    assert!(state.is_editable());
}

#[tokio::test]
async fn test_edits_ignored_after_checkout_opened() {
    let backend = Arc::new(ScriptedBackend::default());
    backend.respond_now("/create-checkout-session", Ok(json!({"url": "https://pay.example/abc"})));
    let browser = Arc::new(FakeBrowser::new(true));
    let workflow = registration(&backend, &browser);

    workflow.submit().await;
    workflow.update_field(FieldPath::Person1Name, "Someone Else");
    let state = workflow.submit().await;

    assert!(matches!(state, RegistrationState::AwaitingExternalPayment { .. }));
    assert_eq!(workflow.draft().person1.name, " Ann Smith ");
    assert_eq!(backend.calls().len(), 1);

    workflow.reset();
    assert_eq!(workflow.state(), RegistrationState::Editing);
    assert_eq!(workflow.draft(), RelationshipSubmission::default());
}
