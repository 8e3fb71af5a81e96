use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use http::{HeaderMap, HeaderValue};
use url::Url;

use navarro_rs::{
    CheckOutcome, CheckPipeline, Detector, DetectorRegistry, EventHandler, Evidence, MarkerDetector,
    Navarro, NavarroError, ProbeEvent, ProbeHttpClient, ProbeHttpError, ProbeResponse,
    RateLimiter, Session, SessionManager,
};

type Reply = Result<(u16, HeaderMap, String), ProbeHttpError>;

/// Canned transport keyed by URL. Unrouted URLs answer 404.
#[derive(Default)]
struct StubClient {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<String>>,
}

impl StubClient {
    fn new() -> Self {
        Self::default()
    }

    fn page(self, url: &str, status: u16, body: &str) -> Self {
        self.reply(url, Ok((status, HeaderMap::new(), body.to_string())))
    }

    fn fail(self, url: &str, err: ProbeHttpError) -> Self {
        self.reply(url, Err(err))
    }

    fn reply(self, url: &str, reply: Reply) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProbeHttpClient for StubClient {
    async fn get(
        &self,
        _session: &Session,
        url: &Url,
        _timeout: Duration,
    ) -> Result<ProbeResponse, ProbeHttpError> {
        self.requests.lock().unwrap().push(url.to_string());
        let reply = self
            .routes
            .lock()
            .unwrap()
            .get_mut(url.as_str())
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok((404, HeaderMap::new(), String::new())));
        let (status, headers, body) = reply?;
        Ok(ProbeResponse::new(url.clone(), status, headers, body))
    }
}

const PRIMARY: &str = "https://example.test/u/alice";
const FALLBACK: &str = "https://example.test/people/alice";

fn example_detector() -> MarkerDetector {
    MarkerDetector::builder("example", "Example")
        .url("https://example.test/u/{handle}")
        .url("https://example.test/people/{handle}")
        .found(Evidence::all([Evidence::status(200), Evidence::marker("profile-card")]))
        .not_found(Evidence::any([Evidence::status(404), Evidence::marker("no such user")]))
        .build()
}

fn single_url_detector(key: &str) -> MarkerDetector {
    MarkerDetector::builder(key, key.to_uppercase())
        .url(format!("https://{key}.test/{{handle}}"))
        .found(Evidence::all([Evidence::status(200), Evidence::marker("profile-card")]))
        .build()
}

fn registry_of(detectors: Vec<Arc<dyn Detector>>) -> DetectorRegistry {
    DetectorRegistry::from_detectors(detectors)
}

fn navarro_with(stub: Arc<StubClient>, registry: DetectorRegistry) -> Navarro {
    Navarro::builder()
        .with_client(stub)
        .with_registry(registry)
        .with_handle_delay(Duration::ZERO, Duration::ZERO)
        .build()
        .unwrap()
}

fn example_navarro(stub: Arc<StubClient>) -> Navarro {
    navarro_with(stub, registry_of(vec![Arc::new(example_detector())]))
}

#[tokio::test]
async fn found_reports_profile_url_and_records_request() {
    let stub = Arc::new(StubClient::new().page(PRIMARY, 200, "<div class=profile-card>"));
    let navarro = example_navarro(stub.clone());

    let report = navarro.check_target("example", "alice").await.unwrap();
    assert_eq!(report.outcome, CheckOutcome::Found);
    assert_eq!(report.profile_url.as_deref(), Some(PRIMARY));
    assert_eq!(stub.requests(), [PRIMARY]);

    let state = navarro.limiter().snapshot("example").unwrap();
    assert_eq!(state.count, 1);
    assert!(state.last_request.is_some());
    assert!((state.delay_secs - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn not_found_on_404_has_no_profile_url() {
    let stub = Arc::new(StubClient::new().page(PRIMARY, 404, ""));
    let navarro = example_navarro(stub.clone());

    let report = navarro.check_target("example", "alice").await.unwrap();
    assert_eq!(report.outcome, CheckOutcome::NotFound);
    assert!(report.profile_url.is_none());
    assert_eq!(stub.requests(), [PRIMARY, FALLBACK]);
}

#[tokio::test]
async fn ambiguous_first_url_falls_through_to_second() {
    let stub = Arc::new(
        StubClient::new()
            .page(PRIMARY, 200, "<html>login wall</html>")
            .page(FALLBACK, 200, "profile-card"),
    );
    let navarro = example_navarro(stub.clone());

    let report = navarro.check_target("example", "alice").await.unwrap();
    assert_eq!(report.outcome, CheckOutcome::Found);
    assert_eq!(stub.requests(), [PRIMARY, FALLBACK]);
    assert_eq!(navarro.limiter().snapshot("example").unwrap().count, 2);
}

#[tokio::test]
async fn exhausted_urls_without_evidence_are_not_found() {
    let stub = Arc::new(
        StubClient::new()
            .page(PRIMARY, 200, "<html></html>")
            .page(FALLBACK, 200, "<html></html>"),
    );
    let navarro = example_navarro(stub);

    let report = navarro.check_target("example", "alice").await.unwrap();
    assert_eq!(report.outcome, CheckOutcome::NotFound);
}

#[tokio::test]
async fn not_found_evidence_wins_over_found() {
    let stub = Arc::new(StubClient::new().page(PRIMARY, 200, "profile-card ... no such user"));
    let navarro = example_navarro(stub.clone());

    let report = navarro.check_target("example", "alice").await.unwrap();
    assert_eq!(report.outcome, CheckOutcome::NotFound);
    assert_eq!(stub.requests(), [PRIMARY]);
}

#[tokio::test]
async fn throttling_beats_found_markers_and_applies_penalty() {
    let stub = Arc::new(StubClient::new().page(PRIMARY, 429, "profile-card"));
    let navarro = example_navarro(stub.clone());

    let report = navarro.check_target("example", "alice").await.unwrap();
    assert_eq!(report.outcome, CheckOutcome::RateLimited);
    assert!(report.profile_url.is_none());
    assert_eq!(stub.requests(), [PRIMARY]);

    let state = navarro.limiter().snapshot("example").unwrap();
    assert!((state.delay_secs - 1.0).abs() < 1e-9);
    assert!(state.is_penalized_at(Utc::now()));
    let wait = navarro.limiter().should_wait("example");
    assert!(wait > Duration::from_secs(55) && wait <= Duration::from_secs(60));
}

#[tokio::test]
async fn throttle_header_on_200_is_rate_limited() {
    let mut headers = HeaderMap::new();
    headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
    let stub = Arc::new(StubClient::new().reply(PRIMARY, Ok((200, headers, "profile-card".into()))));
    let navarro = example_navarro(stub);

    let report = navarro.check_target("example", "alice").await.unwrap();
    assert_eq!(report.outcome, CheckOutcome::RateLimited);
}

#[tokio::test]
async fn timeout_is_reported_and_not_recorded() {
    let stub = Arc::new(StubClient::new().fail(PRIMARY, ProbeHttpError::Timeout(Duration::from_secs(8))));
    let navarro = example_navarro(stub.clone());

    let report = navarro.check_target("example", "alice").await.unwrap();
    assert_eq!(report.outcome, CheckOutcome::Timeout);
    // A transport failure ends the check without trying the fallback.
    assert_eq!(stub.requests(), [PRIMARY]);

    let state = navarro.limiter().snapshot("example").unwrap();
    assert_eq!(state.count, 0);
    assert!(state.last_request.is_none());
}

#[tokio::test]
async fn transport_errors_map_to_outcomes() {
    let stub = Arc::new(
        StubClient::new()
            .fail(PRIMARY, ProbeHttpError::Connect("refused".into()))
            .fail(PRIMARY, ProbeHttpError::Transport("body decode".into())),
    );
    let navarro = example_navarro(stub);

    let first = navarro.check_target("example", "alice").await.unwrap();
    assert_eq!(first.outcome, CheckOutcome::NetworkError);
    let second = navarro.check_target("example", "alice").await.unwrap();
    assert_eq!(second.outcome, CheckOutcome::UnknownError);
}

#[tokio::test]
async fn invalid_handle_never_reaches_the_network() {
    let stub = Arc::new(StubClient::new());
    let pipeline = CheckPipeline::new(
        Arc::new(RateLimiter::in_memory()),
        Arc::new(SessionManager::default()),
        stub.clone(),
    );

    let detector = example_detector();
    let too_long = "a".repeat(65);
    for handle in ["", "bad handle", "émile", too_long.as_str()] {
        assert_eq!(pipeline.check(&detector, handle).await, CheckOutcome::UnknownError);
    }
    assert!(stub.requests().is_empty());
    assert!(pipeline.sessions().is_empty());

    let navarro = example_navarro(stub.clone());
    let err = navarro.check_handle("bad handle", &[] as &[&str]).await.unwrap_err();
    assert!(matches!(err, NavarroError::InvalidHandle(_)));
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn sixty_four_characters_is_accepted() {
    let handle = "a".repeat(64);
    let url = format!("https://example.test/u/{handle}");
    let stub = Arc::new(StubClient::new().page(&url, 200, "profile-card"));
    let navarro = example_navarro(stub);

    let report = navarro.check_target("example", &handle).await.unwrap();
    assert_eq!(report.outcome, CheckOutcome::Found);
}

#[tokio::test]
async fn mastodon_skips_unreachable_instances() {
    let stub = Arc::new(
        StubClient::new()
            .fail("https://mastodon.social/@alice", ProbeHttpError::Connect("reset".into()))
            .page("https://hachyderm.io/@alice", 200, "<span>@alice@hachyderm.io</span>"),
    );
    let navarro = navarro_with(stub.clone(), DetectorRegistry::builtin());

    let report = navarro.check_target("mastodon", "alice").await.unwrap();
    assert_eq!(report.outcome, CheckOutcome::Found);
    assert_eq!(
        stub.requests(),
        ["https://mastodon.social/@alice", "https://hachyderm.io/@alice"]
    );
    // Only the answered request is recorded.
    assert_eq!(navarro.limiter().snapshot("mastodon").unwrap().count, 1);
}

#[tokio::test]
async fn mastodon_with_no_answers_is_inconclusive() {
    let stub = Arc::new(
        StubClient::new()
            .fail("https://mastodon.social/@alice", ProbeHttpError::Connect("reset".into()))
            .fail("https://hachyderm.io/@alice", ProbeHttpError::Connect("reset".into()))
            .fail("https://infosec.exchange/@alice", ProbeHttpError::Timeout(Duration::from_secs(8))),
    );
    let navarro = navarro_with(stub.clone(), DetectorRegistry::builtin());

    let report = navarro.check_target("mastodon", "alice").await.unwrap();
    assert_eq!(report.outcome, CheckOutcome::Timeout);
    assert_eq!(stub.requests().len(), 3);
}

#[tokio::test]
async fn handle_report_keeps_registry_order() {
    let stub = Arc::new(
        StubClient::new()
            .page("https://github.com/alice", 200, r#"{"login":"alice"}"#)
            .page("https://gitlab.com/alice", 404, ""),
    );
    let navarro = navarro_with(stub, DetectorRegistry::builtin());

    let report = navarro.check_handle("alice", &["GitLab", "github"]).await.unwrap();
    let keys: Vec<_> = report.results.iter().map(|r| r.target.as_str()).collect();
    assert_eq!(keys, ["github", "gitlab"]);
    assert_eq!(report.summary().found, 1);
    assert_eq!(report.summary().not_found, 1);
}

#[tokio::test]
async fn unknown_filters_fail_before_any_request() {
    let stub = Arc::new(StubClient::new());
    let navarro = navarro_with(stub.clone(), DetectorRegistry::builtin());

    let err = navarro
        .check_handle("alice", &["github", "myspace", "friendster"])
        .await
        .unwrap_err();
    match err {
        NavarroError::UnknownTargets(unknown) => assert_eq!(unknown, ["myspace", "friendster"]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn batch_skips_invalid_handles() {
    let stub = Arc::new(
        StubClient::new()
            .page("https://example.test/u/alice", 200, "profile-card")
            .page("https://example.test/u/bob", 404, ""),
    );
    let navarro = example_navarro(stub);

    let mut seen = Vec::new();
    let reports = navarro
        .check_handles_with(&["alice", "not valid", "bob"], &[] as &[&str], |report| {
            seen.push(report.handle.clone())
        })
        .await
        .unwrap();
    assert_eq!(seen, ["alice", "bob"]);
    assert_eq!(reports[0].results[0].outcome, CheckOutcome::Found);
    assert_eq!(reports[1].results[0].outcome, CheckOutcome::NotFound);
}

#[tokio::test]
async fn parallel_targets_keep_order() {
    let stub = Arc::new(
        StubClient::new()
            .page("https://alpha.test/alice", 200, "profile-card")
            .fail("https://beta.test/alice", ProbeHttpError::Timeout(Duration::from_secs(1)))
            .page("https://gamma.test/alice", 404, ""),
    );
    let registry = registry_of(vec![
        Arc::new(single_url_detector("alpha")),
        Arc::new(single_url_detector("beta")),
        Arc::new(single_url_detector("gamma")),
    ]);
    let navarro = Navarro::builder()
        .with_client(stub.clone())
        .with_registry(registry)
        .with_max_parallel_targets(3)
        .build()
        .unwrap();

    let report = navarro.check_handle("alice", &[] as &[&str]).await.unwrap();
    let outcomes: Vec<_> = report.results.iter().map(|r| (r.target.as_str(), r.outcome)).collect();
    assert_eq!(
        outcomes,
        [
            ("alpha", CheckOutcome::Found),
            ("beta", CheckOutcome::Timeout),
            ("gamma", CheckOutcome::NotFound),
        ]
    );
    assert_eq!(stub.requests().len(), 3);
}

struct OutcomeRecorder(Mutex<Vec<(String, CheckOutcome)>>);

impl EventHandler for OutcomeRecorder {
    fn handle(&self, event: &ProbeEvent) {
        if let ProbeEvent::Outcome(outcome) = event {
            self.0
                .lock()
                .unwrap()
                .push((outcome.target.clone(), outcome.outcome));
        }
    }
}

#[tokio::test]
async fn events_and_metrics_see_every_check() {
    let stub = Arc::new(StubClient::new().page(PRIMARY, 429, ""));
    let recorder = Arc::new(OutcomeRecorder(Mutex::new(Vec::new())));
    let navarro = Navarro::builder()
        .with_client(stub)
        .with_registry(registry_of(vec![Arc::new(example_detector())]))
        .with_event_handler(recorder.clone())
        .build()
        .unwrap();

    navarro.check_target("example", "alice").await.unwrap();
    assert_eq!(
        *recorder.0.lock().unwrap(),
        [("example".to_string(), CheckOutcome::RateLimited)]
    );

    let snapshot = navarro.metrics().unwrap().snapshot();
    let stats = snapshot.target("example").unwrap();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.throttled, 1);
    assert_eq!(stats.outcome_count(CheckOutcome::RateLimited), 1);
}

#[tokio::test]
async fn limiter_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("rate_limits.json");

    let stub = Arc::new(StubClient::new().page(PRIMARY, 429, ""));
    let navarro = Navarro::builder()
        .with_client(stub)
        .with_registry(registry_of(vec![Arc::new(example_detector())]))
        .with_state_path(&path)
        .build()
        .unwrap();
    navarro.check_target("example", "alice").await.unwrap();
    navarro.close();

    let restored = RateLimiter::with_store(&path);
    let state = restored.snapshot("example").unwrap();
    assert_eq!(state.count, 1);
    assert!((state.delay_secs - 1.0).abs() < 1e-9);
    assert!(state.is_penalized_at(Utc::now()));
}
