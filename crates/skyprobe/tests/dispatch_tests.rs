//! Coordinator behaviour with scripted invokers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use skyprobe::reporter::{MemorySink, SlackNotifier};
use skyprobe::{
    Coordinator, DispatchSettings, HttpInvoker, Invocation, Invoker, LocalInvoker, Method, ProbeError,
    ProberKind, Region, Reporter, Resolver, Target, Template,
};
use tokio::time::Instant;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Records every call; targets containing "fail" error and "panic" panic
#[derive(Default)]
struct ScriptedInvoker {
    calls: Mutex<Vec<(String, String, Instant)>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedInvoker {
    fn with_delay(delay: Duration) -> Self {
        Self { delay, ..Default::default() }
    }

    fn calls(&self) -> Vec<(String, String, Instant)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Invoker for ScriptedInvoker {
    async fn invoke(&self, region: &str, invocation: &Invocation) -> Result<(), ProbeError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        self.calls.lock().unwrap().push((region.to_string(), invocation.target.clone(), Instant::now()));
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if invocation.target.contains("panic") {
            panic!("worker crashed");
        }
        if invocation.target.contains("fail") {
            return Err(ProbeError::Network("connection refused".to_string()));
        }
        Ok(())
    }
}

fn template(interval: u64, regions: &[&str], urls: &[&str]) -> Template {
    Template {
        name: "health".to_string(),
        interval: Some(interval),
        timeout: None,
        slack_urls: Vec::new(),
        targets: urls.iter().map(|url| Target::new(*url, Method::Get)).collect(),
        regions: regions.iter().map(|id| Region::new(*id)).collect(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_every_job_yields_one_outcome() {
    let plan = Resolver::new()
        .resolve(&template(
            30,
            &["us-east-1", "eu-west-1"],
            &["https://a.example.com", "https://fail.example.com", "https://panic.example.com"],
        ))
        .unwrap();
    let invoker = Arc::new(ScriptedInvoker::default());

    let report = Coordinator::new(invoker.clone(), DispatchSettings::default()).run_pass(&plan).await;

    assert_eq!(plan.job_count(), 6);
    assert_eq!(report.outcomes.len(), 6);
    assert_eq!(report.success_count(), 2);
    assert_eq!(report.failure_count(), 4);
    assert!(report.failures().any(|outcome| matches!(
        &outcome.result,
        Err(ProbeError::Dispatch(message)) if message.contains("worker crashed")
    )));
    assert_eq!(invoker.calls().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_two_region_scenario_paces_59_seconds() {
    let plan = Resolver::new()
        .resolve(&template(120, &["us-east-1", "eu-west-1"], &["https://a.example.com"]))
        .unwrap();
    assert_eq!(plan.job_count(), 2);

    let invoker = Arc::new(ScriptedInvoker::default());
    let started = Instant::now();
    let report = Coordinator::new(invoker.clone(), DispatchSettings::default()).run_pass(&plan).await;

    assert_eq!(report.pacing.interval, Duration::from_secs(59));
    assert!(!report.pacing.degenerate);

    let calls = invoker.calls();
    assert_eq!(calls[0].0, "us-east-1");
    assert_eq!(calls[1].0, "eu-west-1");
    assert_eq!(calls[1].2 - calls[0].2, Duration::from_secs(59));
    // No pause after the final batch
    assert!(started.elapsed() < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_batches_run_in_region_order() {
    let plan = Resolver::new()
        .resolve(&template(
            10,
            &["us-east-1", "eu-west-1", "ap-south-1"],
            &["https://a.example.com", "https://b.example.com"],
        ))
        .unwrap();
    let invoker = Arc::new(ScriptedInvoker::with_delay(Duration::from_millis(50)));

    Coordinator::new(invoker.clone(), DispatchSettings::default()).run_pass(&plan).await;

    let regions: Vec<String> = invoker.calls().into_iter().map(|(region, _, _)| region).collect();
    assert_eq!(regions, ["us-east-1", "us-east-1", "eu-west-1", "eu-west-1", "ap-south-1", "ap-south-1"]);
}

#[tokio::test(start_paused = true)]
async fn test_degenerate_pacing_runs_back_to_back() {
    let plan = Resolver::new()
        .resolve(&template(1, &["us-east-1", "eu-west-1"], &["https://a.example.com"]))
        .unwrap();
    let invoker = Arc::new(ScriptedInvoker::default());

    let report = Coordinator::new(invoker.clone(), DispatchSettings::default()).run_pass(&plan).await;

    assert!(report.pacing.degenerate);
    assert_eq!(report.pacing.interval, Duration::ZERO);
    assert_eq!(report.outcomes.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_is_bounded() {
    let urls: Vec<String> = (0..8).map(|i| format!("https://{i}.example.com")).collect();
    let urls: Vec<&str> = urls.iter().map(String::as_str).collect();
    let plan = Resolver::new().resolve(&template(60, &["us-east-1"], &urls)).unwrap();
    let invoker = Arc::new(ScriptedInvoker::with_delay(Duration::from_millis(100)));

    let report = Coordinator::new(invoker.clone(), DispatchSettings { concurrency: 2 }).run_pass(&plan).await;

    assert_eq!(report.outcomes.len(), 8);
    assert_eq!(invoker.max_in_flight.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_passes_are_consistent() {
    let plan = Resolver::new()
        .resolve(&template(4, &["us-east-1", "eu-west-1"], &["https://a.example.com", "https://fail.example.com"]))
        .unwrap();
    let coordinator = Coordinator::new(Arc::new(ScriptedInvoker::default()), DispatchSettings::default());

    let first = coordinator.run_pass(&plan).await;
    let second = coordinator.run_pass(&plan).await;

    let summary = |report: &skyprobe::PassReport| {
        let mut outcomes: Vec<(String, String, bool)> = report
            .outcomes
            .iter()
            .map(|outcome| (outcome.region.clone(), outcome.target.clone(), outcome.is_success()))
            .collect();
        outcomes.sort();
        outcomes
    };
    assert_eq!(summary(&first), summary(&second));
}

#[tokio::test]
async fn test_http_invoker_posts_payload_to_worker() {
    let worker = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/invoke"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})))
        .expect(1)
        .mount(&worker)
        .await;
    let failing = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/invoke"))
        .respond_with(ResponseTemplate::new(502).set_body_json(serde_json::json!({"error": "boom"})))
        .mount(&failing)
        .await;

    let endpoints = [
        ("us-east-1".to_string(), worker.uri()),
        ("eu-west-1".to_string(), format!("{}/", failing.uri())),
    ]
    .into_iter()
    .collect();
    let invoker = Arc::new(HttpInvoker::new(endpoints, Duration::from_secs(5)).unwrap());
    let plan = Resolver::new()
        .resolve(&template(2, &["us-east-1", "eu-west-1"], &["https://a.example.com"]))
        .unwrap();
    invoker.check_coverage(&plan).unwrap();

    let report = Coordinator::new(invoker, DispatchSettings::default()).run_pass(&plan).await;

    assert_eq!(report.success_count(), 1);
    let failure = report.failures().next().unwrap();
    assert_eq!(failure.region, "eu-west-1");
    assert!(matches!(&failure.result, Err(ProbeError::Dispatch(message)) if message.contains("boom")));

    let requests = worker.received_requests().await.unwrap();
    let payload: Invocation = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(payload.target, "https://a.example.com");
    assert_eq!(payload.timeout, skyprobe::DEFAULT_TIMEOUT_SECS);
}

#[test]
fn test_missing_worker_endpoint_is_configuration_error() {
    let invoker = HttpInvoker::new(Default::default(), Duration::from_secs(5)).unwrap();
    let plan = Resolver::new()
        .resolve(&template(60, &["us-east-1"], &["https://a.example.com"]))
        .unwrap();

    assert!(matches!(invoker.check_coverage(&plan), Err(ProbeError::Configuration(_))));
}

#[tokio::test]
async fn test_worker_call_outlives_short_client_timeout() {
    let worker = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/invoke"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"status": "ok"}))
                .set_delay(Duration::from_secs(2)),
        )
        .expect(1)
        .mount(&worker)
        .await;

    let endpoints = [("us-east-1".to_string(), worker.uri())].into_iter().collect();
    let invoker = HttpInvoker::new(endpoints, Duration::from_secs(1)).unwrap();
    let invocation = Invocation::for_target(&Target::new("https://example.com", Method::Get), 5, &[]);

    assert_eq!(invoker.request_timeout(&invocation), Duration::from_secs(15));
    invoker.invoke("us-east-1", &invocation).await.unwrap();
}

#[test]
fn test_worker_call_timeout_never_drops_below_configured() {
    let invoker = HttpInvoker::new(Default::default(), Duration::from_secs(60)).unwrap();
    let default = Invocation::for_target(&Target::new("https://example.com", Method::Get), 0, &[]);
    let slow = Invocation::for_target(&Target::new("https://example.com", Method::Get), 120, &[]);

    assert_eq!(invoker.request_timeout(&default), Duration::from_secs(60));
    assert_eq!(invoker.request_timeout(&slow), Duration::from_secs(130));
}

#[tokio::test]
async fn test_local_pass_traces_and_persists() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let sink = Arc::new(MemorySink::new());
    let reporter = Reporter::new(Arc::new(SlackNotifier::new().unwrap()), sink.clone());
    let invoker = Arc::new(LocalInvoker::new(ProberKind::Tracer, reporter));
    let url = format!("{}/ping", server.uri());
    let plan = Resolver::new().resolve(&template(60, &["us-east-1"], &[url.as_str(), url.as_str()])).unwrap();

    let report = Coordinator::new(invoker, DispatchSettings::default()).run_pass(&plan).await;

    assert!(report.is_success(), "{report}");
    assert_eq!(sink.records().len(), 2);
}
