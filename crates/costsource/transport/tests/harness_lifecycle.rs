use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use costsource_transport::{HarnessError, InProcessHarness, Request, Response};
use costsource_types::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Minimal plugin: fixed name, slow pricing spec, panicking projected cost.
struct StubPlugin {
    name: String,
    spec_delay: Duration,
    calls: AtomicUsize,
}

impl StubPlugin {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            spec_delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    fn slow(name: &str, delay: Duration) -> Self {
        Self {
            spec_delay: delay,
            ..Self::new(name)
        }
    }
}

#[async_trait]
impl CostSource for StubPlugin {
    async fn name(&self) -> CallResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.name.clone())
    }

    async fn supports(&self, request: SupportsRequest) -> CallResult<SupportsResponse> {
        Ok(match request.resource {
            Some(r) if r.provider == "aws" => SupportsResponse::supported(),
            _ => SupportsResponse::unsupported("only aws"),
        })
    }

    async fn get_projected_cost(
        &self,
        _request: ProjectedCostRequest,
    ) -> CallResult<ProjectedCostResponse> {
        panic!("projected cost exploded");
    }

    async fn get_actual_cost(&self, request: ActualCostRequest) -> CallResult<ActualCostResponse> {
        if request.end <= request.start {
            return Err(Status::invalid_argument("end must be after start"));
        }
        Ok(ActualCostResponse::default())
    }

    async fn get_pricing_spec(&self, _request: PricingSpecRequest) -> CallResult<PricingSpec> {
        tokio::time::sleep(self.spec_delay).await;
        Ok(PricingSpec {
            provider: "aws".into(),
            resource_type: "ec2".into(),
            sku: String::new(),
            region: String::new(),
            billing_mode: BillingMode::PerHour,
            rate_per_unit: 0.1,
            currency: "USD".into(),
            unit: "hour".into(),
            description: "stub".into(),
            assumptions: vec!["stub".into()],
            source: "stub".into(),
        })
    }
}

#[tokio::test]
async fn start_returns_usable_client() {
    let mut harness = InProcessHarness::new(Arc::new(StubPlugin::new("stub")));
    let client = harness.start().await.expect("harness should start");

    assert!(harness.is_running());
    assert_eq!(client.name().await.unwrap(), "stub");

    let resp = client
        .supports(SupportsRequest {
            resource: Some(ResourceDescriptor::new("aws", "ec2")),
        })
        .await
        .unwrap();
    assert!(resp.supported);

    harness.stop().await;
}

#[tokio::test]
async fn stop_is_idempotent_and_safe_before_start() {
    let mut never_started = InProcessHarness::new(Arc::new(StubPlugin::new("idle")));
    never_started.stop().await;
    never_started.stop().await;
    assert!(!never_started.is_running());

    let mut harness = InProcessHarness::new(Arc::new(StubPlugin::new("stub")));
    harness.start().await.unwrap();
    harness.stop().await;
    harness.stop().await;
    assert!(!harness.is_running());
}

#[tokio::test]
async fn calls_after_stop_are_unavailable() {
    let mut harness = InProcessHarness::new(Arc::new(StubPlugin::new("stub")));
    let client = harness.start().await.unwrap();
    harness.stop().await;

    let err = client.name().await.expect_err("connection is closed");
    assert_eq!(err.code, Code::Unavailable);
    assert!(client.is_closed());
}

#[tokio::test]
async fn builder_without_service_is_a_configuration_error() {
    let err = InProcessHarness::builder()
        .default_timeout(Duration::from_secs(1))
        .build()
        .expect_err("no service supplied");
    assert!(matches!(err, HarnessError::MissingService));
}

#[tokio::test]
async fn second_start_is_rejected() {
    let mut harness = InProcessHarness::new(Arc::new(StubPlugin::new("stub")));
    harness.start().await.unwrap();
    let err = harness.start().await.expect_err("already running");
    assert!(matches!(err, HarnessError::AlreadyStarted));
    harness.stop().await;
}

#[tokio::test]
async fn harness_can_restart_after_stop() {
    let mut harness = InProcessHarness::new(Arc::new(StubPlugin::new("stub")));
    harness.start().await.unwrap();
    harness.stop().await;
    let client = harness.start().await.expect("fresh listener on restart");
    assert_eq!(client.name().await.unwrap(), "stub");
    harness.stop().await;
}

#[tokio::test]
async fn slow_call_is_cut_off_at_deadline() {
    let plugin = StubPlugin::slow("slow", Duration::from_secs(10));
    let mut harness = InProcessHarness::new(Arc::new(plugin));
    let client = harness.start().await.unwrap();

    let started = std::time::Instant::now();
    let err = client
        .with_timeout(Duration::from_millis(50))
        .get_pricing_spec(PricingSpecRequest::default())
        .await
        .expect_err("delay exceeds deadline");

    assert!(err.is_deadline_exceeded());
    assert!(started.elapsed() < Duration::from_secs(5));
    harness.stop().await;
}

#[tokio::test]
async fn shared_deadline_applies_to_clones() {
    let plugin = StubPlugin::slow("slow", Duration::from_secs(10));
    let mut harness = InProcessHarness::new(Arc::new(plugin));
    let client = harness.start().await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_millis(50);
    let bounded = client.with_deadline(deadline);
    let clone = bounded.clone();

    let err = clone
        .get_pricing_spec(PricingSpecRequest::default())
        .await
        .unwrap_err();
    assert!(err.is_deadline_exceeded());
    harness.stop().await;
}

#[tokio::test]
async fn handler_panic_becomes_internal_status() {
    let mut harness = InProcessHarness::new(Arc::new(StubPlugin::new("stub")));
    let client = harness.start().await.unwrap();

    let err = client
        .get_projected_cost(ProjectedCostRequest::default())
        .await
        .expect_err("handler panics");
    assert_eq!(err.code, Code::Internal);

    // The server keeps serving after a handler panic.
    assert_eq!(client.name().await.unwrap(), "stub");
    harness.stop().await;
}

#[tokio::test]
async fn service_errors_pass_through() {
    let mut harness = InProcessHarness::new(Arc::new(StubPlugin::new("stub")));
    let client = harness.start().await.unwrap();

    let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let err = client
        .get_actual_cost(ActualCostRequest::new("i-1", t, t))
        .await
        .unwrap_err();
    assert_eq!(err.code, Code::InvalidArgument);

    let err = client
        .get_budgets(BudgetsRequest::default())
        .await
        .unwrap_err();
    assert!(err.is_unimplemented());
    harness.stop().await;
}

#[tokio::test]
async fn harnesses_are_isolated() {
    let mut a = InProcessHarness::new(Arc::new(StubPlugin::new("alpha")));
    let mut b = InProcessHarness::new(Arc::new(StubPlugin::new("beta")));
    let client_a = a.start().await.unwrap();
    let client_b = b.start().await.unwrap();

    assert_eq!(client_a.name().await.unwrap(), "alpha");
    assert_eq!(client_b.name().await.unwrap(), "beta");

    a.stop().await;
    // Stopping one harness leaves the other serving.
    assert_eq!(client_b.name().await.unwrap(), "beta");
    b.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_on_one_connection() {
    let plugin = Arc::new(StubPlugin::new("stub"));
    let mut harness = InProcessHarness::new(plugin.clone());
    let client = harness.start().await.unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..32 {
        let client = client.clone();
        tasks.spawn(async move { client.call(Request::Name).await });
    }
    while let Some(joined) = tasks.join_next().await {
        assert_eq!(joined.unwrap().unwrap(), Response::Name("stub".into()));
    }
    assert_eq!(plugin.calls.load(Ordering::SeqCst), 32);
    harness.stop().await;
}

#[tokio::test]
async fn extra_connections_share_the_server() {
    let mut harness = InProcessHarness::new(Arc::new(StubPlugin::new("stub")));
    harness.start().await.unwrap();
    let second = harness.connect().await.expect("second client");
    assert_eq!(second.name().await.unwrap(), "stub");
    harness.stop().await;

    assert!(second.name().await.is_err());
}

#[tokio::test]
async fn legacy_plugin_reports_unimplemented() {
    let mut harness = InProcessHarness::new(Arc::new(UnimplementedCostSource::new("legacy")));
    let client = harness.start().await.unwrap();
    assert_eq!(client.name().await.unwrap(), "legacy");
    let err = client
        .get_pricing_spec(PricingSpecRequest::default())
        .await
        .unwrap_err();
    assert!(err.is_unimplemented());
    harness.stop().await;
}
