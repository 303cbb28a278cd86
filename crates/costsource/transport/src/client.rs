//! Typed client stub, one method per operation.

use crate::frame::{Envelope, Request, Response};
use costsource_types::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

/// Client bound to one in-memory connection.
///
/// Clones share the connection. Each call is bounded by the client timeout
/// and, when set, by a shared deadline; whichever comes first wins.
#[derive(Clone)]
pub struct PluginClient {
    frames: mpsc::Sender<Envelope>,
    closed: Arc<AtomicBool>,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl PluginClient {
    pub(crate) fn new(frames: mpsc::Sender<Envelope>, timeout: Duration) -> Self {
        Self {
            frames,
            closed: Arc::new(AtomicBool::new(false)),
            timeout,
            deadline: None,
        }
    }

    /// Same connection, different per-call timeout.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    /// Same connection, with an absolute deadline shared by every call made
    /// through the returned client (and its clones).
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.frames.is_closed()
    }

    /// Close the connection for this client and all its clones.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn effective_deadline(&self) -> Instant {
        let by_timeout = Instant::now() + self.timeout;
        match self.deadline {
            Some(deadline) if deadline < by_timeout => deadline,
            _ => by_timeout,
        }
    }

    /// Send one request and wait for its answer.
    pub async fn call(&self, request: Request) -> CallResult<Response> {
        let method = request.method();
        if self.closed.load(Ordering::Acquire) {
            return Err(Status::unavailable("client connection closed"));
        }

        let deadline = self.effective_deadline();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.frames
            .send(Envelope {
                request,
                deadline,
                reply: reply_tx,
            })
            .await
            .map_err(|_| Status::unavailable("transport closed"))?;

        match tokio::time::timeout_at(deadline, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Status::unavailable(format!(
                "server dropped {} before answering",
                method
            ))),
            Err(_) => Err(Status::deadline_exceeded(format!(
                "{} exceeded its deadline",
                method
            ))),
        }
    }

    pub async fn name(&self) -> CallResult<String> {
        match self.call(Request::Name).await? {
            Response::Name(name) => Ok(name),
            other => Err(mismatch(Method::Name, &other)),
        }
    }

    pub async fn supports(&self, request: SupportsRequest) -> CallResult<SupportsResponse> {
        match self.call(Request::Supports(request)).await? {
            Response::Supports(resp) => Ok(resp),
            other => Err(mismatch(Method::Supports, &other)),
        }
    }

    pub async fn get_projected_cost(
        &self,
        request: ProjectedCostRequest,
    ) -> CallResult<ProjectedCostResponse> {
        match self.call(Request::ProjectedCost(request)).await? {
            Response::ProjectedCost(resp) => Ok(resp),
            other => Err(mismatch(Method::GetProjectedCost, &other)),
        }
    }

    pub async fn get_actual_cost(
        &self,
        request: ActualCostRequest,
    ) -> CallResult<ActualCostResponse> {
        match self.call(Request::ActualCost(request)).await? {
            Response::ActualCost(resp) => Ok(resp),
            other => Err(mismatch(Method::GetActualCost, &other)),
        }
    }

    pub async fn get_pricing_spec(&self, request: PricingSpecRequest) -> CallResult<PricingSpec> {
        match self.call(Request::PricingSpec(request)).await? {
            Response::PricingSpec(spec) => Ok(spec),
            other => Err(mismatch(Method::GetPricingSpec, &other)),
        }
    }

    pub async fn estimate_cost(
        &self,
        request: EstimateCostRequest,
    ) -> CallResult<EstimateCostResponse> {
        match self.call(Request::EstimateCost(request)).await? {
            Response::EstimateCost(resp) => Ok(resp),
            other => Err(mismatch(Method::EstimateCost, &other)),
        }
    }

    pub async fn get_recommendations(
        &self,
        request: RecommendationsRequest,
    ) -> CallResult<RecommendationsResponse> {
        match self.call(Request::Recommendations(request)).await? {
            Response::Recommendations(resp) => Ok(resp),
            other => Err(mismatch(Method::GetRecommendations, &other)),
        }
    }

    pub async fn get_budgets(&self, request: BudgetsRequest) -> CallResult<BudgetsResponse> {
        match self.call(Request::Budgets(request)).await? {
            Response::Budgets(resp) => Ok(resp),
            other => Err(mismatch(Method::GetBudgets, &other)),
        }
    }

    pub async fn dry_run(&self, request: DryRunRequest) -> CallResult<DryRunResponse> {
        match self.call(Request::DryRun(request)).await? {
            Response::DryRun(resp) => Ok(resp),
            other => Err(mismatch(Method::DryRun, &other)),
        }
    }
}

impl std::fmt::Debug for PluginClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginClient")
            .field("closed", &self.is_closed())
            .field("timeout", &self.timeout)
            .field("deadline", &self.deadline)
            .finish()
    }
}

fn mismatch(expected: Method, got: &Response) -> Status {
    Status::internal(format!(
        "expected {} response, got {}",
        expected,
        got.method()
    ))
}
