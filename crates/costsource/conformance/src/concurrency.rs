//! Parallel fan-out through one harness connection.

use crate::config::ProbeConfig;
use crate::error::ConcurrencyError;
use crate::result::TestResult;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use costsource_transport::{PluginClient, Request, Response};
use costsource_types::*;
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Issues one call of a given method.
pub type Invoker =
    Arc<dyn Fn(PluginClient) -> BoxFuture<'static, CallResult<Response>> + Send + Sync>;

/// Method to invoker table used for fan-out.
#[derive(Clone, Default)]
pub struct InvokerTable {
    invokers: HashMap<Method, Invoker>,
}

impl InvokerTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Invokers for the core operations plus `EstimateCost`, all aimed at
    /// the probe resource.
    pub fn standard(probe: &ProbeConfig) -> Self {
        let mut table = Self::empty();
        let resource = probe.resource();
        let resource_id = probe.resource_id.clone();

        table.register_request(Method::Name, Request::Name);
        table.register_request(
            Method::Supports,
            Request::Supports(SupportsRequest {
                resource: Some(resource.clone()),
            }),
        );
        table.register_request(
            Method::GetProjectedCost,
            Request::ProjectedCost(ProjectedCostRequest {
                resource: Some(resource.clone()),
            }),
        );
        table.register_request(
            Method::GetPricingSpec,
            Request::PricingSpec(PricingSpecRequest {
                resource: Some(resource.clone()),
            }),
        );
        table.register_request(
            Method::EstimateCost,
            Request::EstimateCost(EstimateCostRequest {
                resource_type: format!("{}/{}", resource.provider, resource.resource_type),
                ..Default::default()
            }),
        );

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single();
        if let Some(start) = start {
            table.register_request(
                Method::GetActualCost,
                Request::ActualCost(ActualCostRequest::new(
                    resource_id,
                    start,
                    start + ChronoDuration::hours(24),
                )),
            );
        }
        table
    }

    pub fn register(&mut self, method: Method, invoker: Invoker) {
        self.invokers.insert(method, invoker);
    }

    /// Register an invoker that always sends `request`.
    pub fn register_request(&mut self, method: Method, request: Request) {
        self.register(
            method,
            Arc::new(move |client: PluginClient| {
                let request = request.clone();
                async move { client.call(request).await }.boxed()
            }),
        );
    }

    pub fn get(&self, method: Method) -> Option<&Invoker> {
        self.invokers.get(&method)
    }

    pub fn methods(&self) -> Vec<Method> {
        let mut methods: Vec<_> = self.invokers.keys().copied().collect();
        methods.sort();
        methods
    }
}

impl std::fmt::Debug for InvokerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvokerTable")
            .field("methods", &self.methods())
            .finish()
    }
}

/// Fans identical calls out across tokio tasks and checks the aggregate.
#[derive(Debug, Clone)]
pub struct ConcurrencyValidator {
    table: InvokerTable,
    timeout: Duration,
}

impl ConcurrencyValidator {
    /// `timeout` bounds the whole fan-out: every worker shares one deadline.
    pub fn new(table: InvokerTable, timeout: Duration) -> Self {
        Self { table, timeout }
    }

    pub fn table(&self) -> &InvokerTable {
        &self.table
    }

    /// Run `width` concurrent calls of `method` and join them all.
    ///
    /// Returns one result per worker, in completion order, and an error when
    /// any worker failed.
    pub async fn run_parallel(
        &self,
        client: &PluginClient,
        width: usize,
        method: Method,
    ) -> (Vec<TestResult>, Result<(), ConcurrencyError>) {
        let (results, _) = match self.fan_out(client, width, method).await {
            Ok(outcome) => outcome,
            Err(e) => return (Vec::new(), Err(e)),
        };

        let failed = results.iter().filter(|r| !r.success).count();
        if failed > 0 {
            tracing::warn!(method = %method, failed, width, "Parallel calls failed");
            return (results, Err(ConcurrencyError::Failures { failed, width }));
        }
        (results, Ok(()))
    }

    /// `width` simultaneous identity calls must all succeed with equal
    /// answers. A divergence is reported, never retried.
    pub async fn validate_consistent_responses(
        &self,
        client: &PluginClient,
        width: usize,
    ) -> Result<(), ConcurrencyError> {
        let (results, responses) = self.fan_out(client, width, Method::Name).await?;

        let failed = results.iter().filter(|r| !r.success).count();
        if failed > 0 {
            return Err(ConcurrencyError::Failures { failed, width });
        }

        let mut distinct: Vec<&Response> = Vec::new();
        for response in &responses {
            if !distinct.contains(&response) {
                distinct.push(response);
            }
        }
        if distinct.len() > 1 {
            tracing::warn!(distinct = distinct.len(), width, "Identical calls diverged");
            return Err(ConcurrencyError::Inconsistent {
                distinct: distinct.len(),
                width,
            });
        }
        Ok(())
    }

    async fn fan_out(
        &self,
        client: &PluginClient,
        width: usize,
        method: Method,
    ) -> Result<(Vec<TestResult>, Vec<Response>), ConcurrencyError> {
        if width == 0 {
            return Err(ConcurrencyError::InvalidWidth(width));
        }
        let invoker = self
            .table
            .get(method)
            .cloned()
            .ok_or(ConcurrencyError::UnsupportedMethod(method))?;

        let bounded = client.with_deadline(Instant::now() + self.timeout);
        let mut workers = JoinSet::new();
        for _ in 0..width {
            let invoker = invoker.clone();
            let client = bounded.clone();
            workers.spawn(async move {
                let started = std::time::Instant::now();
                let outcome = invoker(client).await;
                (outcome, started.elapsed())
            });
        }

        let mut results = Vec::with_capacity(width);
        let mut responses = Vec::with_capacity(width);
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((Ok(response), elapsed)) => {
                    responses.push(response);
                    results.push(TestResult::pass(method.as_str(), elapsed));
                }
                Ok((Err(status), elapsed)) => {
                    results.push(TestResult::from_status(method.as_str(), &status, elapsed));
                }
                Err(e) => {
                    results.push(TestResult::fail(
                        method.as_str(),
                        format!("worker did not finish: {}", e),
                        Duration::ZERO,
                    ));
                }
            }
        }
        Ok((results, responses))
    }
}
