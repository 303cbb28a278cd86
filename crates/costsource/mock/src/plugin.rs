//! The mock [`CostSource`].

use crate::catalog::{PricingEntry, ResourceClass};
use crate::config::{MockConfig, MockPluginBuilder, MAX_DATA_POINTS};
use crate::injection::{CallCounters, ErrorInjector};
use crate::variation::{factor, resource_factor, round_price, unit_interval};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use costsource_types::*;
use std::collections::HashMap;
use std::sync::Arc;

const PAGE_TOKEN_PREFIX: &str = "page-";

/// Configurable stand-in plugin.
///
/// Answers are a pure function of the configuration and the request. Only
/// error injection and the call counters change while serving.
#[derive(Debug)]
pub struct MockPlugin {
    config: Arc<MockConfig>,
    errors: ErrorInjector,
    calls: CallCounters,
}

impl Default for MockPlugin {
    fn default() -> Self {
        Self::from_parts(MockConfig::default(), HashMap::new())
    }
}

impl MockPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> MockPluginBuilder {
        MockPluginBuilder::default()
    }

    pub(crate) fn from_parts(config: MockConfig, errors: HashMap<Method, Status>) -> Self {
        Self {
            config: Arc::new(config),
            errors: ErrorInjector::new(errors),
            calls: CallCounters::default(),
        }
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    /// Make every call to `method` fail with `status` until cleared.
    pub fn inject_error(&self, method: Method, status: Status) {
        tracing::debug!(method = %method, code = %status.code, "Injecting error");
        self.errors.inject(method, status);
    }

    pub fn clear_error(&self, method: Method) {
        self.errors.clear(method);
    }

    pub fn clear_errors(&self) {
        self.errors.clear_all();
    }

    pub fn call_count(&self, method: Method) -> u64 {
        self.calls.get(method)
    }

    pub fn total_calls(&self) -> u64 {
        self.calls.total()
    }

    /// Count the call, sleep any configured delay, then apply injected errors.
    ///
    /// The sleep is an ordinary future, so it stops as soon as the caller's
    /// deadline drops the call.
    async fn enter(&self, method: Method) -> CallResult<()> {
        self.calls.record(method);
        if let Some(delay) = self.config.delay_for(method) {
            tokio::time::sleep(delay).await;
        }
        self.errors.check(method)
    }

    fn resolve<'a>(
        &'a self,
        resource: Option<&'a ResourceDescriptor>,
    ) -> CallResult<(&'a ResourceDescriptor, &'a PricingEntry)> {
        let resource =
            resource.ok_or_else(|| Status::invalid_argument("resource descriptor is required"))?;
        if resource.provider.is_empty() {
            return Err(Status::invalid_argument("resource provider is required"));
        }
        if resource.resource_type.is_empty() {
            return Err(Status::invalid_argument("resource type is required"));
        }
        let entry = self
            .config
            .catalog
            .lookup(&resource.provider, &resource.resource_type)
            .ok_or_else(|| Status::not_found(format!("no pricing for {}", resource)))?;
        Ok((resource, entry))
    }

    fn unit_rate(&self, resource: &ResourceDescriptor, entry: &PricingEntry) -> f64 {
        round_price(entry.base_rate * resource_factor(self.config.seed, resource))
    }

    fn point_count(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> usize {
        match self.config.data_points {
            Some(count) => count,
            None => {
                let hours = (end - start).num_hours().max(1);
                usize::try_from(hours)
                    .unwrap_or(MAX_DATA_POINTS)
                    .min(MAX_DATA_POINTS)
            }
        }
    }

    fn synthesize_point(
        &self,
        request: &ActualCostRequest,
        index: usize,
        total: usize,
    ) -> ActualCostResult {
        let seed = self.config.seed;
        let idx = index.to_string();
        let span_ms = (request.end - request.start).num_milliseconds() as i128;
        let offset_ms = span_ms * index as i128 / total.max(1) as i128;
        let timestamp = request.start + chrono::Duration::milliseconds(offset_ms as i64);

        let rate = 0.05 * factor(seed, &[request.resource_id.as_str()]);
        let usage_amount = round_price(
            unit_interval(seed, &[request.resource_id.as_str(), "usage", idx.as_str()]) * 10.0,
        );

        ActualCostResult {
            timestamp,
            cost: round_price(usage_amount * rate),
            usage_amount,
            usage_unit: "hour".to_string(),
            source: self.config.source_tag.clone(),
        }
    }
}

fn parse_page_token(token: &str, total: usize) -> CallResult<usize> {
    if token.is_empty() {
        return Ok(0);
    }
    let offset = token
        .strip_prefix(PAGE_TOKEN_PREFIX)
        .and_then(|rest| rest.parse::<usize>().ok())
        .ok_or_else(|| Status::invalid_argument(format!("malformed page token {:?}", token)))?;
    if offset > total {
        return Err(Status::invalid_argument(format!(
            "page token {:?} is past the end of the result set",
            token
        )));
    }
    Ok(offset)
}

#[async_trait]
impl CostSource for MockPlugin {
    async fn name(&self) -> CallResult<String> {
        self.enter(Method::Name).await?;
        Ok(self.config.name.clone())
    }

    async fn supports(&self, request: SupportsRequest) -> CallResult<SupportsResponse> {
        self.enter(Method::Supports).await?;

        let Some(resource) = request.resource else {
            return Ok(SupportsResponse::unsupported("no resource descriptor supplied"));
        };
        if resource.provider.is_empty() || resource.resource_type.is_empty() {
            return Ok(SupportsResponse::unsupported(
                "provider and resource type are required",
            ));
        }
        if !self.config.catalog.has_provider(&resource.provider) {
            return Ok(SupportsResponse::unsupported(format!(
                "provider {} is not supported",
                resource.provider
            )));
        }
        Ok(
            match self
                .config
                .catalog
                .lookup(&resource.provider, &resource.resource_type)
            {
                Some(_) => SupportsResponse::supported(),
                None => SupportsResponse::unsupported(format!(
                    "resource type {} is not supported for provider {}",
                    resource.resource_type, resource.provider
                )),
            },
        )
    }

    async fn get_projected_cost(
        &self,
        request: ProjectedCostRequest,
    ) -> CallResult<ProjectedCostResponse> {
        self.enter(Method::GetProjectedCost).await?;

        let (resource, entry) = self.resolve(request.resource.as_ref())?;
        let unit_price = self.unit_rate(resource, entry);
        let billing_mode = entry.billing_mode();
        Ok(ProjectedCostResponse {
            unit_price,
            currency: self.config.currency.clone(),
            cost_per_month: round_price(unit_price * entry.class.monthly_units()),
            billing_mode,
            billing_detail: format!(
                "{}: {} {} per {}",
                entry.description,
                unit_price,
                self.config.currency,
                billing_mode.unit()
            ),
        })
    }

    async fn get_actual_cost(&self, request: ActualCostRequest) -> CallResult<ActualCostResponse> {
        self.enter(Method::GetActualCost).await?;

        if request.resource_id.is_empty() {
            return Err(Status::invalid_argument("resource id is required"));
        }
        if request.end <= request.start {
            return Err(Status::invalid_argument(format!(
                "end {} must be after start {}",
                request.end, request.start
            )));
        }

        let total = self.point_count(request.start, request.end);
        let offset = parse_page_token(&request.page_token, total)?;
        let end = match request.page_size {
            0 => total,
            size => offset.saturating_add(size as usize).min(total),
        };

        let results = (offset..end)
            .map(|i| self.synthesize_point(&request, i, total))
            .collect();
        let next_page_token = if end < total {
            format!("{}{}", PAGE_TOKEN_PREFIX, end)
        } else {
            String::new()
        };

        Ok(ActualCostResponse {
            results,
            next_page_token,
            total_count: total as u64,
        })
    }

    async fn get_pricing_spec(&self, request: PricingSpecRequest) -> CallResult<PricingSpec> {
        self.enter(Method::GetPricingSpec).await?;

        let (resource, entry) = self.resolve(request.resource.as_ref())?;
        let billing_mode = entry.billing_mode();
        Ok(PricingSpec {
            provider: resource.provider.to_ascii_lowercase(),
            resource_type: resource.resource_type.to_ascii_lowercase(),
            sku: resource.sku.clone(),
            region: resource.region.clone(),
            billing_mode,
            rate_per_unit: self.unit_rate(resource, entry),
            currency: self.config.currency.clone(),
            unit: billing_mode.unit().to_string(),
            description: entry.description.clone(),
            assumptions: vec![
                format!(
                    "Monthly projection assumes {} {} units",
                    entry.class.monthly_units(),
                    billing_mode.unit()
                ),
                "On-demand list price, no reserved or committed-use discounts".to_string(),
                format!("Synthetic rate derived from seed {}", self.config.seed),
            ],
            source: self.config.source_tag.clone(),
        })
    }

    async fn estimate_cost(
        &self,
        request: EstimateCostRequest,
    ) -> CallResult<EstimateCostResponse> {
        self.enter(Method::EstimateCost).await?;

        let (provider, resource_type) = request
            .resource_type
            .split_once('/')
            .filter(|(p, t)| !p.is_empty() && !t.is_empty())
            .ok_or_else(|| {
                Status::invalid_argument(format!(
                    "resource type {:?} must look like provider/type",
                    request.resource_type
                ))
            })?;
        let quantity = match request.attributes.get("quantity") {
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|q| q.is_finite() && *q >= 0.0)
                .ok_or_else(|| Status::invalid_argument(format!("invalid quantity {:?}", raw)))?,
            None => 1.0,
        };

        let mut resource = ResourceDescriptor::new(provider, resource_type);
        if let Some(sku) = request.attributes.get("sku") {
            resource = resource.with_sku(sku.clone());
        }
        if let Some(region) = request.attributes.get("region") {
            resource = resource.with_region(region.clone());
        }
        let (resource, entry) = self.resolve(Some(&resource))?;
        let rate = self.unit_rate(resource, entry);

        Ok(EstimateCostResponse {
            currency: self.config.currency.clone(),
            cost_monthly: round_price(rate * entry.class.monthly_units() * quantity),
        })
    }

    async fn get_recommendations(
        &self,
        request: RecommendationsRequest,
    ) -> CallResult<RecommendationsResponse> {
        self.enter(Method::GetRecommendations).await?;

        let seed = self.config.seed;
        let recommendations = request
            .resources
            .into_iter()
            .filter_map(|resource| {
                let entry = self
                    .config
                    .catalog
                    .lookup(&resource.provider, &resource.resource_type)?;
                if entry.class != ResourceClass::Compute {
                    return None;
                }
                let key = resource.to_string();
                let monthly = self.unit_rate(&resource, entry) * entry.class.monthly_units();
                let share = 0.1 + 0.2 * unit_interval(seed, &[key.as_str(), "savings"]);
                let digest = blake3::hash(key.as_bytes()).to_hex();
                Some(Recommendation {
                    id: format!("rec-{}", &digest.as_str()[..12]),
                    action: "rightsize".to_string(),
                    description: format!(
                        "{} averages low utilisation; a smaller size would do",
                        key
                    ),
                    estimated_savings: round_price(monthly * share),
                    currency: self.config.currency.clone(),
                    resource,
                })
            })
            .collect();

        Ok(RecommendationsResponse { recommendations })
    }
}
