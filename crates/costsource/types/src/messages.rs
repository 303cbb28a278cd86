//! Request and response messages exchanged with a cost-source plugin.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifies a cloud resource whose cost is being asked about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub provider: String,
    pub resource_type: String,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ResourceDescriptor {
    pub fn new(provider: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            resource_type: resource_type.into(),
            ..Default::default()
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = sku.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.resource_type)?;
        if !self.sku.is_empty() {
            write!(f, ":{}", self.sku)?;
        }
        if !self.region.is_empty() {
            write!(f, "@{}", self.region)?;
        }
        Ok(())
    }
}

/// How a rate is charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingMode {
    PerHour,
    PerGbMonth,
    PerInvocation,
}

impl BillingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerHour => "per_hour",
            Self::PerGbMonth => "per_gb_month",
            Self::PerInvocation => "per_invocation",
        }
    }

    /// Unit label that accompanies a rate in this mode.
    pub fn unit(&self) -> &'static str {
        match self {
            Self::PerHour => "hour",
            Self::PerGbMonth => "GB-month",
            Self::PerInvocation => "invocation",
        }
    }
}

impl fmt::Display for BillingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SupportsRequest {
    pub resource: Option<ResourceDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SupportsResponse {
    pub supported: bool,
    /// Required whenever `supported` is false.
    pub reason: String,
}

impl SupportsResponse {
    pub fn supported() -> Self {
        Self {
            supported: true,
            reason: String::new(),
        }
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self {
            supported: false,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectedCostRequest {
    pub resource: Option<ResourceDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedCostResponse {
    pub unit_price: f64,
    pub currency: String,
    pub cost_per_month: f64,
    pub billing_mode: BillingMode,
    pub billing_detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualCostRequest {
    pub resource_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Zero asks for the whole range in one page.
    #[serde(default)]
    pub page_size: u32,
    /// Empty for the first page.
    #[serde(default)]
    pub page_token: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ActualCostRequest {
    pub fn new(resource_id: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            resource_id: resource_id.into(),
            start,
            end,
            page_size: 0,
            page_token: String::new(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_page(mut self, page_size: u32, page_token: impl Into<String>) -> Self {
        self.page_size = page_size;
        self.page_token = page_token.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActualCostResult {
    pub timestamp: DateTime<Utc>,
    pub cost: f64,
    pub usage_amount: f64,
    pub usage_unit: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActualCostResponse {
    pub results: Vec<ActualCostResult>,
    /// Empty on the last page.
    pub next_page_token: String,
    pub total_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PricingSpecRequest {
    pub resource: Option<ResourceDescriptor>,
}

/// Full pricing descriptor for a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingSpec {
    pub provider: String,
    pub resource_type: String,
    pub sku: String,
    pub region: String,
    pub billing_mode: BillingMode,
    pub rate_per_unit: f64,
    pub currency: String,
    pub unit: String,
    pub description: String,
    pub assumptions: Vec<String>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EstimateCostRequest {
    pub resource_type: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateCostResponse {
    pub currency: String,
    pub cost_monthly: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecommendationsRequest {
    pub resources: Vec<ResourceDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub resource: ResourceDescriptor,
    pub action: String,
    pub description: String,
    pub estimated_savings: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecommendationsResponse {
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BudgetsRequest {
    pub provider: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: String,
    pub name: String,
    pub amount: f64,
    pub spent: f64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BudgetsResponse {
    pub budgets: Vec<Budget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DryRunRequest {
    pub resource: Option<ResourceDescriptor>,
}

/// Whether a plugin would populate a given response field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub field_name: String,
    pub supported: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DryRunResponse {
    pub field_mappings: Vec<FieldMapping>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_display() {
        let r = ResourceDescriptor::new("aws", "ec2")
            .with_sku("t3.micro")
            .with_region("us-east-1");
        assert_eq!(r.to_string(), "aws/ec2:t3.micro@us-east-1");
        assert_eq!(ResourceDescriptor::new("gcp", "storage").to_string(), "gcp/storage");
    }

    #[test]
    fn billing_mode_units() {
        assert_eq!(BillingMode::PerGbMonth.unit(), "GB-month");
        assert_eq!(
            serde_json::to_string(&BillingMode::PerInvocation).unwrap(),
            "\"per_invocation\""
        );
    }

    #[test]
    fn actual_cost_request_defaults_from_json() {
        let json = r#"{
            "resource_id": "i-123",
            "start": "2024-01-01T00:00:00Z",
            "end": "2024-01-02T00:00:00Z"
        }"#;
        let req: ActualCostRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.page_size, 0);
        assert!(req.page_token.is_empty());
    }
}
