//! Provider × resource-type pricing catalog.

use costsource_types::BillingMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Broad class of a resource type. Decides how it is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    Compute,
    Storage,
    Serverless,
    Database,
}

impl ResourceClass {
    pub fn billing_mode(&self) -> BillingMode {
        match self {
            Self::Compute | Self::Database => BillingMode::PerHour,
            Self::Storage => BillingMode::PerGbMonth,
            Self::Serverless => BillingMode::PerInvocation,
        }
    }

    /// Units assumed consumed in a month when projecting monthly cost.
    pub fn monthly_units(&self) -> f64 {
        match self {
            Self::Compute | Self::Database => HOURS_PER_MONTH,
            Self::Storage => 100.0,
            Self::Serverless => 1_000_000.0,
        }
    }
}

pub const HOURS_PER_MONTH: f64 = 730.0;

/// Base pricing for one resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingEntry {
    pub class: ResourceClass,
    pub base_rate: f64,
    pub description: String,
}

impl PricingEntry {
    pub fn new(class: ResourceClass, base_rate: f64, description: impl Into<String>) -> Self {
        Self {
            class,
            base_rate,
            description: description.into(),
        }
    }

    pub fn billing_mode(&self) -> BillingMode {
        self.class.billing_mode()
    }
}

/// Pricing entries keyed by (provider, resource type), both lowercase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingCatalog {
    entries: BTreeMap<String, BTreeMap<String, PricingEntry>>,
}

impl PricingCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in catalog: aws, azure, gcp and kubernetes with a handful of
    /// resource types each.
    pub fn standard() -> Self {
        use ResourceClass::*;

        let mut catalog = Self::empty();
        for (provider, resource_type, class, rate, description) in [
            ("aws", "ec2", Compute, 0.0416, "EC2 general purpose instance"),
            ("aws", "s3", Storage, 0.023, "S3 standard storage"),
            ("aws", "lambda", Serverless, 0.000_000_2, "Lambda request"),
            ("aws", "rds", Database, 0.068, "RDS single-AZ instance"),
            ("aws", "dynamodb", Serverless, 0.000_001_25, "DynamoDB on-demand write"),
            ("azure", "vm", Compute, 0.0496, "Azure B-series virtual machine"),
            ("azure", "blob", Storage, 0.0184, "Azure hot blob storage"),
            ("azure", "functions", Serverless, 0.000_000_2, "Azure Functions execution"),
            ("azure", "sql", Database, 0.1855, "Azure SQL database"),
            ("gcp", "compute", Compute, 0.0475, "Compute Engine e2 instance"),
            ("gcp", "storage", Storage, 0.020, "Cloud Storage standard"),
            ("gcp", "cloudfunctions", Serverless, 0.000_000_4, "Cloud Functions invocation"),
            ("gcp", "cloudsql", Database, 0.0413, "Cloud SQL instance"),
            ("kubernetes", "pod", Compute, 0.031, "Kubernetes pod share"),
            ("kubernetes", "namespace", Compute, 0.10, "Kubernetes namespace overhead"),
            ("kubernetes", "pvc", Storage, 0.10, "Kubernetes persistent volume claim"),
        ] {
            catalog.insert(provider, resource_type, PricingEntry::new(class, rate, description));
        }
        catalog
    }

    pub fn insert(&mut self, provider: &str, resource_type: &str, entry: PricingEntry) {
        self.entries
            .entry(provider.to_ascii_lowercase())
            .or_default()
            .insert(resource_type.to_ascii_lowercase(), entry);
    }

    pub fn has_provider(&self, provider: &str) -> bool {
        self.entries.contains_key(&provider.to_ascii_lowercase())
    }

    pub fn lookup(&self, provider: &str, resource_type: &str) -> Option<&PricingEntry> {
        self.entries
            .get(&provider.to_ascii_lowercase())?
            .get(&resource_type.to_ascii_lowercase())
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn resource_types(&self, provider: &str) -> Vec<&str> {
        self.entries
            .get(&provider.to_ascii_lowercase())
            .map(|types| types.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
