//! Response validation against an injected catalog of accepted values.

use costsource_types::{
    ActualCostResponse, BillingMode, PricingSpec, ProjectedCostResponse, SupportsResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Longest plugin name accepted.
pub const MAX_PLUGIN_NAME_LEN: usize = 64;

/// Accepted providers, currencies and billing modes.
///
/// Passed to the validator rather than read from globals, so a host can
/// certify a plugin against its own catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationCatalog {
    pub providers: BTreeSet<String>,
    pub currencies: BTreeSet<String>,
    pub billing_modes: Vec<BillingMode>,
}

impl Default for ValidationCatalog {
    fn default() -> Self {
        Self {
            providers: ["aws", "azure", "gcp", "kubernetes"]
                .into_iter()
                .map(String::from)
                .collect(),
            currencies: [
                "USD", "EUR", "GBP", "JPY", "CAD", "AUD", "CHF", "CNY", "INR", "BRL", "SEK",
                "NZD",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            billing_modes: vec![
                BillingMode::PerHour,
                BillingMode::PerGbMonth,
                BillingMode::PerInvocation,
            ],
        }
    }
}

impl ValidationCatalog {
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.providers.insert(provider.into().to_ascii_lowercase());
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currencies.insert(currency.into().to_ascii_uppercase());
        self
    }

    pub fn with_billing_modes(mut self, modes: Vec<BillingMode>) -> Self {
        self.billing_modes = modes;
        self
    }

    pub fn is_valid_provider(&self, provider: &str) -> bool {
        self.providers.contains(&provider.to_ascii_lowercase())
    }

    pub fn is_valid_currency(&self, currency: &str) -> bool {
        self.currencies.contains(currency)
    }

    pub fn is_valid_billing_mode(&self, mode: BillingMode) -> bool {
        self.billing_modes.contains(&mode)
    }
}

/// One finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: String,
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(code: &str, field: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.field, self.code, self.message)
    }
}

/// Errors fail a check; warnings cover "should populate" fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, code: &str, field: &str, message: impl Into<String>) {
        self.errors.push(ValidationIssue::new(code, field, message));
    }

    fn warning(&mut self, code: &str, field: &str, message: impl Into<String>) {
        self.warnings.push(ValidationIssue::new(code, field, message));
    }

    /// Warnings become errors; used when a level requires what lower levels
    /// only recommend.
    pub fn strict(mut self) -> Self {
        self.errors.append(&mut self.warnings);
        self
    }

    pub fn errors_text(&self) -> String {
        join(&self.errors)
    }

    pub fn warnings_text(&self) -> String {
        join(&self.warnings)
    }
}

fn join(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Checks plugin responses against a [`ValidationCatalog`].
#[derive(Debug, Clone, Copy)]
pub struct SpecValidator<'a> {
    catalog: &'a ValidationCatalog,
}

impl<'a> SpecValidator<'a> {
    pub fn new(catalog: &'a ValidationCatalog) -> Self {
        Self { catalog }
    }

    pub fn validate_name(&self, name: &str) -> ValidationResult {
        let mut result = ValidationResult::default();
        if name.trim().is_empty() {
            result.error("EMPTY_NAME", "name", "plugin name is empty");
        } else if name.chars().count() > MAX_PLUGIN_NAME_LEN {
            result.error(
                "NAME_TOO_LONG",
                "name",
                format!(
                    "plugin name is {} characters, limit is {}",
                    name.chars().count(),
                    MAX_PLUGIN_NAME_LEN
                ),
            );
        }
        result
    }

    pub fn validate_supports(&self, response: &SupportsResponse) -> ValidationResult {
        let mut result = ValidationResult::default();
        if !response.supported && response.reason.trim().is_empty() {
            result.error(
                "MISSING_REASON",
                "reason",
                "unsupported resource must come with a reason",
            );
        }
        result
    }

    pub fn validate_pricing_spec(&self, spec: &PricingSpec) -> ValidationResult {
        let mut result = ValidationResult::default();

        if spec.provider.is_empty() {
            result.error("MISSING_FIELD", "provider", "provider is empty");
        } else if !self.catalog.is_valid_provider(&spec.provider) {
            result.error(
                "UNKNOWN_PROVIDER",
                "provider",
                format!("provider {:?} is not in the catalog", spec.provider),
            );
        }
        if spec.resource_type.is_empty() {
            result.error("MISSING_FIELD", "resource_type", "resource type is empty");
        }
        if !self.catalog.is_valid_billing_mode(spec.billing_mode) {
            result.error(
                "INVALID_BILLING_MODE",
                "billing_mode",
                format!("billing mode {} is not accepted", spec.billing_mode),
            );
        }
        self.check_rate(&mut result, "rate_per_unit", spec.rate_per_unit);
        self.check_currency(&mut result, &spec.currency);
        if spec.unit.trim().is_empty() {
            result.error("MISSING_FIELD", "unit", "unit is empty");
        }
        if spec.source.trim().is_empty() {
            result.error("MISSING_FIELD", "source", "source is empty");
        }

        if spec.description.trim().is_empty() {
            result.warning("SHOULD_POPULATE", "description", "description is empty");
        }
        if spec.assumptions.is_empty() {
            result.warning("SHOULD_POPULATE", "assumptions", "no assumptions listed");
        } else if spec.assumptions.iter().any(|a| a.trim().is_empty()) {
            result.warning("SHOULD_POPULATE", "assumptions", "blank assumption entry");
        }
        if !spec.unit.is_empty() && spec.unit != spec.billing_mode.unit() {
            result.warning(
                "UNIT_MISMATCH",
                "unit",
                format!(
                    "unit {:?} does not match billing mode {} ({:?})",
                    spec.unit,
                    spec.billing_mode,
                    spec.billing_mode.unit()
                ),
            );
        }

        result
    }

    pub fn validate_projected_cost(&self, response: &ProjectedCostResponse) -> ValidationResult {
        let mut result = ValidationResult::default();
        self.check_rate(&mut result, "unit_price", response.unit_price);
        self.check_rate(&mut result, "cost_per_month", response.cost_per_month);
        self.check_currency(&mut result, &response.currency);
        if !self.catalog.is_valid_billing_mode(response.billing_mode) {
            result.error(
                "INVALID_BILLING_MODE",
                "billing_mode",
                format!("billing mode {} is not accepted", response.billing_mode),
            );
        }
        if response.billing_detail.trim().is_empty() {
            result.warning("SHOULD_POPULATE", "billing_detail", "billing detail is empty");
        }
        result
    }

    /// Records must be non-negative, tagged with a source and fall inside
    /// `[start, end)`.
    pub fn validate_actual_cost(
        &self,
        response: &ActualCostResponse,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ValidationResult {
        let mut result = ValidationResult::default();
        for (i, record) in response.results.iter().enumerate() {
            let field = format!("results[{}]", i);
            if !(record.cost.is_finite() && record.cost >= 0.0) {
                result.error("NEGATIVE_VALUE", &field, format!("cost {} is negative", record.cost));
            }
            if !(record.usage_amount.is_finite() && record.usage_amount >= 0.0) {
                result.error(
                    "NEGATIVE_VALUE",
                    &field,
                    format!("usage amount {} is negative", record.usage_amount),
                );
            }
            if record.source.trim().is_empty() {
                result.error("MISSING_FIELD", &field, "source is empty");
            }
            if record.timestamp < start || record.timestamp >= end {
                result.error(
                    "OUT_OF_RANGE",
                    &field,
                    format!("timestamp {} is outside [{}, {})", record.timestamp, start, end),
                );
            }
        }
        if response.total_count > 0 && (response.results.len() as u64) > response.total_count {
            result.error(
                "COUNT_MISMATCH",
                "total_count",
                format!(
                    "page holds {} records but total_count is {}",
                    response.results.len(),
                    response.total_count
                ),
            );
        }
        result
    }

    fn check_rate(&self, result: &mut ValidationResult, field: &str, value: f64) {
        if !value.is_finite() {
            result.error("INVALID_NUMBER", field, format!("{} is not finite", value));
        } else if value < 0.0 {
            result.error("NEGATIVE_VALUE", field, format!("{} is negative", value));
        }
    }

    fn check_currency(&self, result: &mut ValidationResult, currency: &str) {
        if currency.is_empty() {
            result.error("MISSING_FIELD", "currency", "currency is empty");
        } else if !self.catalog.is_valid_currency(currency) {
            result.error(
                "UNKNOWN_CURRENCY",
                "currency",
                format!("currency {:?} is not in the catalog", currency),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> PricingSpec {
        PricingSpec {
            provider: "aws".into(),
            resource_type: "ec2".into(),
            sku: "t3.micro".into(),
            region: "us-east-1".into(),
            billing_mode: BillingMode::PerHour,
            rate_per_unit: 0.0104,
            currency: "USD".into(),
            unit: "hour".into(),
            description: "General purpose".into(),
            assumptions: vec!["730 hours per month".into()],
            source: "list-price".into(),
        }
    }

    #[test]
    fn complete_spec_is_valid() {
        let catalog = ValidationCatalog::default();
        let result = SpecValidator::new(&catalog).validate_pricing_spec(&spec());
        assert!(result.is_valid(), "{}", result.errors_text());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn missing_assumptions_is_a_warning_until_strict() {
        let catalog = ValidationCatalog::default();
        let mut s = spec();
        s.assumptions.clear();
        let result = SpecValidator::new(&catalog).validate_pricing_spec(&s);
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
        assert!(!result.strict().is_valid());
    }

    #[test]
    fn unknown_provider_and_currency_are_errors() {
        let catalog = ValidationCatalog::default();
        let mut s = spec();
        s.provider = "oracle".into();
        s.currency = "DOGE".into();
        s.rate_per_unit = -1.0;
        let result = SpecValidator::new(&catalog).validate_pricing_spec(&s);
        let codes: Vec<_> = result.errors.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["UNKNOWN_PROVIDER", "NEGATIVE_VALUE", "UNKNOWN_CURRENCY"]);
    }

    #[test]
    fn substituted_catalog_changes_the_verdict() {
        let catalog = ValidationCatalog::default().with_provider("oracle");
        let mut s = spec();
        s.provider = "oracle".into();
        assert!(SpecValidator::new(&catalog).validate_pricing_spec(&s).is_valid());

        let restricted =
            ValidationCatalog::default().with_billing_modes(vec![BillingMode::PerGbMonth]);
        assert!(!SpecValidator::new(&restricted).validate_pricing_spec(&spec()).is_valid());
    }

    #[test]
    fn name_rules() {
        let catalog = ValidationCatalog::default();
        let v = SpecValidator::new(&catalog);
        assert!(v.validate_name("mock").is_valid());
        assert!(!v.validate_name("").is_valid());
        assert!(!v.validate_name(&"n".repeat(65)).is_valid());
    }

    #[test]
    fn unsupported_without_reason_is_invalid() {
        let catalog = ValidationCatalog::default();
        let v = SpecValidator::new(&catalog);
        assert!(!v.validate_supports(&SupportsResponse::unsupported("")).is_valid());
        assert!(v.validate_supports(&SupportsResponse::unsupported("nope")).is_valid());
        assert!(v.validate_supports(&SupportsResponse::supported()).is_valid());
    }
}
