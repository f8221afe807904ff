use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use fixfurn_core::catalog::{CatalogIndex, SearchQuery};
use fixfurn_core::domain::interaction::InteractionRecord;
use fixfurn_core::domain::repair::SizeClass;
use fixfurn_core::logsink::InteractionSink;
use fixfurn_core::repair::{EstimateError, RuleTable};

use crate::llm::JsonMap;
use crate::tools::{ArgKind, ArgSpec, ToolHandler, ToolRegistry, ToolSpec};

/// Upper bound on products returned per lookup, to keep tool results small
/// enough to thread back through the reasoning step.
const LOOKUP_LIMIT: usize = 8;

/// Builds the production registry: the five concierge tools bound to the
/// shared read-only datasets and the append-only sink.
pub fn registry(
    catalog: Arc<CatalogIndex>,
    rules: Arc<RuleTable>,
    sink: Arc<dyn InteractionSink>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::default();
    registry.register(LookupProductTool::new(catalog));
    registry.register(EstimateRepairTool::new(rules, Arc::clone(&sink)));
    registry.register(RecordLeadTool::new(Arc::clone(&sink)));
    registry.register(RecordFeedbackTool::new(Arc::clone(&sink)));
    registry.register(RecordServiceFeedbackTool::new(sink));
    registry
}

fn get_str<'a>(arguments: &'a JsonMap, name: &str) -> Option<&'a str> {
    arguments.get(name).and_then(Value::as_str).map(str::trim).filter(|value| !value.is_empty())
}

fn get_f64(arguments: &JsonMap, name: &str) -> Option<f64> {
    arguments.get(name).and_then(Value::as_f64)
}

fn required_str(arguments: &JsonMap, name: &str) -> anyhow::Result<String> {
    get_str(arguments, name)
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("validated argument `{name}` is unexpectedly absent"))
}

pub struct LookupProductTool {
    catalog: Arc<CatalogIndex>,
    spec: ToolSpec,
}

impl LookupProductTool {
    pub fn new(catalog: Arc<CatalogIndex>) -> Self {
        Self {
            catalog,
            spec: ToolSpec {
                name: "lookup_product",
                description: "Search the curated house catalog and the partner reference dataset. \
                              Results are tagged house_brand or partner_line and priced in USD.",
                args: vec![
                    ArgSpec::required(
                        "query",
                        ArgKind::String,
                        "Keyword, color, category, SKU, or partner item id to search for.",
                    ),
                    ArgSpec::optional("category", ArgKind::String, "Exact category filter."),
                    ArgSpec::optional("material", ArgKind::String, "Material filter, e.g. wood."),
                    ArgSpec::optional("color", ArgKind::String, "Color option filter."),
                    ArgSpec::optional(
                        "width_cm",
                        ArgKind::Number,
                        "Target width in centimeters; closer matches rank first.",
                    ),
                    ArgSpec::optional(
                        "tolerance_cm",
                        ArgKind::Number,
                        "Width window around width_cm, default 10.",
                    ),
                ],
            },
        }
    }
}

#[async_trait]
impl ToolHandler for LookupProductTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, arguments: &JsonMap) -> anyhow::Result<Value> {
        let raw_query = required_str(arguments, "query")?;

        let query = SearchQuery {
            category: get_str(arguments, "category").map(str::to_string),
            material: get_str(arguments, "material").map(str::to_string),
            color: get_str(arguments, "color").map(str::to_string),
            width_cm: get_f64(arguments, "width_cm"),
            tolerance_cm: get_f64(arguments, "tolerance_cm"),
            ..SearchQuery::from_text(&raw_query)
        };

        let hits = self.catalog.search(&query);
        if hits.is_empty() {
            return Ok(json!({
                "ok": false,
                "error": "no_match",
                "message": format!("No products found for '{raw_query}'."),
            }));
        }

        let results = hits
            .iter()
            .take(LOOKUP_LIMIT)
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()?;

        Ok(json!({
            "ok": true,
            "query": raw_query,
            "result_count": results.len(),
            "results": results,
        }))
    }
}

pub struct EstimateRepairTool {
    rules: Arc<RuleTable>,
    sink: Arc<dyn InteractionSink>,
    spec: ToolSpec,
}

impl EstimateRepairTool {
    pub fn new(rules: Arc<RuleTable>, sink: Arc<dyn InteractionSink>) -> Self {
        Self {
            rules,
            sink,
            spec: ToolSpec {
                name: "estimate_repair",
                description: "Estimate repair price and turnaround tiers (budget, standard, rush) \
                              from issue, material, and size_category.",
                args: vec![
                    ArgSpec::required(
                        "issue",
                        ArgKind::String,
                        "Issue such as scratch, broken_glass, wobble, loose_joint, \
                         upholstery_tear, refinish, repaint.",
                    ),
                    ArgSpec::optional(
                        "material",
                        ArgKind::String,
                        "Primary material (wood, glass, metal, fabric).",
                    ),
                    ArgSpec::optional(
                        "size_category",
                        ArgKind::String,
                        "Furniture size bucket: small, medium, or large. Defaults to medium.",
                    ),
                ],
            },
        }
    }

    fn log_coverage_gap(&self, issue: &str, material: Option<&str>, size: SizeClass) {
        let question = format!(
            "repair estimate unavailable: issue `{issue}`, material `{}`, size `{}`",
            material.unwrap_or("unspecified"),
            size.as_str(),
        );
        let record =
            InteractionRecord::UnresolvedQuestion { question, recorded_at: Utc::now() };
        if let Err(error) = self.sink.append(&record) {
            tracing::warn!(
                event_name = "agent.tool.coverage_gap_unlogged",
                error = %error,
                "could not append unresolved-question record"
            );
        }
    }
}

#[async_trait]
impl ToolHandler for EstimateRepairTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, arguments: &JsonMap) -> anyhow::Result<Value> {
        let issue = required_str(arguments, "issue")?;
        let material = get_str(arguments, "material");

        let size = match get_str(arguments, "size_category") {
            Some(raw) => match raw.parse::<SizeClass>() {
                Ok(size) => size,
                Err(error) => {
                    return Ok(json!({
                        "ok": false,
                        "error": "invalid_size",
                        "message": error.to_string(),
                    }));
                }
            },
            None => SizeClass::Medium,
        };

        match self.rules.estimate(&issue, material, size) {
            Ok(estimate) => Ok(json!({
                "ok": true,
                "estimate": serde_json::to_value(&estimate)?,
            })),
            Err(error @ EstimateError::NoRuleCoverage { .. }) => {
                // Coverage gaps are an explicit outcome, and each one is
                // worth a follow-up from a human.
                self.log_coverage_gap(&issue, material, size);
                Ok(json!({
                    "ok": false,
                    "error": "estimate_unavailable",
                    "message": format!(
                        "{error}; tell the customer we cannot provide an estimate for this yet"
                    ),
                }))
            }
        }
    }
}

pub struct RecordLeadTool {
    sink: Arc<dyn InteractionSink>,
    spec: ToolSpec,
}

impl RecordLeadTool {
    pub fn new(sink: Arc<dyn InteractionSink>) -> Self {
        Self {
            sink,
            spec: ToolSpec {
                name: "record_customer_interest",
                description: "Capture customer details when they are ready to buy or book a repair.",
                args: vec![
                    ArgSpec::required("name", ArgKind::String, "Customer full name."),
                    ArgSpec::required("email", ArgKind::String, "Customer email address."),
                    ArgSpec::required(
                        "intent",
                        ArgKind::String,
                        "What the customer wants, e.g. purchase or repair booking.",
                    ),
                    ArgSpec::optional(
                        "note",
                        ArgKind::String,
                        "Short note about the product or repair request.",
                    ),
                ],
            },
        }
    }
}

#[async_trait]
impl ToolHandler for RecordLeadTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, arguments: &JsonMap) -> anyhow::Result<Value> {
        let record = InteractionRecord::Lead {
            name: required_str(arguments, "name")?,
            email: required_str(arguments, "email")?,
            intent: required_str(arguments, "intent")?,
            note: get_str(arguments, "note").map(str::to_string),
            recorded_at: Utc::now(),
        };
        self.sink.append(&record)?;

        Ok(json!({ "ok": true, "message": "Thanks! We'll follow up soon." }))
    }
}

pub struct RecordFeedbackTool {
    sink: Arc<dyn InteractionSink>,
    spec: ToolSpec,
}

impl RecordFeedbackTool {
    pub fn new(sink: Arc<dyn InteractionSink>) -> Self {
        Self {
            sink,
            spec: ToolSpec {
                name: "record_feedback",
                description: "Log customer questions that the assistant could not resolve.",
                args: vec![ArgSpec::required(
                    "question",
                    ArgKind::String,
                    "Unanswered or unclear customer request.",
                )],
            },
        }
    }
}

#[async_trait]
impl ToolHandler for RecordFeedbackTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, arguments: &JsonMap) -> anyhow::Result<Value> {
        let record = InteractionRecord::UnresolvedQuestion {
            question: required_str(arguments, "question")?,
            recorded_at: Utc::now(),
        };
        self.sink.append(&record)?;

        Ok(json!({ "ok": true, "message": "Noted. We'll improve our answers." }))
    }
}

pub struct RecordServiceFeedbackTool {
    sink: Arc<dyn InteractionSink>,
    spec: ToolSpec,
}

impl RecordServiceFeedbackTool {
    pub fn new(sink: Arc<dyn InteractionSink>) -> Self {
        Self {
            sink,
            spec: ToolSpec {
                name: "record_service_feedback",
                description: "Capture post-service feedback about the overall experience, product \
                              satisfaction, or repair quality.",
                args: vec![
                    ArgSpec::required(
                        "email",
                        ArgKind::String,
                        "Customer email to match the service record.",
                    ),
                    ArgSpec::required("name", ArgKind::String, "Customer full name."),
                    ArgSpec::required(
                        "service_type",
                        ArgKind::String,
                        "What we delivered (e.g. purchase, repair, delivery, install).",
                    ),
                    ArgSpec::required(
                        "satisfaction",
                        ArgKind::String,
                        "Quick sentiment summary (e.g. happy, neutral, unhappy, 1-5).",
                    ),
                    ArgSpec::optional(
                        "comments",
                        ArgKind::String,
                        "Optional free-text feedback on the experience.",
                    ),
                ],
            },
        }
    }
}

#[async_trait]
impl ToolHandler for RecordServiceFeedbackTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn call(&self, arguments: &JsonMap) -> anyhow::Result<Value> {
        let record = InteractionRecord::ServiceFeedback {
            email: required_str(arguments, "email")?,
            name: required_str(arguments, "name")?,
            service_type: required_str(arguments, "service_type")?,
            satisfaction: required_str(arguments, "satisfaction")?,
            comments: get_str(arguments, "comments").map(str::to_string),
            recorded_at: Utc::now(),
        };
        self.sink.append(&record)?;

        Ok(json!({ "ok": true, "message": "Thanks for the feedback! We'll share it with the team." }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use serde_json::json;

    use fixfurn_core::catalog::{CatalogIndex, CuratedProduct, PartnerListing};
    use fixfurn_core::domain::interaction::InteractionRecord;
    use fixfurn_core::domain::repair::{RepairRuleRecord, SizeClass, TierBand};
    use fixfurn_core::logsink::InMemoryInteractionSink;
    use fixfurn_core::repair::RuleTable;

    use super::registry;
    use crate::llm::ToolCallRequest;

    fn request(name: &str, arguments: serde_json::Value) -> ToolCallRequest {
        ToolCallRequest {
            name: name.to_string(),
            arguments: arguments.as_object().cloned().unwrap_or_default(),
        }
    }

    fn fixture() -> (super::ToolRegistry, InMemoryInteractionSink) {
        let catalog = CatalogIndex::build(
            vec![CuratedProduct {
                sku: "FF-100".to_string(),
                name: "Oak dining table".to_string(),
                category: "tables".to_string(),
                price_usd: Decimal::new(34_900, 2),
                width_cm: Some(178.0),
                height_cm: Some(75.0),
                depth_cm: Some(90.0),
                material: Some("wood".to_string()),
                color_options: vec!["natural".to_string()],
                in_stock: Some(true),
                link: None,
                description: Some("solid oak, seats six".to_string()),
            }],
            vec![PartnerListing {
                item_id: "80412".to_string(),
                name: "MORBY dining table".to_string(),
                category: "tables".to_string(),
                price_sar: Some(Decimal::from(100)),
                width: Some(185.0),
                height: Some(74.0),
                depth: Some(84.0),
                other_colors: None,
                sellable_online: Some(true),
                link: Some("https://partner.example/items/80412".to_string()),
                short_description: Some("dining table".to_string()),
                designer: None,
            }],
        );

        let band = |min: i64, max: i64, min_days: u32, max_days: u32| TierBand {
            min_price: Decimal::new(min, 2),
            max_price: Decimal::new(max, 2),
            min_days,
            max_days,
        };
        let rules = RuleTable::from_records(vec![RepairRuleRecord {
            issue: "broken_glass".to_string(),
            material: "glass".to_string(),
            size: SizeClass::Large,
            budget: band(12_000, 18_000, 5, 8),
            standard: band(16_000, 24_000, 3, 5),
            rush: band(24_000, 36_000, 1, 2),
        }]);

        let sink = InMemoryInteractionSink::default();
        let registry = registry(Arc::new(catalog), Arc::new(rules), Arc::new(sink.clone()));
        (registry, sink)
    }

    #[tokio::test]
    async fn lookup_returns_source_tagged_usd_prices() {
        let (registry, _sink) = fixture();

        let payload = registry
            .dispatch(&request("lookup_product", json!({ "query": "dining table" })))
            .await
            .expect("lookup should dispatch");

        assert_eq!(payload["ok"], true);
        assert_eq!(payload["result_count"], 2);
        let results = payload["results"].as_array().expect("results array");
        assert_eq!(results[0]["source"], "house_brand");
        assert_eq!(results[1]["source"], "partner_line");
        assert_eq!(results[1]["price_usd"], "26.67");
    }

    #[tokio::test]
    async fn lookup_with_no_match_reports_no_match_not_error() {
        let (registry, _sink) = fixture();

        let payload = registry
            .dispatch(&request("lookup_product", json!({ "query": "grandfather clock" })))
            .await
            .expect("lookup should dispatch");

        assert_eq!(payload["ok"], false);
        assert_eq!(payload["error"], "no_match");
    }

    #[tokio::test]
    async fn estimate_returns_three_tiers() {
        let (registry, sink) = fixture();

        let payload = registry
            .dispatch(&request(
                "estimate_repair",
                json!({ "issue": "broken_glass", "material": "glass", "size_category": "large" }),
            ))
            .await
            .expect("estimate should dispatch");

        assert_eq!(payload["ok"], true);
        let tiers = payload["estimate"]["tiers"].as_array().expect("tiers");
        assert_eq!(tiers.len(), 3);
        assert_eq!(tiers[0]["kind"], "budget");
        assert_eq!(tiers[2]["kind"], "rush");
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn estimate_coverage_gap_is_explicit_and_logged() {
        let (registry, sink) = fixture();

        let payload = registry
            .dispatch(&request(
                "estimate_repair",
                json!({ "issue": "water_damage", "material": "wood", "size_category": "small" }),
            ))
            .await
            .expect("estimate should dispatch");

        assert_eq!(payload["ok"], false);
        assert_eq!(payload["error"], "estimate_unavailable");

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert!(matches!(
            &records[0],
            InteractionRecord::UnresolvedQuestion { question, .. }
                if question.contains("water_damage")
        ));
    }

    #[tokio::test]
    async fn estimate_rejects_unknown_size_bucket() {
        let (registry, _sink) = fixture();

        let payload = registry
            .dispatch(&request(
                "estimate_repair",
                json!({ "issue": "broken_glass", "size_category": "enormous" }),
            ))
            .await
            .expect("estimate should dispatch");

        assert_eq!(payload["ok"], false);
        assert_eq!(payload["error"], "invalid_size");
    }

    #[tokio::test]
    async fn lead_capture_appends_all_fields() {
        let (registry, sink) = fixture();

        let payload = registry
            .dispatch(&request(
                "record_customer_interest",
                json!({
                    "name": "Dana Reeve",
                    "email": "dana@example.com",
                    "intent": "buy the oak dining table",
                    "note": "wants delivery before the holidays",
                }),
            ))
            .await
            .expect("lead capture should dispatch");

        assert_eq!(payload["ok"], true);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        let InteractionRecord::Lead { name, email, intent, note, .. } = &records[0] else {
            panic!("expected a lead record");
        };
        assert_eq!(name, "Dana Reeve");
        assert_eq!(email, "dana@example.com");
        assert_eq!(intent, "buy the oak dining table");
        assert_eq!(note.as_deref(), Some("wants delivery before the holidays"));
    }

    #[tokio::test]
    async fn service_feedback_appends_with_optional_comments_absent() {
        let (registry, sink) = fixture();

        registry
            .dispatch(&request(
                "record_service_feedback",
                json!({
                    "email": "dana@example.com",
                    "name": "Dana Reeve",
                    "service_type": "repair",
                    "satisfaction": "happy",
                }),
            ))
            .await
            .expect("service feedback should dispatch");

        let records = sink.records();
        assert!(matches!(
            &records[0],
            InteractionRecord::ServiceFeedback { comments: None, .. }
        ));
    }
}
