use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use fixfurn_agent::gemini::GeminiBackend;
use fixfurn_agent::handlers;
use fixfurn_agent::orchestrator::{Orchestrator, TurnLimits};
use fixfurn_core::config::{AppConfig, ConfigError, LoadOptions};
use fixfurn_core::domain::product::ProductSource;
use fixfurn_core::logsink::JsonlInteractionSink;

use crate::ingest::{load_datasets, DatasetError};

/// Fallback system prompt when `agent.system_prompt_path` is not set.
const DEFAULT_SYSTEM_PROMPT: &str = "\
You are the Fix&Furn concierge for a furniture sales and repair shop. \
Answer briefly and warmly. Use lookup_product for anything about stock, \
sizes, or prices; use estimate_repair for repair quotes and never invent \
prices yourself; when an estimate is unavailable say so plainly. Capture \
buying or booking interest with record_customer_interest, log questions \
you cannot answer with record_feedback, and log post-service impressions \
with record_service_feedback. All prices you quote are in USD.";

pub struct Application {
    pub config: AppConfig,
    pub orchestrator: Arc<Orchestrator>,
    pub catalog_count: usize,
    pub partner_count: usize,
    pub rule_count: usize,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Datasets(#[from] DatasetError),
    #[error("could not open interaction log sink: {0}")]
    LogSink(#[source] std::io::Error),
    #[error("could not read system prompt `{path}`: {source}")]
    SystemPrompt { path: PathBuf, source: std::io::Error },
    #[error("could not construct reasoning backend client: {0}")]
    Backend(#[source] reqwest::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let (catalog, rules) = load_datasets(&config.datasets)?;
    let catalog_count = catalog.len();
    let partner_count = catalog.count_by_source(ProductSource::PartnerLine);
    let rule_count = rules.len();
    info!(
        event_name = "system.bootstrap.datasets_loaded",
        correlation_id = "bootstrap",
        catalog_count,
        partner_count,
        rule_count,
        "catalog and rule table loaded"
    );

    let sink = JsonlInteractionSink::create(&config.datasets.interaction_log_dir)
        .map_err(BootstrapError::LogSink)?;

    let system_prompt = match &config.agent.system_prompt_path {
        Some(path) => fs::read_to_string(path)
            .map_err(|source| BootstrapError::SystemPrompt { path: path.clone(), source })?,
        None => DEFAULT_SYSTEM_PROMPT.to_string(),
    };

    let backend = GeminiBackend::from_config(&config.llm).map_err(BootstrapError::Backend)?;
    let registry = handlers::registry(Arc::new(catalog), Arc::new(rules), Arc::new(sink));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(backend),
        registry,
        system_prompt,
        TurnLimits { max_tool_iterations: config.agent.max_tool_iterations },
    ));

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        "application bootstrap complete"
    );

    Ok(Application { config, orchestrator, catalog_count, partner_count, rule_count })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use fixfurn_core::config::{AppConfig, ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn dataset_overrides(dir: &TempDir) -> ConfigOverrides {
        let catalog_path = dir.path().join("catalog.json");
        fs::write(
            &catalog_path,
            r#"[{ "sku": "FF-001", "name": "Oak dining table", "category": "tables", "price_usd": "349.00" }]"#,
        )
        .expect("write catalog");

        let rules_path = dir.path().join("repair_rules.json");
        fs::write(
            &rules_path,
            r#"[{
                "issue": "scratch", "material": "wood", "size": "medium",
                "budget":   { "min_price": "40.00", "max_price": "70.00",  "min_days": 3, "max_days": 5 },
                "standard": { "min_price": "60.00", "max_price": "100.00", "min_days": 2, "max_days": 4 },
                "rush":     { "min_price": "90.00", "max_price": "150.00", "min_days": 1, "max_days": 2 }
            }]"#,
        )
        .expect("write rules");

        ConfigOverrides {
            catalog_path: Some(catalog_path),
            partner_catalog_path: Some(dir.path().join("absent_partner.json")),
            rules_path: Some(rules_path),
            interaction_log_dir: Some(dir.path().join("logs")),
            llm_api_key: Some("test-key".to_string()),
            ..ConfigOverrides::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_succeeds_with_valid_datasets() {
        let dir = TempDir::new().expect("temp dir");

        let app = bootstrap(LoadOptions {
            overrides: dataset_overrides(&dir),
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed");

        assert_eq!(app.catalog_count, 1);
        assert_eq!(app.partner_count, 0);
        assert_eq!(app.rule_count, 1);
        assert_eq!(app.orchestrator.tool_specs().len(), 5);
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_rule_table() {
        let dir = TempDir::new().expect("temp dir");
        let mut overrides = dataset_overrides(&dir);
        overrides.rules_path = Some(dir.path().join("missing_rules.json"));

        let result =
            bootstrap(LoadOptions { overrides, ..LoadOptions::default() }).await;
        assert!(result.is_err());
    }
}
