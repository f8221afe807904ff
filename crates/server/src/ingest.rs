use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use fixfurn_core::catalog::{CatalogIndex, CuratedProduct, PartnerListing};
use fixfurn_core::config::DatasetsConfig;
use fixfurn_core::domain::repair::RepairRuleRecord;
use fixfurn_core::repair::RuleTable;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("could not read dataset `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse dataset `{path}`: {source}")]
    ParseFile { path: PathBuf, source: serde_json::Error },
    #[error("repair rule table `{0}` is empty")]
    EmptyRuleTable(PathBuf),
}

/// Loads both product sources and the rule table. The rule table is the one
/// dataset the process cannot run without; a missing partner dataset only
/// degrades the catalog to curated items.
pub fn load_datasets(config: &DatasetsConfig) -> Result<(CatalogIndex, RuleTable), DatasetError> {
    let curated: Vec<CuratedProduct> = read_json(&config.catalog_path)?;

    let partner: Vec<PartnerListing> = if config.partner_catalog_path.exists() {
        read_json(&config.partner_catalog_path)?
    } else {
        warn!(
            event_name = "system.ingest.partner_dataset_missing",
            path = %config.partner_catalog_path.display(),
            "partner dataset not found; catalog will carry curated items only"
        );
        Vec::new()
    };

    let rules: Vec<RepairRuleRecord> = read_json(&config.rules_path)?;
    if rules.is_empty() {
        return Err(DatasetError::EmptyRuleTable(config.rules_path.clone()));
    }

    Ok((CatalogIndex::build(curated, partner), RuleTable::from_records(rules)))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, DatasetError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| DatasetError::ReadFile { path: path.to_path_buf(), source })?;
    serde_json::from_str(&raw)
        .map_err(|source| DatasetError::ParseFile { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::{load_datasets, DatasetError};
    use fixfurn_core::config::DatasetsConfig;
    use fixfurn_core::domain::product::ProductSource;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).expect("write dataset");
        path
    }

    fn curated_json() -> &'static str {
        r#"[{
            "sku": "FF-001",
            "name": "Oak dining table",
            "category": "tables",
            "price_usd": "349.00",
            "width_cm": 178.0,
            "material": "wood"
        }]"#
    }

    fn rules_json() -> &'static str {
        r#"[{
            "issue": "scratch",
            "material": "wood",
            "size": "medium",
            "budget":   { "min_price": "40.00", "max_price": "70.00",  "min_days": 3, "max_days": 5 },
            "standard": { "min_price": "60.00", "max_price": "100.00", "min_days": 2, "max_days": 4 },
            "rush":     { "min_price": "90.00", "max_price": "150.00", "min_days": 1, "max_days": 2 }
        }]"#
    }

    #[test]
    fn loads_both_sources_and_rules() {
        let dir = TempDir::new().expect("temp dir");
        let config = DatasetsConfig {
            catalog_path: write(&dir, "catalog.json", curated_json()),
            partner_catalog_path: write(
                &dir,
                "partner_catalog.json",
                r#"[{ "item_id": "90210", "name": "BILLSTA table", "category": "tables", "price_sar": 100 }]"#,
            ),
            rules_path: write(&dir, "repair_rules.json", rules_json()),
            interaction_log_dir: dir.path().join("logs"),
        };

        let (catalog, rules) = load_datasets(&config).expect("datasets load");
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.count_by_source(ProductSource::HouseBrand), 1);
        assert_eq!(catalog.count_by_source(ProductSource::PartnerLine), 1);
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn missing_partner_dataset_degrades_to_curated_only() {
        let dir = TempDir::new().expect("temp dir");
        let config = DatasetsConfig {
            catalog_path: write(&dir, "catalog.json", curated_json()),
            partner_catalog_path: dir.path().join("nope.json"),
            rules_path: write(&dir, "repair_rules.json", rules_json()),
            interaction_log_dir: dir.path().join("logs"),
        };

        let (catalog, _rules) = load_datasets(&config).expect("datasets load");
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.count_by_source(ProductSource::PartnerLine), 0);
    }

    #[test]
    fn missing_rule_table_is_fatal() {
        let dir = TempDir::new().expect("temp dir");
        let config = DatasetsConfig {
            catalog_path: write(&dir, "catalog.json", curated_json()),
            partner_catalog_path: dir.path().join("nope.json"),
            rules_path: dir.path().join("missing_rules.json"),
            interaction_log_dir: dir.path().join("logs"),
        };

        let error = load_datasets(&config).expect_err("missing rule table must fail");
        assert!(matches!(error, DatasetError::ReadFile { .. }));
    }

    #[test]
    fn empty_rule_table_is_fatal() {
        let dir = TempDir::new().expect("temp dir");
        let config = DatasetsConfig {
            catalog_path: write(&dir, "catalog.json", curated_json()),
            partner_catalog_path: dir.path().join("nope.json"),
            rules_path: write(&dir, "repair_rules.json", "[]"),
            interaction_log_dir: dir.path().join("logs"),
        };

        let error = load_datasets(&config).expect_err("empty rule table must fail");
        assert!(matches!(error, DatasetError::EmptyRuleTable(_)));
    }

    #[test]
    fn malformed_rules_fail_with_parse_error() {
        let dir = TempDir::new().expect("temp dir");
        let config = DatasetsConfig {
            catalog_path: write(&dir, "catalog.json", curated_json()),
            partner_catalog_path: dir.path().join("nope.json"),
            rules_path: write(&dir, "repair_rules.json", "{ not json"),
            interaction_log_dir: dir.path().join("logs"),
        };

        let error = load_datasets(&config).expect_err("malformed rules must fail");
        assert!(matches!(error, DatasetError::ParseFile { .. }));
    }
}
