use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use fixfurn_cli::commands::{config, doctor};
use serde_json::Value;
use tempfile::TempDir;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const MANAGED_VARS: &[&str] = &[
    "FIXFURN_CATALOG_PATH",
    "FIXFURN_PARTNER_CATALOG_PATH",
    "FIXFURN_RULES_PATH",
    "FIXFURN_LOG_DIR",
    "FIXFURN_LLM_API_KEY",
];

fn with_env(vars: &[(&str, &str)], test: impl FnOnce()) {
    let lock = ENV_LOCK.get_or_init(|| Mutex::new(()));
    let _guard = match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    for var in MANAGED_VARS {
        env::remove_var(var);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test();

    for var in MANAGED_VARS {
        env::remove_var(var);
    }
}

fn dataset_dir() -> TempDir {
    let dir = TempDir::new().expect("temp dir");

    fs::write(
        dir.path().join("catalog.json"),
        r#"[{ "sku": "FF-001", "name": "Oak dining table", "category": "tables", "price_usd": "349.00" }]"#,
    )
    .expect("write catalog");

    fs::write(
        dir.path().join("repair_rules.json"),
        r#"[{
            "issue": "scratch", "material": "wood", "size": "medium",
            "budget":   { "min_price": "40.00", "max_price": "70.00",  "min_days": 3, "max_days": 5 },
            "standard": { "min_price": "60.00", "max_price": "100.00", "min_days": 2, "max_days": 4 },
            "rush":     { "min_price": "90.00", "max_price": "150.00", "min_days": 1, "max_days": 2 }
        }]"#,
    )
    .expect("write rules");

    dir
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

#[test]
fn doctor_passes_with_datasets_and_credentials() {
    let dir = dataset_dir();
    let catalog = dir.path().join("catalog.json");
    let rules = dir.path().join("repair_rules.json");
    let partner = dir.path().join("absent_partner.json");

    with_env(
        &[
            ("FIXFURN_CATALOG_PATH", catalog.to_str().expect("utf8 path")),
            ("FIXFURN_PARTNER_CATALOG_PATH", partner.to_str().expect("utf8 path")),
            ("FIXFURN_RULES_PATH", rules.to_str().expect("utf8 path")),
            ("FIXFURN_LLM_API_KEY", "test-key"),
        ],
        || {
            let payload = parse_payload(&doctor::run(true));
            assert_eq!(payload["overall_status"], "pass");

            let checks = payload["checks"].as_array().expect("checks array");
            assert_eq!(checks.len(), 3);
            assert_eq!(checks[1]["name"], "datasets");
            assert_eq!(checks[1]["status"], "pass");
            let details = checks[1]["details"].as_str().unwrap_or_default();
            assert!(details.contains("1 products"));
            assert!(details.contains("scratch"));
        },
    );
}

#[test]
fn doctor_fails_without_api_key_and_skips_downstream_checks() {
    with_env(&[], || {
        let payload = parse_payload(&doctor::run(true));
        assert_eq!(payload["overall_status"], "fail");

        let checks = payload["checks"].as_array().expect("checks array");
        assert_eq!(checks[0]["name"], "config_validation");
        assert_eq!(checks[0]["status"], "fail");
        assert_eq!(checks[1]["status"], "skipped");
        assert_eq!(checks[2]["status"], "skipped");
    });
}

#[test]
fn doctor_fails_on_missing_rule_table() {
    let dir = dataset_dir();
    let catalog = dir.path().join("catalog.json");
    let missing_rules = dir.path().join("no_rules_here.json");

    with_env(
        &[
            ("FIXFURN_CATALOG_PATH", catalog.to_str().expect("utf8 path")),
            ("FIXFURN_RULES_PATH", missing_rules.to_str().expect("utf8 path")),
            ("FIXFURN_LLM_API_KEY", "test-key"),
        ],
        || {
            let payload = parse_payload(&doctor::run(true));
            assert_eq!(payload["overall_status"], "fail");

            let checks = payload["checks"].as_array().expect("checks array");
            assert_eq!(checks[1]["name"], "datasets");
            assert_eq!(checks[1]["status"], "fail");
        },
    );
}

#[test]
fn config_redacts_the_api_key_and_attributes_env_sources() {
    with_env(&[("FIXFURN_LLM_API_KEY", "very-secret-key")], || {
        let output = config::run();

        assert!(output.contains("llm.api_key = <redacted>"));
        assert!(!output.contains("very-secret-key"));
        assert!(output.contains("env (FIXFURN_LLM_API_KEY)"));
        assert!(output.contains("agent.max_tool_iterations = 6  [default]"));
    });
}
