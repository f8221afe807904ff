use secrecy::ExposeSecret;
use serde::Serialize;

use fixfurn_core::config::{AppConfig, LoadOptions};
use fixfurn_server::ingest::load_datasets;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_datasets(&config));
            checks.push(check_llm_credentials(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "datasets",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "llm_credentials",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    let overall_status = if checks.iter().any(|check| check.status == CheckStatus::Fail) {
        CheckStatus::Fail
    } else {
        CheckStatus::Pass
    };

    let summary = match overall_status {
        CheckStatus::Pass => "all preflight checks passed".to_string(),
        _ => "one or more preflight checks failed".to_string(),
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_datasets(config: &AppConfig) -> DoctorCheck {
    match load_datasets(&config.datasets) {
        Ok((catalog, rules)) => DoctorCheck {
            name: "datasets",
            status: CheckStatus::Pass,
            details: format!(
                "catalog holds {} products, rule table covers {} keys across issues [{}]",
                catalog.len(),
                rules.len(),
                rules.issues().collect::<Vec<_>>().join(", "),
            ),
        },
        Err(error) => DoctorCheck {
            name: "datasets",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_llm_credentials(config: &AppConfig) -> DoctorCheck {
    let key_present = config
        .llm
        .api_key
        .as_ref()
        .map(|key| !key.expose_secret().trim().is_empty())
        .unwrap_or(false);

    if key_present {
        DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Pass,
            details: format!(
                "api key present, model `{}` via {}",
                config.llm.model, config.llm.base_url
            ),
        }
    } else {
        DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Fail,
            details: "llm.api_key is not configured".to_string(),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![
        format!("doctor: {}", status_label(report.overall_status)),
        report.summary.clone(),
        String::new(),
    ];

    for check in &report.checks {
        lines.push(format!("[{}] {}: {}", status_label(check.status), check.name, check.details));
    }

    lines.join("\n")
}

fn status_label(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "pass",
        CheckStatus::Fail => "fail",
        CheckStatus::Skipped => "skipped",
    }
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
