use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use fixfurn_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "datasets.catalog_path",
        &config.datasets.catalog_path.display().to_string(),
        source("datasets.catalog_path", "FIXFURN_CATALOG_PATH"),
    ));
    lines.push(render_line(
        "datasets.partner_catalog_path",
        &config.datasets.partner_catalog_path.display().to_string(),
        source("datasets.partner_catalog_path", "FIXFURN_PARTNER_CATALOG_PATH"),
    ));
    lines.push(render_line(
        "datasets.rules_path",
        &config.datasets.rules_path.display().to_string(),
        source("datasets.rules_path", "FIXFURN_RULES_PATH"),
    ));
    lines.push(render_line(
        "datasets.interaction_log_dir",
        &config.datasets.interaction_log_dir.display().to_string(),
        source("datasets.interaction_log_dir", "FIXFURN_LOG_DIR"),
    ));

    let llm_api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line("llm.api_key", llm_api_key, source("llm.api_key", "FIXFURN_LLM_API_KEY")));
    lines.push(render_line("llm.model", &config.llm.model, source("llm.model", "FIXFURN_LLM_MODEL")));
    lines.push(render_line(
        "llm.base_url",
        &config.llm.base_url,
        source("llm.base_url", "FIXFURN_LLM_BASE_URL"),
    ));
    lines.push(render_line(
        "llm.timeout_secs",
        &config.llm.timeout_secs.to_string(),
        source("llm.timeout_secs", "FIXFURN_LLM_TIMEOUT_SECS"),
    ));

    lines.push(render_line(
        "agent.max_tool_iterations",
        &config.agent.max_tool_iterations.to_string(),
        source("agent.max_tool_iterations", "FIXFURN_AGENT_MAX_TOOL_ITERATIONS"),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", "FIXFURN_SERVER_BIND_ADDRESS"),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", "FIXFURN_SERVER_PORT"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "FIXFURN_LOGGING_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "FIXFURN_LOGGING_FORMAT"),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("fixfurn.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/fixfurn.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(doc: &Value, key_path: &str) -> bool {
    let mut cursor = doc;
    for segment in key_path.split('.') {
        match cursor.get(segment) {
            Some(next) => cursor = next,
            None => return false,
        }
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("  {key} = {value}  [{source}]")
}
