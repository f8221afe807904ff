use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub datasets: DatasetsConfig,
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatasetsConfig {
    pub catalog_path: PathBuf,
    pub partner_catalog_path: PathBuf,
    pub rules_path: PathBuf,
    pub interaction_log_dir: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub max_tool_iterations: u32,
    pub system_prompt_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub catalog_path: Option<PathBuf>,
    pub partner_catalog_path: Option<PathBuf>,
    pub rules_path: Option<PathBuf>,
    pub interaction_log_dir: Option<PathBuf>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub max_tool_iterations: Option<u32>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            datasets: DatasetsConfig {
                catalog_path: PathBuf::from("data/catalog.json"),
                partner_catalog_path: PathBuf::from("data/partner_catalog.json"),
                rules_path: PathBuf::from("data/repair_rules.json"),
                interaction_log_dir: PathBuf::from("logs"),
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-2.5-flash".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            agent: AgentConfig { max_tool_iterations: 6, system_prompt_path: None },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("fixfurn.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(datasets) = patch.datasets {
            if let Some(catalog_path) = datasets.catalog_path {
                self.datasets.catalog_path = catalog_path;
            }
            if let Some(partner_catalog_path) = datasets.partner_catalog_path {
                self.datasets.partner_catalog_path = partner_catalog_path;
            }
            if let Some(rules_path) = datasets.rules_path {
                self.datasets.rules_path = rules_path;
            }
            if let Some(interaction_log_dir) = datasets.interaction_log_dir {
                self.datasets.interaction_log_dir = interaction_log_dir;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(max_tool_iterations) = agent.max_tool_iterations {
                self.agent.max_tool_iterations = max_tool_iterations;
            }
            if let Some(system_prompt_path) = agent.system_prompt_path {
                self.agent.system_prompt_path = Some(system_prompt_path);
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("FIXFURN_CATALOG_PATH") {
            self.datasets.catalog_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("FIXFURN_PARTNER_CATALOG_PATH") {
            self.datasets.partner_catalog_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("FIXFURN_RULES_PATH") {
            self.datasets.rules_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("FIXFURN_LOG_DIR") {
            self.datasets.interaction_log_dir = PathBuf::from(value);
        }

        if let Some(value) = read_env("FIXFURN_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("FIXFURN_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("FIXFURN_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("FIXFURN_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("FIXFURN_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("FIXFURN_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("FIXFURN_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("FIXFURN_AGENT_MAX_TOOL_ITERATIONS") {
            self.agent.max_tool_iterations =
                parse_u32("FIXFURN_AGENT_MAX_TOOL_ITERATIONS", &value)?;
        }
        if let Some(value) = read_env("FIXFURN_AGENT_SYSTEM_PROMPT_PATH") {
            self.agent.system_prompt_path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("FIXFURN_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("FIXFURN_SERVER_PORT") {
            self.server.port = parse_u16("FIXFURN_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("FIXFURN_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("FIXFURN_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level = read_env("FIXFURN_LOGGING_LEVEL").or_else(|| read_env("FIXFURN_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("FIXFURN_LOGGING_FORMAT").or_else(|| read_env("FIXFURN_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(catalog_path) = overrides.catalog_path {
            self.datasets.catalog_path = catalog_path;
        }
        if let Some(partner_catalog_path) = overrides.partner_catalog_path {
            self.datasets.partner_catalog_path = partner_catalog_path;
        }
        if let Some(rules_path) = overrides.rules_path {
            self.datasets.rules_path = rules_path;
        }
        if let Some(interaction_log_dir) = overrides.interaction_log_dir {
            self.datasets.interaction_log_dir = interaction_log_dir;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(max_tool_iterations) = overrides.max_tool_iterations {
            self.agent.max_tool_iterations = max_tool_iterations;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_datasets(&self.datasets)?;
        validate_llm(&self.llm)?;
        validate_agent(&self.agent)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("fixfurn.toml"), PathBuf::from("config/fixfurn.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_datasets(datasets: &DatasetsConfig) -> Result<(), ConfigError> {
    for (field, path) in [
        ("datasets.catalog_path", &datasets.catalog_path),
        ("datasets.partner_catalog_path", &datasets.partner_catalog_path),
        ("datasets.rules_path", &datasets.rules_path),
        ("datasets.interaction_log_dir", &datasets.interaction_log_dir),
    ] {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(format!("{field} must not be empty")));
        }
    }
    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    let missing =
        llm.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true);
    if missing {
        return Err(ConfigError::Validation(
            "llm.api_key is required (set FIXFURN_LLM_API_KEY or [llm] api_key)".to_string(),
        ));
    }

    if llm.base_url.trim().is_empty()
        || !(llm.base_url.starts_with("http://") || llm.base_url.starts_with("https://"))
    {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    Ok(())
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.max_tool_iterations == 0 || agent.max_tool_iterations > 32 {
        return Err(ConfigError::Validation(
            "agent.max_tool_iterations must be in range 1..=32".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    datasets: Option<DatasetsPatch>,
    llm: Option<LlmPatch>,
    agent: Option<AgentPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatasetsPatch {
    catalog_path: Option<PathBuf>,
    partner_catalog_path: Option<PathBuf>,
    rules_path: Option<PathBuf>,
    interaction_log_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    max_tool_iterations: Option<u32>,
    system_prompt_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
