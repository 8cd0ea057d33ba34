use chatdesk_core::{ChatdeskError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub mod env_substitution;

pub use env_substitution::substitute_env_vars;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub cors: CorsSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub support: SupportSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Overrides the provider's public endpoint, mostly for proxies and tests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// AWS region, Bedrock only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// AWS profile, Bedrock only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Gemini,
    OpenAi,
    Bedrock,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini",
            LlmProvider::OpenAi => "openai",
            LlmProvider::Bedrock => "bedrock",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, LlmProvider::Bedrock)
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = ChatdeskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(LlmProvider::Gemini),
            "openai" => Ok(LlmProvider::OpenAi),
            "bedrock" => Ok(LlmProvider::Bedrock),
            other => Err(ChatdeskError::Config(format!(
                "Unsupported LLM provider '{other}'. Supported providers: gemini, openai, bedrock"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsSettings {
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupportSettings {
    /// Replaces the built-in knowledge base text when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge_file: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from an optional YAML file, then apply environment
    /// overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => Self::parse_file(path)?,
            Some(path) => {
                debug!("Config file {:?} not found, using defaults", path);
                AppConfig::default()
            }
            None => AppConfig::default(),
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::parse_file(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config = Self::parse_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ChatdeskError::Config(format!("Failed to read config file: {}", e)))?;
        Self::parse_str(&content)
    }

    fn parse_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(AppConfig::default());
        }

        let mut document: serde_json::Value = serde_yaml::from_str(yaml)
            .map_err(|e| ChatdeskError::Config(format!("Failed to parse YAML: {}", e)))?;
        if document.is_null() {
            return Ok(AppConfig::default());
        }

        substitute_env_vars(&mut document)?;

        serde_json::from_value(document)
            .map_err(|e| ChatdeskError::Config(format!("Invalid configuration: {}", e)))
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| env::var(name).ok());
    }

    /// Environment-style overrides. Unparseable numeric values are ignored
    /// and the file or default value is kept.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(provider) = lookup("LLM_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Some(key) = lookup("LLM_API_KEY").filter(|k| !k.is_empty()) {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(base_url) = lookup("LLM_BASE_URL") {
            self.llm.base_url = Some(base_url);
        }
        if let Some(region) = lookup("AWS_REGION") {
            self.llm.region = Some(region);
        }
        if let Some(window) = lookup("RATE_LIMIT_WINDOW_MS").and_then(|v| v.parse().ok()) {
            self.rate_limit.window_ms = window;
        }
        if let Some(max) = lookup("RATE_LIMIT_MAX_REQUESTS").and_then(|v| v.parse().ok()) {
            self.rate_limit.max_requests = max;
        }
        if let Some(origin) = lookup("ALLOWED_ORIGIN") {
            self.cors.allowed_origin = origin;
        }
        if let Some(path) = lookup("DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(path) = lookup("KNOWLEDGE_FILE") {
            self.support.knowledge_file = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(ChatdeskError::Config("Server port cannot be 0".into()));
        }
        self.llm.provider_kind()?;
        if self.llm.model.trim().is_empty() {
            return Err(ChatdeskError::Config("Model cannot be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ChatdeskError::Config(
                "Temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.rate_limit.window_ms == 0 {
            return Err(ChatdeskError::Config(
                "Rate limit window must be greater than 0".into(),
            ));
        }
        if self.rate_limit.max_requests == 0 {
            return Err(ChatdeskError::Config(
                "Rate limit ceiling must be greater than 0".into(),
            ));
        }
        if self.cors.allowed_origin.trim().is_empty() {
            return Err(ChatdeskError::Config("Allowed origin cannot be empty".into()));
        }
        Ok(())
    }

    pub fn default_config_path() -> PathBuf {
        PathBuf::from("chatdesk.yaml")
    }
}

impl LlmSettings {
    pub fn provider_kind(&self) -> Result<LlmProvider> {
        self.provider.parse()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: None,
            model: default_model(),
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            region: None,
            profile: None,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
        }
    }
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allowed_origin: default_allowed_origin(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3001 }
fn default_provider() -> String { "gemini".to_string() }
fn default_model() -> String { "gemini-1.5-flash".to_string() }
fn default_temperature() -> f32 { 0.7 }
fn default_max_tokens() -> u32 { 1024 }
fn default_timeout_secs() -> u64 { 30 }
fn default_window_ms() -> u64 { 15 * 60 * 1000 }
fn default_max_requests() -> u32 { 100 }
fn default_allowed_origin() -> String { "http://localhost:3000".to_string() }

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("chatdesk"))
        .unwrap_or_else(|| PathBuf::from("./.chatdesk"))
        .join("chatdesk.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
server:
  port: 8080

llm:
  provider: openai
  api_key: sk-test
  model: gpt-4o-mini
  temperature: 0.3

rate_limit:
  window_ms: 60000
  max_requests: 20

cors:
  allowed_origin: https://shop.example.com
"#;

        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.llm.provider_kind().unwrap(), LlmProvider::OpenAi);
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.llm.temperature, 0.3);
        assert_eq!(config.rate_limit.window(), Duration::from_secs(60));
        assert_eq!(config.cors.allowed_origin, "https://shop.example.com");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_yaml_str("").unwrap();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.window_ms, 900_000);
    }

    #[test]
    fn test_unsupported_provider_is_config_error() {
        let yaml = r#"
llm:
  provider: llamafile
"#;
        let err = AppConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ChatdeskError::Config(_)));
        assert!(err.to_string().contains("llamafile"));
    }

    #[test]
    fn test_validation() {
        let yaml = r#"
llm:
  model: ""
"#;
        assert!(AppConfig::from_yaml_str(yaml).is_err());

        let yaml = r#"
rate_limit:
  max_requests: 0
"#;
        assert!(AppConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_overrides_take_precedence_over_file() {
        let mut config = AppConfig::from_yaml_str("server:\n  port: 8080\n").unwrap();
        let vars: HashMap<&str, &str> = [
            ("PORT", "9090"),
            ("LLM_PROVIDER", "bedrock"),
            ("LLM_API_KEY", ""),
            ("RATE_LIMIT_MAX_REQUESTS", "not-a-number"),
            ("ALLOWED_ORIGIN", "*"),
            ("DATABASE_PATH", "/tmp/chatdesk-test.db"),
        ]
        .into_iter()
        .collect();

        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.llm.provider_kind().unwrap(), LlmProvider::Bedrock);
        assert_eq!(config.llm.api_key, None);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.cors.allowed_origin, "*");
        assert_eq!(config.database.path, PathBuf::from("/tmp/chatdesk-test.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("absent.yaml");
        let config = AppConfig::load(Some(&path)).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("chatdesk.yaml");
        std::fs::write(&path, "llm:\n  model: gemini-1.5-pro\n").unwrap();

        let config = AppConfig::from_yaml(&path).unwrap();
        assert_eq!(config.llm.model, "gemini-1.5-pro");
    }
}
