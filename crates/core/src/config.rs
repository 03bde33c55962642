//! Configuration management for the pollkit answering service.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Environment variables (`POLLKIT_*`)
//! - Command-line flags
//! - Config files (pollkit.yaml)
//!
//! Precedence: CLI flags > environment variables > config file > defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Main application configuration.
///
/// Holds everything a request handler needs: backend endpoints, probe
/// intervals, timeouts, and output limits. A single instance is built at
/// startup and shared by reference with all handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    pub bind: String,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Passage retrieval settings
    pub retrieval: RetrievalConfig,

    /// Answer generation settings
    pub generation: GenerationConfig,

    /// Optional audit endpoint; when unset, audit records are dropped
    pub audit_endpoint: Option<String>,
}

/// Passage retrieval configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// Base URL of the remote retrieval sidecar
    pub sidecar_endpoint: String,

    /// Seconds between sidecar health re-probes
    pub probe_interval_secs: u64,

    /// Timeout for the sidecar health probe
    pub health_timeout_secs: u64,

    /// Timeout for the actual retrieval call
    pub retrieve_timeout_secs: u64,

    /// Passages requested from the sidecar
    pub remote_top_k: usize,

    /// Passages returned by the local fallback index
    pub local_top_k: usize,

    /// JSON snapshot of ingested chunks backing the local fallback index
    pub chunk_snapshot: Option<PathBuf>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            sidecar_endpoint: "http://localhost:8001".to_string(),
            probe_interval_secs: 30,
            health_timeout_secs: 2,
            retrieve_timeout_secs: 15,
            remote_top_k: 5,
            local_top_k: 3,
            chunk_snapshot: None,
        }
    }
}

/// Answer generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Base URL of the local model runtime
    pub local_endpoint: String,

    /// Model served by the local runtime
    pub local_model: String,

    /// Base URL of the cloud fallback API (OpenAI-compatible)
    pub cloud_endpoint: String,

    /// Model used for the cloud fallback
    pub cloud_model: String,

    /// Environment variable holding the cloud API key
    pub cloud_api_key_env: String,

    /// Hard cap on generated tokens per answer
    pub max_tokens: u32,

    /// Sampling temperature; kept low for citation-grounded answers
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            local_endpoint: "http://localhost:11434".to_string(),
            local_model: "llama3.2".to_string(),
            cloud_endpoint: "https://api.openai.com".to_string(),
            cloud_model: "gpt-4o-mini".to_string(),
            cloud_api_key_env: "POLLKIT_CLOUD_API_KEY".to_string(),
            max_tokens: 512,
            temperature: 0.1,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    server: Option<ServerConfig>,
    retrieval: Option<RetrievalConfig>,
    generation: Option<GenerationConfig>,
    audit: Option<AuditConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServerConfig {
    bind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AuditConfig {
    endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8088".to_string(),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            retrieval: RetrievalConfig::default(),
            generation: GenerationConfig::default(),
            audit_endpoint: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `POLLKIT_CONFIG`: Path to config file
    /// - `POLLKIT_BIND`: Server bind address
    /// - `POLLKIT_SIDECAR`: Remote retrieval sidecar endpoint
    /// - `POLLKIT_LOCAL_LLM`: Local model runtime endpoint
    /// - `POLLKIT_CLOUD_LLM`: Cloud fallback endpoint
    /// - `POLLKIT_AUDIT`: Audit sink endpoint
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an explicit config file path.
    ///
    /// An explicit path takes precedence over `POLLKIT_CONFIG`.
    pub fn load_from(config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        config.config_file = config_file
            .or_else(|| std::env::var("POLLKIT_CONFIG").ok().map(PathBuf::from));

        // Load from YAML config file if it exists
        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("pollkit.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(bind) = std::env::var("POLLKIT_BIND") {
            config.bind = bind;
        }

        if let Ok(sidecar) = std::env::var("POLLKIT_SIDECAR") {
            config.retrieval.sidecar_endpoint = sidecar;
        }

        if let Ok(local) = std::env::var("POLLKIT_LOCAL_LLM") {
            config.generation.local_endpoint = local;
        }

        if let Ok(cloud) = std::env::var("POLLKIT_CLOUD_LLM") {
            config.generation.cloud_endpoint = cloud;
        }

        if let Ok(audit) = std::env::var("POLLKIT_AUDIT") {
            config.audit_endpoint = Some(audit);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &PathBuf) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(server) = config_file.server {
            if let Some(bind) = server.bind {
                result.bind = bind;
            }
        }

        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }

        if let Some(generation) = config_file.generation {
            result.generation = generation;
        }

        if let Some(audit) = config_file.audit {
            result.audit_endpoint = audit.endpoint;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Merges command-line flags with the loaded configuration, giving
    /// precedence to CLI flags over environment variables.
    pub fn with_overrides(
        mut self,
        bind: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(bind) = bind {
            self.bind = bind;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Resolve the cloud generation API key from the configured env var.
    ///
    /// Returns `None` when the variable is unset; the generation gateway
    /// then treats the cloud backend as unavailable.
    pub fn resolve_cloud_api_key(&self) -> Option<String> {
        std::env::var(&self.generation.cloud_api_key_env).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.bind, "127.0.0.1:8088");
        assert_eq!(config.retrieval.probe_interval_secs, 30);
        assert_eq!(config.retrieval.remote_top_k, 5);
        assert_eq!(config.retrieval.local_top_k, 3);
        assert_eq!(config.generation.max_tokens, 512);
        assert!(config.audit_endpoint.is_none());
    }

    #[test]
    fn test_merge_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server:
  bind: "0.0.0.0:9000"
retrieval:
  sidecarEndpoint: "http://sidecar:8001"
  probeIntervalSecs: 10
  healthTimeoutSecs: 2
  retrieveTimeoutSecs: 15
  remoteTopK: 8
  localTopK: 2
audit:
  endpoint: "http://audit:7000/interactions"
logging:
  level: "debug"
  color: false
"#
        )
        .unwrap();

        let mut config = AppConfig::default();
        let merged = config.merge_yaml(&file.path().to_path_buf()).unwrap();

        assert_eq!(merged.bind, "0.0.0.0:9000");
        assert_eq!(merged.retrieval.sidecar_endpoint, "http://sidecar:8001");
        assert_eq!(merged.retrieval.remote_top_k, 8);
        assert_eq!(
            merged.audit_endpoint.as_deref(),
            Some("http://audit:7000/interactions")
        );
        assert_eq!(merged.log_level.as_deref(), Some("debug"));
        assert!(merged.no_color);
        // Untouched sections keep defaults
        assert_eq!(merged.generation.max_tokens, 512);
    }

    #[test]
    fn test_load_from_keeps_file_log_level_without_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "logging:\n  level: \"debug\"").unwrap();

        std::env::remove_var("RUST_LOG");
        let config = AppConfig::load_from(Some(file.path().to_path_buf())).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_with_overrides() {
        let config =
            AppConfig::default().with_overrides(Some("127.0.0.1:1234".to_string()), None, true, true);

        assert_eq!(config.bind, "127.0.0.1:1234");
        assert!(config.verbose);
        assert!(config.no_color);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }
}
