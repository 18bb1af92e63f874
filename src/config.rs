//! Server configuration

use serde::{Deserialize, Serialize};

use crate::consolidate::ConsolidateOptions;

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Cues per translation batch
    pub batch_size: usize,

    /// Concurrent batches per quality-pass group
    pub quality_concurrency: usize,

    /// Per-batch timeout in milliseconds (0 disables)
    pub batch_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            quality_concurrency: 3,
            batch_timeout_ms: 45_000,
        }
    }
}

/// Google web-endpoint provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleProviderConfig {
    /// Endpoint URL
    pub endpoint: String,

    /// HTTP client timeout in seconds
    pub timeout_secs: u64,

    /// Retries for transient failures
    pub max_retries: u32,
}

impl Default for GoogleProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://translate.googleapis.com/translate_a/single".to_string(),
            timeout_secs: 15,
            max_retries: 3,
        }
    }
}

/// OpenAI-compatible provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiProviderConfig {
    /// API base URL (a chat-completions route is appended)
    pub base_url: String,

    /// Model name
    pub model: String,

    /// API key; falls back to the OPENAI_API_KEY environment variable
    pub api_key: Option<String>,

    /// HTTP client timeout in seconds
    pub timeout_secs: u64,

    /// Retries for transient failures
    pub max_retries: u32,
}

impl Default for OpenAiProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            timeout_secs: 60,
            max_retries: 3,
        }
    }
}

/// Provider tier selection and per-provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Fast baseline tier ("google" or "openai")
    pub quick: String,

    /// Quality tier ("google" or "openai")
    pub quality: String,

    /// Google provider settings
    pub google: GoogleProviderConfig,

    /// OpenAI provider settings
    pub openai: OpenAiProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            quick: "google".to_string(),
            quality: "openai".to_string(),
            google: GoogleProviderConfig::default(),
            openai: OpenAiProviderConfig::default(),
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordCacheConfig {
    /// Maximum number of stored records
    pub max_records: usize,

    /// Time-to-live for stored records in seconds
    pub ttl_secs: u64,

    /// Maximum cues accepted per record
    pub max_cues_per_record: usize,
}

impl Default for RecordCacheConfig {
    fn default() -> Self {
        Self {
            max_records: 256,
            ttl_secs: 86_400, // 24 hours
            max_cues_per_record: 20_000,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Enable CORS
    pub cors_enabled: bool,

    /// Scheduler configuration
    pub scheduler: SchedulerConfig,

    /// ASR consolidation options
    pub consolidate: ConsolidateOptions,

    /// Provider configuration
    pub providers: ProvidersConfig,

    /// Record store configuration
    pub cache: RecordCacheConfig,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7979,
            cors_enabled: true,
            scheduler: SchedulerConfig::default(),
            consolidate: ConsolidateOptions::default(),
            providers: ProvidersConfig::default(),
            cache: RecordCacheConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
