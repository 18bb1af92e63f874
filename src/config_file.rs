//! Configuration file support
//!
//! Loads server configuration from TOML files.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{
    GoogleProviderConfig, OpenAiProviderConfig, ProvidersConfig, RecordCacheConfig,
    SchedulerConfig, ServerConfig,
};
use crate::consolidate::{ConsolidateOptions, TimingStrategy};

/// Configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Server settings
    pub server: ServerSettings,
    /// Scheduler settings
    pub scheduler: Option<SchedulerSettings>,
    /// ASR consolidation settings
    pub consolidate: Option<ConsolidateSettings>,
    /// Provider settings
    pub providers: Option<ProvidersSettings>,
    /// Record store settings
    pub cache: Option<CacheSettings>,
    /// Logging settings
    pub logging: Option<LoggingSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Cues per translation batch
    pub batch_size: Option<usize>,
    /// Concurrent batches per quality-pass group
    pub quality_concurrency: Option<usize>,
    /// Per-batch timeout in milliseconds (0 disables)
    pub batch_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidateSettings {
    /// Maximum silence gap inside one merged cue, in milliseconds
    pub max_gap_ms: Option<u64>,
    /// Maximum duration of one merged cue, in milliseconds
    pub max_duration_ms: Option<u64>,
    /// Maximum characters per merged cue
    pub max_chars_per_cue: Option<usize>,
    /// Minimum group length before sentence punctuation splits
    pub min_chars_for_sentence: Option<usize>,
    /// Sentence-ending characters, as one string
    pub sentence_end_chars: Option<String>,
    /// Timing strategy: first, last, weighted, or midpoint
    pub timing_strategy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersSettings {
    /// Fast baseline tier ("google" or "openai")
    pub quick: Option<String>,
    /// Quality tier ("google" or "openai")
    pub quality: Option<String>,
    /// Google provider settings
    pub google: Option<GoogleSettings>,
    /// OpenAI provider settings
    pub openai: Option<OpenAiSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleSettings {
    /// Endpoint URL
    pub endpoint: Option<String>,
    /// HTTP client timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Retries for transient failures
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiSettings {
    /// API base URL
    pub base_url: Option<String>,
    /// Model name
    pub model: Option<String>,
    /// API key; falls back to OPENAI_API_KEY
    pub api_key: Option<String>,
    /// HTTP client timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Retries for transient failures
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Maximum number of stored records
    pub max_records: Option<usize>,
    /// TTL for stored records in seconds
    pub ttl_secs: Option<u64>,
    /// Maximum cues accepted per record
    pub max_cues_per_record: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: Option<String>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: ConfigFile = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Generate default configuration file
    pub fn default_config() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 7979,
                cors_enabled: Some(true),
            },
            scheduler: Some(SchedulerSettings {
                batch_size: Some(10),
                quality_concurrency: Some(3),
                batch_timeout_ms: Some(45_000),
            }),
            consolidate: Some(ConsolidateSettings {
                max_gap_ms: Some(800),
                max_duration_ms: Some(4000),
                max_chars_per_cue: Some(80),
                min_chars_for_sentence: Some(5),
                sentence_end_chars: Some(".!?。！？…".to_string()),
                timing_strategy: Some("first".to_string()),
            }),
            providers: Some(ProvidersSettings {
                quick: Some("google".to_string()),
                quality: Some("openai".to_string()),
                google: Some(GoogleSettings {
                    endpoint: None,
                    timeout_secs: Some(15),
                    max_retries: Some(3),
                }),
                openai: Some(OpenAiSettings {
                    base_url: Some("https://api.openai.com/v1".to_string()),
                    model: Some("gpt-4o-mini".to_string()),
                    api_key: None,
                    timeout_secs: Some(60),
                    max_retries: Some(3),
                }),
            }),
            cache: Some(CacheSettings {
                max_records: Some(256),
                ttl_secs: Some(86_400),
                max_cues_per_record: Some(20_000),
            }),
            logging: Some(LoggingSettings {
                level: "info".to_string(),
                format: Some("pretty".to_string()),
            }),
        }
    }

    /// Convert to ServerConfig
    pub fn into_server_config(self) -> ServerConfig {
        let defaults = ServerConfig::default();

        let scheduler = match self.scheduler {
            Some(s) => SchedulerConfig {
                batch_size: s.batch_size.unwrap_or(defaults.scheduler.batch_size),
                quality_concurrency: s
                    .quality_concurrency
                    .unwrap_or(defaults.scheduler.quality_concurrency),
                batch_timeout_ms: s
                    .batch_timeout_ms
                    .unwrap_or(defaults.scheduler.batch_timeout_ms),
            },
            None => defaults.scheduler,
        };

        let consolidate = match self.consolidate {
            Some(c) => {
                let base = ConsolidateOptions::default();
                ConsolidateOptions {
                    max_gap_ms: c.max_gap_ms.unwrap_or(base.max_gap_ms),
                    max_duration_ms: c.max_duration_ms.unwrap_or(base.max_duration_ms),
                    max_chars_per_cue: c.max_chars_per_cue.unwrap_or(base.max_chars_per_cue),
                    min_chars_for_sentence: c
                        .min_chars_for_sentence
                        .unwrap_or(base.min_chars_for_sentence),
                    sentence_end_chars: c
                        .sentence_end_chars
                        .map(|chars| chars.chars().collect())
                        .unwrap_or(base.sentence_end_chars),
                    timing_strategy: c
                        .timing_strategy
                        .map(|name| parse_timing_strategy(&name))
                        .unwrap_or(base.timing_strategy),
                }
            }
            None => defaults.consolidate,
        };

        let providers = match self.providers {
            Some(p) => {
                let google_defaults = GoogleProviderConfig::default();
                let openai_defaults = OpenAiProviderConfig::default();
                ProvidersConfig {
                    quick: p.quick.unwrap_or(defaults.providers.quick),
                    quality: p.quality.unwrap_or(defaults.providers.quality),
                    google: match p.google {
                        Some(g) => GoogleProviderConfig {
                            endpoint: g.endpoint.unwrap_or(google_defaults.endpoint),
                            timeout_secs: g.timeout_secs.unwrap_or(google_defaults.timeout_secs),
                            max_retries: g.max_retries.unwrap_or(google_defaults.max_retries),
                        },
                        None => google_defaults,
                    },
                    openai: match p.openai {
                        Some(o) => OpenAiProviderConfig {
                            base_url: o.base_url.unwrap_or(openai_defaults.base_url),
                            model: o.model.unwrap_or(openai_defaults.model),
                            api_key: o.api_key,
                            timeout_secs: o.timeout_secs.unwrap_or(openai_defaults.timeout_secs),
                            max_retries: o.max_retries.unwrap_or(openai_defaults.max_retries),
                        },
                        None => openai_defaults,
                    },
                }
            }
            None => defaults.providers,
        };

        let cache = match self.cache {
            Some(c) => RecordCacheConfig {
                max_records: c.max_records.unwrap_or(defaults.cache.max_records),
                ttl_secs: c.ttl_secs.unwrap_or(defaults.cache.ttl_secs),
                max_cues_per_record: c
                    .max_cues_per_record
                    .unwrap_or(defaults.cache.max_cues_per_record),
            },
            None => defaults.cache,
        };

        ServerConfig {
            host: self.server.host,
            port: self.server.port,
            cors_enabled: self.server.cors_enabled.unwrap_or(true),
            scheduler,
            consolidate,
            providers,
            cache,
            log_level: self
                .logging
                .map(|l| l.level)
                .unwrap_or_else(|| "info".to_string()),
        }
    }
}

fn parse_timing_strategy(name: &str) -> TimingStrategy {
    match name.to_ascii_lowercase().as_str() {
        "last" => TimingStrategy::Last,
        "weighted" => TimingStrategy::Weighted,
        "midpoint" => TimingStrategy::Midpoint,
        _ => TimingStrategy::First,
    }
}

/// Generate default configuration file at the specified path
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigFile::default_config();
    config.to_file(path)?;
    Ok(())
}
