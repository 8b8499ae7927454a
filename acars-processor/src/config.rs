//! Processor configuration
//!
//! Loaded once at boot from TOML (with `${VAR}` substitution) and read-only
//! afterwards. Every section has defaults so a minimal file only needs the
//! upstream endpoints and a `[[steps]]` list.

use acars_common::links::LinkTemplates;
use acars_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default bounded queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

fn default_true() -> bool {
    true
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub acars: StreamConfig,
    pub vdlm2: StreamConfig,
    pub stdin: StdinConfig,
    pub processing: ProcessingConfig,
    pub links: LinkTemplates,
    pub ai: AiTuning,
    pub steps: Vec<StepConfig>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config: Config = acars_common::config::load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Config = acars_common::config::parse_toml(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot run
    pub fn validate(&self) -> Result<()> {
        for (name, stream) in [("acars", &self.acars), ("vdlm2", &self.vdlm2)] {
            if stream.enabled && (stream.host.trim().is_empty() || stream.port == 0) {
                return Err(Error::Config(format!(
                    "[{}] is enabled but host/port are not set",
                    name
                )));
            }
        }
        if self.processing.queue_capacity == 0 {
            return Err(Error::Config("processing.queue_capacity must be at least 1".to_string()));
        }
        for (index, step) in self.steps.iter().enumerate() {
            if step.filter.is_none() && step.annotate.is_none() && step.send.is_none() {
                return Err(Error::Config(format!(
                    "step {} has no filter, annotate or send section",
                    index
                )));
            }
        }
        Ok(())
    }

    /// Number of worker tasks: `max(1, max_concurrent_requests)`
    pub fn worker_count(&self) -> usize {
        self.processing.max_concurrent_requests.max(1)
    }

    /// Fully populated configuration used for `--write-example`
    pub fn example() -> Self {
        Self {
            logging: LoggingConfig::default(),
            database: DatabaseConfig {
                enabled: true,
                path: Some(PathBuf::from("messages.db")),
            },
            acars: StreamConfig {
                enabled: true,
                host: "acarshub".to_string(),
                port: 15550,
            },
            vdlm2: StreamConfig {
                enabled: true,
                host: "acarshub".to_string(),
                port: 15555,
            },
            stdin: StdinConfig { enabled: false },
            processing: ProcessingConfig::default(),
            links: LinkTemplates::default(),
            ai: AiTuning::default(),
            steps: vec![
                StepConfig {
                    filter: Some(FilterConfig {
                        has_text: Some(true),
                        above_minimum_signal: Some(-40.0),
                        previous_message_similarity: Some(SimilarityConfig::default()),
                        ..Default::default()
                    }),
                    annotate: None,
                    send: None,
                },
                StepConfig {
                    filter: None,
                    annotate: Some(AnnotateConfig {
                        acars: Some(LocalAnnotatorConfig::default()),
                        vdlm2: Some(LocalAnnotatorConfig::default()),
                        tar1090: Some(Tar1090Config {
                            url: "http://tar1090:80".to_string(),
                            reference_geolocation: "${REFERENCE_GEOLOCATION}".to_string(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    send: None,
                },
                StepConfig {
                    filter: Some(FilterConfig {
                        filter_on_failure: false,
                        ollama: Some(OllamaFilterConfig {
                            url: "http://ollama:11434".to_string(),
                            model: "llama3.2".to_string(),
                            user_prompt: "Only keep messages that report an equipment defect."
                                .to_string(),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    annotate: None,
                    send: Some(SendConfig {
                        discord: Some(DiscordConfig {
                            url: "${DISCORD_WEBHOOK_URL}".to_string(),
                            format_text: true,
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "acars_processor=info,acars_common=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Durable on-disk store; when false an in-memory store is used
    pub enabled: bool,
    pub path: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(acars_common::config::default_database_path)
    }
}

/// Upstream TCP endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StdinConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub max_concurrent_requests: usize,
    pub queue_capacity: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 1,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Boot-time defaults for AI calls (see [`crate::params`])
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiTuning {
    /// Per-attempt timeout
    pub timeout_seconds: u64,
    /// Total attempts per call
    pub max_retry_attempts: u32,
    /// First backoff delay; doubles after each failed attempt
    pub max_retry_delay_seconds: u64,
}

impl Default for AiTuning {
    fn default() -> Self {
        Self {
            timeout_seconds: 120,
            max_retry_attempts: 3,
            max_retry_delay_seconds: 5,
        }
    }
}

/// One `{Filter?, Annotate?, Send?}` step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotate: Option<AnnotateConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send: Option<SendConfig>,
}

/// Filter criteria for one step; every set slot must pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Veto when a filter errors (and when an AI provider stays unreachable)
    pub filter_on_failure: bool,
    /// `true`: veto blank text; `false`: veto non-blank text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_text: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_number: Option<String>,
    /// Frequency in MHz
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub above_minimum_signal: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub below_maximum_signal: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ass_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_tower: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_aircraft: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub more: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub above_distance_nm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub below_distance_nm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub above_distance_mi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub below_distance_mi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dictionary_phrase_length_minimum: Option<usize>,
    /// Word list (one per line) replacing the built-in dictionary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dictionary_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freetext_term_present: Option<FreetextConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_message_similarity: Option<SimilarityConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ollama: Option<OllamaFilterConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai: Option<OpenAiFilterConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreetextConfig {
    pub terms: Vec<String>,
    /// Veto when a term IS present instead of when none is
    pub invert: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Veto above this similarity in [0, 1]; 0 disables the check
    pub similarity: f64,
    pub maximum_look_behind: u32,
    pub dont_filter_if_longer: bool,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            similarity: 0.9,
            maximum_look_behind: 1000,
            dont_filter_if_longer: false,
        }
    }
}

/// Per-call overrides of the boot-time [`AiTuning`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retry_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retry_delay_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaFilterConfig {
    pub url: String,
    pub model: String,
    /// Operator criteria placed between the system prompt prefix and suffix
    pub user_prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt_suffix: Option<String>,
    #[serde(flatten)]
    pub overrides: CallOverrides,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiFilterConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub user_prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt_suffix: Option<String>,
    #[serde(flatten)]
    pub overrides: CallOverrides,
}

impl Default for OpenAiFilterConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            user_prompt: String::new(),
            system_prompt_prefix: None,
            system_prompt_suffix: None,
            overrides: CallOverrides::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotateConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acars: Option<LocalAnnotatorConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vdlm2: Option<LocalAnnotatorConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adsb: Option<AdsbConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tar1090: Option<Tar1090Config>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ollama: Option<OllamaAnnotatorConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalAnnotatorConfig {
    pub enabled: bool,
    pub selected_fields: Vec<String>,
}

impl Default for LocalAnnotatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            selected_fields: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdsbConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub api_key: String,
    pub base_url: String,
    /// `"LAT,LON"` of the receiver
    pub reference_geolocation: String,
    pub selected_fields: Vec<String>,
    #[serde(flatten)]
    pub overrides: CallOverrides,
}

impl Default for AdsbConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            base_url: "https://adsbexchange-com1.p.rapidapi.com".to_string(),
            reference_geolocation: String::new(),
            selected_fields: Vec::new(),
            overrides: CallOverrides::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tar1090Config {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub url: String,
    pub reference_geolocation: String,
    pub selected_fields: Vec<String>,
    #[serde(flatten)]
    pub overrides: CallOverrides,
}

impl Default for Tar1090Config {
    fn default() -> Self {
        Self {
            enabled: true,
            url: String::new(),
            reference_geolocation: String::new(),
            selected_fields: Vec::new(),
            overrides: CallOverrides::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaAnnotatorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub url: String,
    pub model: String,
    pub user_prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt_suffix: Option<String>,
    /// Only emit fields when the model says the message is a question
    pub filter_with_question: bool,
    pub selected_fields: Vec<String>,
    #[serde(flatten)]
    pub overrides: CallOverrides,
}

impl Default for OllamaAnnotatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: String::new(),
            model: String::new(),
            user_prompt: String::new(),
            system_prompt_prefix: None,
            system_prompt_suffix: None,
            filter_with_question: false,
            selected_fields: Vec::new(),
            overrides: CallOverrides::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord: Option<DiscordConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_relic: Option<NewRelicConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mastodon: Option<MastodonConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderConfig {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub url: String,
    pub method: String,
    pub headers: Vec<HeaderConfig>,
    /// Body template; empty sends the whole message as JSON
    pub template: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: String::new(),
            method: "POST".to_string(),
            headers: Vec::new(),
            template: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub url: String,
    /// Skip messages missing any of these keys
    pub required_fields: Vec<String>,
    /// Wrap `*Text` values in code fences
    pub format_text: bool,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: String::new(),
            required_fields: Vec::new(),
            format_text: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewRelicConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub api_key: String,
    pub custom_event_type: String,
    pub endpoint: String,
}

impl Default for NewRelicConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            custom_event_type: "CustomACARS".to_string(),
            endpoint: "https://insights-collector.newrelic.com/v1/accounts/events".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MastodonConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub server_url: String,
    /// User token with the `write:statuses` scope
    pub access_token: String,
    /// public, unlisted, private or direct
    pub visibility: String,
    pub template: String,
}

impl Default for MastodonConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server_url: String::new(),
            access_token: String::new(),
            visibility: "unlisted".to_string(),
            template: String::new(),
        }
    }
}
