//! Environment-driven startup configuration.
//!
//! Everything is read from `LPG_*` variables; invalid or missing values
//! fail startup with a descriptive error. Parsing works over an injected
//! key/value map so tests never touch the process environment.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_AUDIT_PATH: &str = "./audit.log";
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_MIMO_MODEL: &str = "mimo-v2-flash";
const DEFAULT_API_KEY_HEADER: &str = "Authorization";
const DEFAULT_API_KEY_PREFIX: &str = "Bearer";
const DEFAULT_CHAT_PATH: &str = "/v1/chat/completions";

/// Which upstream adapter to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMode {
    Stub,
    VllmLocal,
    MimoOnline,
    OpenAiCompatible,
}

impl ProviderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderMode::Stub => "stub",
            ProviderMode::VllmLocal => "vllm_local",
            ProviderMode::MimoOnline => "mimo_online",
            ProviderMode::OpenAiCompatible => "openai_compatible",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("{key} is required when {condition}")]
    Missing {
        key: &'static str,
        condition: String,
    },
}

/// Endpoint settings block shared by the upstream and abstractor sections.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub api_key_header: String,
    pub api_key_prefix: String,
    pub chat_path: String,
}

#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub listen_addr: String,
    pub audit_path: String,
    pub provider: ProviderMode,
    pub provider_timeout: Duration,
    pub allow_raw_forwarding: bool,
    pub critical_local_only: bool,
    pub strict_audit: bool,

    pub vllm_base_url: String,
    pub vllm_model: String,

    pub mimo_base_url: String,
    pub mimo_api_key: String,
    pub mimo_model: String,

    pub upstream: EndpointConfig,
    pub local_abstraction: EndpointConfig,
}

impl StartupConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let kv: HashMap<String, String> = std::env::vars().collect();
        Self::from_kv(&kv)
    }

    pub fn from_kv(kv: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut cfg = StartupConfig {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            audit_path: DEFAULT_AUDIT_PATH.to_string(),
            provider: ProviderMode::Stub,
            provider_timeout: Duration::from_millis(DEFAULT_PROVIDER_TIMEOUT_MS),
            allow_raw_forwarding: false,
            critical_local_only: false,
            strict_audit: false,
            vllm_base_url: String::new(),
            vllm_model: String::new(),
            mimo_base_url: String::new(),
            mimo_api_key: String::new(),
            mimo_model: DEFAULT_MIMO_MODEL.to_string(),
            upstream: EndpointConfig {
                base_url: String::new(),
                api_key: String::new(),
                model: String::new(),
                api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
                api_key_prefix: DEFAULT_API_KEY_PREFIX.to_string(),
                chat_path: DEFAULT_CHAT_PATH.to_string(),
            },
            local_abstraction: EndpointConfig {
                base_url: String::new(),
                api_key: String::new(),
                model: String::new(),
                api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
                api_key_prefix: DEFAULT_API_KEY_PREFIX.to_string(),
                chat_path: DEFAULT_CHAT_PATH.to_string(),
            },
        };

        if let Some(value) = nonempty(kv, "LPG_LISTEN") {
            cfg.listen_addr = value;
        }
        if let Some(value) = nonempty(kv, "LPG_AUDIT_PATH") {
            cfg.audit_path = value;
        }
        if let Some(value) = nonempty(kv, "LPG_PROVIDER") {
            cfg.provider = parse_provider_mode(&value)?;
        }

        if let Some(value) = nonempty(kv, "LPG_PROVIDER_TIMEOUT_MS") {
            let millis: u64 = value.parse().map_err(|_| ConfigError::Invalid {
                key: "LPG_PROVIDER_TIMEOUT_MS",
                reason: "must be an integer number of milliseconds".to_string(),
            })?;
            if millis == 0 {
                return Err(ConfigError::Invalid {
                    key: "LPG_PROVIDER_TIMEOUT_MS",
                    reason: "must be > 0".to_string(),
                });
            }
            cfg.provider_timeout = Duration::from_millis(millis);
        }

        cfg.allow_raw_forwarding = parse_bool(kv, "LPG_ALLOW_RAW_FORWARDING")?;
        cfg.critical_local_only = parse_bool(kv, "LPG_CRITICAL_LOCAL_ONLY")?;
        cfg.strict_audit = parse_bool(kv, "LPG_STRICT_AUDIT")?;

        cfg.vllm_base_url = trimmed(kv, "LPG_VLLM_BASE_URL");
        cfg.vllm_model = trimmed(kv, "LPG_VLLM_MODEL");

        cfg.mimo_base_url = trimmed(kv, "LPG_MIMO_BASE_URL");
        cfg.mimo_api_key = trimmed(kv, "LPG_MIMO_API_KEY");
        if let Some(value) = nonempty(kv, "LPG_MIMO_MODEL") {
            cfg.mimo_model = value;
        }

        cfg.upstream.base_url = trimmed(kv, "LPG_UPSTREAM_BASE_URL");
        cfg.upstream.api_key = trimmed(kv, "LPG_UPSTREAM_API_KEY");
        cfg.upstream.model = trimmed(kv, "LPG_UPSTREAM_MODEL");
        if let Some(value) = present(kv, "LPG_UPSTREAM_API_KEY_HEADER") {
            cfg.upstream.api_key_header = value;
        }
        if let Some(value) = present(kv, "LPG_UPSTREAM_API_KEY_PREFIX") {
            cfg.upstream.api_key_prefix = value;
        }
        if let Some(value) = present(kv, "LPG_UPSTREAM_CHAT_PATH") {
            cfg.upstream.chat_path = value;
        }

        cfg.local_abstraction.base_url = trimmed(kv, "LPG_LOCAL_ABSTRACTION_BASE_URL");
        cfg.local_abstraction.api_key = trimmed(kv, "LPG_LOCAL_ABSTRACTION_API_KEY");
        cfg.local_abstraction.model = trimmed(kv, "LPG_LOCAL_ABSTRACTION_MODEL");
        if let Some(value) = present(kv, "LPG_LOCAL_ABSTRACTION_API_KEY_HEADER") {
            cfg.local_abstraction.api_key_header = value;
        }
        if let Some(value) = present(kv, "LPG_LOCAL_ABSTRACTION_API_KEY_PREFIX") {
            cfg.local_abstraction.api_key_prefix = value;
        }
        if let Some(value) = present(kv, "LPG_LOCAL_ABSTRACTION_CHAT_PATH") {
            cfg.local_abstraction.chat_path = value;
        }

        match cfg.provider {
            ProviderMode::Stub => {}
            ProviderMode::VllmLocal => {
                if cfg.vllm_base_url.is_empty() {
                    return Err(ConfigError::Missing {
                        key: "LPG_VLLM_BASE_URL",
                        condition: "LPG_PROVIDER=vllm_local".to_string(),
                    });
                }
            }
            ProviderMode::MimoOnline => {
                if cfg.mimo_base_url.is_empty() {
                    return Err(ConfigError::Missing {
                        key: "LPG_MIMO_BASE_URL",
                        condition: "LPG_PROVIDER=mimo_online".to_string(),
                    });
                }
                if cfg.mimo_api_key.is_empty() {
                    return Err(ConfigError::Missing {
                        key: "LPG_MIMO_API_KEY",
                        condition: "LPG_PROVIDER=mimo_online".to_string(),
                    });
                }
            }
            ProviderMode::OpenAiCompatible => {
                if cfg.upstream.base_url.is_empty() {
                    return Err(ConfigError::Missing {
                        key: "LPG_UPSTREAM_BASE_URL",
                        condition: "LPG_PROVIDER=openai_compatible".to_string(),
                    });
                }
            }
        }

        // Local abstraction is all-or-nothing: base URL and model together.
        if !cfg.local_abstraction.base_url.is_empty() && cfg.local_abstraction.model.is_empty() {
            return Err(ConfigError::Missing {
                key: "LPG_LOCAL_ABSTRACTION_MODEL",
                condition: "LPG_LOCAL_ABSTRACTION_BASE_URL is set".to_string(),
            });
        }
        if cfg.local_abstraction.base_url.is_empty() && !cfg.local_abstraction.model.is_empty() {
            return Err(ConfigError::Missing {
                key: "LPG_LOCAL_ABSTRACTION_BASE_URL",
                condition: "LPG_LOCAL_ABSTRACTION_MODEL is set".to_string(),
            });
        }

        Ok(cfg)
    }
}

fn parse_provider_mode(raw: &str) -> Result<ProviderMode, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "stub" => Ok(ProviderMode::Stub),
        "vllm_local" => Ok(ProviderMode::VllmLocal),
        "mimo_online" => Ok(ProviderMode::MimoOnline),
        // Historical aliases all normalize to the generic adapter.
        "openai_compatible" | "generic" | "openai" | "custom" | "llamacpp_local" => {
            Ok(ProviderMode::OpenAiCompatible)
        }
        other => Err(ConfigError::Invalid {
            key: "LPG_PROVIDER",
            reason: format!(
                "{other:?} must be one of \"stub\", \"vllm_local\", \"mimo_online\", \"openai_compatible\""
            ),
        }),
    }
}

fn parse_bool(kv: &HashMap<String, String>, key: &'static str) -> Result<bool, ConfigError> {
    let Some(value) = kv.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) else {
        return Ok(false);
    };
    match value {
        "1" | "true" | "TRUE" | "True" | "yes" | "YES" => Ok(true),
        "0" | "false" | "FALSE" | "False" | "no" | "NO" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            reason: format!("{other:?} is not a boolean"),
        }),
    }
}

fn nonempty(kv: &HashMap<String, String>, key: &str) -> Option<String> {
    kv.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Set at all, even to empty — lets operators blank out a default header
/// prefix or chat path.
fn present(kv: &HashMap<String, String>, key: &str) -> Option<String> {
    kv.get(key).map(|v| v.trim().to_string())
}

fn trimmed(kv: &HashMap<String, String>, key: &str) -> String {
    kv.get(key).map(|v| v.trim().to_string()).unwrap_or_default()
}
