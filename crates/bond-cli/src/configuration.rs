use crate::error::{to_env_var, ConfigError};
use bond::agent::{AgentConfig, EmptyResponsePolicy, DEFAULT_MAX_TOOL_ITERATIONS};
use bond::providers::{
    configs::{AnthropicProviderConfig, OpenAiProviderConfig, ProviderConfig},
    factory::ProviderType,
};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    Anthropic {
        #[serde(default = "default_anthropic_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_anthropic_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
    OpenAi {
        #[serde(default = "default_openai_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
}

impl ProviderSettings {
    pub fn provider_type(&self) -> ProviderType {
        match self {
            ProviderSettings::Anthropic { .. } => ProviderType::Anthropic,
            ProviderSettings::OpenAi { .. } => ProviderType::OpenAi,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ProviderSettings::Anthropic { model, .. } | ProviderSettings::OpenAi { model, .. } => {
                model
            }
        }
    }

    pub fn api_key(&self) -> &str {
        match self {
            ProviderSettings::Anthropic { api_key, .. }
            | ProviderSettings::OpenAi { api_key, .. } => api_key,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            ProviderSettings::Anthropic { host, .. } | ProviderSettings::OpenAi { host, .. } => host,
        }
    }

    /// Blank values count as missing, they would only fail later on the first request
    fn check_required(&self) -> Result<(), ConfigError> {
        for (key, value) in [("provider.api_key", self.api_key()), ("provider.host", self.host())] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingEnvVar {
                    env_var: to_env_var(key),
                });
            }
        }
        Ok(())
    }

    // Convert to the bond ProviderConfig
    pub fn into_config(self) -> ProviderConfig {
        match self {
            ProviderSettings::Anthropic {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
                timeout_ms,
            } => ProviderConfig::Anthropic(AnthropicProviderConfig {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
                timeout: Duration::from_millis(timeout_ms),
            }),
            ProviderSettings::OpenAi {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
                timeout_ms,
            } => ProviderConfig::OpenAi(OpenAiProviderConfig {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
                timeout: Duration::from_millis(timeout_ms),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,
    /// Per tool call limit in seconds, 0 disables it
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default)]
    pub empty_response: EmptyResponsePolicy,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
            tool_timeout_secs: default_tool_timeout_secs(),
            system_prompt: default_system_prompt(),
            empty_response: EmptyResponsePolicy::default(),
        }
    }
}

impl AgentSettings {
    pub fn tool_timeout(&self) -> Option<Duration> {
        (self.tool_timeout_secs > 0).then(|| Duration::from_secs(self.tool_timeout_secs))
    }

    pub fn to_config(&self) -> AgentConfig {
        AgentConfig {
            max_tool_iterations: self.max_tool_iterations,
            system_prompt: self.system_prompt.clone(),
            empty_response: self.empty_response,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub agent: AgentSettings,
    pub provider: ProviderSettings,
}

impl Settings {
    /// Load settings from `path`, or from the first settings file found in the usual places
    pub fn new(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::SettingsFile {
                        path: path.display().to_string(),
                        reason: "file does not exist".to_string(),
                    });
                }
                Self::load(Some(path))
            }
            None => Self::load(default_settings_path().as_deref()),
        }
    }

    /// Layer built in defaults, the settings file and `BOND_` environment variables
    pub fn load(settings_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("provider.type", "anthropic")?
            .set_default("agent.max_tool_iterations", DEFAULT_MAX_TOOL_ITERATIONS as i64)?;

        if let Some(path) = settings_file {
            tracing::debug!("Loading settings from {}", path.display());
            builder = apply_legacy_env(builder, path)?;
            builder = builder.add_source(File::from(path).format(FileFormat::Json));
        }

        let config = builder
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("BOND")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        // Try to deserialize the configuration
        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => {
                settings.provider.check_required()?;
                Ok(settings)
            }
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                if let Some(field) = missing_field(&err.to_string()) {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(&field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

/// Settings files may carry an `env` block with Anthropic style variables. They are mapped
/// onto provider defaults so the file's own keys and the environment still take precedence.
fn apply_legacy_env(
    mut builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let file_error = |reason: String| ConfigError::SettingsFile {
        path: path.display().to_string(),
        reason,
    };

    let raw = std::fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
    let document: Value = serde_json::from_str(&raw).map_err(|e| file_error(e.to_string()))?;

    let Some(env) = document.get("env").and_then(Value::as_object) else {
        return Ok(builder);
    };

    for (name, key) in [
        ("ANTHROPIC_AUTH_TOKEN", "provider.api_key"),
        ("ANTHROPIC_BASE_URL", "provider.host"),
        ("ANTHROPIC_MODEL", "provider.model"),
    ] {
        if let Some(value) = env.get(name).and_then(Value::as_str) {
            builder = builder.set_default(key, value)?;
        }
    }

    if let Some(timeout) = env.get("API_TIMEOUT_MS") {
        let timeout_ms = match timeout {
            Value::String(s) => s.trim().parse::<i64>().ok(),
            other => other.as_i64(),
        }
        .ok_or_else(|| file_error(format!("API_TIMEOUT_MS is not a number: {}", timeout)))?;
        builder = builder.set_default("provider.timeout_ms", timeout_ms)?;
    }

    Ok(builder)
}

/// Extract the dotted key from a serde "missing field" message
fn missing_field(message: &str) -> Option<String> {
    let rest = message.strip_prefix("missing field `")?;
    let (field, rest) = rest.split_once('`')?;
    let parent = rest
        .strip_prefix(" for key `")
        .and_then(|rest| rest.split_once('`'))
        .map(|(key, _)| key);

    Some(match parent {
        Some(parent) => format!("{}.{}", parent, field),
        // Only provider settings have required fields
        None => format!("provider.{}", field),
    })
}

fn default_settings_path() -> Option<PathBuf> {
    let local = PathBuf::from("settings.json");
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("bond").join("settings.json"))
        .filter(|path| path.exists())
}

fn default_anthropic_host() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_openai_host() -> String {
    "https://api.openai.com".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

fn default_timeout_ms() -> u64 {
    600_000
}

fn default_max_tool_iterations() -> usize {
    DEFAULT_MAX_TOOL_ITERATIONS
}

fn default_tool_timeout_secs() -> u64 {
    120
}

fn default_system_prompt() -> String {
    "You are Bond, a helpful assistant that can use tools to inspect the local machine and \
     the network. Call a tool whenever it helps answer the request, then explain the result \
     plainly. If a tool reports an error, say so and try another approach when one exists."
        .to_string()
}
