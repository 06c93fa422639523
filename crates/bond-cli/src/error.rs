use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration, set the {env_var} environment variable")]
    MissingEnvVar { env_var: String },

    #[error("Could not read settings file {path}: {reason}")]
    SettingsFile { path: String, reason: String },

    #[error(transparent)]
    Other(#[from] config::ConfigError),
}

/// The environment variable that sets a dotted configuration key
pub fn to_env_var(field: &str) -> String {
    format!("BOND_{}", field.replace('.', "__").to_uppercase())
}
