/// Failure to build a service config from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Trait for loading service configuration from environment variables.
///
/// Implementors derive `serde::Deserialize` (field `foo_bar` reads `FOO_BAR`) and may
/// override [`Config::validate`] for cross-field checks.
pub trait Config: Sized + serde::de::DeserializeOwned {
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    fn from_env() -> Result<Self, ConfigError> {
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Same as [`Config::from_env`] but over an explicit set of variables.
    fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::from_iter(vars)?;
        config.validate()?;
        Ok(config)
    }
}
