//! Provider configuration.
//!
//! Credentials and endpoints are an explicit value passed into the pipeline
//! at construction — nothing in this crate reads ambient global state at
//! call time. [`ProviderConfig::from_env`] exists as a convenience for
//! binaries and loads a `.env` file via `dotenvy` before reading the
//! process environment, but it is only ever a constructor.

use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";
const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";
const DEFAULT_PREMIUM_COMPLETION_MODEL: &str = "gpt-4";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Errors constructing a [`ProviderConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing {0} in environment")]
    MissingVar(&'static str),

    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
}

/// Connection settings shared by the HTTP embedding and completion
/// providers.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    /// Service root; endpoint paths are joined onto it, so it always ends
    /// with a slash.
    pub base_url: Url,
    /// Model used for [`ModelTier::Standard`](crate::completion::ModelTier).
    pub completion_model: String,
    /// Model used for [`ModelTier::Premium`](crate::completion::ModelTier).
    pub premium_completion_model: String,
    pub embedding_model: String,
}

impl ProviderConfig {
    /// Build a config with the default public endpoint and models.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url parses"),
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            premium_completion_model: DEFAULT_PREMIUM_COMPLETION_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    /// Point both providers at a different service root.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidBaseUrl`] when the string does not parse as an
    /// absolute URL.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ConfigError> {
        let mut url = Url::parse(base_url)
            .map_err(|_| ConfigError::InvalidBaseUrl(base_url.to_string()))?;
        if !url.path().ends_with('/') {
            url.set_path(&format!("{}/", url.path()));
        }
        self.base_url = url;
        Ok(self)
    }

    #[must_use]
    pub fn with_completion_models(
        mut self,
        standard: impl Into<String>,
        premium: impl Into<String>,
    ) -> Self {
        self.completion_model = standard.into();
        self.premium_completion_model = premium.into();
        self
    }

    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Read configuration from the environment (`OPENAI_API_KEY`, optional
    /// `OPENAI_BASE_URL`), loading `.env` first if present.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingVar`] when the API key is absent,
    /// [`ConfigError::InvalidBaseUrl`] when an override does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY"))?;
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            config = config.with_base_url(&base_url)?;
        }
        Ok(config)
    }

    /// Resolve an endpoint path against the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
        self.base_url
            .join(path)
            .map_err(|_| ConfigError::InvalidBaseUrl(format!("{}{path}", self.base_url)))
    }
}
