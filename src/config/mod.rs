use crate::cli::Args;
use crate::error::SparkError;
use crate::llm::retry::RetryPolicy;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "wss://spark-api.xf-yun.com/v3.5/chat";
pub const DEFAULT_DOMAIN: &str = "generalv3.5";
pub const DEFAULT_TEMPERATURE: f32 = 0.5;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_PACING: Duration = Duration::from_millis(10);
pub const DEFAULT_MAX_PROMPT_CHARS: usize = 200;

/// Everything the signer, the connection builder and the client need.
/// Built once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct SparkConfig {
    pub app_id: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_url: String,
    pub domain: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub retry: RetryPolicy,
    pub pacing: Duration,
    pub max_prompt_chars: usize,
}

impl Default for SparkConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            domain: DEFAULT_DOMAIN.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            retry: RetryPolicy::default(),
            pacing: DEFAULT_PACING,
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
        }
    }
}

impl SparkConfig {
    pub fn new(
        app_id: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>
    ) -> Self {
        Self {
            app_id: app_id.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            ..Self::default()
        }
    }

    pub fn from_args(args: &Args) -> Result<Self, SparkError> {
        let config = Self {
            app_id: args.app_id.trim().to_string(),
            api_key: args.api_key.trim().to_string(),
            api_secret: args.api_secret.trim().to_string(),
            api_url: args.api_url.clone(),
            domain: args.domain.clone(),
            temperature: args.temperature,
            max_tokens: args.max_tokens,
            retry: RetryPolicy::new(args.max_attempts, Duration::from_millis(args.retry_delay_ms)),
            pacing: Duration::from_millis(args.pacing_ms),
            max_prompt_chars: args.max_prompt_chars,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Fails on the first missing identity field or an unusable endpoint.
    pub fn validate(&self) -> Result<(), SparkError> {
        require("app id", &self.app_id)?;
        require("api key", &self.api_key)?;
        require("api secret", &self.api_secret)?;
        self.endpoint()?;
        if self.retry.max_attempts == 0 {
            return Err(SparkError::Configuration("max attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn endpoint(&self) -> Result<Url, SparkError> {
        let url = Url::parse(&self.api_url).map_err(|e|
            SparkError::Configuration(format!("invalid api url '{}': {}", self.api_url, e))
        )?;
        if url.host_str().is_none() {
            return Err(
                SparkError::Configuration(format!("api url '{}' has no host", self.api_url))
            );
        }
        Ok(url)
    }
}

pub(crate) fn require(field: &str, value: &str) -> Result<(), SparkError> {
    if value.trim().is_empty() {
        return Err(SparkError::Configuration(format!("{} is not set", field)));
    }
    Ok(())
}
