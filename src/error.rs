use tokio_tungstenite::tungstenite;

#[derive(Debug, thiserror::Error)]
pub enum SparkError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode frame: {0}")]
    Decode(String),

    #[error("service returned error {code}: {message}")]
    Application { code: i64, message: String },

    #[error("maximum retries reached after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<SparkError>,
    },

    #[error("no response received")]
    EmptyResponse,

    #[error("a generation is already in progress")]
    Busy,

    #[error("invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("no previous user message to regenerate")]
    NothingToRegenerate,
}

impl SparkError {
    /// Transport faults and malformed frames fail the session; everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Decode(_))
    }

    pub fn inline_message(&self) -> String {
        format!(
            "An error occurred: {}. Please try again later. If the problem persists, contact support.",
            self
        )
    }
}

impl From<tungstenite::Error> for SparkError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Http(response) => {
                let status = response.status();
                let body = response
                    .body()
                    .as_ref()
                    .map(|b| String::from_utf8_lossy(b).into_owned())
                    .unwrap_or_default();
                SparkError::Transport(format!("handshake rejected with {}: {}", status, body))
            }
            other => SparkError::Transport(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SparkError {
    fn from(err: serde_json::Error) -> Self {
        SparkError::Decode(err.to_string())
    }
}
