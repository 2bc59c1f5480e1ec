use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Service Identity Args ---
    /// Application id sent in every request header
    #[arg(long, env = "SPARK_APP_ID", default_value = "")]
    pub app_id: String,

    /// API key embedded in the signed authorization blob
    #[arg(long, env = "SPARK_API_KEY", default_value = "")]
    pub api_key: String,

    /// API secret used to sign the connection handshake
    #[arg(long, env = "SPARK_API_SECRET", default_value = "")]
    pub api_secret: String,

    // --- Endpoint Args ---
    /// WebSocket endpoint of the chat service (scheme, host and path)
    #[arg(long, env = "SPARK_API_URL", default_value = "wss://spark-api.xf-yun.com/v3.5/chat")]
    pub api_url: String,

    /// Model domain requested in the chat parameters
    #[arg(long, env = "SPARK_DOMAIN", default_value = "generalv3.5")]
    pub domain: String,

    /// Sampling temperature
    #[arg(long, env = "SPARK_TEMPERATURE", default_value = "0.5")]
    pub temperature: f32,

    /// Maximum number of tokens in a reply
    #[arg(long, env = "SPARK_MAX_TOKENS", default_value = "1024")]
    pub max_tokens: u32,

    // --- Retry Args ---
    /// Total connection attempts per generation call
    #[arg(long, env = "SPARK_MAX_ATTEMPTS", default_value = "3")]
    pub max_attempts: u32,

    /// Flat delay between attempts, in milliseconds
    #[arg(long, env = "SPARK_RETRY_DELAY_MS", default_value = "1000")]
    pub retry_delay_ms: u64,

    // --- Console Args ---
    /// Pause after each printed character, in milliseconds. 0 disables pacing.
    #[arg(long, env = "STREAM_PACING_MS", default_value = "10")]
    pub pacing_ms: u64,

    /// Longest accepted prompt, in characters
    #[arg(long, env = "MAX_PROMPT_CHARS", default_value = "200")]
    pub max_prompt_chars: usize,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}
