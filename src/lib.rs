pub mod agent;
pub mod auth;
pub mod cli;
pub mod config;
pub mod console;
pub mod error;
pub mod history;
pub mod llm;
pub mod models;
pub mod transport;

use agent::ChatAgent;
use cli::Args;
use config::SparkConfig;
use llm::SparkClient;
use log::info;
use std::error::Error;
use std::sync::Arc;

pub use error::SparkError;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = SparkConfig::from_args(&args)?;

    info!("--- Core Configuration ---");
    info!("App ID: {}", config.app_id);
    info!("Endpoint: {}", config.api_url);
    info!("Domain: {}", config.domain);
    info!("Temperature: {}", config.temperature);
    info!("Max Tokens: {}", config.max_tokens);
    info!("Max Attempts: {}", config.retry.max_attempts);
    info!("Retry Delay: {:?}", config.retry.delay);
    info!("Stream Pacing: {:?}", config.pacing);
    info!("-------------------------");

    let client = SparkClient::new(config)?;
    let agent = Arc::new(ChatAgent::new(client));
    console::run_console(agent).await?;

    Ok(())
}
