pub mod ws;

use async_trait::async_trait;

use crate::error::SparkError;

pub use ws::WsConnector;

/// Opens one exclusively owned connection per attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, SparkError>;
}

#[async_trait]
pub trait Connection: Send {
    async fn send_text(&mut self, text: String) -> Result<(), SparkError>;

    /// Next text payload, or `None` once the peer has closed the connection.
    async fn next_text(&mut self) -> Option<Result<String, SparkError>>;

    async fn close(&mut self);
}
