pub mod retry;
pub mod session;

use futures::{ Future, Stream };
use log::{ debug, info };
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::auth::ConnectionBuilder;
use crate::config::SparkConfig;
use crate::error::SparkError;
use crate::models::chat::Turn;
use crate::models::spark::ChatRequest;
use crate::transport::{ Connector, WsConnector };
use self::retry::supervise;
use self::session::{ SessionEnd, StreamSession };

const CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// One character of the reply, in order.
    Delta(String),
    /// A new attempt is starting; text received so far must be discarded.
    Restart { attempt: u32 },
    /// The final frame arrived and the reply is complete. Always the last item.
    Completed,
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, SparkError>> + Send>>;

pub fn create_streaming_response<F, Fut>(response_fn: F) -> EventStream
    where
        F: FnOnce(mpsc::Sender<Result<StreamEvent, SparkError>>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static
{
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

#[derive(Clone)]
pub struct SparkClient {
    config: Arc<SparkConfig>,
    builder: ConnectionBuilder,
    connector: Arc<dyn Connector>,
}

impl SparkClient {
    pub fn new(config: SparkConfig) -> Result<Self, SparkError> {
        Self::with_connector(config, Arc::new(WsConnector::new()))
    }

    pub fn with_connector(
        config: SparkConfig,
        connector: Arc<dyn Connector>
    ) -> Result<Self, SparkError> {
        config.validate()?;
        let builder = ConnectionBuilder::new(&config)?;
        Ok(Self { config: Arc::new(config), builder, connector })
    }

    pub fn config(&self) -> &SparkConfig {
        &self.config
    }

    /// Streams the reply to `prompt` given the preceding `history`.
    ///
    /// The stream ends with [`StreamEvent::Completed`] after the final frame,
    /// with a single error item, or without either when `cancel` fires or the
    /// stream is dropped. Transport failures are retried per the configured
    /// policy; each retry is announced with [`StreamEvent::Restart`].
    pub fn generate(&self, prompt: &str, history: &[Turn], cancel: CancellationToken) -> EventStream {
        let request = ChatRequest::new(&self.config, history, prompt);
        let client = self.clone();

        create_streaming_response(move |tx| async move {
            let body = match request.to_json() {
                Ok(body) => body,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };
            info!(
                "Generating reply (domain={}, history={} turns)",
                client.config.domain,
                request.payload.message.text.len() - 1
            );

            let policy = client.config.retry;
            let result = supervise(&policy, &cancel, |attempt| {
                let client = client.clone();
                let tx = tx.clone();
                let cancel = cancel.clone();
                let body = body.clone();
                async move { client.attempt(attempt, body, &tx, &cancel).await }
            }).await;

            if let Err(e) = result {
                let _ = tx.send(Err(e)).await;
            }
        })
    }

    async fn attempt(
        &self,
        attempt: u32,
        body: String,
        tx: &mpsc::Sender<Result<StreamEvent, SparkError>>,
        cancel: &CancellationToken
    ) -> Result<(), SparkError> {
        if attempt > 1 && tx.send(Ok(StreamEvent::Restart { attempt })).await.is_err() {
            return Ok(());
        }
        let url = self.builder.build()?;
        debug!("Opening stream session, attempt {}", attempt);

        match StreamSession::new(tx, cancel).run(self.connector.as_ref(), &url, body).await? {
            SessionEnd::Completed { text } if text.trim().is_empty() => Err(SparkError::EmptyResponse),
            SessionEnd::Completed { text } => {
                info!("Reply completed ({} chars)", text.chars().count());
                let _ = tx.send(Ok(StreamEvent::Completed)).await;
                Ok(())
            }
            SessionEnd::Stopped => Ok(()),
        }
    }
}
