use async_trait::async_trait;
use futures::{ SinkExt, StreamExt };
use log::{ debug, info, warn };
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::{ Message, WebSocketConfig };
use tokio_tungstenite::{ connect_async_with_config, MaybeTlsStream, WebSocketStream };

use super::{ Connection, Connector };
use crate::error::SparkError;

/// Replies are a few kilobytes; anything near this is a misbehaving peer.
pub const MAX_MESSAGE_SIZE: usize = 1 * 1024 * 1024;

#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, SparkError> {
        let config = WebSocketConfig {
            max_message_size: Some(MAX_MESSAGE_SIZE),
            ..WebSocketConfig::default()
        };
        let (stream, response) = connect_async_with_config(url, Some(config), false).await?;
        debug!("WebSocket handshake completed with status {}", response.status());
        Ok(Box::new(WsConnection { stream, closed: false }))
    }
}

pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

#[async_trait]
impl Connection for WsConnection {
    async fn send_text(&mut self, text: String) -> Result<(), SparkError> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn next_text(&mut self) -> Option<Result<String, SparkError>> {
        while let Some(msg) = self.stream.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    return Some(Ok(text));
                }
                Ok(Message::Binary(data)) => {
                    return Some(
                        String::from_utf8(data).map_err(|e|
                            SparkError::Decode(format!("binary frame is not UTF-8: {}", e))
                        )
                    );
                }
                Ok(Message::Close(frame)) => {
                    info!("Received close frame from server: {:?}", frame);
                    self.closed = true;
                    return None;
                }
                Ok(Message::Ping(ping_data)) => {
                    if let Err(e) = self.stream.send(Message::Pong(ping_data)).await {
                        return Some(Err(e.into()));
                    }
                }
                Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
                Err(e) => {
                    return Some(Err(e.into()));
                }
            }
        }
        self.closed = true;
        None
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.close(None).await {
            warn!("Error while closing WebSocket: {}", e);
        }
    }
}
