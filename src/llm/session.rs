use log::{ debug, error };
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::StreamEvent;
use crate::error::SparkError;
use crate::models::spark::Frame;
use crate::transport::{ Connection, Connector };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    AwaitingFrame,
    Decoding,
    Completed,
    Failed,
}

/// How a session that did not fail came to an end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    Completed { text: String },
    /// Cancelled by the caller, or the consumer dropped the stream.
    Stopped,
}

/// One connection handling one attempt of a generation call.
pub struct StreamSession<'a> {
    tx: &'a mpsc::Sender<Result<StreamEvent, SparkError>>,
    cancel: &'a CancellationToken,
    state: SessionState,
    text: String,
}

impl<'a> StreamSession<'a> {
    pub fn new(
        tx: &'a mpsc::Sender<Result<StreamEvent, SparkError>>,
        cancel: &'a CancellationToken
    ) -> Self {
        Self { tx, cancel, state: SessionState::Idle, text: String::new() }
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Stream session {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Opens the connection, sends `request` once and forwards every decoded
    /// character. The connection is closed exactly once if it was opened.
    pub async fn run(
        mut self,
        connector: &dyn Connector,
        url: &str,
        request: String
    ) -> Result<SessionEnd, SparkError> {
        let cancel = self.cancel;
        let tx = self.tx;
        self.transition(SessionState::Connecting);
        let connected = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.transition(SessionState::Completed);
                return Ok(SessionEnd::Stopped);
            }
            _ = tx.closed() => {
                debug!("Stream consumer went away before connect");
                self.transition(SessionState::Completed);
                return Ok(SessionEnd::Stopped);
            }
            res = connector.connect(url) => res,
        };
        let mut conn = match connected {
            Ok(conn) => conn,
            Err(e) => {
                self.transition(SessionState::Failed);
                return Err(e);
            }
        };

        let result = self.drive(conn.as_mut(), request).await;
        conn.close().await;

        match &result {
            Ok(_) => self.transition(SessionState::Completed),
            Err(_) => self.transition(SessionState::Failed),
        }
        result
    }

    async fn drive(
        &mut self,
        conn: &mut dyn Connection,
        request: String
    ) -> Result<SessionEnd, SparkError> {
        let cancel = self.cancel;
        let tx = self.tx;
        conn.send_text(request).await?;

        loop {
            self.transition(SessionState::AwaitingFrame);
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Stream session cancelled while awaiting frame");
                    return Ok(SessionEnd::Stopped);
                }
                _ = tx.closed() => {
                    debug!("Stream consumer went away while awaiting frame");
                    return Ok(SessionEnd::Stopped);
                }
                next = conn.next_text() => next,
            };

            let raw = match next {
                Some(Ok(raw)) => raw,
                Some(Err(e)) => {
                    return Err(e);
                }
                None => {
                    return Err(
                        SparkError::Transport("connection closed before final frame".to_string())
                    );
                }
            };

            self.transition(SessionState::Decoding);
            match Frame::decode(&raw)? {
                Frame::Error { code, message } => {
                    error!("Service error: {} - {}", code, message);
                    return Err(SparkError::Application { code, message });
                }
                Frame::Content { text, is_final } => {
                    for ch in text.chars() {
                        if cancel.is_cancelled() {
                            return Ok(SessionEnd::Stopped);
                        }
                        if tx.send(Ok(StreamEvent::Delta(ch.to_string()))).await.is_err() {
                            debug!("Stream consumer went away, stopping session");
                            return Ok(SessionEnd::Stopped);
                        }
                        self.text.push(ch);
                    }
                    if is_final {
                        return Ok(SessionEnd::Completed { text: std::mem::take(&mut self.text) });
                    }
                }
            }
        }
    }
}
