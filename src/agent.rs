use futures::StreamExt;
use log::{ error, info, warn };
use std::sync::atomic::{ AtomicBool, Ordering };
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::SparkError;
use crate::history::Conversation;
use crate::llm::{ SparkClient, StreamEvent };
use crate::models::chat::{ Exchange, Turn };

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply was appended to the conversation.
    Completed(String),
    /// Human-readable text to show in place of the reply.
    Failed { message: String },
    Cancelled { partial: String },
}

/// Holds the busy flag for the duration of one generation call.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, SparkError> {
        flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SparkError::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ChatAgent {
    client: SparkClient,
    conversation: Mutex<Conversation>,
    busy: AtomicBool,
    pacing: Duration,
    max_prompt_chars: usize,
}

impl ChatAgent {
    pub fn new(client: SparkClient) -> Self {
        let pacing = client.config().pacing;
        let max_prompt_chars = client.config().max_prompt_chars;
        Self {
            client,
            conversation: Mutex::new(Conversation::new()),
            busy: AtomicBool::new(false),
            pacing,
            max_prompt_chars,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub async fn turns(&self) -> Vec<Turn> {
        self.conversation.lock().await.turns().to_vec()
    }

    pub async fn exchanges(&self) -> Vec<Exchange> {
        self.conversation.lock().await.exchanges()
    }

    fn check_prompt(&self, prompt: &str) -> Result<(), SparkError> {
        if prompt.trim().is_empty() {
            return Err(SparkError::InvalidPrompt("prompt is empty".to_string()));
        }
        let chars = prompt.chars().count();
        if chars > self.max_prompt_chars {
            return Err(
                SparkError::InvalidPrompt(
                    format!("prompt is {} characters, limit is {}", chars, self.max_prompt_chars)
                )
            );
        }
        Ok(())
    }

    /// Sends a new user prompt. The user turn is recorded immediately; the
    /// assistant turn only when the reply completes with content.
    pub async fn send<F>(
        &self,
        prompt: &str,
        cancel: CancellationToken,
        on_event: F
    ) -> Result<TurnOutcome, SparkError>
        where F: FnMut(&StreamEvent)
    {
        self.check_prompt(prompt)?;
        let _guard = BusyGuard::acquire(&self.busy)?;

        let history = {
            let mut conversation = self.conversation.lock().await;
            let history = conversation.turns().to_vec();
            conversation.append_user(prompt);
            info!(
                "Conversation {}: sending prompt with {} prior turns",
                conversation.id(),
                history.len()
            );
            history
        };

        Ok(self.stream_reply(prompt, &history, cancel, on_event).await)
    }

    /// Re-issues the last user prompt against the history preceding it.
    /// No new user turn is recorded.
    pub async fn regenerate<F>(
        &self,
        cancel: CancellationToken,
        on_event: F
    ) -> Result<TurnOutcome, SparkError>
        where F: FnMut(&StreamEvent)
    {
        let _guard = BusyGuard::acquire(&self.busy)?;

        let (prompt, history) = {
            let conversation = self.conversation.lock().await;
            let context = conversation.regeneration_context().ok_or(SparkError::NothingToRegenerate)?;
            info!("Conversation {}: regenerating last reply", conversation.id());
            context
        };

        Ok(self.stream_reply(&prompt, &history, cancel, on_event).await)
    }

    async fn stream_reply<F>(
        &self,
        prompt: &str,
        history: &[Turn],
        cancel: CancellationToken,
        mut on_event: F
    ) -> TurnOutcome
        where F: FnMut(&StreamEvent)
    {
        let mut stream = self.client.generate(prompt, history, cancel);
        let mut full_response = String::new();
        let mut failure: Option<SparkError> = None;
        let mut completed = false;

        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    match &event {
                        StreamEvent::Delta(text) => full_response.push_str(text),
                        StreamEvent::Restart { attempt } => {
                            warn!("Reply restarted (attempt {}), discarding partial text", attempt);
                            full_response.clear();
                        }
                        StreamEvent::Completed => {
                            completed = true;
                        }
                    }
                    on_event(&event);
                    if matches!(event, StreamEvent::Delta(_)) && !self.pacing.is_zero() {
                        tokio::time::sleep(self.pacing).await;
                    }
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = failure {
            error!("Error while generating reply: {}", e);
            return TurnOutcome::Failed { message: e.inline_message() };
        }
        if !completed {
            info!("Reply cancelled after {} chars", full_response.chars().count());
            return TurnOutcome::Cancelled { partial: full_response };
        }
        if full_response.trim().is_empty() {
            let e = SparkError::EmptyResponse;
            error!("Error while generating reply: {}", e);
            return TurnOutcome::Failed { message: e.inline_message() };
        }

        self.conversation.lock().await.append_assistant(full_response.clone());
        TurnOutcome::Completed(full_response)
    }
}
