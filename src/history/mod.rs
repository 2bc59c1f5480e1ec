use uuid::Uuid;

use crate::models::chat::{ Exchange, Role, Turn };

/// Append-only log of turns for one session. The order is replayed to the
/// service on every request.
#[derive(Clone, Debug)]
pub struct Conversation {
    id: String,
    turns: Vec<Turn>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4().to_string(), turns: Vec::new() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::user(text));
    }

    /// Only called with a reply that completed with content.
    pub fn append_assistant(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::assistant(text));
    }

    fn last_user_index(&self) -> Option<usize> {
        self.turns.iter().rposition(|t| t.role == Role::User)
    }

    pub fn last_user_prompt(&self) -> Option<&str> {
        self.last_user_index().map(|i| self.turns[i].content.as_str())
    }

    /// The last user prompt and the history that preceded it, for re-issuing
    /// the last turn without duplicating the prompt.
    pub fn regeneration_context(&self) -> Option<(String, Vec<Turn>)> {
        let idx = self.last_user_index()?;
        Some((self.turns[idx].content.clone(), self.turns[..idx].to_vec()))
    }

    /// Each user turn paired with the latest assistant reply that followed it.
    pub fn exchanges(&self) -> Vec<Exchange> {
        let mut exchanges: Vec<Exchange> = Vec::new();
        for turn in &self.turns {
            match turn.role {
                Role::User => exchanges.push(Exchange {
                    user_question: turn.content.clone(),
                    ai_answer: None,
                }),
                Role::Assistant => {
                    if let Some(last) = exchanges.last_mut() {
                        last.ai_answer = Some(turn.content.clone());
                    }
                }
            }
        }
        exchanges
    }
}
