//! Per-conversation bounded history used as prompt context.
//!
//! Lives for the process lifetime only. Conversations appear lazily on their
//! first append and are never removed; each one keeps at most `limit` turns,
//! oldest evicted first.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Agent,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Agent => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self { role: Role::Agent, text: text.into() }
    }
}

type Window = Arc<Mutex<VecDeque<Turn>>>;

pub struct ConversationStore {
    limit: usize,
    conversations: Mutex<HashMap<i64, Window>>,
}

impl ConversationStore {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            conversations: Mutex::new(HashMap::new()),
        }
    }

    /// Current window, oldest first. Unknown ids read as empty.
    pub async fn read(&self, conversation_id: i64) -> Vec<Turn> {
        let window = {
            let map = self.conversations.lock().await;
            match map.get(&conversation_id) {
                Some(w) => w.clone(),
                None => return Vec::new(),
            }
        };
        let turns = window.lock().await;
        turns.iter().cloned().collect()
    }

    /// Append turns, then evict from the front until the bound holds.
    pub async fn append(&self, conversation_id: i64, turns: impl IntoIterator<Item = Turn>) {
        let mut session = self.session(conversation_id).await;
        session.push(turns);
    }

    /// Exclusive access to one conversation until the returned guard drops.
    ///
    /// Holding it across a generation round trip makes the holder the only
    /// writer for that id.
    pub async fn session(&self, conversation_id: i64) -> ConversationSession {
        let window = {
            let mut map = self.conversations.lock().await;
            map.entry(conversation_id).or_default().clone()
        };
        ConversationSession {
            limit: self.limit,
            turns: window.lock_owned().await,
        }
    }

    /// Number of conversations seen so far.
    pub async fn conversation_count(&self) -> usize {
        self.conversations.lock().await.len()
    }
}

pub struct ConversationSession {
    limit: usize,
    turns: OwnedMutexGuard<VecDeque<Turn>>,
}

impl ConversationSession {
    pub fn turns(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    /// Record a completed exchange; both turns land or neither does.
    pub fn commit(&mut self, user: Turn, agent: Turn) {
        self.push([user, agent]);
    }

    fn push(&mut self, turns: impl IntoIterator<Item = Turn>) {
        self.turns.extend(turns);
        while self.turns.len() > self.limit {
            self.turns.pop_front();
        }
    }
}

/// Last `limit` entries of `history` followed by `next`. An agent turn left
/// at the front without its user turn is dropped.
pub fn windowed(history: &[Turn], next: Turn, limit: usize) -> Vec<Turn> {
    let mut turns: Vec<Turn> = history.to_vec();
    turns.push(next);
    let excess = turns.len().saturating_sub(limit);
    turns.drain(..excess);
    if turns.len() > 1 && turns[0].role == Role::Agent {
        turns.remove(0);
    }
    turns
}
