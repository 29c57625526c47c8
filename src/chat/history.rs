use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::debug;

use super::types::{ConversationState, Message};
use crate::llm::Turn;

pub type StateReceiver = watch::Receiver<ConversationState>;

/// Single source of truth for what the UI renders.
///
/// Every change is a read-modify-write of the whole snapshot performed under
/// the watch channel's lock, so observers only ever see complete states.
/// After [`close`](Self::close) all writes are discarded.
pub struct ConversationHistory {
    tx: watch::Sender<ConversationState>,
    closed: AtomicBool,
}

impl ConversationHistory {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConversationState::default());
        Self {
            tx,
            closed: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> StateReceiver {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> ConversationState {
        self.tx.borrow().clone()
    }

    /// Publishes `f(current)` if it returns a new state. Returns whether
    /// anything was published.
    pub fn update(
        &self,
        f: impl FnOnce(&ConversationState) -> Option<ConversationState>,
    ) -> bool {
        self.tx.send_if_modified(|state| {
            if self.closed.load(Ordering::Acquire) {
                return false;
            }
            match f(state) {
                Some(next) => {
                    *state = next;
                    true
                }
                None => false,
            }
        })
    }

    /// Stops accepting writes. Takes the channel lock so a write that is
    /// already in progress finishes first and nothing lands afterwards.
    pub fn close(&self) {
        self.tx.send_if_modified(|_| {
            self.closed.store(true, Ordering::Release);
            false
        });
        debug!("conversation history closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Appends the user message and its placeholder reply and marks the
    /// conversation as streaming. Refused while another turn is in flight.
    pub fn begin_turn(&self, user: Message, placeholder: Message) -> bool {
        self.update(|state| {
            if state.is_streaming {
                return None;
            }
            Some(state.with_appended([user, placeholder]).with_streaming(true))
        })
    }

    pub fn append_text(&self, delta: &str) -> bool {
        if delta.is_empty() {
            return false;
        }
        self.update(|state| state.with_last_replaced(|m| m.with_appended_text(delta)))
    }

    pub fn set_hint(&self, hint: &str) -> bool {
        self.update(|state| state.with_last_replaced(|m| m.with_hint(hint)))
    }

    /// Ends the turn normally. A hint left on a reply that never received
    /// content is dropped.
    pub fn finish_turn(&self) -> bool {
        self.update(|state| {
            let next = state
                .with_last_replaced(|m| m.without_hint())
                .unwrap_or_else(|| state.clone());
            Some(next.with_streaming(false))
        })
    }

    /// Ends the turn with `error` replacing the in-flight reply's content.
    pub fn fail_turn(&self, error: &str) -> bool {
        self.update(|state| {
            let next = state
                .with_last_replaced(|m| m.with_content(error))
                .unwrap_or_else(|| state.clone());
            Some(next.with_streaming(false))
        })
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Append-only record of the turns exchanged with the backend, sent in full
/// with every request.
#[derive(Debug, Clone, Default)]
pub struct TurnLog {
    turns: Vec<Turn>,
}

impl TurnLog {
    pub fn new() -> Self {
        Self::default()
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

    /// Full request contents: everything so far followed by `pending`.
    pub fn contents_with(&self, pending: &Turn) -> Vec<Turn> {
        let mut contents = Vec::with_capacity(self.turns.len() + 1);
        contents.extend_from_slice(&self.turns);
        contents.push(pending.clone());
        contents
    }

    /// Records a completed exchange. An empty reply is not recorded.
    pub fn commit(&mut self, prompt: Turn, reply: Turn) {
        self.turns.push(prompt);
        if !reply.parts.is_empty() {
            self.turns.push(reply);
        }
    }

    /// Drops every turn recorded after `mark`.
    pub fn rollback(&mut self, mark: usize) {
        self.turns.truncate(mark);
    }
}
