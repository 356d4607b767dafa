//! Conversation state for a single chat screen: the message log, the draft
//! being composed, and the flag guarding the one outstanding request.
//!
//! Every mutation of the log is written through to the [`HistoryStore`] and
//! announced to registered [`ConversationObserver`]s. I/O failures never
//! reach the caller: a failed read means "no history", a failed write is
//! logged, and a failed endpoint call becomes an assistant message.

use chrono::Utc;
use log::{ debug, info, warn };
use std::collections::HashSet;
use std::sync::{ Arc, Mutex, MutexGuard, PoisonError, RwLock };

use crate::endpoint::{ ChatEndpoint, EndpointError, HttpChatEndpoint, DEFAULT_API_URL };
use crate::history::HistoryStore;
use crate::models::chat::{ ChatTurn, Message, Role };

pub const DEFAULT_STORAGE_KEY: &str = "chat_messages_v1";

const ERROR_PREFIX: &str = "⚠️ Error: ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationConfig {
    /// Key under which the whole log is persisted.
    pub storage_key: String,
    /// Base URL of the chat completion endpoint.
    pub base_url: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            base_url: DEFAULT_API_URL.to_string(),
        }
    }
}

/// Post-mutation hooks for the presentation layer. Callbacks run after the
/// controller has released its state, so they may call back into it.
pub trait ConversationObserver: Send + Sync {
    fn on_messages_changed(&self, _messages: &[Message]) {}

    fn on_sending_changed(&self, _sending: bool) {}

    fn on_scroll_to_latest(&self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Draft was empty after trimming.
    Ignored,
    /// Another send is still in flight.
    Busy,
    Replied,
    /// The endpoint failed; the reason was appended as an assistant message.
    Failed(String),
}

#[derive(Default)]
struct ConversationState {
    messages: Vec<Message>,
    draft: String,
    sending: bool,
}

impl ConversationState {
    fn append(&mut self, role: Role, content: String) -> Vec<Message> {
        let now = Utc::now().timestamp_millis();
        let created_at = self.messages.last().map_or(now, |last| now.max(last.created_at));
        self.messages.push(Message::new(role, content, created_at));
        self.messages.clone()
    }
}

pub struct ConversationController {
    config: ConversationConfig,
    store: Arc<dyn HistoryStore>,
    endpoint: Arc<dyn ChatEndpoint>,
    state: Mutex<ConversationState>,
    observers: RwLock<Vec<Arc<dyn ConversationObserver>>>,
    // Orders store writes and deletes; each write snapshots the log only once
    // it holds this, so the store always ends at the latest in-memory state.
    store_lock: tokio::sync::Mutex<()>,
}

impl ConversationController {
    pub fn new(
        config: ConversationConfig,
        store: Arc<dyn HistoryStore>,
        endpoint: Arc<dyn ChatEndpoint>
    ) -> Self {
        Self {
            config,
            store,
            endpoint,
            state: Mutex::new(ConversationState::default()),
            observers: RwLock::new(Vec::new()),
            store_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Builds a controller and loads the persisted history.
    pub async fn open(
        config: ConversationConfig,
        store: Arc<dyn HistoryStore>,
        endpoint: Arc<dyn ChatEndpoint>
    ) -> Self {
        let controller = Self::new(config, store, endpoint);
        controller.load().await;
        controller
    }

    /// Like [`open`](Self::open), talking HTTP to `config.base_url`.
    pub async fn open_http(
        config: ConversationConfig,
        store: Arc<dyn HistoryStore>
    ) -> Result<Self, EndpointError> {
        let endpoint = HttpChatEndpoint::new(&config.base_url)?;
        info!("Chat endpoint: {}", endpoint.chat_url());
        Ok(Self::open(config, store, Arc::new(endpoint)).await)
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    pub fn subscribe(&self, observer: Arc<dyn ConversationObserver>) {
        self.observers.write().unwrap_or_else(PoisonError::into_inner).push(observer);
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state().messages.clone()
    }

    pub fn draft(&self) -> String {
        self.state().draft.clone()
    }

    pub fn is_sending(&self) -> bool {
        self.state().sending
    }

    /// Replaces the log with the persisted one. Returns the number of
    /// messages loaded; any failure leaves the log empty.
    pub async fn load(&self) -> usize {
        let raw = match self.store.get(&self.config.storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No stored conversation under '{}'", self.config.storage_key);
                return 0;
            }
            Err(e) => {
                warn!("Failed to read conversation '{}': {}", self.config.storage_key, e);
                return 0;
            }
        };

        let messages = match decode_log(&raw) {
            Ok(messages) => messages,
            Err(reason) => {
                warn!("Ignoring stored conversation '{}': {}", self.config.storage_key, reason);
                return 0;
            }
        };

        let count = messages.len();
        self.state().messages = messages.clone();
        self.notify(|o| o.on_messages_changed(&messages));
        info!("Loaded {} messages from '{}'", count, self.config.storage_key);
        count
    }

    pub fn update_draft(&self, text: impl Into<String>) {
        self.state().draft = text.into();
    }

    pub async fn send(&self) -> SendOutcome {
        let (turns, snapshot) = {
            let mut state = self.state();
            if state.sending {
                return SendOutcome::Busy;
            }
            let content = state.draft.trim().to_string();
            if content.is_empty() {
                return SendOutcome::Ignored;
            }
            let snapshot = state.append(Role::User, content);
            state.draft.clear();
            state.sending = true;
            let turns: Vec<ChatTurn> = snapshot.iter().map(Message::to_turn).collect();
            (turns, snapshot)
        };
        self.notify(|o| {
            o.on_messages_changed(&snapshot);
            o.on_sending_changed(true);
        });

        let (_, result) = futures::join!(self.persist(), self.endpoint.submit(&turns));

        let (reply, outcome) = match result {
            Ok(text) => (text, SendOutcome::Replied),
            Err(e) => {
                warn!("Chat endpoint failed: {}", e);
                let reason = e.to_string();
                (format!("{}{}", ERROR_PREFIX, reason), SendOutcome::Failed(reason))
            }
        };

        let snapshot = {
            let mut state = self.state();
            let snapshot = state.append(Role::Assistant, reply);
            state.sending = false;
            snapshot
        };
        self.notify(|o| {
            o.on_messages_changed(&snapshot);
            o.on_sending_changed(false);
        });
        self.persist().await;
        self.notify(|o| o.on_scroll_to_latest());

        outcome
    }

    /// Empties the log and deletes the stored copy. A send still in flight
    /// will append its reply to the emptied log when it completes.
    pub async fn clear(&self) {
        self.state().messages.clear();
        self.notify(|o| o.on_messages_changed(&[]));
        let _guard = self.store_lock.lock().await;
        if let Err(e) = self.store.delete(&self.config.storage_key).await {
            warn!("Failed to delete conversation '{}': {}", self.config.storage_key, e);
        }
    }

    async fn persist(&self) {
        let _guard = self.store_lock.lock().await;
        let messages = self.messages();
        let json = match serde_json::to_string(&messages) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize conversation: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.set(&self.config.storage_key, &json).await {
            warn!("Failed to persist conversation '{}': {}", self.config.storage_key, e);
        }
    }

    fn state(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, f: impl Fn(&dyn ConversationObserver)) {
        let observers = self.observers.read().unwrap_or_else(PoisonError::into_inner).clone();
        for observer in &observers {
            f(observer.as_ref());
        }
    }
}

fn decode_log(raw: &str) -> Result<Vec<Message>, String> {
    let messages: Vec<Message> = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    let mut seen = HashSet::with_capacity(messages.len());
    for msg in &messages {
        if !seen.insert(msg.id.as_str()) {
            return Err(format!("duplicate message id '{}'", msg.id));
        }
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_duplicate_ids() {
        let raw =
            r#"[{"id":"a","role":"user","content":"x","createdAt":1},
               {"id":"a","role":"assistant","content":"y","createdAt":2}]"#;
        assert!(decode_log(raw).unwrap_err().contains("duplicate"));
    }

    #[test]
    fn decode_rejects_foreign_roles() {
        let raw = r#"[{"id":"a","role":"system","content":"x","createdAt":1}]"#;
        assert!(decode_log(raw).is_err());
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let mut state = ConversationState::default();
        state.messages.push(Message::new(Role::User, "future", i64::MAX - 1));
        let snapshot = state.append(Role::Assistant, "reply".into());
        assert_eq!(snapshot[1].created_at, i64::MAX - 1);
    }
}
