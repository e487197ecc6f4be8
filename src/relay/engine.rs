//! Relay engine - routes inbound chat events to commands or the reply generator.

use std::sync::Arc;

use teloxide::types::{ChatId, Recipient};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::relay::api::ChatApi;
use crate::relay::commands::{route, Command, Route};
use crate::relay::gemini::truncate_chars;
use crate::relay::generator::{Generation, ReplyGenerator};
use crate::relay::history::{ConversationStore, Turn};
use crate::relay::knowledge::{KnowledgeBase, STATIC_FALLBACK};
use crate::relay::language::classify;
use crate::relay::update::{InboundEvent, SenderScope};

/// Chars of inbound text kept in log lines.
const LOG_PREVIEW_CHARS: usize = 50;

/// What the engine did with one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not a private chat.
    SkippedScope(SenderScope),
    /// Blank text.
    Ignored,
    Command(Command),
    Generated { model: String },
    /// Generator exhausted; a static reply was sent instead.
    Fallback,
}

pub struct RelayEngine {
    chat: Arc<dyn ChatApi>,
    generator: ReplyGenerator,
    store: ConversationStore,
    knowledge: KnowledgeBase,
}

impl RelayEngine {
    pub fn new(
        chat: Arc<dyn ChatApi>,
        generator: ReplyGenerator,
        store: ConversationStore,
        knowledge: KnowledgeBase,
    ) -> Self {
        Self {
            chat,
            generator,
            store,
            knowledge,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Handle `event` on a detached task. The caller never waits on it.
    pub fn dispatch(self: &Arc<Self>, event: InboundEvent) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let conversation_id = event.conversation_id;
            let outcome = engine.handle_event(event).await;
            debug!("Event for {} finished: {:?}", conversation_id, outcome);
        })
    }

    /// Handle one inbound event end to end. Never fails; problems are logged.
    pub async fn handle_event(&self, event: InboundEvent) -> Outcome {
        info!(
            "📩 {} chat {}: \"{}\"",
            event.scope.as_str(),
            event.conversation_id,
            truncate_chars(&event.text, LOG_PREVIEW_CHARS)
        );

        if event.scope != SenderScope::Private {
            return Outcome::SkippedScope(event.scope);
        }

        let chat_id = event.conversation_id;
        match route(&event.text) {
            Route::Ignore => Outcome::Ignored,
            Route::Command(command) => {
                info!("⚙️ Command {:?} in chat {}", command, chat_id);
                self.reply(chat_id, command.reply()).await;
                Outcome::Command(command)
            }
            Route::Generate(text) => self.generate_reply(chat_id, text).await,
        }
    }

    async fn generate_reply(&self, chat_id: i64, text: String) -> Outcome {
        if let Err(e) = self.chat.send_typing(chat_id).await {
            debug!("Typing indicator failed for {}: {}", chat_id, e);
        }

        let mode = classify(&text);

        // Held until commit so this is the only writer for the conversation.
        let mut session = self.store.session(chat_id).await;
        let request = self.generator.request(chat_id, mode, &session.turns(), &text);

        match self.generator.generate(&request).await {
            Generation::Reply { text: reply, model } => {
                session.commit(Turn::user(text), Turn::agent(reply.clone()));
                drop(session);
                self.reply(chat_id, &reply).await;
                Outcome::Generated { model }
            }
            Generation::Exhausted => {
                drop(session);
                let fallback = match self.knowledge.lookup(&text) {
                    Some(topic) => {
                        info!("📚 Topic '{}' fallback for chat {}", topic.name, chat_id);
                        topic.reply()
                    }
                    None => {
                        info!("📚 Static fallback for chat {}", chat_id);
                        STATIC_FALLBACK
                    }
                };
                self.reply(chat_id, fallback).await;
                Outcome::Fallback
            }
        }
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.chat.send_message(Recipient::Id(ChatId(chat_id)), text).await {
            warn!("Reply to {} not delivered: {}", chat_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::gemini::GenerateError;
    use crate::relay::testing::{RecordingChat, ScriptedGenerator};
    use chrono::Utc;
    use std::time::Duration;

    struct Harness {
        chat: Arc<RecordingChat>,
        backend: Arc<ScriptedGenerator>,
        engine: Arc<RelayEngine>,
    }

    fn harness(responses: Vec<Result<String, GenerateError>>, models: &[&str]) -> Harness {
        let chat = Arc::new(RecordingChat::new());
        let backend = Arc::new(ScriptedGenerator::new(responses));
        let generator = ReplyGenerator::new(
            backend.clone(),
            models.iter().map(|m| m.to_string()).collect(),
            Duration::from_millis(200),
            4,
        );
        let engine = Arc::new(RelayEngine::new(
            chat.clone(),
            generator,
            ConversationStore::new(4),
            KnowledgeBase::builtin(),
        ));
        Harness { chat, backend, engine }
    }

    fn event(scope: SenderScope, text: &str) -> InboundEvent {
        InboundEvent {
            conversation_id: 42,
            scope,
            text: text.to_string(),
            received_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_group_event_sends_nothing() {
        let h = harness(vec![Ok("hi".into())], &["m"]);
        let outcome = h.engine.handle_event(event(SenderScope::Group, "hello")).await;
        assert_eq!(outcome, Outcome::SkippedScope(SenderScope::Group));
        assert!(h.chat.sent().is_empty());
        assert!(h.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_channel_event_sends_nothing() {
        let h = harness(vec![], &["m"]);
        let outcome = h.engine.handle_event(event(SenderScope::Channel, "news")).await;
        assert_eq!(outcome, Outcome::SkippedScope(SenderScope::Channel));
        assert!(h.chat.sent().is_empty());
    }

    #[tokio::test]
    async fn test_ping_bypasses_generator_and_store() {
        let h = harness(vec![Ok("should not be used".into())], &["m"]);
        let outcome = h.engine.handle_event(event(SenderScope::Private, "PiNg")).await;

        assert_eq!(outcome, Outcome::Command(Command::Ping));
        assert!(h.backend.calls().is_empty());
        assert_eq!(h.chat.sent().len(), 1);
        assert_eq!(h.chat.sent()[0].text, "pong ✅");
        assert_eq!(h.chat.sent()[0].to, "42");
        assert_eq!(h.engine.store().conversation_count().await, 0);
    }

    #[tokio::test]
    async fn test_blank_text_dropped_silently() {
        let h = harness(vec![], &["m"]);
        let outcome = h.engine.handle_event(event(SenderScope::Private, "   ")).await;
        assert_eq!(outcome, Outcome::Ignored);
        assert!(h.chat.sent().is_empty());
        assert!(h.chat.typing().is_empty());
    }

    #[tokio::test]
    async fn test_successful_generation_commits_two_turns() {
        let h = harness(vec![Ok("Liquidity provision.".into())], &["m"]);
        let outcome = h.engine.handle_event(event(SenderScope::Private, "what is LP?")).await;

        assert_eq!(outcome, Outcome::Generated { model: "m".into() });
        assert_eq!(h.chat.sent()[0].text, "Liquidity provision.");
        assert_eq!(h.chat.typing(), vec![42]);
        assert_eq!(
            h.engine.store().read(42).await,
            vec![Turn::user("what is LP?"), Turn::agent("Liquidity provision.")]
        );
    }

    #[tokio::test]
    async fn test_exhausted_generation_commits_nothing_and_falls_back() {
        let h = harness(
            vec![Err(GenerateError::Http("down".into())), Err(GenerateError::Empty)],
            &["m1", "m2"],
        );
        let outcome = h.engine.handle_event(event(SenderScope::Private, "what's the weather")).await;

        assert_eq!(outcome, Outcome::Fallback);
        assert!(h.engine.store().read(42).await.is_empty());
        assert_eq!(h.chat.sent().len(), 1);
        assert_eq!(h.chat.sent()[0].text, STATIC_FALLBACK);
    }

    #[tokio::test]
    async fn test_exhausted_generation_prefers_topic_reply() {
        let h = harness(vec![], &["m1"]);
        let outcome = h.engine.handle_event(event(SenderScope::Private, "how do I add liquidity")).await;

        assert_eq!(outcome, Outcome::Fallback);
        let sent = &h.chat.sent()[0].text;
        assert_ne!(sent, STATIC_FALLBACK);
        assert!(!sent.is_empty());
    }

    #[tokio::test]
    async fn test_history_feeds_next_turn_and_stays_bounded() {
        let responses = (0..5).map(|i| Ok(format!("answer {i}"))).collect();
        let h = harness(responses, &["m"]);
        for i in 0..5 {
            h.engine
                .handle_event(event(SenderScope::Private, &format!("question {i}")))
                .await;
        }
        let turns = h.engine.store().read(42).await;
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[3], Turn::agent("answer 4"));
    }

    #[tokio::test]
    async fn test_send_failure_does_not_panic() {
        let chat = Arc::new(RecordingChat::new().failing_for("42"));
        let backend = Arc::new(ScriptedGenerator::new(vec![Ok("hi".into())]));
        let generator = ReplyGenerator::new(backend, vec!["m".into()], Duration::from_millis(200), 4);
        let engine = RelayEngine::new(chat.clone(), generator, ConversationStore::new(4), KnowledgeBase::builtin());

        let outcome = engine.handle_event(event(SenderScope::Private, "hello")).await;
        assert_eq!(outcome, Outcome::Generated { model: "m".into() });
        assert!(chat.sent().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_runs_in_background() {
        let h = harness(vec![Ok("done".into())], &["m"]);
        let handle = h.engine.dispatch(event(SenderScope::Private, "hello"));
        handle.await.unwrap();
        assert_eq!(h.chat.sent()[0].text, "done");
    }
}
