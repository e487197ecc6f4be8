//! Reply generation with model fallback.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::relay::api::TextGenerator;
use crate::relay::gemini::GenerateError;
use crate::relay::history::{windowed, Role, Turn};
use crate::relay::language::LanguageMode;

/// Outcome of running the candidate chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    Reply { text: String, model: String },
    /// Every candidate errored, timed out or came back empty.
    Exhausted,
}

/// Everything needed for one pass over the candidate chain.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub conversation_id: i64,
    pub mode: LanguageMode,
    pub prompt: String,
    pub model_candidates: Vec<String>,
}

pub struct ReplyGenerator {
    backend: Arc<dyn TextGenerator>,
    models: Vec<String>,
    call_timeout: Duration,
    history_limit: usize,
}

impl ReplyGenerator {
    pub fn new(
        backend: Arc<dyn TextGenerator>,
        models: Vec<String>,
        call_timeout: Duration,
        history_limit: usize,
    ) -> Self {
        Self {
            backend,
            models,
            call_timeout,
            history_limit,
        }
    }

    /// Build the request for `text` on top of the stored `history`.
    pub fn request(
        &self,
        conversation_id: i64,
        mode: LanguageMode,
        history: &[Turn],
        text: &str,
    ) -> GenerationRequest {
        let turns = windowed(history, Turn::user(text), self.history_limit);
        GenerationRequest {
            conversation_id,
            mode,
            prompt: build_prompt(mode, &turns),
            model_candidates: self.models.clone(),
        }
    }

    /// Try each candidate in order; the first non-empty text wins.
    pub async fn generate(&self, request: &GenerationRequest) -> Generation {
        for model in &request.model_candidates {
            let outcome = tokio::time::timeout(
                self.call_timeout,
                self.backend.generate(model, &request.prompt),
            )
            .await
            .unwrap_or(Err(GenerateError::Timeout(self.call_timeout)));

            match outcome {
                Ok(text) if !text.trim().is_empty() => {
                    info!(
                        "🤖 Reply for {} from {} ({:?}, {} chars)",
                        request.conversation_id,
                        model,
                        request.mode,
                        text.chars().count()
                    );
                    return Generation::Reply {
                        text: text.trim().to_string(),
                        model: model.clone(),
                    };
                }
                Ok(_) => warn!("Model {} returned empty text, trying next", model),
                Err(e) => warn!("Model {} failed: {}, trying next", model, e),
            }
        }

        warn!(
            "All {} model candidate(s) failed for {}",
            request.model_candidates.len(),
            request.conversation_id
        );
        Generation::Exhausted
    }
}

/// Prompt = rules preamble + prior turns + the newest user message.
///
/// `turns` must end with the new user turn.
pub fn build_prompt(mode: LanguageMode, turns: &[Turn]) -> String {
    let mut prompt = String::from(
        "You are a community assistant for crypto education and community operations.\n\
         Rules:\n",
    );
    prompt.push_str(&format!("- {}\n", mode.instruction()));
    prompt.push_str(
        "- Keep it professional, concise and actionable.\n\
         - Never promise or guarantee profits, returns or prices; refuse such requests and offer safe alternatives.\n\
         - If the question is vague or ambiguous, ask exactly one clarifying question first.\n",
    );

    let (current, prior) = match turns.split_last() {
        Some((last, rest)) if last.role == Role::User => (last.text.as_str(), rest),
        _ => ("", turns),
    };

    if !prior.is_empty() {
        prompt.push_str("\nConversation so far:\n");
        for turn in prior {
            prompt.push_str(&format!("{}: {}\n", turn.role.label(), turn.text));
        }
    }

    prompt.push_str("\nUser message:\n");
    prompt.push_str(current);
    prompt
}
