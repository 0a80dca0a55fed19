//! Prompt assembly and the answer synthesizer.

use std::sync::Arc;

use docqa_core::config::GenerationSettings;
use docqa_core::error::Result;
use docqa_core::traits::GenerationProvider;
use docqa_core::types::{Answer, CompletionRequest, RetrievalOutcome, RetrievalResult};

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant. \
Answer the question using ONLY the provided context. \
If the answer is not in the context, say you don't know. \
Always include citations like [1], [2] that refer to the numbered context chunks.";

/// Returned verbatim, without calling the generator, when retrieval finds nothing.
pub const DONT_KNOW_ANSWER: &str = "I don't know. No relevant context found.";

/// `[n] (source | chunk_id)` headers over each chunk text, blank-line separated.
pub fn format_context_block(contexts: &[RetrievalResult]) -> String {
    contexts
        .iter()
        .enumerate()
        .map(|(i, c)| format!("[{}] ({} | {})\n{}", i + 1, c.source, c.chunk_id, c.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn user_message(question: &str, contexts: &[RetrievalResult]) -> String {
    format!("Question:\n{question}\n\nContext:\n{}", format_context_block(contexts))
}

pub struct Synthesizer {
    provider: Arc<dyn GenerationProvider>,
    model: String,
    temperature: f32,
}

impl Synthesizer {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self { provider, model: model.into(), temperature }
    }

    pub fn from_settings(
        provider: Arc<dyn GenerationProvider>,
        settings: &GenerationSettings,
    ) -> Self {
        Self::new(provider, settings.model.clone(), settings.temperature)
    }

    pub fn request(&self, question: &str, contexts: &[RetrievalResult]) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            system: SYSTEM_PROMPT.to_string(),
            user: user_message(question, contexts),
            temperature: self.temperature,
        }
    }

    pub async fn answer(&self, question: &str, outcome: RetrievalOutcome) -> Result<Answer> {
        let contexts = match outcome {
            RetrievalOutcome::NoContext => {
                return Ok(Answer { answer: DONT_KNOW_ANSWER.to_string(), contexts: Vec::new() });
            }
            RetrievalOutcome::Context(contexts) => contexts,
        };
        let request = self.request(question, &contexts);
        let answer = self.provider.complete(&request).await?;
        tracing::debug!(model = %self.model, contexts = contexts.len(), "synthesized answer");
        Ok(Answer { answer, contexts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn ctx(rank: usize, source: &str, chunk_id: &str, text: &str) -> RetrievalResult {
        RetrievalResult {
            rank,
            score: 0.5,
            source: source.into(),
            chunk_id: chunk_id.into(),
            text: text.into(),
        }
    }

    #[derive(Default)]
    struct Capture {
        seen: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl GenerationProvider for Capture {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            self.seen.lock().unwrap().push(request.clone());
            Ok("Paris [1]".into())
        }
    }

    #[test]
    fn context_block_is_numbered_and_blank_line_separated() {
        let block = format_context_block(&[
            ctx(1, "a.txt", "a.txt::chunk_0", "alpha"),
            ctx(2, "b.pdf", "b.pdf::chunk_3", "beta\ngamma"),
        ]);
        assert_eq!(
            block,
            "[1] (a.txt | a.txt::chunk_0)\nalpha\n\n[2] (b.pdf | b.pdf::chunk_3)\nbeta\ngamma"
        );
    }

    #[test]
    fn user_message_carries_question_then_context() {
        let msg = user_message("Where?", &[ctx(1, "a.txt", "a.txt::chunk_0", "here")]);
        assert_eq!(msg, "Question:\nWhere?\n\nContext:\n[1] (a.txt | a.txt::chunk_0)\nhere");
    }

    #[tokio::test]
    async fn no_context_skips_the_generator() {
        let provider = Arc::new(Capture::default());
        let synth = Synthesizer::new(provider.clone(), "m", 0.2);
        let answer = synth.answer("anything", RetrievalOutcome::NoContext).await.unwrap();
        assert_eq!(answer.answer, DONT_KNOW_ANSWER);
        assert!(answer.contexts.is_empty());
        assert!(provider.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn context_is_sent_with_constrained_system_prompt() {
        let provider = Arc::new(Capture::default());
        let synth = Synthesizer::new(provider.clone(), "gpt-4o-mini", 0.2);
        let contexts = vec![ctx(1, "a.txt", "a.txt::chunk_0", "The capital is Paris.")];
        let answer =
            synth.answer("Capital?", RetrievalOutcome::Context(contexts.clone())).await.unwrap();

        assert_eq!(answer.answer, "Paris [1]");
        assert_eq!(answer.contexts, contexts);
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "gpt-4o-mini");
        assert_eq!(seen[0].system, SYSTEM_PROMPT);
        assert!(seen[0].user.contains("[1] (a.txt | a.txt::chunk_0)"));
        assert!((seen[0].temperature - 0.2).abs() < f32::EPSILON);
    }
}
