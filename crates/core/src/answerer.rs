use crate::cache::AnswerCache;
use crate::chat::ChatModel;
use crate::embeddings::Embedder;
use crate::error::{EmbedError, QueryError};
use crate::models::ChatMessage;
use crate::traits::VectorIndex;
use std::num::NonZeroUsize;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You answer questions about the user's uploaded documents. \
Ground your answer in the provided context; if the context does not cover the question, \
say that you have no relevant information.";

#[derive(Debug, Clone, Copy)]
pub struct AnswererOptions {
    pub cache_capacity: NonZeroUsize,
    pub top_k: usize,
    pub max_tokens: u32,
}

impl Default for AnswererOptions {
    fn default() -> Self {
        Self {
            cache_capacity: NonZeroUsize::new(256).unwrap(),
            top_k: 1,
            max_tokens: 512,
        }
    }
}

/// Answers questions over the indexed corpus, memoizing per exact
/// question-plus-history key.
///
/// A cache hit returns without touching the embeddings, index, or chat
/// providers. A generation failure leaves the cache untouched.
pub struct QueryAnswerer<E, V, C> {
    embedder: E,
    index: V,
    chat: C,
    cache: AnswerCache,
    options: AnswererOptions,
}

impl<E, V, C> QueryAnswerer<E, V, C>
where
    E: Embedder,
    V: VectorIndex,
    C: ChatModel,
{
    pub fn new(embedder: E, index: V, chat: C, options: AnswererOptions) -> Self {
        Self {
            embedder,
            index,
            chat,
            cache: AnswerCache::new(options.cache_capacity),
            options,
        }
    }

    pub async fn answer(&self, question: &str, history: &[String]) -> Result<String, QueryError> {
        if question.trim().is_empty() {
            return Err(QueryError::EmptyQuestion);
        }

        if let Some(cached) = self.cache.get(question, history) {
            debug!("answer served from cache");
            return Ok(cached);
        }

        let query_vector = self.embedder.embed(question).await.map_err(|error| match error {
            EmbedError::RateLimited(details) => QueryError::RateLimited(details),
            other => QueryError::Embedding(other),
        })?;

        let passages = self.index.search(&query_vector, self.options.top_k).await?;
        let context = passages
            .iter()
            .map(|passage| passage.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let system = if context.trim().is_empty() {
            format!("{SYSTEM_PROMPT}\n\nContext: (nothing indexed yet)")
        } else {
            format!("{SYSTEM_PROMPT}\n\nContext:\n{context}")
        };

        let mut messages = history_messages(history);
        messages.push(ChatMessage::user(question));

        let answer = self
            .chat
            .complete(&system, &messages, self.options.max_tokens)
            .await?;

        self.cache.put(question, history, &answer);
        Ok(answer)
    }

    pub fn cached_answers(&self) -> usize {
        self.cache.len()
    }
}

/// History arrives as a flat ordered list; entries alternate between the
/// user's questions and the assistant's answers.
fn history_messages(history: &[String]) -> Vec<ChatMessage> {
    history
        .iter()
        .enumerate()
        .map(|(index, turn)| {
            if index % 2 == 0 {
                ChatMessage::user(turn.clone())
            } else {
                ChatMessage::assistant(turn.clone())
            }
        })
        .collect()
}
