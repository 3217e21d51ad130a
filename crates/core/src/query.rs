use crate::chunking::normalize_whitespace;
use crate::error::QueryError;
use crate::generation::GenerationModel;
use crate::models::RetrievedChunk;
use crate::store::VectorStore;
use tracing::{debug, error};

pub const FALLBACK_ANSWER: &str = "error processing request";
pub const NO_ANSWER: &str = "no answer found";

const PROMPT_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";
const CHARS_PER_TOKEN: usize = 4;

/// Retrieve-then-generate over one store and one model, with a single "stuffed" prompt.
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine {
    top_k: usize,
}

impl QueryEngine {
    pub fn new(top_k: usize) -> Self {
        Self { top_k: top_k.max(1) }
    }

    /// Answers `question`. Retrieval and generation failures degrade to [`FALLBACK_ANSWER`].
    pub async fn answer(
        &self,
        store: &dyn VectorStore,
        model: &dyn GenerationModel,
        question: &str,
    ) -> Result<String, QueryError> {
        let question = normalize_whitespace(question);
        if question.is_empty() {
            return Err(QueryError::InvalidInput("please provide a question.".to_string()));
        }

        let retrieved = match store.similarity_search(&question, self.top_k).await {
            Ok(retrieved) => retrieved,
            Err(error) => {
                error!(%error, "error during qa retrieval");
                return Ok(FALLBACK_ANSWER.to_string());
            }
        };
        debug!(hits = retrieved.len(), "retrieved context chunks");

        let budget = model
            .context_length()
            .saturating_sub(model.max_new_tokens())
            .saturating_mul(CHARS_PER_TOKEN);
        let prompt = build_prompt(&question, &retrieved, budget);

        match model.generate(&prompt).await {
            Ok(answer) if answer.trim().is_empty() => Ok(NO_ANSWER.to_string()),
            Ok(answer) => Ok(answer.trim().to_string()),
            Err(error) => {
                error!(%error, "error during qa generation");
                Ok(FALLBACK_ANSWER.to_string())
            }
        }
    }
}

/// Builds the single prompt holding every retrieved chunk and the question.
/// When the prompt would exceed `max_chars`, the context is cut from its end so
/// the instructions and question always survive.
pub fn build_prompt(question: &str, chunks: &[RetrievedChunk], max_chars: usize) -> String {
    let context = chunks
        .iter()
        .map(|chunk| chunk.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n");
    let tail = format!("\n\nQuestion: {question}\nHelpful Answer:");
    let head = format!("{PROMPT_PREAMBLE}\n\n");

    let fixed = head.chars().count() + tail.chars().count();
    let room = max_chars.saturating_sub(fixed);
    let context = if context.chars().count() > room {
        context.chars().take(room).collect::<String>()
    } else {
        context
    };

    format!("{head}{context}{tail}")
}
