//! Answer composition: retrieved chunks → prompt → model → cited answer.
//!
//! The context block lists the retrieved chunks in ranked order, each
//! tagged with its provenance:
//!
//! ```text
//! [source=paper.pdf p. 3]
//! chunk text...
//!
//! [source=https://example.com]
//! chunk text...
//! ```
//!
//! Citations returned to the caller are built from the same retrieval
//! results, never parsed out of the model's text.

use crate::config::Config;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::llm::{create_language_model, LanguageModel, Prompt};
use crate::models::{Answer, Citation, SearchHit};
use crate::retrieve::Retriever;

pub const SYSTEM_PROMPT: &str = "You are a precise research assistant. Answer only from the provided context.\n\
If the answer is not in the context, say you do not know.\n\
Always include citations like [source p. N] if page is available.";

/// Render hits as tagged blocks separated by a blank line.
pub fn format_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| {
            let tag = match hit.metadata.page {
                Some(page) => format!("[source={} p. {}]", hit.metadata.source, page),
                None => format!("[source={}]", hit.metadata.source),
            };
            format!("{}\n{}", tag, hit.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_prompt(question: &str, context: &str) -> Prompt {
    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user: format!(
            "Question: {}\n\nContext:\n{}\n\nWrite a concise answer first. Then list bullet citations.",
            question, context
        ),
    }
}

/// One citation per hit, in ranked order; the snippet is the first
/// `snippet_chars` characters of the chunk.
pub fn citations_from(hits: &[SearchHit], snippet_chars: usize) -> Vec<Citation> {
    hits.iter()
        .map(|hit| Citation {
            source: hit.metadata.source.clone(),
            page: hit.metadata.page,
            snippet: hit.text.chars().take(snippet_chars).collect(),
        })
        .collect()
}

/// Retrieve `k` chunks, ask the model once, and attach citations.
///
/// With `k == 0` the context is empty and the model is still called.
pub async fn compose(
    retriever: &Retriever<'_>,
    model: &dyn LanguageModel,
    question: &str,
    k: usize,
    snippet_chars: usize,
) -> Result<Answer> {
    let hits = retriever.retrieve(question, k).await?;
    let prompt = build_prompt(question, &format_context(&hits));

    tracing::info!(model = model.model_name(), chunks = hits.len(), "generating answer");
    let answer = model.generate(&prompt).await?;

    Ok(Answer {
        answer,
        citations: citations_from(&hits, snippet_chars),
        confidence: None,
    })
}

/// Check a question and resolve `top_k` against `[retrieval]` before any
/// pipeline work.
pub fn validate_question(config: &Config, question: &str, top_k: Option<usize>) -> Result<usize> {
    if question.trim().is_empty() {
        return Err(RagError::validation("question must not be empty"));
    }
    let k = top_k.unwrap_or(config.retrieval.default_top_k);
    if k > config.retrieval.max_top_k {
        return Err(RagError::validation(format!(
            "top_k must be at most {}",
            config.retrieval.max_top_k
        )));
    }
    Ok(k)
}

/// Full read path for one request: open the index, build the configured
/// model, compose the answer.
pub async fn ask(config: &Config, question: &str, top_k: Option<usize>) -> Result<Answer> {
    let k = validate_question(config, question, top_k)?;
    let model = create_language_model(&config.llm)?;
    let index = VectorIndex::from_config(config).await?;

    let result = compose(
        &Retriever::new(&index),
        model.as_ref(),
        question,
        k,
        config.retrieval.snippet_chars,
    )
    .await;
    index.close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;
    use crate::models::ChunkMetadata;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records every prompt and answers with a fixed string.
    struct RecordingModel {
        prompts: Mutex<Vec<Prompt>>,
    }

    impl RecordingModel {
        fn new() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        fn model_name(&self) -> &str {
            "recording"
        }

        async fn generate(&self, prompt: &Prompt) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.clone());
            Ok("stub answer".to_string())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl LanguageModel for FailingModel {
        fn model_name(&self) -> &str {
            "failing"
        }

        async fn generate(&self, _prompt: &Prompt) -> Result<String> {
            Err(RagError::Generation("timed out".to_string()))
        }
    }

    fn hit(source: &str, page: Option<u32>, text: &str) -> SearchHit {
        SearchHit {
            id: "id".to_string(),
            text: text.to_string(),
            metadata: ChunkMetadata::new(source, page),
            score: 0.5,
        }
    }

    async fn index_with(tmp: &TempDir, records: &[(&str, Option<u32>, &str)]) -> VectorIndex {
        let mut config = Config::default();
        config.index.path = tmp.path().join("index.sqlite");
        config.embedding = EmbeddingConfig {
            provider: "hashing".to_string(),
            dims: Some(128),
            ..Default::default()
        };
        let index = VectorIndex::from_config(&config).await.unwrap();
        let texts: Vec<String> = records.iter().map(|r| r.2.to_string()).collect();
        let metas: Vec<ChunkMetadata> = records
            .iter()
            .map(|r| ChunkMetadata::new(r.0, r.1))
            .collect();
        index.add(&texts, &metas).await.unwrap();
        index
    }

    #[test]
    fn test_format_context_tags() {
        let ctx = format_context(&[
            hit("a.pdf", Some(3), "first"),
            hit("https://x.example", None, "second"),
        ]);
        assert_eq!(
            ctx,
            "[source=a.pdf p. 3]\nfirst\n\n[source=https://x.example]\nsecond"
        );
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn test_prompt_wording() {
        let prompt = build_prompt("What is X?", "[source=a.pdf p. 1]\nX is Y.");
        assert!(prompt.system.starts_with("You are a precise research assistant."));
        assert_eq!(
            prompt.user,
            "Question: What is X?\n\nContext:\n[source=a.pdf p. 1]\nX is Y.\n\nWrite a concise answer first. Then list bullet citations."
        );
    }

    #[test]
    fn test_snippet_is_char_prefix() {
        let long = "é".repeat(300);
        let c = citations_from(&[hit("a.pdf", None, &long)], 220);
        assert_eq!(c[0].snippet.chars().count(), 220);
        let short = citations_from(&[hit("a.pdf", None, "short")], 220);
        assert_eq!(short[0].snippet, "short");
    }

    #[tokio::test]
    async fn test_citation_carries_source_and_page() {
        let tmp = TempDir::new().unwrap();
        let index = index_with(
            &tmp,
            &[
                ("a.pdf", Some(3), "The boiling point of water at sea level is 100 degrees Celsius."),
                ("b.pdf", Some(1), "Medieval trade routes crossed the Alps."),
            ],
        )
        .await;
        let model = RecordingModel::new();

        let answer = compose(
            &Retriever::new(&index),
            &model,
            "What is the boiling point of water?",
            1,
            220,
        )
        .await
        .unwrap();

        assert_eq!(answer.answer, "stub answer");
        assert!(answer.confidence.is_none());
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].source, "a.pdf");
        assert_eq!(answer.citations[0].page, Some(3));

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].user.contains("[source=a.pdf p. 3]"));
    }

    #[tokio::test]
    async fn test_top_k_zero_still_calls_model() {
        let tmp = TempDir::new().unwrap();
        let index = index_with(&tmp, &[("a.pdf", Some(1), "some text")]).await;
        let model = RecordingModel::new();

        let answer = compose(&Retriever::new(&index), &model, "anything?", 0, 220)
            .await
            .unwrap();

        assert!(answer.citations.is_empty());
        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].user.contains("Context:\n\n\n"));
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let tmp = TempDir::new().unwrap();
        let index = index_with(&tmp, &[("a.pdf", Some(1), "text")]).await;
        let err = compose(&Retriever::new(&index), &FailingModel, "q", 1, 220)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "generation");
    }

    #[test]
    fn test_validate_question() {
        let config = Config::default();
        assert_eq!(validate_question(&config, "q", None).unwrap(), 5);
        assert_eq!(validate_question(&config, "q", Some(0)).unwrap(), 0);
        assert!(matches!(
            validate_question(&config, "   ", None),
            Err(RagError::Validation(_))
        ));
        assert!(validate_question(&config, "q", Some(51)).is_err());
    }
}
