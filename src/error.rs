//! Error type shared by the ingestion and question-answering pipeline.
//!
//! Every failure falls into one of four kinds that the HTTP layer maps onto
//! status codes:
//!
//! | Kind | Variant | HTTP |
//! |------|---------|------|
//! | configuration / load | [`RagError::Config`], [`RagError::Index`], [`RagError::Embedding`] | 500 |
//! | source fetch | [`RagError::SourceFetch`] | 502 |
//! | generation | [`RagError::Generation`] | 502 |
//! | validation | [`RagError::Validation`] | 400 |

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// Bad or inconsistent configuration (unknown provider, missing API key,
    /// collection created with another embedding model, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// A PDF or URL could not be loaded. Aborts ingestion of that source only.
    #[error("failed to load {origin}: {message}")]
    SourceFetch { origin: String, message: String },

    /// The embedding backend failed or returned malformed vectors.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The language model call failed or timed out.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Malformed request input, rejected before any pipeline work.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("vector index error: {0}")]
    Index(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn source_fetch(origin: impl Into<String>, message: impl ToString) -> Self {
        Self::SourceFetch {
            origin: origin.into(),
            message: message.to_string(),
        }
    }

    /// Machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "bad_request",
            Self::SourceFetch { .. } => "source_fetch",
            Self::Generation(_) => "generation",
            Self::Config(_) => "config",
            Self::Embedding(_) | Self::Index(_) | Self::Io(_) => "internal",
        }
    }
}
