//! Text-generation collaborator: client trait, Ollama backend, output
//! sanitizing, JSON payload extraction, and the retrying call helper that
//! every stage and chunk task goes through.

pub mod types;
pub mod ollama;
pub mod sanitize;
pub mod parser;
pub mod call;

pub use types::*;
pub use ollama::*;
pub use sanitize::*;
pub use parser::*;
pub use call::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Ollama is not running at {0}")]
    OllamaConnection(String),

    #[error("Ollama returned error (status {status}): {body}")]
    OllamaError { status: u16, body: String },

    #[error("Model '{0}' is not available")]
    NoModelAvailable(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed generator response: {0}")]
    MalformedResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Generator returned an empty response")]
    EmptyResponse,
}

impl GenerationError {
    /// Transport-level failure worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::OllamaConnection(_)
                | Self::HttpClient(_)
                | Self::Timeout(_)
                | Self::OllamaError { .. }
        )
    }

    /// The generator answered but the output did not fit the expected shape.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedResponse(_)
                | Self::JsonParsing(_)
                | Self::ResponseParsing(_)
                | Self::EmptyResponse
        )
    }
}
