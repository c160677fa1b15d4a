use serde::de::DeserializeOwned;

use super::parser::parse_payload;
use super::sanitize::sanitize_llm_output;
use super::types::{GenerationOptions, LlmClient};
use super::GenerationError;
use crate::engine_config::EngineConfig;

/// Outcome of a generator call once retries are spent.
///
/// Call sites match both arms; the failure arm supplies a safe default, so a
/// generator problem never travels further than the stage or chunk task that
/// made the call.
#[derive(Debug)]
pub enum Payload<T> {
    Parsed(T),
    Failure(GenerationError),
}

impl<T> Payload<T> {
    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }
}

/// One prompt bound for the generator.
#[derive(Debug, Clone)]
pub struct GenerationCall {
    /// Short name for logs ("intake", "chunk", ...). Never the prompt itself.
    pub label: &'static str,
    pub prompt: String,
    pub system: &'static str,
    pub options: GenerationOptions,
}

impl GenerationCall {
    pub fn new(label: &'static str, prompt: String, system: &'static str) -> Self {
        Self {
            label,
            prompt,
            system,
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }
}

/// Call the generator and parse a typed JSON payload.
///
/// Makes `1 + max_generator_retries` attempts; transport failures and
/// unparseable output both consume an attempt.
pub fn generate_payload<T: DeserializeOwned>(
    llm: &dyn LlmClient,
    config: &EngineConfig,
    call: &GenerationCall,
) -> Payload<T> {
    generate_payload_or_recover(llm, config, call, |_| None)
}

/// Like [`generate_payload`], but when every attempt fails to parse, `recover`
/// gets one chance to salvage a payload from the last raw response.
pub fn generate_payload_or_recover<T: DeserializeOwned>(
    llm: &dyn LlmClient,
    config: &EngineConfig,
    call: &GenerationCall,
    recover: impl Fn(&str) -> Option<T>,
) -> Payload<T> {
    let attempts = 1 + config.max_generator_retries;
    let mut last_error: Option<GenerationError> = None;
    let mut last_response = String::new();

    for attempt in 0..attempts {
        let has_next = attempt + 1 < attempts;

        let raw = match llm.generate(&config.model_name, &call.prompt, call.system, &call.options) {
            Ok(raw) => raw,
            Err(e) if e.is_retryable() && has_next => {
                tracing::warn!(
                    call = call.label,
                    attempt = attempt + 1,
                    error = %e,
                    "Generator call failed, retrying"
                );
                last_error = Some(e);
                continue;
            }
            Err(e) => {
                last_error = Some(e);
                break;
            }
        };

        last_response = sanitize_llm_output(&raw);

        match parse_payload::<T>(&last_response) {
            Ok(payload) => {
                tracing::debug!(
                    call = call.label,
                    attempt = attempt + 1,
                    response_len = last_response.len(),
                    "Generator payload parsed"
                );
                return Payload::Parsed(payload);
            }
            Err(e) if e.is_parse_error() && has_next => {
                tracing::warn!(
                    call = call.label,
                    attempt = attempt + 1,
                    error = %e,
                    "Generator response parse failed, retrying"
                );
                last_error = Some(e);
            }
            Err(e) => {
                last_error = Some(e);
                break;
            }
        }
    }

    if !last_response.trim().is_empty() {
        if let Some(payload) = recover(&last_response) {
            tracing::info!(call = call.label, "Recovered payload from unparsed response");
            return Payload::Parsed(payload);
        }
    }

    let error = last_error
        .unwrap_or_else(|| GenerationError::MalformedResponse("All retry attempts exhausted".into()));
    tracing::warn!(call = call.label, error = %error, "Generator call degraded to default");
    Payload::Failure(error)
}
