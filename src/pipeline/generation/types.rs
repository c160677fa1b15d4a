use serde::{Deserialize, Serialize};

use super::GenerationError;

/// Generation parameters for Ollama `/api/generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Sampling temperature (0.0-1.0). Lower = more deterministic.
    pub temperature: f32,
    /// Top-p (nucleus) sampling threshold.
    pub top_p: f32,
    /// Maximum tokens in the generated response. None = model default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i32>,
}

impl Default for GenerationOptions {
    /// Contract drafting and review want reproducible output.
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.9,
            num_predict: None,
        }
    }
}

impl GenerationOptions {
    pub fn with_token_budget(mut self, num_predict: i32) -> Self {
        self.num_predict = Some(num_predict);
        self
    }
}

/// Text-generation client abstraction (allows mocking).
///
/// Implementations must bound every call in time; the orchestration core
/// never waits on a generator indefinitely.
pub trait LlmClient: Send + Sync {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        system: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError>;

    fn is_model_available(&self, model: &str) -> Result<bool, GenerationError>;

    fn list_models(&self) -> Result<Vec<String>, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trait_is_object_safe() {
        fn _assert_client(_: &dyn LlmClient) {}
    }

    #[test]
    fn token_budget_sets_num_predict() {
        let options = GenerationOptions::default().with_token_budget(700);
        assert_eq!(options.num_predict, Some(700));
    }

    #[test]
    fn unset_budget_is_not_serialized() {
        let json = serde_json::to_value(GenerationOptions::default()).unwrap();
        assert!(json.get("num_predict").is_none());
    }
}
