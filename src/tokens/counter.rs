//! Token counting

use std::sync::Arc;
use tiktoken_rs::CoreBPE;
use tracing::debug;

pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;

    /// Short label for logs and `analyze` output
    fn name(&self) -> &str;
}

/// BPE counts for models tiktoken knows
pub struct TiktokenCounter {
    bpe: CoreBPE,
    model: String,
}

impl TiktokenCounter {
    pub fn for_model(model: &str) -> Option<Self> {
        let bpe = tiktoken_rs::get_bpe_from_model(model).ok()?;
        Some(Self {
            bpe,
            model: model.to_string(),
        })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// One token per four characters, rounded up
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatingCounter;

impl TokenCounter for EstimatingCounter {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }

    fn name(&self) -> &str {
        "estimate"
    }
}

/// Exact counter when one exists for `model`, estimator otherwise
pub fn counter_for_model(model: &str) -> Arc<dyn TokenCounter> {
    let bare = model.rsplit('/').next().unwrap_or(model);
    match TiktokenCounter::for_model(bare) {
        Some(counter) => Arc::new(counter),
        None => {
            debug!(model, "No tokenizer for model, estimating token counts");
            Arc::new(EstimatingCounter)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_rounds_up() {
        let counter = EstimatingCounter;
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.count("abc"), 1);
        assert_eq!(counter.count("abcd"), 1);
        assert_eq!(counter.count("abcde"), 2);
        // Characters, not bytes
        assert_eq!(counter.count("ééééé"), 2);
    }

    #[test]
    fn test_unknown_model_falls_back_to_estimate() {
        let counter = counter_for_model("some-local-model");
        assert_eq!(counter.name(), "estimate");
        assert_eq!(counter.count("12345678"), 2);
    }

    #[test]
    fn test_known_model_uses_bpe() {
        let counter = counter_for_model("openai/gpt-4o");
        assert_ne!(counter.name(), "estimate");
        assert_eq!(counter.name(), "gpt-4o");

        let text = "hello world";
        assert_eq!(counter.count(text), 2);
        assert_ne!(counter.count(text), EstimatingCounter.count(text));
    }
}
