//! Context windows and request budgets

use serde::Serialize;

use crate::config::SplitterConfig;

pub const DEFAULT_CONTEXT_WINDOW: usize = 4096;

/// No request budget goes below this
pub const MIN_BUDGET: usize = 256;

/// Matched longest prefix first, so order does not matter
const CONTEXT_WINDOWS: &[(&str, usize)] = &[
    ("claude", 200_000),
    ("gpt-4o", 128_000),
    ("gpt-4.1", 1_000_000),
    ("gpt-4-turbo", 128_000),
    ("gpt-4-32k", 32_768),
    ("gpt-4", 8_192),
    ("gpt-3.5-turbo", 16_385),
    ("o1", 128_000),
    ("o3", 200_000),
    ("o4-mini", 200_000),
    ("gemini", 1_000_000),
    ("llama3", 8_192),
    ("llama3.1", 128_000),
    ("llama3.2", 128_000),
    ("llama-3.1", 128_000),
    ("codellama", 16_384),
    ("mistral", 32_768),
    ("mixtral", 32_768),
    ("qwen2.5", 32_768),
    ("qwen2.5-coder", 32_768),
    ("deepseek", 64_000),
    ("gemma", 8_192),
    ("phi3", 4_096),
];

/// Context window for `model`
///
/// Provider prefixes such as `openai/` are ignored and matching is case
/// insensitive.
pub fn context_window(model: &str) -> usize {
    let bare = model.rsplit('/').next().unwrap_or(model).to_ascii_lowercase();
    CONTEXT_WINDOWS
        .iter()
        .filter(|(prefix, _)| bare.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, window)| *window)
        .unwrap_or(DEFAULT_CONTEXT_WINDOW)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenBudget {
    pub window: usize,
    /// System prompt, response allowance and overhead
    pub reserved: usize,
    /// Tokens one request's content may use
    pub budget: usize,
}

impl TokenBudget {
    pub fn compute(
        window: usize,
        safety_factor: f64,
        system_tokens: usize,
        response_tokens: usize,
        overhead_tokens: usize,
    ) -> Self {
        let usable = (window as f64 * safety_factor).floor().max(0.0) as usize;
        let reserved = system_tokens + response_tokens + overhead_tokens;
        Self {
            window,
            reserved,
            budget: usable.saturating_sub(reserved).max(MIN_BUDGET),
        }
    }

    /// Budget for `model` under the splitter settings
    pub fn for_model(
        model: &str,
        config: &SplitterConfig,
        system_tokens: usize,
        response_tokens: usize,
    ) -> Self {
        Self::compute(
            context_window(model),
            config.safety_factor,
            system_tokens,
            response_tokens,
            config.overhead_tokens,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_prefix_wins() {
        assert_eq!(context_window("gpt-4"), 8_192);
        assert_eq!(context_window("gpt-4-turbo-preview"), 128_000);
        assert_eq!(context_window("gpt-4o-mini"), 128_000);
        assert_eq!(context_window("llama3.1:8b"), 128_000);
        assert_eq!(context_window("llama3:8b"), 8_192);
        assert_eq!(context_window("openai/GPT-4o"), 128_000);
        assert_eq!(context_window("claude-sonnet-4-20250514"), 200_000);
    }

    #[test]
    fn test_unknown_model_uses_default() {
        assert_eq!(context_window("my-finetune"), DEFAULT_CONTEXT_WINDOW);
    }

    #[test]
    fn test_budget_arithmetic() {
        let budget = TokenBudget::compute(4096, 0.9, 300, 500, 100);
        assert_eq!(budget.reserved, 900);
        assert_eq!(budget.budget, 3686 - 900);
    }

    #[test]
    fn test_budget_floor() {
        let budget = TokenBudget::compute(1000, 0.9, 800, 500, 100);
        assert_eq!(budget.budget, MIN_BUDGET);
    }
}
