//! Model-assisted file selection

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::preview::FilePreview;
use super::{Selection, SelectionMethod, SelectionStrategy};
use crate::ai::prompts::{selection_user_prompt, SELECTION_SYSTEM_PROMPT};
use crate::ai::{Message, ModelRequest, RequestQueue};
use crate::config::{AiConfig, SplitterConfig};
use crate::filter::ScoredFile;
use crate::tokens::{TokenBudget, TokenCounter};

/// Selection lists can outgrow a commit-message allowance
const MIN_SELECTION_TOKENS: u32 = 1024;

/// Preview lines per file, tried in order until the prompt fits
const PREVIEW_CAPS: [usize; 5] = [usize::MAX, 20, 10, 5, 0];

pub struct AiSelector {
    queue: Arc<RequestQueue>,
    config: AiConfig,
    counter: Arc<dyn TokenCounter>,
    budget: usize,
}

impl AiSelector {
    /// `budget` bounds the user prompt in tokens
    pub fn new(
        queue: Arc<RequestQueue>,
        config: AiConfig,
        counter: Arc<dyn TokenCounter>,
        budget: usize,
    ) -> Self {
        Self {
            queue,
            config,
            counter,
            budget,
        }
    }

    /// Budget left for the user prompt once the selection system prompt and
    /// answer are reserved
    pub fn budget_for(
        config: &AiConfig,
        splitter: &SplitterConfig,
        counter: &dyn TokenCounter,
    ) -> usize {
        TokenBudget::for_model(
            &config.model,
            splitter,
            counter.count(SELECTION_SYSTEM_PROMPT),
            config.max_tokens.max(MIN_SELECTION_TOKENS) as usize,
        )
        .budget
    }

    /// Largest previews whose prompt stays within the budget
    fn fit_prompt(&self, files: &[ScoredFile], max_files: usize) -> String {
        for cap in PREVIEW_CAPS {
            let previews = render_previews(files.iter(), cap);
            let prompt = selection_user_prompt(&previews, files.len(), max_files);
            if self.counter.count(&prompt) <= self.budget {
                if cap != usize::MAX {
                    debug!(cap, "Shrank selection previews to fit");
                }
                return prompt;
            }
        }

        // Even bare headers overflow; list the best-ranked files that fit
        let mut used = self.counter.count(&selection_user_prompt("", files.len(), max_files));
        let mut entries = Vec::new();
        for file in files {
            let entry = FilePreview::capped(&file.file, 0).render();
            let cost = self.counter.count(&entry) + 1;
            if used + cost > self.budget && !entries.is_empty() {
                break;
            }
            used += cost;
            entries.push(entry);
        }
        debug!(shown = entries.len(), total = files.len(), "Listing top-ranked files only");
        selection_user_prompt(&entries.join("\n\n"), entries.len(), max_files)
    }
}

fn render_previews<'a>(files: impl Iterator<Item = &'a ScoredFile>, cap: usize) -> String {
    files
        .map(|f| FilePreview::capped(&f.file, cap).render())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl SelectionStrategy for AiSelector {
    fn method(&self) -> SelectionMethod {
        SelectionMethod::Ai
    }

    async fn select(&self, files: &[ScoredFile], max_files: usize) -> Result<Selection> {
        let mut request = ModelRequest::from_config(
            &self.config,
            vec![
                Message::system(SELECTION_SYSTEM_PROMPT),
                Message::user(self.fit_prompt(files, max_files)),
            ],
        );
        request.max_tokens = request.max_tokens.max(MIN_SELECTION_TOKENS);

        let response = self
            .queue
            .submit(request)
            .await
            .context("File selection request failed")?;
        let selection = parse_selection(&response.content)?;
        debug!(
            selected = selection.paths.len(),
            confidence = ?selection.confidence,
            "Model selected files"
        );
        Ok(selection)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSelection {
    selected_files: Vec<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Read `{selectedFiles, reasoning, confidence}` out of a model reply
///
/// Tolerates markdown fences and prose around the object.
pub fn parse_selection(text: &str) -> Result<Selection> {
    let body = strip_fences(text);

    let value = serde_json::from_str::<Value>(body)
        .ok()
        .filter(|v| v.get("selectedFiles").is_some())
        .or_else(|| find_selection_object(body))
        .context("No selection object in model response")?;

    let raw: RawSelection =
        serde_json::from_value(value).context("Selection object has the wrong shape")?;

    Ok(Selection {
        paths: raw.selected_files,
        reasoning: raw.reasoning,
        confidence: raw.confidence,
    })
}

fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (`json`) on the opening fence line
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// First balanced `{...}` that parses and carries `selectedFiles`
fn find_selection_object(text: &str) -> Option<Value> {
    text.match_indices('{').find_map(|(start, _)| {
        let end = balanced_end(text, start)?;
        serde_json::from_str::<Value>(&text[start..end])
            .ok()
            .filter(|v| v.get("selectedFiles").is_some())
    })
}

fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{ModelClient, ModelResponse};
    use crate::config::{QueueConfig, SelectionConfig};
    use crate::diff::{Chunk, DiffLine, FileDiff, FileStatus, LineKind};
    use crate::error::RequestError;
    use crate::select::FileSelector;
    use crate::tokens::EstimatingCounter;
    use std::sync::Mutex;

    /// Records every user prompt and answers with a fixed result
    struct StubClient {
        prompts: Mutex<Vec<String>>,
        reply: fn() -> Result<ModelResponse, RequestError>,
    }

    impl StubClient {
        fn new(reply: fn() -> Result<ModelResponse, RequestError>) -> Arc<Self> {
            Arc::new(Self {
                prompts: Mutex::new(Vec::new()),
                reply,
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelClient for StubClient {
        async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, RequestError> {
            let prompt = request.conversation().last().map(|m| m.content.clone());
            self.prompts.lock().unwrap().extend(prompt);
            assert!(request.max_tokens >= MIN_SELECTION_TOKENS);
            (self.reply)()
        }
    }

    fn ranked(count: usize, lines: usize) -> Vec<ScoredFile> {
        (0..count)
            .map(|i| {
                let mut file = FileDiff::new(format!("src/mod_{:02}.rs", i), FileStatus::Modified);
                file.chunks.push(Chunk {
                    header: "@@ -1 +1 @@".into(),
                    old_start: 1,
                    old_lines: 1,
                    new_start: 1,
                    new_lines: lines as u32,
                    context: String::new(),
                    lines: (0..lines)
                        .map(|j| DiffLine::new(LineKind::Added, format!("let v{} = {};", j, j)))
                        .collect(),
                });
                ScoredFile {
                    file,
                    score: 1.0 - i as f64 / 100.0,
                }
            })
            .collect()
    }

    fn ai_selector(client: Arc<StubClient>, budget: usize) -> Arc<AiSelector> {
        let queue_config = QueueConfig {
            base_delay_ms: 1,
            max_delay_ms: 2,
            rate_limit: 0,
            ..QueueConfig::default()
        };
        let queue = Arc::new(RequestQueue::new(client, queue_config));
        Arc::new(AiSelector::new(
            queue,
            AiConfig::default(),
            Arc::new(EstimatingCounter),
            budget,
        ))
    }

    #[tokio::test]
    async fn test_model_selection_through_queue() {
        let client = StubClient::new(|| {
            Ok(ModelResponse::text(concat!(
                "```json\n",
                r#"{"selectedFiles": ["src/mod_07.rs", "src/mod_02.rs", "nope.rs"], "confidence": 0.7}"#,
                "\n```"
            )))
        });
        let selector = FileSelector::new(
            SelectionConfig::default(),
            Some(ai_selector(client.clone(), 100_000)),
        );

        let outcome = selector.select(ranked(25, 3)).await;
        assert_eq!(outcome.method, SelectionMethod::Ai);
        let paths: Vec<&str> = outcome.files.iter().map(|f| f.file.path.as_str()).collect();
        assert_eq!(paths, vec!["src/mod_02.rs", "src/mod_07.rs"]);
        assert_eq!(outcome.confidence, Some(0.7));

        let prompts = client.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("25 files changed"));
        assert!(prompts[0].contains("+let v2 = 2;"));
    }

    #[tokio::test]
    async fn test_rejected_request_falls_back_after_one_call() {
        let client = StubClient::new(|| {
            Err(RequestError::Client {
                status: 400,
                body: "bad request".into(),
            })
        });
        let selector = FileSelector::new(
            SelectionConfig::default(),
            Some(ai_selector(client.clone(), 100_000)),
        );

        let outcome = selector.select(ranked(25, 3)).await;
        assert_eq!(outcome.method, SelectionMethod::Heuristic);
        assert_eq!(outcome.files.len(), SelectionConfig::default().max_files);
        assert_eq!(client.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_previews_shrink_to_budget() {
        let client = StubClient::new(|| {
            Ok(ModelResponse::text(r#"{"selectedFiles": ["src/mod_00.rs"]}"#))
        });
        let budget = 2_000;
        let selector = ai_selector(client.clone(), budget);

        let files = ranked(60, 50);
        let selection = selector.select(&files, 20).await.unwrap();
        assert_eq!(selection.paths, vec!["src/mod_00.rs"]);

        let prompt = &client.prompts()[0];
        assert!(EstimatingCounter.count(prompt) <= budget);
        assert!(prompt.contains("## src/mod_00.rs"));
    }

    #[tokio::test]
    async fn test_headers_only_keep_top_ranked_files() {
        let client = StubClient::new(|| {
            Ok(ModelResponse::text(r#"{"selectedFiles": ["src/mod_00.rs"]}"#))
        });
        let budget = 300;
        let selector = ai_selector(client.clone(), budget);

        let files = ranked(60, 10);
        selector.select(&files, 20).await.unwrap();

        let prompt = &client.prompts()[0];
        assert!(EstimatingCounter.count(prompt) <= budget);
        assert!(prompt.contains("## src/mod_00.rs"));
        assert!(!prompt.contains("## src/mod_59.rs"));
        assert!(!prompt.contains("+let"));
    }

    #[test]
    fn test_plain_json() {
        let selection = parse_selection(concat!(
            r#"{"selectedFiles": ["src/a.rs", "src/b.rs"], "#,
            r#""reasoning": "core change", "confidence": 0.8}"#
        ))
        .unwrap();
        assert_eq!(selection.paths, vec!["src/a.rs", "src/b.rs"]);
        assert_eq!(selection.reasoning.as_deref(), Some("core change"));
        assert_eq!(selection.confidence, Some(0.8));
    }

    #[test]
    fn test_fenced_json() {
        let selection = parse_selection("```json\n{\"selectedFiles\": [\"a.ts\"]}\n```").unwrap();
        assert_eq!(selection.paths, vec!["a.ts"]);
        assert_eq!(selection.confidence, None);
    }

    #[test]
    fn test_object_inside_prose() {
        let text = r#"Sure! Here is my pick {"note": "x"} and then
{"selectedFiles": ["src/{weird}.rs"], "reasoning": "brace \" in string }"} hope it helps"#;
        let selection = parse_selection(text).unwrap();
        assert_eq!(selection.paths, vec!["src/{weird}.rs"]);
    }

    #[test]
    fn test_nested_object_is_found() {
        let text = r#"{"result": {"selectedFiles": ["b.rs"]}}"#;
        assert_eq!(parse_selection(text).unwrap().paths, vec!["b.rs"]);
    }

    #[test]
    fn test_garbage_fails() {
        assert!(parse_selection("I could not decide").is_err());
        assert!(parse_selection(r#"{"selectedFiles": "not a list"}"#).is_err());
    }
}
