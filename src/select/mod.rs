//! File-count bounding for large commits
//!
//! Small commits pass through untouched. Mid-sized commits ask the model
//! which files matter, and fall back to the heuristic ranking on any failure.
//! Huge commits only ever use the heuristic.

mod ai;
mod heuristic;
mod preview;

pub use ai::AiSelector;
pub use heuristic::HeuristicSelector;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::config::SelectionConfig;
use crate::filter::ScoredFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionMethod {
    PassThrough,
    Ai,
    Heuristic,
}

impl SelectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMethod::PassThrough => "pass-through",
            SelectionMethod::Ai => "ai",
            SelectionMethod::Heuristic => "heuristic",
        }
    }
}

/// Paths a strategy picked, with the model's own notes when it gave any
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub paths: Vec<String>,
    pub reasoning: Option<String>,
    pub confidence: Option<f64>,
}

#[async_trait]
pub trait SelectionStrategy: Send + Sync {
    fn method(&self) -> SelectionMethod;

    async fn select(&self, files: &[ScoredFile], max_files: usize) -> Result<Selection>;
}

/// Files kept by the selector, still in relevancy order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionOutcome {
    pub files: Vec<ScoredFile>,
    pub method: SelectionMethod,
    pub reasoning: Option<String>,
    pub confidence: Option<f64>,
}

impl SelectionOutcome {
    fn pass_through(files: Vec<ScoredFile>) -> Self {
        Self {
            files,
            method: SelectionMethod::PassThrough,
            reasoning: None,
            confidence: None,
        }
    }
}

pub struct FileSelector {
    config: SelectionConfig,
    ai: Option<Arc<dyn SelectionStrategy>>,
    heuristic: Arc<dyn SelectionStrategy>,
}

impl FileSelector {
    pub fn new(config: SelectionConfig, ai: Option<Arc<dyn SelectionStrategy>>) -> Self {
        Self {
            config,
            ai,
            heuristic: Arc::new(HeuristicSelector),
        }
    }

    #[cfg(test)]
    fn with_heuristic(mut self, heuristic: Arc<dyn SelectionStrategy>) -> Self {
        self.heuristic = heuristic;
        self
    }

    /// Apply the band policy to ranked files
    pub async fn select(&self, files: Vec<ScoredFile>) -> SelectionOutcome {
        let count = files.len();
        let max_files = self.config.max_files;

        if count <= self.config.ai_min_files {
            debug!(count, "Selection skipped");
            return SelectionOutcome::pass_through(files);
        }

        if count <= self.config.ai_max_files && self.config.ai_selection {
            if let Some(ai) = &self.ai {
                match ai.select(&files, max_files).await {
                    Ok(selection) => {
                        let picked = keep_selected(&files, &selection.paths, max_files);
                        if !picked.is_empty() {
                            debug!(count, kept = picked.len(), "Model-assisted selection");
                            return SelectionOutcome {
                                files: picked,
                                method: ai.method(),
                                reasoning: selection.reasoning,
                                confidence: selection.confidence,
                            };
                        }
                        debug!("Model selected no known files, using heuristic");
                    }
                    Err(err) => {
                        debug!(error = %err, "Model-assisted selection failed, using heuristic")
                    }
                }
            }
        }

        let (paths, reasoning) = match self.heuristic.select(&files, max_files).await {
            Ok(selection) => (selection.paths, selection.reasoning),
            Err(err) => {
                debug!(error = %err, "Heuristic selection failed, keeping top-ranked files");
                let top = files.iter().take(max_files).map(|f| f.file.path.clone()).collect();
                (top, None)
            }
        };
        let picked = keep_selected(&files, &paths, max_files);
        debug!(count, kept = picked.len(), "Heuristic selection");

        SelectionOutcome {
            files: picked,
            method: SelectionMethod::Heuristic,
            reasoning,
            confidence: None,
        }
    }
}

/// Known paths only, in relevancy order, at most `max_files`
fn keep_selected(files: &[ScoredFile], paths: &[String], max_files: usize) -> Vec<ScoredFile> {
    let wanted: HashSet<&str> = paths.iter().map(String::as_str).collect();
    files
        .iter()
        .filter(|f| wanted.contains(f.file.path.as_str()))
        .take(max_files)
        .cloned()
        .collect()
}
