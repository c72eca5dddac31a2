//! Relevancy scoring for filtered files

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::patterns::{categorize, FileCategory};
use crate::diff::{Chunk, FileDiff};

const BASE_SCORE: f64 = 0.1;
const LARGE_FILE_LINES: usize = 500;
const LARGE_FILE_PENALTY: f64 = 0.7;

/// A file that survived filtering, with its relevancy in `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredFile {
    pub file: FileDiff,
    pub score: f64,
}

struct Signal {
    pattern: Regex,
    bonus: f64,
}

static CHUNK_SIGNALS: Lazy<Vec<Signal>> = Lazy::new(|| {
    [
        // Structural keywords
        (
            r"\b(fn|function|func|def|class|struct|enum|interface|trait|impl|type|module|namespace|export|import|package|public|private|protected|static|const)\b",
            0.1,
        ),
        // Error handling
        (
            r"\b(throw|throws|catch|try|except|raise|rescue|panic|unwrap|expect|Err|Error|Exception|reject|finally)\b",
            0.1,
        ),
        // Security
        (
            r"(?i)\b(auth\w*|token|password|passwd|secret|credentials?|encrypt\w*|decrypt\w*|crypto\w*|salt|sanitiz\w*|permissions?|csrf|xss|jwt|oauth|cors|tls|ssl)\b",
            0.15,
        ),
        // Performance
        (
            r"(?i)\b(cache[sd]?|caching|perf\w*|optimi[sz]\w*|async|await|parallel\w*|concurren\w*|memoiz\w*|lazy|batch\w*|pool|throttl\w*|debounc\w*)\b",
            0.05,
        ),
        // Bug fixes
        (
            r"(?i)\b(fix(es|ed)?|bug|issue|patch|workaround|hotfix|regression|broken|crash\w*)\b",
            0.1,
        ),
    ]
    .into_iter()
    .map(|(pattern, bonus)| Signal {
        pattern: Regex::new(pattern).expect("valid signal pattern"),
        bonus,
    })
    .collect()
});

/// Heuristic relevancy scorer and threshold selection
#[derive(Debug, Clone)]
pub struct RelevancyScorer {
    threshold: f64,
}

impl RelevancyScorer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score one file
    pub fn score(&self, file: &FileDiff) -> f64 {
        let mut score = BASE_SCORE + type_weight(categorize(&file.path));
        score += file.chunks.iter().map(chunk_bonus).sum::<f64>();

        if file.changed_lines() > LARGE_FILE_LINES {
            score *= LARGE_FILE_PENALTY;
        }

        round(score.clamp(0.0, 1.0))
    }

    /// Keep files scoring at or above the threshold, best first
    ///
    /// The sort is stable, so equal scores keep their diff order.
    pub fn rank(&self, files: Vec<FileDiff>) -> Vec<ScoredFile> {
        let mut scored: Vec<ScoredFile> = files
            .into_iter()
            .map(|file| {
                let score = self.score(&file);
                ScoredFile { file, score }
            })
            .filter(|s| s.score >= self.threshold)
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored
    }
}

fn type_weight(category: FileCategory) -> f64 {
    match category {
        FileCategory::Source => 0.4,
        FileCategory::Config => 0.25,
        FileCategory::Docs | FileCategory::Markup => 0.1,
        FileCategory::Other => 0.05,
    }
}

/// Each signal counts at most once per chunk
fn chunk_bonus(chunk: &Chunk) -> f64 {
    let changed: Vec<&str> = chunk.changes().map(|l| l.content.as_str()).collect();
    let text = changed.join("\n");
    CHUNK_SIGNALS
        .iter()
        .filter(|signal| signal.pattern.is_match(&text))
        .map(|signal| signal.bonus)
        .sum()
}

fn round(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}
