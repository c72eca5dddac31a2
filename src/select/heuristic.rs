//! Rule-based file selection

use anyhow::Result;
use async_trait::async_trait;

use super::{Selection, SelectionMethod, SelectionStrategy};
use crate::diff::{FileDiff, FileStatus};
use crate::filter::patterns::{self, categorize, FileCategory};
use crate::filter::ScoredFile;

const SOURCE_ROOTS: &[(&str, i64)] = &[
    ("src/", 40),
    ("lib/", 30),
    ("app/", 30),
    ("pkg/", 25),
    ("cmd/", 25),
    ("internal/", 20),
    ("core/", 20),
];

const MANIFEST_BONUS: i64 = 40;
const TEST_PENALTY: i64 = -30;
const DEPTH_FREE_LEVELS: usize = 5;
const DEPTH_PENALTY: i64 = -5;
const MAX_CHANGE_BONUS: i64 = 25;

/// Ranks files by category, status, location and size of change
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicSelector;

impl HeuristicSelector {
    pub fn score(file: &FileDiff) -> i64 {
        let path = file.path.as_str();

        let mut score = match categorize(path) {
            FileCategory::Source => 100,
            FileCategory::Config => 50,
            FileCategory::Markup => 30,
            FileCategory::Docs => 20,
            FileCategory::Other => 0,
        };

        score += match file.status {
            FileStatus::Added => 30,
            FileStatus::Deleted => 20,
            FileStatus::Modified | FileStatus::Renamed | FileStatus::Copied => 10,
        };

        score += SOURCE_ROOTS
            .iter()
            .find(|(prefix, _)| path.starts_with(prefix))
            .map(|(_, bonus)| *bonus)
            .unwrap_or(0);

        if patterns::is_manifest(path) {
            score += MANIFEST_BONUS;
        }
        if patterns::is_test_path(path) {
            score += TEST_PENALTY;
        }

        let depth = path.matches('/').count();
        if depth > DEPTH_FREE_LEVELS {
            score += DEPTH_PENALTY * (depth - DEPTH_FREE_LEVELS) as i64;
        }

        score + ((file.changed_lines() / 10) as i64).min(MAX_CHANGE_BONUS)
    }

    /// Top `max_files` paths, returned in their incoming order
    pub fn pick(files: &[ScoredFile], max_files: usize) -> Vec<String> {
        let mut ranked: Vec<(usize, i64)> = files
            .iter()
            .enumerate()
            .map(|(i, f)| (i, Self::score(&f.file)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let mut picked: Vec<usize> = ranked.into_iter().take(max_files).map(|(i, _)| i).collect();
        picked.sort_unstable();
        picked.into_iter().map(|i| files[i].file.path.clone()).collect()
    }
}

#[async_trait]
impl SelectionStrategy for HeuristicSelector {
    fn method(&self) -> SelectionMethod {
        SelectionMethod::Heuristic
    }

    async fn select(&self, files: &[ScoredFile], max_files: usize) -> Result<Selection> {
        Ok(Selection {
            paths: Self::pick(files, max_files),
            reasoning: None,
            confidence: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{Chunk, DiffLine, LineKind};

    fn file(path: &str, status: FileStatus, changed: usize) -> FileDiff {
        let mut file = FileDiff::new(path, status);
        file.chunks.push(Chunk {
            header: "@@ -1 +1 @@".into(),
            old_start: 1,
            old_lines: 1,
            new_start: 1,
            new_lines: 1,
            context: String::new(),
            lines: (0..changed)
                .map(|i| DiffLine::new(LineKind::Added, format!("x{}", i)))
                .collect(),
        });
        file
    }

    fn scored(path: &str) -> ScoredFile {
        ScoredFile {
            file: file(path, FileStatus::Modified, 1),
            score: 0.5,
        }
    }

    #[test]
    fn test_score_components() {
        // source 100 + modified 10 + src/ 40 + 12 changed lines
        assert_eq!(HeuristicSelector::score(&file("src/app.rs", FileStatus::Modified, 120)), 162);
        // config 50 + added 30 + manifest 40
        assert_eq!(HeuristicSelector::score(&file("Cargo.toml", FileStatus::Added, 3)), 120);
        // source 100 + deleted 20 + test penalty
        assert_eq!(HeuristicSelector::score(&file("tests/cli.rs", FileStatus::Deleted, 1)), 90);
        // docs 20 + modified 10
        assert_eq!(HeuristicSelector::score(&file("README.md", FileStatus::Modified, 1)), 30);
    }

    #[test]
    fn test_change_bonus_is_capped() {
        let big = HeuristicSelector::score(&file("notes.xyz", FileStatus::Modified, 5000));
        assert_eq!(big, 10 + MAX_CHANGE_BONUS);
    }

    #[test]
    fn test_deep_paths_are_penalized() {
        let shallow = HeuristicSelector::score(&file("a/b/c/d/e/f.xyz", FileStatus::Modified, 1));
        let deep = HeuristicSelector::score(&file("a/b/c/d/e/f/g/h.xyz", FileStatus::Modified, 1));
        assert_eq!(shallow, 10);
        assert_eq!(deep, 0);
    }

    #[test]
    fn test_pick_keeps_incoming_order() {
        let files = vec![
            scored("README.md"),
            scored("notes.xyz"),
            scored("src/main.rs"),
            scored("Cargo.toml"),
        ];
        let picked = HeuristicSelector::pick(&files, 2);
        assert_eq!(picked, vec!["src/main.rs".to_string(), "Cargo.toml".to_string()]);
    }
}
