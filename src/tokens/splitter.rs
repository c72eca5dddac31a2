//! Serialization of ranked files and splitting under a token budget

use std::fmt::Write;
use std::sync::Arc;
use tracing::debug;

use super::counter::TokenCounter;
use crate::config::{LineCapTier, SplitterConfig};
use crate::diff::FileDiff;
use crate::error::PipelineError;

/// Per-file changed-line caps, tightening as the file count grows
#[derive(Debug, Clone, PartialEq)]
pub struct LineCaps {
    tiers: Vec<LineCapTier>,
    fallback: usize,
}

impl LineCaps {
    pub fn new(mut tiers: Vec<LineCapTier>, fallback: usize) -> Self {
        tiers.sort_by_key(|tier| tier.max_files);
        Self { tiers, fallback }
    }

    pub fn from_config(config: &SplitterConfig) -> Self {
        Self::new(config.line_caps.clone(), config.default_max_lines)
    }

    /// Cap for a commit of `file_count` files
    pub fn for_file_count(&self, file_count: usize) -> usize {
        self.tiers
            .iter()
            .find(|tier| file_count <= tier.max_files)
            .map(|tier| tier.max_lines)
            .unwrap_or(self.fallback)
    }
}

/// Writes files as the text blob sent to the model
#[derive(Debug, Clone)]
pub struct ContentSerializer {
    caps: LineCaps,
}

impl ContentSerializer {
    pub fn new(caps: LineCaps) -> Self {
        Self { caps }
    }

    pub fn serialize(&self, files: &[FileDiff]) -> String {
        let cap = self.caps.for_file_count(files.len());
        let mut out = String::new();

        for (i, file) in files.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            write_file(&mut out, file, cap);
        }

        out.truncate(out.trim_end().len());
        out
    }
}

fn write_file(out: &mut String, file: &FileDiff, cap: usize) {
    let _ = writeln!(out, "### {} ({})", file.path, file.status);

    let mut written = 0;
    'chunks: for chunk in &file.chunks {
        if written >= cap {
            break;
        }
        let _ = writeln!(
            out,
            "@@ -{},{} +{},{} @@ {}",
            chunk.old_start, chunk.old_lines, chunk.new_start, chunk.new_lines, chunk.context
        );
        for line in chunk.changes() {
            if written >= cap {
                break 'chunks;
            }
            let _ = writeln!(out, "{}{}", line.marker(), line.content);
            written += 1;
        }
    }

    let total = file.changed_lines();
    if total > written {
        let _ = writeln!(out, "... ({} more changed lines)", total - written);
    }
}

/// Splits text into pieces that each fit the token budget
pub struct TokenBudgetSplitter {
    counter: Arc<dyn TokenCounter>,
    budget: usize,
}

impl TokenBudgetSplitter {
    pub fn new(counter: Arc<dyn TokenCounter>, budget: usize) -> Self {
        Self { counter, budget }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn count(&self, text: &str) -> usize {
        self.counter.count(text)
    }

    /// Non-empty pieces, each at most `budget` tokens, in input order
    pub fn split(&self, text: &str) -> Result<Vec<String>, PipelineError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        if self.count(text) <= self.budget {
            return Ok(vec![text.to_string()]);
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        let mut pending_tokens = 0;

        for line in text.lines() {
            let tokens = self.count(line);
            if tokens > self.budget {
                self.emit(&pending, &mut chunks)?;
                pending.clear();
                pending_tokens = 0;
                chunks.extend(self.split_line(line)?);
                continue;
            }
            if !pending.is_empty() && pending_tokens + tokens > self.budget {
                self.emit(&pending, &mut chunks)?;
                pending.clear();
                pending_tokens = 0;
            }
            pending.push(line);
            pending_tokens += tokens;
        }
        self.emit(&pending, &mut chunks)?;

        debug!(chunks = chunks.len(), budget = self.budget, "Split content");
        Ok(chunks)
    }

    /// Push joined lines after checking the exact count, bisecting when over
    fn emit(&self, lines: &[&str], out: &mut Vec<String>) -> Result<(), PipelineError> {
        if lines.is_empty() {
            return Ok(());
        }
        let text = lines.join("\n");
        if text.trim().is_empty() {
            return Ok(());
        }
        if self.count(&text) <= self.budget {
            out.push(text);
            return Ok(());
        }
        if lines.len() == 1 {
            out.extend(self.split_line(lines[0])?);
            return Ok(());
        }
        let mid = lines.len() / 2;
        self.emit(&lines[..mid], out)?;
        self.emit(&lines[mid..], out)
    }

    fn split_line(&self, line: &str) -> Result<Vec<String>, PipelineError> {
        let sentences = sentences(line);
        if sentences.len() > 1 {
            self.pack(&sentences, &|sentence| self.split_words(sentence))
        } else {
            self.split_words(line)
        }
    }

    fn split_words(&self, text: &str) -> Result<Vec<String>, PipelineError> {
        let words: Vec<&str> = text.split_whitespace().collect();
        self.pack(&words, &|word| {
            Err(PipelineError::Unsplittable {
                tokens: self.count(word),
                budget: self.budget,
            })
        })
    }

    /// Greedily join pieces with spaces; `oversized` handles a piece that alone exceeds the budget
    fn pack(
        &self,
        pieces: &[&str],
        oversized: &dyn Fn(&str) -> Result<Vec<String>, PipelineError>,
    ) -> Result<Vec<String>, PipelineError> {
        let mut out = Vec::new();
        let mut current = String::new();

        for piece in pieces.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
            if self.count(piece) > self.budget {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
                out.extend(oversized(piece)?);
                continue;
            }
            if current.is_empty() {
                current = piece.to_string();
                continue;
            }
            let candidate = format!("{} {}", current, piece);
            if self.count(&candidate) > self.budget {
                out.push(std::mem::replace(&mut current, piece.to_string()));
            } else {
                current = candidate;
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
        Ok(out)
    }
}

/// Cut after `.`, `!` or `?` when followed by whitespace
fn sentences(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some((_, next)) = chars.peek() {
                if next.is_whitespace() {
                    let end = i + c.len_utf8();
                    parts.push(&text[start..end]);
                    start = end;
                }
            }
        }
    }
    if start < text.len() {
        parts.push(&text[start..]);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{Chunk, DiffLine, FileStatus, LineKind};
    use crate::tokens::EstimatingCounter;

    /// One token per character, so joins cost more than their parts
    struct CharCounter;

    impl TokenCounter for CharCounter {
        fn count(&self, text: &str) -> usize {
            text.chars().count()
        }

        fn name(&self) -> &str {
            "chars"
        }
    }

    fn splitter(budget: usize) -> TokenBudgetSplitter {
        TokenBudgetSplitter::new(Arc::new(EstimatingCounter), budget)
    }

    fn assert_within_budget(splitter: &TokenBudgetSplitter, chunks: &[String]) {
        assert!(!chunks.is_empty());
        for chunk in chunks {
            assert!(!chunk.trim().is_empty());
            assert!(
                splitter.count(chunk) <= splitter.budget(),
                "chunk of {} tokens over budget {}",
                splitter.count(chunk),
                splitter.budget()
            );
        }
    }

    fn file(path: &str, status: FileStatus, added: usize) -> FileDiff {
        let mut file = FileDiff::new(path, status);
        file.chunks.push(Chunk {
            header: "@@ -1,2 +1,3 @@".into(),
            old_start: 1,
            old_lines: 2,
            new_start: 1,
            new_lines: 3,
            context: "fn run()".into(),
            lines: std::iter::once(DiffLine::new(LineKind::Context, "fn run()"))
                .chain((0..added).map(|i| DiffLine::new(LineKind::Added, format!("step({});", i))))
                .chain(std::iter::once(DiffLine::new(LineKind::Removed, "old();")))
                .collect(),
        });
        file
    }

    #[test]
    fn test_line_caps_tiers() {
        let caps = LineCaps::from_config(&SplitterConfig::default());
        assert_eq!(caps.for_file_count(1), 200);
        assert_eq!(caps.for_file_count(5), 200);
        assert_eq!(caps.for_file_count(6), 100);
        assert_eq!(caps.for_file_count(50), 50);
        assert_eq!(caps.for_file_count(51), 25);
    }

    #[test]
    fn test_serializer_format() {
        let serializer = ContentSerializer::new(LineCaps::new(vec![], 10));
        let text = serializer.serialize(&[file("src/app.ts", FileStatus::Added, 2)]);
        assert_eq!(
            text,
            "### src/app.ts (added)\n@@ -1,2 +1,3 @@ fn run()\n+step(0);\n+step(1);\n-old();"
        );
    }

    #[test]
    fn test_serializer_caps_lines_per_file() {
        let serializer = ContentSerializer::new(LineCaps::new(vec![], 3));
        let text = serializer.serialize(&[
            file("src/a.rs", FileStatus::Modified, 5),
            file("src/b.rs", FileStatus::Modified, 1),
        ]);
        assert!(text.contains("+step(2);\n... (3 more changed lines)\n\n### src/b.rs (modified)"));
        assert!(!text.contains("step(3)"));
        assert!(text.ends_with("-old();"));
    }

    #[test]
    fn test_small_text_is_one_chunk() {
        let chunks = splitter(100).split("### a.rs (added)\n+x").unwrap();
        assert_eq!(chunks, vec!["### a.rs (added)\n+x".to_string()]);
    }

    #[test]
    fn test_blank_text_yields_nothing() {
        assert!(splitter(10).split("  \n\n ").unwrap().is_empty());
    }

    #[test]
    fn test_lines_are_packed_in_order() {
        let lines: Vec<String> = (0..40)
            .map(|i| format!("+let value_{:02} = compute();", i))
            .collect();
        let text = lines.join("\n");
        let splitter = splitter(30);

        let chunks = splitter.split(&text).unwrap();
        assert!(chunks.len() > 1);
        assert_within_budget(&splitter, &chunks);

        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| c.lines()).collect();
        assert_eq!(rejoined, lines.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn test_long_line_splits_on_sentences() {
        let line =
            "The parser now keeps renames. Binary files are skipped! Does it handle copies? Yes it does.";
        let splitter = splitter(8);
        let chunks = splitter.split(line).unwrap();
        assert_within_budget(&splitter, &chunks);
        assert_eq!(chunks[0], "The parser now keeps renames.");
    }

    #[test]
    fn test_long_line_splits_on_words() {
        let line = vec!["token"; 60].join(" ");
        let splitter = splitter(10);
        let chunks = splitter.split(&line).unwrap();
        assert!(chunks.len() > 1);
        assert_within_budget(&splitter, &chunks);
        let words: usize = chunks.iter().map(|c| c.split_whitespace().count()).sum();
        assert_eq!(words, 60);
    }

    #[test]
    fn test_giant_word_is_unsplittable() {
        let text = format!("short line\n{}", "x".repeat(100));
        let err = splitter(10).split(&text).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Unsplittable {
                tokens: 25,
                budget: 10
            }
        ));
    }

    #[test]
    fn test_over_budget_accumulation_is_bisected() {
        // Each line is 5 tokens, but two joined are 11
        let splitter = TokenBudgetSplitter::new(Arc::new(CharCounter), 10);
        let chunks = splitter.split("aaaaa\nbbbbb\nccccc").unwrap();
        assert_eq!(chunks, vec!["aaaaa", "bbbbb", "ccccc"]);
    }

    #[test]
    fn test_sentences() {
        assert_eq!(sentences("One. Two! Three"), vec!["One.", " Two!", " Three"]);
        assert_eq!(sentences("v1.2.3 release"), vec!["v1.2.3 release"]);
    }
}
