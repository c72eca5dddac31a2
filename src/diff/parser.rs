//! Unified diff parser
//!
//! Turns `git diff` output into [`Diff`] values. Sections or hunk headers
//! that cannot be understood are skipped; parsing never fails as a whole.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

use super::types::{
    summarize_context, Chunk, Diff, DiffLine, FileDiff, FileStatus, LineKind, StatusEntry,
};

/// Default byte ceiling for a single hunk before it is split
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 8000;

const SECTION_MARKER: &str = "diff --git ";
const DEV_NULL: &str = "/dev/null";

static HUNK_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@(.*)$")
        .expect("valid hunk header regex")
});

/// Parser for unified diff text
#[derive(Debug, Clone)]
pub struct DiffParser {
    max_chunk_size: usize,
}

impl Default for DiffParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_SIZE)
    }
}

impl DiffParser {
    /// `max_chunk_size` of zero disables hunk splitting
    pub fn new(max_chunk_size: usize) -> Self {
        Self { max_chunk_size }
    }

    pub fn parse(&self, diff_text: &str) -> Diff {
        self.parse_with_statuses(diff_text, &[])
    }

    /// Parse, letting `statuses` override the status read from each section
    pub fn parse_with_statuses(&self, diff_text: &str, statuses: &[StatusEntry]) -> Diff {
        let lines: Vec<&str> = diff_text.lines().collect();
        let overrides: HashMap<&str, FileStatus> = statuses
            .iter()
            .filter_map(|entry| entry.status().map(|s| (entry.path.as_str(), s)))
            .collect();

        let mut files = Vec::new();
        for section in split_sections(&lines) {
            match self.parse_section(section) {
                Some(mut file) => {
                    if let Some(status) = overrides.get(file.path.as_str()) {
                        file.status = *status;
                    }
                    files.push(file);
                }
                None => debug!(header = section[0], "Skipping malformed diff section"),
            }
        }

        let diff = Diff::new(files);
        debug!(
            files = diff.files.len(),
            lines = diff.total_lines,
            bytes = diff.total_size,
            "Parsed diff"
        );
        diff
    }

    fn parse_section(&self, section: &[&str]) -> Option<FileDiff> {
        let header = section.first()?.strip_prefix(SECTION_MARKER)?;
        let prefixed = is_prefixed_header(header);

        let mut marker_status: Option<FileStatus> = None;
        let mut is_binary = false;
        let mut minus_path: Option<&str> = None;
        let mut plus_path: Option<&str> = None;
        let mut moved_from: Option<&str> = None;
        let mut moved_to: Option<&str> = None;

        let mut chunks: Vec<Chunk> = Vec::new();
        let mut current: Option<Chunk> = None;
        let mut in_hunks = false;

        for line in &section[1..] {
            if line.starts_with("@@") {
                if let Some(chunk) = current.take() {
                    chunks.push(chunk);
                }
                current = parse_hunk_header(line);
                if current.is_none() {
                    debug!(line = *line, "Skipping malformed hunk header");
                }
                in_hunks = true;
                continue;
            }

            if !in_hunks {
                if line.starts_with("new file mode") {
                    marker_status = Some(FileStatus::Added);
                } else if line.starts_with("deleted file mode") {
                    marker_status = Some(FileStatus::Deleted);
                } else if let Some(p) = line.strip_prefix("rename from ") {
                    marker_status = Some(FileStatus::Renamed);
                    moved_from = Some(p);
                } else if let Some(p) = line.strip_prefix("rename to ") {
                    marker_status = Some(FileStatus::Renamed);
                    moved_to = Some(p);
                } else if let Some(p) = line.strip_prefix("copy from ") {
                    marker_status = Some(FileStatus::Copied);
                    moved_from = Some(p);
                } else if let Some(p) = line.strip_prefix("copy to ") {
                    marker_status = Some(FileStatus::Copied);
                    moved_to = Some(p);
                } else if let Some(p) = line.strip_prefix("--- ") {
                    minus_path = Some(p);
                } else if let Some(p) = line.strip_prefix("+++ ") {
                    plus_path = Some(p);
                } else if is_binary_marker(line) {
                    is_binary = true;
                }
                continue;
            }

            // Lines after a rejected header have no hunk to belong to
            let Some(chunk) = current.as_mut() else {
                continue;
            };
            let parsed = match line.chars().next() {
                None => Some(DiffLine::new(LineKind::Context, "")),
                Some(' ') => Some(DiffLine::new(LineKind::Context, &line[1..])),
                Some('+') => Some(DiffLine::new(LineKind::Added, &line[1..])),
                Some('-') => Some(DiffLine::new(LineKind::Removed, &line[1..])),
                _ => None,
            };
            if let Some(diff_line) = parsed {
                chunk.lines.push(diff_line);
            }
        }
        if let Some(chunk) = current.take() {
            chunks.push(chunk);
        }

        let (header_old, header_new) = header_paths(header, prefixed);
        let minus = minus_path
            .filter(|p| clean_path(p, false) != DEV_NULL)
            .map(|p| clean_path(p, prefixed));
        let plus = plus_path
            .filter(|p| clean_path(p, false) != DEV_NULL)
            .map(|p| clean_path(p, prefixed));

        let path = plus
            .clone()
            .or_else(|| moved_to.map(|p| clean_path(p, false)))
            .or(header_new)
            .or_else(|| minus.clone())?;
        if path.is_empty() {
            return None;
        }

        let status = marker_status.unwrap_or_else(|| {
            if plus_path.is_some_and(|p| clean_path(p, false) == DEV_NULL) {
                FileStatus::Deleted
            } else if minus_path.is_some_and(|p| clean_path(p, false) == DEV_NULL) {
                FileStatus::Added
            } else {
                FileStatus::Modified
            }
        });

        let old_path = moved_from
            .map(|p| clean_path(p, false))
            .or(minus)
            .or(header_old)
            .filter(|old| *old != path);

        let chunks = if is_binary {
            Vec::new()
        } else {
            chunks
                .into_iter()
                .flat_map(|chunk| self.split_oversized(chunk))
                .collect()
        };

        Some(FileDiff {
            path,
            old_path,
            status,
            is_binary,
            chunks,
        })
    }

    /// Split a hunk whose content exceeds `max_chunk_size` at line boundaries
    fn split_oversized(&self, mut chunk: Chunk) -> Vec<Chunk> {
        if self.max_chunk_size == 0 || chunk.content_size() <= self.max_chunk_size {
            chunk.refresh_context();
            return vec![chunk];
        }

        let Chunk {
            header,
            old_start,
            old_lines,
            new_start,
            new_lines,
            lines,
            ..
        } = chunk;
        let make = |lines: Vec<DiffLine>| Chunk {
            header: header.clone(),
            old_start,
            old_lines,
            new_start,
            new_lines,
            context: summarize_context(&lines),
            lines,
        };

        let mut parts = Vec::new();
        let mut current: Vec<DiffLine> = Vec::new();
        let mut size = 0;
        for line in lines {
            if !current.is_empty() && size + line.content.len() > self.max_chunk_size {
                parts.push(make(std::mem::take(&mut current)));
                size = 0;
            }
            size += line.content.len();
            current.push(line);
        }
        if !current.is_empty() {
            parts.push(make(current));
        }

        debug!(header = %header, parts = parts.len(), "Split oversized hunk");
        parts
    }
}

/// Parse `git diff --name-status` output
pub fn parse_name_status(text: &str) -> Vec<StatusEntry> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let code = parts.next()?.trim().chars().next()?;
            let first = parts.next()?;
            // Renames and copies list the source first, the canonical path second
            let path = parts.next().unwrap_or(first);
            Some(StatusEntry {
                path: path.to_string(),
                code,
            })
        })
        .collect()
}

fn split_sections<'a, 'b>(lines: &'b [&'a str]) -> Vec<&'b [&'a str]> {
    let starts: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.starts_with(SECTION_MARKER))
        .map(|(i, _)| i)
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(n, &start)| {
            let end = starts.get(n + 1).copied().unwrap_or(lines.len());
            &lines[start..end]
        })
        .collect()
}

fn parse_hunk_header(line: &str) -> Option<Chunk> {
    let caps = HUNK_HEADER_RE.captures(line)?;
    let number = |i: usize, default: u32| -> Option<u32> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(default),
        }
    };

    Some(Chunk {
        header: line.trim_end().to_string(),
        old_start: number(1, 0)?,
        old_lines: number(2, 1)?,
        new_start: number(3, 0)?,
        new_lines: number(4, 1)?,
        lines: Vec::new(),
        context: String::new(),
    })
}

fn is_binary_marker(line: &str) -> bool {
    (line.starts_with("Binary files ") && line.trim_end().ends_with(" differ"))
        || line.starts_with("GIT binary patch")
}

fn is_prefixed_header(header: &str) -> bool {
    let header = header.trim_start_matches('"');
    header.starts_with("a/") && (header.contains(" b/") || header.contains(" \"b/"))
}

/// Old and new paths from the `diff --git` line
fn header_paths(header: &str, prefixed: bool) -> (Option<String>, Option<String>) {
    let header = header.trim();

    // `X X` for an unchanged path, the only unambiguous no-prefix form
    if header.len() % 2 == 1 {
        let mid = header.len() / 2;
        if header.is_char_boundary(mid)
            && header.as_bytes()[mid] == b' '
            && header[..mid] == header[mid + 1..]
        {
            let path = clean_path(&header[..mid], false);
            return (Some(path.clone()), Some(path));
        }
    }

    if prefixed {
        if let Some(idx) = header.find(" b/").or_else(|| header.find(" \"b/")) {
            let old = clean_path(&header[..idx], true);
            let new = clean_path(&header[idx + 1..], true);
            return (Some(old), Some(new));
        }
    }

    match header.rsplit_once(' ') {
        Some((old, new)) => (Some(clean_path(old, false)), Some(clean_path(new, false))),
        None => (None, Some(clean_path(header, false))),
    }
}

/// Strip quoting, trailing timestamps and, for prefixed output, `a/` or `b/`
fn clean_path(raw: &str, strip_prefix: bool) -> String {
    let raw = raw.split('\t').next().unwrap_or(raw).trim();
    let raw = raw.trim_matches('"');
    let raw = if strip_prefix {
        raw.strip_prefix("a/")
            .or_else(|| raw.strip_prefix("b/"))
            .unwrap_or(raw)
    } else {
        raw
    };
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FILES: &str = "diff --git a/src/lib.rs b/src/lib.rs
index 1234567..89abcde 100644
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,3 +1,4 @@ mod config;
 use std::fmt;
-fn old() {}
+fn new() {}
+fn extra() {}
 fn tail() {}
@@ -10 +11,2 @@
-let a = 1;
+let a = 2;
+let b = 3;
diff --git a/docs/guide.md b/docs/guide.md
new file mode 100644
index 0000000..abcdefg
--- /dev/null
+++ b/docs/guide.md
@@ -0,0 +1,2 @@
+# Guide
+Read me.
";

    fn kinds(chunk: &Chunk) -> Vec<(LineKind, &str)> {
        chunk
            .lines
            .iter()
            .map(|l| (l.kind, l.content.as_str()))
            .collect()
    }

    #[test]
    fn test_lossless_parse() {
        let diff = DiffParser::default().parse(TWO_FILES);

        assert_eq!(diff.files.len(), 2);
        let lib = &diff.files[0];
        assert_eq!(lib.path, "src/lib.rs");
        assert_eq!(lib.status, FileStatus::Modified);
        assert_eq!(lib.chunks.len(), 2);

        let first = &lib.chunks[0];
        assert_eq!(
            (first.old_start, first.old_lines, first.new_start, first.new_lines),
            (1, 3, 1, 4)
        );
        assert_eq!(
            kinds(first),
            vec![
                (LineKind::Context, "use std::fmt;"),
                (LineKind::Removed, "fn old() {}"),
                (LineKind::Added, "fn new() {}"),
                (LineKind::Added, "fn extra() {}"),
                (LineKind::Context, "fn tail() {}"),
            ]
        );
        assert_eq!(first.context, "use std::fmt; | fn new() {} | fn extra() {}");

        let second = &lib.chunks[1];
        assert_eq!((second.old_start, second.old_lines), (10, 1));
        assert_eq!(second.lines.len(), 3);
        assert_eq!(second.context, "let a = 2; | let b = 3;");

        let guide = &diff.files[1];
        assert_eq!(guide.path, "docs/guide.md");
        assert_eq!(guide.status, FileStatus::Added);
        assert_eq!(guide.old_path, None);
        assert_eq!(
            kinds(&guide.chunks[0]),
            vec![(LineKind::Added, "# Guide"), (LineKind::Added, "Read me.")]
        );

        assert_eq!(diff.total_lines, 10);
    }

    #[test]
    fn test_no_prefix_rename_uses_new_path() {
        let text = "diff --git lib/old_name.rs lib/new_name.rs
similarity index 90%
rename from lib/old_name.rs
rename to lib/new_name.rs
--- lib/old_name.rs
+++ lib/new_name.rs
@@ -1 +1 @@
-pub fn a() {}
+pub fn b() {}
";
        let diff = DiffParser::default().parse(text);
        let file = &diff.files[0];
        assert_eq!(file.path, "lib/new_name.rs");
        assert_eq!(file.old_path.as_deref(), Some("lib/old_name.rs"));
        assert_eq!(file.status, FileStatus::Renamed);
    }

    #[test]
    fn test_pure_rename_without_hunks() {
        let text = "diff --git a/old.txt b/new.txt
similarity index 100%
rename from old.txt
rename to new.txt
";
        let diff = DiffParser::default().parse(text);
        assert_eq!(diff.files[0].path, "new.txt");
        assert!(diff.files[0].chunks.is_empty());
    }

    #[test]
    fn test_deleted_file_keeps_its_path() {
        let text = "diff --git a/gone.py b/gone.py
deleted file mode 100644
--- a/gone.py
+++ /dev/null
@@ -1,2 +0,0 @@
-import os
-print(os.name)
";
        let diff = DiffParser::default().parse(text);
        assert_eq!(diff.files[0].path, "gone.py");
        assert_eq!(diff.files[0].status, FileStatus::Deleted);
        assert_eq!(diff.files[0].changed_lines(), 2);
    }

    #[test]
    fn test_binary_file_has_no_chunks() {
        let text = "diff --git a/logo.png b/logo.png
new file mode 100644
index 0000000..1111111
Binary files /dev/null and b/logo.png differ
";
        let diff = DiffParser::default().parse(text);
        assert!(diff.files[0].is_binary);
        assert!(diff.files[0].chunks.is_empty());
        assert_eq!(diff.files[0].path, "logo.png");
    }

    #[test]
    fn test_copy_status() {
        let text = "diff --git a/a.rs b/b.rs
similarity index 100%
copy from a.rs
copy to b.rs
";
        let diff = DiffParser::default().parse(text);
        assert_eq!(diff.files[0].status, FileStatus::Copied);
        assert_eq!(diff.files[0].path, "b.rs");
    }

    #[test]
    fn test_malformed_hunk_header_is_skipped() {
        let text = "diff --git a/x.rs b/x.rs
--- a/x.rs
+++ b/x.rs
@@ -bogus @@
+lost line
@@ -5,1 +5,1 @@
-kept old
+kept new
";
        let diff = DiffParser::default().parse(text);
        let file = &diff.files[0];
        assert_eq!(file.chunks.len(), 1);
        assert_eq!(file.chunks[0].old_start, 5);
        assert_eq!(file.chunks[0].lines.len(), 2);
    }

    #[test]
    fn test_garbage_before_first_section_is_ignored() {
        let text = format!("commit abc\nAuthor: someone\n\n{}", TWO_FILES);
        let diff = DiffParser::default().parse(&text);
        assert_eq!(diff.files.len(), 2);
        assert!(DiffParser::default().parse("not a diff at all").is_empty());
    }

    #[test]
    fn test_no_newline_marker_is_skipped() {
        let text = "diff --git a/f.txt b/f.txt
--- a/f.txt
+++ b/f.txt
@@ -1 +1 @@
-a
\\ No newline at end of file
+b
\\ No newline at end of file
";
        let diff = DiffParser::default().parse(text);
        assert_eq!(diff.files[0].chunks[0].lines.len(), 2);
    }

    #[test]
    fn test_oversized_chunk_split_preserves_order() {
        let mut text =
            String::from("diff --git a/big.rs b/big.rs\n--- a/big.rs\n+++ b/big.rs\n@@ -1,0 +1,30 @@\n");
        for i in 0..30 {
            text.push_str(&format!("+line number {:02} with some padding text\n", i));
        }
        let parser = DiffParser::new(200);
        let diff = parser.parse(&text);
        let file = &diff.files[0];

        assert!(file.chunks.len() > 1);
        for chunk in &file.chunks {
            assert!(chunk.content_size() <= 200);
            assert_eq!(chunk.new_start, 1);
            assert!(chunk.context.starts_with("line number"));
        }
        let all: Vec<&str> = file
            .chunks
            .iter()
            .flat_map(|c| c.lines.iter().map(|l| l.content.as_str()))
            .collect();
        assert_eq!(all.len(), 30);
        assert!(all[0].starts_with("line number 00"));
        assert!(all[29].starts_with("line number 29"));
    }

    #[test]
    fn test_name_status_parsing_and_override() {
        let statuses = parse_name_status("M\tsrc/lib.rs\nR100\told.md\tdocs/guide.md\n\nbogus\n");
        assert_eq!(
            statuses,
            vec![
                StatusEntry { path: "src/lib.rs".into(), code: 'M' },
                StatusEntry { path: "docs/guide.md".into(), code: 'R' },
            ]
        );

        let diff = DiffParser::default().parse_with_statuses(TWO_FILES, &statuses);
        assert_eq!(diff.files[1].status, FileStatus::Renamed);
    }
}
