//! Type definitions for parsed diffs

use serde::Serialize;

/// Structured form of a whole diff
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diff {
    pub files: Vec<FileDiff>,
    /// Number of hunk lines across all files
    pub total_lines: usize,
    /// Bytes of line content across all files
    pub total_size: usize,
}

impl Diff {
    pub fn new(files: Vec<FileDiff>) -> Self {
        let mut diff = Self {
            files,
            total_lines: 0,
            total_size: 0,
        };
        diff.recompute_totals();
        diff
    }

    /// Refresh `total_lines` and `total_size` after files or lines were dropped
    pub fn recompute_totals(&mut self) {
        self.total_lines = self
            .files
            .iter()
            .flat_map(|f| &f.chunks)
            .map(|c| c.lines.len())
            .sum();
        self.total_size = self.files.iter().map(FileDiff::content_size).sum();
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// One changed file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileDiff {
    /// Post-change path
    pub path: String,
    /// Pre-change path, recorded only when it differs from `path`
    pub old_path: Option<String>,
    pub status: FileStatus,
    pub is_binary: bool,
    pub chunks: Vec<Chunk>,
}

impl FileDiff {
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            old_path: None,
            status,
            is_binary: false,
            chunks: Vec::new(),
        }
    }

    /// Added plus removed lines
    pub fn changed_lines(&self) -> usize {
        self.chunks.iter().map(Chunk::changed_lines).sum()
    }

    pub fn content_size(&self) -> usize {
        self.chunks.iter().map(Chunk::content_size).sum()
    }

    /// Lowercased extension of the file name, if any
    pub fn extension(&self) -> Option<String> {
        file_extension(&self.path)
    }
}

/// Lowercased extension of the last path segment
pub fn file_extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Kind of change for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Added => "added",
            FileStatus::Modified => "modified",
            FileStatus::Deleted => "deleted",
            FileStatus::Renamed => "renamed",
            FileStatus::Copied => "copied",
        }
    }

    /// Status from a `git diff --name-status` code such as `M` or `R100`
    pub fn from_code(code: &str) -> Option<Self> {
        match code.chars().next()? {
            'A' => Some(FileStatus::Added),
            'M' | 'T' => Some(FileStatus::Modified),
            'D' => Some(FileStatus::Deleted),
            'R' => Some(FileStatus::Renamed),
            'C' => Some(FileStatus::Copied),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hunk: contiguous changed lines plus their context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub header: String,
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub lines: Vec<DiffLine>,
    /// Short summary built from the first few meaningful lines
    pub context: String,
}

impl Chunk {
    pub fn changed_lines(&self) -> usize {
        self.lines.iter().filter(|l| l.kind != LineKind::Context).count()
    }

    pub fn has_changes(&self) -> bool {
        self.lines.iter().any(|l| l.kind != LineKind::Context)
    }

    pub fn content_size(&self) -> usize {
        self.lines.iter().map(|l| l.content.len()).sum()
    }

    /// Added and removed lines only
    pub fn changes(&self) -> impl Iterator<Item = &DiffLine> {
        self.lines.iter().filter(|l| l.kind != LineKind::Context)
    }

    pub fn refresh_context(&mut self) {
        self.context = summarize_context(&self.lines);
    }
}

/// Join of the first three non-empty context/added contents
pub fn summarize_context(lines: &[DiffLine]) -> String {
    lines
        .iter()
        .filter(|l| l.kind != LineKind::Removed)
        .map(|l| l.content.trim())
        .filter(|c| !c.is_empty())
        .take(3)
        .collect::<Vec<_>>()
        .join(" | ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffLine {
    pub kind: LineKind,
    pub content: String,
}

impl DiffLine {
    pub fn new(kind: LineKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    /// Marker used when a line is written back out
    pub fn marker(&self) -> char {
        match self.kind {
            LineKind::Context => ' ',
            LineKind::Added => '+',
            LineKind::Removed => '-',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Context,
    Added,
    Removed,
}

/// One row of `git diff --name-status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub path: String,
    pub code: char,
}

impl StatusEntry {
    pub fn status(&self) -> Option<FileStatus> {
        FileStatus::from_code(&self.code.to_string())
    }
}
