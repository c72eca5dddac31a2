//! Noise removal: path-only rejection first, then line-level cleanup

use tracing::debug;

use super::patterns;
use crate::config::FilterConfig;
use crate::diff::{Chunk, Diff, DiffLine, FileDiff, LineKind};

/// Drops files and lines that carry no signal for a commit summary
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    config: FilterConfig,
}

impl NoiseFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Quick filter followed by the detailed filter
    pub fn filter(&self, diff: Diff) -> Diff {
        self.detailed_filter(self.quick_filter(diff))
    }

    /// Cheap path-only rejection; never looks at lines
    pub fn quick_filter(&self, diff: Diff) -> Diff {
        let before = diff.files.len();
        let files: Vec<FileDiff> = diff
            .files
            .into_iter()
            .filter(|file| {
                let rejected = self.is_quick_rejected(file);
                if rejected {
                    debug!(path = %file.path, "Quick filter dropped file");
                }
                !rejected
            })
            .collect();
        debug!(before, after = files.len(), "Quick filter");
        Diff::new(files)
    }

    pub fn is_quick_rejected(&self, file: &FileDiff) -> bool {
        let path = file.path.as_str();
        file.is_binary
            || patterns::is_binary_extension(path)
            || (self.config.ignore_lock_files && patterns::is_lock_file(path))
            || patterns::is_dependency_path(path)
            || patterns::is_build_output(path)
            || patterns::is_cache_path(path)
    }

    /// Generated-file rejection and line cleanup inside surviving files
    pub fn detailed_filter(&self, diff: Diff) -> Diff {
        let before = diff.files.len();
        let files: Vec<FileDiff> = diff
            .files
            .into_iter()
            .filter_map(|file| self.clean_file(file))
            .collect();
        debug!(before, after = files.len(), "Detailed filter");
        Diff::new(files)
    }

    fn clean_file(&self, mut file: FileDiff) -> Option<FileDiff> {
        if self.config.ignore_generated && patterns::is_generated(&file.path) {
            debug!(path = %file.path, "Dropped generated file");
            return None;
        }
        if file.content_size() > self.config.max_file_size {
            debug!(path = %file.path, bytes = file.content_size(), "Dropped oversized file");
            return None;
        }

        file.chunks = std::mem::take(&mut file.chunks)
            .into_iter()
            .filter_map(|chunk| self.clean_chunk(chunk))
            .collect();

        if file.chunks.is_empty() {
            debug!(path = %file.path, "Dropped file without meaningful changes");
            return None;
        }
        Some(file)
    }

    fn clean_chunk(&self, mut chunk: Chunk) -> Option<Chunk> {
        if self.config.ignore_whitespace {
            let lines = drop_whitespace_noise(std::mem::take(&mut chunk.lines));
            chunk.lines = drop_formatter_noise(lines);
            chunk.refresh_context();
        }
        chunk.has_changes().then_some(chunk)
    }
}

/// Remove blank lines, then removed/added pairs that differ only in whitespace
///
/// A pair must sit in the same run of changed lines, with no context line
/// between them.
pub fn drop_whitespace_noise(lines: Vec<DiffLine>) -> Vec<DiffLine> {
    let lines: Vec<DiffLine> = lines
        .into_iter()
        .filter(|l| !l.content.trim().is_empty())
        .collect();

    let mut dropped = vec![false; lines.len()];
    let mut i = 0;
    while i < lines.len() {
        if lines[i].kind == LineKind::Context {
            i += 1;
            continue;
        }
        let start = i;
        while i < lines.len() && lines[i].kind != LineKind::Context {
            i += 1;
        }
        pair_run(&lines, start..i, &mut dropped);
    }

    lines
        .into_iter()
        .zip(dropped)
        .filter(|(_, drop)| !drop)
        .map(|(line, _)| line)
        .collect()
}

fn pair_run(lines: &[DiffLine], run: std::ops::Range<usize>, dropped: &mut [bool]) {
    let removed: Vec<usize> = run.clone().filter(|&i| lines[i].kind == LineKind::Removed).collect();
    let added: Vec<usize> = run.filter(|&i| lines[i].kind == LineKind::Added).collect();

    for r in removed {
        let target = lines[r].content.trim();
        if let Some(&a) = added
            .iter()
            .find(|&&a| !dropped[a] && lines[a].content.trim() == target)
        {
            dropped[r] = true;
            dropped[a] = true;
        }
    }
}

/// Remove changed lines that are only brackets or separators
pub fn drop_formatter_noise(lines: Vec<DiffLine>) -> Vec<DiffLine> {
    lines
        .into_iter()
        .filter(|l| l.kind == LineKind::Context || !patterns::is_trivial_line(&l.content))
        .collect()
}
