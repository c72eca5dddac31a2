//! Compact per-file previews for model-assisted selection

use serde::Serialize;
use std::fmt::Write;

use crate::diff::{file_extension, FileDiff, FileStatus};
use crate::filter::patterns::{self, categorize, FileCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
    High,
    Medium,
    Low,
}

impl PriorityTier {
    /// Changed lines shown in a preview of this tier
    pub fn preview_lines(&self) -> usize {
        match self {
            PriorityTier::High => 50,
            PriorityTier::Medium => 30,
            PriorityTier::Low => 20,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityTier::High => "high",
            PriorityTier::Medium => "medium",
            PriorityTier::Low => "low",
        }
    }
}

fn is_source(path: &str) -> bool {
    categorize(path) == FileCategory::Source
}

fn is_config_like(path: &str) -> bool {
    patterns::is_manifest(path) || categorize(path) == FileCategory::Config
}

fn is_prose_or_style(path: &str) -> bool {
    matches!(categorize(path), FileCategory::Docs | FileCategory::Markup)
}

const TIER_RULES: &[(fn(&str) -> bool, PriorityTier)] = &[
    (is_source, PriorityTier::High),
    (is_config_like, PriorityTier::Medium),
    (is_prose_or_style, PriorityTier::Low),
];

/// First matching rule wins; unmatched paths are medium
pub fn priority_tier(path: &str) -> PriorityTier {
    TIER_RULES
        .iter()
        .find(|(matches, _)| matches(path))
        .map(|(_, tier)| *tier)
        .unwrap_or(PriorityTier::Medium)
}

const LANGUAGES: &[(&str, &str)] = &[
    ("rs", "Rust"),
    ("ts", "TypeScript"),
    ("tsx", "TypeScript"),
    ("js", "JavaScript"),
    ("jsx", "JavaScript"),
    ("mjs", "JavaScript"),
    ("cjs", "JavaScript"),
    ("py", "Python"),
    ("go", "Go"),
    ("java", "Java"),
    ("kt", "Kotlin"),
    ("kts", "Kotlin"),
    ("swift", "Swift"),
    ("c", "C"),
    ("h", "C"),
    ("cc", "C++"),
    ("cpp", "C++"),
    ("cxx", "C++"),
    ("hpp", "C++"),
    ("cs", "C#"),
    ("rb", "Ruby"),
    ("php", "PHP"),
    ("scala", "Scala"),
    ("ex", "Elixir"),
    ("exs", "Elixir"),
    ("hs", "Haskell"),
    ("dart", "Dart"),
    ("lua", "Lua"),
    ("zig", "Zig"),
    ("sh", "Shell"),
    ("bash", "Shell"),
    ("zsh", "Shell"),
    ("vue", "Vue"),
    ("svelte", "Svelte"),
    ("sql", "SQL"),
    ("proto", "Protobuf"),
    ("graphql", "GraphQL"),
    ("json", "JSON"),
    ("yaml", "YAML"),
    ("yml", "YAML"),
    ("toml", "TOML"),
    ("xml", "XML"),
    ("html", "HTML"),
    ("css", "CSS"),
    ("scss", "SCSS"),
    ("md", "Markdown"),
    ("rst", "reStructuredText"),
];

pub fn detect_language(path: &str) -> Option<&'static str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    if name.starts_with("Dockerfile") {
        return Some("Dockerfile");
    }
    if name == "Makefile" || name == "GNUmakefile" {
        return Some("Makefile");
    }
    let ext = file_extension(path)?;
    LANGUAGES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, language)| *language)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilePreview {
    pub path: String,
    pub status: FileStatus,
    pub changed_lines: usize,
    pub language: Option<&'static str>,
    pub tier: PriorityTier,
    pub preview: String,
}

impl FilePreview {
    pub fn from_file(file: &FileDiff) -> Self {
        Self::capped(file, usize::MAX)
    }

    /// Preview of at most `max_lines` lines, never more than the tier allows
    pub fn capped(file: &FileDiff, max_lines: usize) -> Self {
        let tier = priority_tier(&file.path);
        let preview = file
            .chunks
            .iter()
            .flat_map(|chunk| chunk.changes())
            .take(tier.preview_lines().min(max_lines))
            .map(|line| format!("{}{}", line.marker(), line.content))
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            path: file.path.clone(),
            status: file.status,
            changed_lines: file.changed_lines(),
            language: detect_language(&file.path),
            tier,
            preview,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = write!(out, "## {} [{}", self.path, self.status);
        if let Some(language) = self.language {
            let _ = write!(out, ", {}", language);
        }
        let _ = write!(
            out,
            ", {} priority, {} changed lines]",
            self.tier.as_str(),
            self.changed_lines
        );
        if !self.preview.is_empty() {
            out.push('\n');
            out.push_str(&self.preview);
        }
        out
    }
}
