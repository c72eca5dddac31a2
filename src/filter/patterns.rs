//! Path pattern tables shared by the filters, the scorer and the selectors
//!
//! Every table is evaluated top to bottom and the first match wins.

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

/// Broad kind of file, derived from its path alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCategory {
    /// Program source
    Source,
    /// Schema, configuration, manifests and data files
    Config,
    /// Prose documentation
    Docs,
    /// Markup and stylesheets
    Markup,
    Other,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Source => "source",
            FileCategory::Config => "config",
            FileCategory::Docs => "docs",
            FileCategory::Markup => "markup",
            FileCategory::Other => "other",
        }
    }
}

fn set(patterns: &[&str]) -> RegexSet {
    RegexSet::new(patterns).expect("valid path pattern set")
}

static CATEGORY_TABLE: Lazy<Vec<(Regex, FileCategory)>> = Lazy::new(|| {
    [
        (
            r"(^|/)(Dockerfile(\.[^/]*)?|Containerfile|Makefile|GNUmakefile|CMakeLists\.txt|Jenkinsfile|Procfile|Vagrantfile|Rakefile|Gemfile|\.env(\.[^/]*)?)$",
            FileCategory::Config,
        ),
        (
            r"(?i)\.(sql|graphql|gql|proto|prisma|avsc|thrift|xsd)$",
            FileCategory::Config,
        ),
        (
            r"(?i)\.(rs|ts|tsx|js|jsx|mjs|cjs|py|go|java|kt|kts|swift|c|h|cc|cpp|cxx|hpp|hh|cs|fs|rb|php|scala|ex|exs|erl|hs|ml|clj|dart|lua|zig|nim|sh|bash|zsh|ps1|vue|svelte|r|jl|sol|m|mm|groovy|pl)$",
            FileCategory::Source,
        ),
        (
            r"(?i)\.(json|jsonc|json5|ya?ml|toml|ini|cfg|conf|properties|xml|plist|csv|tsv|tf|tfvars|hcl|nix|gradle|editorconfig)$",
            FileCategory::Config,
        ),
        (
            r"(?i)(\.(md|mdx|markdown|rst|txt|adoc|asciidoc|org|tex)$|(^|/)(README|CHANGELOG|CHANGES|LICENSE|COPYING|CONTRIBUTING|AUTHORS|NOTICE)[^/]*$)",
            FileCategory::Docs,
        ),
        (
            r"(?i)\.(html?|xhtml|css|scss|sass|less|styl|svg|hbs|handlebars|ejs|pug|jade|twig|liquid|mustache)$",
            FileCategory::Markup,
        ),
    ]
    .into_iter()
    .map(|(pattern, category)| (Regex::new(pattern).expect("valid category pattern"), category))
    .collect()
});

/// Category of `path` from the ordered category table
pub fn categorize(path: &str) -> FileCategory {
    CATEGORY_TABLE
        .iter()
        .find(|(re, _)| re.is_match(path))
        .map(|(_, category)| *category)
        .unwrap_or(FileCategory::Other)
}

static BINARY_EXTENSIONS: Lazy<RegexSet> = Lazy::new(|| {
    set(&[
        r"(?i)\.(png|jpe?g|gif|bmp|ico|icns|webp|tiff?|psd|heic|avif)$",
        r"(?i)\.(zip|tar|gz|tgz|bz2|xz|zst|rar|7z|jar|war|ear|whl|nupkg|deb|rpm|dmg|iso)$",
        r"(?i)\.(exe|dll|so|dylib|a|lib|o|obj|bin|dat|pyc|pyo|class|wasm|node)$",
        r"(?i)\.(woff2?|ttf|eot|otf)$",
        r"(?i)\.(sqlite3?|db|mdb)$",
    ])
});

static LOCK_FILES: Lazy<RegexSet> = Lazy::new(|| {
    set(&[
        r"(^|/)(package-lock\.json|npm-shrinkwrap\.json|yarn\.lock|pnpm-lock\.yaml|bun\.lockb?)$",
        r"(^|/)(Cargo\.lock|Gemfile\.lock|poetry\.lock|Pipfile\.lock|uv\.lock|pdm\.lock|composer\.lock)$",
        r"(^|/)(go\.sum|flake\.lock|mix\.lock|Podfile\.lock|packages\.lock\.json|pubspec\.lock|gradle\.lockfile|Package\.resolved)$",
        r"\.lock$",
    ])
});

static DEPENDENCY_DIRS: Lazy<RegexSet> = Lazy::new(|| {
    set(&[
        r"(^|/)(node_modules|bower_components|jspm_packages|web_modules|\.pnpm-store|\.yarn)/",
        r"(^|/)(vendor|Pods|Carthage|\.venv|venv|site-packages|\.bundle|\.cargo)/",
    ])
});

static BUILD_DIRS: Lazy<RegexSet> = Lazy::new(|| {
    set(&[
        r"^(build|out|target|obj|bin/Debug|bin/Release)/",
        r"(^|/)(dist|\.next|\.nuxt|\.output|\.svelte-kit|\.vercel|\.netlify|coverage|\.nyc_output|\.gradle|\.dart_tool|DerivedData)/",
    ])
});

static CACHE_DIRS: Lazy<RegexSet> = Lazy::new(|| {
    set(&[
        r"^(tmp|temp|\.tmp)/",
        r"(^|/)(\.cache|__pycache__|\.pytest_cache|\.mypy_cache|\.ruff_cache|\.tox|\.turbo|\.parcel-cache|\.sass-cache|\.eslintcache|\.angular)/",
    ])
});

static GENERATED_FILES: Lazy<RegexSet> = Lazy::new(|| {
    set(&[
        // Bundles and source maps
        r"(?i)\.min\.(js|css|mjs)$",
        r"(?i)[.-](bundle|chunk)\.(js|css)$",
        r"(?i)\.(js|css)\.map$|\.map$",
        // Generated protocol and binding code
        r"\.pb\.(go|cc|h|swift|rs)$|_grpc\.pb\.go$|\.pb\.gw\.go$",
        r"_pb2(_grpc)?\.pyi?$",
        r"(?i)\.(generated|gen|g|freezed)\.[a-z]+$",
        r"(^|/)(generated|__generated__|gen)/",
        // IDE and OS metadata
        r"(^|/)(\.idea|\.vscode|\.vs|\.fleet)/",
        r"(^|/)(\.DS_Store|Thumbs\.db|desktop\.ini)$",
        r"\.(swp|swo|iml)$|~$",
        // Auto-generated migrations
        r"(^|/)migrations/\d{4}[^/]*\.(py|sql|ts|js)$",
        r"(^|/)db/migrate/\d+_[^/]*\.rb$",
        // Media and office documents
        r"(?i)\.(mp3|mp4|m4a|m4v|wav|flac|ogg|aac|avi|mov|mkv|webm)$",
        r"(?i)\.(pdf|docx?|xlsx?|pptx?|odt|ods|odp|key|numbers|pages)$",
    ])
});

static MANIFEST_FILES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(^|/)(Cargo\.toml|package\.json|go\.mod|pyproject\.toml|setup\.py|setup\.cfg|requirements[^/]*\.txt|Gemfile|pom\.xml|build\.gradle(\.kts)?|settings\.gradle(\.kts)?|composer\.json|mix\.exs|Package\.swift|pubspec\.yaml|tsconfig[^/]*\.json|Makefile|CMakeLists\.txt|Dockerfile(\.[^/]*)?|docker-compose[^/]*\.ya?ml|compose\.ya?ml|\.env(\.[^/]*)?)$",
    )
    .expect("valid manifest pattern")
});

static TEST_FILES: Lazy<RegexSet> = Lazy::new(|| {
    set(&[
        r"(^|/)(tests?|__tests__|specs?|testdata|fixtures)/",
        r"(?i)[._-](test|spec)s?\.[a-z]+$",
        r"(^|/)test_[^/]+$",
    ])
});

static TRIVIAL_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[{}\[\]();,]+\s*$").expect("valid trivial line pattern"));

pub fn is_binary_extension(path: &str) -> bool {
    BINARY_EXTENSIONS.is_match(path)
}

pub fn is_lock_file(path: &str) -> bool {
    LOCK_FILES.is_match(path)
}

pub fn is_dependency_path(path: &str) -> bool {
    DEPENDENCY_DIRS.is_match(path)
}

pub fn is_build_output(path: &str) -> bool {
    BUILD_DIRS.is_match(path)
}

pub fn is_cache_path(path: &str) -> bool {
    CACHE_DIRS.is_match(path)
}

pub fn is_generated(path: &str) -> bool {
    GENERATED_FILES.is_match(path)
}

/// Manifest, build, container and environment files
pub fn is_manifest(path: &str) -> bool {
    MANIFEST_FILES.is_match(path)
}

pub fn is_test_path(path: &str) -> bool {
    TEST_FILES.is_match(path)
}

/// Lines made only of brackets and separators, as formatters produce
pub fn is_trivial_line(content: &str) -> bool {
    TRIVIAL_LINE.is_match(content)
}
