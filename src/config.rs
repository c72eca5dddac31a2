//! Configuration management for nexus-commit

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ai: AiConfig,
    pub filter: FilterConfig,
    pub selection: SelectionConfig,
    pub splitter: SplitterConfig,
    pub cache: CacheConfig,
    pub queue: QueueConfig,
    pub commit: CommitConfig,
    #[serde(skip)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// `anthropic`, `openai` (or any OpenAI-compatible server) or `ollama`
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    /// Response allowance, also reserved out of the prompt budget
    pub max_tokens: u32,
    pub endpoint: Option<String>,
    pub api_key_env: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub relevancy_threshold: f64,
    /// Files whose changed content exceeds this many bytes are dropped
    pub max_file_size: usize,
    pub ignore_generated: bool,
    pub ignore_whitespace: bool,
    pub ignore_lock_files: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Upper bound on files sent to the model
    pub max_files: usize,
    pub ai_selection: bool,
    /// At or below this many files selection is skipped
    pub ai_min_files: usize,
    /// Above this many files only the heuristic selector runs
    pub ai_max_files: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    /// Hunks larger than this many content bytes are split while parsing
    pub max_chunk_size: usize,
    pub safety_factor: f64,
    pub overhead_tokens: usize,
    pub line_caps: Vec<LineCapTier>,
    pub default_max_lines: usize,
}

/// Per-file changed-line cap used when a commit touches at most `max_files` files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCapTier {
    pub max_files: usize,
    pub max_lines: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub max_memory_entries: usize,
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub max_concurrent: usize,
    /// Dispatches allowed per rolling window
    pub rate_limit: usize,
    pub rate_window_ms: u64,
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub rate_limit_backoff_multiplier: u32,
    /// Ceiling for a server-sent `retry-after`, kept apart from `max_delay_ms`
    pub max_retry_after_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitConfig {
    /// Conventional commit type every generated message must carry
    pub commit_type: Option<String>,
    pub scope: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            temperature: 0.3,
            max_tokens: 500,
            endpoint: None,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            relevancy_threshold: 0.1,
            max_file_size: 512 * 1024,
            ignore_generated: true,
            ignore_whitespace: true,
            ignore_lock_files: true,
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_files: 20,
            ai_selection: true,
            ai_min_files: 20,
            ai_max_files: 150,
        }
    }
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 8000,
            safety_factor: 0.9,
            overhead_tokens: 100,
            line_caps: vec![
                LineCapTier { max_files: 5, max_lines: 200 },
                LineCapTier { max_files: 20, max_lines: 100 },
                LineCapTier { max_files: 50, max_lines: 50 },
            ],
            default_max_lines: 25,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 7 * 24 * 60 * 60,
            max_memory_entries: 100,
            dir: None,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            rate_limit: 10,
            rate_window_ms: 1000,
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            rate_limit_backoff_multiplier: 3,
            max_retry_after_ms: 120_000,
        }
    }
}

/// Get the configuration file path
fn config_path() -> Result<PathBuf> {
    let config_dir = directories::ProjectDirs::from("com", "nexus", "commit")
        .context("Failed to determine config directory")?
        .config_dir()
        .to_path_buf();

    Ok(config_dir.join("config.toml"))
}

/// Load configuration from file or use defaults
pub fn load_config(custom_path: Option<&str>) -> Result<Config> {
    let path = if let Some(p) = custom_path {
        PathBuf::from(p)
    } else {
        config_path()?
    };

    if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {:?}", path))?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

/// Initialize configuration file with defaults
pub fn init_config() -> Result<()> {
    let path = config_path()?;

    if path.exists() {
        println!("Configuration file already exists at {:?}", path);
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {:?}", parent))?;
    }

    let default_config = Config::default();
    let content = toml::to_string_pretty(&default_config)
        .context("Failed to serialize default config")?;

    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write config to {:?}", path))?;

    println!("Configuration initialized at {:?}", path);
    Ok(())
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    println!("{}", content);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [ai]
            model = "gpt-4o-mini"
            provider = "openai"

            [selection]
            max_files = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.ai.model, "gpt-4o-mini");
        assert_eq!(config.ai.max_tokens, 500);
        assert_eq!(config.selection.max_files, 10);
        assert_eq!(config.selection.ai_max_files, 150);
        assert_eq!(config.queue.max_concurrent, 3);
        assert_eq!(config.splitter.line_caps.len(), 3);
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let content = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&content).unwrap();
        assert_eq!(parsed.splitter.max_chunk_size, 8000);
        assert!(parsed.cache.enabled);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.filter.relevancy_threshold, 0.1);
    }
}
