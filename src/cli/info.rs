//! Info command - show system information

use anyhow::Result;

use crate::config::Config;
use crate::core::CacheManager;
use crate::tokens::{context_window, counter_for_model};

pub fn run(config: &Config) -> Result<()> {
    println!("nexus-commit v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("System Information:");
    println!("  OS: {} {}", std::env::consts::OS, std::env::consts::ARCH);

    println!();
    println!("Configuration:");
    println!("  Config dir: {}", config_dir());
    let cache = CacheManager::new(&config.cache);
    println!("  Cache dir: {}", cache.cache_dir().display());
    println!(
        "  Cache: {}",
        if cache.is_enabled() { "enabled" } else { "disabled" }
    );

    println!();
    println!("Model:");
    println!("  Provider: {}", config.ai.provider);
    println!("  Model: {}", config.ai.model);
    println!("  Context window: {} tokens", context_window(&config.ai.model));
    println!("  Token counter: {}", counter_for_model(&config.ai.model).name());
    check_provider(&config.ai.api_key_env);

    Ok(())
}

fn config_dir() -> String {
    directories::ProjectDirs::from("com", "nexus", "commit")
        .map(|p| p.config_dir().to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn check_provider(env_var: &str) {
    let status = if std::env::var(env_var).is_ok() {
        "configured"
    } else {
        "not configured"
    };
    println!("  API key ({}): {}", env_var, status);
}
