//! Cache command - maintain the message cache

use anyhow::Result;
use clap::Subcommand;

use super::{colors, symbols};
use crate::config::Config;
use crate::core::CacheManager;

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum CacheAction {
    /// Remove expired and unreadable entries
    Clean,
    /// Remove every entry
    Clear,
    /// Print the cache directory
    Path,
}

pub fn run(config: &Config, action: CacheAction) -> Result<()> {
    let cache = CacheManager::new(&config.cache);

    match action {
        CacheAction::Clean => {
            let removed = cache.cleanup();
            print_removed(removed, "stale");
        }
        CacheAction::Clear => {
            let removed = cache.clear();
            print_removed(removed, "cached");
        }
        CacheAction::Path => {
            println!("{}", cache.cache_dir().display());
        }
    }

    Ok(())
}

fn print_removed(count: usize, kind: &str) {
    println!(
        "{}  {} Removed {} {} entr{}{}",
        colors::SUCCESS,
        symbols::SUCCESS,
        count,
        kind,
        if count == 1 { "y" } else { "ies" },
        colors::RESET
    );
}
