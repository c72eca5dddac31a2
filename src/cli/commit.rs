//! Commit command - AI-powered commit message generation
//!
//! Runs the staged diff through the pipeline and prints (or commits) the
//! resulting semantic commit message.

use anyhow::{Context, Result};
use std::process::Command;
use std::sync::Arc;
use tracing::debug;

use super::{colors, print_error, spinner, symbols};
use crate::ai::HttpModelClient;
use crate::config::Config;
use crate::diff::{parse_name_status, StatusEntry};
use crate::error::{PipelineError, RequestError};
use crate::pipeline::{GeneratedMessage, Pipeline, Services};

#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    pub execute: bool,
    pub commit_type: Option<String>,
    pub scope: Option<String>,
}

pub async fn run(mut config: Config, options: CommitOptions) -> Result<()> {
    if options.commit_type.is_some() {
        config.commit.commit_type = options.commit_type.clone();
    }
    if options.scope.is_some() {
        config.commit.scope = options.scope.clone();
    }

    print_header();

    // Check if we're in a git repository
    if !is_git_repo() {
        print_error("Not a git repository");
        return Ok(());
    }

    let diff = get_staged_diff()?;
    if diff.trim().is_empty() {
        print_error("No staged changes. Use 'git add' first.");
        return Ok(());
    }
    let statuses = get_staged_statuses()?;
    print_changes_summary(&statuses, &diff);

    let verbose = config.verbose;
    let client = Arc::new(HttpModelClient::new(&config.ai)?);
    let services = Services::connected(&config, client);
    let pipeline = Arc::new(Pipeline::new(config, services));

    let watcher = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("Interrupted, cancelling requests");
                pipeline.shutdown();
            }
        })
    };

    let pb = spinner(&format!("{} Generating commit message", symbols::AI_ICON));
    let result = pipeline.generate(&diff, &statuses).await;
    pb.finish_and_clear();
    watcher.abort();

    let generated = match result {
        Ok(generated) => generated,
        Err(PipelineError::NoRelevantChanges { .. }) => {
            print_error(
                "Only noise changed (lock files, generated files, whitespace). Nothing to describe.",
            );
            return Ok(());
        }
        Err(err) if matches!(err.request_error(), Some(RequestError::Cancelled)) => {
            print_error("Cancelled");
            return Ok(());
        }
        Err(err) => return Err(err).context("Failed to generate commit message"),
    };

    print_generation_note(&generated, verbose);
    let commit_msg = generated.message.trim();
    print_commit_message(commit_msg);

    if options.execute {
        let pb = spinner(&format!("{} Committing", symbols::GIT));
        let committed = execute_commit(commit_msg);
        pb.finish_and_clear();
        committed?;
        print_success();
    } else {
        print_copy_hint(commit_msg);
    }

    Ok(())
}

/// Check if current directory is a git repository
fn is_git_repo() -> bool {
    Command::new("git")
        .args(["rev-parse", "--git-dir"])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Get staged diff, whitespace-insensitive and without path prefixes
fn get_staged_diff() -> Result<String> {
    let output = Command::new("git")
        .args([
            "diff",
            "--cached",
            "--no-color",
            "--no-prefix",
            "--ignore-all-space",
            "--ignore-blank-lines",
        ])
        .output()
        .context("Failed to run git diff")?;

    if !output.status.success() {
        anyhow::bail!("git diff failed: {}", String::from_utf8_lossy(&output.stderr).trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Get status letters of staged files
fn get_staged_statuses() -> Result<Vec<StatusEntry>> {
    let output = Command::new("git")
        .args(["diff", "--cached", "--name-status"])
        .output()
        .context("Failed to get staged files")?;

    Ok(parse_name_status(&String::from_utf8_lossy(&output.stdout)))
}

/// Execute git commit with the message
fn execute_commit(message: &str) -> Result<()> {
    let status = Command::new("git")
        .args(["commit", "-m", message])
        .status()
        .context("Failed to execute git commit")?;

    if !status.success() {
        return Err(anyhow::anyhow!("Git commit failed"));
    }

    Ok(())
}

// ============================================
// UI Functions
// ============================================

fn print_header() {
    println!();
    println!(
        "{}{}  {} AI Commit Message{}",
        colors::PRIMARY, colors::BOLD, symbols::COMMIT, colors::RESET
    );
    println!(
        "{}  ╰{}─{}",
        colors::MUTED, "─".repeat(40), colors::RESET
    );
    println!();
}

fn print_changes_summary(statuses: &[StatusEntry], diff: &str) {
    let additions = diff
        .lines()
        .filter(|l| l.starts_with('+') && !l.starts_with("+++"))
        .count();
    let deletions = diff
        .lines()
        .filter(|l| l.starts_with('-') && !l.starts_with("---"))
        .count();

    println!(
        "{}  {} Changes: {} files, {}+{} {}-{}{}",
        colors::MUTED,
        symbols::GIT,
        statuses.len(),
        colors::SUCCESS, additions,
        colors::ERROR, deletions,
        colors::RESET
    );
    println!();

    for entry in statuses.iter().take(10) {
        let status = entry.status().map(|s| s.as_str()).unwrap_or("changed");
        println!("{}    {} {}{}", colors::MUTED, status, entry.path, colors::RESET);
    }

    if statuses.len() > 10 {
        println!(
            "{}  ... and {} more files{}",
            colors::MUTED, statuses.len() - 10, colors::RESET
        );
    }

    println!();
}

fn print_generation_note(generated: &GeneratedMessage, verbose: bool) {
    if verbose && !generated.cached {
        println!(
            "{}  Built from {} request part(s){}",
            colors::MUTED, generated.chunks, colors::RESET
        );
    }
    if generated.cached {
        println!("{}  Cached result for identical changes{}", colors::MUTED, colors::RESET);
        println!();
    } else if generated.failed_chunks > 0 {
        println!(
            "{}  {} of {} request parts failed; message built from the rest{}",
            colors::WARNING, generated.failed_chunks, generated.chunks, colors::RESET
        );
        println!();
    }
}

fn print_commit_message(message: &str) {
    println!(
        "{}{}  {} Suggested Commit Message{}",
        colors::SUCCESS, colors::BOLD, symbols::COMMIT, colors::RESET
    );
    println!(
        "{}  ╭{}─{}",
        colors::MUTED, "─".repeat(50), colors::RESET
    );

    for line in message.lines() {
        println!("{}  │ {}{}{}", colors::MUTED, colors::FG, line, colors::RESET);
    }

    println!(
        "{}  ╰{}─{}",
        colors::MUTED, "─".repeat(50), colors::RESET
    );
    println!();
}

fn print_success() {
    println!(
        "{}  {} Commit successful!{}",
        colors::SUCCESS, symbols::SUCCESS, colors::RESET
    );
    println!();
}

fn print_copy_hint(message: &str) {
    println!(
        "{}  💡 Use 'nexus-commit commit --execute' to commit automatically{}",
        colors::MUTED, colors::RESET
    );
    println!();
    println!(
        "{}  Or copy the message:{}",
        colors::MUTED, colors::RESET
    );
    println!(
        "{}  git commit -m \"{}\"{}",
        colors::FG,
        message.lines().next().unwrap_or(""),
        colors::RESET
    );
    println!();
}
