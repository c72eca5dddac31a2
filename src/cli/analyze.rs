//! Analyze command - offline dry run of the pipeline
//!
//! Shows what would be sent for a diff: ranked files, how they were
//! selected and how the content splits under the token budget. Never
//! contacts a model.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;

use super::{colors, symbols};
use crate::config::Config;
use crate::diff::FileStatus;
use crate::error::PipelineError;
use crate::pipeline::{Pipeline, Prepared, Services};
use crate::select::SelectionMethod;
use crate::tokens::TokenBudget;

#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Read the diff from this file instead of stdin
    pub file: Option<PathBuf>,
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct Report {
    parsed_files: usize,
    filtered_files: usize,
    ranked_files: usize,
    selection: Option<SelectionMethod>,
    files: Vec<FileReport>,
    budget: TokenBudget,
    content_tokens: usize,
    chunk_tokens: Vec<usize>,
    cached: bool,
}

#[derive(Debug, Serialize)]
struct FileReport {
    path: String,
    status: FileStatus,
    score: f64,
    changed_lines: usize,
}

pub async fn run(mut config: Config, options: AnalyzeOptions) -> Result<()> {
    config.selection.ai_selection = false;

    let diff = read_diff(options.file.as_ref())?;
    let pipeline = Pipeline::new(config.clone(), Services::offline(&config));

    let report = match pipeline.prepare(&diff, &[]).await {
        Ok(prepared) => build_report(&pipeline, &prepared)?,
        Err(PipelineError::NoRelevantChanges {
            parsed_files,
            filtered_files,
        }) => Report {
            parsed_files,
            filtered_files,
            ranked_files: 0,
            selection: None,
            files: Vec::new(),
            budget: pipeline.budget(),
            content_tokens: 0,
            chunk_tokens: Vec::new(),
            cached: false,
        },
        Err(err) => return Err(err).context("Failed to analyze diff"),
    };

    if options.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", json);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn read_diff(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read diff from {:?}", path)),
        None => {
            let mut diff = String::new();
            std::io::stdin()
                .read_to_string(&mut diff)
                .context("Failed to read diff from stdin")?;
            Ok(diff)
        }
    }
}

fn build_report(pipeline: &Pipeline, prepared: &Prepared) -> Result<Report> {
    let chunks = pipeline.split(prepared).context("Failed to split content")?;

    Ok(Report {
        parsed_files: prepared.parsed_files,
        filtered_files: prepared.filtered_files,
        ranked_files: prepared.ranked_files,
        selection: Some(prepared.selection.method),
        files: prepared
            .selection
            .files
            .iter()
            .map(|s| FileReport {
                path: s.file.path.clone(),
                status: s.file.status,
                score: s.score,
                changed_lines: s.file.changed_lines(),
            })
            .collect(),
        budget: prepared.budget,
        content_tokens: pipeline.count_tokens(&prepared.content),
        chunk_tokens: chunks.iter().map(|c| pipeline.count_tokens(c)).collect(),
        cached: pipeline.cache().get(&prepared.cache_key).is_some(),
    })
}

fn print_report(report: &Report) {
    println!();
    println!(
        "{}{}  {} Diff Analysis{}",
        colors::PRIMARY, colors::BOLD, symbols::GIT, colors::RESET
    );
    println!("{}  ╰{}─{}", colors::MUTED, "─".repeat(40), colors::RESET);
    println!();

    if report.files.is_empty() {
        println!(
            "{}  No relevant changes after filtering{}",
            colors::WARNING, colors::RESET
        );
        println!();
        return;
    }

    println!(
        "{}  Files: {} parsed, {} after filtering, {} ranked, {} selected ({}){}",
        colors::FG,
        report.parsed_files,
        report.filtered_files,
        report.ranked_files,
        report.files.len(),
        report.selection.map(|m| m.as_str()).unwrap_or("none"),
        colors::RESET
    );
    println!();

    for file in &report.files {
        println!(
            "{}  {:>6.4}  {}{:<9}{} {} {}({} lines){}",
            colors::SUCCESS,
            file.score,
            colors::MUTED,
            file.status.as_str(),
            colors::FG,
            file.path,
            colors::MUTED,
            file.changed_lines,
            colors::RESET
        );
    }
    println!();

    println!(
        "{}  Budget: {} tokens per request (window {}, reserved {}){}",
        colors::FG,
        report.budget.budget,
        report.budget.window,
        report.budget.reserved,
        colors::RESET
    );
    println!(
        "{}  Content: {} tokens in {} request(s): {:?}{}",
        colors::FG,
        report.content_tokens,
        report.chunk_tokens.len(),
        report.chunk_tokens,
        colors::RESET
    );
    if report.cached {
        println!("{}  A cached message exists for this content{}", colors::MUTED, colors::RESET);
    }
    println!();
}
