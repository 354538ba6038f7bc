//! Terminal rendering for answers, progress, and banners

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::cli::Verbosity;
use crate::types::{AnswerPath, AnswerReport};

/// Spinner shown while a query runs; hidden in quiet mode
pub fn spinner(message: &str, verbosity: Verbosity) -> ProgressBar {
    if !verbosity.show_progress() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Welcome banner for interactive mode
pub fn show_banner(version: &str, model: &str, store: &str) {
    let width = 64;
    let rule = "=".repeat(width);

    println!("\n{}", rule.cyan());
    println!("{}", format!("  agentrag {} - Agentic RAG over your documents", version).bold().cyan());
    println!("{}", format!("  Model: {} | Store: {}", model, store).dimmed());
    println!("{}\n", rule.cyan());
    println!(
        "Ask a question (Ctrl-C cancels a running query, {} or Ctrl-D to quit)\n",
        "/exit".green()
    );
}

fn path_label(path: AnswerPath) -> &'static str {
    match path {
        AnswerPath::Direct => "direct reasoning",
        AnswerPath::Retrieval => "retrieved evidence",
        AnswerPath::Degraded => "no usable evidence",
        AnswerPath::Fallback => "fallback",
    }
}

/// Print the answer and its metadata
pub fn render_report(report: &AnswerReport, verbosity: Verbosity) {
    println!("{}", report.answer);

    if verbosity == Verbosity::Quiet {
        return;
    }

    println!();
    if !report.sources.is_empty() {
        println!("{} {}", "Sources:".bold(), report.sources.join(", "));
    }

    if let Some(reason) = caveat_reason(report) {
        println!("{} {}", "⚠ Caveat:".yellow().bold(), reason.yellow());
    } else if report.grounded {
        println!("{}", "✓ Grounded in the cited sources".green());
    }

    if verbosity.show_trace() {
        let trace: Vec<String> = report.trace.iter().map(|s| format!("{:?}", s)).collect();
        println!(
            "{}",
            format!(
                "Path: {} | Retrieval attempts: {} | Stages: {}",
                path_label(report.path),
                report.iterations,
                trace.join(" → ")
            )
            .dimmed()
        );
    }
}

pub fn show_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

pub fn show_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message.yellow());
}

/// Why a caveated answer is caveated
pub fn caveat_reason(report: &AnswerReport) -> Option<&'static str> {
    if !report.caveat {
        return None;
    }
    Some(if report.low_confidence {
        "low confidence: no relevant evidence was found"
    } else {
        match report.path {
            AnswerPath::Fallback => "no answer could be produced",
            AnswerPath::Direct => "answered from general knowledge, not from the documents",
            _ => "this answer may not be fully supported by the sources",
        }
    })
}
