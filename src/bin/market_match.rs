//! Market Match CLI
//!
//! Runs passages through the matcher against a dataset file, for tuning
//! keywords and entity groups.
//!
//! Usage:
//!   cargo run --features cli --bin market-match -- test \
//!     --data data.json --text "Bitcoin ETF approval coming?"
//!
//! Examples:
//!   # Top 10 candidates as JSON
//!   cargo run --features cli --bin market-match -- test \
//!     --data data.json --text "CZ back at binance" --top-n 10 --json
//!
//!   # One post per line, '#' lines are comments
//!   cargo run --features cli --bin market-match -- batch \
//!     --data data.json --input posts.txt --threshold 0.5
//!
//!   # Custom tunables
//!   cargo run --features cli --bin market-match -- --config config/matcher.yaml \
//!     stats --data data.json

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use market_linker::market_linking::{
    BestMatch, MarketLinkingService, MarketLinkingServiceImpl, MatchOptions, MatchResult,
    TargetMatch,
};

const MAX_TOP_N: usize = 20;
const BATCH_THRESHOLD: f64 = 0.5;
const BATCH_PREVIEW_CHARS: usize = 60;

#[derive(Parser)]
#[command(name = "market-match")]
#[command(version)]
#[command(about = "Match text passages to prediction markets")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Matcher tunables (YAML); defaults apply when omitted
    #[arg(long, short = 'c', global = true, env = "MARKET_MATCH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank markets for one passage
    Test {
        /// Dataset JSON
        #[arg(long, short = 'd')]
        data: PathBuf,

        /// Passage to match
        #[arg(long, short = 't')]
        text: String,

        /// Results to show (1-20)
        #[arg(long, short = 'n')]
        top_n: Option<usize>,

        /// Score needed to count as a match (0-1)
        #[arg(long)]
        threshold: Option<f64>,

        /// Print the raw result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Match every line of a file
    Batch {
        /// Dataset JSON
        #[arg(long, short = 'd')]
        data: PathBuf,

        /// One passage per line
        #[arg(long, short = 'i')]
        input: PathBuf,

        /// Score needed to count as a match (0-1)
        #[arg(long, default_value_t = BATCH_THRESHOLD)]
        threshold: f64,
    },

    /// Show the topic-deduplicated best match
    Best {
        /// Dataset JSON
        #[arg(long, short = 'd')]
        data: PathBuf,

        /// Passage to match
        #[arg(long, short = 't')]
        text: String,

        /// Print the raw result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics
    Stats {
        /// Dataset JSON
        #[arg(long, short = 'd')]
        data: PathBuf,
    },
}

// =============================================================================
// MAIN
// =============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "market_linker=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref();

    let result = match cli.command {
        Commands::Test {
            data,
            text,
            top_n,
            threshold,
            json,
        } => cmd_test(&data, config, &text, top_n, threshold, json),
        Commands::Batch {
            data,
            input,
            threshold,
        } => cmd_batch(&data, config, &input, threshold),
        Commands::Best { data, text, json } => cmd_best(&data, config, &text, json),
        Commands::Stats { data } => cmd_stats(&data, config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn load_service(data: &Path, config: Option<&Path>) -> Result<MarketLinkingServiceImpl> {
    MarketLinkingServiceImpl::from_files(data, config)
        .with_context(|| format!("Failed to load dataset {}", data.display()))
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

fn cmd_test(
    data: &Path,
    config: Option<&Path>,
    text: &str,
    top_n: Option<usize>,
    threshold: Option<f64>,
    json: bool,
) -> Result<()> {
    let service = load_service(data, config)?;
    let defaults = MatchOptions::from_config(service.config());
    let options = MatchOptions::new(
        top_n.unwrap_or(defaults.top_n).min(MAX_TOP_N),
        threshold.unwrap_or(defaults.threshold),
    );

    let result = service.match_text(text, &options);
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize result")?
        );
        return Ok(());
    }

    if !result.is_matched() {
        let reason = result
            .reason()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "below_threshold".to_string());
        println!(
            "{} ({}). Showing top candidates:\n",
            "No match above threshold".yellow().bold(),
            reason
        );
    }

    let mode = match &result {
        MatchResult::Ranked(r) => r.mode,
        MatchResult::NoMatch(_) => service.snapshot().index.mode(),
    };
    println!("{} {}", "Mode:".cyan().bold(), mode);
    println!(
        "{} {}  {} {}",
        "TopN:".cyan(),
        options.top_n,
        "Threshold:".cyan(),
        options.threshold
    );
    if let MatchResult::Ranked(r) = &result {
        println!("{} {}", "Candidates scanned:".cyan(), r.candidates);
    }
    println!();

    for r in result.results() {
        print_result(r, options.threshold);
    }
    Ok(())
}

fn print_result(r: &TargetMatch, threshold: f64) {
    let status = if r.score >= threshold {
        "PASS".green().bold()
    } else {
        "----".dimmed()
    };
    println!(
        "{}  {} {:.2}  {} {}",
        status,
        "Score:".cyan(),
        r.score,
        "Keyword:".cyan(),
        r.keyword
    );
    if !r.matched_keywords.is_empty() {
        println!("{} {}", "Matched:".cyan(), r.matched_keywords.join(", "));
    }
    println!("{} {}", "Reason:".cyan(), r.reasons.join(", "));
    println!("{} {}", "ID:".cyan(), r.id);
    println!("{} {}", "Title:".cyan(), r.title);
    if let Some(url) = &r.primary_url {
        println!("{} {}", "Trade URL:".cyan(), url);
    }
    println!("{}", "Markets:".cyan());
    for m in &r.markets {
        let labels = m.market.labels.as_ref();
        let yes = labels.and_then(|l| l.yes_label.as_deref()).unwrap_or("YES");
        let no = labels.and_then(|l| l.no_label.as_deref()).unwrap_or("NO");
        println!("- {}: {} [{}/{}]", m.id, m.market.title, yes, no);
    }
    println!();
}

fn cmd_batch(data: &Path, config: Option<&Path>, input: &Path, threshold: f64) -> Result<()> {
    let service = load_service(data, config)?;
    let content = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let posts: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();
    if posts.is_empty() {
        println!("{} No posts to test (one per line).", "WARNING:".yellow());
        return Ok(());
    }

    let options = MatchOptions::new(1, threshold);
    let total = posts.len();
    println!("{}", "=== BATCH TEST RESULTS ===".bold());
    println!("Total posts: {}", total);
    println!("Threshold: {}", options.threshold);
    println!();

    let mut matched = 0usize;
    for (i, post) in posts.iter().enumerate() {
        let result = service.match_text(post, &options);
        println!("[{}/{}] {}", i + 1, total, preview(post));

        match result.best() {
            Some(r) if result.is_matched() => {
                matched += 1;
                println!("  {} (score: {:.2})", "✓ MATCHED".green().bold(), r.score);
                println!("    {}", r.title);
                print_batch_detail(r);
            }
            Some(r) => {
                println!("  {}", "✗ NO MATCH".red().bold());
                println!("    Best candidate ({:.2}): {}", r.score, r.title);
                print_batch_detail(r);
            }
            None => {
                println!("  {}", "✗ NO MATCH".red().bold());
                if let Some(reason) = result.reason() {
                    println!("    Reason: {}", reason);
                }
            }
        }
        println!();
    }

    let not_matched = total - matched;
    let pct = |n: usize| n as f64 / total as f64 * 100.0;
    println!("{}", "=== SUMMARY ===".bold());
    println!("Matched: {}/{} ({:.1}%)", matched, total, pct(matched));
    println!("Not matched: {}/{} ({:.1}%)", not_matched, total, pct(not_matched));
    Ok(())
}

fn print_batch_detail(r: &TargetMatch) {
    println!("    Keyword: {} | Reason: {}", r.keyword, r.reasons.join(", "));
    if !r.matched_keywords.is_empty() {
        println!("    Matched: {}", r.matched_keywords.join(", "));
    }
}

fn preview(post: &str) -> String {
    if post.chars().count() > BATCH_PREVIEW_CHARS {
        let head: String = post.chars().take(BATCH_PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        post.to_string()
    }
}

fn cmd_best(data: &Path, config: Option<&Path>, text: &str, json: bool) -> Result<()> {
    let service = load_service(data, config)?;
    let best = service.best_match(text);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&best).context("Failed to serialize result")?
        );
        return Ok(());
    }

    let Some(best) = best else {
        println!("{}", "No match".yellow().bold());
        return Ok(());
    };
    print_best(&best);
    Ok(())
}

fn print_best(best: &BestMatch) {
    println!("{} {}", "Mode:".cyan().bold(), best.mode);
    println!("{} {}", "Title:".cyan(), best.title.bold());
    println!("{} {}", "Keyword:".cyan(), best.keyword);
    if !best.matched_keywords.is_empty() {
        println!("{} {}", "Matched:".cyan(), best.matched_keywords.join(", "));
    }
    if let Some(url) = &best.primary_url {
        println!("{} {}", "Trade URL:".cyan(), url);
    }
    println!();
    println!("{}", "Topics:".cyan().bold());
    for (i, topic) in best.topics.iter().enumerate() {
        let kind = if topic.is_multi { "multi" } else { "binary" };
        println!("  [{}] {} ({}, {})", i + 1, topic.title, topic.topic_id, kind);
        if let Some(ids) = &topic.market_ids {
            println!("      options: {}", ids.join(", "));
        }
        if !topic.matched_keywords.is_empty() {
            println!("      matched: {}", topic.matched_keywords.join(", "));
        }
    }
}

fn cmd_stats(data: &Path, config: Option<&Path>) -> Result<()> {
    let service = load_service(data, config)?;
    print!("{}", service.stats());
    Ok(())
}
