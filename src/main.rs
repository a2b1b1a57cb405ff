use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::collections::HashSet;
use std::path::PathBuf;

use lintwarden::blame::BlameAttributor;
use lintwarden::config::{self, Config};
use lintwarden::diagnostic::{Maximums, Severity};
use lintwarden::github::GithubClient;
use lintwarden::issue::{synthesize, CandidateIssue};
use lintwarden::linter::Linter;
use lintwarden::notify;
use lintwarden::reconcile;
use lintwarden::report::RunReport;
use lintwarden::util::SystemRunner;

#[derive(Parser, Debug)]
#[command(
    name = "lintwarden",
    about = "Turns static-analysis findings into tracked GitHub issues",
    version
)]
struct Args {
    /// Path to the code tree to analyze (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Branch this run's issues belong to
    #[arg(long)]
    branch: String,

    /// Older end of the commit range under review (exclusive)
    #[arg(long)]
    before: String,

    /// Revision under review; deep links point at this
    #[arg(long)]
    after: String,

    /// Repository slug (owner/name); detected from the git remote if omitted
    #[arg(long)]
    repo: Option<String>,

    /// Pylint rcfile to pass through to the analysis tool
    #[arg(long)]
    rcfile: Option<String>,

    /// Branch names classified as mainline
    #[arg(long, value_delimiter = ',', default_values_t = [String::from("main"), String::from("master")])]
    mainline: Vec<String>,

    /// Compute and print the reconciliation plan without touching the tracker
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let path = args.path.canonicalize().context("Invalid analysis path")?;

    let repo_slug = match args.repo {
        Some(slug) => slug,
        None => config::detect_repo_slug(&path)?,
    };
    let token = std::env::var("GITHUB_TOKEN")
        .ok()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| anyhow!("GITHUB_TOKEN is not set"))?;
    let webhook_url = std::env::var("LINTWARDEN_WEBHOOK_URL")
        .ok()
        .filter(|u| !u.is_empty());

    let config = Config {
        repo_slug,
        branch: args.branch,
        before: args.before,
        after: args.after,
        token,
        webhook_url,
        rcfile: args.rcfile,
        mainline_branches: args.mainline,
    };

    eprintln!("🔍 Analyzing {} @ {}...", config.repo_slug, config.branch);

    let runner = SystemRunner::new(path.clone());
    let attributor = BlameAttributor::new(&runner, &config.before, &config.after)?;

    let files = Linter::discover_files(&path);
    eprintln!("  {} python file(s) to lint", files.len());

    let report = Linter::new(config.rcfile.clone()).run(&runner, &attributor, &files)?;
    print_report(&report);

    let client = GithubClient::new(&config.repo_slug, &config.token)?;
    let collaborators = client.collaborators().await?;
    let local = local_candidates(&report, &config, &collaborators);
    let remote = client.open_issues(&config.branch).await?;

    let plan = reconcile::plan(local, remote, &config.branch);

    if args.dry_run {
        print_plan(&plan);
        return Ok(());
    }

    let changes = reconcile::apply(&plan, &client).await;
    eprintln!("  {} issue(s) created or updated", changes);

    if changes > 0 {
        if let Some(webhook_url) = &config.webhook_url {
            let message =
                notify::summary_message(&config.repo_slug, &config.branch, changes, &report.counts);
            if let Err(err) = notify::notify(webhook_url, &message).await {
                eprintln!("  ! notification failed: {:#}", err);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}

fn local_candidates(
    report: &RunReport,
    config: &Config,
    collaborators: &HashSet<String>,
) -> Vec<CandidateIssue> {
    report
        .files()
        .flat_map(|(_, file)| file.groups())
        .map(|(_, records)| synthesize(records, config, collaborators))
        .collect()
}

fn print_plan(plan: &reconcile::ReconcilePlan) {
    println!();
    println!("Reconciliation plan (dry run):");
    for issue in &plan.creates {
        println!("  + create '{}'", issue.title);
    }
    for (number, issue) in &plan.updates {
        println!("  ~ update #{} '{}'", number, issue.title);
    }
    for (number, title) in &plan.closes {
        println!("  - close #{} '{}'", number, title);
    }
    if plan.is_empty() {
        println!("  nothing to do");
    }
}

/// Aligned per-file console listing, plus the run totals CI cares about.
fn print_report(report: &RunReport) {
    let max = &report.maximums;
    let continuation = " ".repeat(max.line + 1 + max.column + 3 + 2 + max.message_id + 2);

    for (path, file) in report.files() {
        println!();
        println!();
        println!(" *** {} ***", path);
        println!();

        for (severity, counter) in file.counts.iter() {
            if counter.total() > 0 {
                println!(" {} | {}", severity.banner(), counter.total());
            }
        }
        println!();

        for (_, records) in file.groups() {
            for record in records {
                let line_pad = " ".repeat(max.line.saturating_sub(Maximums::width_of(record.line)));
                let column_pad =
                    " ".repeat(max.column.saturating_sub(Maximums::width_of(record.column)));
                let id_pad = " ".repeat(max.message_id.saturating_sub(record.message_id.len()));

                for (index, line) in record.message_lines.iter().enumerate() {
                    if index == 0 {
                        println!(
                            " {}{}:{}{} - ({}){} {} ({})",
                            line_pad,
                            record.line,
                            record.column,
                            column_pad,
                            record.message_id,
                            id_pad,
                            line,
                            record.symbol
                        );
                    } else {
                        println!(" {}{}", continuation, line);
                    }
                }
            }
        }
    }

    let mut errors = 0u32;
    let mut warnings = 0u32;
    let mut suggestions = 0u32;
    for (severity, counter) in report.counts.iter() {
        match severity {
            Severity::Error | Severity::Fatal => errors += counter.total(),
            Severity::Warning => warnings += counter.total(),
            _ => suggestions += counter.total(),
        }
    }

    println!();
    println!(
        " {} error(s), {} warning(s), {} suggestion(s); {} introduced by this change",
        errors, warnings, suggestions, report.counts.totals.new
    );
}
