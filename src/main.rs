use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mend::config::Policy;
use mend::git_ops::GitCommitSink;
use mend::heal::Healer;
use mend::model::RunStatus;
use mend::report;
use mend::runner::ProcessRunner;

#[derive(Parser, Debug)]
#[command(
    name = "mend",
    about = "Self-healing test repair: diagnose failing suites and commit minimal fixes",
    version
)]
struct Args {
    /// Path to the target repository (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Override the maximum number of test-and-repair rounds
    #[arg(short = 'n', long)]
    max_iterations: Option<u32>,

    /// Override the per-suite-run timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Commit each accepted fix to the repository's git history
    #[arg(short, long)]
    commit: bool,

    /// Where to write the run record
    #[arg(short, long, default_value = "results.json")]
    report: PathBuf,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let root = args.path.canonicalize()?;

    let mut policy = Policy::load(&root);
    if let Some(n) = args.max_iterations {
        policy.max_iterations = n;
    }
    if let Some(secs) = args.timeout {
        policy.test_timeout_secs = secs;
    }

    let runner = ProcessRunner::new(Duration::from_secs(policy.test_timeout_secs));
    let sink = if args.commit {
        Some(GitCommitSink::open(&root)?)
    } else {
        None
    };

    let mut healer = Healer::new(&root, policy, &runner);
    if let Some(sink) = sink.as_ref() {
        healer = healer.with_commit_sink(sink);
    }

    let run = healer.heal();
    report::save(&run, &args.report)?;
    print_summary(&run);

    Ok(match run.status {
        RunStatus::Passed => ExitCode::SUCCESS,
        RunStatus::Failed => ExitCode::from(1),
        _ => ExitCode::from(2),
    })
}

fn print_summary(run: &mend::model::Run) {
    println!("run {} on {}", run.id, run.target);
    for iter in &run.iterations {
        println!(
            "  round {}: {}/{} passed, {} defects, {} fixes",
            iter.number, iter.passed, iter.total, iter.defects_found, iter.fixes_applied
        );
    }
    println!(
        "  {} fixes ({} committed), status {:?}",
        run.fixes.len(),
        run.total_commits,
        run.status
    );
    if let Some(error) = &run.error {
        println!("  error: {}", error);
    }
}
