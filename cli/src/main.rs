//! CLI for org-runner.
//!
//! Runs a shell command inside a working copy of every repository of a
//! GitHub organization, or of a single repository.

mod config;

use clap::{Args as ClapArgs, Parser, Subcommand};
use config::{load_profile, Profile, ProfileError, SearchProfile};
use org_runner::runner::DEFAULT_GH_PROGRAM;
use org_runner::{
    clone_cache_key_from_string, from_fn, ArchiveCondition, BoxError, CommandExecer, Execer,
    Options, Page, Processor, RunSummary, Runner, RunnerConfig, RunnerError, SearchOptions,
    SizeCondition, Source, Visibility,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// org-runner - Run a command in every repository of a GitHub organization.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML profile with defaults for the flags below.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding working copies and cached checkouts.
    #[arg(long, env = "ORG_RUNNER_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Clone over HTTPS instead of SSH.
    #[arg(long)]
    https: bool,

    /// Sparse-checkout pattern; repeat to check out several paths.
    #[arg(long = "subset")]
    subset: Vec<String>,

    /// Cache checkouts under this key and reuse them across runs.
    #[arg(long, env = "ORG_RUNNER_CACHE_KEY")]
    cache_key: Option<String>,

    /// Number of repositories processed concurrently.
    #[arg(long)]
    workers: Option<usize>,

    /// Program used for GitHub API calls.
    #[arg(long, default_value = DEFAULT_GH_PROGRAM)]
    gh_program: String,

    /// Verbose logging and per-repository lifecycle events.
    #[arg(long)]
    debug: bool,

    /// Stop the run at the first command exiting with a non-zero code.
    #[arg(long)]
    fail_fast: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the command in every matching repository of an organization.
    Org {
        /// Organization login.
        org: String,

        #[command(flatten)]
        search: SearchArgs,

        /// Command and arguments, after `--`.
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
    /// Run the command in a single repository.
    Repo {
        /// Repository as `owner/name`.
        name: String,

        /// Command and arguments, after `--`.
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}

#[derive(ClapArgs, Debug, Default)]
struct SearchArgs {
    /// Keep repositories with this primary language; repeatable.
    #[arg(long = "language")]
    languages: Vec<String>,

    /// How archived repositories are treated.
    #[arg(long, value_enum)]
    archived: Option<ArchiveCondition>,

    /// Visibility to keep.
    #[arg(long, value_enum)]
    visibility: Option<Visibility>,

    /// Fork filter.
    #[arg(long, value_enum)]
    source: Option<Source>,

    /// Size filter.
    #[arg(long, value_enum)]
    size: Option<SizeCondition>,

    /// Repositories per listing page.
    #[arg(long, allow_negative_numbers = true)]
    per_page: Option<i32>,

    /// Page to fetch, or `all`.
    #[arg(long, value_parser = parse_page, allow_negative_numbers = true)]
    page: Option<Page>,

    /// Serve the listing from the `gh` cache for this many seconds.
    #[arg(long)]
    cache_secs: Option<u64>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// Command results across all repositories of a run.
#[derive(Debug, Default)]
struct Outcomes {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    skipped_empty: AtomicUsize,
}

impl Outcomes {
    fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let profile = args.config.as_deref().map(load_profile).transpose();
    let debug = args.debug
        || profile
            .as_ref()
            .is_ok_and(|p| p.as_ref().is_some_and(|p| p.debug));
    init_tracing(debug);

    let profile = match profile {
        Ok(profile) => profile.unwrap_or_default(),
        Err(e) => {
            error!(error = %e, "Critical failure");
            return ExitCode::from(2);
        }
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            on_interrupt.cancel();
        }
    });

    let outcomes = Arc::new(Outcomes::default());
    match run(args, profile, &cancel, Arc::clone(&outcomes)).await {
        Ok(summary) => {
            print_summary(summary.as_ref(), &outcomes);
            if outcomes.failed() > 0 {
                ExitCode::from(1)
            } else {
                ExitCode::from(0)
            }
        }
        Err(CliError::Runner(RunnerError::Cancelled)) => {
            warn!("Run cancelled");
            ExitCode::from(130)
        }
        Err(e) => {
            error!(error = %e, "Critical failure");
            ExitCode::from(2)
        }
    }
}

/// Installs the global subscriber: compact lines without targets, filtered
/// by `RUST_LOG` (defaulting to `info`, or `debug` with `--debug`).
fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
}

async fn run(
    args: Args,
    profile: Profile,
    cancel: &CancellationToken,
    outcomes: Arc<Outcomes>,
) -> Result<Option<RunSummary>, CliError> {
    let options = run_options(&args, &profile);
    let fail_fast = args.fail_fast || profile.fail_fast;
    let runner = Runner::new(runner_config(&args, &profile))?.with_execer(Arc::new(
        CommandExecer::default().with_print_commands(options.debug),
    ));

    match args.command {
        Command::Org {
            org,
            search,
            command,
        } => {
            let search = search_options(&search, &profile.search);
            let processor = command_processor(command, fail_fast, outcomes);
            let summary = runner
                .run_for_organization(cancel, &org, &search, processor, &options)
                .await?;
            Ok(Some(summary))
        }
        Command::Repo { name, command } => {
            let processor = command_processor(command, fail_fast, outcomes);
            runner
                .run_for_repository(cancel, &name, processor, &options)
                .await?;
            Ok(None)
        }
    }
}

fn runner_config(args: &Args, profile: &Profile) -> RunnerConfig {
    let config = match args.base_dir.as_ref().or(profile.base_dir.as_ref()) {
        Some(base_dir) => RunnerConfig::new(base_dir),
        None => RunnerConfig::default(),
    };
    config.with_gh_program(args.gh_program.as_str())
}

fn run_options(args: &Args, profile: &Profile) -> Options {
    let subset = if args.subset.is_empty() {
        profile.subset.clone()
    } else {
        args.subset.clone()
    };

    Options {
        use_https: args.https || profile.https,
        cloning_subset: subset,
        clone_cache_key: args
            .cache_key
            .clone()
            .or_else(|| profile.cache_key.clone())
            .map(clone_cache_key_from_string),
        number_of_workers: args.workers.or(profile.workers).unwrap_or_default(),
        debug: args.debug || profile.debug,
        context_enricher: None,
    }
}

fn search_options(args: &SearchArgs, profile: &SearchProfile) -> SearchOptions {
    let languages = if args.languages.is_empty() {
        profile.languages.clone()
    } else {
        args.languages.clone()
    };

    SearchOptions {
        languages,
        archive_condition: args.archived.or(profile.archived).unwrap_or_default(),
        visibility: args.visibility.or(profile.visibility).unwrap_or_default(),
        source: args.source.or(profile.source).unwrap_or_default(),
        per_page: args.per_page.or(profile.per_page).unwrap_or_default(),
        page: args
            .page
            .or_else(|| profile.page.map(Page::from))
            .unwrap_or_default(),
        size_condition: args.size.or(profile.size).unwrap_or_default(),
        filter_in: None,
        cache: args
            .cache_secs
            .or(profile.cache_secs)
            .map(Duration::from_secs),
    }
}

fn parse_page(value: &str) -> Result<Page, String> {
    if value.eq_ignore_ascii_case("all") {
        return Ok(Page::All);
    }
    value
        .parse::<i32>()
        .map(Page::from)
        .map_err(|e| format!("expected a page number or 'all': {e}"))
}

/// Runs `command` in each non-empty repository and prints its output.
fn command_processor(
    command: Vec<String>,
    fail_fast: bool,
    outcomes: Arc<Outcomes>,
) -> Arc<dyn Processor> {
    let command = Arc::new(command);

    Arc::new(from_fn(move |ctx, repository: String, is_empty, exec: Arc<dyn Execer>| {
        let command = Arc::clone(&command);
        let outcomes = Arc::clone(&outcomes);
        async move {
            if is_empty {
                info!(repo = %repository, "Skipping empty repository");
                outcomes.skipped_empty.fetch_add(1, Ordering::SeqCst);
                return Ok(());
            }

            let Some((program, rest)) = command.split_first() else {
                return Err::<(), BoxError>("no command given".into());
            };
            let args: Vec<&str> = rest.iter().map(String::as_str).collect();
            let output = exec.run(ctx.cancellation(), program, &args).await?;
            if output.cancelled {
                return Ok(());
            }

            print!("{}", render_output(&repository, &output.stdout, &output.stderr));
            if output.is_success() {
                outcomes.succeeded.fetch_add(1, Ordering::SeqCst);
                return Ok(());
            }

            outcomes.failed.fetch_add(1, Ordering::SeqCst);
            warn!(repo = %repository, exit_code = output.exit_code, "Command failed");
            if fail_fast {
                return Err(format!("command exited with code {}", output.exit_code).into());
            }
            Ok(())
        }
    }))
}

/// Prefixes every output line with the repository name so that output of
/// concurrent workers stays attributable.
fn render_output(repository: &str, stdout: &str, stderr: &str) -> String {
    stdout
        .lines()
        .chain(stderr.lines())
        .map(|line| format!("[{repository}] {line}\n"))
        .collect()
}

/// Prints the final run summary.
fn print_summary(summary: Option<&RunSummary>, outcomes: &Outcomes) {
    println!("\nSummary:");
    if let Some(summary) = summary {
        println!("  Repositories found: {}", summary.found);
        println!("  Repositories inspected: {}", summary.inspected);
        println!("  Repositories processed: {}", summary.processed);
    }
    println!(
        "  Commands succeeded: {}",
        outcomes.succeeded.load(Ordering::SeqCst)
    );
    println!("  Commands failed: {}", outcomes.failed());
    println!(
        "  Empty repositories skipped: {}",
        outcomes.skipped_empty.load(Ordering::SeqCst)
    );
}
