//! CLI surface for the sync agent.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};

use crate::config::{self, Config};
use crate::daemon::{LoopOptions, run_loop};
use crate::git::PullOutcome;
use crate::workflow::{InitOptions, InitReport, SyncAttempt, SyncWorkflow};
use crate::Result;

#[derive(Parser, Debug)]
#[command(
    name = "commit-reput",
    version,
    about = "Mirror a directory to a git remote in batched commits",
    arg_required_else_help = true
)]
pub struct Cli {
    /// Config file (default: $COMMIT_REPUT_CONFIG or the user config dir).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Debug output (repeat for more).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or open the repository, wire the remote and pull once.
    Init,

    /// Initialize, then run a single sync tick.
    Once,

    /// Initialize, then sync on a fixed interval.
    Run {
        /// Seconds between ticks (default: schedule.interval_secs).
        #[arg(long, value_name = "SECS")]
        interval_secs: Option<u64>,

        /// Stop after this many ticks.
        #[arg(long, value_name = "N")]
        rounds: Option<u64>,
    },

    /// Write a default config file.
    WriteConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

pub fn parse_from<I, T>(args: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::parse_from(args)
}

/// Config for this invocation: `--config` wins over the default location.
pub fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => {
            let mut cfg = config::load_from(path)?;
            config::apply_env_overrides(&mut cfg);
            Ok(cfg)
        }
        None => Ok(config::load()?),
    }
}

/// Run the CLI (used by bin).
pub fn run(cli: Cli, cfg: Config) -> Result<()> {
    match cli.command {
        Commands::WriteConfig { force } => {
            let path = cli.config.unwrap_or_else(config::config_path);
            if path.exists() && !force {
                println!("{} already exists (use --force to overwrite)", path.display());
                return Ok(());
            }
            config::write_config(&path, &Config::default())?;
            println!("wrote {}", path.display());
            Ok(())
        }
        Commands::Init => {
            let (_, report) = SyncWorkflow::init_repo(InitOptions::from_config(&cfg)?)?;
            print_init(&report);
            Ok(())
        }
        Commands::Once => {
            let (mut workflow, report) = SyncWorkflow::init_repo(InitOptions::from_config(&cfg)?)?;
            print_init(&report);
            let attempt = workflow.commit_and_push(&cfg.author())?;
            print_attempt(&attempt);
            Ok(())
        }
        Commands::Run {
            interval_secs,
            rounds,
        } => {
            let (mut workflow, report) = SyncWorkflow::init_repo(InitOptions::from_config(&cfg)?)?;
            print_init(&report);
            let options = LoopOptions {
                interval: Duration::from_secs(
                    interval_secs.unwrap_or(cfg.schedule.interval_secs).max(1),
                ),
                rounds,
            };
            let summary = run_loop(
                &mut workflow,
                &cfg.author(),
                options,
                &crossbeam::channel::never(),
            );
            println!(
                "{} ticks: {} committed, {} pushed, {} deferred, {} clean, {} failed",
                summary.rounds,
                summary.committed,
                summary.pushed,
                summary.deferred,
                summary.clean,
                summary.failed
            );
            Ok(())
        }
    }
}

fn print_init(report: &InitReport) {
    let repo = if report.created { "created" } else { "opened" };
    let pull = match &report.pull {
        PullOutcome::UpToDate { branch } => format!("{branch} up to date"),
        PullOutcome::FastForwarded { branch, commit } => format!("{branch} at {commit}"),
        PullOutcome::Failed(reason) => format!("skipped ({reason})"),
    };
    println!("repository {repo}; pull: {pull}; next commit after {} changed ticks", report.threshold);
}

fn print_attempt(attempt: &SyncAttempt) {
    match attempt {
        SyncAttempt::Clean => println!("clean: nothing to commit"),
        SyncAttempt::Deferred { pending, threshold } => {
            println!("deferred: {pending}/{threshold}")
        }
        SyncAttempt::Committed { commit, files, .. } => {
            println!("committed {commit} ({files} files) and pushed")
        }
        SyncAttempt::Pushed { commit } => println!("pushed pending commit {commit}"),
    }
}
