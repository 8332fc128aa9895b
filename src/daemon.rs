//! Timer loop driving `commit_and_push`.
//!
//! Errors never stop the loop: batch state is left as it was, so the next
//! tick retries the same backlog.

use std::time::Duration;

use crossbeam::channel::{Receiver, tick};

use crate::git::{Author, CommitWorkTree, PushRemote, ReadStatus};
use crate::workflow::{SyncAttempt, SyncWorkflow};

#[derive(Clone, Copy, Debug)]
pub struct LoopOptions {
    pub interval: Duration,
    /// Stop after this many ticks; `None` runs until shutdown.
    pub rounds: Option<u64>,
}

/// Tally of what the loop did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub rounds: u64,
    pub clean: u64,
    pub deferred: u64,
    pub committed: u64,
    pub pushed: u64,
    pub failed: u64,
}

impl LoopSummary {
    fn record(&mut self, result: &crate::Result<SyncAttempt>) {
        self.rounds += 1;
        match result {
            Ok(SyncAttempt::Clean) => self.clean += 1,
            Ok(SyncAttempt::Deferred { .. }) => self.deferred += 1,
            Ok(SyncAttempt::Committed { .. }) => self.committed += 1,
            Ok(SyncAttempt::Pushed { .. }) => self.pushed += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Run one tick immediately, then one per `interval` until `rounds` ticks
/// have run or `shutdown` fires (a message or a dropped sender).
pub fn run_loop<B>(
    workflow: &mut SyncWorkflow<B>,
    author: &Author,
    options: LoopOptions,
    shutdown: &Receiver<()>,
) -> LoopSummary
where
    B: ReadStatus + CommitWorkTree + PushRemote,
{
    let ticker = tick(options.interval);
    let mut summary = LoopSummary::default();

    loop {
        let result = workflow.commit_and_push(author);
        if let Err(err) = &result {
            tracing::warn!(
                error = %err,
                transience = err.transience().as_str(),
                effect = err.effect().as_str(),
                "sync tick failed; will retry on the next tick"
            );
        }
        summary.record(&result);

        if options.rounds.is_some_and(|limit| summary.rounds >= limit) {
            break;
        }

        crossbeam::select! {
            recv(ticker) -> _ => {}
            recv(shutdown) -> _ => {
                tracing::info!("shutdown requested");
                break;
            }
        }
    }

    tracing::info!(
        rounds = summary.rounds,
        committed = summary.committed,
        pushed = summary.pushed,
        deferred = summary.deferred,
        failed = summary.failed,
        "sync loop stopped"
    );
    summary
}
