//! Background jobs
//!
//! A single in-process queue decouples slow work from the request that
//! triggered it: handlers enqueue and return immediately, a spawned runner
//! drains jobs serially. Failures are logged and the runner keeps going; no
//! retries beyond that.
//!
//! Every job carries the same signed capability token the HTTP job endpoint
//! accepts, so work is authorized identically no matter which door it came
//! through.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::services::{JobTokenSigner, SyncService};

/// A unit of background work
#[derive(Debug, Clone)]
pub enum Job {
    /// Rebuild a user's article records from their gists, then signal the
    /// push channel to reload. The capability token encodes both.
    RefreshArticles {
        /// Signed job capability token
        token: String,
    },
}

/// Producer half of the job queue
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl JobQueue {
    /// Create a queue, returning the producer and the receiver the runner
    /// drains.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Job>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a job. Fire-and-forget: a stopped runner only produces a log
    /// line.
    pub fn enqueue(&self, job: Job) {
        if self.tx.send(job).is_err() {
            error!("Job runner is gone, dropping job");
        }
    }
}

/// Consumer loop processing queued jobs one at a time
pub struct JobRunner {
    rx: mpsc::UnboundedReceiver<Job>,
    sync: Arc<SyncService>,
    tokens: JobTokenSigner,
}

impl JobRunner {
    /// Create a runner over a queue receiver
    pub fn new(
        rx: mpsc::UnboundedReceiver<Job>,
        sync: Arc<SyncService>,
        tokens: JobTokenSigner,
    ) -> Self {
        Self { rx, sync, tokens }
    }

    /// Spawn the runner onto the executor
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drain the queue until all producers are dropped
    pub async fn run(mut self) {
        info!("Job runner started");
        while let Some(job) = self.rx.recv().await {
            self.process(job).await;
        }
        info!("Job runner stopped");
    }

    async fn process(&self, job: Job) {
        match job {
            Job::RefreshArticles { token } => {
                let claims = match self.tokens.verify(&token) {
                    Ok(claims) => claims,
                    Err(e) => {
                        warn!(error = %e, "Dropping job with invalid capability token");
                        return;
                    }
                };

                match self.sync.refresh(claims.user_id, &claims.channel).await {
                    Ok(outcome) => info!(
                        user_id = claims.user_id,
                        created = outcome.created,
                        updated = outcome.updated,
                        "Refresh job finished"
                    ),
                    Err(e) => warn!(user_id = claims.user_id, error = %e, "Refresh job failed"),
                }
            }
        }
    }
}
