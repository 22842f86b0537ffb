use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::pipeline::processor::{JobOutcome, JobProcessor};
use crate::pipeline::PipelineError;

const OUTCOME_CHANNEL_CAPACITY: usize = 64;

/// Job ids sitting in a worker channel, not yet picked up.
type Queued = Arc<Mutex<HashSet<Uuid>>>;

/// In-process work queue.
///
/// A job id always routes to the same worker, so two queue entries for one
/// job run one after the other and the second finds the job already claimed.
/// A job waiting in a channel is not queued a second time. Different jobs run
/// concurrently across workers.
pub struct JobQueue {
    workers: Vec<mpsc::UnboundedSender<Uuid>>,
    queued: Queued,
    outcomes: broadcast::Sender<JobOutcome>,
}

impl JobQueue {
    /// Spawns the worker tasks. Must be called inside a Tokio runtime.
    pub fn start(processor: Arc<JobProcessor>, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (outcomes, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);
        let queued = Queued::default();

        let workers = (0..worker_count)
            .map(|worker_id| {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(run_worker(
                    worker_id,
                    rx,
                    Arc::clone(&processor),
                    Arc::clone(&queued),
                    outcomes.clone(),
                ));
                tx
            })
            .collect();

        info!("Started {} pipeline workers", worker_count);
        Self {
            workers,
            queued,
            outcomes,
        }
    }

    /// Returns `false` when the job was already waiting in the queue.
    pub fn submit(&self, job_id: Uuid) -> Result<bool, PipelineError> {
        if !lock(&self.queued).insert(job_id) {
            debug!(%job_id, "Job already queued");
            return Ok(false);
        }
        let worker = (job_id.as_u128() % self.workers.len() as u128) as usize;
        if self.workers[worker].send(job_id).is_err() {
            lock(&self.queued).remove(&job_id);
            return Err(PipelineError::QueueClosed);
        }
        debug!(%job_id, worker, "Job queued");
        Ok(true)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobOutcome> {
        self.outcomes.subscribe()
    }
}

fn lock(queued: &Queued) -> std::sync::MutexGuard<'_, HashSet<Uuid>> {
    // The set stays consistent even if a holder panicked.
    queued.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn run_worker(
    worker_id: usize,
    mut jobs: mpsc::UnboundedReceiver<Uuid>,
    processor: Arc<JobProcessor>,
    queued: Queued,
    outcomes: broadcast::Sender<JobOutcome>,
) {
    debug!("Worker {} started", worker_id);

    while let Some(job_id) = jobs.recv().await {
        lock(&queued).remove(&job_id);

        // Spawned so a panic inside one run does not take the worker down.
        let run = {
            let processor = Arc::clone(&processor);
            tokio::spawn(async move { processor.run_job(job_id).await }).await
        };

        match run {
            Ok(Ok(outcome)) => {
                // No subscribers is fine.
                let _ = outcomes.send(outcome);
            }
            Ok(Err(PipelineError::NotClaimable { status, .. })) => {
                debug!(%job_id, %status, "Worker {} skipped job", worker_id);
            }
            Ok(Err(e)) => error!(%job_id, "Worker {} could not run job: {e}", worker_id),
            Err(e) => {
                error!(%job_id, "Worker {} job task panicked: {e}", worker_id);
                match processor.abandon(job_id, format!("Job run panicked: {e}")).await {
                    Ok(outcome) => {
                        let _ = outcomes.send(outcome);
                    }
                    Err(e) => warn!(%job_id, "Could not mark panicked job as ERROR: {e}"),
                }
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
