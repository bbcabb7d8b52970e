//! Per-device print workers
//!
//! Every printer gets its own tokio task draining its own queue, so a
//! printer that hangs only delays its own jobs. A caller that stops waiting
//! for its reply abandons the job: the worker drops the in-flight send,
//! which closes the driver's socket.

use std::sync::Arc;

use dashmap::DashMap;
use kuitti_printer::{Delivery, PrintResult};
use shared::PrintJob;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::manager::ConnectionManager;
use crate::core::{EdgeError, Result};

/// Jobs waiting per printer before `submit` applies backpressure
const QUEUE_DEPTH: usize = 32;

/// Final state of a dispatched job
#[derive(Debug)]
pub struct DispatchOutcome {
    pub job: PrintJob,
    pub result: PrintResult<Delivery>,
}

struct DispatchRequest {
    job: PrintJob,
    reply: oneshot::Sender<DispatchOutcome>,
}

pub struct PrintDispatcher {
    manager: Arc<ConnectionManager>,
    queues: DashMap<String, mpsc::Sender<DispatchRequest>>,
    shutdown: CancellationToken,
}

impl PrintDispatcher {
    pub fn new(manager: Arc<ConnectionManager>, shutdown: CancellationToken) -> Self {
        Self {
            manager,
            queues: DashMap::new(),
            shutdown,
        }
    }

    /// Queue of one printer; the worker starts on first use
    fn queue(&self, device_id: &str) -> mpsc::Sender<DispatchRequest> {
        let mut entry = self
            .queues
            .entry(device_id.to_string())
            .or_insert_with(|| self.spawn_worker(device_id));
        if entry.is_closed() {
            *entry = self.spawn_worker(device_id);
        }
        entry.clone()
    }

    fn spawn_worker(&self, device_id: &str) -> mpsc::Sender<DispatchRequest> {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let worker = PrintWorker {
            device_id: device_id.to_string(),
            manager: self.manager.clone(),
        };
        tokio::spawn(worker.run(rx, self.shutdown.child_token()));
        tx
    }

    /// Queue a job on its target printer and wait for the outcome
    ///
    /// Dropping the returned future abandons the job.
    pub async fn submit(&self, job: PrintJob) -> Result<DispatchOutcome> {
        let device_id = job.target_printer.clone();
        let (reply, outcome) = oneshot::channel();
        self.queue(&device_id)
            .send(DispatchRequest { job, reply })
            .await
            .map_err(|_| EdgeError::WorkerStopped(device_id.clone()))?;
        outcome
            .await
            .map_err(|_| EdgeError::WorkerStopped(device_id))
    }

    pub fn worker_count(&self) -> usize {
        self.queues.iter().filter(|q| !q.is_closed()).count()
    }

    /// Stop every worker; queued jobs are dropped
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

struct PrintWorker {
    device_id: String,
    manager: Arc<ConnectionManager>,
}

impl PrintWorker {
    async fn run(self, mut rx: mpsc::Receiver<DispatchRequest>, shutdown: CancellationToken) {
        debug!(device_id = %self.device_id, "Print worker started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(device_id = %self.device_id, "Print worker received shutdown signal");
                    break;
                }
                request = rx.recv() => {
                    let Some(request) = request else {
                        debug!(device_id = %self.device_id, "Print queue closed, worker stopping");
                        break;
                    };
                    self.handle(request, &shutdown).await;
                }
            }
        }
    }

    async fn handle(&self, request: DispatchRequest, shutdown: &CancellationToken) {
        let DispatchRequest { mut job, mut reply } = request;
        if reply.is_closed() {
            debug!(device_id = %self.device_id, job_id = %job.id, "Job abandoned before sending");
            return;
        }

        let result = tokio::select! {
            _ = reply.closed() => {
                warn!(device_id = %self.device_id, job_id = %job.id, "Caller gone, job abandoned");
                return;
            }
            _ = shutdown.cancelled() => return,
            result = self.manager.send_job(&self.device_id, &mut job) => result,
        };

        // Receiver may have gone between the send and this reply
        let _ = reply.send(DispatchOutcome { job, result });
    }
}
