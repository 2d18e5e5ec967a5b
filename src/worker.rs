//! Bounded pool for blocking collaborator calls.
//!
//! Jobs run on tokio's blocking threads, at most `workers` at a time, each
//! bounded by a request timeout. Every submission gets a [`Ticket`]; results
//! come back through a single completion channel drained by the owner.
//! The in-flight map is the only state shared with pool tasks.

use log::{debug, error, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Debug)]
pub enum TaskOutcome<T> {
    Finished(T),
    TimedOut,
    /// The job panicked. The message is already logged.
    Crashed(String),
}

#[derive(Debug)]
pub struct Completion<T> {
    pub ticket: Ticket,
    pub outcome: TaskOutcome<T>,
}

type InFlight = Arc<Mutex<HashMap<Ticket, CancellationToken>>>;

fn lock(map: &InFlight) -> MutexGuard<'_, HashMap<Ticket, CancellationToken>> {
    // A panic while holding the lock cannot leave the map half-updated.
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct WorkerPool<T> {
    semaphore: Arc<Semaphore>,
    timeout: Duration,
    next_ticket: AtomicU64,
    in_flight: InFlight,
    completions_tx: mpsc::UnboundedSender<Completion<T>>,
    completions_rx: mpsc::UnboundedReceiver<Completion<T>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn new(workers: usize, timeout: Duration) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
            timeout,
            next_ticket: AtomicU64::new(1),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            completions_tx,
            completions_rx,
        }
    }

    /// Queue `job` for execution. Must be called from within a tokio runtime.
    pub fn submit<F>(&self, job: F) -> Ticket
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let ticket = Ticket(self.next_ticket.fetch_add(1, Ordering::Relaxed));
        let token = CancellationToken::new();
        lock(&self.in_flight).insert(ticket, token.clone());

        let semaphore = Arc::clone(&self.semaphore);
        let in_flight = Arc::clone(&self.in_flight);
        let tx = self.completions_tx.clone();
        let timeout = self.timeout;

        tokio::spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("Ticket {:?} cancelled before start", ticket);
                    return;
                }
                permit = semaphore.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        lock(&in_flight).remove(&ticket);
                        return;
                    }
                },
            };

            // The permit travels with the job so a timed-out call still
            // occupies its slot until the thread is actually free.
            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                job()
            });

            let outcome = match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(value)) => TaskOutcome::Finished(value),
                Ok(Err(join_error)) => {
                    let message = if join_error.is_panic() {
                        panic_message(join_error.into_panic())
                    } else {
                        "task was cancelled by the runtime".to_string()
                    };
                    error!("Worker task {:?} crashed: {}", ticket, message);
                    TaskOutcome::Crashed(message)
                }
                Err(_) => {
                    warn!("Worker task {:?} exceeded {:?}", ticket, timeout);
                    TaskOutcome::TimedOut
                }
            };

            // Sent under the lock so an idle map implies an empty pipeline.
            {
                let mut map = lock(&in_flight);
                if map.remove(&ticket).is_some() && !token.is_cancelled() {
                    let _ = tx.send(Completion { ticket, outcome });
                } else {
                    debug!("Discarding result of cancelled ticket {:?}", ticket);
                }
            }
        });

        ticket
    }

    /// Cancel a ticket. A job that has not started never runs; a running one
    /// finishes but its result is dropped. Returns false for unknown or
    /// already completed tickets.
    pub fn cancel(&self, ticket: Ticket) -> bool {
        match lock(&self.in_flight).remove(&ticket) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        let drained: Vec<CancellationToken> = lock(&self.in_flight).drain().map(|(_, t)| t).collect();
        for token in drained {
            token.cancel();
        }
    }

    pub fn is_pending(&self, ticket: Ticket) -> bool {
        lock(&self.in_flight).contains_key(&ticket)
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Wait for the next completion. Returns `None` only if nothing is in
    /// flight and nothing is buffered.
    pub async fn next_completion(&mut self) -> Option<Completion<T>> {
        let idle = self.in_flight() == 0;
        if let Ok(completion) = self.completions_rx.try_recv() {
            return Some(completion);
        }
        if idle {
            return None;
        }
        self.completions_rx.recv().await
    }

    pub fn try_next_completion(&mut self) -> Option<Completion<T>> {
        self.completions_rx.try_recv().ok()
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
