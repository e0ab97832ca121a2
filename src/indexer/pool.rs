// Bounded pool of worker threads fed by a single dispatch loop
//
// Each worker owns one OS thread and processes one task at a time. The
// dispatcher task is the only owner of the idle set and the pending queue;
// submitters and workers talk to it through one command channel.

use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::{PoolError, WorkerError};

/// Outcome of one task as seen by the submitter.
pub type TaskResult<R> = Result<R, WorkerError>;

/// Upper bound for the default pool size.
pub const MAX_DEFAULT_WORKERS: usize = 8;

/// `max(1, min(cores - 1, 8))` for this machine.
pub fn default_pool_size() -> usize {
    let cores = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    pool_size_for(cores)
}

pub fn pool_size_for(cores: usize) -> usize {
    cores.saturating_sub(1).min(MAX_DEFAULT_WORKERS).max(1)
}

enum Command<T, R> {
    Submit {
        task: T,
        respond: oneshot::Sender<TaskResult<R>>,
    },
    Finished {
        worker: usize,
        outcome: TaskResult<R>,
    },
    Shutdown,
}

enum WorkerState<R> {
    Idle,
    /// Holds the responder for the task in flight.
    Busy(oneshot::Sender<TaskResult<R>>),
}

struct WorkerSlot<T, R> {
    jobs: Option<std_mpsc::Sender<T>>,
    thread: Option<thread::JoinHandle<()>>,
    state: WorkerState<R>,
}

/// Handle for a submitted task. Resolves when a worker finishes it.
pub struct TaskHandle<R> {
    receiver: oneshot::Receiver<TaskResult<R>>,
}

impl<R> Future for TaskHandle<R> {
    type Output = TaskResult<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(WorkerError::PoolClosed)))
    }
}

/// A fixed-size pool of worker threads running the same handler.
pub struct WorkerPool<T, R> {
    commands: mpsc::UnboundedSender<Command<T, R>>,
    dispatcher: Option<JoinHandle<()>>,
    size: usize,
}

impl<T, R> WorkerPool<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    /// Spawn `size` workers running `handler`. Must be called from within a
    /// Tokio runtime.
    pub fn new<F>(size: usize, handler: F) -> Result<Self, PoolError>
    where
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        if size == 0 {
            return Err(PoolError::EmptyPool);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| PoolError::NoRuntime)?;

        let handler = Arc::new(handler);
        let (commands, inbox) = mpsc::unbounded_channel();
        let mut slots: Vec<WorkerSlot<T, R>> = Vec::with_capacity(size);

        for id in 0..size {
            let (jobs, job_rx) = std_mpsc::channel();
            let handler = Arc::clone(&handler);
            let done = commands.clone();

            let spawned = thread::Builder::new()
                .name(format!("symgraph-worker-{}", id))
                .spawn(move || worker_loop(id, job_rx, handler, done));

            match spawned {
                Ok(thread) => slots.push(WorkerSlot {
                    jobs: Some(jobs),
                    thread: Some(thread),
                    state: WorkerState::Idle,
                }),
                Err(e) => {
                    error!("Failed to spawn worker {}: {}", id, e);
                    release_workers(slots);
                    return Err(PoolError::Spawn(e));
                }
            }
        }

        debug!("Started worker pool with {} workers", size);

        let dispatcher = Dispatcher {
            idle: (0..size).collect(),
            slots,
            queue: VecDeque::new(),
        };
        let dispatcher = runtime.spawn(dispatcher.run(inbox));

        Ok(Self {
            commands,
            dispatcher: Some(dispatcher),
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue a task. Never blocks; the returned handle resolves with the
    /// worker's result, or `PoolClosed` if the pool is torn down first.
    pub fn submit(&self, task: T) -> TaskHandle<R> {
        let (respond, receiver) = oneshot::channel();
        // A closed dispatcher drops `respond`, which resolves the handle.
        let _ = self.commands.send(Command::Submit { task, respond });
        TaskHandle { receiver }
    }

    /// Terminate every worker and wait for their threads to exit.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(dispatcher) = self.dispatcher.take() {
            if let Err(e) = dispatcher.await {
                error!("Worker pool dispatcher failed: {}", e);
            }
        }
    }
}

impl<T, R> Drop for WorkerPool<T, R> {
    fn drop(&mut self) {
        // Dropped without `shutdown()`: still tear the workers down.
        if self.dispatcher.is_some() {
            let _ = self.commands.send(Command::Shutdown);
        }
    }
}

struct Dispatcher<T, R> {
    slots: Vec<WorkerSlot<T, R>>,
    idle: VecDeque<usize>,
    queue: VecDeque<(T, oneshot::Sender<TaskResult<R>>)>,
}

impl<T, R> Dispatcher<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Command<T, R>>) {
        while let Some(command) = inbox.recv().await {
            match command {
                Command::Submit { task, respond } => {
                    self.queue.push_back((task, respond));
                    self.drain();
                }
                Command::Finished { worker, outcome } => {
                    self.finish(worker, outcome);
                    self.drain();
                }
                Command::Shutdown => break,
            }
        }

        self.terminate().await;
    }

    /// Busy -> idle: resolve the task and return the worker to the idle set.
    fn finish(&mut self, worker: usize, outcome: TaskResult<R>) {
        let Some(slot) = self.slots.get_mut(worker) else {
            return;
        };

        if let WorkerState::Busy(respond) = std::mem::replace(&mut slot.state, WorkerState::Idle) {
            // The submitter may have stopped waiting
            let _ = respond.send(outcome);
        }
        self.idle.push_back(worker);
    }

    /// Assign queued tasks, oldest first, while a worker is idle.
    fn drain(&mut self) {
        while !self.queue.is_empty() {
            let Some(worker) = self.idle.pop_front() else {
                break;
            };
            let Some((task, respond)) = self.queue.pop_front() else {
                break;
            };

            let slot = &mut self.slots[worker];
            let delivered = slot
                .jobs
                .as_ref()
                .map(|jobs| jobs.send(task).is_ok())
                .unwrap_or(false);

            if delivered {
                slot.state = WorkerState::Busy(respond);
            } else {
                warn!("Worker {} is no longer running", worker);
                slot.jobs = None;
                let _ = respond.send(Err(WorkerError::Crashed(format!(
                    "worker {} is not running",
                    worker
                ))));
            }
        }

        if !self.queue.is_empty() && self.slots.iter().all(|slot| slot.jobs.is_none()) {
            for (_task, respond) in self.queue.drain(..) {
                let _ = respond.send(Err(WorkerError::PoolClosed));
            }
        }
    }

    async fn terminate(mut self) {
        for (_task, respond) in self.queue.drain(..) {
            let _ = respond.send(Err(WorkerError::PoolClosed));
        }

        let mut threads = Vec::with_capacity(self.slots.len());
        for slot in &mut self.slots {
            // Closing the job channel ends the worker loop
            slot.jobs = None;
            slot.state = WorkerState::Idle;
            if let Some(thread) = slot.thread.take() {
                threads.push(thread);
            }
        }

        let joined = tokio::task::spawn_blocking(move || join_threads(threads)).await;
        if let Err(e) = joined {
            error!("Failed to join worker threads: {}", e);
        }
        debug!("Worker pool terminated");
    }
}

fn worker_loop<T, R, F>(
    id: usize,
    jobs: std_mpsc::Receiver<T>,
    handler: Arc<F>,
    done: mpsc::UnboundedSender<Command<T, R>>,
) where
    F: Fn(T) -> R,
{
    while let Ok(task) = jobs.recv() {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(task)))
            .map_err(|payload| WorkerError::Crashed(panic_message(payload.as_ref())));

        if done.send(Command::Finished { worker: id, outcome }).is_err() {
            break;
        }
    }
}

fn release_workers<T, R>(slots: Vec<WorkerSlot<T, R>>) {
    let threads = slots
        .into_iter()
        .filter_map(|mut slot| {
            slot.jobs = None;
            slot.thread.take()
        })
        .collect();
    join_threads(threads);
}

fn join_threads(threads: Vec<thread::JoinHandle<()>>) {
    for thread in threads {
        let name = thread.thread().name().unwrap_or("worker").to_string();
        if thread.join().is_err() {
            warn!("Worker thread {} exited with a panic", name);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
