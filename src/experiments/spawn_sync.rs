//! Cost of spawning one worker and waiting for it, by synchronization
//! primitive.
//!
//! Each invocation spawns exactly one worker, hands it a token, and blocks
//! until the worker's answer arrives; nothing is left running when the call
//! returns. The variants differ only in how completion is signalled.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::oneshot;

use crate::error::{Result, VariantFailure};
use crate::experiment::{Experiment, Subject};
use crate::variant::{Strategy, Variant, VariantGroup, VariantResult};

/// What a worker does with its token.
#[inline]
pub fn work(token: u64) -> u64 {
    token.rotate_left(7) ^ 0x5bd1_e995
}

fn joined<T>(handle: thread::JoinHandle<T>) -> VariantResult<T> {
    handle
        .join()
        .map_err(|_| VariantFailure::new("worker panicked"))
}

fn spawn_worker<F, T>(f: F) -> VariantResult<thread::JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Ok(thread::Builder::new().spawn(f)?)
}

/// Worker sends on a zero-capacity channel; sender and receiver meet.
pub fn rendezvous(token: u64) -> VariantResult<u64> {
    let (tx, rx) = mpsc::sync_channel(0);
    let handle = spawn_worker(move || tx.send(work(token)))?;
    let answer = rx
        .recv()
        .map_err(|_| VariantFailure::new("worker hung up"))?;
    joined(handle)?.map_err(|_| VariantFailure::new("receiver gone"))?;
    Ok(answer)
}

/// Worker sends into a one-slot buffer and exits without waiting.
pub fn buffered(token: u64) -> VariantResult<u64> {
    let (tx, rx) = mpsc::sync_channel(1);
    let handle = spawn_worker(move || tx.send(work(token)))?;
    let answer = rx
        .recv()
        .map_err(|_| VariantFailure::new("worker hung up"))?;
    joined(handle)?.map_err(|_| VariantFailure::new("receiver gone"))?;
    Ok(answer)
}

/// No channel: the worker's return value comes back through `join`.
pub fn join(token: u64) -> VariantResult<u64> {
    joined(spawn_worker(move || work(token))?)
}

/// Async task on a shared runtime, answered through a oneshot channel.
pub fn async_task(runtime: &Runtime, token: u64) -> VariantResult<u64> {
    runtime.block_on(async move {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let _ = tx.send(work(token));
        });
        rx.await
            .map_err(|_| VariantFailure::new("task dropped its sender"))
    })
}

/// Runtime owned by the `async_task` variant for the experiment's lifetime.
pub fn task_runtime() -> Result<Arc<Runtime>> {
    let runtime = Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("variant-lab-task")
        .build()?;
    Ok(Arc::new(runtime))
}

/// The four completion strategies.
pub fn spawn_group(runtime: Arc<Runtime>) -> VariantGroup<u64, u64> {
    VariantGroup::new("spawn_join")
        .with(Variant::new("rendezvous", Strategy::direct(), |t: &u64| {
            rendezvous(*t)
        }))
        .with(Variant::new("buffered", Strategy::direct(), |t: &u64| {
            buffered(*t)
        }))
        .with(Variant::new("join", Strategy::direct(), |t: &u64| join(*t)))
        .with(Variant::new("async_task", Strategy::direct(), move |t: &u64| {
            async_task(&runtime, *t)
        }))
}

/// The `spawn_sync` experiment.
pub fn experiment() -> Result<Experiment> {
    Experiment::builder("spawn_sync")
        .subject(Subject::opaque("worker"))
        .group("worker", spawn_group(task_runtime()?), |index| index)
        .build()
}
