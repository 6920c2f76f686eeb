//! Background tasks for long-running operations.
//!
//! Each user-initiated operation runs on its own named thread with a fresh
//! event channel and cancel token. The caller keeps the receiving half and
//! drains it on its own loop; the worker never blocks on the consumer.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver},
    },
    thread::{self, JoinHandle},
};

use crate::{cancel::CancelToken, events::EventSink, events::SyncEvent};

pub struct TaskHandle<T> {
    pub events: Receiver<SyncEvent>,
    cancel: CancelToken,
    join: JoinHandle<T>,
}

impl<T> TaskHandle<T> {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Waits for the worker. `Err` carries the panic payload.
    pub fn join(self) -> thread::Result<T> {
        self.join.join()
    }
}

pub fn spawn_task<T, F>(name: &str, task: F) -> io::Result<TaskHandle<T>>
where
    T: Send + 'static,
    F: FnOnce(EventSink, CancelToken) -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();
    let join = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || task(EventSink::new(tx), worker_cancel))?;
    Ok(TaskHandle {
        events: rx,
        cancel,
        join,
    })
}

/// Admits at most one upload at a time.
#[derive(Debug, Clone, Default)]
pub struct UploadSlot {
    active: Arc<AtomicBool>,
}

struct SlotGuard(Arc<AtomicBool>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl UploadSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Starts `task` unless another upload holds the slot, in which case
    /// nothing happens and `Ok(None)` is returned. The slot frees itself
    /// when the task returns or panics.
    pub fn try_start<T, F>(&self, task: F) -> io::Result<Option<TaskHandle<T>>>
    where
        T: Send + 'static,
        F: FnOnce(EventSink, CancelToken) -> T + Send + 'static,
    {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("upload already running; start request ignored");
            return Ok(None);
        }
        let guard = SlotGuard(Arc::clone(&self.active));
        spawn_task("stock-sync-upload", move |sink, cancel| {
            let _guard = guard;
            task(sink, cancel)
        })
        .map(Some)
    }
}
