//! The handler's single-threaded scheduler.
//!
//! One worker thread serializes all self-driven work: the periodic tick
//! (state check, enforcement, signing retry) and the zero-delay tasks other
//! threads enqueue through the handler's task channel. A single consumer
//! means enforcement never runs reentrantly and never on a thread that may
//! hold the chain lock.

use blocklocks_core::Task;
use blocklocks_handler::BlockLockHandler;
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

/// The scheduler worker driving a [`BlockLockHandler`].
pub struct Scheduler {
    stop_tx: Sender<()>,
    worker: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn the worker. `tasks` is the receiving end of the channel the
    /// handler enqueues into; `tick_interval` drives the periodic pass.
    pub fn start(
        handler: Arc<BlockLockHandler>,
        tasks: Receiver<Task>,
        tick_interval: Duration,
    ) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let worker = std::thread::Builder::new()
            .name("blocklocks-sched".into())
            .spawn(move || {
                let ticker = tick(tick_interval);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => handler.run_tick(),
                        recv(tasks) -> msg => match msg {
                            Ok(task) => handler.run_task(task),
                            Err(_) => break,
                        },
                    }
                }
                debug!("scheduler worker exiting");
            })
            .expect("failed to spawn scheduler thread");

        Self {
            stop_tx,
            worker: Some(worker),
        }
    }

    /// Stop the worker and join it. Tasks already being processed finish;
    /// queued tasks are dropped.
    pub fn stop(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
