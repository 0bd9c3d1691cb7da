//! Service lifecycle: wiring the handler to its scheduler and the signing
//! service's listener registry.

use crate::scheduler::Scheduler;
use blocklocks_core::{RecoveredSigListener, SigningService, Task};
use blocklocks_handler::{BlockLockHandler, HandlerConfig, HandlerHosts, SCHED_TICK};
use crossbeam_channel::{unbounded, Receiver};
use std::sync::Arc;
use std::time::Duration;

/// Owns the block lock handler and its scheduler worker.
///
/// Construction wires the handler; [`BlockLockService::start`] registers the
/// recovered-signature listener and spawns the scheduler. [`stop`] reverses
/// that: the scheduler is stopped and joined first, then the listener is
/// unregistered.
///
/// [`stop`]: BlockLockService::stop
pub struct BlockLockService {
    handler: Arc<BlockLockHandler>,
    signer: Arc<dyn SigningService>,
    scheduler: Option<Scheduler>,
    tasks: Option<Receiver<Task>>,
}

impl BlockLockService {
    /// Build the service. Nothing runs until [`BlockLockService::start`].
    pub fn new(hosts: HandlerHosts, config: HandlerConfig) -> Self {
        let (task_tx, task_rx) = unbounded();
        let signer = hosts.signer.clone();
        let handler = Arc::new(BlockLockHandler::new(hosts, config, task_tx));
        Self {
            handler,
            signer,
            scheduler: None,
            tasks: Some(task_rx),
        }
    }

    /// Start the scheduler at the standard tick interval.
    pub fn start(&mut self) {
        self.start_with_tick(SCHED_TICK);
    }

    /// Start the scheduler with a custom tick interval.
    pub fn start_with_tick(&mut self, tick: Duration) {
        let Some(tasks) = self.tasks.take() else {
            // already started (or stopped); a service runs once
            return;
        };
        self.signer
            .register_listener(self.handler.clone() as Arc<dyn RecoveredSigListener>);
        self.scheduler = Some(Scheduler::start(self.handler.clone(), tasks, tick));
    }

    /// Stop the scheduler, join its worker, and unregister from the signing
    /// service. In-flight work completes; queued tasks are dropped.
    pub fn stop(&mut self) {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
        let listener = self.handler.clone() as Arc<dyn RecoveredSigListener>;
        self.signer.unregister_listener(&listener);
    }

    /// The handler, for queries and notification fan-in.
    pub fn handler(&self) -> &Arc<BlockLockHandler> {
        &self.handler
    }
}

impl Drop for BlockLockService {
    fn drop(&mut self) {
        self.stop();
    }
}
