//! Dedicated execution context for blocking bus I/O.
//!
//! Refresh flows block on transport reads/writes and settle delays. They run
//! on a private tokio runtime with a single worker thread (`io_thread`) so
//! that no other task ever shares a thread with them.

use std::future::Future;

use shiftio_common::consts::IO_THREAD_NAME;
use shiftio_common::hal::driver::HalError;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::flow::{FlowError, FlowTrigger, ShiftRegisterFlow};

/// Final result of a flow task, reported to the supervisor.
#[derive(Debug)]
pub struct FlowExit {
    /// Flow name.
    pub name: String,
    /// What `ShiftRegisterFlow::run` returned.
    pub result: Result<(), FlowError>,
}

/// Handle of a flow spawned on the [`IoExecutor`].
#[derive(Debug)]
pub struct FlowHandle {
    name: String,
    trigger: FlowTrigger,
    join: JoinHandle<()>,
}

impl FlowHandle {
    /// Flow name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request an immediate refresh.
    pub fn trigger(&self) {
        self.trigger.trigger();
    }

    /// Cancel the flow task at its next suspension point.
    pub fn abort(&self) {
        self.join.abort();
    }
}

/// Single-threaded I/O runtime hosting all refresh flows.
pub struct IoExecutor {
    runtime: Runtime,
}

impl IoExecutor {
    /// Build the runtime with one worker thread named `io_thread`.
    pub fn new() -> Result<Self, HalError> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name(IO_THREAD_NAME)
            .enable_all()
            .build()
            .map_err(|e| HalError::InitFailed(format!("I/O executor: {e}")))?;
        debug!("I/O executor started ({})", IO_THREAD_NAME);
        Ok(Self { runtime })
    }

    /// Spawn `flow` on the I/O thread. Its final result is sent on `exits`.
    pub fn spawn(
        &self,
        flow: ShiftRegisterFlow,
        exits: mpsc::UnboundedSender<FlowExit>,
    ) -> FlowHandle {
        let name = flow.name().to_string();
        let trigger = flow.trigger_handle();
        let task_name = name.clone();
        let join = self.runtime.spawn(async move {
            let result = flow.run().await;
            // Receiver gone means the supervisor is shutting down.
            let _ = exits.send(FlowExit {
                name: task_name,
                result,
            });
        });
        FlowHandle {
            name,
            trigger,
            join,
        }
    }

    /// Drive `future` to completion on the calling thread.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
