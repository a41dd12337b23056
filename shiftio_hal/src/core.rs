//! HAL Core: composition root and flow supervisor.
//!
//! `HalCore` allocates one output/input buffer pair per expander, wires named
//! lines onto them, opens transports and latches through the selected backend
//! and spawns one refresh flow per expander on the [`IoExecutor`].

use shiftio_common::bits::BitBuffer;
use shiftio_common::config::ConfigLoader;
use shiftio_common::hal::config::HalConfig;
use shiftio_common::hal::driver::{HalError, IoBackend};
use shiftio_common::io::registry::{ExpanderBuffers, LineRegistry};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::executor::{FlowExit, FlowHandle, IoExecutor};
use crate::flow::{BusLock, FlowSpec, ShiftRegisterFlow, bus_lock};

/// HAL Core manages the backend, buffers and refresh flows.
pub struct HalCore {
    /// I/O configuration
    config: HalConfig,
    /// Buffers per expander name
    buffers: HashMap<String, ExpanderBuffers>,
    /// Named line table
    lines: LineRegistry,
    /// Active backend
    backend: Option<Box<dyn IoBackend>>,
    /// Initialized flows waiting for `start()`
    pending: Vec<ShiftRegisterFlow>,
    /// Spawned flows
    handles: Vec<FlowHandle>,
    /// Runtime hosting the flows
    executor: Option<IoExecutor>,
    /// Exit reports of flow tasks
    exit_tx: mpsc::UnboundedSender<FlowExit>,
    exit_rx: mpsc::UnboundedReceiver<FlowExit>,
}

impl HalCore {
    /// Create a new HalCore from a configuration.
    ///
    /// Allocates the expander buffers (filled with `initial_output`) and
    /// builds the line registry.
    ///
    /// # Errors
    /// Returns `ConfigError` if configuration or line wiring validation fails.
    pub fn new(config: HalConfig) -> Result<Self, HalError> {
        config.validate()?;

        let mut buffers = HashMap::with_capacity(config.expanders.len());
        for exp in &config.expanders {
            let output = exp.output_bytes.map(|len| {
                let buffer = BitBuffer::new(len);
                buffer.store_bytes(&exp.initial_output);
                buffer
            });
            let input = exp.input_bytes.map(BitBuffer::new);
            buffers.insert(exp.name.clone(), ExpanderBuffers { output, input });
        }

        let lines = LineRegistry::from_config(&config.lines, &buffers)
            .map_err(|e| HalError::ConfigError(e.to_string()))?;

        info!(
            "HalCore created: {} buses, {} expanders, {} output lines, {} input lines",
            config.buses.len(),
            config.expanders.len(),
            lines.output_count,
            lines.input_count
        );

        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            buffers,
            lines,
            backend: None,
            pending: Vec::new(),
            handles: Vec::new(),
            executor: None,
            exit_tx,
            exit_rx,
        })
    }

    /// Load the I/O configuration from a TOML file.
    ///
    /// Does not log: the binary calls this before tracing is installed.
    pub fn load_config(config_path: &Path) -> Result<HalConfig, HalError> {
        HalConfig::load(config_path).map_err(|e| HalError::ConfigError(e.to_string()))
    }

    /// Obtain latches and open transports for every expander.
    ///
    /// Expanders sharing a bus get one shared bus lock.
    ///
    /// # Errors
    /// `InitFailed` if any latch or transport cannot be set up. The process
    /// must not start in that case.
    pub fn init(&mut self, mut backend: Box<dyn IoBackend>) -> Result<(), HalError> {
        info!(
            "Initializing HalCore with backend {} v{}",
            backend.name(),
            backend.version()
        );

        let mut locks: HashMap<&str, BusLock> = HashMap::new();
        for bus in &self.config.buses {
            let users = self.config.expanders_on_bus(&bus.name);
            if users > 1 {
                debug!("Bus '{}' shared by {} expanders", bus.name, users);
                locks.insert(bus.name.as_str(), bus_lock());
            }
        }

        let mut flows = Vec::with_capacity(self.config.expanders.len());
        for exp in &self.config.expanders {
            let bus = self.config.bus(&exp.bus).ok_or_else(|| {
                HalError::ConfigError(format!("Expander '{}': unknown bus '{}'", exp.name, exp.bus))
            })?;
            let buffers = self.buffers.get(&exp.name).cloned().unwrap_or_default();

            let mut spec = FlowSpec::new(&exp.name, exp.period())
                .with_settle(exp.settle())
                .with_error_policy(exp.on_error);
            if let Some(output) = buffers.output {
                spec = spec.with_output(output);
            }
            if let Some(input) = buffers.input {
                spec = spec.with_input(input);
            }
            if let Some(lock) = locks.get(exp.bus.as_str()) {
                spec = spec.with_bus_lock(lock.clone());
            }

            let latch = backend.latch(bus, exp.latch_gpio).map_err(|e| {
                HalError::InitFailed(format!("Expander '{}': {e}", exp.name))
            })?;
            let mut flow = ShiftRegisterFlow::new(spec, latch);
            flow.init(|| backend.open_transport(bus)).map_err(|e| {
                HalError::InitFailed(format!(
                    "Expander '{}' on {}: {e}",
                    exp.name,
                    bus.device.display()
                ))
            })?;
            flows.push(flow);
        }

        self.pending = flows;
        self.backend = Some(backend);
        info!("HalCore initialized successfully");
        Ok(())
    }

    /// Spawn all initialized flows on a fresh I/O executor.
    pub fn start(&mut self) -> Result<(), HalError> {
        if self.backend.is_none() {
            return Err(HalError::InitFailed("Backend not initialized".to_string()));
        }
        if detect_rt_mode() {
            info!("Running in real-time mode");
        } else {
            info!("Running in standard (non-RT) mode");
        }

        let executor = IoExecutor::new()?;
        for flow in self.pending.drain(..) {
            info!(
                "Starting flow '{}' (period={}ms)",
                flow.name(),
                flow.period().as_millis()
            );
            self.handles.push(executor.spawn(flow, self.exit_tx.clone()));
        }
        self.executor = Some(executor);
        Ok(())
    }

    /// Supervise the flows until Ctrl-C or a halted flow.
    ///
    /// # Errors
    /// `FlowHalted` when a flow stopped on an unrecoverable error.
    pub fn run(&mut self) -> Result<(), HalError> {
        self.run_until(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received shutdown signal"),
                Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
            }
        })
    }

    /// Supervise the flows until `stop` completes or a flow ends.
    ///
    /// `stop` is polled on the I/O runtime, so timers and signals work inside it.
    ///
    /// # Errors
    /// `FlowHalted` when a flow stopped on an unrecoverable error.
    pub fn run_until<F>(&mut self, stop: F) -> Result<(), HalError>
    where
        F: Future<Output = ()>,
    {
        let executor = self
            .executor
            .as_ref()
            .ok_or_else(|| HalError::InitFailed("HalCore not started".to_string()))?;
        let exits = &mut self.exit_rx;

        let exit = executor.block_on(async {
            tokio::select! {
                () = stop => None,
                exit = exits.recv() => exit,
            }
        });

        match exit {
            Some(FlowExit {
                name,
                result: Err(e),
            }) => {
                error!("Flow '{}' halted: {}", name, e);
                Err(HalError::FlowHalted {
                    flow: name,
                    reason: e.to_string(),
                })
            }
            Some(FlowExit { name, result: Ok(()) }) => {
                warn!("Flow '{}' stopped", name);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Cancel all flows and release the backend.
    pub fn shutdown(&mut self) -> Result<(), HalError> {
        info!("Shutdown requested");
        for handle in self.handles.drain(..) {
            debug!("Aborting flow '{}'", handle.name());
            handle.abort();
        }
        // Dropping the runtime waits for aborted tasks to be dropped.
        self.executor = None;

        if let Some(backend) = self.backend.as_mut() {
            backend.shutdown()?;
        }
        Ok(())
    }

    /// Named lines.
    pub fn lines(&self) -> &LineRegistry {
        &self.lines
    }

    /// Buffers of expander `name`.
    pub fn buffers(&self, name: &str) -> Option<&ExpanderBuffers> {
        self.buffers.get(name)
    }

    /// Request an immediate refresh of expander `name`.
    ///
    /// Returns `false` if no such flow is running.
    pub fn trigger(&self, name: &str) -> bool {
        match self.handles.iter().find(|h| h.name() == name) {
            Some(handle) => {
                handle.trigger();
                true
            }
            None => false,
        }
    }

    /// Names of the running flows.
    pub fn flow_names(&self) -> Vec<&str> {
        self.handles.iter().map(FlowHandle::name).collect()
    }
}

/// Detect if running in real-time mode by checking scheduler policy.
fn detect_rt_mode() -> bool {
    #[cfg(target_os = "linux")]
    {
        use libc::{SCHED_FIFO, SCHED_RR, sched_getscheduler};
        // SAFETY: sched_getscheduler(0) only queries the calling process.
        let policy = unsafe { sched_getscheduler(0) };
        policy == SCHED_FIFO || policy == SCHED_RR
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}
