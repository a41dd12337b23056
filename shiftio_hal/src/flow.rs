//! Shift-register refresh flow.
//!
//! A [`ShiftRegisterFlow`] periodically mirrors bit buffers to and from
//! daisy-chained shift registers through a byte transport and one latch line.
//! There is no limit on the number of chained registers. Output and input
//! registers use independent daisy chains; a chip select is not needed, the
//! latch edge makes the registers ignore unrelated transfers.
//!
//! The latch is expected to behave like the 74x595 / 74x165 families: output
//! registers present their data on the low-to-high edge, input registers load
//! in parallel on clocks while low and shift out while high.
//!
//! One refresh cycle:
//!
//! ```text
//!  wait(period | trigger) -> lock bus -> latch low -> write outputs
//!     (or filler byte + latch low) -> settle -> latch high -> read inputs
//!     -> settle -> latch low -> unlock -> commit inputs
//! ```
//!
//! Transport calls block. Flows must run on the dedicated
//! [`IoExecutor`](crate::executor::IoExecutor), never next to
//! latency-sensitive tasks.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use shiftio_common::bits::BitBuffer;
use shiftio_common::consts::STATS_LOG_INTERVAL;
use shiftio_common::hal::config::ErrorPolicy;
use shiftio_common::hal::consts::{DEFAULT_PERIOD_MS, DEFAULT_SETTLE, FILLER_BYTE};
use shiftio_common::hal::line::{ByteTransport, LatchLine};
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error, info, trace, warn};

/// Async mutex serializing flows that share one physical bus.
pub type BusLock = Arc<Mutex<()>>;

/// Create a new bus lock.
pub fn bus_lock() -> BusLock {
    Arc::new(Mutex::new(()))
}

/// Errors of a refresh flow.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Transport accepted fewer bytes than the output chain holds.
    #[error("short write: {actual} of {expected} bytes")]
    ShortWrite {
        /// Bytes requested.
        expected: usize,
        /// Bytes written.
        actual: usize,
    },

    /// Transport returned fewer bytes than the input chain holds.
    #[error("short read: {actual} of {expected} bytes")]
    ShortRead {
        /// Bytes requested.
        expected: usize,
        /// Bytes read.
        actual: usize,
    },

    /// Transport I/O failure.
    #[error("transport I/O error: {0}")]
    Io(#[source] io::Error),

    /// Latch line could not be driven.
    #[error("latch line error: {0}")]
    Latch(#[source] io::Error),

    /// Transport device could not be opened.
    #[error("failed to open transport: {0}")]
    Open(#[source] io::Error),

    /// Buffer storage not aligned to a word boundary.
    #[error("{0} buffer is not word-aligned")]
    Misaligned(&'static str),

    /// Cycle requested before `init()`.
    #[error("flow is not initialized")]
    NotInitialized,
}

/// Static configuration of a refresh flow.
#[derive(Debug, Clone)]
pub struct FlowSpec {
    /// Flow name (expander name) used in logs.
    pub name: String,
    /// Delay between consecutive refreshes.
    pub period: Duration,
    /// Settling delay before and after the latch edge.
    pub settle: Duration,
    /// Output chain image. `None`: no output registers are operated.
    pub output: Option<BitBuffer>,
    /// Input chain image. `None`: no input registers are operated.
    pub input: Option<BitBuffer>,
    /// Lock shared with other flows on the same bus.
    pub bus_lock: Option<BusLock>,
    /// Reaction to failed cycles.
    pub on_error: ErrorPolicy,
}

impl FlowSpec {
    /// No buffers, no lock, default settle delay, `Halt` policy.
    pub fn new(name: impl Into<String>, period: Duration) -> Self {
        Self {
            name: name.into(),
            period,
            settle: DEFAULT_SETTLE,
            output: None,
            input: None,
            bus_lock: None,
            on_error: ErrorPolicy::Halt,
        }
    }

    /// Operate an output chain mirroring `buffer`.
    pub fn with_output(mut self, buffer: BitBuffer) -> Self {
        self.output = Some(buffer);
        self
    }

    /// Operate an input chain sampled into `buffer`.
    pub fn with_input(mut self, buffer: BitBuffer) -> Self {
        self.input = Some(buffer);
        self
    }

    /// Acquire `lock` around every bus access.
    pub fn with_bus_lock(mut self, lock: BusLock) -> Self {
        self.bus_lock = Some(lock);
        self
    }

    /// Override the settling delay.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Override the error policy.
    pub fn with_error_policy(mut self, on_error: ErrorPolicy) -> Self {
        self.on_error = on_error;
        self
    }
}

impl Default for FlowSpec {
    fn default() -> Self {
        Self::new("flow", Duration::from_millis(DEFAULT_PERIOD_MS))
    }
}

/// Handle requesting an immediate refresh of one flow.
///
/// Fire-and-forget: requests made while a refresh is pending collapse into
/// one, and no completion is reported.
#[derive(Debug, Clone, Default)]
pub struct FlowTrigger {
    notify: Arc<Notify>,
}

impl FlowTrigger {
    /// Run the next refresh cycle now instead of waiting for the period.
    pub fn trigger(&self) {
        self.notify.notify_one();
    }
}

/// Timing statistics of a refresh flow.
#[derive(Debug, Default, Clone)]
pub struct FlowStats {
    /// Number of cycles executed (successful or not)
    pub cycle_count: u64,
    /// Number of failed cycles
    pub error_count: u64,
    /// Maximum observed bus hold time
    pub max_cycle_time_us: u64,
    /// Sum of bus hold times for average calculation
    pub total_cycle_time_us: u64,
}

impl FlowStats {
    fn record(&mut self, elapsed: Duration, ok: bool) {
        let us = elapsed.as_micros() as u64;
        self.cycle_count += 1;
        self.total_cycle_time_us += us;
        self.max_cycle_time_us = self.max_cycle_time_us.max(us);
        if !ok {
            self.error_count += 1;
        }
    }

    /// Average bus hold time in microseconds.
    pub fn avg_cycle_time_us(&self) -> u64 {
        self.total_cycle_time_us
            .checked_div(self.cycle_count)
            .unwrap_or(0)
    }
}

/// Periodic refresh of one latch + transport pair.
pub struct ShiftRegisterFlow {
    name: String,
    period: Duration,
    settle: Duration,
    output: Option<BitBuffer>,
    input: Option<BitBuffer>,
    bus_lock: Option<BusLock>,
    on_error: ErrorPolicy,
    latch: Box<dyn LatchLine>,
    transport: Option<Box<dyn ByteTransport>>,
    trigger: FlowTrigger,
    out_scratch: Vec<u8>,
    in_scratch: Vec<u8>,
    stats: FlowStats,
}

impl ShiftRegisterFlow {
    /// Create a flow. The transport is opened later by [`init`](Self::init).
    pub fn new(spec: FlowSpec, latch: Box<dyn LatchLine>) -> Self {
        let out_len = spec.output.as_ref().map_or(0, BitBuffer::len_bytes);
        let in_len = spec.input.as_ref().map_or(0, BitBuffer::len_bytes);
        Self {
            name: spec.name,
            period: spec.period,
            settle: spec.settle,
            output: spec.output,
            input: spec.input,
            bus_lock: spec.bus_lock,
            on_error: spec.on_error,
            latch,
            transport: None,
            trigger: FlowTrigger::default(),
            out_scratch: vec![0; out_len],
            in_scratch: vec![0; in_len],
            stats: FlowStats::default(),
        }
    }

    /// Check buffer alignment and open the transport.
    ///
    /// # Errors
    /// `Misaligned` or `Open`. Both are startup failures; the caller must not
    /// continue with a half-initialized flow.
    pub fn init<F>(&mut self, open: F) -> Result<(), FlowError>
    where
        F: FnOnce() -> io::Result<Box<dyn ByteTransport>>,
    {
        for (which, buffer) in [("output", &self.output), ("input", &self.input)] {
            if buffer.as_ref().is_some_and(|b| !b.is_word_aligned()) {
                return Err(FlowError::Misaligned(which));
            }
        }

        self.transport = Some(open().map_err(FlowError::Open)?);
        info!(
            flow = %self.name,
            output_bytes = self.out_scratch.len(),
            input_bytes = self.in_scratch.len(),
            period_ms = self.period.as_millis() as u64,
            shared_bus = self.bus_lock.is_some(),
            "Refresh flow initialized"
        );
        Ok(())
    }

    /// Flow name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Refresh period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// True once `init()` succeeded.
    pub fn is_initialized(&self) -> bool {
        self.transport.is_some()
    }

    /// Handle for early refresh requests.
    pub fn trigger_handle(&self) -> FlowTrigger {
        self.trigger.clone()
    }

    /// Timing statistics.
    pub fn stats(&self) -> &FlowStats {
        &self.stats
    }

    /// Run refresh cycles until the error policy gives up.
    ///
    /// Never returns `Ok` on its own; there is no stop protocol. The owner
    /// cancels the task at process shutdown.
    pub async fn run(mut self) -> Result<(), FlowError> {
        if !self.is_initialized() {
            return Err(FlowError::NotInitialized);
        }

        let notify = Arc::clone(&self.trigger.notify);
        let mut consecutive_errors = 0u32;
        debug!(flow = %self.name, "Refresh loop started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.period) => {}
                _ = notify.notified() => trace!(flow = %self.name, "Early refresh"),
            }

            match self.run_cycle().await {
                Ok(()) => {
                    consecutive_errors = 0;
                    if self.stats.cycle_count % STATS_LOG_INTERVAL == 0 {
                        debug!(
                            flow = %self.name,
                            "{} cycles, avg={}us, max={}us, errors={}",
                            self.stats.cycle_count,
                            self.stats.avg_cycle_time_us(),
                            self.stats.max_cycle_time_us,
                            self.stats.error_count
                        );
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    match self.on_error {
                        ErrorPolicy::Retry(max) if consecutive_errors <= max => {
                            warn!(
                                flow = %self.name,
                                "Refresh failed ({}/{}): {}",
                                consecutive_errors, max, e
                            );
                        }
                        _ => {
                            error!(flow = %self.name, "Refresh halted: {}", e);
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// Execute one refresh cycle now: lock, exchange, unlock.
    ///
    /// On failure the latch is driven back to idle (best effort), the lock is
    /// released and the input buffer keeps its previous contents.
    pub async fn run_cycle(&mut self) -> Result<(), FlowError> {
        if !self.is_initialized() {
            return Err(FlowError::NotInitialized);
        }

        let lock = self.bus_lock.clone();
        let guard = match lock {
            Some(lock) => Some(lock.lock_owned().await),
            None => None,
        };

        let started = Instant::now();
        let result = self.exchange();
        if result.is_err() {
            if let Err(e) = self.latch.clear() {
                warn!(flow = %self.name, "Failed to idle latch after error: {}", e);
            }
        }
        drop(guard);

        self.stats.record(started.elapsed(), result.is_ok());
        trace!(flow = %self.name, ok = result.is_ok(), "Cycle {}", self.stats.cycle_count);
        result
    }

    /// Latch/transfer sequence. Runs with the bus lock held and never yields.
    fn exchange(&mut self) -> Result<(), FlowError> {
        let transport = self.transport.as_mut().ok_or(FlowError::NotInitialized)?;

        self.latch.clear().map_err(FlowError::Latch)?;

        if let Some(output) = &self.output {
            let expected = output.load_bytes(&mut self.out_scratch);
            let written = transport
                .write(&self.out_scratch[..expected])
                .map_err(FlowError::Io)?;
            if written != expected {
                return Err(FlowError::ShortWrite {
                    expected,
                    actual: written,
                });
            }
        } else if self.input.is_some() {
            // Input chains need clocks while the latch is low to load.
            transport.write(&[FILLER_BYTE]).map_err(FlowError::Io)?;
            self.latch.clear().map_err(FlowError::Latch)?;
        }

        settle(self.settle);
        self.latch.set().map_err(FlowError::Latch)?;

        if self.input.is_some() {
            let expected = self.in_scratch.len();
            let read = transport
                .read(&mut self.in_scratch)
                .map_err(FlowError::Io)?;
            if read != expected {
                return Err(FlowError::ShortRead {
                    expected,
                    actual: read,
                });
            }
        }

        settle(self.settle);
        self.latch.clear().map_err(FlowError::Latch)?;

        if let Some(input) = &self.input {
            input.store_bytes(&self.in_scratch);
        }
        Ok(())
    }
}

/// Blocking settle delay around the latch edge.
#[inline]
fn settle(delay: Duration) {
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read, Write};

    struct NullLatch;

    impl LatchLine for NullLatch {
        fn set(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn clear(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Accepts writes, answers reads with a fixed byte.
    struct ConstTransport(u8);

    impl Read for ConstTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            buf.fill(self.0);
            Ok(buf.len())
        }
    }

    impl Write for ConstTransport {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn spec_builder_defaults() {
        let spec = FlowSpec::new("outputs", Duration::from_millis(20));
        assert_eq!(spec.settle, DEFAULT_SETTLE);
        assert_eq!(spec.on_error, ErrorPolicy::Halt);
        assert!(spec.output.is_none() && spec.input.is_none() && spec.bus_lock.is_none());

        let spec = spec
            .with_output(BitBuffer::new(2))
            .with_error_policy(ErrorPolicy::Retry(3))
            .with_settle(Duration::ZERO);
        assert_eq!(spec.output.as_ref().map(BitBuffer::len_bytes), Some(2));
        assert_eq!(spec.on_error, ErrorPolicy::Retry(3));
        assert!(spec.settle.is_zero());
    }

    #[tokio::test]
    async fn cycle_before_init_is_rejected() {
        let mut flow = ShiftRegisterFlow::new(FlowSpec::default(), Box::new(NullLatch));
        assert!(matches!(
            flow.run_cycle().await,
            Err(FlowError::NotInitialized)
        ));
        assert!(matches!(flow.run().await, Err(FlowError::NotInitialized)));
    }

    #[test]
    fn open_failure_is_reported() {
        let mut flow = ShiftRegisterFlow::new(FlowSpec::default(), Box::new(NullLatch));
        let err = flow
            .init(|| Err(io::Error::new(io::ErrorKind::NotFound, "no spidev")))
            .unwrap_err();
        assert!(matches!(err, FlowError::Open(_)));
        assert!(!flow.is_initialized());
    }

    #[tokio::test]
    async fn input_bytes_are_committed() {
        let input = BitBuffer::new(2);
        let spec = FlowSpec::default().with_input(input.clone());
        let mut flow = ShiftRegisterFlow::new(spec, Box::new(NullLatch));
        flow.init(|| Ok(Box::new(ConstTransport(0x3C)) as Box<dyn ByteTransport>))
            .unwrap();

        flow.run_cycle().await.unwrap();
        assert_eq!(input.to_bytes(), vec![0x3C, 0x3C]);
        assert_eq!(flow.stats().cycle_count, 1);
        assert_eq!(flow.stats().error_count, 0);
    }

    #[tokio::test]
    async fn no_buffers_is_legal() {
        let mut flow = ShiftRegisterFlow::new(FlowSpec::default(), Box::new(NullLatch));
        flow.init(|| Ok(Box::new(Cursor::new(Vec::<u8>::new())) as Box<dyn ByteTransport>))
            .unwrap();
        flow.run_cycle().await.unwrap();
    }

    #[test]
    fn stats_average() {
        let mut stats = FlowStats::default();
        assert_eq!(stats.avg_cycle_time_us(), 0);
        stats.record(Duration::from_micros(10), true);
        stats.record(Duration::from_micros(30), false);
        assert_eq!(stats.avg_cycle_time_us(), 20);
        assert_eq!(stats.max_cycle_time_us, 30);
        assert_eq!(stats.error_count, 1);
    }
}
