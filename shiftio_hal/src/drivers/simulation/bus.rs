//! Simulated SPI buses with 74x595 output and 74x165 input chains.
//!
//! Model per bus:
//! - every byte written is shifted into the bus and, for chips whose latch is
//!   low, clocks a parallel load of the 74x165 input pins;
//! - a rising latch edge presents the bytes shifted since the previous edge on
//!   the 74x595 outputs of that chip and arms its loaded inputs for shift-out;
//! - reads shift out the armed input bytes, then zeros.

use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use shiftio_common::hal::line::LatchLine;
use tracing::trace;

/// One latch line and the register chains behind it.
#[derive(Debug, Default)]
struct ChipState {
    latch_high: bool,
    presented: Vec<u8>,
    pins: Vec<u8>,
    loaded: Vec<u8>,
    rising_edges: u64,
}

/// Fault injection switches.
#[derive(Debug, Default, Clone, Copy)]
struct Faults {
    fail_open: bool,
    short_write: bool,
    short_read: bool,
}

#[derive(Debug, Default)]
struct BusState {
    shifted: Vec<u8>,
    shift_out: VecDeque<u8>,
    chips: HashMap<u32, ChipState>,
    faults: Faults,
    bytes_written: u64,
}

/// Shared state of all simulated buses, keyed by device path.
///
/// Cloning yields another handle to the same state; tests keep one to drive
/// input pins and observe outputs while the flows run.
#[derive(Debug, Clone, Default)]
pub struct SimWorld {
    buses: Arc<Mutex<HashMap<PathBuf, BusState>>>,
}

impl SimWorld {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_bus<R>(&self, device: &Path, f: impl FnOnce(&mut BusState) -> R) -> R {
        let mut buses = self.buses.lock();
        f(buses.entry(device.to_path_buf()).or_default())
    }

    fn with_chip<R>(&self, device: &Path, gpio: u32, f: impl FnOnce(&mut ChipState) -> R) -> R {
        self.with_bus(device, |bus| f(bus.chips.entry(gpio).or_default()))
    }

    /// Bytes currently presented on the output pins of chip `gpio`.
    ///
    /// `None` until the first rising latch edge.
    pub fn outputs(&self, device: impl AsRef<Path>, gpio: u32) -> Option<Vec<u8>> {
        let buses = self.buses.lock();
        let chip = buses.get(device.as_ref())?.chips.get(&gpio)?;
        (chip.rising_edges > 0).then(|| chip.presented.clone())
    }

    /// Drive the parallel input pins of chip `gpio`, address-increasing.
    pub fn set_inputs(&self, device: impl AsRef<Path>, gpio: u32, pins: &[u8]) {
        self.with_chip(device.as_ref(), gpio, |chip| chip.pins = pins.to_vec());
    }

    /// Number of rising latch edges seen by chip `gpio`.
    pub fn latch_edges(&self, device: impl AsRef<Path>, gpio: u32) -> u64 {
        let buses = self.buses.lock();
        buses
            .get(device.as_ref())
            .and_then(|bus| bus.chips.get(&gpio))
            .map_or(0, |chip| chip.rising_edges)
    }

    /// True while the latch of chip `gpio` is high.
    pub fn latch_is_high(&self, device: impl AsRef<Path>, gpio: u32) -> bool {
        let buses = self.buses.lock();
        buses
            .get(device.as_ref())
            .and_then(|bus| bus.chips.get(&gpio))
            .is_some_and(|chip| chip.latch_high)
    }

    /// Total bytes written on `device`.
    pub fn bytes_written(&self, device: impl AsRef<Path>) -> u64 {
        let buses = self.buses.lock();
        buses.get(device.as_ref()).map_or(0, |bus| bus.bytes_written)
    }

    /// Make `open_transport` fail for `device`.
    pub fn fail_open(&self, device: impl AsRef<Path>) {
        self.with_bus(device.as_ref(), |bus| bus.faults.fail_open = true);
    }

    /// Make writes on `device` accept one byte less than requested.
    pub fn inject_short_write(&self, device: impl AsRef<Path>, enabled: bool) {
        self.with_bus(device.as_ref(), |bus| bus.faults.short_write = enabled);
    }

    /// Make reads on `device` return one byte less than requested.
    pub fn inject_short_read(&self, device: impl AsRef<Path>, enabled: bool) {
        self.with_bus(device.as_ref(), |bus| bus.faults.short_read = enabled);
    }

    /// Open a transport handle on `device`.
    pub(crate) fn open(&self, device: &Path) -> io::Result<SimTransport> {
        let fail = self.with_bus(device, |bus| bus.faults.fail_open);
        if fail {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("simulated open failure on {}", device.display()),
            ));
        }
        Ok(SimTransport {
            world: self.clone(),
            device: device.to_path_buf(),
        })
    }

    /// Create the latch of chip `gpio` on `device`, driven low.
    pub(crate) fn latch(&self, device: &Path, gpio: u32) -> SimLatch {
        self.with_chip(device, gpio, |chip| chip.latch_high = false);
        SimLatch {
            world: self.clone(),
            device: device.to_path_buf(),
            gpio,
        }
    }
}

/// Byte transport on a simulated bus.
#[derive(Debug)]
pub struct SimTransport {
    world: SimWorld,
    device: PathBuf,
}

impl Write for SimTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.world.with_bus(&self.device, |bus| {
            let accepted = if bus.faults.short_write {
                buf.len().saturating_sub(1)
            } else {
                buf.len()
            };
            bus.shifted.extend_from_slice(&buf[..accepted]);
            bus.bytes_written += accepted as u64;
            if accepted > 0 {
                for chip in bus.chips.values_mut().filter(|c| !c.latch_high) {
                    chip.loaded.clone_from(&chip.pins);
                }
            }
            trace!(device = %self.device.display(), "sim write {:02X?}", &buf[..accepted]);
            Ok(accepted)
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for SimTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.world.with_bus(&self.device, |bus| {
            let n = if bus.faults.short_read {
                buf.len().saturating_sub(1)
            } else {
                buf.len()
            };
            for byte in &mut buf[..n] {
                *byte = bus.shift_out.pop_front().unwrap_or(0);
            }
            Ok(n)
        })
    }
}

/// Latch line of one simulated chip.
#[derive(Debug)]
pub struct SimLatch {
    world: SimWorld,
    device: PathBuf,
    gpio: u32,
}

impl LatchLine for SimLatch {
    fn set(&mut self) -> io::Result<()> {
        let gpio = self.gpio;
        self.world.with_bus(&self.device, |bus| {
            let chip = bus.chips.entry(gpio).or_default();
            if chip.latch_high {
                return;
            }
            chip.latch_high = true;
            chip.rising_edges += 1;
            if !bus.shifted.is_empty() {
                chip.presented = mem::take(&mut bus.shifted);
            }
            bus.shift_out = chip.loaded.iter().copied().collect();
        });
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        self.world
            .with_chip(&self.device, self.gpio, |chip| chip.latch_high = false);
        Ok(())
    }
}
