//! Recording fakes for latch lines and byte transports.

#![allow(dead_code)]

use parking_lot::Mutex;
use shiftio_common::hal::line::{ByteTransport, LatchLine};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

/// One observed bus operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    LatchHigh,
    LatchLow,
    Write(Vec<u8>),
    Read(usize),
}

/// Operation tagged with the flow that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub who: &'static str,
    pub op: Op,
}

/// Shared, ordered log of bus operations.
#[derive(Debug, Clone, Default)]
pub struct BusLog(Arc<Mutex<Vec<Event>>>);

impl BusLog {
    pub fn push(&self, who: &'static str, op: Op) {
        self.0.lock().push(Event { who, op });
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().clone()
    }

    pub fn ops(&self, who: &'static str) -> Vec<Op> {
        self.0
            .lock()
            .iter()
            .filter(|e| e.who == who)
            .map(|e| e.op.clone())
            .collect()
    }

    pub fn count(&self, who: &'static str, pred: impl Fn(&Op) -> bool) -> usize {
        self.0
            .lock()
            .iter()
            .filter(|e| e.who == who && pred(&e.op))
            .count()
    }

    pub fn writes(&self, who: &'static str) -> Vec<Vec<u8>> {
        self.ops(who)
            .into_iter()
            .filter_map(|op| match op {
                Op::Write(bytes) => Some(bytes),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

pub struct RecordingLatch {
    who: &'static str,
    log: BusLog,
}

impl RecordingLatch {
    pub fn boxed(who: &'static str, log: &BusLog) -> Box<dyn LatchLine> {
        Box::new(Self {
            who,
            log: log.clone(),
        })
    }
}

impl LatchLine for RecordingLatch {
    fn set(&mut self) -> io::Result<()> {
        self.log.push(self.who, Op::LatchHigh);
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        self.log.push(self.who, Op::LatchLow);
        Ok(())
    }
}

/// Transport fake: records every call, echoes written bytes back on reads
/// (then zeros), with optional short transfers and slow writes.
pub struct FakeTransport {
    who: &'static str,
    log: BusLog,
    echo: VecDeque<u8>,
    /// Bytes accepted per write call, `None` for all.
    pub write_limit: Option<usize>,
    /// Bytes returned per read call, `None` for all.
    pub read_limit: Option<usize>,
    /// Number of initial writes that fail with a short count.
    pub failing_writes: usize,
    /// Blocking delay inside each write.
    pub write_delay: Duration,
    /// Fixed byte returned by reads instead of the echo.
    pub read_value: Option<u8>,
}

impl FakeTransport {
    pub fn new(who: &'static str, log: &BusLog) -> Self {
        Self {
            who,
            log: log.clone(),
            echo: VecDeque::new(),
            write_limit: None,
            read_limit: None,
            failing_writes: 0,
            write_delay: Duration::ZERO,
            read_value: None,
        }
    }

    pub fn boxed(self) -> Box<dyn ByteTransport> {
        Box::new(self)
    }
}

impl Write for FakeTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.write_delay.is_zero() {
            std::thread::sleep(self.write_delay);
        }
        let mut n = self.write_limit.map_or(buf.len(), |l| l.min(buf.len()));
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            n = buf.len().saturating_sub(1);
        }
        self.log.push(self.who, Op::Write(buf[..n].to_vec()));
        self.echo.extend(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for FakeTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.read_limit.map_or(buf.len(), |l| l.min(buf.len()));
        for byte in &mut buf[..n] {
            *byte = match self.read_value {
                Some(v) => v,
                None => self.echo.pop_front().unwrap_or(0),
            };
        }
        self.echo.clear();
        self.log.push(self.who, Op::Read(n));
        Ok(n)
    }
}
