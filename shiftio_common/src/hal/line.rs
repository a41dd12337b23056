//! Line and transport interfaces.
//!
//! - [`LatchLine`] - settable/clearable single-bit output driving a latch
//! - [`ByteTransport`] - blocking byte device (SPI character device)
//! - [`DigitalLine`] - bit-readable/bit-writable line handed to higher layers

use std::io::{self, Read, Write};

/// Single-bit output line operating the latch of a shift-register chain.
///
/// `set()` drives the line high (active), `clear()` drives it low
/// (idle/load). There are no other states.
pub trait LatchLine: Send {
    /// Drive the line high.
    fn set(&mut self) -> io::Result<()>;

    /// Drive the line low.
    fn clear(&mut self) -> io::Result<()>;
}

/// Blocking byte-oriented serial transport.
///
/// `write` and `read` return the number of bytes transferred; the caller
/// decides whether a short transfer is acceptable. Bytes travel in
/// address-increasing order of the supplied buffer.
///
/// Implemented for every `Read + Write + Send` type, so a `std::fs::File`
/// opened on `/dev/spidevB.C` is a transport as-is.
pub trait ByteTransport: Read + Write + Send {}

impl<T: Read + Write + Send> ByteTransport for T {}

/// One digital I/O line as seen by higher layers.
///
/// `true` always means "active", independent of wiring polarity.
pub trait DigitalLine: Send + Sync {
    /// Current logical value.
    fn read(&self) -> bool;

    /// Store a logical value.
    fn write(&self, active: bool);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn assert_transport<T: ByteTransport>(_: &T) {}

    #[test]
    fn cursor_is_a_transport() {
        let mut cursor = Cursor::new(vec![0u8; 4]);
        assert_transport(&cursor);

        let transport: &mut dyn ByteTransport = &mut cursor;
        assert_eq!(transport.write(&[1, 2]).unwrap(), 2);
    }
}
