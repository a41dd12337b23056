//! Word-aligned shared bit buffers and bit-addressable registers.
//!
//! A [`BitBuffer`] is the bit vector mirrored to and from a shift-register
//! chain. It is stored as `AtomicU32` words, so it is always aligned to a word
//! boundary and every bit update is a single atomic read-modify-write on the
//! containing word.
//!
//! ## Layout
//!
//! Bit `n` lives in byte `n / 8` at position `n % 8`.
//! Byte `k` lives in word `k / 4` at bit offset `8 * (k % 4)`.
//! Bytes are serialized in address-increasing order: byte 0 is the first byte
//! put on the wire. On little-endian targets this equals the native memory
//! layout of the words.
//!
//! A [`BitRegister`] is a view of exactly one bit, exposed to higher layers as
//! an independent [`DigitalLine`](crate::hal::line::DigitalLine).

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use static_assertions::const_assert_eq;
use thiserror::Error;

use crate::hal::line::DigitalLine;

/// Storage word of a [`BitBuffer`].
pub type Word = u32;

/// Bytes per storage word.
pub const WORD_BYTES: usize = std::mem::size_of::<Word>();

/// Bits per storage word.
pub const WORD_BITS: usize = WORD_BYTES * 8;

const_assert_eq!(std::mem::size_of::<AtomicU32>(), WORD_BYTES);
const_assert_eq!(std::mem::align_of::<AtomicU32>(), WORD_BYTES);

/// Bit index outside of the buffer it should address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("bit index {index} out of range (buffer holds {len_bits} bits)")]
pub struct BitIndexError {
    /// Requested bit index.
    pub index: usize,
    /// Number of addressable bits in the buffer.
    pub len_bits: usize,
}

/// Shared, word-aligned bit vector of a fixed byte length.
///
/// Cloning is cheap and yields another handle to the same storage.
#[derive(Clone)]
pub struct BitBuffer {
    words: Arc<[AtomicU32]>,
    len_bytes: usize,
}

impl BitBuffer {
    /// Create a zeroed buffer holding `len_bytes` bytes.
    pub fn new(len_bytes: usize) -> Self {
        let word_count = len_bytes.div_ceil(WORD_BYTES);
        let words: Arc<[AtomicU32]> = (0..word_count).map(|_| AtomicU32::new(0)).collect();
        Self { words, len_bytes }
    }

    /// Create a buffer initialized from `bytes` (address-increasing order).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let buffer = Self::new(bytes.len());
        buffer.store_bytes(bytes);
        buffer
    }

    /// Length in bytes (number of daisy-chained 8-bit registers).
    #[inline]
    pub fn len_bytes(&self) -> usize {
        self.len_bytes
    }

    /// Number of addressable bits.
    #[inline]
    pub fn len_bits(&self) -> usize {
        self.len_bytes * 8
    }

    /// True if the buffer holds no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len_bytes == 0
    }

    /// True if the storage starts on a word boundary.
    pub fn is_word_aligned(&self) -> bool {
        (self.words.as_ptr() as usize) % std::mem::align_of::<AtomicU32>() == 0
    }

    /// True if both handles refer to the same storage.
    pub fn same_storage(&self, other: &BitBuffer) -> bool {
        Arc::ptr_eq(&self.words, &other.words)
    }

    /// Read a single bit.
    ///
    /// # Panics
    /// Panics if `index >= len_bits()`.
    #[inline]
    pub fn get_bit(&self, index: usize) -> bool {
        assert!(
            index < self.len_bits(),
            "bit index {index} out of range (buffer holds {} bits)",
            self.len_bits()
        );
        let word = self.words[index / WORD_BITS].load(Ordering::Acquire);
        (word >> (index % WORD_BITS)) & 1 == 1
    }

    /// Set or clear a single bit without touching any other bit.
    ///
    /// # Panics
    /// Panics if `index >= len_bits()`.
    #[inline]
    pub fn set_bit(&self, index: usize, value: bool) {
        assert!(
            index < self.len_bits(),
            "bit index {index} out of range (buffer holds {} bits)",
            self.len_bits()
        );
        let mask: Word = 1 << (index % WORD_BITS);
        let word = &self.words[index / WORD_BITS];
        if value {
            word.fetch_or(mask, Ordering::AcqRel);
        } else {
            word.fetch_and(!mask, Ordering::AcqRel);
        }
    }

    /// Copy the buffer into `out` in address-increasing byte order.
    ///
    /// Copies `min(out.len(), len_bytes())` bytes and returns that count.
    pub fn load_bytes(&self, out: &mut [u8]) -> usize {
        let count = out.len().min(self.len_bytes);
        for (word_idx, chunk) in out[..count].chunks_mut(WORD_BYTES).enumerate() {
            let bytes = self.words[word_idx].load(Ordering::Acquire).to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
        count
    }

    /// Overwrite the leading bytes of the buffer with `bytes`.
    ///
    /// Stores `min(bytes.len(), len_bytes())` bytes and returns that count.
    /// Each word is replaced with one atomic update; bits of a partially
    /// covered word outside the stored bytes are preserved.
    pub fn store_bytes(&self, bytes: &[u8]) -> usize {
        let count = bytes.len().min(self.len_bytes);
        for (word_idx, chunk) in bytes[..count].chunks(WORD_BYTES).enumerate() {
            let mut value = [0u8; WORD_BYTES];
            let mut mask = [0u8; WORD_BYTES];
            value[..chunk.len()].copy_from_slice(chunk);
            mask[..chunk.len()].fill(0xFF);
            let value = Word::from_le_bytes(value);
            let mask = Word::from_le_bytes(mask);

            let word = &self.words[word_idx];
            if mask == Word::MAX {
                word.store(value, Ordering::Release);
            } else {
                // Infallible: the closure always returns Some.
                let _ = word.fetch_update(Ordering::AcqRel, Ordering::Acquire, |old| {
                    Some((old & !mask) | value)
                });
            }
        }
        count
    }

    /// Snapshot the buffer as a byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.len_bytes];
        self.load_bytes(&mut out);
        out
    }
}

impl fmt::Debug for BitBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BitBuffer")
            .field("len_bytes", &self.len_bytes)
            .field("bytes", &format_args!("{:02X?}", self.to_bytes()))
            .finish()
    }
}

/// One bit of a [`BitBuffer`] exposed as an independent digital line.
///
/// `inverted` is the wiring polarity: callers always see the active state as
/// `true`. Reads and writes touch only the addressed bit; concurrent writers
/// on other bits of the same word never lose updates.
#[derive(Debug, Clone)]
pub struct BitRegister {
    buffer: BitBuffer,
    index: usize,
    inverted: bool,
}

impl BitRegister {
    /// Create a view of bit `index` of `buffer`.
    ///
    /// # Panics
    /// Panics if `index` does not address a bit of `buffer`. Wiring a line to a
    /// nonexistent bit is a programming error.
    pub fn new(buffer: &BitBuffer, index: usize, inverted: bool) -> Self {
        match Self::try_new(buffer, index, inverted) {
            Ok(register) => register,
            Err(e) => panic!("{e}"),
        }
    }

    /// Fallible constructor for configuration-driven wiring.
    pub fn try_new(buffer: &BitBuffer, index: usize, inverted: bool) -> Result<Self, BitIndexError> {
        if index >= buffer.len_bits() {
            return Err(BitIndexError {
                index,
                len_bits: buffer.len_bits(),
            });
        }
        Ok(Self {
            buffer: buffer.clone(),
            index,
            inverted,
        })
    }

    /// Current logical value (raw bit XOR polarity).
    #[inline]
    pub fn read(&self) -> bool {
        self.buffer.get_bit(self.index) ^ self.inverted
    }

    /// Store a logical value into the addressed bit.
    #[inline]
    pub fn write(&self, active: bool) {
        self.buffer.set_bit(self.index, active ^ self.inverted);
    }

    /// Addressed bit index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Wiring polarity.
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Buffer this register views.
    pub fn buffer(&self) -> &BitBuffer {
        &self.buffer
    }
}

impl DigitalLine for BitRegister {
    fn read(&self) -> bool {
        BitRegister::read(self)
    }

    fn write(&self, active: bool) {
        BitRegister::write(self, active)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
