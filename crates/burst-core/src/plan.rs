//! Transfer plans: the fixed parameters of one bulk transfer.
//!
//! A plan is built once from config and copied into every connection's
//! execution unit. Chunk boundaries are a sender-side pacing detail: the
//! wire carries an undifferentiated stream of `total_bytes` fill bytes.

use std::time::Duration;

use bytes::BytesMut;

use crate::config::{ClientConfig, ServerConfig};

/// Byte the server repeats for the whole payload.
pub const FILL_BYTE: u8 = b'A';

/// Sender-side parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendPlan {
    pub total_bytes: u64,
    pub chunk_size: usize,
    /// Sleep after every successful chunk.
    pub pacing: Duration,
}

/// Receiver-side parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivePlan {
    pub total_bytes: u64,
    pub buffer_size: usize,
    /// Max silence on a single read before the transfer is abandoned.
    pub idle_timeout: Duration,
}

impl SendPlan {
    /// Size of the next write given how much has been sent so far.
    pub fn next_chunk(&self, sent: u64) -> usize {
        bounded_len(self.total_bytes.saturating_sub(sent), self.chunk_size)
    }

    /// Writes needed when every write is accepted in full.
    pub fn chunk_count(&self) -> u64 {
        self.total_bytes.div_ceil(self.chunk_size as u64)
    }
}

impl ReceivePlan {
    /// Largest read that cannot overshoot the target.
    pub fn next_read(&self, received: u64) -> usize {
        bounded_len(self.total_bytes.saturating_sub(received), self.buffer_size)
    }
}

impl From<&ServerConfig> for SendPlan {
    fn from(c: &ServerConfig) -> Self {
        Self {
            total_bytes: c.total_bytes,
            chunk_size: c.chunk_size,
            pacing: c.pacing(),
        }
    }
}

impl From<&ClientConfig> for ReceivePlan {
    fn from(c: &ClientConfig) -> Self {
        Self {
            total_bytes: c.total_bytes,
            buffer_size: c.buffer_size,
            idle_timeout: c.idle_timeout(),
        }
    }
}

fn bounded_len(remaining: u64, cap: usize) -> usize {
    // remaining < cap fits in usize because cap does.
    if remaining < cap as u64 {
        remaining as usize
    } else {
        cap
    }
}

/// Fixed-size buffer reused for every chunk of one transfer.
///
/// Owned by a single connection; never shared.
#[derive(Debug)]
pub struct ChunkBuffer {
    buf: BytesMut,
}

impl ChunkBuffer {
    /// Zeroed scratch space (receiver side).
    pub fn scratch(size: usize) -> Self {
        Self {
            buf: BytesMut::zeroed(size),
        }
    }

    /// Buffer filled once with `byte` (sender side).
    pub fn filled(size: usize, byte: u8) -> Self {
        let mut buf = BytesMut::with_capacity(size);
        buf.resize(size, byte);
        Self { buf }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// First `len` bytes, clamped to capacity.
    pub fn head(&self, len: usize) -> &[u8] {
        &self.buf[..len.min(self.buf.len())]
    }

    pub fn head_mut(&mut self, len: usize) -> &mut [u8] {
        let len = len.min(self.buf.len());
        &mut self.buf[..len]
    }
}
