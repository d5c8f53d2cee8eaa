//! Client-side transfer engine: drains up to a fixed number of bytes from
//! one connection, giving up when a single read stays idle too long.

use std::io;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};

use burst_core::{ChunkBuffer, ReceivePlan};

/// Why the receive loop stopped. Every variant other than `Complete` ends
/// the connection the same way; they are kept apart for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Complete,
    /// Orderly close by the peer (read returned 0).
    PeerClosed,
    /// No data within the idle timeout.
    IdleTimeout,
    Failed(io::ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveReport {
    pub received: u64,
    pub target: u64,
    pub reads: u64,
    pub outcome: ReceiveOutcome,
}

impl ReceiveReport {
    pub fn is_complete(&self) -> bool {
        self.outcome == ReceiveOutcome::Complete
    }
}

/// Read from `stream` until `plan.total_bytes` have arrived or the
/// connection ends. Never reads past the target.
pub async fn receive<R>(stream: &mut R, plan: &ReceivePlan) -> ReceiveReport
where
    R: AsyncRead + Unpin,
{
    let mut buffer = ChunkBuffer::scratch(plan.buffer_size);
    let started = Instant::now();
    let mut received = 0u64;
    let mut reads = 0u64;

    let outcome = loop {
        let want = plan.next_read(received);
        if want == 0 {
            break ReceiveOutcome::Complete;
        }

        let read = tokio::time::timeout(plan.idle_timeout, stream.read(buffer.head_mut(want))).await;
        match read {
            Ok(Ok(0)) => break ReceiveOutcome::PeerClosed,
            Ok(Ok(n)) => {
                received += n as u64;
                reads += 1;
                tracing::debug!(
                    len = n,
                    received,
                    total = plan.total_bytes,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "received"
                );
            }
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "recv failed");
                break ReceiveOutcome::Failed(e.kind());
            }
            Err(_) => break ReceiveOutcome::IdleTimeout,
        }
    };

    if outcome != ReceiveOutcome::Complete {
        tracing::warn!(?outcome, received, "connection closed or timed out");
    }

    ReceiveReport {
        received,
        target: plan.total_bytes,
        reads,
        outcome,
    }
}
