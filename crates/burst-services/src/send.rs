//! Server-side transfer engine: streams a fixed number of fill bytes to
//! one peer in paced chunks.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use burst_core::{ChunkBuffer, SendPlan, FILL_BYTE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Complete,
    /// The peer connection is broken; no retry.
    Failed(io::ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub sent: u64,
    pub target: u64,
    /// Write calls that made progress.
    pub writes: u64,
    pub outcome: SendOutcome,
}

impl SendReport {
    pub fn is_complete(&self) -> bool {
        self.outcome == SendOutcome::Complete
    }
}

/// Send `plan.total_bytes` to `stream`, then shut down its write half.
///
/// Short writes count as progress. A write error (or a zero-length write)
/// ends the transfer early. The caller owns the stream and closes it by
/// dropping it.
pub async fn serve<S>(stream: &mut S, plan: &SendPlan) -> SendReport
where
    S: AsyncWrite + Unpin,
{
    let buffer = ChunkBuffer::filled(plan.chunk_size, FILL_BYTE);
    let mut sent = 0u64;
    let mut writes = 0u64;
    let mut outcome = SendOutcome::Complete;

    while sent < plan.total_bytes {
        let len = plan.next_chunk(sent);
        match stream.write(buffer.head(len)).await {
            Ok(0) => {
                tracing::warn!(sent, "send made no progress, peer gone");
                outcome = SendOutcome::Failed(io::ErrorKind::WriteZero);
                break;
            }
            Ok(n) => {
                sent += n as u64;
                writes += 1;
                tracing::debug!(chunk = n, sent, total = plan.total_bytes, "chunk sent");
            }
            Err(e) => {
                tracing::warn!(error = %e, sent, "send failed");
                outcome = SendOutcome::Failed(e.kind());
                break;
            }
        }

        if !plan.pacing.is_zero() {
            tokio::time::sleep(plan.pacing).await;
        }
    }

    if let Err(e) = stream.shutdown().await {
        tracing::debug!(error = %e, "shutdown after send failed");
    }

    SendReport {
        sent,
        target: plan.total_bytes,
        writes,
        outcome,
    }
}
