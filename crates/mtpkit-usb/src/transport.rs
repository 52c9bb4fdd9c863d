//! The transport trait the session layer is written against.

use async_trait::async_trait;
use mtpkit_core::ids::TransactionId;
use mtpkit_core::Result;
use std::time::Duration;

/// Byte-pipe view of one claimed MTP interface.
///
/// Implemented by the real USB backend and by the scripted mock used in
/// tests. All bulk transfers are raw container bytes; framing lives a layer
/// up in `mtpkit-ptp`.
#[async_trait]
pub trait MtpTransport: Send {
    /// Maximum packet size of the bulk endpoints (512 for USB 2.0 devices,
    /// 1024 for USB 3.0).
    fn max_packet_size(&self) -> usize;

    /// Read up to `buf.len()` bytes from the bulk IN pipe.
    ///
    /// On timeout the pipe is halted and cleared before the call fails with
    /// `TransportError::Timeout`.
    async fn bulk_read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Write all of `data` to the bulk OUT pipe. An empty slice sends a
    /// zero-length packet, which a caller must use to terminate a transfer
    /// whose total length is a non-zero multiple of `max_packet_size()`.
    async fn bulk_write(&mut self, data: &[u8], timeout: Duration) -> Result<()>;

    /// Read one transfer from the interrupt IN pipe. Returns `None` when the
    /// timeout elapses without data (not an error: events are optional).
    async fn interrupt_read(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>>;

    /// Class control request 0x64: cancel the transaction `txid`.
    /// Payload is the little-endian transaction id followed by the reason
    /// code 0x4001.
    async fn cancel_transaction(&mut self, txid: TransactionId) -> Result<()>;

    /// Class control request 0x67: two-byte device status.
    async fn device_status(&mut self) -> Result<u16>;

    /// Class control request 0x66: reset the MTP function.
    async fn device_reset(&mut self) -> Result<()>;

    /// Clear a halt condition on the bulk IN pipe.
    async fn clear_halt_in(&mut self) -> Result<()>;

    /// Clear a halt condition on the bulk OUT pipe.
    async fn clear_halt_out(&mut self) -> Result<()>;
}
