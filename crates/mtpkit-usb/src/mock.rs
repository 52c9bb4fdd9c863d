//! Scripted in-memory transport for tests.
//!
//! Two ways to drive it: queue raw reads ahead of time with `push_read`, or
//! install a responder closure that turns every bulk write into the reads the
//! device would answer with. Everything written is recorded for assertions.

use crate::transport::MtpTransport;
use async_trait::async_trait;
use mtpkit_core::error::TransportError;
use mtpkit_core::ids::TransactionId;
use mtpkit_core::Result;
use std::collections::VecDeque;
use std::time::Duration;

type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

/// In-memory `MtpTransport` used by the conformance suite.
pub struct MockTransport {
    max_packet: usize,
    read_queue: VecDeque<Vec<u8>>,
    interrupt_queue: VecDeque<Vec<u8>>,
    responder: Option<Responder>,
    /// Every bulk write, in order; an empty entry is a ZLP.
    pub written: Vec<Vec<u8>>,
    /// Transaction ids the host cancelled.
    pub cancelled: Vec<TransactionId>,
    /// Count of class device-reset requests.
    pub resets: usize,
    status: u16,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::with_max_packet(512)
    }

    pub fn with_max_packet(max_packet: usize) -> Self {
        Self {
            max_packet,
            read_queue: VecDeque::new(),
            interrupt_queue: VecDeque::new(),
            responder: None,
            written: Vec::new(),
            cancelled: Vec::new(),
            resets: 0,
            status: 0x2001,
        }
    }

    /// Route every non-ZLP bulk write through `responder`; its return value
    /// is appended to the read queue.
    pub fn with_responder(
        mut self,
        responder: impl FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static,
    ) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Queue one bulk IN transfer.
    pub fn push_read(&mut self, data: Vec<u8>) {
        self.read_queue.push_back(data);
    }

    /// Queue one interrupt IN transfer.
    pub fn push_interrupt(&mut self, data: Vec<u8>) {
        self.interrupt_queue.push_back(data);
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    /// Number of writes that were zero-length packets.
    pub fn zlp_count(&self) -> usize {
        self.written.iter().filter(|w| w.is_empty()).count()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MtpTransport for MockTransport {
    fn max_packet_size(&self) -> usize {
        self.max_packet
    }

    async fn bulk_read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        let mut chunk = self
            .read_queue
            .pop_front()
            .ok_or(TransportError::Timeout)?;
        if chunk.len() > buf.len() {
            // Serve what fits; the rest stays queued like a continued
            // max-packet-sized USB read.
            let rest = chunk.split_off(buf.len());
            self.read_queue.push_front(rest);
        }
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }

    async fn bulk_write(&mut self, data: &[u8], _timeout: Duration) -> Result<()> {
        self.written.push(data.to_vec());
        if !data.is_empty() {
            if let Some(responder) = self.responder.as_mut() {
                let replies = responder(data);
                self.read_queue.extend(replies);
            }
        }
        Ok(())
    }

    async fn interrupt_read(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>> {
        Ok(self.interrupt_queue.pop_front())
    }

    async fn cancel_transaction(&mut self, txid: TransactionId) -> Result<()> {
        self.cancelled.push(txid);
        Ok(())
    }

    async fn device_status(&mut self) -> Result<u16> {
        Ok(self.status)
    }

    async fn device_reset(&mut self) -> Result<()> {
        self.resets += 1;
        self.read_queue.clear();
        Ok(())
    }

    async fn clear_halt_in(&mut self) -> Result<()> {
        Ok(())
    }

    async fn clear_halt_out(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(10);

    #[tokio::test]
    async fn read_splits_across_small_buffers() {
        let mut mock = MockTransport::new();
        mock.push_read(vec![1, 2, 3, 4, 5]);

        let mut buf = [0u8; 3];
        assert_eq!(mock.bulk_read(&mut buf, TIMEOUT).await.unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(mock.bulk_read(&mut buf, TIMEOUT).await.unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
    }

    #[tokio::test]
    async fn empty_queue_times_out() {
        let mut mock = MockTransport::new();
        let mut buf = [0u8; 4];
        let err = mock.bulk_read(&mut buf, TIMEOUT).await.unwrap_err();
        assert!(matches!(
            err,
            mtpkit_core::Error::Transport(TransportError::Timeout)
        ));
    }

    #[tokio::test]
    async fn responder_feeds_reads() {
        let mut mock = MockTransport::new().with_responder(|written| {
            assert_eq!(written, b"ping");
            vec![b"pong".to_vec()]
        });

        mock.bulk_write(b"ping", TIMEOUT).await.unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(mock.bulk_read(&mut buf, TIMEOUT).await.unwrap(), 4);
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test]
    async fn zlp_recorded_but_not_routed() {
        let mut mock = MockTransport::new().with_responder(|_| panic!("ZLP must not reach responder"));
        mock.bulk_write(&[], TIMEOUT).await.unwrap();
        assert_eq!(mock.zlp_count(), 1);
    }

    #[tokio::test]
    async fn interrupt_queue_drains_to_none() {
        let mut mock = MockTransport::new();
        mock.push_interrupt(vec![0xAA]);
        assert_eq!(mock.interrupt_read(TIMEOUT).await.unwrap(), Some(vec![0xAA]));
        assert_eq!(mock.interrupt_read(TIMEOUT).await.unwrap(), None);
    }
}
