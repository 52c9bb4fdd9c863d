//! Asynchronous device events from the interrupt pipe.

use crate::container::{ContainerHeader, CONTAINER_HEADER_LEN};
use mtpkit_core::codes::{ContainerType, EventCode};
use mtpkit_core::error::ProtocolError;
use mtpkit_core::ids::{SessionId, TransactionId};
use mtpkit_core::Result;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::debug;

/// One event delivered by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub code: EventCode,
    pub session_id: SessionId,
    pub transaction_id: TransactionId,
    pub params: Vec<u32>,
}

impl Event {
    /// Parse an Event container from one interrupt transfer.
    pub fn parse(bytes: &[u8], session_id: SessionId) -> Result<Self> {
        let header = ContainerHeader::parse(bytes)?;
        if header.kind != ContainerType::Event {
            return Err(ProtocolError::UnexpectedPhase { got: header.kind, phase: "event" }.into());
        }
        let end = (header.length as usize).min(bytes.len());
        let params = bytes[CONTAINER_HEADER_LEN..end]
            .chunks_exact(4)
            .take(3)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(Self {
            code: EventCode::from_u16(header.code),
            session_id,
            transaction_id: header.txid,
            params,
        })
    }
}

/// Producer half of the single-consumer event queue. Overflow drops the
/// oldest event.
pub struct EventQueue {
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

/// Consumer half handed to the application.
#[derive(Clone)]
pub struct EventReceiver {
    rx: Receiver<Event>,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    /// Publish an event, evicting the oldest when the queue is full.
    pub fn push(&self, event: Event) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                let dropped = self.rx.try_recv().ok();
                if let Some(dropped) = dropped {
                    debug!(code = ?dropped.code, "event queue full, dropping oldest");
                }
                let _ = self.tx.try_send(event);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    pub fn receiver(&self) -> EventReceiver {
        EventReceiver { rx: self.rx.clone() }
    }
}

impl EventReceiver {
    /// Non-blocking poll.
    pub fn try_next(&self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Drain everything currently queued.
    pub fn drain(&self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            out.push(event);
        }
        out
    }
}

impl Iterator for EventReceiver {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        self.try_next()
    }
}
