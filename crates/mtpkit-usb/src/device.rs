//! nusb-backed implementation of `MtpTransport`.

use crate::discovery::MtpDeviceEntry;
use crate::transport::MtpTransport;
use crate::{CANCEL_REASON_IO_ERROR, CANCEL_REQUEST, DEVICE_RESET_REQUEST, GET_STATUS_REQUEST};
use async_trait::async_trait;
use mtpkit_core::error::TransportError;
use mtpkit_core::ids::TransactionId;
use mtpkit_core::Result;
use nusb::descriptors::TransferType;
use nusb::transfer::{
    Bulk, ControlIn, ControlOut, ControlType, Direction, In, Interrupt, Out, Recipient,
};
use nusb::{Device, Endpoint, Interface};
use std::time::Duration;
use tokio::time::timeout as with_timeout;
use tracing::{debug, warn};

/// Timeout applied to control transfers; these are tiny and fast.
const CONTROL_TIMEOUT: Duration = Duration::from_secs(2);

/// One claimed MTP interface with its three pipes.
pub struct UsbTransport {
    _device: Device,
    interface: Interface,
    interface_number: u8,
    bulk_in: Endpoint<Bulk, In>,
    bulk_out: Endpoint<Bulk, Out>,
    interrupt_in: Endpoint<Interrupt, In>,
    max_packet: usize,
}

struct PipeAddresses {
    alt_setting: u8,
    bulk_in: u8,
    bulk_out: u8,
    interrupt_in: u8,
    max_packet: usize,
}

impl UsbTransport {
    /// Open the device, claim the matched interface, and locate the bulk
    /// IN/OUT and interrupt IN endpoints.
    pub async fn open(entry: &MtpDeviceEntry) -> Result<Self> {
        let device = entry
            .info
            .open()
            .await
            .map_err(|e| TransportError::Usb(format!("open failed: {e}")))?;
        let interface = device
            .claim_interface(entry.interface_number)
            .await
            .map_err(|e| TransportError::Usb(format!("claim failed: {e}")))?;

        let pipes = Self::locate_pipes(&interface)?;
        if pipes.alt_setting != 0 {
            interface
                .set_alt_setting(pipes.alt_setting)
                .await
                .map_err(|e| TransportError::Usb(format!("set_alt_setting failed: {e}")))?;
        }

        debug!(
            interface = entry.interface_number,
            bulk_in = format_args!("{:#04x}", pipes.bulk_in),
            bulk_out = format_args!("{:#04x}", pipes.bulk_out),
            interrupt_in = format_args!("{:#04x}", pipes.interrupt_in),
            max_packet = pipes.max_packet,
            "claimed MTP interface"
        );

        let bulk_in = interface
            .endpoint::<Bulk, In>(pipes.bulk_in)
            .map_err(|e| TransportError::Usb(format!("bulk IN endpoint: {e}")))?;
        let bulk_out = interface
            .endpoint::<Bulk, Out>(pipes.bulk_out)
            .map_err(|e| TransportError::Usb(format!("bulk OUT endpoint: {e}")))?;
        let interrupt_in = interface
            .endpoint::<Interrupt, In>(pipes.interrupt_in)
            .map_err(|e| TransportError::Usb(format!("interrupt IN endpoint: {e}")))?;

        Ok(Self {
            _device: device,
            interface,
            interface_number: entry.interface_number,
            bulk_in,
            bulk_out,
            interrupt_in,
            max_packet: pipes.max_packet,
        })
    }

    /// Find the alternate setting carrying exactly one bulk IN, one bulk OUT,
    /// and one interrupt IN endpoint.
    fn locate_pipes(interface: &Interface) -> Result<PipeAddresses> {
        for alt in interface.descriptors() {
            let mut bulk_in = None;
            let mut bulk_out = None;
            let mut interrupt_in = None;
            let mut max_packet = 0usize;

            for ep in alt.endpoints() {
                match (ep.transfer_type(), ep.direction()) {
                    (TransferType::Bulk, Direction::In) => {
                        bulk_in = Some(ep.address());
                        max_packet = ep.max_packet_size();
                    }
                    (TransferType::Bulk, Direction::Out) => bulk_out = Some(ep.address()),
                    (TransferType::Interrupt, Direction::In) => {
                        interrupt_in = Some(ep.address())
                    }
                    _ => {}
                }
            }

            if let (Some(bulk_in), Some(bulk_out), Some(interrupt_in)) =
                (bulk_in, bulk_out, interrupt_in)
            {
                return Ok(PipeAddresses {
                    alt_setting: alt.alternate_setting(),
                    bulk_in,
                    bulk_out,
                    interrupt_in,
                    max_packet,
                });
            }
        }
        Err(TransportError::NoMtpInterface.into())
    }

    /// On timeout: cancel pending transfers and clear the halt so the pipe
    /// is usable again, then report the timeout.
    async fn recover_in_pipe(&mut self) {
        self.bulk_in.cancel_all();
        while self.bulk_in.pending() > 0 {
            let _ = self.bulk_in.next_complete().await;
        }
        if let Err(e) = self.bulk_in.clear_halt().await {
            warn!("clear_halt on bulk IN failed: {e}");
        }
    }

    async fn recover_out_pipe(&mut self) {
        self.bulk_out.cancel_all();
        while self.bulk_out.pending() > 0 {
            let _ = self.bulk_out.next_complete().await;
        }
        if let Err(e) = self.bulk_out.clear_halt().await {
            warn!("clear_halt on bulk OUT failed: {e}");
        }
    }
}

#[async_trait]
impl MtpTransport for UsbTransport {
    fn max_packet_size(&self) -> usize {
        self.max_packet
    }

    async fn bulk_read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let request = self.bulk_in.allocate(buf.len());
        self.bulk_in.submit(request);

        let completion = match with_timeout(timeout, self.bulk_in.next_complete()).await {
            Ok(completion) => completion,
            Err(_) => {
                self.recover_in_pipe().await;
                return Err(TransportError::Timeout.into());
            }
        };
        completion
            .status
            .map_err(|e| TransportError::Usb(format!("bulk IN: {e}")))?;

        let n = completion.buffer.len();
        buf[..n].copy_from_slice(&completion.buffer);
        Ok(n)
    }

    async fn bulk_write(&mut self, data: &[u8], timeout: Duration) -> Result<()> {
        let mut request = self.bulk_out.allocate(data.len());
        request.extend_from_slice(data);
        self.bulk_out.submit(request);

        let completion = match with_timeout(timeout, self.bulk_out.next_complete()).await {
            Ok(completion) => completion,
            Err(_) => {
                self.recover_out_pipe().await;
                return Err(TransportError::Timeout.into());
            }
        };
        completion
            .status
            .map_err(|e| TransportError::Usb(format!("bulk OUT: {e}")))?;
        Ok(())
    }

    async fn interrupt_read(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let request = self.interrupt_in.allocate(64);
        self.interrupt_in.submit(request);

        match with_timeout(timeout, self.interrupt_in.next_complete()).await {
            Ok(completion) => {
                completion
                    .status
                    .map_err(|e| TransportError::Usb(format!("interrupt IN: {e}")))?;
                Ok(Some(completion.buffer.to_vec()))
            }
            Err(_) => {
                // No event pending; leave nothing queued behind us.
                self.interrupt_in.cancel_all();
                while self.interrupt_in.pending() > 0 {
                    let _ = self.interrupt_in.next_complete().await;
                }
                Ok(None)
            }
        }
    }

    async fn cancel_transaction(&mut self, txid: TransactionId) -> Result<()> {
        let mut payload = [0u8; 6];
        payload[0..4].copy_from_slice(&txid.raw().to_le_bytes());
        payload[4..6].copy_from_slice(&CANCEL_REASON_IO_ERROR.to_le_bytes());

        self.interface
            .control_out(
                ControlOut {
                    control_type: ControlType::Class,
                    recipient: Recipient::Interface,
                    request: CANCEL_REQUEST,
                    value: 0,
                    index: self.interface_number as u16,
                    data: &payload,
                },
                CONTROL_TIMEOUT,
            )
            .await
            .map_err(|e| TransportError::Usb(format!("cancel request: {e}")))?;
        Ok(())
    }

    async fn device_status(&mut self) -> Result<u16> {
        let data = self
            .interface
            .control_in(
                ControlIn {
                    control_type: ControlType::Class,
                    recipient: Recipient::Interface,
                    request: GET_STATUS_REQUEST,
                    value: 0,
                    index: self.interface_number as u16,
                    length: 2,
                },
                CONTROL_TIMEOUT,
            )
            .await
            .map_err(|e| TransportError::Usb(format!("get status: {e}")))?;
        if data.len() < 2 {
            return Err(TransportError::ShortRead { wanted: 2, got: data.len() }.into());
        }
        Ok(u16::from_le_bytes([data[0], data[1]]))
    }

    async fn device_reset(&mut self) -> Result<()> {
        self.interface
            .control_out(
                ControlOut {
                    control_type: ControlType::Class,
                    recipient: Recipient::Interface,
                    request: DEVICE_RESET_REQUEST,
                    value: 0,
                    index: self.interface_number as u16,
                    data: &[],
                },
                CONTROL_TIMEOUT,
            )
            .await
            .map_err(|e| TransportError::Usb(format!("device reset: {e}")))?;
        Ok(())
    }

    async fn clear_halt_in(&mut self) -> Result<()> {
        self.bulk_in
            .clear_halt()
            .await
            .map_err(|e| TransportError::Usb(format!("clear_halt IN: {e}")))
            .map_err(Into::into)
    }

    async fn clear_halt_out(&mut self) -> Result<()> {
        self.bulk_out
            .clear_halt()
            .await
            .map_err(|e| TransportError::Usb(format!("clear_halt OUT: {e}")))
            .map_err(Into::into)
    }
}
