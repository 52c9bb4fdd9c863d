//! # mtpkit-usb
//!
//! USB transport layer for the MTP client.
//!
//! This crate provides:
//! - Device enumeration and selection (Still Image class or /MTP/i strings)
//! - Interface claiming and endpoint discovery
//! - Bulk IN/OUT and interrupt IN pipes with ZLP and timeout policy
//! - Class-specific control requests (cancel, get-status, device reset)
//! - The `MtpTransport` trait the session layer is written against, plus a
//!   scripted `MockTransport` for tests

mod device;
mod discovery;
mod mock;
mod transport;

pub use device::UsbTransport;
pub use discovery::{list_mtp_devices, parse_selector, select_device, watch_mtp_devices, MtpDeviceEntry};
pub use mock::MockTransport;
pub use transport::MtpTransport;

/// Class-specific control request: cancel an in-flight transaction.
pub const CANCEL_REQUEST: u8 = 0x64;
/// Class-specific control request: reset the MTP function.
pub const DEVICE_RESET_REQUEST: u8 = 0x66;
/// Class-specific control request: poll two-byte device status.
pub const GET_STATUS_REQUEST: u8 = 0x67;

/// Reason code carried in the cancel payload.
pub const CANCEL_REASON_IO_ERROR: u16 = 0x4001;

/// USB interface class for Still Image capture devices.
pub const STILL_IMAGE_CLASS: u8 = 6;
