//! USB device enumeration and selection.

use crate::STILL_IMAGE_CLASS;
use futures::Stream;
use mtpkit_core::error::TransportError;
use mtpkit_core::Result;
use nusb::hotplug::HotplugEvent;
use nusb::DeviceInfo;
use tracing::debug;

/// One enumerated candidate device.
#[derive(Debug)]
pub struct MtpDeviceEntry {
    pub info: DeviceInfo,
    /// Interface number that matched the MTP heuristics.
    pub interface_number: u8,
}

impl MtpDeviceEntry {
    pub fn vendor_id(&self) -> u16 {
        self.info.vendor_id()
    }

    pub fn product_id(&self) -> u16 {
        self.info.product_id()
    }
}

/// Whether an interface looks like an MTP/PTP function: Still Image class
/// (6), or an interface string containing "MTP" in any case.
fn interface_matches(class: u8, name: Option<&str>) -> bool {
    class == STILL_IMAGE_CLASS
        || name
            .map(|s| s.to_ascii_uppercase().contains("MTP"))
            .unwrap_or(false)
}

/// Enumerate every device exposing an MTP-capable interface.
pub async fn list_mtp_devices() -> Result<Vec<MtpDeviceEntry>> {
    let devices = nusb::list_devices()
        .await
        .map_err(|e| TransportError::Usb(e.to_string()))?;

    let mut found = Vec::new();
    for info in devices {
        let matched = info.interfaces().find(|iface| {
            interface_matches(iface.class(), iface.interface_string())
        });
        if let Some(iface) = matched {
            debug!(
                vid = format_args!("{:04x}", info.vendor_id()),
                pid = format_args!("{:04x}", info.product_id()),
                interface = iface.interface_number(),
                "found MTP-capable interface"
            );
            let interface_number = iface.interface_number();
            found.push(MtpDeviceEntry { info, interface_number });
        }
    }
    Ok(found)
}

/// Parse a `vid:pid` selector string into two hex u16s.
pub fn parse_selector(selector: &str) -> Option<(u16, u16)> {
    let (vid, pid) = selector.split_once(':')?;
    let vid = u16::from_str_radix(vid.trim(), 16).ok()?;
    let pid = u16::from_str_radix(pid.trim(), 16).ok()?;
    Some((vid, pid))
}

/// Pick a device: by explicit `vid:pid` selector when given, otherwise the
/// first MTP-capable device found.
pub async fn select_device(selector: Option<&str>) -> Result<MtpDeviceEntry> {
    let mut devices = list_mtp_devices().await?;
    if devices.is_empty() {
        return Err(TransportError::DeviceNotFound.into());
    }

    match selector {
        None => Ok(devices.remove(0)),
        Some(sel) => {
            let (vid, pid) = parse_selector(sel).ok_or_else(|| {
                TransportError::Usb(format!("invalid device selector {sel:?}, expected vid:pid"))
            })?;
            devices
                .into_iter()
                .find(|d| d.vendor_id() == vid && d.product_id() == pid)
                .ok_or_else(|| TransportError::DeviceNotFound.into())
        }
    }
}

/// Hotplug stream of raw USB events; callers re-enumerate on each event to
/// see whether an MTP device appeared or vanished.
pub fn watch_mtp_devices() -> Result<impl Stream<Item = HotplugEvent>> {
    nusb::watch_devices().map_err(|e| TransportError::Usb(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    mod selector_parsing {
        use super::*;

        #[test]
        fn parses_hex_pair() {
            assert_eq!(parse_selector("045e:0710"), Some((0x045E, 0x0710)));
        }

        #[test]
        fn tolerates_whitespace() {
            assert_eq!(parse_selector("045e : 0710"), Some((0x045E, 0x0710)));
        }

        #[test]
        fn rejects_garbage() {
            assert_eq!(parse_selector("nope"), None);
            assert_eq!(parse_selector("045e"), None);
            assert_eq!(parse_selector("045e:zzzz"), None);
        }
    }

    mod interface_matching {
        use super::*;

        #[test]
        fn still_image_class_matches() {
            assert!(interface_matches(6, None));
        }

        #[test]
        fn mtp_string_matches_any_case() {
            assert!(interface_matches(0xFF, Some("MTP")));
            assert!(interface_matches(0xFF, Some("mtp")));
            assert!(interface_matches(0xFF, Some("Android MTP Interface")));
        }

        #[test]
        fn unrelated_interface_does_not_match() {
            assert!(!interface_matches(0x08, Some("Mass Storage")));
            assert!(!interface_matches(0xFF, None));
        }
    }
}
