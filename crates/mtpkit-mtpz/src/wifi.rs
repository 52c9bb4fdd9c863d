//! Wireless provisioning over the vendor operation window.
//!
//! The operation sequencing and the 324-byte profile layout are
//! reverse-engineered from USB captures of the vendor sync client; unknown
//! fields are opaque zero padding.

use crate::trusted::TrustedApp;
use mtpkit_core::codes::{DevicePropertyCode, OperationCode};
use mtpkit_core::Result;
use mtpkit_ptp::wire::Writer;
use tracing::{debug, info};

/// Total size of a Wi-Fi configuration profile.
pub const WIFI_PROFILE_LEN: usize = 324;

/// Security flags used when the target network is absent from the scan
/// (WPA2-PSK).
pub const DEFAULT_SECURITY_FLAGS: [u32; 3] = [0x0000_0001, 0x0000_0007, 0x0000_0004];

/// Longest SSID the profile can carry.
const SSID_MAX: usize = 32;

/// Offset of the security flags inside one scan entry, counted from the
/// entry start; the SSID itself sits 40 bytes into the entry.
const SCAN_ENTRY_SSID_OFFSET: usize = 40;
const SCAN_ENTRY_FLAGS_OFFSET: usize = 16;

/// One network found in a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiNetwork {
    pub ssid: String,
}

impl TrustedApp {
    /// Turn on wireless sync.
    pub async fn enable_wireless(&mut self) -> Result<()> {
        self.require_keys()?;
        self.authenticate().await?;
        let session = self.session().clone();
        let mut session = session.lock().await;
        session
            .vendor_plain(OperationCode::SetWirelessSyncState, &[1])
            .await?;
        session
            .vendor_plain(OperationCode::FinishWirelessEnable, &[3, 1, 0])
            .await?;
        info!("wireless sync enabled");
        Ok(())
    }

    /// Turn off wireless sync.
    pub async fn disable_wireless(&mut self) -> Result<()> {
        self.require_keys()?;
        self.authenticate().await?;
        let session = self.session().clone();
        let mut session = session.lock().await;
        session
            .vendor_plain(OperationCode::SetWirelessSyncState, &[0])
            .await?;
        info!("wireless sync disabled");
        Ok(())
    }

    /// Scan for nearby networks.
    pub async fn list_wifi_networks(&mut self) -> Result<Vec<WifiNetwork>> {
        self.require_keys()?;
        self.authenticate().await?;
        let session = self.session().clone();
        let mut session = session.lock().await;
        let scan = session.vendor_in(OperationCode::GetWifiNetworkList, &[]).await?;
        drop(session);
        let networks = parse_network_list(&scan);
        debug!(count = networks.len(), "wifi scan parsed");
        Ok(networks)
    }

    /// Provision a network profile: encrypt the password toward the device
    /// key, build the 324-byte profile, and walk the device through the
    /// prepare/set/commit sequence.
    pub async fn configure_wifi(&mut self, ssid: &str, password: &str) -> Result<()> {
        self.require_keys()?;
        self.authenticate().await?;

        let session = self.session().clone();
        let mut session = session.lock().await;

        let scan = session.vendor_in(OperationCode::GetWifiNetworkList, &[]).await?;
        let flags = find_security_flags(&scan, ssid).unwrap_or_else(|| {
            debug!(ssid, "network not in scan, assuming WPA2");
            DEFAULT_SECURITY_FLAGS
        });
        drop(session);

        let encrypted = self.encrypt_wifi_password(password)?;
        let profile = build_wifi_profile(ssid, &encrypted, flags);

        let session = self.session().clone();
        let mut session = session.lock().await;
        session
            .vendor_plain(OperationCode::PrepareWifiConfiguration, &[])
            .await?;
        session
            .vendor_out(OperationCode::SetWifiConfiguration, &[], &profile)
            .await?;
        // Commit sequence observed in captures: one 0, then three 2s.
        for param in [0u32, 2, 2, 2] {
            session
                .vendor_plain(OperationCode::CommitWifiConfiguration, &[param])
                .await?;
        }
        // The sync client polls the status property twice before declaring
        // success.
        for _ in 0..2 {
            session
                .get_device_prop_value(DevicePropertyCode::WirelessConfigStatus)
                .await?;
        }
        info!(ssid, "wifi profile configured");
        Ok(())
    }

    /// Register a track name for metadata retrieval on GUID-bound firmwares.
    pub async fn register_track_context(&mut self, track_name: &str) -> Result<()> {
        self.require_keys()?;
        self.authenticate().await?;
        let mut w = Writer::new();
        w.string(track_name)?;
        let payload = w.into_inner();
        let session = self.session().clone();
        let mut session = session.lock().await;
        session
            .vendor_out(OperationCode::RegisterTrackContext, &[], &payload)
            .await
    }

    /// Write the partnership GUID device properties, formatted the way the
    /// vendor sync client does: uppercase, braced, as a wire string.
    pub async fn set_partnership_guid(&mut self, guid: &str) -> Result<()> {
        self.require_keys()?;
        self.authenticate().await?;

        let braced = format_guid_with_braces(guid);
        let mut w = Writer::new();
        w.string(&braced)?;
        let payload = w.into_inner();

        let session = self.session().clone();
        let mut session = session.lock().await;
        session
            .set_device_prop_value(DevicePropertyCode::SynchronizationPartner, &payload)
            .await?;
        session
            .set_device_prop_value(DevicePropertyCode::ZunePartnershipGuid, &payload)
            .await?;
        Ok(())
    }
}

/// `{XXXXXXXX-XXXX-...}` form expected by the device properties.
fn format_guid_with_braces(guid: &str) -> String {
    let upper = guid.trim_matches(|c| c == '{' || c == '}').to_ascii_uppercase();
    format!("{{{upper}}}")
}

/// Build the 324-byte configuration profile.
fn build_wifi_profile(ssid: &str, encrypted_password: &[u8; 128], flags: [u32; 3]) -> Vec<u8> {
    let ssid_bytes = ssid.as_bytes();
    let ssid_len = ssid_bytes.len().min(SSID_MAX);

    let mut out = Vec::with_capacity(WIFI_PROFILE_LEN);
    out.extend_from_slice(&1u32.to_le_bytes()); // profile id
    out.extend_from_slice(&(ssid_len as u32).to_le_bytes());
    out.extend_from_slice(&ssid_bytes[..ssid_len]);
    out.resize(8 + SSID_MAX, 0); // SSID field is fixed width

    for flag in flags {
        out.extend_from_slice(&flag.to_le_bytes());
    }
    for flag in [1u32, 0, 0] {
        out.extend_from_slice(&flag.to_le_bytes());
    }

    out.extend_from_slice(&(encrypted_password.len() as u32).to_le_bytes());
    out.extend_from_slice(encrypted_password);

    out.resize(WIFI_PROFILE_LEN, 0);
    out
}

/// Heuristic scan parse: walk the payload byte-by-byte looking for a
/// plausible SSID (u32 length 1..=32 followed by that many printable ASCII
/// bytes). Duplicates collapse; order is lexicographic.
fn parse_network_list(data: &[u8]) -> Vec<WifiNetwork> {
    let mut found = std::collections::BTreeSet::new();
    let mut offset = 0usize;
    while offset + 4 < data.len() {
        let len = u32::from_le_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]) as usize;
        if (1..=SSID_MAX).contains(&len) && offset + 4 + len <= data.len() {
            let candidate = &data[offset + 4..offset + 4 + len];
            if candidate.iter().all(|&b| (0x20..=0x7E).contains(&b)) {
                found.insert(String::from_utf8_lossy(candidate).into_owned());
                offset += 4 + len;
                continue;
            }
        }
        offset += 1;
    }
    found.into_iter().map(|ssid| WifiNetwork { ssid }).collect()
}

/// Lift the three security flag words for `ssid` out of the scan payload.
/// The SSID text sits 40 bytes into its entry; the flags start 16 bytes in.
fn find_security_flags(scan: &[u8], ssid: &str) -> Option<[u32; 3]> {
    let needle = ssid.as_bytes();
    if needle.is_empty() {
        return None;
    }
    let mut offset = 0usize;
    while offset + needle.len() <= scan.len() {
        if &scan[offset..offset + needle.len()] == needle && offset >= SCAN_ENTRY_SSID_OFFSET {
            let entry_start = offset - SCAN_ENTRY_SSID_OFFSET;
            let flags_at = entry_start + SCAN_ENTRY_FLAGS_OFFSET;
            if flags_at + 12 <= scan.len() {
                let word = |at: usize| {
                    u32::from_le_bytes([scan[at], scan[at + 1], scan[at + 2], scan[at + 3]])
                };
                return Some([word(flags_at), word(flags_at + 4), word(flags_at + 8)]);
            }
        }
        offset += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_layout() {
        let encrypted = [0xEEu8; 128];
        let profile = build_wifi_profile("HomeNet", &encrypted, [0x11, 0x22, 0x33]);

        assert_eq!(profile.len(), WIFI_PROFILE_LEN);
        assert_eq!(&profile[0..4], &1u32.to_le_bytes());
        assert_eq!(&profile[4..8], &7u32.to_le_bytes());
        assert_eq!(&profile[8..15], b"HomeNet");
        assert!(profile[15..40].iter().all(|&b| b == 0));
        // Six flag words at offset 40
        assert_eq!(&profile[40..44], &0x11u32.to_le_bytes());
        assert_eq!(&profile[52..56], &1u32.to_le_bytes());
        // Password length + ciphertext at offset 64
        assert_eq!(&profile[64..68], &128u32.to_le_bytes());
        assert_eq!(&profile[68..196], &encrypted[..]);
        // Opaque padding to the end
        assert!(profile[196..].iter().all(|&b| b == 0));
    }

    #[test]
    fn profile_truncates_long_ssid() {
        let long = "x".repeat(40);
        let profile = build_wifi_profile(&long, &[0u8; 128], DEFAULT_SECURITY_FLAGS);
        assert_eq!(profile.len(), WIFI_PROFILE_LEN);
        assert_eq!(&profile[4..8], &32u32.to_le_bytes());
    }

    #[test]
    fn scan_parse_finds_plausible_ssids() {
        let mut data = vec![0xFF; 7]; // leading noise
        data.extend_from_slice(&7u32.to_le_bytes());
        data.extend_from_slice(b"HomeNet");
        data.extend_from_slice(&[0x00; 5]);
        data.extend_from_slice(&9u32.to_le_bytes());
        data.extend_from_slice(b"CoffeeBar");

        let networks = parse_network_list(&data);
        let ssids: Vec<&str> = networks.iter().map(|n| n.ssid.as_str()).collect();
        assert_eq!(ssids, vec!["CoffeeBar", "HomeNet"]);
    }

    #[test]
    fn scan_parse_deduplicates() {
        let mut data = Vec::new();
        for _ in 0..3 {
            data.extend_from_slice(&4u32.to_le_bytes());
            data.extend_from_slice(b"mesh");
            data.extend_from_slice(&[0u8; 8]);
        }
        assert_eq!(parse_network_list(&data).len(), 1);
    }

    #[test]
    fn scan_parse_skips_unprintable_candidates() {
        let mut data = Vec::new();
        data.extend_from_slice(&4u32.to_le_bytes());
        data.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]);
        assert!(parse_network_list(&data).is_empty());
    }

    #[test]
    fn security_flags_found_relative_to_ssid() {
        let mut scan = vec![0u8; 256];
        let entry_start = 60usize;
        let flags_at = entry_start + SCAN_ENTRY_FLAGS_OFFSET;
        scan[flags_at..flags_at + 4].copy_from_slice(&0xAAu32.to_le_bytes());
        scan[flags_at + 4..flags_at + 8].copy_from_slice(&0xBBu32.to_le_bytes());
        scan[flags_at + 8..flags_at + 12].copy_from_slice(&0xCCu32.to_le_bytes());
        let ssid_at = entry_start + SCAN_ENTRY_SSID_OFFSET;
        scan[ssid_at..ssid_at + 7].copy_from_slice(b"HomeNet");

        assert_eq!(find_security_flags(&scan, "HomeNet"), Some([0xAA, 0xBB, 0xCC]));
        assert_eq!(find_security_flags(&scan, "Absent"), None);
    }

    #[test]
    fn guid_bracing() {
        assert_eq!(
            format_guid_with_braces("45a663b5-b1cb-4a91-bff6-2bef7bbfdd76"),
            "{45A663B5-B1CB-4A91-BFF6-2BEF7BBFDD76}"
        );
        assert_eq!(
            format_guid_with_braces("{45A663B5-B1CB-4A91-BFF6-2BEF7BBFDD76}"),
            "{45A663B5-B1CB-4A91-BFF6-2BEF7BBFDD76}"
        );
    }
}
