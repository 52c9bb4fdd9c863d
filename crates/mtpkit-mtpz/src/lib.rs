//! # mtpkit-mtpz
//!
//! The MTPZ trusted-application layer: prove to the device that the host
//! holds a Microsoft-issued key bundle, derive per-session key material, and
//! run the vendor operations that authentication unlocks (wireless
//! provisioning, partnership GUIDs).
//!
//! A missing or unparseable key bundle is never fatal: the component reports
//! `keys_loaded() == false` and refuses vendor-gated operations locally,
//! without any USB traffic.

mod bundle;
mod trusted;
mod wifi;

pub use bundle::{default_bundle_path, load_bundle, DEFAULT_BUNDLE_FILENAME};
pub use trusted::TrustedApp;
pub use wifi::{WifiNetwork, DEFAULT_SECURITY_FLAGS, WIFI_PROFILE_LEN};
