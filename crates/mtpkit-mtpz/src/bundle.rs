//! Key-bundle file loading.
//!
//! The bundle file (`~/.mtpz-data` by default) holds four newline-separated
//! lowercase-hex fields: the RSA-1024 modulus, the private exponent, the
//! 20-byte base key seed, and the certificate blob.

use mtpkit_core::error::AuthenticationError;
use mtpkit_crypto::KeyBundle;
use std::path::{Path, PathBuf};

/// File name looked up under `$HOME` when no explicit path is configured.
pub const DEFAULT_BUNDLE_FILENAME: &str = ".mtpz-data";

/// `$HOME/.mtpz-data`, when `$HOME` is set.
pub fn default_bundle_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| Path::new(&home).join(DEFAULT_BUNDLE_FILENAME))
}

/// Load and parse a key bundle.
pub async fn load_bundle(path: &Path) -> Result<KeyBundle, AuthenticationError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AuthenticationError::MalformedKeys(format!("{}: {e}", path.display())))?;
    parse_bundle(&text)
}

fn parse_bundle(text: &str) -> Result<KeyBundle, AuthenticationError> {
    let mut fields = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let mut next = |name: &str| -> Result<Vec<u8>, AuthenticationError> {
        let line = fields
            .next()
            .ok_or_else(|| AuthenticationError::MalformedKeys(format!("missing {name} field")))?;
        hex::decode(line)
            .map_err(|_| AuthenticationError::MalformedKeys(format!("{name} is not valid hex")))
    };

    let modulus = next("modulus")?;
    let private_exponent = next("private exponent")?;
    let seed = next("seed")?;
    let certificate = next("certificate")?;

    KeyBundle::new(modulus, private_exponent, seed, certificate)
        .map_err(|e| AuthenticationError::MalformedKeys(e.to_string()))
}
