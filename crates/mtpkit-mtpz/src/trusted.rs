//! The trusted-application handshake.
//!
//! Four vendor operations prove key possession to the device:
//! GetCertificate pulls the device certificate chain (carrying its unique
//! RSA public key), SendHostCertificate pushes ours, GetChallenge yields a
//! nonce and salt, and SendChallengeResponse answers with our own nonce plus
//! an RSA signature over the challenge digest.

use crate::bundle;
use mtpkit_core::codes::OperationCode;
use mtpkit_core::error::AuthenticationError;
use mtpkit_core::{Error, Result};
use mtpkit_crypto::{rsa, KeyBundle, SessionKey};
use mtpkit_ptp::SharedSession;
use rand::RngCore;
use sha1::{Digest, Sha1};
use std::path::Path;
use tracing::{debug, info, warn};

/// Device nonce width in the challenge payload.
const NONCE_BYTES: usize = 16;
/// Salt width in the challenge payload.
const SALT_BYTES: usize = 20;

/// Trusted-application state bound to one session.
pub struct TrustedApp {
    session: SharedSession,
    keys: Option<KeyBundle>,
    device_modulus: Option<Vec<u8>>,
    session_key: Option<SessionKey>,
    authenticated: bool,
}

impl TrustedApp {
    /// Load the key bundle (missing or malformed keys are not fatal) and
    /// bind to a session.
    pub async fn create(session: SharedSession, bundle_path: Option<&Path>) -> Self {
        let resolved = match bundle_path {
            Some(path) => Some(path.to_path_buf()),
            None => bundle::default_bundle_path(),
        };
        let keys = match resolved {
            Some(path) => match bundle::load_bundle(&path).await {
                Ok(bundle) => {
                    info!(path = %path.display(), "MTPZ key bundle loaded");
                    Some(bundle)
                }
                Err(e) => {
                    warn!(path = %path.display(), "MTPZ keys unavailable: {e}");
                    None
                }
            },
            None => None,
        };
        Self { session, keys, device_modulus: None, session_key: None, authenticated: false }
    }

    /// Whether the device advertises the handshake operations at all.
    pub async fn probe(session: &SharedSession) -> bool {
        let session = session.lock().await;
        let info = session.device_info();
        info.supports_operation(OperationCode::GetCertificate)
            && info.supports_operation(OperationCode::SendHostCertificate)
    }

    pub fn keys_loaded(&self) -> bool {
        self.keys.is_some()
    }

    pub fn has_device_key(&self) -> bool {
        self.device_modulus.is_some()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Refuse vendor-gated work locally when the key bundle is absent.
    pub(crate) fn require_keys(&self) -> Result<&KeyBundle> {
        self.keys
            .as_ref()
            .ok_or_else(|| AuthenticationError::AuthenticationRequired.into())
    }

    pub(crate) fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Run the challenge/response ritual. Idempotent: once authenticated,
    /// further calls return immediately.
    pub async fn authenticate(&mut self) -> Result<()> {
        if self.authenticated {
            return Ok(());
        }
        let keys = self
            .keys
            .as_ref()
            .ok_or(AuthenticationError::AuthenticationRequired)?;

        let mut session = self.session.lock().await;

        debug!("fetching device certificate");
        let device_cert = session.vendor_in(OperationCode::GetCertificate, &[]).await?;
        let device_modulus = extract_device_modulus(&device_cert)?;

        debug!(len = keys.certificate.len(), "sending host certificate");
        session
            .vendor_out(OperationCode::SendHostCertificate, &[], &keys.certificate)
            .await
            .map_err(|e| match e {
                Error::Mtp(code) if code.is_fatal() => {
                    AuthenticationError::CertificateRejected.into()
                }
                other => other,
            })?;

        let challenge = session.vendor_in(OperationCode::GetChallenge, &[]).await?;
        if challenge.len() < NONCE_BYTES + SALT_BYTES {
            return Err(AuthenticationError::MalformedCertificate(format!(
                "challenge too short: {} bytes",
                challenge.len()
            ))
            .into());
        }
        let mut device_nonce = [0u8; NONCE_BYTES];
        device_nonce.copy_from_slice(&challenge[..NONCE_BYTES]);
        let salt = &challenge[NONCE_BYTES..NONCE_BYTES + SALT_BYTES];

        // sig = RSA_sign(SHA1(Cdev || salt || host_cert_hash), D)
        let mut hasher = Sha1::new();
        hasher.update(device_nonce);
        hasher.update(salt);
        hasher.update(keys.certificate_hash());
        let digest: [u8; 20] = hasher.finalize().into();
        let signature = rsa::sign(&digest, &keys.modulus, &keys.private_exponent)?;

        let mut host_nonce = [0u8; NONCE_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut host_nonce);

        let mut response = Vec::with_capacity(NONCE_BYTES + signature.len());
        response.extend_from_slice(&host_nonce);
        response.extend_from_slice(&signature);

        debug!("answering challenge");
        session
            .vendor_out(OperationCode::SendChallengeResponse, &[], &response)
            .await
            .map_err(|e| match e {
                Error::Mtp(code) if code.is_fatal() => {
                    AuthenticationError::ChallengeRejected.into()
                }
                other => other,
            })?;
        drop(session);

        self.session_key = Some(SessionKey::derive(&device_nonce, &host_nonce, &keys.seed));
        self.device_modulus = Some(device_modulus);
        self.authenticated = true;
        info!("trusted-app authentication complete");
        Ok(())
    }

    /// Key material derived by the handshake.
    pub fn session_key(&self) -> Option<&SessionKey> {
        self.session_key.as_ref()
    }

    /// Encrypt a Wi-Fi password toward the device's unique RSA key. Output
    /// is always a 128-byte big-endian integer below the device modulus.
    pub fn encrypt_wifi_password(&self, password: &str) -> Result<[u8; rsa::MODULUS_BYTES]> {
        let modulus = self
            .device_modulus
            .as_ref()
            .ok_or(AuthenticationError::AuthenticationRequired)?;
        let utf16: Vec<u8> = password
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect();
        Ok(rsa::encrypt_block(&utf16, modulus, &mut rand::rngs::OsRng)?)
    }
}

/// Pull the device's 128-byte RSA modulus out of its certificate chain.
///
/// The chain is not a standard X.509 container; the modulus is located by
/// its size marker (0x00 0x80) with the public-exponent marker 65537
/// following the modulus bytes.
fn extract_device_modulus(cert: &[u8]) -> Result<Vec<u8>> {
    const EXPONENT_MARKER: [u8; 3] = [0x01, 0x00, 0x01];

    let mut offset = 0usize;
    while offset + 2 + rsa::MODULUS_BYTES <= cert.len() {
        if cert[offset] == 0x00 && cert[offset + 1] == 0x80 {
            let start = offset + 2;
            let end = start + rsa::MODULUS_BYTES;
            let tail = &cert[end..];
            let followed_by_exponent = tail.starts_with(&EXPONENT_MARKER)
                || (tail.first() == Some(&0x00) && tail[1..].starts_with(&EXPONENT_MARKER));
            if cert[start] != 0 && followed_by_exponent {
                return Ok(cert[start..end].to_vec());
            }
        }
        offset += 1;
    }
    Err(AuthenticationError::MalformedCertificate(
        "no RSA modulus marker in device certificate".into(),
    )
    .into())
}
