//! Key material: the loaded MTPZ bundle and the per-session derived key.

use crate::block;
use crate::rsa::MODULUS_BYTES;
use mtpkit_core::error::CryptoError;
use sha1::{Digest, Sha1};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Width of the symmetric base key seed.
pub const SEED_BYTES: usize = 20;

/// The host key bundle loaded once at startup.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyBundle {
    /// RSA-1024 modulus N, big-endian.
    pub modulus: Vec<u8>,
    /// RSA-1024 private exponent D, big-endian.
    pub private_exponent: Vec<u8>,
    /// 20-byte symmetric base key seed.
    pub seed: Vec<u8>,
    /// Device-signed certificate blob, transmitted verbatim.
    #[zeroize(skip)]
    pub certificate: Vec<u8>,
}

impl KeyBundle {
    pub fn new(
        modulus: Vec<u8>,
        private_exponent: Vec<u8>,
        seed: Vec<u8>,
        certificate: Vec<u8>,
    ) -> Result<Self, CryptoError> {
        if modulus.len() != MODULUS_BYTES {
            return Err(CryptoError::InvalidKeyLength {
                expected: MODULUS_BYTES,
                actual: modulus.len(),
            });
        }
        if private_exponent.len() != MODULUS_BYTES {
            return Err(CryptoError::InvalidKeyLength {
                expected: MODULUS_BYTES,
                actual: private_exponent.len(),
            });
        }
        if seed.len() != SEED_BYTES {
            return Err(CryptoError::InvalidKeyLength {
                expected: SEED_BYTES,
                actual: seed.len(),
            });
        }
        Ok(Self { modulus, private_exponent, seed, certificate })
    }

    /// SHA-1 of the certificate blob, bound into the challenge digest.
    pub fn certificate_hash(&self) -> [u8; 20] {
        let mut hasher = Sha1::new();
        hasher.update(&self.certificate);
        hasher.finalize().into()
    }
}

/// Per-session symmetric key derived after a successful handshake:
/// `SHA1(Cdev || Chost || seed)` truncated to 16 bytes.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; 16]);

impl SessionKey {
    pub fn derive(device_nonce: &[u8; 16], host_nonce: &[u8; 16], seed: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(device_nonce);
        hasher.update(host_nonce);
        hasher.update(seed);
        let digest = hasher.finalize();
        let mut key = [0u8; 16];
        key.copy_from_slice(&digest[..16]);
        Self(key)
    }

    /// MAC a vendor payload.
    pub fn mac(&self, message: &[u8]) -> [u8; 16] {
        block::cmac(&self.0, message)
    }

    /// Encrypt or decrypt a vendor payload with the counter-mode keystream.
    pub fn apply_keystream(&self, nonce: &[u8; 12], data: &[u8]) -> Vec<u8> {
        block::ctr_apply(&self.0, nonce, data)
    }

    /// Constant-time check of a received MAC.
    pub fn verify_mac(&self, message: &[u8], tag: &[u8]) -> bool {
        use subtle::ConstantTimeEq;
        self.mac(message)[..].ct_eq(tag).into()
    }
}
