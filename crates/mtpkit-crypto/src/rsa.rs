//! Raw (textbook) RSA-1024 over fixed-width big-endian blocks.
//!
//! The trusted-app protocol never uses standardised RSA padding: signatures
//! are a private-key exponentiation of the raw digest, and payload encryption
//! frames the plaintext into a 128-byte block before the public-key
//! exponentiation.

use mtpkit_core::error::CryptoError;
use num_bigint::BigUint;
use rand::RngCore;

/// Modulus width: 1024 bits.
pub const MODULUS_BYTES: usize = 128;

/// Fixed public exponent.
pub const PUBLIC_EXPONENT: u32 = 65537;

fn to_fixed(value: &BigUint) -> [u8; MODULUS_BYTES] {
    let bytes = value.to_bytes_be();
    let mut out = [0u8; MODULUS_BYTES];
    out[MODULUS_BYTES - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// Private-key operation: `m^d mod n` over a big-endian message block.
pub fn sign(
    message: &[u8],
    modulus: &[u8],
    private_exponent: &[u8],
) -> Result<[u8; MODULUS_BYTES], CryptoError> {
    if modulus.len() != MODULUS_BYTES || private_exponent.len() != MODULUS_BYTES {
        return Err(CryptoError::InvalidKeyLength {
            expected: MODULUS_BYTES,
            actual: modulus.len().max(private_exponent.len()),
        });
    }
    let n = BigUint::from_bytes_be(modulus);
    let d = BigUint::from_bytes_be(private_exponent);
    let m = BigUint::from_bytes_be(message);
    if m >= n {
        return Err(CryptoError::ValueOutOfRange);
    }
    Ok(to_fixed(&m.modpow(&d, &n)))
}

/// Public-key operation: `m^e mod n` with `e = 65537`. Used both for
/// verifying our own signatures and for encrypting toward the device key.
pub fn public_op(message: &[u8], modulus: &[u8]) -> Result<[u8; MODULUS_BYTES], CryptoError> {
    if modulus.len() != MODULUS_BYTES {
        return Err(CryptoError::InvalidKeyLength {
            expected: MODULUS_BYTES,
            actual: modulus.len(),
        });
    }
    let n = BigUint::from_bytes_be(modulus);
    let m = BigUint::from_bytes_be(message);
    if m >= n {
        return Err(CryptoError::ValueOutOfRange);
    }
    let e = BigUint::from(PUBLIC_EXPONENT);
    Ok(to_fixed(&m.modpow(&e, &n)))
}

/// Frame a plaintext into a 128-byte encryption block and run the public-key
/// operation against the device modulus.
///
/// Block layout: `0x00 0x02`, nonzero random padding, `0x00`, then the
/// plaintext right-aligned. The padding keeps the integer value below the
/// modulus.
pub fn encrypt_block(
    plaintext: &[u8],
    device_modulus: &[u8],
    rng: &mut dyn RngCore,
) -> Result<[u8; MODULUS_BYTES], CryptoError> {
    // Two marker bytes, at least one padding byte, one separator.
    let max_plaintext = MODULUS_BYTES - 4;
    if plaintext.len() > max_plaintext {
        return Err(CryptoError::PlaintextTooLong { len: plaintext.len(), max: max_plaintext });
    }

    let mut block = [0u8; MODULUS_BYTES];
    block[0] = 0x00;
    block[1] = 0x02;
    let pad_len = MODULUS_BYTES - 3 - plaintext.len();
    for byte in block[2..2 + pad_len].iter_mut() {
        // Padding bytes must be nonzero so the separator is unambiguous.
        loop {
            let candidate = (rng.next_u32() & 0xFF) as u8;
            if candidate != 0 {
                *byte = candidate;
                break;
            }
        }
    }
    block[2 + pad_len] = 0x00;
    block[3 + pad_len..].copy_from_slice(plaintext);

    public_op(&block, device_modulus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    // Deterministic 1024-bit test key.
    const TEST_N: &str = concat!(
        "b168ea14f24ab873d9bee4fef3ff4a36f30686bd9816f181e3300e7a482e3369",
        "9c990cc07d2281f0f2862af093ab108d894dd2649c5c49d3f8a638f196fa3fd9",
        "ba0b378b33f3b153b5f26ca8636c8785eb6b1114a6f91a4a00f53e0592e46888",
        "195be4bb9142000db9d3218da8f3c5afcdafb4250a84efe678b28245ebb916bb"
    );
    const TEST_D: &str = concat!(
        "739c7f0eef662a15b50c65868fd309b60d616f65163bbd5e7b82d1ac76654533",
        "c9cd23363d55c380154bc1a7cd536912132c17b36101f34aa37b0f18c0de8bc4",
        "6a09b7bec33f6cbc959c8b2ba598eedaf111eb372ecf35c1d8458db7ab2dcf78",
        "d15e5dcc14d717e266802194755c4f9bf12ec0ae949f1ced4bbe19ea55468b21"
    );
    // SHA-1("test message") signed with the key above.
    const TEST_DIGEST: &str = "35ee8386410d41d14b3f779fc95f4695f4851682";
    const TEST_SIG: &str = concat!(
        "26c2f37303fdc989424113bbfa79a90da1b4b3e15956392b07297305f297e182",
        "ae7e8b6e439f18a206b42af85dea6f6cd3c694e8ff55aaace8de8290671a3866",
        "b59600cacc6e2b84e8c0f90709ef14cbf45d7186c19edfc44d3059cb76c1e90d",
        "2df039c66ffdc690c94b67f7171da52a98988913d82e6a9d61ca70c7f49130b2"
    );

    fn n() -> Vec<u8> {
        hex::decode(TEST_N).unwrap()
    }

    fn d() -> Vec<u8> {
        hex::decode(TEST_D).unwrap()
    }

    #[test]
    fn sign_matches_fixed_vector() {
        let sig = sign(&hex::decode(TEST_DIGEST).unwrap(), &n(), &d()).unwrap();
        assert_eq!(hex::encode(sig), TEST_SIG);
    }

    #[test]
    fn sign_then_public_op_round_trips() {
        let digest = hex::decode(TEST_DIGEST).unwrap();
        let sig = sign(&digest, &n(), &d()).unwrap();
        let recovered = public_op(&sig, &n()).unwrap();
        // The recovered block is the digest left-padded to 128 bytes.
        assert_eq!(&recovered[MODULUS_BYTES - digest.len()..], &digest[..]);
        assert!(recovered[..MODULUS_BYTES - digest.len()].iter().all(|&b| b == 0));
    }

    #[test]
    fn message_larger_than_modulus_rejected() {
        let huge = [0xFFu8; MODULUS_BYTES];
        assert!(matches!(
            sign(&huge, &n(), &d()),
            Err(CryptoError::ValueOutOfRange)
        ));
    }

    #[test]
    fn wrong_key_width_rejected() {
        assert!(matches!(
            sign(&[1], &[0u8; 64], &d()),
            Err(CryptoError::InvalidKeyLength { .. })
        ));
    }

    #[test]
    fn encrypt_block_layout() {
        let password: Vec<u8> = "secret".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        let ciphertext = encrypt_block(&password, &n(), &mut OsRng).unwrap();

        assert_eq!(ciphertext.len(), MODULUS_BYTES);
        // Ciphertext as an integer must be below the modulus.
        let c = num_bigint::BigUint::from_bytes_be(&ciphertext);
        let modulus = num_bigint::BigUint::from_bytes_be(&n());
        assert!(c < modulus);
    }

    #[test]
    fn encrypt_block_rejects_oversized_plaintext() {
        let long = vec![0x41u8; MODULUS_BYTES - 3];
        assert!(matches!(
            encrypt_block(&long, &n(), &mut OsRng),
            Err(CryptoError::PlaintextTooLong { .. })
        ));
    }

    #[test]
    fn encrypt_block_randomises_padding() {
        let ct1 = encrypt_block(b"pw", &n(), &mut OsRng).unwrap();
        let ct2 = encrypt_block(b"pw", &n(), &mut OsRng).unwrap();
        assert_ne!(ct1, ct2, "random padding must vary");
    }
}
