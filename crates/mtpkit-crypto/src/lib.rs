//! # mtpkit-crypto
//!
//! Cryptographic primitives backing the MTPZ trusted-app handshake:
//! raw RSA-1024 modular exponentiation, SHA-1 digests, and the AES-128-ECB
//! building blocks (a CMAC-style MAC and a counter-mode keystream) used for
//! vendor payloads.

pub mod block;
pub mod keys;
pub mod rsa;

pub use block::{cmac, ctr_apply, ecb_encrypt_block};
pub use keys::{KeyBundle, SessionKey};
pub use rsa::{encrypt_block, public_op, sign, MODULUS_BYTES, PUBLIC_EXPONENT};
