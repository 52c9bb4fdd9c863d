//! AES-128-ECB building blocks.
//!
//! The trusted-app protocol keys a CMAC-style MAC and a counter-mode
//! keystream off the per-session key; both are built from the bare block
//! cipher here.

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

/// Encrypt one 16-byte block with AES-128.
pub fn ecb_encrypt_block(key: &[u8; 16], block: &[u8; 16]) -> [u8; 16] {
    let cipher = Aes128::new_from_slice(key).expect("16-byte key");
    let mut out = *block;
    let arr = aes::Block::from_mut_slice(&mut out);
    cipher.encrypt_block(arr);
    out
}

/// Left shift of a 16-byte block by one bit.
fn shift_left(block: &[u8; 16]) -> [u8; 16] {
    let mut out = [0u8; 16];
    let mut carry = 0u8;
    for i in (0..16).rev() {
        out[i] = (block[i] << 1) | carry;
        carry = block[i] >> 7;
    }
    out
}

/// CMAC subkey derivation (doubling in GF(2^128) with Rb = 0x87).
fn derive_subkey(block: &[u8; 16]) -> [u8; 16] {
    let mut out = shift_left(block);
    if block[0] & 0x80 != 0 {
        out[15] ^= 0x87;
    }
    out
}

/// AES-CMAC over an arbitrary message (RFC 4493).
pub fn cmac(key: &[u8; 16], message: &[u8]) -> [u8; 16] {
    let l = ecb_encrypt_block(key, &[0u8; 16]);
    let k1 = derive_subkey(&l);
    let k2 = derive_subkey(&k1);

    let mut last = [0u8; 16];
    let (full_blocks, complete) = if message.is_empty() {
        (0, false)
    } else {
        let blocks = message.len().div_ceil(16);
        (blocks - 1, message.len() % 16 == 0)
    };

    if complete {
        let tail = &message[full_blocks * 16..];
        for i in 0..16 {
            last[i] = tail[i] ^ k1[i];
        }
    } else {
        let tail = &message[full_blocks * 16..];
        last[..tail.len()].copy_from_slice(tail);
        last[tail.len()] = 0x80;
        for i in 0..16 {
            last[i] ^= k2[i];
        }
    }

    let mut x = [0u8; 16];
    for block in message[..full_blocks * 16].chunks_exact(16) {
        for i in 0..16 {
            x[i] ^= block[i];
        }
        x = ecb_encrypt_block(key, &x);
    }
    for i in 0..16 {
        x[i] ^= last[i];
    }
    ecb_encrypt_block(key, &x)
}

/// XOR `data` with a counter-mode keystream: the nonce block is encrypted
/// with a big-endian counter in its final four bytes, one block per 16 bytes
/// of data. Applying twice restores the input.
pub fn ctr_apply(key: &[u8; 16], nonce: &[u8; 12], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for (counter, chunk) in data.chunks(16).enumerate() {
        let mut block = [0u8; 16];
        block[..12].copy_from_slice(nonce);
        block[12..].copy_from_slice(&(counter as u32).to_be_bytes());
        let keystream = ecb_encrypt_block(key, &block);
        for (i, byte) in chunk.iter().enumerate() {
            out.push(byte ^ keystream[i]);
        }
    }
    out
}
