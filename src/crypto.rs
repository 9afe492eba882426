use chacha20poly1305::{AeadInPlace, ChaCha20Poly1305, Key, KeyInit, Nonce, Tag};
use rand::RngCore;

use crate::error::NetcodeError;
use crate::{KEY_BYTES, MAC_BYTES, NONCE_BYTES};

pub fn generate_random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

pub fn generate_key() -> [u8; KEY_BYTES] {
    generate_random_bytes()
}

// The wire carries an 8 byte little-endian sequence; the cipher sees it
// zero-extended on the left to 12 bytes.
fn sequence_nonce(sequence: u64) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[12 - NONCE_BYTES..].copy_from_slice(&sequence.to_le_bytes());
    nonce
}

/// Seals `buffer` in place: the final `MAC_BYTES` receive the authentication
/// tag, everything before them is encrypted.
pub fn encrypt_in_place(
    buffer: &mut [u8],
    sequence: u64,
    key: &[u8; KEY_BYTES],
    aad: &[u8],
) -> Result<(), NetcodeError> {
    if buffer.len() < MAC_BYTES {
        return Err(NetcodeError::PacketTooSmall);
    }

    let (plaintext, tag_buffer) = buffer.split_at_mut(buffer.len() - MAC_BYTES);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = sequence_nonce(sequence);
    let tag = cipher.encrypt_in_place_detached(Nonce::from_slice(&nonce), aad, plaintext)?;
    tag_buffer.copy_from_slice(&tag);

    Ok(())
}

/// Opens `buffer` in place; after success the plaintext occupies everything
/// before the final `MAC_BYTES`.
pub fn decrypt_in_place(
    buffer: &mut [u8],
    sequence: u64,
    key: &[u8; KEY_BYTES],
    aad: &[u8],
) -> Result<(), NetcodeError> {
    if buffer.len() < MAC_BYTES {
        return Err(NetcodeError::PacketTooSmall);
    }

    let (ciphertext, tag_buffer) = buffer.split_at_mut(buffer.len() - MAC_BYTES);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = sequence_nonce(sequence);
    let tag = Tag::clone_from_slice(tag_buffer);
    cipher.decrypt_in_place_detached(Nonce::from_slice(&nonce), aad, ciphertext, &tag)?;

    Ok(())
}
