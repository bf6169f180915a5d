//! Ed25519 signing and verification of chain blocks.
//!
//! Verification never errors: bad hex, wrong lengths and invalid points all
//! come back as `false`.

use crate::types::Block;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

/// Length of an Ed25519 public key in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length of an Ed25519 signature in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Generate a new Ed25519 keypair.
///
/// Returns (secret_key_bytes, public_key_bytes).
pub fn keygen() -> ([u8; 32], [u8; 32]) {
    let secret: [u8; 32] = rand::random();
    let public = SigningKey::from_bytes(&secret).verifying_key().to_bytes();
    (secret, public)
}

/// Sign raw message bytes, returning the detached signature as hex.
pub fn sign_message(message: &[u8], secret_key: &[u8; 32]) -> String {
    let signing_key = SigningKey::from_bytes(secret_key);
    hex::encode(signing_key.sign(message).to_bytes())
}

/// Sign a block the way a capture device does.
///
/// The `signature` field of `block` is ignored; the hex signature over the
/// block's signed message is returned.
pub fn sign_block(block: &Block, secret_key: &[u8; 32]) -> String {
    sign_message(&block.signed_preimage().encode(), secret_key)
}

/// Verify a detached signature over `message`.
///
/// # Arguments
/// * `message` - The exact bytes that were signed
/// * `signature` - 64-byte Ed25519 signature
/// * `public_key` - 32-byte Ed25519 public key
///
/// # Returns
/// `true` if the signature is valid, `false` otherwise (including any
/// malformed input).
pub fn verify_signature(message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
    let Ok(sig_array) = <[u8; SIGNATURE_LEN]>::try_from(signature) else {
        return false;
    };
    let Ok(key_array) = <[u8; PUBLIC_KEY_LEN]>::try_from(public_key) else {
        return false;
    };
    let verifying_key = match VerifyingKey::from_bytes(&key_array) {
        Ok(key) => key,
        Err(_) => return false,
    };
    verifying_key
        .verify(message, &Signature::from_bytes(&sig_array))
        .is_ok()
}

/// Hex-string variant of [`verify_signature`].
pub fn verify_signature_hex(message: &[u8], signature_hex: &str, public_key_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(public_key) = hex::decode(public_key_hex) else {
        return false;
    };
    verify_signature(message, &signature, &public_key)
}

/// Verify a block's own signature against a device public key (hex).
pub fn verify_block_signature(block: &Block, public_key_hex: &str) -> bool {
    verify_signature_hex(
        &block.signed_preimage().encode(),
        &block.signature,
        public_key_hex,
    )
}
