//! Parsing and normalization of Ethereum-style account addresses.

use alloy_primitives::Address;
use k256::ecdsa::VerifyingKey;
use tiny_keccak::{Hasher, Keccak};

use crate::error::AuthError;

/// Number of hex digits in a 20-byte address
const ADDRESS_HEX_LEN: usize = 40;

/// Strip an optional `0x`/`0X` prefix
pub(crate) fn strip_hex_prefix(input: &str) -> &str {
    input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input)
}

/// Parse a hex address in any letter case, with or without the `0x` prefix.
///
/// Checksum casing is accepted but not enforced; `0xABCD..`, `0xabcd..` and
/// the EIP-55 form all parse to the same address.
pub fn parse_address(input: &str) -> Result<Address, AuthError> {
    let digits = strip_hex_prefix(input);

    if digits.len() != ADDRESS_HEX_LEN {
        return Err(AuthError::InvalidAddress(format!(
            "expected {} hex digits, got {}",
            ADDRESS_HEX_LEN,
            digits.len()
        )));
    }

    let bytes = hex::decode(digits)
        .map_err(|e| AuthError::InvalidAddress(e.to_string()))?;

    Ok(Address::from_slice(&bytes))
}

/// Whether `input` is a syntactically valid hex address
pub fn is_hex_address(input: &str) -> bool {
    parse_address(input).is_ok()
}

/// Canonical storage key for an address: `0x` followed by lowercase hex
pub fn normalized(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

/// Parse `input` and return its canonical storage key
pub fn normalize_address(input: &str) -> Result<String, AuthError> {
    parse_address(input).map(|address| normalized(&address))
}

/// EIP-55 mixed-case rendering of an address
pub fn to_checksum(address: &Address) -> String {
    address.to_checksum(None)
}

/// Keccak-256 (original Keccak padding, not FIPS SHA3-256)
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut keccak = Keccak::v256();
    let mut hash = [0u8; 32];
    keccak.update(data);
    keccak.finalize(&mut hash);
    hash
}

/// Derive the address owning a public key.
///
/// Keccak-256 over the 64-byte uncompressed `x || y` encoding (the SEC1
/// `0x04` tag is dropped), keeping the last 20 bytes of the digest.
pub fn public_key_to_address(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..32])
}
