use alloy_primitives::Address;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};

use crate::address::{keccak256, parse_address, public_key_to_address, strip_hex_prefix};
use crate::error::AuthError;

/// Prefix prepended to every message before hashing, as wallets do for `personal_sign`
pub const SIGNED_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Length of an `r || s || v` recoverable signature
pub const SIGNATURE_LEN: usize = 65;

/// Offset wallets add to the recovery id in the `v` byte
const LEGACY_V_OFFSET: u8 = 27;

/// A decoded recoverable signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthSignature {
    /// r component
    pub r: [u8; 32],
    /// s component
    pub s: [u8; 32],
    /// Raw recovery byte as transmitted (0/1 or 27/28)
    pub v: u8,
}

impl EthSignature {
    /// Decode a hex signature, with or without the `0x` prefix.
    ///
    /// Anything that is not valid hex or not exactly 65 bytes is rejected.
    pub fn from_hex(input: &str) -> Result<Self, AuthError> {
        let bytes = hex::decode(strip_hex_prefix(input))
            .map_err(|e| AuthError::MalformedSignature(format!("failed to decode signature: {}", e)))?;

        if bytes.len() != SIGNATURE_LEN {
            return Err(AuthError::MalformedSignature(format!(
                "expected {} bytes, got {}",
                SIGNATURE_LEN,
                bytes.len()
            )));
        }

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[0..32]);
        s.copy_from_slice(&bytes[32..64]);

        Ok(Self { r, s, v: bytes[64] })
    }

    /// Normalized recovery id.
    ///
    /// `v >= 27` has 27 subtracted; the result must then be 0 or 1.
    pub fn recovery_id(&self) -> Result<RecoveryId, AuthError> {
        let v = if self.v >= LEGACY_V_OFFSET {
            self.v - LEGACY_V_OFFSET
        } else {
            self.v
        };

        if v > 1 {
            return Err(AuthError::MalformedSignature(format!("invalid recovery byte {}", self.v)));
        }

        RecoveryId::from_byte(v)
            .ok_or_else(|| AuthError::MalformedSignature(format!("invalid recovery byte {}", self.v)))
    }

    /// The 64-byte `r || s` pair
    pub fn rs_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s);
        out
    }

    /// Re-encode as `0x`-prefixed hex
    pub fn to_hex(&self) -> String {
        let mut bytes = self.rs_bytes().to_vec();
        bytes.push(self.v);
        format!("0x{}", hex::encode(bytes))
    }
}

/// Build the exact byte sequence a wallet signs for `message`.
///
/// The length is the decimal byte length, so multi-byte UTF-8 characters
/// count once per byte.
pub fn signing_payload(message: &[u8]) -> Vec<u8> {
    let length = message.len().to_string();
    let mut payload = Vec::with_capacity(SIGNED_MESSAGE_PREFIX.len() + length.len() + message.len());
    payload.extend_from_slice(SIGNED_MESSAGE_PREFIX.as_bytes());
    payload.extend_from_slice(length.as_bytes());
    payload.extend_from_slice(message);
    payload
}

/// Digest of the prefixed message
pub fn hash_message(message: &[u8]) -> [u8; 32] {
    keccak256(&signing_payload(message))
}

/// Recover the public key that produced `signature` over `message`
pub fn recover_public_key(message: &[u8], signature: &EthSignature) -> Result<VerifyingKey, AuthError> {
    let recovery_id = signature.recovery_id()?;
    let digest = hash_message(message);

    log::debug!("ETH_AUTH: Message hash: {}", hex::encode(digest));
    log::debug!("ETH_AUTH: Recovery ID: {}", recovery_id.to_byte());

    // r or s of zero or outside the group order cannot be recovered from
    let sig = Signature::from_slice(&signature.rs_bytes())
        .map_err(|_| AuthError::RecoveryFailure)?;

    // Both halves of s are accepted. The high-S twin (r, n - s) recovers the
    // same key once s is negated and the y parity flipped.
    let (sig, recovery_id) = match sig.normalize_s() {
        Some(low) => (low, RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced())),
        None => (sig, recovery_id),
    };

    VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|_| AuthError::RecoveryFailure)
}

/// Recover the address that signed `message`
pub fn recover_address(message: &[u8], signature: &EthSignature) -> Result<Address, AuthError> {
    let key = recover_public_key(message, signature)?;
    let address = public_key_to_address(&key);
    log::debug!("ETH_AUTH: Recovered address: 0x{}", hex::encode(address.as_slice()));
    Ok(address)
}

/// Check that `claimed_address` signed `message`.
///
/// Returns `Ok(true)` when the recovered address equals the claimed one,
/// `Ok(false)` when a different key signed. Decoding problems surface as
/// `MalformedSignature` and unrecoverable signatures as `RecoveryFailure`.
/// Callers treat every outcome other than `Ok(true)` as unverified.
pub fn verify_signature(
    message: impl AsRef<[u8]>,
    signature: &str,
    claimed_address: &str,
) -> Result<bool, AuthError> {
    let claimed = parse_address(claimed_address)?;
    let signature = EthSignature::from_hex(signature)?;
    let recovered = recover_address(message.as_ref(), &signature)?;

    // Byte comparison; letter case of the claimed hex is already gone
    Ok(recovered == claimed)
}

/// Sign `message` the way a wallet's `personal_sign` does.
///
/// Returns the `0x`-prefixed 65-byte signature with `v` in {27, 28}.
pub fn sign_message(message: impl AsRef<[u8]>, signing_key: &SigningKey) -> Result<String, AuthError> {
    let digest = hash_message(message.as_ref());

    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(&digest)
        .map_err(|e| AuthError::MalformedSignature(format!("failed to sign message: {}", e)))?;

    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(recovery_id.to_byte() + LEGACY_V_OFFSET);

    Ok(format!("0x{}", hex::encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::to_checksum;
    use k256::Scalar;
    use rand::rngs::OsRng;

    fn keypair() -> (SigningKey, Address) {
        let signing_key = SigningKey::random(&mut OsRng);
        let address = public_key_to_address(signing_key.verifying_key());
        (signing_key, address)
    }

    fn flip_byte(signature: &str, index: usize) -> String {
        let mut bytes = hex::decode(strip_hex_prefix(signature)).unwrap();
        bytes[index] ^= 0x01;
        format!("0x{}", hex::encode(bytes))
    }

    #[test]
    fn test_signing_payload_format() {
        let payload = signing_payload(b"Hello, Ethereum!");
        assert_eq!(payload, b"\x19Ethereum Signed Message:\n16Hello, Ethereum!".to_vec());

        let empty = signing_payload(b"");
        assert_eq!(empty, b"\x19Ethereum Signed Message:\n0".to_vec());
    }

    #[test]
    fn test_signing_payload_counts_bytes() {
        // 'é' is two bytes in UTF-8
        let message = "héllo";
        assert_eq!(message.chars().count(), 5);

        let payload = signing_payload(message.as_bytes());
        let mut expected = b"\x19Ethereum Signed Message:\n6".to_vec();
        expected.extend_from_slice(message.as_bytes());
        assert_eq!(payload, expected);
    }

    #[test]
    fn test_hash_message_uses_keccak() {
        assert_eq!(hash_message(b"abc"), keccak256(&signing_payload(b"abc")));
    }

    #[test]
    fn test_sign_and_verify() {
        let (signing_key, address) = keypair();
        let message = "login:123";

        let signature = sign_message(message, &signing_key).unwrap();
        assert_eq!(strip_hex_prefix(&signature).len(), SIGNATURE_LEN * 2);

        let claimed = to_checksum(&address);
        assert!(verify_signature(message, &signature, &claimed).unwrap());
    }

    #[test]
    fn test_verify_other_address_fails() {
        let (signing_key, _) = keypair();
        let (_, other_address) = keypair();
        let message = "login:123";

        let signature = sign_message(message, &signing_key).unwrap();
        let result = verify_signature(message, &signature, &to_checksum(&other_address)).unwrap();
        assert!(!result);
    }

    #[test]
    fn test_verify_case_insensitive_claim() {
        let (signing_key, address) = keypair();
        let message = "case check";
        let signature = sign_message(message, &signing_key).unwrap();

        let checksummed = to_checksum(&address);
        let lower = checksummed.to_lowercase();
        let upper = format!("0x{}", checksummed[2..].to_uppercase());
        let bare = lower[2..].to_string();

        for claimed in [checksummed, lower, upper, bare] {
            assert!(verify_signature(message, &signature, &claimed).unwrap(), "claim {} rejected", claimed);
        }
    }

    #[test]
    fn test_verify_multibyte_message() {
        let (signing_key, address) = keypair();
        let message = "sign in ✓ 日本語";
        let signature = sign_message(message, &signing_key).unwrap();
        assert!(verify_signature(message, &signature, &to_checksum(&address)).unwrap());
    }

    #[test]
    fn test_tampered_message_fails() {
        let (signing_key, address) = keypair();
        let signature = sign_message("login:123", &signing_key).unwrap();

        let result = verify_signature("login:124", &signature, &to_checksum(&address));
        assert!(!matches!(result, Ok(true)));
    }

    #[test]
    fn test_every_flipped_byte_fails() {
        let (signing_key, address) = keypair();
        let message = "login:123";
        let signature = sign_message(message, &signing_key).unwrap();
        let claimed = to_checksum(&address);

        for index in 0..SIGNATURE_LEN {
            let tampered = flip_byte(&signature, index);
            let result = verify_signature(message, &tampered, &claimed);
            assert!(!matches!(result, Ok(true)), "flipping byte {} still verified", index);
        }
    }

    #[test]
    fn test_recovery_byte_normalization() {
        let (signing_key, address) = keypair();
        let message = "normalize v";
        let signature = EthSignature::from_hex(&sign_message(message, &signing_key).unwrap()).unwrap();
        assert!(signature.v == 27 || signature.v == 28);

        let claimed = to_checksum(&address);

        // Same signature with v as 0/1 must verify too
        let raw = EthSignature { v: signature.v - 27, ..signature };
        assert!(verify_signature(message, &raw.to_hex(), &claimed).unwrap());
        assert!(verify_signature(message, &signature.to_hex(), &claimed).unwrap());
    }

    #[test]
    fn test_recovery_byte_out_of_range_rejected() {
        let (signing_key, address) = keypair();
        let message = "bad v";
        let signature = EthSignature::from_hex(&sign_message(message, &signing_key).unwrap()).unwrap();
        let claimed = to_checksum(&address);

        for v in [2u8, 4, 26, 29, 30, 35, 255] {
            let bad = EthSignature { v, ..signature };
            let result = verify_signature(message, &bad.to_hex(), &claimed);
            assert!(
                matches!(result, Err(AuthError::MalformedSignature(_))),
                "v = {} gave {:?}",
                v,
                result
            );
        }
    }

    #[test]
    fn test_swapped_recovery_id_does_not_verify() {
        let (signing_key, address) = keypair();
        let message = "swap v";
        let signature = EthSignature::from_hex(&sign_message(message, &signing_key).unwrap()).unwrap();
        let swapped = EthSignature { v: if signature.v == 27 { 28 } else { 27 }, ..signature };

        let result = verify_signature(message, &swapped.to_hex(), &to_checksum(&address));
        assert!(matches!(result, Ok(false) | Err(AuthError::RecoveryFailure)));
    }

    #[test]
    fn test_malformed_signatures() {
        let address = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";

        // Not hex
        assert!(matches!(
            verify_signature("m", "0xnothex", address),
            Err(AuthError::MalformedSignature(_))
        ));
        // Too short
        assert!(matches!(
            verify_signature("m", &format!("0x{}", "11".repeat(64)), address),
            Err(AuthError::MalformedSignature(_))
        ));
        // Too long
        assert!(matches!(
            verify_signature("m", &"11".repeat(66), address),
            Err(AuthError::MalformedSignature(_))
        ));
        // Odd number of digits
        assert!(matches!(
            verify_signature("m", &format!("0x{}1", "11".repeat(64)), address),
            Err(AuthError::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_uppercase_prefix_accepted() {
        let (signing_key, address) = keypair();
        let signature = sign_message("prefix", &signing_key).unwrap();
        let upper_prefixed = format!("0X{}", &signature[2..]);
        let bare = signature[2..].to_string();

        assert!(verify_signature("prefix", &upper_prefixed, &to_checksum(&address)).unwrap());
        assert!(verify_signature("prefix", &bare, &to_checksum(&address)).unwrap());
    }

    #[test]
    fn test_high_s_twin_verifies() {
        let (signing_key, address) = keypair();
        let message = "login:123";
        let signature = EthSignature::from_hex(&sign_message(message, &signing_key).unwrap()).unwrap();

        // Wallet output is low-S
        let low = Signature::from_slice(&signature.rs_bytes()).unwrap();
        assert!(low.normalize_s().is_none());

        let negated: Scalar = -*low.s();
        let mut high_s = [0u8; 32];
        high_s.copy_from_slice(&negated.to_bytes());
        let twin = EthSignature {
            r: signature.r,
            s: high_s,
            v: if signature.v == 27 { 28 } else { 27 },
        };
        assert!(Signature::from_slice(&twin.rs_bytes()).unwrap().normalize_s().is_some());

        let claimed = to_checksum(&address);
        assert!(verify_signature(message, &twin.to_hex(), &claimed).unwrap());
        assert_eq!(recover_address(message.as_bytes(), &twin).unwrap(), address);

        // The twin with the original parity belongs to some other key
        let wrong_parity = EthSignature { v: signature.v, ..twin };
        let result = verify_signature(message, &wrong_parity.to_hex(), &claimed);
        assert!(matches!(result, Ok(false) | Err(AuthError::RecoveryFailure)));
    }

    #[test]
    fn test_surrounding_whitespace_is_malformed() {
        let (signing_key, address) = keypair();
        let signature = sign_message("m", &signing_key).unwrap();
        let claimed = to_checksum(&address);

        for padded in [format!(" {}", signature), format!("{}\n", signature)] {
            assert!(matches!(
                verify_signature("m", &padded, &claimed),
                Err(AuthError::MalformedSignature(_))
            ));
        }
        assert!(matches!(
            verify_signature("m", &signature, &format!("{} ", claimed)),
            Err(AuthError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_zero_r_is_recovery_failure() {
        let signature = EthSignature { r: [0u8; 32], s: [1u8; 32], v: 27 };
        let result = recover_address(b"anything", &signature);
        assert!(matches!(result, Err(AuthError::RecoveryFailure)));
    }

    #[test]
    fn test_invalid_claimed_address() {
        let (signing_key, _) = keypair();
        let signature = sign_message("m", &signing_key).unwrap();
        assert!(matches!(
            verify_signature("m", &signature, "not-an-address"),
            Err(AuthError::InvalidAddress(_))
        ));
    }
}
