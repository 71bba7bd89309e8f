//! # form-eth-auth
//!
//! Ethereum signed-message authentication for Formation services.
//!
//! A client proves control of an address by signing a message with the
//! wallet `personal_sign` convention. This crate recovers the signer from the
//! signature, checks it against the claimed address, and maps the address to
//! exactly one application user, provisioning it on first login.

pub mod address;
pub mod directory;
pub mod error;
pub mod identity;
pub mod login;
pub mod signature;
pub mod token;

// Re-export the most commonly used types
pub use address::{is_hex_address, normalize_address, parse_address, to_checksum};
pub use directory::{DirectoryError, MemoryDirectory, UserDirectory, UserDraft, UserRecord};
pub use error::AuthError;
pub use identity::resolve_or_create;
pub use login::{authenticate, AuthContext, AuthRequest, AuthResponse};
pub use signature::{recover_address, sign_message, verify_signature, EthSignature};
pub use token::TokenIssuer;
