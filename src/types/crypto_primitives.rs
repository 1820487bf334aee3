/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Cryptographic primitives.
//!
//! The re-exports in this module provide two categories of cryptographic primitives:
//! 1. **Cryptographic Hashes**: provided by the [`sha2`] crate. Block IDs and payload hashes are
//!    SHA256 hashes.
//! 2. **Producer and peer identities**: Ed25519 keys provided by the [`ed25519_dalek`] crate. Block
//!    producers are identified by an [`Address`](super::data_types::Address) derived from their
//!    verifying key, and sync peers by their verifying key.

// re-exports below.
pub use sha2::Digest;
pub use sha2::Sha256 as CryptoHasher;

pub use ed25519_dalek::{SigningKey, VerifyingKey};
