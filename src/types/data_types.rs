/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store bytes or integers, and do not have any major "active" behavior.

use std::{
    fmt::{self, Debug, Display, Formatter},
    hash::Hash,
    ops::{Add, AddAssign},
    time::SystemTime,
};

use borsh::{BorshDeserialize, BorshSerialize};

use super::crypto_primitives::{CryptoHasher, Digest, VerifyingKey};

/// Height of a block in the chain.
///
/// Starts at 0 for the genesis block and increases by exactly 1 for every block that extends its
/// parent through [`previous_block_id`](super::block::BlockHeader::previous_block_id).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct BlockHeight(u64);

impl BlockHeight {
    /// Create a new `BlockHeight` with an `int` inner value.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` value of this `BlockHeight`.
    pub const fn int(&self) -> u64 {
        self.0
    }

    /// Get the little-endian representation of the inner `u64` value of this `BlockHeight`.
    pub fn to_le_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    /// Get the height directly below this one, or `None` for height 0.
    pub const fn parent(&self) -> Option<BlockHeight> {
        match self.0.checked_sub(1) {
            Some(int) => Some(BlockHeight(int)),
            None => None,
        }
    }
}

impl Display for BlockHeight {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl AddAssign<u64> for BlockHeight {
    fn add_assign(&mut self, rhs: u64) {
        self.0.add_assign(rhs)
    }
}

impl Add<u64> for BlockHeight {
    type Output = BlockHeight;
    fn add(self, rhs: u64) -> Self::Output {
        BlockHeight::new(self.0.add(rhs))
    }
}

/// 32-byte identifier of a block: the SHA256 hash of its header's hashed fields.
///
/// Two headers with the same `BlockID` are the same header. See
/// [`BlockHeader::id`](super::block::BlockHeader::id).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct BlockID([u8; 32]);

impl BlockID {
    /// Create a new `BlockID` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 32]` value of this `BlockID`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Display for BlockID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in &self.0[0..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl Debug for BlockID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// 32-byte cryptographic hash of a block's [`Data`].
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct CryptoHash([u8; 32]);

impl CryptoHash {
    /// Create a new `CryptoHash` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 32]` value of this `CryptoHash`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Debug for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// 20-byte identity of a block producer.
///
/// Two blocks at the same position produced by the same `Address` are evidence of
/// [double forging](crate::fork_choice::ForkStatus::DoubleForging).
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct Address([u8; 20]);

impl Address {
    /// Create a new `Address` wrapping `bytes`.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Derive the address of a producer from its Ed25519 verifying key: the first 20 bytes of the
    /// SHA256 hash of the key.
    pub fn from_verifying_key(verifying_key: &VerifyingKey) -> Self {
        let mut hasher = CryptoHasher::new();
        hasher.update(verifying_key.as_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[0..20]);
        Self(bytes)
    }

    /// Get the inner `[u8; 20]` value of this `Address`.
    pub const fn bytes(&self) -> [u8; 20] {
        self.0
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Wall-clock time in seconds since the Unix Epoch.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a new `Timestamp` of `secs` seconds since the Unix Epoch.
    pub const fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Get the current wall-clock time.
    ///
    /// Clocks set before the Unix Epoch read as `Timestamp(0)`.
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    /// Get the inner number of seconds since the Unix Epoch.
    pub const fn secs(&self) -> u64 {
        self.0
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        Self(
            time.duration_since(SystemTime::UNIX_EPOCH)
                .map(|duration| duration.as_secs())
                .unwrap_or(0),
        )
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Discrete time window in which exactly one producer is expected to forge a block.
///
/// Slots are derived from [`Timestamp`]s by a [`Slots`](crate::slots::Slots) implementation.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct Slot(u64);

impl Slot {
    /// Create a new `Slot` wrapping `int`.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` value of this `Slot`.
    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Display for Slot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Arbitrary payload carried by a [`Block`](super::block::Block), e.g., its transactions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct Data(Vec<Datum>);

impl Data {
    /// Create a new `Data` wrapping `datum_vec`.
    pub fn new(datum_vec: Vec<Datum>) -> Self {
        Self(datum_vec)
    }

    /// Get a reference to the inner `Vec<Datum>` of this `Data`.
    pub const fn vec(&self) -> &Vec<Datum> {
        &self.0
    }

    /// Get how many `Datum`s are in this `Data`.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether this `Data` contains no `Datum`s.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate through the `Datum`s that are in this `Data` in the order they were provided in to
    /// [`new`](Self::new).
    pub fn iter(&self) -> std::slice::Iter<'_, Datum> {
        self.0.iter()
    }

    /// Compute the SHA256 hash of this `Data`, which is stored in a block header's
    /// [`payload_hash`](super::block::BlockHeader::payload_hash).
    pub fn hash(&self) -> CryptoHash {
        let mut hasher = CryptoHasher::new();
        for datum in self.iter() {
            hasher.update((datum.bytes().len() as u64).to_le_bytes());
            hasher.update(datum.bytes());
        }
        CryptoHash::new(hasher.finalize().into())
    }
}

/// Unit of [`Data`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct Datum(Vec<u8>);

impl Datum {
    /// Create a new `Datum` wrapping `bytes`.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get a reference to the inner `Vec<u8>` of this `Datum`.
    pub const fn bytes(&self) -> &Vec<u8> {
        &self.0
    }
}
