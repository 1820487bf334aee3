/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the [`BlockHeader`] and [`Block`] types and their associated methods.
//!
//! # Content addressing
//!
//! A header's [`id`](BlockHeader::id) is the SHA256 hash of the Borsh serialization of its *hashed
//! fields*: `height`, `previous_block_id`, `generator_address`, `timestamp`, `max_height_prevoted`,
//! and `payload_hash`. Two headers with equal ids therefore agree on every hashed field, which is why
//! `BlockHeader` implements `PartialEq` by comparing ids only.
//!
//! # `received_at`
//!
//! [`received_at`](BlockHeader::received_at) is not hashed. It records the wall-clock time at which
//! *this* node first observed the block, and is persisted together with the block wherever the block
//! is stored (the chain store and the temporary block store), so that classifying a replayed block
//! reproduces the classification made when the block was first received.

use borsh::{BorshDeserialize, BorshSerialize};

use super::crypto_primitives::{CryptoHasher, Digest};
use super::data_types::{Address, BlockHeight, BlockID, CryptoHash, Data, Timestamp};

/// The fields of a block needed for chain comparison.
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize)]
pub struct BlockHeader {
    /// Content hash of the hashed fields of this header.
    pub id: BlockID,
    pub height: BlockHeight,
    pub previous_block_id: BlockID,
    pub generator_address: Address,
    pub timestamp: Timestamp,
    /// Highest height that the producer believed had accumulated enough prevotes as of this block.
    pub max_height_prevoted: BlockHeight,
    pub payload_hash: CryptoHash,
    /// Local observation time. Not part of the [`id`](Self::id).
    pub received_at: Option<Timestamp>,
}

impl BlockHeader {
    pub fn new(
        height: BlockHeight,
        previous_block_id: BlockID,
        generator_address: Address,
        timestamp: Timestamp,
        max_height_prevoted: BlockHeight,
        payload_hash: CryptoHash,
    ) -> BlockHeader {
        BlockHeader {
            id: BlockHeader::hash(
                height,
                &previous_block_id,
                &generator_address,
                timestamp,
                max_height_prevoted,
                &payload_hash,
            ),
            height,
            previous_block_id,
            generator_address,
            timestamp,
            max_height_prevoted,
            payload_hash,
            received_at: None,
        }
    }

    pub fn hash(
        height: BlockHeight,
        previous_block_id: &BlockID,
        generator_address: &Address,
        timestamp: Timestamp,
        max_height_prevoted: BlockHeight,
        payload_hash: &CryptoHash,
    ) -> BlockID {
        let mut hasher = CryptoHasher::new();
        hasher.update(height.to_le_bytes());
        hasher.update(previous_block_id.bytes());
        hasher.update(generator_address.bytes());
        hasher.update(timestamp.secs().to_le_bytes());
        hasher.update(max_height_prevoted.to_le_bytes());
        hasher.update(payload_hash.bytes());
        BlockID::new(hasher.finalize().into())
    }

    /// Return a copy of this header observed at `received_at`.
    pub fn with_received_at(mut self, received_at: Timestamp) -> BlockHeader {
        self.received_at = Some(received_at);
        self
    }

    /// Checks whether `id` is the hash of the other hashed fields.
    pub fn is_correct(&self) -> bool {
        self.id
            == BlockHeader::hash(
                self.height,
                &self.previous_block_id,
                &self.generator_address,
                self.timestamp,
                self.max_height_prevoted,
                &self.payload_hash,
            )
    }

    /// Checks whether this header directly extends `parent`.
    pub fn extends(&self, parent: &BlockHeader) -> bool {
        self.previous_block_id == parent.id && self.height == parent.height + 1
    }
}

impl PartialEq for BlockHeader {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BlockHeader {}

/// A [`BlockHeader`] together with the payload it commits to.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub data: Data,
}

impl Block {
    /// Create a block whose header commits to `data`.
    pub fn new(
        height: BlockHeight,
        previous_block_id: BlockID,
        generator_address: Address,
        timestamp: Timestamp,
        max_height_prevoted: BlockHeight,
        data: Data,
    ) -> Block {
        Block {
            header: BlockHeader::new(
                height,
                previous_block_id,
                generator_address,
                timestamp,
                max_height_prevoted,
                data.hash(),
            ),
            data,
        }
    }

    /// Create a genesis block: height 0, an all-zero parent, and no prevotes.
    pub fn genesis(generator_address: Address, timestamp: Timestamp, data: Data) -> Block {
        Block::new(
            BlockHeight::new(0),
            BlockID::default(),
            generator_address,
            timestamp,
            BlockHeight::new(0),
            data,
        )
    }

    /// Shorthand for `self.header.id`.
    pub fn id(&self) -> BlockID {
        self.header.id
    }

    /// Shorthand for `self.header.height`.
    pub fn height(&self) -> BlockHeight {
        self.header.height
    }

    /// Checks if the header id and the payload hash are both correct.
    pub fn is_correct(&self) -> bool {
        self.header.is_correct() && self.header.payload_hash == self.data.hash()
    }

    /// Return this block with its header observed at `received_at`.
    pub fn with_received_at(mut self, received_at: Timestamp) -> Block {
        self.header.received_at = Some(received_at);
        self
    }
}
