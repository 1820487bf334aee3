/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits for the services that the [`Synchronizer`](super::Synchronizer) consumes.
//!
//! Each trait has a production implementation in this crate:
//!
//! |Trait|Implementation|
//! |---|---|
//! |[`BlockExecutor`]|[`ChainStore`](crate::chain::ChainStore)|
//! |[`TempBlockStore`](crate::temp_blocks::TempBlockStore)|[`KVTempBlockStore`](crate::temp_blocks::KVTempBlockStore)|
//! |[`BlockFetcher`]|[`NetworkBlockFetcher`](crate::networking::NetworkBlockFetcher)|
//! |[`FinalityOracle`]|[`CertifiedHeight`](crate::finality::CertifiedHeight)|
//! |[`Slots`](crate::slots::Slots)|[`SlotClock`](crate::slots::SlotClock)|

use std::fmt::{self, Display, Formatter};

use crate::storage::{KVGetError, KVSetError, StorageError};
use crate::types::{
    block::{Block, BlockHeader},
    data_types::{BlockHeight, BlockID},
};

/// Validates, applies, and reverts blocks on the local chain.
///
/// The local chain is a single branch from genesis to the tip. Every mutating method either takes
/// full effect or none at all.
pub trait BlockExecutor {
    /// Get the header of the block at the highest height of the local chain.
    fn tip(&self) -> Result<BlockHeader, ExecuteError>;

    /// Get the tip together with its payload.
    fn tip_block(&self) -> Result<Block, ExecuteError>;

    /// Get the header of the block at `height` on the local chain, if the chain is that high.
    fn header_at_height(&self, height: BlockHeight) -> Result<Option<BlockHeader>, ExecuteError>;

    /// Validate `block` and, if it is valid, apply it on top of the tip.
    fn execute(&mut self, block: &Block) -> Result<(), ExecuteError>;

    /// Apply a block which was validated before, e.g., one that is being restored from the temporary
    /// block store.
    fn apply_validated(&mut self, block: &Block) -> Result<(), ExecuteError>;

    /// Revert the tip, making its parent the new tip.
    fn undo_tip(&mut self) -> Result<RemovedBlock, ExecuteError>;
}

/// The result of [`BlockExecutor::undo_tip`].
#[derive(Clone, Debug)]
pub struct RemovedBlock {
    /// The block that was the tip, with its recorded `received_at`.
    pub block: Block,
    pub new_tip: BlockHeader,
}

/// Reports the greatest height that is final. Blocks at or below this height are never reverted.
pub trait FinalityOracle {
    fn certified_height(&self) -> BlockHeight;
}

/// Obtains blocks from the branch headed by some block, typically from peers.
pub trait BlockFetcher {
    /// Get the blocks at heights `from..=to` on the branch headed by `branch_head`, ordered by
    /// ascending height.
    fn fetch_range(
        &mut self,
        from: BlockHeight,
        to: BlockHeight,
        branch_head: &BlockID,
    ) -> Result<Vec<Block>, FetchError>;
}

/// Error when a [`BlockExecutor`] fails to apply or revert a block.
#[derive(Debug)]
pub enum ExecuteError {
    /// The block was rejected by application-level validation rules.
    InvalidBlock { block: BlockHeader },
    DoesNotExtendTip { block: BlockHeader, tip: BlockHeader },
    CannotUndoGenesis,
    /// The local chain has no blocks, not even genesis.
    Uninitialized,
    Storage(StorageError),
}

impl From<StorageError> for ExecuteError {
    fn from(value: StorageError) -> Self {
        ExecuteError::Storage(value)
    }
}

impl From<KVGetError> for ExecuteError {
    fn from(value: KVGetError) -> Self {
        ExecuteError::Storage(StorageError::KVGetError(value))
    }
}

impl From<KVSetError> for ExecuteError {
    fn from(value: KVSetError) -> Self {
        ExecuteError::Storage(StorageError::KVSetError(value))
    }
}

impl Display for ExecuteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ExecuteError::InvalidBlock { block } => {
                write!(f, "block {} at height {} is invalid", block.id, block.height)
            }
            ExecuteError::DoesNotExtendTip { block, tip } => write!(
                f,
                "block {} at height {} does not extend tip {} at height {}",
                block.id, block.height, tip.id, tip.height
            ),
            ExecuteError::CannotUndoGenesis => write!(f, "cannot undo the genesis block"),
            ExecuteError::Uninitialized => write!(f, "the local chain is not initialized"),
            ExecuteError::Storage(err) => write!(f, "storage error: {}", err),
        }
    }
}

/// Error when a [`BlockFetcher`] cannot provide the requested range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchError {
    Timeout,
    NoPeers,
    /// A response did not contain the requested heights, or contained blocks that fail
    /// [`Block::is_correct`].
    MalformedResponse,
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Timeout => write!(f, "timed out waiting for blocks"),
            FetchError::NoPeers => write!(f, "no peers to fetch blocks from"),
            FetchError::MalformedResponse => write!(f, "received a malformed response"),
        }
    }
}
