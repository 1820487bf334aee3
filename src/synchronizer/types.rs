/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Outcomes and errors of the [`Synchronizer`](super::Synchronizer), and its configuration.

use std::fmt::{self, Display, Formatter};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::fork_choice::ForkStatus;
use crate::storage::StorageError;
use crate::types::{block::BlockHeader, data_types::BlockHeight};

use super::pluggables::{ExecuteError, FetchError};

/// Parameters of a [`Synchronizer`](super::Synchronizer).
#[derive(Clone, Copy, Debug)]
pub struct SynchronizerConfiguration {
    /// Maximum number of blocks requested from the [`BlockFetcher`](super::BlockFetcher) at once.
    pub fetch_batch_size: u32,
    /// Whether a [`TieBreak`](ForkStatus::TieBreak) winner replaces the tip.
    pub tie_break_replaces_tip: bool,
}

/// What happened to the local chain as a result of
/// [`process_block`](super::Synchronizer::process_block).
#[derive(Debug)]
pub enum BlockOutcome {
    /// The block extended the tip and is now the tip.
    Appended { tip: BlockHeader },

    /// The block was ignored. The local chain is unchanged.
    Dropped { status: ForkStatus },

    /// The block was not accepted. The local chain is unchanged.
    Rejected {
        block: BlockHeader,
        reason: RejectReason,
    },

    /// The local chain switched onto the block's branch.
    Committed {
        common_ancestor: BlockHeight,
        /// Headers of the blocks reverted from the old branch, highest first.
        removed: Vec<BlockHeader>,
        /// Headers of the blocks applied from the new branch, lowest first. The last one is the
        /// received block.
        applied: Vec<BlockHeader>,
        tip: BlockHeader,
    },

    /// Switching onto the block's branch failed and the local chain was restored. `tip` is the tip
    /// from before the attempt.
    RolledBack { error: ReorgError, tip: BlockHeader },

    /// The synchronizer hit an error it cannot recover from and has halted.
    Fatal(FatalError),

    /// The synchronizer halted earlier and no longer processes blocks.
    Halted,
}

#[derive(Debug)]
pub enum RejectReason {
    /// The block's id or payload hash is wrong.
    Malformed,
    Execute(ExecuteError),
    /// The executor's tip is not the tip the block was classified against.
    TipMoved,
}

/// Recoverable error in a reorganization.
#[derive(Debug)]
pub enum ReorgError {
    Fetch(FetchError),
    Execute {
        height: BlockHeight,
        error: ExecuteError,
    },
    Storage(StorageError),
    /// The fetched blocks do not form a chain that ends in the received block's parent.
    BrokenBranch,
    Cancelled,
    TipMoved,
}

impl Display for ReorgError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ReorgError::Fetch(err) => write!(f, "fetch failed: {}", err),
            ReorgError::Execute { height, error } => {
                write!(f, "executing height {} failed: {}", height, error)
            }
            ReorgError::Storage(err) => write!(f, "temporary block store failed: {}", err),
            ReorgError::BrokenBranch => write!(f, "fetched blocks do not form a branch"),
            ReorgError::Cancelled => write!(f, "cancelled"),
            ReorgError::TipMoved => write!(f, "the tip moved"),
        }
    }
}

/// Error after which the [`Synchronizer`](super::Synchronizer) halts.
#[derive(Debug)]
pub enum FatalError {
    /// Following the received branch would revert the local chain below the certified height.
    FinalityViolation {
        certified_height: BlockHeight,
        attempted_height: BlockHeight,
    },
    /// Restoring the blocks removed in a failed reorganization failed. The blocks that were not
    /// restored are still in the temporary block store.
    RestoreFailed { error: ExecuteError },
}

impl Display for FatalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FatalError::FinalityViolation {
                certified_height,
                attempted_height,
            } => write!(
                f,
                "refused to revert to height {} below certified height {}",
                attempted_height, certified_height
            ),
            FatalError::RestoreFailed { error } => {
                write!(f, "failed to restore temporary blocks: {}", error)
            }
        }
    }
}

/// The result of [startup recovery](super::Synchronizer::recover).
#[derive(Debug)]
pub enum RecoveryOutcome {
    NothingToRecover,
    /// The blocks in the temporary block store were put back on the local chain.
    Restored { tip: BlockHeader, restored: u64 },
    /// The blocks in the temporary block store were deleted.
    Discarded { discarded: u64 },
    Fatal(FatalError),
}

/// Shared flag that asks a running replay to stop and roll back.
///
/// A [`Synchronizer`](super::Synchronizer) checks its token before applying each block of a new
/// branch, and clears it at the start of every reorganization.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> CancellationToken {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst)
    }
}
