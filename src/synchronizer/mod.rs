/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Component that keeps the local chain on the branch preferred by the
//! [fork choice rule](crate::fork_choice).
//!
//! # Processing a block
//!
//! For every candidate block, the [`Synchronizer`] goes through these states:
//!
//! ```text
//! Idle ─► Classifying ─┬─► Appending ────────────────────────────────────────────► Idle
//!                      ├─► Rejecting ────────────────────────────────────────────► Idle
//!                      └─► Reorganizing: RemovingBlocks ─► Replaying ─┬─► Committed ─► Idle
//!                                              │                      │
//!                                              └──────────────────────┴─► RollingBack ─► Idle
//! ```
//!
//! # Reorganizations and the temporary block store
//!
//! A reorganization reverts the local chain down to the common ancestor of the tip and the received
//! block, then applies the received block's branch. Every block is saved in the
//! [temporary block store](crate::temp_blocks) *before* it is reverted. So at every point in a
//! reorganization, every block that was on the local chain at its start is either still on the local
//! chain or in the temporary block store. This is what makes [rolling back](BlockOutcome::RolledBack)
//! and [startup recovery](Synchronizer::recover) possible.
//!
//! # Finality
//!
//! The synchronizer never reverts a block at or below the height reported by its
//! [`FinalityOracle`]. A received branch that would require that is a [`FatalError`].

pub mod pluggables;

pub mod types;

mod implementation;

pub use implementation::Synchronizer;

pub use pluggables::{
    BlockExecutor, BlockFetcher, ExecuteError, FetchError, FinalityOracle, RemovedBlock,
};

pub use types::{
    BlockOutcome, CancellationToken, FatalError, RecoveryOutcome, RejectReason, ReorgError,
    SynchronizerConfiguration,
};
