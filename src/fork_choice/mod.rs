/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The rule that decides which of two competing block histories to prefer.
//!
//! # Fork choice
//!
//! Every block that a node receives is compared against the node's current tip by [`fork_choice`],
//! which returns one of six [`ForkStatus`]es. Only two of them cause the chain to change:
//! - [`ValidBlock`](ForkStatus::ValidBlock): the block extends the tip and is appended.
//! - [`DifferentChain`](ForkStatus::DifferentChain): the block is on a branch with strictly more
//!   third-party agreement, measured by `max_height_prevoted`, and the
//!   [synchronizer](crate::synchronizer) switches to that branch.
//!
//! The other four statuses leave the chain untouched. In particular, when two producers race for
//! the same position ([`TieBreak`](ForkStatus::TieBreak)) or one producer forges twice
//! ([`DoubleForging`](ForkStatus::DoubleForging)), the existing tip is kept.
//!
//! # Ordering of checks
//!
//! `DoubleForging` is checked before `TieBreak` because both require the blocks to be duplicate
//! siblings. A double-forged sibling never displaces the tip, regardless of timing.
//!
//! # Purity
//!
//! The fork choice rule has no state, performs no I/O, and never reads the clock: the caller passes
//! in `now`, which is only consulted for headers that carry no `received_at`. It may be called from
//! any number of threads concurrently, and always returns the same status for the same inputs.

mod rules;

mod types;

pub use rules::{
    fork_choice, is_different_chain, is_double_forging, is_duplicate_block, is_identical_block,
    is_tie_break, is_valid_block,
};

pub use types::ForkStatus;
