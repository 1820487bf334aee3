/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The fork choice rule and the predicates it is built from.
//!
//! Every function in this module is a pure function of its arguments.

use crate::slots::Slots;
use crate::types::{block::BlockHeader, data_types::Timestamp};

use super::types::ForkStatus;

/// Classify `received_block` against `last_block`, the current tip.
///
/// `now` stands in for the `received_at` of either header only when that header's `received_at` is
/// `None`. Callers replaying a previously received block must pass it with its recorded
/// `received_at` so that the classification is reproducible.
///
/// The checks, in order (first match wins):
/// 1. [`is_valid_block`] → [`ForkStatus::ValidBlock`].
/// 2. [`is_identical_block`] → [`ForkStatus::IdenticalBlock`].
/// 3. [`is_double_forging`] → [`ForkStatus::DoubleForging`].
/// 4. [`is_tie_break`] → [`ForkStatus::TieBreak`].
/// 5. [`is_different_chain`] → [`ForkStatus::DifferentChain`].
/// 6. Otherwise [`ForkStatus::Discard`].
pub fn fork_choice<S: Slots + ?Sized>(
    last_block: &BlockHeader,
    received_block: &BlockHeader,
    slots: &S,
    now: Timestamp,
) -> ForkStatus {
    if is_valid_block(last_block, received_block) {
        ForkStatus::ValidBlock
    } else if is_identical_block(last_block, received_block) {
        ForkStatus::IdenticalBlock
    } else if is_double_forging(last_block, received_block) {
        ForkStatus::DoubleForging
    } else if is_tie_break(last_block, received_block, slots, now) {
        ForkStatus::TieBreak
    } else if is_different_chain(last_block, received_block) {
        ForkStatus::DifferentChain
    } else {
        ForkStatus::Discard
    }
}

/// Check whether `received_block` directly extends `last_block`.
pub fn is_valid_block(last_block: &BlockHeader, received_block: &BlockHeader) -> bool {
    last_block.height + 1 == received_block.height
        && received_block.previous_block_id == last_block.id
}

pub fn is_identical_block(last_block: &BlockHeader, received_block: &BlockHeader) -> bool {
    last_block.id == received_block.id
}

/// Check whether the two blocks are "duplicate" siblings: same height, same `max_height_prevoted`,
/// and same parent.
pub fn is_duplicate_block(last_block: &BlockHeader, received_block: &BlockHeader) -> bool {
    last_block.height == received_block.height
        && last_block.max_height_prevoted == received_block.max_height_prevoted
        && last_block.previous_block_id == received_block.previous_block_id
}

/// Check whether the two blocks are duplicate siblings forged by the same producer.
pub fn is_double_forging(last_block: &BlockHeader, received_block: &BlockHeader) -> bool {
    is_duplicate_block(last_block, received_block)
        && last_block.generator_address == received_block.generator_address
}

/// Check whether `received_block` wins a tie break against its duplicate sibling `last_block`.
///
/// All of the following must hold:
/// 1. The blocks are [duplicates](is_duplicate_block).
/// 2. `received_block` claims a later slot than `last_block`.
/// 3. `last_block` was **not** received within its own slot.
/// 4. `received_block` **was** received within its own slot.
///
/// Conditions 3 and 4 are deliberately asymmetric.
pub fn is_tie_break<S: Slots + ?Sized>(
    last_block: &BlockHeader,
    received_block: &BlockHeader,
    slots: &S,
    now: Timestamp,
) -> bool {
    let last_block_slot = slots.slot_of(last_block.timestamp);
    let received_block_slot = slots.slot_of(received_block.timestamp);

    is_duplicate_block(last_block, received_block)
        && last_block_slot < received_block_slot
        && !slots.is_within_slot_window(last_block_slot, last_block.received_at.unwrap_or(now))
        && slots.is_within_slot_window(
            received_block_slot,
            received_block.received_at.unwrap_or(now),
        )
}

/// Check whether `received_block` is on a branch with more agreement than `last_block`: either a
/// strictly higher `max_height_prevoted`, or an equal one at a strictly greater height.
pub fn is_different_chain(last_block: &BlockHeader, received_block: &BlockHeader) -> bool {
    received_block.max_height_prevoted > last_block.max_height_prevoted
        || (received_block.height > last_block.height
            && received_block.max_height_prevoted == last_block.max_height_prevoted)
}
