/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Mapping of wall-clock time onto forging slots.
//!
//! Time since genesis is split into consecutive, equally long [`Slot`]s. Each slot is assigned to one
//! expected producer, and a block claims a slot through its [`timestamp`](crate::types::block::BlockHeader::timestamp).
//!
//! The [fork choice rule](crate::fork_choice) uses slots in one place only: to decide a
//! [`TieBreak`](crate::fork_choice::ForkStatus::TieBreak) between two sibling blocks, it asks whether
//! each block was *received* during the slot it claims to have been forged in.

use crate::types::data_types::{Slot, Timestamp};

/// Functions for mapping timestamps onto slots.
///
/// Implementations must be pure: the [fork choice rule](crate::fork_choice) is required to be
/// deterministic, and calls these functions from any thread.
pub trait Slots {
    /// Get the slot that `timestamp` falls in.
    fn slot_of(&self, timestamp: Timestamp) -> Slot;

    /// Check whether `observed_at` falls inside `slot`.
    fn is_within_slot_window(&self, slot: Slot, observed_at: Timestamp) -> bool;
}

/// [`Slots`] implementation for chains whose slots all last `block_time` seconds, starting from
/// `genesis_timestamp`.
#[derive(Clone, Copy, Debug)]
pub struct SlotClock {
    genesis_timestamp: Timestamp,
    block_time: u64,
}

impl SlotClock {
    /// Create a new `SlotClock`.
    ///
    /// # Errors
    ///
    /// Returns [`SlotClockError::ZeroBlockTime`] if `block_time` is 0 seconds.
    pub fn new(genesis_timestamp: Timestamp, block_time: u64) -> Result<SlotClock, SlotClockError> {
        if block_time == 0 {
            return Err(SlotClockError::ZeroBlockTime);
        }
        Ok(SlotClock {
            genesis_timestamp,
            block_time,
        })
    }

    /// Get the timestamp of the first second of `slot`.
    /// Get the time at which `slot` starts. Saturates at the largest representable timestamp.
    pub fn slot_start(&self, slot: Slot) -> Timestamp {
        Timestamp::new(
            self.genesis_timestamp
                .secs()
                .saturating_add(slot.int().saturating_mul(self.block_time)),
        )
    }

    pub fn block_time(&self) -> u64 {
        self.block_time
    }

    pub fn genesis_timestamp(&self) -> Timestamp {
        self.genesis_timestamp
    }
}

impl Slots for SlotClock {
    // Timestamps before genesis all map onto slot 0.
    fn slot_of(&self, timestamp: Timestamp) -> Slot {
        Slot::new(timestamp.secs().saturating_sub(self.genesis_timestamp.secs()) / self.block_time)
    }

    fn is_within_slot_window(&self, slot: Slot, observed_at: Timestamp) -> bool {
        self.slot_of(observed_at) == slot
    }
}

impl<S: Slots + ?Sized> Slots for &S {
    fn slot_of(&self, timestamp: Timestamp) -> Slot {
        (**self).slot_of(timestamp)
    }

    fn is_within_slot_window(&self, slot: Slot, observed_at: Timestamp) -> bool {
        (**self).is_within_slot_window(slot, observed_at)
    }
}

/// Error when creating a [`SlotClock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotClockError {
    ZeroBlockTime,
}
