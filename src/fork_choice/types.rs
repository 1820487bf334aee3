/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types specific to the fork choice rule.

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};

/// Outcome of comparing a received block against the current tip.
///
/// Variants are listed in the order in which the [fork choice rule](super::fork_choice) checks for
/// them. The first variant whose condition holds is returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub enum ForkStatus {
    /// The received block directly extends the tip.
    ValidBlock,

    /// The received block is the tip.
    IdenticalBlock,

    /// The received block is a sibling of the tip forged by the same producer.
    DoubleForging,

    /// The received block is a sibling of the tip forged by a different producer in a later slot,
    /// and only the received block arrived within its own slot.
    TieBreak,

    /// The received block heads a branch with more accumulated agreement than the tip.
    DifferentChain,

    /// None of the above.
    Discard,
}

impl ForkStatus {
    /// Get the name of this status in PascalCase, used in log messages.
    pub const fn name(&self) -> &'static str {
        match self {
            ForkStatus::ValidBlock => "ValidBlock",
            ForkStatus::IdenticalBlock => "IdenticalBlock",
            ForkStatus::DoubleForging => "DoubleForging",
            ForkStatus::TieBreak => "TieBreak",
            ForkStatus::DifferentChain => "DifferentChain",
            ForkStatus::Discard => "Discard",
        }
    }
}

impl Display for ForkStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
