//! Helpers for building chains and competing branches of blocks for use in integration tests.

use ed25519_dalek::SigningKey;
use rand_core::OsRng;

use fork_choice_rs::{
    slots::SlotClock,
    types::{
        block::{Block, BlockHeader},
        data_types::{Address, BlockHeight, Data, Datum, Timestamp},
    },
};

/// Timestamp of the genesis block of every chain built by these helpers.
pub(crate) const GENESIS_TIMESTAMP: Timestamp = Timestamp::new(1_600_000_000);

/// Length of a slot, in seconds.
pub(crate) const BLOCK_TIME: u64 = 10;

pub(crate) fn slot_clock() -> SlotClock {
    SlotClock::new(GENESIS_TIMESTAMP, BLOCK_TIME).unwrap()
}

/// Generate the address of a fresh, random block producer.
pub(crate) fn producer() -> Address {
    let mut csprg = OsRng {};
    let signing_key = SigningKey::generate(&mut csprg);
    Address::from_verifying_key(&signing_key.verifying_key())
}

pub(crate) fn genesis() -> Block {
    Block::genesis(Address::default(), GENESIS_TIMESTAMP, Data::new(vec![]))
}

/// Create a block that extends `parent`, forged by `generator` in the slot after `parent`'s.
///
/// `tag` ends up in the block's payload, so blocks that differ only in `tag` have different ids.
pub(crate) fn child(
    parent: &BlockHeader,
    generator: Address,
    max_height_prevoted: u64,
    tag: u8,
) -> Block {
    child_at(
        parent,
        generator,
        max_height_prevoted,
        Timestamp::new(parent.timestamp.secs() + BLOCK_TIME),
        tag,
    )
}

/// Like [`child`], but forged at `timestamp`.
pub(crate) fn child_at(
    parent: &BlockHeader,
    generator: Address,
    max_height_prevoted: u64,
    timestamp: Timestamp,
    tag: u8,
) -> Block {
    Block::new(
        parent.height + 1,
        parent.id,
        generator,
        timestamp,
        BlockHeight::new(max_height_prevoted),
        Data::new(vec![Datum::new(vec![tag])]),
    )
}

/// Create `len` blocks that extend `parent` one after another, all forged by `generator`.
/// `max_height_prevoted` gives the `max_height_prevoted` of the block at each height.
pub(crate) fn branch(
    parent: &BlockHeader,
    len: u64,
    generator: Address,
    max_height_prevoted: impl Fn(u64) -> u64,
    tag: u8,
) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    for _ in 0..len {
        let parent = match blocks.last() {
            Some(block) => &block.header,
            None => parent,
        };
        let height = parent.height.int() + 1;
        blocks.push(child(parent, generator, max_height_prevoted(height), tag));
    }
    blocks
}

/// The `max_height_prevoted` of a chain where every block has been prevoted up to two heights below
/// it.
pub(crate) fn trailing_by_two(height: u64) -> u64 {
    height.saturating_sub(2)
}
