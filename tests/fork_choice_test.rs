//! Tests for the fork choice rule and the slot clock it consults.

mod common;

use rand::Rng;

use fork_choice_rs::{
    fork_choice::{
        fork_choice, is_different_chain, is_double_forging, is_duplicate_block, is_identical_block,
        is_tie_break, is_valid_block, ForkStatus,
    },
    slots::{SlotClock, SlotClockError, Slots},
    types::{
        block::BlockHeader,
        data_types::{Address, BlockHeight, BlockID, CryptoHash, Slot, Timestamp},
    },
};

use common::chain_builder::{producer, slot_clock, BLOCK_TIME, GENESIS_TIMESTAMP};

// Create a header at `height` with the given parent, forged in `slot`.
fn header(
    height: u64,
    previous_block_id: BlockID,
    generator: Address,
    slot: u64,
    max_height_prevoted: u64,
) -> BlockHeader {
    BlockHeader::new(
        BlockHeight::new(height),
        previous_block_id,
        generator,
        slot_clock().slot_start(Slot::new(slot)),
        BlockHeight::new(max_height_prevoted),
        CryptoHash::default(),
    )
}

fn at_slot(slot: u64) -> Timestamp {
    slot_clock().slot_start(Slot::new(slot))
}

fn parent_id() -> BlockID {
    BlockID::new([9u8; 32])
}

#[test]
fn extending_block_is_valid_test() {
    let tip = header(10, parent_id(), producer(), 10, 8);
    let candidate = header(11, tip.id, producer(), 11, 9);

    assert!(is_valid_block(&tip, &candidate));
    assert_eq!(
        fork_choice(&tip, &candidate, &slot_clock(), at_slot(11)),
        ForkStatus::ValidBlock
    );
}

#[test]
fn block_at_next_height_with_other_parent_is_not_valid_test() {
    let tip = header(10, parent_id(), producer(), 10, 8);
    let candidate = header(11, BlockID::new([1u8; 32]), producer(), 11, 8);

    assert!(!is_valid_block(&tip, &candidate));
    // Same `max_height_prevoted` at a greater height.
    assert_eq!(
        fork_choice(&tip, &candidate, &slot_clock(), at_slot(11)),
        ForkStatus::DifferentChain
    );
}

#[test]
fn identical_block_test() {
    let tip = header(10, parent_id(), producer(), 10, 8).with_received_at(at_slot(10));
    let candidate = tip.clone().with_received_at(at_slot(20));

    assert!(is_identical_block(&tip, &candidate));
    assert_eq!(
        fork_choice(&tip, &candidate, &slot_clock(), at_slot(20)),
        ForkStatus::IdenticalBlock
    );
}

#[test]
fn tie_break_test() {
    // The tip arrived late, in slot 12, while the candidate arrived within its own slot.
    let tip = header(10, parent_id(), producer(), 10, 5).with_received_at(at_slot(12));
    let candidate = header(10, parent_id(), producer(), 11, 5).with_received_at(at_slot(11));

    assert!(is_duplicate_block(&tip, &candidate));
    assert!(!is_double_forging(&tip, &candidate));
    assert!(is_tie_break(&tip, &candidate, &slot_clock(), at_slot(12)));
    assert_eq!(
        fork_choice(&tip, &candidate, &slot_clock(), at_slot(12)),
        ForkStatus::TieBreak
    );
}

#[test]
fn tie_break_is_asymmetric_test() {
    // Both arrived within their own slots, so the tip keeps its place.
    let tip = header(10, parent_id(), producer(), 10, 5).with_received_at(at_slot(10));
    let candidate = header(10, parent_id(), producer(), 11, 5).with_received_at(at_slot(11));
    assert!(!is_tie_break(&tip, &candidate, &slot_clock(), at_slot(11)));
    assert_eq!(
        fork_choice(&tip, &candidate, &slot_clock(), at_slot(11)),
        ForkStatus::Discard
    );

    // Neither arrived within its own slot.
    let tip = header(10, parent_id(), producer(), 10, 5).with_received_at(at_slot(15));
    let candidate = header(10, parent_id(), producer(), 11, 5).with_received_at(at_slot(15));
    assert!(!is_tie_break(&tip, &candidate, &slot_clock(), at_slot(15)));
}

#[test]
fn tie_break_requires_later_slot_test() {
    let tip = header(10, parent_id(), producer(), 11, 5).with_received_at(at_slot(14));
    let candidate = header(10, parent_id(), producer(), 10, 5).with_received_at(at_slot(10));

    assert!(!is_tie_break(&tip, &candidate, &slot_clock(), at_slot(14)));
    assert_eq!(
        fork_choice(&tip, &candidate, &slot_clock(), at_slot(14)),
        ForkStatus::Discard
    );
}

#[test]
fn double_forging_is_checked_before_tie_break_test() {
    let generator = producer();
    let tip = header(10, parent_id(), generator, 10, 5).with_received_at(at_slot(12));
    let candidate = header(10, parent_id(), generator, 11, 5).with_received_at(at_slot(11));

    assert!(is_double_forging(&tip, &candidate));
    assert!(is_tie_break(&tip, &candidate, &slot_clock(), at_slot(12)));
    assert_eq!(
        fork_choice(&tip, &candidate, &slot_clock(), at_slot(12)),
        ForkStatus::DoubleForging
    );
}

#[test]
fn missing_received_at_falls_back_to_now_test() {
    let tip = header(10, parent_id(), producer(), 10, 5);
    let candidate = header(10, parent_id(), producer(), 11, 5);

    // At slot 11, the tip was not received in its slot but the candidate was.
    assert_eq!(
        fork_choice(&tip, &candidate, &slot_clock(), at_slot(11)),
        ForkStatus::TieBreak
    );
    // At slot 12, neither was.
    assert_eq!(
        fork_choice(&tip, &candidate, &slot_clock(), at_slot(12)),
        ForkStatus::Discard
    );
}

#[test]
fn higher_max_height_prevoted_is_different_chain_test() {
    let tip = header(10, parent_id(), producer(), 10, 5);
    let candidate = header(10, BlockID::new([3u8; 32]), producer(), 10, 7);

    assert!(is_different_chain(&tip, &candidate));
    assert_eq!(
        fork_choice(&tip, &candidate, &slot_clock(), at_slot(10)),
        ForkStatus::DifferentChain
    );

    // Even a lower block wins with more prevotes.
    let candidate = header(8, BlockID::new([3u8; 32]), producer(), 8, 6);
    assert_eq!(
        fork_choice(&tip, &candidate, &slot_clock(), at_slot(10)),
        ForkStatus::DifferentChain
    );
}

#[test]
fn less_agreement_is_discarded_test() {
    let tip = header(10, parent_id(), producer(), 10, 5);

    let lower_prevotes = header(12, BlockID::new([3u8; 32]), producer(), 12, 4);
    assert!(!is_different_chain(&tip, &lower_prevotes));
    assert_eq!(
        fork_choice(&tip, &lower_prevotes, &slot_clock(), at_slot(12)),
        ForkStatus::Discard
    );

    let same_prevotes_lower_height = header(9, BlockID::new([3u8; 32]), producer(), 9, 5);
    assert_eq!(
        fork_choice(&tip, &same_prevotes_lower_height, &slot_clock(), at_slot(12)),
        ForkStatus::Discard
    );
}

#[test]
fn fork_choice_is_deterministic_test() {
    let mut rng = rand::thread_rng();
    let slots = slot_clock();
    let generators = [producer(), producer()];
    let parents = [parent_id(), BlockID::new([3u8; 32])];

    for _ in 0..500 {
        let random_header = |rng: &mut rand::rngs::ThreadRng| {
            header(
                rng.gen_range(5, 8),
                parents[rng.gen_range(0, 2)],
                generators[rng.gen_range(0, 2)],
                rng.gen_range(5, 9),
                rng.gen_range(2, 5),
            )
            .with_received_at(at_slot(rng.gen_range(5, 10)))
        };
        let last_block = random_header(&mut rng);
        let received_block = random_header(&mut rng);
        let now = at_slot(rng.gen_range(5, 10));

        let status = fork_choice(&last_block, &received_block, &slots, now);
        assert_eq!(
            status,
            fork_choice(&last_block, &received_block, &slots, now)
        );

        // The first matching predicate decides.
        let expected = if is_valid_block(&last_block, &received_block) {
            ForkStatus::ValidBlock
        } else if is_identical_block(&last_block, &received_block) {
            ForkStatus::IdenticalBlock
        } else if is_double_forging(&last_block, &received_block) {
            ForkStatus::DoubleForging
        } else if is_tie_break(&last_block, &received_block, &slots, now) {
            ForkStatus::TieBreak
        } else if is_different_chain(&last_block, &received_block) {
            ForkStatus::DifferentChain
        } else {
            ForkStatus::Discard
        };
        assert_eq!(status, expected);

        // A block is never preferred over itself.
        assert_eq!(
            fork_choice(&last_block, &last_block, &slots, now),
            ForkStatus::IdenticalBlock
        );
    }
}

#[test]
fn fork_status_name_test() {
    assert_eq!(ForkStatus::ValidBlock.to_string(), "ValidBlock");
    assert_eq!(ForkStatus::DoubleForging.name(), "DoubleForging");
    assert_eq!(format!("{}", ForkStatus::DifferentChain), "DifferentChain");
}

#[test]
fn slot_clock_test() {
    assert_eq!(
        SlotClock::new(GENESIS_TIMESTAMP, 0).unwrap_err(),
        SlotClockError::ZeroBlockTime
    );

    let slots = slot_clock();
    assert_eq!(slots.slot_of(GENESIS_TIMESTAMP), Slot::new(0));
    assert_eq!(
        slots.slot_of(Timestamp::new(GENESIS_TIMESTAMP.secs() + BLOCK_TIME - 1)),
        Slot::new(0)
    );
    assert_eq!(
        slots.slot_of(Timestamp::new(GENESIS_TIMESTAMP.secs() + 3 * BLOCK_TIME + 1)),
        Slot::new(3)
    );
    assert_eq!(slots.slot_of(Timestamp::new(0)), Slot::new(0));
    assert_eq!(slots.slot_of(slots.slot_start(Slot::new(42))), Slot::new(42));

    assert!(slots.is_within_slot_window(Slot::new(3), at_slot(3)));
    assert!(!slots.is_within_slot_window(Slot::new(3), at_slot(4)));
}

#[test]
fn slot_start_saturates_test() {
    let slots = slot_clock();
    assert_eq!(slots.slot_start(Slot::new(u64::MAX)), Timestamp::new(u64::MAX));
    assert_eq!(
        slots.slot_start(Slot::new(u64::MAX / BLOCK_TIME)),
        Timestamp::new(u64::MAX)
    );
}
