//! A [`Synchronizer`] wired to in-memory doubles, with handles for inspecting each of them.

use std::sync::mpsc::{self, Receiver};

use fork_choice_rs::{
    events::Event,
    finality::CertifiedHeight,
    slots::SlotClock,
    synchronizer::{Synchronizer, SynchronizerConfiguration},
    temp_blocks::KVTempBlockStore,
    types::{block::Block, data_types::BlockHeight},
};

use crate::common::{
    chain_builder::{branch, genesis, producer, slot_clock, trailing_by_two},
    doubles::{MemExecutor, MemFetcher},
    mem_db::MemDB,
};

pub(crate) type TestSynchronizer =
    Synchronizer<MemExecutor, KVTempBlockStore<MemDB>, MemFetcher, CertifiedHeight, SlotClock>;

pub(crate) struct Harness {
    pub(crate) synchronizer: TestSynchronizer,
    pub(crate) executor: MemExecutor,
    pub(crate) temp_blocks: KVTempBlockStore<MemDB>,
    pub(crate) fetcher: MemFetcher,
    pub(crate) finality: CertifiedHeight,
    events: Receiver<Event>,
}

impl Harness {
    /// Start a synchronizer whose local chain is `chain`, with an empty temporary block store.
    pub(crate) fn new(
        chain: Vec<Block>,
        certified_height: u64,
        config: SynchronizerConfiguration,
    ) -> Harness {
        Harness::with_temp_blocks(chain, KVTempBlockStore::new(MemDB::new()), certified_height, config)
    }

    pub(crate) fn with_temp_blocks(
        chain: Vec<Block>,
        temp_blocks: KVTempBlockStore<MemDB>,
        certified_height: u64,
        config: SynchronizerConfiguration,
    ) -> Harness {
        let executor = MemExecutor::new(chain);
        let fetcher = MemFetcher::new();
        let finality = CertifiedHeight::new(BlockHeight::new(certified_height));
        let (event_publisher, events) = mpsc::channel();

        let synchronizer = Synchronizer::new(
            config,
            executor.clone(),
            temp_blocks.clone(),
            fetcher.clone(),
            finality.clone(),
            slot_clock(),
            Some(event_publisher),
        )
        .unwrap();

        Harness {
            synchronizer,
            executor,
            temp_blocks,
            fetcher,
            finality,
            events,
        }
    }

    /// Take every event published since the last call.
    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.try_iter().collect()
    }
}

pub(crate) fn config() -> SynchronizerConfiguration {
    SynchronizerConfiguration {
        fetch_batch_size: 2,
        tie_break_replaces_tip: false,
    }
}

/// Build a chain from genesis to `tip_height`, where every block has been prevoted up to two heights
/// below it.
pub(crate) fn local_chain(tip_height: u64) -> Vec<Block> {
    let genesis = genesis();
    let mut chain = vec![genesis.clone()];
    chain.extend(branch(
        &genesis.header,
        tip_height,
        producer(),
        trailing_by_two,
        1,
    ));
    chain
}
