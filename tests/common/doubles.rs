//! In-memory implementations of the synchronizer's pluggable traits, with knobs for injecting
//! failures.
//!
//! Both types are handles to shared state: a test keeps a clone to inspect and steer the copy that
//! was moved into a `Synchronizer`.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use fork_choice_rs::{
    storage::{KVGetError, Key, StorageError},
    synchronizer::{
        BlockExecutor, BlockFetcher, CancellationToken, ExecuteError, FetchError, RemovedBlock,
    },
    temp_blocks::{KVTempBlockStore, TempBlockStore},
    types::{
        block::{Block, BlockHeader},
        data_types::{BlockHeight, BlockID},
    },
};

use crate::common::mem_db::MemDB;

/// A [`BlockExecutor`] whose local chain is a `Vec` of blocks, starting at genesis.
#[derive(Clone)]
pub(crate) struct MemExecutor(Arc<Mutex<MemChain>>);

struct MemChain {
    blocks: Vec<Block>,
    // `execute` rejects blocks at this height.
    invalid_height: Option<BlockHeight>,
    // `apply_validated` fails.
    fail_apply_validated: bool,
    // Cancel the token right after executing the block at this height.
    cancel_after: Option<(BlockHeight, CancellationToken)>,
    executed: Vec<BlockID>,
}

impl MemExecutor {
    pub(crate) fn new(blocks: Vec<Block>) -> MemExecutor {
        MemExecutor(Arc::new(Mutex::new(MemChain {
            blocks,
            invalid_height: None,
            fail_apply_validated: false,
            cancel_after: None,
            executed: Vec::new(),
        })))
    }

    pub(crate) fn reject_at(&self, height: BlockHeight) {
        self.0.lock().unwrap().invalid_height = Some(height);
    }

    pub(crate) fn fail_apply_validated(&self) {
        self.0.lock().unwrap().fail_apply_validated = true;
    }

    pub(crate) fn cancel_after(&self, height: BlockHeight, token: CancellationToken) {
        self.0.lock().unwrap().cancel_after = Some((height, token));
    }

    /// Get the ids of the blocks on the local chain, from genesis to the tip.
    pub(crate) fn chain(&self) -> Vec<BlockID> {
        self.0
            .lock()
            .unwrap()
            .blocks
            .iter()
            .map(|block| block.id())
            .collect()
    }

    pub(crate) fn blocks(&self) -> Vec<Block> {
        self.0.lock().unwrap().blocks.clone()
    }

    /// Get the ids of every block passed to `execute` successfully, in order.
    pub(crate) fn executed(&self) -> Vec<BlockID> {
        self.0.lock().unwrap().executed.clone()
    }

    // Push `block` onto the chain if it extends the tip.
    fn push(chain: &mut MemChain, block: &Block) -> Result<(), ExecuteError> {
        let tip = chain.blocks.last().ok_or(ExecuteError::Uninitialized)?;
        if !block.header.extends(&tip.header) {
            return Err(ExecuteError::DoesNotExtendTip {
                block: block.header.clone(),
                tip: tip.header.clone(),
            });
        }
        chain.blocks.push(block.clone());
        Ok(())
    }
}

impl BlockExecutor for MemExecutor {
    fn tip(&self) -> Result<BlockHeader, ExecuteError> {
        Ok(self.tip_block()?.header)
    }

    fn tip_block(&self) -> Result<Block, ExecuteError> {
        self.0
            .lock()
            .unwrap()
            .blocks
            .last()
            .cloned()
            .ok_or(ExecuteError::Uninitialized)
    }

    fn header_at_height(&self, height: BlockHeight) -> Result<Option<BlockHeader>, ExecuteError> {
        Ok(self
            .0
            .lock()
            .unwrap()
            .blocks
            .get(height.int() as usize)
            .map(|block| block.header.clone()))
    }

    fn execute(&mut self, block: &Block) -> Result<(), ExecuteError> {
        let mut chain = self.0.lock().unwrap();
        if chain.invalid_height == Some(block.height()) {
            return Err(ExecuteError::InvalidBlock {
                block: block.header.clone(),
            });
        }
        Self::push(&mut chain, block)?;
        chain.executed.push(block.id());
        if let Some((height, token)) = &chain.cancel_after {
            if *height == block.height() {
                token.cancel();
            }
        }
        Ok(())
    }

    fn apply_validated(&mut self, block: &Block) -> Result<(), ExecuteError> {
        let mut chain = self.0.lock().unwrap();
        if chain.fail_apply_validated {
            return Err(ExecuteError::InvalidBlock {
                block: block.header.clone(),
            });
        }
        Self::push(&mut chain, block)
    }

    fn undo_tip(&mut self) -> Result<RemovedBlock, ExecuteError> {
        let mut chain = self.0.lock().unwrap();
        if chain.blocks.len() <= 1 {
            return Err(ExecuteError::CannotUndoGenesis);
        }
        let block = chain.blocks.pop().ok_or(ExecuteError::Uninitialized)?;
        let new_tip = chain
            .blocks
            .last()
            .map(|block| block.header.clone())
            .ok_or(ExecuteError::Uninitialized)?;
        Ok(RemovedBlock { block, new_tip })
    }
}

/// A [`BlockFetcher`] that serves ranges from every block it was given, following `previous_block_id`
/// links down from the requested branch head.
#[derive(Clone)]
pub(crate) struct MemFetcher(Arc<Mutex<MemFetcherState>>);

struct MemFetcherState {
    blocks: HashMap<BlockID, Block>,
    failure: Option<FetchError>,
    // Cancel the token on every request.
    cancel_on_fetch: Option<CancellationToken>,
    requests: Vec<(BlockHeight, BlockHeight)>,
}

impl MemFetcher {
    pub(crate) fn new() -> MemFetcher {
        MemFetcher(Arc::new(Mutex::new(MemFetcherState {
            blocks: HashMap::new(),
            failure: None,
            cancel_on_fetch: None,
            requests: Vec::new(),
        })))
    }

    pub(crate) fn serve<'a>(&self, blocks: impl IntoIterator<Item = &'a Block>) {
        let mut state = self.0.lock().unwrap();
        for block in blocks {
            state.blocks.insert(block.id(), block.clone());
        }
    }

    pub(crate) fn fail_with(&self, error: FetchError) {
        self.0.lock().unwrap().failure = Some(error);
    }

    pub(crate) fn cancel_on_fetch(&self, token: CancellationToken) {
        self.0.lock().unwrap().cancel_on_fetch = Some(token);
    }

    /// Get every `(from, to)` range requested so far.
    pub(crate) fn requests(&self) -> Vec<(BlockHeight, BlockHeight)> {
        self.0.lock().unwrap().requests.clone()
    }
}

impl BlockFetcher for MemFetcher {
    fn fetch_range(
        &mut self,
        from: BlockHeight,
        to: BlockHeight,
        branch_head: &BlockID,
    ) -> Result<Vec<Block>, FetchError> {
        let mut state = self.0.lock().unwrap();
        state.requests.push((from, to));
        if let Some(token) = &state.cancel_on_fetch {
            token.cancel();
        }
        if let Some(error) = state.failure {
            return Err(error);
        }

        let mut range = Vec::new();
        let mut cursor = state.blocks.get(branch_head);
        while let Some(block) = cursor {
            if block.height() < from {
                break;
            }
            if block.height() <= to {
                range.push(block.clone());
            }
            cursor = state.blocks.get(&block.header.previous_block_id);
        }
        range.reverse();

        if range.len() as u64 != to.int() - from.int() + 1 {
            return Err(FetchError::Timeout);
        }
        Ok(range)
    }
}

/// A [`TempBlockStore`] over a [`MemDB`] whose `clear` can be made to fail.
#[derive(Clone)]
pub(crate) struct FlakyTempBlocks {
    inner: KVTempBlockStore<MemDB>,
    failing_clears: Arc<Mutex<u32>>,
}

impl FlakyTempBlocks {
    pub(crate) fn new() -> FlakyTempBlocks {
        FlakyTempBlocks {
            inner: KVTempBlockStore::new(MemDB::new()),
            failing_clears: Arc::new(Mutex::new(0)),
        }
    }

    pub(crate) fn fail_next_clear(&self) {
        *self.failing_clears.lock().unwrap() += 1;
    }
}

impl TempBlockStore for FlakyTempBlocks {
    fn append(&mut self, block: &Block) -> Result<(), StorageError> {
        self.inner.append(block)
    }

    fn pop_latest(&mut self) -> Result<Option<Block>, StorageError> {
        self.inner.pop_latest()
    }

    fn list_descending_height(&self) -> Result<Vec<Block>, StorageError> {
        self.inner.list_descending_height()
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        let mut failing_clears = self.failing_clears.lock().unwrap();
        if *failing_clears > 0 {
            *failing_clears -= 1;
            return Err(StorageError::KVGetError(
                KVGetError::ValueExpectedButNotFound {
                    key: Key::TempBlocksLen,
                },
            ));
        }
        self.inner.clear()
    }
}
