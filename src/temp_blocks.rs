/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Durable holding area for blocks removed from the local chain during a reorganization.
//!
//! Before the [`Synchronizer`](crate::synchronizer::Synchronizer) reverts a block from the local
//! chain to switch onto a competing branch, it saves the block here. If replaying the competing
//! branch fails, the saved blocks are put back. If the process crashes in the middle of a
//! reorganization, [startup recovery](crate::synchronizer::Synchronizer::recover) finds the saved
//! blocks here and decides whether to restore or discard them.
//!
//! Entries are whole [`Block`]s, including each header's `received_at`.

use crate::storage::{ChainWriteBatch, KVGet, KVStore, StorageError};
use crate::types::block::Block;

pub trait TempBlockStore {
    /// Save `block` as the most recent entry.
    fn append(&mut self, block: &Block) -> Result<(), StorageError>;

    /// Remove and return the most recently appended entry.
    ///
    /// Since a reorganization saves blocks while walking down from the tip, during a rollback this
    /// is the block at the lowest height.
    fn pop_latest(&mut self) -> Result<Option<Block>, StorageError>;

    /// Get every entry, ordered by descending height.
    fn list_descending_height(&self) -> Result<Vec<Block>, StorageError>;

    fn clear(&mut self) -> Result<(), StorageError>;

    fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.list_descending_height()?.is_empty())
    }
}

/// [`TempBlockStore`] implementation that keeps its entries in a [`KVStore`].
///
/// Entry `i` (in insertion order) is stored under [`TEMP_BLOCKS`](crate::storage::variables::TEMP_BLOCKS)
/// with index `i`, and the number of entries under
/// [`TEMP_BLOCKS_LEN`](crate::storage::variables::TEMP_BLOCKS_LEN). Every mutation is written in a
/// single write batch, so a crash never leaves the length and the entries out of step.
#[derive(Clone)]
pub struct KVTempBlockStore<K: KVStore> {
    kv_store: K,
}

impl<K: KVStore> KVTempBlockStore<K> {
    pub fn new(kv_store: K) -> KVTempBlockStore<K> {
        KVTempBlockStore { kv_store }
    }

    pub fn len(&self) -> Result<u32, StorageError> {
        Ok(self.kv_store.temp_blocks_len()?)
    }
}

impl<K: KVStore> TempBlockStore for KVTempBlockStore<K> {
    fn append(&mut self, block: &Block) -> Result<(), StorageError> {
        let len = self.kv_store.temp_blocks_len()?;

        let mut wb = ChainWriteBatch::new();
        wb.set_temp_block(len, block)?;
        wb.set_temp_blocks_len(len + 1)?;
        self.kv_store.write(wb.into_inner());

        Ok(())
    }

    fn pop_latest(&mut self) -> Result<Option<Block>, StorageError> {
        let len = self.kv_store.temp_blocks_len()?;
        if len == 0 {
            return Ok(None);
        }

        let latest = self.kv_store.temp_block(len - 1)?;

        let mut wb = ChainWriteBatch::new();
        wb.delete_temp_block(len - 1);
        wb.set_temp_blocks_len(len - 1)?;
        self.kv_store.write(wb.into_inner());

        Ok(Some(latest))
    }

    fn list_descending_height(&self) -> Result<Vec<Block>, StorageError> {
        let len = self.kv_store.temp_blocks_len()?;
        let mut blocks = (0..len)
            .map(|index| self.kv_store.temp_block(index))
            .collect::<Result<Vec<Block>, _>>()?;
        blocks.sort_by(|a, b| b.height().cmp(&a.height()));

        Ok(blocks)
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        let len = self.kv_store.temp_blocks_len()?;

        let mut wb = ChainWriteBatch::new();
        (0..len).for_each(|index| wb.delete_temp_block(index));
        wb.set_temp_blocks_len(0)?;
        self.kv_store.write(wb.into_inner());

        Ok(())
    }

    fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.kv_store.temp_blocks_len()? == 0)
    }
}
