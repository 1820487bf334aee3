/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Typed setters over a user-provided [`WriteBatch`].

use borsh::BorshSerialize;

use crate::types::{
    block::{Block, BlockHeader},
    data_types::BlockID,
    update_sets::AppStateUpdates,
};

use super::{
    pluggables::{KVSetError, Key, WriteBatch},
    variables::{self, concat},
};

/// A [`WriteBatch`] that forms the keys of persistent variables for the caller.
///
/// Nothing becomes visible until the batch is passed to [`KVStore::write`](super::KVStore::write),
/// which applies it atomically.
pub struct ChainWriteBatch<W: WriteBatch>(pub(crate) W);

impl<W: WriteBatch> ChainWriteBatch<W> {
    pub fn new() -> ChainWriteBatch<W> {
        ChainWriteBatch(W::new())
    }

    /// Unwrap the inner [`WriteBatch`].
    pub fn into_inner(self) -> W {
        self.0
    }

    /* ↓↓↓ Block ↓↓↓  */

    /// Store `block`'s header and payload, and index it by its height.
    pub fn set_block(&mut self, block: &Block) -> Result<(), KVSetError> {
        let id = block.header.id;
        self.0.set(
            &concat(&variables::BLOCK_HEADERS, &id.bytes()),
            &serialize(&block.header, || Key::BlockHeader { block: id })?,
        );
        self.0.set(
            &concat(&variables::BLOCK_DATA, &id.bytes()),
            &serialize(&block.data, || Key::BlockData { block: id })?,
        );
        self.0.set(
            &concat(&variables::BLOCK_AT_HEIGHT, &block.header.height.to_le_bytes()),
            &serialize(&id, || Key::BlockAtHeight {
                height: block.header.height,
            })?,
        );
        Ok(())
    }

    pub fn delete_block(&mut self, header: &BlockHeader) {
        self.0
            .delete(&concat(&variables::BLOCK_HEADERS, &header.id.bytes()));
        self.0.delete(&concat(&variables::BLOCK_DATA, &header.id.bytes()));
        self.0
            .delete(&concat(&variables::BLOCK_AT_HEIGHT, &header.height.to_le_bytes()));
    }

    /* ↓↓↓ Block Undo Updates ↓↓↓ */

    pub fn set_block_undo_updates(
        &mut self,
        block: &BlockID,
        undo_updates: &AppStateUpdates,
    ) -> Result<(), KVSetError> {
        self.0.set(
            &concat(&variables::BLOCK_UNDO_UPDATES, &block.bytes()),
            &serialize(undo_updates, || Key::BlockUndoUpdates { block: *block })?,
        );
        Ok(())
    }

    pub fn delete_block_undo_updates(&mut self, block: &BlockID) {
        self.0
            .delete(&concat(&variables::BLOCK_UNDO_UPDATES, &block.bytes()));
    }

    /* ↓↓↓ Tip ↓↓↓ */

    pub fn set_tip(&mut self, block: &BlockID) -> Result<(), KVSetError> {
        self.0.set(&variables::TIP, &serialize(block, || Key::Tip)?);
        Ok(())
    }

    /* ↓↓↓ App State ↓↓↓ */

    pub fn apply_app_state_updates(&mut self, app_state_updates: &AppStateUpdates) {
        for (key, value) in app_state_updates.inserts() {
            self.0.set(&concat(&variables::APP_STATE, key), value);
        }

        for key in app_state_updates.deletes() {
            self.0.delete(&concat(&variables::APP_STATE, key));
        }
    }

    /* ↓↓↓ Temp Blocks ↓↓↓ */

    pub fn set_temp_block(&mut self, index: u32, block: &Block) -> Result<(), KVSetError> {
        self.0.set(
            &concat(&variables::TEMP_BLOCKS, &index.to_le_bytes()),
            &serialize(block, || Key::TempBlock { index })?,
        );
        Ok(())
    }

    pub fn delete_temp_block(&mut self, index: u32) {
        self.0
            .delete(&concat(&variables::TEMP_BLOCKS, &index.to_le_bytes()));
    }

    pub fn set_temp_blocks_len(&mut self, len: u32) -> Result<(), KVSetError> {
        self.0
            .set(&variables::TEMP_BLOCKS_LEN, &serialize(&len, || Key::TempBlocksLen)?);
        Ok(())
    }
}

fn serialize<T: BorshSerialize>(value: &T, key: impl FnOnce() -> Key) -> Result<Vec<u8>, KVSetError> {
    value
        .try_to_vec()
        .map_err(|err| KVSetError::SerializeValueError {
            key: key(),
            source: err,
        })
}
