/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! [`BlockExecutor`] implementation backed by a [`KVStore`] and an [`App`].

use crate::app::{App, AppBlockRequest, AppBlockResponse};
use crate::storage::{ChainWriteBatch, KVGet, KVGetError, KVStore, Key, StorageError};
use crate::synchronizer::{BlockExecutor, ExecuteError, RemovedBlock};
use crate::types::{
    block::{Block, BlockHeader},
    data_types::BlockHeight,
    update_sets::AppStateUpdates,
};

/// The local chain, stored in a [`KVStore`], with an [`App`] to validate and execute blocks.
///
/// Applying a block writes, in one [write batch](crate::storage::WriteBatch):
/// 1. The block's header (including `received_at`), payload, and height index.
/// 2. The new tip.
/// 3. The [app state updates](AppStateUpdates) the `App` returned for the block.
/// 4. The *undo updates* of the block: for every key the block touches, the value that key had
///    before the block was applied (or a deletion, if the key was absent).
///
/// [Undoing](BlockExecutor::undo_tip) the tip applies its undo updates and deletes everything that
/// was written for it, again in one write batch.
pub struct ChainStore<K: KVStore, A: App<K>> {
    kv_store: K,
    app: A,
}

impl<K: KVStore, A: App<K>> ChainStore<K, A> {
    pub fn new(kv_store: K, app: A) -> ChainStore<K, A> {
        ChainStore { kv_store, app }
    }

    /// Write the genesis block and the initial app state. Does nothing if the chain already has a
    /// tip.
    pub fn initialize(
        &mut self,
        genesis: &Block,
        initial_app_state: &AppStateUpdates,
    ) -> Result<(), StorageError> {
        if self.kv_store.tip()?.is_some() {
            return Ok(());
        }

        let mut wb = ChainWriteBatch::new();
        wb.set_block(genesis)?;
        wb.set_tip(&genesis.id())?;
        wb.apply_app_state_updates(initial_app_state);
        self.kv_store.write(wb.into_inner());

        Ok(())
    }

    /// Get a read-only handle to the underlying [`KVStore`].
    pub fn kv_store(&self) -> &K {
        &self.kv_store
    }

    pub fn app(&self) -> &A {
        &self.app
    }

    fn apply(&mut self, block: &Block, validated: bool) -> Result<(), ExecuteError> {
        let tip = self.tip()?;
        if !block.header.extends(&tip) {
            return Err(ExecuteError::DoesNotExtendTip {
                block: block.header.clone(),
                tip,
            });
        }

        let request = AppBlockRequest::new(block, &tip, &self.kv_store);
        let response = if validated {
            self.app.execute_validated_block(request)
        } else {
            self.app.validate_block(request)
        };
        let app_state_updates = match response {
            AppBlockResponse::Valid { app_state_updates } => app_state_updates.unwrap_or_default(),
            AppBlockResponse::Invalid => {
                return Err(ExecuteError::InvalidBlock {
                    block: block.header.clone(),
                })
            }
        };
        let undo_updates = self.undo_updates(&app_state_updates);

        let mut wb = ChainWriteBatch::new();
        wb.set_block(block)?;
        wb.set_tip(&block.id())?;
        wb.apply_app_state_updates(&app_state_updates);
        wb.set_block_undo_updates(&block.id(), &undo_updates)?;
        self.kv_store.write(wb.into_inner());

        Ok(())
    }

    // Compute the updates that restore every key touched by `app_state_updates` to its current value.
    fn undo_updates(&self, app_state_updates: &AppStateUpdates) -> AppStateUpdates {
        let mut undo_updates = AppStateUpdates::new();
        let touched_keys = app_state_updates
            .inserts()
            .map(|(key, _)| key)
            .chain(app_state_updates.deletes());
        for key in touched_keys {
            match self.kv_store.app_state(key) {
                Some(prior_value) => undo_updates.insert(key.clone(), prior_value),
                None => undo_updates.delete(key.clone()),
            }
        }
        undo_updates
    }
}

impl<K: KVStore, A: App<K>> BlockExecutor for ChainStore<K, A> {
    fn tip(&self) -> Result<BlockHeader, ExecuteError> {
        let tip = self.kv_store.tip()?.ok_or(ExecuteError::Uninitialized)?;
        Ok(self
            .kv_store
            .block_header(&tip)?
            .ok_or(KVGetError::ValueExpectedButNotFound {
                key: Key::BlockHeader { block: tip },
            })?)
    }

    fn tip_block(&self) -> Result<Block, ExecuteError> {
        let tip = self.kv_store.tip()?.ok_or(ExecuteError::Uninitialized)?;
        Ok(self
            .kv_store
            .block(&tip)?
            .ok_or(KVGetError::ValueExpectedButNotFound {
                key: Key::BlockHeader { block: tip },
            })?)
    }

    fn header_at_height(&self, height: BlockHeight) -> Result<Option<BlockHeader>, ExecuteError> {
        match self.kv_store.block_at_height(height)? {
            Some(block) => Ok(self.kv_store.block_header(&block)?),
            None => Ok(None),
        }
    }

    fn execute(&mut self, block: &Block) -> Result<(), ExecuteError> {
        self.apply(block, false)
    }

    fn apply_validated(&mut self, block: &Block) -> Result<(), ExecuteError> {
        self.apply(block, true)
    }

    fn undo_tip(&mut self) -> Result<RemovedBlock, ExecuteError> {
        let tip = self.tip()?;
        if tip.height == BlockHeight::new(0) {
            return Err(ExecuteError::CannotUndoGenesis);
        }

        let block = self
            .kv_store
            .block(&tip.id)?
            .ok_or(KVGetError::ValueExpectedButNotFound {
                key: Key::BlockHeader { block: tip.id },
            })?;
        let new_tip = self
            .kv_store
            .block_header(&tip.previous_block_id)?
            .ok_or(KVGetError::ValueExpectedButNotFound {
                key: Key::BlockHeader {
                    block: tip.previous_block_id,
                },
            })?;
        let undo_updates = self.kv_store.block_undo_updates(&tip.id)?;

        let mut wb = ChainWriteBatch::new();
        wb.apply_app_state_updates(&undo_updates);
        wb.delete_block(&tip);
        wb.delete_block_undo_updates(&tip.id);
        wb.set_tip(&new_tip.id)?;
        self.kv_store.write(wb.into_inner());

        Ok(RemovedBlock { block, new_tip })
    }
}
