/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Trait definition for pluggable state transition functions.
//!
//! The [chain store](crate::chain::ChainStore) does not interpret block payloads itself. Instead, it
//! hands every block that it is asked to apply to an `App`, which decides whether the block is valid
//! and, if so, what [`AppStateUpdates`] applying it produces.
//!
//! # Required methods
//!
//! `App` has two required methods:
//! 1. [`validate_block`](App::validate_block): called when a block received from the network is about
//!    to be appended to the local chain, either because it extends the tip or because it is part of
//!    a branch being replayed during a reorganization.
//! 2. [`execute_validated_block`](App::execute_validated_block): called when a block that was
//!    validated earlier is applied again, for example, when restoring blocks from the
//!    [temporary block store](crate::temp_blocks) after a failed reorganization.
//!
//! # Determinism requirements
//!
//! Both methods must be deterministic: given the same block and the same app state they must return
//! the same response. Otherwise undoing and redoing the same block can leave the app state different
//! from what it was.

use crate::storage::{KVGet, KVStore};
use crate::types::{block::Block, block::BlockHeader, update_sets::AppStateUpdates};

pub trait App<K: KVStore>: Send + 'static {
    /// Decide whether `request.block()` is valid, and if it is, compute its app state updates.
    fn validate_block(&mut self, request: AppBlockRequest<K>) -> AppBlockResponse;

    /// Compute the app state updates of a block which was previously deemed valid.
    ///
    /// Implementations may skip expensive checks here. The default implementation simply calls
    /// [`validate_block`](Self::validate_block).
    fn execute_validated_block(&mut self, request: AppBlockRequest<K>) -> AppBlockResponse {
        self.validate_block(request)
    }
}

/// The block an [`App`] is asked to process, together with a read-only view of the app state just
/// before the block is applied.
pub struct AppBlockRequest<'a, K: KVStore> {
    block: &'a Block,
    parent: &'a BlockHeader,
    app_state: AppStateView<'a, K>,
}

impl<'a, K: KVStore> AppBlockRequest<'a, K> {
    pub(crate) fn new(block: &'a Block, parent: &'a BlockHeader, kv_store: &'a K) -> Self {
        Self {
            block,
            parent,
            app_state: AppStateView { kv_store },
        }
    }

    pub fn block(&self) -> &Block {
        self.block
    }

    /// Get the header of the current tip, which `block` extends.
    pub fn parent(&self) -> &BlockHeader {
        self.parent
    }

    pub fn app_state(&self) -> &AppStateView<'a, K> {
        &self.app_state
    }
}

pub enum AppBlockResponse {
    Valid {
        app_state_updates: Option<AppStateUpdates>,
    },
    Invalid,
}

/// Read-only view of the app state, as it is after applying every block from genesis to the current
/// tip.
pub struct AppStateView<'a, K: KVStore> {
    kv_store: &'a K,
}

impl<'a, K: KVStore> AppStateView<'a, K> {
    /// Get the value associated with `key` in the current app state.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.kv_store.app_state(key)
    }
}
