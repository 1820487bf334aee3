/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The local chain: a single branch of blocks from genesis to the tip, persisted in a
//! [`KVStore`](crate::storage::KVStore).
//!
//! The chain is a backward linked list: every stored header names its parent by
//! [`previous_block_id`](crate::types::block::BlockHeader::previous_block_id), and the key-value store
//! indexes headers by id and by height. There is no in-memory copy of the chain.
//!
//! # Initializing the chain
//!
//! Before a [`ChainStore`] is handed to a [`Synchronizer`](crate::synchronizer::Synchronizer) or a
//! [`Node`](crate::node::Node), call [`ChainStore::initialize`] with the genesis block and the initial
//! app state. Initializing a chain that already has a tip is a no-op, so this may be called on every
//! startup.

mod store;

pub use store::ChainStore;
