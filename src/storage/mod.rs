/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Pluggable persistence for the [chain store](crate::chain) and the
//! [temporary block store](crate::temp_blocks).
//!
//! - Both are kept in persistent storage, most probably in the host's filesystem.
//! - Library users get to choose how exactly this is done. This crate merely requires that whatever
//!   the user provides as a persistence mechanism implements the abstract functionality of a key-value
//!   store with atomic, batched writes ([`KVStore`] and [`WriteBatch`]).
//! - [`variables`] lists everything that is stored and where.
//! - [`ChainWriteBatch`] forms the keys of those variables so that callers never have to.

pub mod pluggables;

pub mod variables;

pub mod write_batch;

pub use pluggables::{KVGet, KVGetError, KVSetError, KVStore, Key, StorageError, WriteBatch};

pub use write_batch::ChainWriteBatch;
