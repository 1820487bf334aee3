/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits for pluggable persistence.

use std::fmt::{self, Display, Formatter};

use borsh::BorshDeserialize;

use crate::types::{
    block::{Block, BlockHeader},
    data_types::{BlockHeight, BlockID, Data},
    update_sets::AppStateUpdates,
};

use super::variables::{self, concat};

/// A key-value store with atomic, batched writes.
///
/// Implement this for whatever persistence mechanism you want, e.g., a RocksDB instance, and pass it
/// to [`ChainStore::new`](crate::chain::ChainStore::new) and
/// [`KVTempBlockStore::new`](crate::temp_blocks::KVTempBlockStore::new). Both may share the same
/// underlying store, since their variables live under [disjoint prefixes](super::variables).
pub trait KVStore: KVGet + Clone + Send + 'static {
    type WriteBatch: WriteBatch;

    /// Atomically apply every `set` and `delete` in `wb`.
    fn write(&mut self, wb: Self::WriteBatch);

    fn clear(&mut self);
}

/// Read access into a [`KVStore`], with typed getters for every persistent variable.
pub trait KVGet {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /* ↓↓↓ Block Headers ↓↓↓ */

    fn block_header(&self, block: &BlockID) -> Result<Option<BlockHeader>, KVGetError> {
        deserialize_value(
            self.get(&concat(&variables::BLOCK_HEADERS, &block.bytes())),
            || Key::BlockHeader { block: *block },
        )
    }

    /* ↓↓↓ Block Data ↓↓↓ */

    fn block_data(&self, block: &BlockID) -> Result<Option<Data>, KVGetError> {
        deserialize_value(
            self.get(&concat(&variables::BLOCK_DATA, &block.bytes())),
            || Key::BlockData { block: *block },
        )
    }

    /// Get the header and the payload of `block`. If the header is stored, the payload must be too.
    fn block(&self, block: &BlockID) -> Result<Option<Block>, KVGetError> {
        let header = match self.block_header(block)? {
            Some(header) => header,
            None => return Ok(None),
        };
        let data = self
            .block_data(block)?
            .ok_or(KVGetError::ValueExpectedButNotFound {
                key: Key::BlockData { block: *block },
            })?;

        Ok(Some(Block { header, data }))
    }

    /* ↓↓↓ Block at Height ↓↓↓ */

    fn block_at_height(&self, height: BlockHeight) -> Result<Option<BlockID>, KVGetError> {
        deserialize_value(
            self.get(&concat(&variables::BLOCK_AT_HEIGHT, &height.to_le_bytes())),
            || Key::BlockAtHeight { height },
        )
    }

    /* ↓↓↓ Block Undo Updates ↓↓↓ */

    fn block_undo_updates(&self, block: &BlockID) -> Result<AppStateUpdates, KVGetError> {
        deserialize_value(
            self.get(&concat(&variables::BLOCK_UNDO_UPDATES, &block.bytes())),
            || Key::BlockUndoUpdates { block: *block },
        )?
        .ok_or(KVGetError::ValueExpectedButNotFound {
            key: Key::BlockUndoUpdates { block: *block },
        })
    }

    /* ↓↓↓ Tip ↓↓↓ */

    fn tip(&self) -> Result<Option<BlockID>, KVGetError> {
        deserialize_value(self.get(&variables::TIP), || Key::Tip)
    }

    /* ↓↓↓ App State ↓↓↓ */

    fn app_state(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.get(&concat(&variables::APP_STATE, key))
    }

    /* ↓↓↓ Temp Blocks ↓↓↓ */

    /// Get the number of entries in the temporary block list. An absent length means 0.
    fn temp_blocks_len(&self) -> Result<u32, KVGetError> {
        Ok(deserialize_value(self.get(&variables::TEMP_BLOCKS_LEN), || Key::TempBlocksLen)?
            .unwrap_or(0))
    }

    fn temp_block(&self, index: u32) -> Result<Block, KVGetError> {
        deserialize_value(
            self.get(&concat(&variables::TEMP_BLOCKS, &index.to_le_bytes())),
            || Key::TempBlock { index },
        )?
        .ok_or(KVGetError::ValueExpectedButNotFound {
            key: Key::TempBlock { index },
        })
    }
}

fn deserialize_value<T: BorshDeserialize>(
    bytes: Option<Vec<u8>>,
    key: impl FnOnce() -> Key,
) -> Result<Option<T>, KVGetError> {
    match bytes {
        Some(bytes) => T::deserialize(&mut bytes.as_slice())
            .map(Some)
            .map_err(|err| KVGetError::DeserializeValueError {
                key: key(),
                source: err,
            }),
        None => Ok(None),
    }
}

pub trait WriteBatch {
    fn new() -> Self;
    fn set(&mut self, key: &[u8], value: &[u8]);
    fn delete(&mut self, key: &[u8]);
}

/// Error when trying to read a value corresponding to a given key from the [key value store][KVStore].
/// The error may arise in the following circumstances:
/// 1. The value corresponding to a given key cannot be deserialized into its expected type,
/// 2. The value corresponding to a given key cannot be found, even though an invariant says it should
///    be there.
#[derive(Debug)]
pub enum KVGetError {
    DeserializeValueError { key: Key, source: std::io::Error },
    ValueExpectedButNotFound { key: Key },
}

/// Error when writing a key-value pair to a write batch. The error may arise when the value cannot be
/// serialized, and hence cannot be written to the write batch.
#[derive(Debug)]
pub enum KVSetError {
    SerializeValueError { key: Key, source: std::io::Error },
}

/// Error when reading from or writing to persistent storage.
#[derive(Debug)]
pub enum StorageError {
    KVGetError(KVGetError),
    KVSetError(KVSetError),
}

impl From<KVGetError> for StorageError {
    fn from(value: KVGetError) -> Self {
        StorageError::KVGetError(value)
    }
}

impl From<KVSetError> for StorageError {
    fn from(value: KVSetError) -> Self {
        StorageError::KVSetError(value)
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::KVGetError(KVGetError::DeserializeValueError { key, source }) => {
                write!(f, "could not deserialize {}: {}", key, source)
            }
            StorageError::KVGetError(KVGetError::ValueExpectedButNotFound { key }) => {
                write!(f, "expected {} but found nothing", key)
            }
            StorageError::KVSetError(KVSetError::SerializeValueError { key, source }) => {
                write!(f, "could not serialize {}: {}", key, source)
            }
        }
    }
}

#[derive(Debug)]
pub enum Key {
    BlockHeader { block: BlockID },
    BlockData { block: BlockID },
    BlockAtHeight { height: BlockHeight },
    BlockUndoUpdates { block: BlockID },
    Tip,
    AppState { key: Vec<u8> },
    TempBlocksLen,
    TempBlock { index: u32 },
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Key::BlockHeader { block } => write!(f, "Block Header for block {}", block),
            Key::BlockData { block } => write!(f, "Block Data for block {}", block),
            Key::BlockAtHeight { height } => write!(f, "Block at height {}", height),
            Key::BlockUndoUpdates { block } => write!(f, "Block Undo Updates for block {}", block),
            Key::Tip => write!(f, "Tip"),
            Key::AppState { key } => write!(f, "App State for key {:?}", key),
            Key::TempBlocksLen => write!(f, "Temp Blocks Length"),
            Key::TempBlock { index } => write!(f, "Temp Block at index {}", index),
        }
    }
}
