/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Byte-prefixes that specify where each persistent variable is stored in the user-provided key-value
//! store.
//!
//! # List of State Variables
//!
//! |Variable|Type|Description|
//! |---|---|---|
//! |Block Headers|[`BlockID`](crate::types::data_types::BlockID) -> [`BlockHeader`](crate::types::block::BlockHeader)|Headers of every block on the local chain, including their `received_at`.|
//! |Block Data|[`BlockID`](crate::types::data_types::BlockID) -> [`Data`](crate::types::data_types::Data)|Payloads of every block on the local chain.|
//! |Block at Height|[`BlockHeight`](crate::types::data_types::BlockHeight) -> [`BlockID`](crate::types::data_types::BlockID)|The block at each height of the local chain. There is exactly one local chain, so this is a function.|
//! |Block Undo Updates|[`BlockID`](crate::types::data_types::BlockID) -> [`AppStateUpdates`](crate::types::update_sets::AppStateUpdates)|The app state updates that revert the effects of applying a block.|
//! |Tip|[`BlockID`](crate::types::data_types::BlockID)|The block at the highest height of the local chain.|
//! |App State|[`Vec<u8>`] -> [`Vec<u8>`]|Key-value pairs produced by applying every block from genesis to the tip.|
//! |Temp Blocks Length|[`u32`]|Number of entries in the temporary block list.|
//! |Temp Blocks|[`u32`] -> [`Block`](crate::types::block::Block)|Entries of the temporary block list, by insertion index.|
//!
//! # Persistence of state variables
//!
//! Every variable is stored as a **Borsh-serialized value**. "Single values" (tip, temp blocks length)
//! are stored at the one-byte key sharing the variable's name. Mappings of the form "`A` -> `B`" are
//! stored at keys formed by concatenating the variable's one-byte prefix with the serialization of `A`
//! (heights and indices are serialized little-endian, app state keys are used as-is).

pub const BLOCK_HEADERS: [u8; 1] = [0];
pub const BLOCK_DATA: [u8; 1] = [1];
pub const BLOCK_AT_HEIGHT: [u8; 1] = [2];
pub const BLOCK_UNDO_UPDATES: [u8; 1] = [3];
pub const TIP: [u8; 1] = [4];
pub const APP_STATE: [u8; 1] = [5];
pub const TEMP_BLOCKS_LEN: [u8; 1] = [6];
pub const TEMP_BLOCKS: [u8; 1] = [7];

/// Takes references to two byteslices and returns a vector containing the bytes of the first one, and
/// then the bytes of the second one.
pub fn concat(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut res = Vec::with_capacity(a.len() + b.len());
    res.extend_from_slice(a);
    res.extend_from_slice(b);
    res
}
