//! [`CounterApp`], a simple implementation of [`App`] used in the chain store tests.

use borsh::{BorshDeserialize, BorshSerialize};
use fork_choice_rs::{
    app::{App, AppBlockRequest, AppBlockResponse},
    storage::KVGet,
    types::update_sets::AppStateUpdates,
};

use crate::common::mem_db::MemDB;

// The key in the app state where the counter is stored.
pub(crate) const COUNTER_KEY: [u8; 1] = [0];

// Blocks whose payload starts with this byte are invalid.
pub(crate) const INVALID_TAG: u8 = u8::MAX;

/// A simple implementation of [`App`] for use in integration tests.
///
/// The counter app maintains an app state consisting of a single number which every block adds its
/// payload's first byte to, and an entry under each block's first payload byte recording the height
/// of the last block that carried it.
pub(crate) struct CounterApp;

impl CounterApp {
    /// Return an `AppStateUpdates` that when applied on an empty app state produces a counter of 0.
    pub(crate) fn initial_app_state() -> AppStateUpdates {
        let mut state = AppStateUpdates::new();
        state.insert(COUNTER_KEY.to_vec(), u64::to_le_bytes(0).to_vec());
        state
    }

    /// Get the counter stored in the app state of `kv_store`.
    pub(crate) fn counter<K: KVGet>(kv_store: &K) -> u64 {
        u64::deserialize(&mut &*kv_store.app_state(&COUNTER_KEY).unwrap()).unwrap()
    }

    /// Get the height of the last block on the chain whose payload starts with `tag`.
    pub(crate) fn last_height_with_tag<K: KVGet>(kv_store: &K, tag: u8) -> Option<u64> {
        kv_store
            .app_state(&[1, tag])
            .map(|bytes| u64::deserialize(&mut &*bytes).unwrap())
    }
}

impl App<MemDB> for CounterApp {
    fn validate_block(&mut self, request: AppBlockRequest<MemDB>) -> AppBlockResponse {
        let tag = match request.block().data.vec().first() {
            Some(datum) => datum.bytes().first().copied().unwrap_or(0),
            None => 0,
        };
        if tag == INVALID_TAG {
            return AppBlockResponse::Invalid;
        }

        let counter = u64::deserialize(&mut &*request.app_state().get(&COUNTER_KEY).unwrap()).unwrap();

        let mut app_state_updates = AppStateUpdates::new();
        app_state_updates.insert(
            COUNTER_KEY.to_vec(),
            (counter + tag as u64).try_to_vec().unwrap(),
        );
        app_state_updates.insert(
            vec![1, tag],
            request.block().height().int().try_to_vec().unwrap(),
        );

        AppBlockResponse::Valid {
            app_state_updates: Some(app_state_updates),
        }
    }
}
