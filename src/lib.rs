/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A library for deciding which of several competing block histories a node should follow, and for
//! moving the node's local chain onto that history safely.
//!
//! # Overview
//!
//! Nodes in a slot-based, BFT-finalized blockchain keep receiving blocks that compete with each
//! other: blocks extending the tip, duplicates, siblings forged by the same or by different
//! producers, and blocks on branches that diverged some heights ago. For every such block this
//! library decides whether to extend the local chain, ignore the block, or revert recently accepted
//! blocks and follow the block's branch instead.
//!
//! The main components are:
//! 1. The [fork choice rule](fork_choice), a pure function that classifies a received block against
//!    the tip.
//! 2. The [synchronizer](synchronizer), which acts on the classification: it appends, drops, or
//!    reorganizes, and rolls back reorganizations that fail.
//! 3. The [temporary block store](temp_blocks), where blocks removed during a reorganization are
//!    kept until the reorganization commits, so that both rolling back and
//!    [startup recovery](synchronizer::Synchronizer::recover) can restore them.
//! 4. The [node](node), which runs a synchronizer on a background thread fed by a bounded queue of
//!    candidate blocks.
//!
//! # Pluggable components
//!
//! The synchronizer consumes its collaborators through traits, each of which has an implementation
//! in this library:
//! - [`BlockExecutor`](synchronizer::BlockExecutor): [`ChainStore`](chain::ChainStore), which
//!   persists the local chain in a user-provided [key-value store](storage::KVStore) and delegates
//!   block validation to a user-provided [`App`](app::App).
//! - [`TempBlockStore`](temp_blocks::TempBlockStore): [`KVTempBlockStore`](temp_blocks::KVTempBlockStore).
//! - [`BlockFetcher`](synchronizer::BlockFetcher): [`NetworkBlockFetcher`](networking::NetworkBlockFetcher),
//!   over a user-provided [network](networking::Network).
//! - [`FinalityOracle`](synchronizer::FinalityOracle): [`CertifiedHeight`](finality::CertifiedHeight).
//! - [`Slots`](slots::Slots): [`SlotClock`](slots::SlotClock).

pub mod app;

pub mod chain;

pub mod events;

pub mod finality;

pub mod fork_choice;

pub mod logging;

pub mod networking;

pub mod node;

pub mod slots;

pub mod storage;

pub mod synchronizer;

pub mod temp_blocks;

pub mod types;

pub(crate) mod event_bus;
