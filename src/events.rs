/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the events that a [`Synchronizer`](crate::synchronizer::Synchronizer) emits, for
//! event handling and logging.
//!
//! An event for a given action indicates that the action has been completed.
//!
//! Events are sent over a channel to the event bus thread started by [`Node`](crate::node::Node),
//! which invokes the handlers registered through [`NodeSpec`](crate::node::NodeSpec) and, if
//! [`log_events`](crate::node::Configuration::log_events) is set, the default
//! [loggers](crate::logging).

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::fork_choice::ForkStatus;
use crate::types::{block::BlockHeader, data_types::BlockHeight};

pub enum Event {
    // Events that change the local chain.
    AppendBlock(AppendBlockEvent),
    RemoveBlock(RemoveBlockEvent),
    // Events that involve receiving a candidate block.
    ReceiveBlock(ReceiveBlockEvent),
    DoubleForging(DoubleForgingEvent),
    TieBreak(TieBreakEvent),
    // Reorganization events.
    StartReorg(StartReorgEvent),
    EndReorg(EndReorgEvent),
    // Temporary block store events.
    RestoreTempBlocks(RestoreTempBlocksEvent),
    ClearTempBlocks(ClearTempBlocksEvent),
    Halt(HaltEvent),
}

impl Event {
    pub(crate) fn publish(event_publisher: &Option<Sender<Event>>, event: Event) {
        if let Some(event_publisher) = event_publisher {
            // The event bus only goes away while the node is shutting down.
            let _ = event_publisher.send(event);
        }
    }
}

/// A block was applied on top of the tip, either because it extended the tip, or as part of a
/// branch being replayed or restored.
pub struct AppendBlockEvent {
    pub timestamp: SystemTime,
    pub block: BlockHeader,
}

/// The tip was reverted.
pub struct RemoveBlockEvent {
    pub timestamp: SystemTime,
    pub block: BlockHeader,
}

/// A candidate block was classified against the tip.
pub struct ReceiveBlockEvent {
    pub timestamp: SystemTime,
    pub block: BlockHeader,
    pub status: ForkStatus,
}

/// Evidence that one producer forged two sibling blocks.
pub struct DoubleForgingEvent {
    pub timestamp: SystemTime,
    pub tip: BlockHeader,
    pub received: BlockHeader,
}

pub struct TieBreakEvent {
    pub timestamp: SystemTime,
    pub kept: BlockHeader,
    pub received: BlockHeader,
    /// Whether the received block replaced the tip.
    pub replaced: bool,
}

pub struct StartReorgEvent {
    pub timestamp: SystemTime,
    pub tip: BlockHeader,
    pub candidate: BlockHeader,
    pub certified_height: BlockHeight,
}

pub struct EndReorgEvent {
    pub timestamp: SystemTime,
    pub common_ancestor: Option<BlockHeight>,
    pub removed: u64,
    pub applied: u64,
    /// `false` if the reorganization was rolled back.
    pub committed: bool,
    pub tip: BlockHeader,
}

pub struct RestoreTempBlocksEvent {
    pub timestamp: SystemTime,
    pub restored: u64,
    pub tip: BlockHeader,
}

pub struct ClearTempBlocksEvent {
    pub timestamp: SystemTime,
    pub discarded: u64,
}

/// The synchronizer hit a fatal error and stopped accepting blocks.
pub struct HaltEvent {
    pub timestamp: SystemTime,
    pub reason: String,
}
