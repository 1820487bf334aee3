/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the node's
//! [config](crate::node::Configuration).
//!
//! This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [ReceiveBlock](crate::events::ReceiveBlockEvent) is printed:
//!
//! ```text
//! ReceiveBlock, 1701329264, fNGCJyk, 12, 10, DifferentChain
//! ```
//!
//! In the snippet:
//! - The third value is the first seven characters of the Base64 encoding of the id of the received
//!   block.
//! - The fourth value is the height of the received block.
//! - The fifth value is the `max_height_prevoted` of the received block.
//! - The sixth value is the [fork status](crate::fork_choice::ForkStatus) the block was classified as.

use crate::events::*;
use crate::types::block::BlockHeader;
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use std::time::SystemTime;

// Names of each event in PascalCase for printing:
pub const APPEND_BLOCK: &str = "AppendBlock";
pub const REMOVE_BLOCK: &str = "RemoveBlock";

pub const RECEIVE_BLOCK: &str = "ReceiveBlock";
pub const DOUBLE_FORGING: &str = "DoubleForging";
pub const TIE_BREAK: &str = "TieBreak";

pub const START_REORG: &str = "StartReorg";
pub const END_REORG: &str = "EndReorg";

pub const RESTORE_TEMP_BLOCKS: &str = "RestoreTempBlocks";
pub const CLEAR_TEMP_BLOCKS: &str = "ClearTempBlocks";
pub const HALT: &str = "Halt";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for AppendBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |append_block_event: &AppendBlockEvent| {
            log::info!(
                "{}, {}, {}, {}",
                APPEND_BLOCK,
                secs_since_unix_epoch(append_block_event.timestamp),
                first_seven_base64_chars(&append_block_event.block.id.bytes()),
                append_block_event.block.height
            )
        };
        Box::new(logger)
    }
}

impl Logger for RemoveBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |remove_block_event: &RemoveBlockEvent| {
            log::info!(
                "{}, {}, {}, {}",
                REMOVE_BLOCK,
                secs_since_unix_epoch(remove_block_event.timestamp),
                first_seven_base64_chars(&remove_block_event.block.id.bytes()),
                remove_block_event.block.height
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_block_event: &ReceiveBlockEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                RECEIVE_BLOCK,
                secs_since_unix_epoch(receive_block_event.timestamp),
                first_seven_base64_chars(&receive_block_event.block.id.bytes()),
                receive_block_event.block.height,
                receive_block_event.block.max_height_prevoted,
                receive_block_event.status
            )
        };
        Box::new(logger)
    }
}

impl Logger for DoubleForgingEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |double_forging_event: &DoubleForgingEvent| {
            log::warn!(
                "{}, {}, {}, {}, {}",
                DOUBLE_FORGING,
                secs_since_unix_epoch(double_forging_event.timestamp),
                first_seven_base64_chars(&double_forging_event.tip.generator_address.bytes()),
                header_info(&double_forging_event.tip),
                header_info(&double_forging_event.received)
            )
        };
        Box::new(logger)
    }
}

impl Logger for TieBreakEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |tie_break_event: &TieBreakEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                TIE_BREAK,
                secs_since_unix_epoch(tie_break_event.timestamp),
                header_info(&tie_break_event.kept),
                header_info(&tie_break_event.received),
                tie_break_event.replaced
            )
        };
        Box::new(logger)
    }
}

impl Logger for StartReorgEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |start_reorg_event: &StartReorgEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                START_REORG,
                secs_since_unix_epoch(start_reorg_event.timestamp),
                header_info(&start_reorg_event.tip),
                header_info(&start_reorg_event.candidate),
                start_reorg_event.certified_height
            )
        };
        Box::new(logger)
    }
}

impl Logger for EndReorgEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |end_reorg_event: &EndReorgEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}, {}",
                END_REORG,
                secs_since_unix_epoch(end_reorg_event.timestamp),
                end_reorg_event
                    .common_ancestor
                    .map_or(String::from("None"), |height| height.to_string()),
                end_reorg_event.removed,
                end_reorg_event.applied,
                end_reorg_event.committed,
                header_info(&end_reorg_event.tip)
            )
        };
        Box::new(logger)
    }
}

impl Logger for RestoreTempBlocksEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |restore_temp_blocks_event: &RestoreTempBlocksEvent| {
            log::info!(
                "{}, {}, {}, {}",
                RESTORE_TEMP_BLOCKS,
                secs_since_unix_epoch(restore_temp_blocks_event.timestamp),
                restore_temp_blocks_event.restored,
                header_info(&restore_temp_blocks_event.tip)
            )
        };
        Box::new(logger)
    }
}

impl Logger for ClearTempBlocksEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |clear_temp_blocks_event: &ClearTempBlocksEvent| {
            log::info!(
                "{}, {}, {}",
                CLEAR_TEMP_BLOCKS,
                secs_since_unix_epoch(clear_temp_blocks_event.timestamp),
                clear_temp_blocks_event.discarded
            )
        };
        Box::new(logger)
    }
}

impl Logger for HaltEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |halt_event: &HaltEvent| {
            log::error!(
                "{}, {}, {}",
                HALT,
                secs_since_unix_epoch(halt_event.timestamp),
                halt_event.reason
            )
        };
        Box::new(logger)
    }
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
pub(crate) fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

fn header_info(header: &BlockHeader) -> String {
    format!(
        "{} (height: {}, max height prevoted: {})",
        first_seven_base64_chars(&header.id.bytes()),
        header.height,
        header.max_height_prevoted
    )
}
