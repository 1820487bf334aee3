/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The thread that dispatches [events](crate::events) to their handlers.

use crate::events::*;
use crate::logging::Logger;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::mpsc::TryRecvError;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Default)]
pub(crate) struct EventHandlers {
    pub(crate) append_block_handlers: Vec<HandlerPtr<AppendBlockEvent>>,
    pub(crate) remove_block_handlers: Vec<HandlerPtr<RemoveBlockEvent>>,
    pub(crate) receive_block_handlers: Vec<HandlerPtr<ReceiveBlockEvent>>,
    pub(crate) double_forging_handlers: Vec<HandlerPtr<DoubleForgingEvent>>,
    pub(crate) tie_break_handlers: Vec<HandlerPtr<TieBreakEvent>>,
    pub(crate) start_reorg_handlers: Vec<HandlerPtr<StartReorgEvent>>,
    pub(crate) end_reorg_handlers: Vec<HandlerPtr<EndReorgEvent>>,
    pub(crate) restore_temp_blocks_handlers: Vec<HandlerPtr<RestoreTempBlocksEvent>>,
    pub(crate) clear_temp_blocks_handlers: Vec<HandlerPtr<ClearTempBlocksEvent>>,
    pub(crate) halt_handlers: Vec<HandlerPtr<HaltEvent>>,
}

impl EventHandlers {
    /// Collect the user-defined handlers, plus the default loggers of every event type if
    /// `log_events` is set.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        log_events: bool,
        append_block_handler: Option<HandlerPtr<AppendBlockEvent>>,
        remove_block_handler: Option<HandlerPtr<RemoveBlockEvent>>,
        receive_block_handler: Option<HandlerPtr<ReceiveBlockEvent>>,
        double_forging_handler: Option<HandlerPtr<DoubleForgingEvent>>,
        tie_break_handler: Option<HandlerPtr<TieBreakEvent>>,
        start_reorg_handler: Option<HandlerPtr<StartReorgEvent>>,
        end_reorg_handler: Option<HandlerPtr<EndReorgEvent>>,
        restore_temp_blocks_handler: Option<HandlerPtr<RestoreTempBlocksEvent>>,
        clear_temp_blocks_handler: Option<HandlerPtr<ClearTempBlocksEvent>>,
        halt_handler: Option<HandlerPtr<HaltEvent>>,
    ) -> EventHandlers {
        EventHandlers {
            append_block_handlers: with_logger(log_events, append_block_handler),
            remove_block_handlers: with_logger(log_events, remove_block_handler),
            receive_block_handlers: with_logger(log_events, receive_block_handler),
            double_forging_handlers: with_logger(log_events, double_forging_handler),
            tie_break_handlers: with_logger(log_events, tie_break_handler),
            start_reorg_handlers: with_logger(log_events, start_reorg_handler),
            end_reorg_handlers: with_logger(log_events, end_reorg_handler),
            restore_temp_blocks_handlers: with_logger(log_events, restore_temp_blocks_handler),
            clear_temp_blocks_handlers: with_logger(log_events, clear_temp_blocks_handler),
            halt_handlers: with_logger(log_events, halt_handler),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.append_block_handlers.is_empty()
            && self.remove_block_handlers.is_empty()
            && self.receive_block_handlers.is_empty()
            && self.double_forging_handlers.is_empty()
            && self.tie_break_handlers.is_empty()
            && self.start_reorg_handlers.is_empty()
            && self.end_reorg_handlers.is_empty()
            && self.restore_temp_blocks_handlers.is_empty()
            && self.clear_temp_blocks_handlers.is_empty()
            && self.halt_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::AppendBlock(append_block_event) => self
                .append_block_handlers
                .iter()
                .for_each(|handler| handler(&append_block_event)),

            Event::RemoveBlock(remove_block_event) => self
                .remove_block_handlers
                .iter()
                .for_each(|handler| handler(&remove_block_event)),

            Event::ReceiveBlock(receive_block_event) => self
                .receive_block_handlers
                .iter()
                .for_each(|handler| handler(&receive_block_event)),

            Event::DoubleForging(double_forging_event) => self
                .double_forging_handlers
                .iter()
                .for_each(|handler| handler(&double_forging_event)),

            Event::TieBreak(tie_break_event) => self
                .tie_break_handlers
                .iter()
                .for_each(|handler| handler(&tie_break_event)),

            Event::StartReorg(start_reorg_event) => self
                .start_reorg_handlers
                .iter()
                .for_each(|handler| handler(&start_reorg_event)),

            Event::EndReorg(end_reorg_event) => self
                .end_reorg_handlers
                .iter()
                .for_each(|handler| handler(&end_reorg_event)),

            Event::RestoreTempBlocks(restore_temp_blocks_event) => self
                .restore_temp_blocks_handlers
                .iter()
                .for_each(|handler| handler(&restore_temp_blocks_event)),

            Event::ClearTempBlocks(clear_temp_blocks_event) => self
                .clear_temp_blocks_handlers
                .iter()
                .for_each(|handler| handler(&clear_temp_blocks_event)),

            Event::Halt(halt_event) => self
                .halt_handlers
                .iter()
                .for_each(|handler| handler(&halt_event)),
        }
    }
}

fn with_logger<T: Logger>(log_events: bool, handler: Option<HandlerPtr<T>>) -> Vec<HandlerPtr<T>> {
    let mut handlers = Vec::new();
    if log_events {
        handlers.push(T::get_logger());
    }
    if let Some(handler) = handler {
        handlers.push(handler);
    }
    handlers
}

/// Spawn the event bus thread, which passes every event received from `event_subscriber` to
/// `event_handlers` until it receives a shutdown signal. Events that are already in the channel when
/// the signal arrives are still handled.
pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                while let Ok(event) = event_subscriber.try_recv() {
                    event_handlers.fire_handlers(event)
                }
                return;
            }
            Err(TryRecvError::Empty) => (),
        }

        match event_subscriber.recv_timeout(EVENT_POLL_INTERVAL) {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(RecvTimeoutError::Timeout) => (),
            // Every publisher is gone, so no more events will arrive.
            Err(RecvTimeoutError::Disconnected) => return,
        }
    })
}
