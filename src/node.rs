/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build and run a node that accepts candidate blocks in the background.
//!
//! The key components of this module are:
//! - The builder-pattern interface to construct a [specification of the node](NodeSpec) with:
//!   1. `NodeSpec::builder` to construct a `NodeSpecBuilder`,
//!   2. The setters of the `NodeSpecBuilder`, and
//!   3. The `NodeSpecBuilder::build` method to construct a [`NodeSpec`],
//! - The function to [start](NodeSpec::start) a [`Node`] given its specification,
//! - [The type](Node) which keeps the node alive.
//!
//! ## Starting a node
//!
//! Here is an example that demonstrates how to build and start running a node using the builder
//! pattern:
//!
//! ```ignore
//! let node =
//!     NodeSpec::builder()
//!     .executor(chain_store)
//!     .temp_blocks(temp_block_store)
//!     .fetcher(network_block_fetcher)
//!     .finality(certified_height)
//!     .slots(slot_clock)
//!     .configuration(configuration)
//!     .on_double_forging(double_forging_handler)
//!     .build()
//!     .start()?;
//! ```
//!
//! ### Required setters
//!
//! The required setters are for providing the trait implementations required to run a node:
//! - `.executor(...)`
//! - `.temp_blocks(...)`
//! - `.fetcher(...)`
//! - `.finality(...)`
//! - `.slots(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! The optional setters are for registering user-defined event handlers for events from
//! [crate::events]:
//! - `.on_append_block(...)`
//! - `.on_remove_block(...)`
//! - `.on_receive_block(...)`
//! - `.on_double_forging(...)`
//! - `.on_tie_break(...)`
//! - `.on_start_reorg(...)`
//! - `.on_end_reorg(...)`
//! - `.on_restore_temp_blocks(...)`
//! - `.on_clear_temp_blocks(...)`
//! - `.on_halt(...)`
//!
//! The node's [configuration](Configuration) can also be defined using the builder pattern, for
//! example:
//!
//! ```ignore
//! let configuration =
//!     Configuration::builder()
//!     .fetch_batch_size(64)
//!     .queue_capacity(1024)
//!     .log_events(true)
//!     .build()
//! ```

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TryRecvError, TrySendError};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::event_bus::*;
use crate::events::*;
use crate::slots::Slots;
use crate::synchronizer::{
    BlockExecutor, BlockFetcher, BlockOutcome, CancellationToken, ExecuteError, FinalityOracle,
    RecoveryOutcome, Synchronizer, SynchronizerConfiguration,
};
use crate::temp_blocks::TempBlockStore;
use crate::types::block::{Block, BlockHeader};

const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Stores the user-defined parameters required to start the node, that is:
/// 1. The fetch batch size, which determines how many blocks the node requests from its fetcher at
///    once while following a competing branch.
/// 2. The queue capacity, which is the maximum number of candidate blocks waiting to be processed.
///    [`Node::submit`] fails while the queue is full.
/// 3. The "Tie Break Replaces Tip" flag. If set to "true", a block that wins a tie break against the
///    tip replaces it. Otherwise the tip is kept and the tie break is only reported.
/// 4. The "Log Events" flag, if set to "true" then logs should be printed.
///
/// ## Log Events
///
/// This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
/// printed onto a terminal or to a file, set up a [logging
/// implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
#[derive(TypedBuilder, Clone, Copy, Debug)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.fetch_batch_size(...)`
    - `.queue_capacity(...)`
    - `.log_events(...)`

    Optional:
    - `.tie_break_replaces_tip(...)`
"))]
pub struct Configuration {
    #[builder(setter(doc = "Set the maximum number of blocks requested from the fetcher at once. Required."))]
    pub fetch_batch_size: u32,
    #[builder(setter(doc = "Set the maximum number of candidate blocks waiting to be processed. Required."))]
    pub queue_capacity: usize,
    #[builder(
        default = false,
        setter(doc = "Set whether a tie break winner replaces the tip. Optional, defaults to false.")
    )]
    pub tie_break_replaces_tip: bool,
    #[builder(setter(doc = "Enable logging? Required."))]
    pub log_events: bool,
}

impl From<Configuration> for SynchronizerConfiguration {
    fn from(config: Configuration) -> Self {
        SynchronizerConfiguration {
            fetch_batch_size: config.fetch_batch_size,
            tie_break_replaces_tip: config.tie_break_replaces_tip,
        }
    }
}

/// Stores all necessary parameters and trait implementations required to run the [`Node`].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [NodeSpec]. On the builder call the following methods to construct a valid [NodeSpec].

    Required:
    - `.executor(...)`
    - `.temp_blocks(...)`
    - `.fetcher(...)`
    - `.finality(...)`
    - `.slots(...)`
    - `.configuration(...)`

    Optional:
    - `.on_append_block(...)`
    - `.on_remove_block(...)`
    - `.on_receive_block(...)`
    - `.on_double_forging(...)`
    - `.on_tie_break(...)`
    - `.on_start_reorg(...)`
    - `.on_end_reorg(...)`
    - `.on_restore_temp_blocks(...)`
    - `.on_clear_temp_blocks(...)`
    - `.on_halt(...)`
"))]
pub struct NodeSpec<
    E: BlockExecutor + Send + 'static,
    T: TempBlockStore + Send + 'static,
    F: BlockFetcher + Send + 'static,
    O: FinalityOracle + Send + 'static,
    S: Slots + Send + 'static,
> {
    // Required parameters
    #[builder(setter(doc = "Set the block executor that applies and reverts blocks on the local chain. The argument must implement the [BlockExecutor](crate::synchronizer::BlockExecutor) trait. Required."))]
    executor: E,
    #[builder(setter(doc = "Set the store for blocks removed during a reorganization. The argument must implement the [TempBlockStore](crate::temp_blocks::TempBlockStore) trait. Required."))]
    temp_blocks: T,
    #[builder(setter(doc = "Set the source of blocks on competing branches. The argument must implement the [BlockFetcher](crate::synchronizer::BlockFetcher) trait. Required."))]
    fetcher: F,
    #[builder(setter(doc = "Set the source of the certified height. The argument must implement the [FinalityOracle](crate::synchronizer::FinalityOracle) trait. Required."))]
    finality: O,
    #[builder(setter(doc = "Set the mapping of timestamps onto slots. The argument must implement the [Slots](crate::slots::Slots) trait. Required."))]
    slots: S,
    #[builder(setter(doc = "Set the [configuration](Configuration), which contains the necessary parameters to run a node. Required."))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(transform = |handler: impl Fn(&AppendBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<AppendBlockEvent>),
    doc = "Register a handler closure to be invoked after a block is applied on top of the tip. Optional."))]
    on_append_block: Option<HandlerPtr<AppendBlockEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RemoveBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RemoveBlockEvent>),
    doc = "Register a handler closure to be invoked after the tip is reverted. Optional."))]
    on_remove_block: Option<HandlerPtr<RemoveBlockEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveBlockEvent>),
    doc = "Register a handler closure to be invoked after a candidate block is classified. Optional."))]
    on_receive_block: Option<HandlerPtr<ReceiveBlockEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&DoubleForgingEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<DoubleForgingEvent>),
    doc = "Register a handler closure to be invoked with the evidence of a double forging. Optional."))]
    on_double_forging: Option<HandlerPtr<DoubleForgingEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&TieBreakEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<TieBreakEvent>),
    doc = "Register a handler closure to be invoked after a tie break is decided. Optional."))]
    on_tie_break: Option<HandlerPtr<TieBreakEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&StartReorgEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<StartReorgEvent>),
    doc = "Register a handler closure to be invoked when a reorganization starts. Optional."))]
    on_start_reorg: Option<HandlerPtr<StartReorgEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&EndReorgEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<EndReorgEvent>),
    doc = "Register a handler closure to be invoked when a reorganization is committed or rolled back. Optional."))]
    on_end_reorg: Option<HandlerPtr<EndReorgEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RestoreTempBlocksEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RestoreTempBlocksEvent>),
    doc = "Register a handler closure to be invoked after startup recovery restores temporary blocks. Optional."))]
    on_restore_temp_blocks: Option<HandlerPtr<RestoreTempBlocksEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ClearTempBlocksEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ClearTempBlocksEvent>),
    doc = "Register a handler closure to be invoked after startup recovery discards temporary blocks. Optional."))]
    on_clear_temp_blocks: Option<HandlerPtr<ClearTempBlocksEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&HaltEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<HaltEvent>),
    doc = "Register a handler closure to be invoked when the node halts after a fatal error. Optional."))]
    on_halt: Option<HandlerPtr<HaltEvent>>,
}

impl<E, T, F, O, S> NodeSpec<E, T, F, O, S>
where
    E: BlockExecutor + Send + 'static,
    T: TempBlockStore + Send + 'static,
    F: BlockFetcher + Send + 'static,
    O: FinalityOracle + Send + 'static,
    S: Slots + Send + 'static,
{
    /// Runs startup recovery, then starts the worker and event bus threads and returns the handles to
    /// them in a [`Node`].
    ///
    /// # Errors
    ///
    /// Returns an error if the executor cannot report its tip, e.g., because the chain was never
    /// [initialized](crate::chain::ChainStore::initialize).
    pub fn start(self) -> Result<Node, ExecuteError> {
        let log_events = self.configuration.log_events;
        let queue_capacity = self.configuration.queue_capacity;

        let event_handlers = EventHandlers::new(
            log_events,
            self.on_append_block,
            self.on_remove_block,
            self.on_receive_block,
            self.on_double_forging,
            self.on_tie_break,
            self.on_start_reorg,
            self.on_end_reorg,
            self.on_restore_temp_blocks,
            self.on_clear_temp_blocks,
            self.on_halt,
        );

        let (event_publisher, event_subscriber) = if !event_handlers.is_empty() {
            Some(mpsc::channel()).unzip()
        } else {
            (None, None)
        };

        let mut synchronizer = Synchronizer::new(
            self.configuration.into(),
            self.executor,
            self.temp_blocks,
            self.fetcher,
            self.finality,
            self.slots,
            event_publisher,
        )?;
        let recovery = synchronizer.recover();

        let (event_bus, event_bus_shutdown) = match event_subscriber {
            Some(event_subscriber) => {
                let (event_bus_shutdown, event_bus_shutdown_receiver) = mpsc::channel();
                (
                    Some(start_event_bus(
                        event_handlers,
                        event_subscriber,
                        event_bus_shutdown_receiver,
                    )),
                    Some(event_bus_shutdown),
                )
            }
            None => (None, None),
        };

        let tip = Arc::new(RwLock::new(synchronizer.tip().clone()));
        let halted = Arc::new(RwLock::new(synchronizer.is_halted()));
        let cancellation = synchronizer.cancellation_token();
        let (queue, queue_receiver) = mpsc::sync_channel(queue_capacity);
        let (worker_shutdown, worker_shutdown_receiver) = mpsc::channel();
        let worker = start_worker(
            synchronizer,
            queue_receiver,
            worker_shutdown_receiver,
            tip.clone(),
            halted.clone(),
        );

        Ok(Node {
            recovery,
            queue,
            tip,
            halted,
            cancellation,
            worker: Some(worker),
            worker_shutdown,
            event_bus,
            event_bus_shutdown,
        })
    }
}

type QueueEntry = (Block, Option<Sender<BlockOutcome>>);

// Process queued blocks one at a time until a shutdown signal arrives.
fn start_worker<E, T, F, O, S>(
    mut synchronizer: Synchronizer<E, T, F, O, S>,
    queue: Receiver<QueueEntry>,
    shutdown_signal: Receiver<()>,
    tip: Arc<RwLock<BlockHeader>>,
    halted: Arc<RwLock<bool>>,
) -> JoinHandle<()>
where
    E: BlockExecutor + Send + 'static,
    T: TempBlockStore + Send + 'static,
    F: BlockFetcher + Send + 'static,
    O: FinalityOracle + Send + 'static,
    S: Slots + Send + 'static,
{
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => return,
            Err(TryRecvError::Empty) => (),
        }

        match queue.recv_timeout(QUEUE_POLL_INTERVAL) {
            Ok((block, outcome_sender)) => {
                let outcome = synchronizer.process_block(block);
                if let Ok(mut tip) = tip.write() {
                    *tip = synchronizer.tip().clone();
                }
                if let Ok(mut halted) = halted.write() {
                    *halted = synchronizer.is_halted();
                }
                if let Some(outcome_sender) = outcome_sender {
                    // The caller may have stopped waiting.
                    let _ = outcome_sender.send(outcome);
                }
            }
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => return,
        }
    })
}

/// A handle to the background threads of a node. When this value is dropped, all background threads
/// are gracefully shut down.
pub struct Node {
    recovery: RecoveryOutcome,
    queue: SyncSender<QueueEntry>,
    tip: Arc<RwLock<BlockHeader>>,
    halted: Arc<RwLock<bool>>,
    cancellation: CancellationToken,
    worker: Option<JoinHandle<()>>,
    worker_shutdown: Sender<()>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl Node {
    /// Queue `block` for processing without waiting for the outcome.
    ///
    /// # Errors
    ///
    /// Returns the block back if the queue is full or the worker has stopped.
    pub fn submit(&self, block: Block) -> Result<(), Block> {
        self.queue
            .try_send((block, None))
            .map_err(|err| match err {
                TrySendError::Full((block, _)) | TrySendError::Disconnected((block, _)) => block,
            })
    }

    /// Queue `block` for processing and wait for the outcome. Blocks while the queue is full.
    ///
    /// Returns `None` if the worker stopped before processing the block.
    pub fn process(&self, block: Block) -> Option<BlockOutcome> {
        let (outcome_sender, outcome_receiver) = mpsc::channel();
        self.queue.send((block, Some(outcome_sender))).ok()?;
        outcome_receiver.recv().ok()
    }

    /// Get the tip as of the last processed block.
    pub fn tip(&self) -> BlockHeader {
        match self.tip.read() {
            Ok(tip) => tip.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_halted(&self) -> bool {
        match self.halted.read() {
            Ok(halted) => *halted,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Ask a running reorganization to stop replaying and roll back.
    pub fn cancel_replay(&self) {
        self.cancellation.cancel()
    }

    /// Get the outcome of the startup recovery run by [`NodeSpec::start`].
    pub fn recovery(&self) -> &RecoveryOutcome {
        &self.recovery
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        // The worker publishes events, so it must stop before the event bus does.
        self.cancellation.cancel();

        let _ = self.worker_shutdown.send(());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }

        self.event_bus_shutdown
            .iter()
            .for_each(|shutdown| {
                let _ = shutdown.send(());
            });
        if let Some(event_bus) = self.event_bus.take() {
            let _ = event_bus.join();
        }
    }
}
