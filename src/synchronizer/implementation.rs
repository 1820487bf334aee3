/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`Synchronizer`] type and its methods.

use std::cmp::{max, min};
use std::iter;
use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::events::*;
use crate::fork_choice::{fork_choice, ForkStatus};
use crate::slots::Slots;
use crate::temp_blocks::TempBlockStore;
use crate::types::{
    block::{Block, BlockHeader},
    data_types::{BlockHeight, BlockID, Timestamp},
};

use super::pluggables::{BlockExecutor, BlockFetcher, ExecuteError, FinalityOracle};
use super::types::*;

/// Keeps the local chain on the preferred branch as candidate blocks arrive.
///
/// A `Synchronizer` owns the current tip. Every method that can change the local chain takes
/// `&mut self`, so tip changes are serialized by construction.
///
/// ## Lifecycle
///
/// 1. Create a `Synchronizer` with [`new`](Self::new), which reads the tip from the executor.
/// 2. Call [`recover`](Self::recover) once, to settle any reorganization interrupted by a crash.
/// 3. Pass every candidate block to [`process_block`](Self::process_block).
///
/// After a [`FatalError`] the `Synchronizer` halts: `process_block` returns [`BlockOutcome::Halted`]
/// without looking at the block.
pub struct Synchronizer<E, T, F, O, S>
where
    E: BlockExecutor,
    T: TempBlockStore,
    F: BlockFetcher,
    O: FinalityOracle,
    S: Slots,
{
    config: SynchronizerConfiguration,
    tip: BlockHeader,
    executor: E,
    temp_blocks: T,
    fetcher: F,
    finality: O,
    slots: S,
    cancellation: CancellationToken,
    event_publisher: Option<Sender<Event>>,
    halted: bool,
}

// The part of a competing branch that is not on the local chain.
struct Branch {
    common_ancestor: BlockHeight,
    // Ascending, excluding the received block.
    blocks: Vec<Block>,
}

enum ReorgFailure {
    Recoverable(ReorgError),
    Fatal(FatalError),
}

impl<E, T, F, O, S> Synchronizer<E, T, F, O, S>
where
    E: BlockExecutor,
    T: TempBlockStore,
    F: BlockFetcher,
    O: FinalityOracle,
    S: Slots,
{
    pub fn new(
        config: SynchronizerConfiguration,
        executor: E,
        temp_blocks: T,
        fetcher: F,
        finality: O,
        slots: S,
        event_publisher: Option<Sender<Event>>,
    ) -> Result<Self, ExecuteError> {
        let tip = executor.tip()?;
        Ok(Self {
            config,
            tip,
            executor,
            temp_blocks,
            fetcher,
            finality,
            slots,
            cancellation: CancellationToken::new(),
            event_publisher,
            halted: false,
        })
    }

    pub fn tip(&self) -> &BlockHeader {
        &self.tip
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Get a handle that can cancel the replay phase of a running reorganization from another
    /// thread.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn temp_blocks(&self) -> &T {
        &self.temp_blocks
    }

    /// Classify `block` against the tip and act on the result.
    ///
    /// If `block` has no `received_at`, it is stamped with the current time before it is classified,
    /// and the stamped block is what gets stored.
    pub fn process_block(&mut self, block: Block) -> BlockOutcome {
        if self.halted {
            return BlockOutcome::Halted;
        }

        let now = Timestamp::now();
        let block = match block.header.received_at {
            Some(_) => block,
            None => block.with_received_at(now),
        };

        if !block.is_correct() {
            log::warn!(
                "rejected malformed block {} at height {}",
                block.id(),
                block.height()
            );
            return BlockOutcome::Rejected {
                block: block.header,
                reason: RejectReason::Malformed,
            };
        }

        let status = fork_choice(&self.tip, &block.header, &self.slots, now);
        Event::publish(
            &self.event_publisher,
            Event::ReceiveBlock(ReceiveBlockEvent {
                timestamp: SystemTime::now(),
                block: block.header.clone(),
                status,
            }),
        );

        match status {
            ForkStatus::ValidBlock => self.append(block),
            ForkStatus::DifferentChain => self.reorganize(block),
            ForkStatus::DoubleForging => {
                log::warn!(
                    "producer {:?} forged blocks {} and {} at height {}",
                    block.header.generator_address,
                    self.tip.id,
                    block.id(),
                    block.height()
                );
                Event::publish(
                    &self.event_publisher,
                    Event::DoubleForging(DoubleForgingEvent {
                        timestamp: SystemTime::now(),
                        tip: self.tip.clone(),
                        received: block.header,
                    }),
                );
                BlockOutcome::Dropped { status }
            }
            ForkStatus::TieBreak => self.tie_break(block),
            ForkStatus::IdenticalBlock | ForkStatus::Discard => BlockOutcome::Dropped { status },
        }
    }

    /// Settle the blocks left in the temporary block store by an interrupted reorganization.
    ///
    /// The highest stored block is classified against the tip using its recorded `received_at`. If
    /// it would be accepted ([`ValidBlock`](ForkStatus::ValidBlock) or
    /// [`DifferentChain`](ForkStatus::DifferentChain)), the stored branch is put back on the local
    /// chain. Otherwise the stored blocks are discarded.
    pub fn recover(&mut self) -> RecoveryOutcome {
        let stored = match self.temp_blocks.list_descending_height() {
            Ok(stored) => stored,
            Err(err) => {
                return RecoveryOutcome::Fatal(self.halt(FatalError::RestoreFailed {
                    error: err.into(),
                }))
            }
        };
        let highest = match stored.first() {
            Some(highest) => highest,
            None => return RecoveryOutcome::NothingToRecover,
        };

        let status = fork_choice(&self.tip, &highest.header, &self.slots, Timestamp::now());
        match status {
            ForkStatus::ValidBlock | ForkStatus::DifferentChain => {
                let mut ascending = stored;
                ascending.reverse();
                self.restore_stored_branch(ascending)
            }
            _ => self.discard_stored_blocks(stored.len() as u64),
        }
    }
}

/// Appending and tie breaking.
impl<E, T, F, O, S> Synchronizer<E, T, F, O, S>
where
    E: BlockExecutor,
    T: TempBlockStore,
    F: BlockFetcher,
    O: FinalityOracle,
    S: Slots,
{
    fn append(&mut self, block: Block) -> BlockOutcome {
        match self.executor.tip() {
            Ok(tip) if tip == self.tip => (),
            Ok(_) => {
                return BlockOutcome::Rejected {
                    block: block.header,
                    reason: RejectReason::TipMoved,
                }
            }
            Err(err) => {
                return BlockOutcome::Rejected {
                    block: block.header,
                    reason: RejectReason::Execute(err),
                }
            }
        }

        match self.executor.execute(&block) {
            Ok(()) => {
                self.on_append(&block.header);
                BlockOutcome::Appended {
                    tip: self.tip.clone(),
                }
            }
            Err(err) => {
                log::warn!(
                    "failed to execute block {} at height {}: {}",
                    block.id(),
                    block.height(),
                    err
                );
                BlockOutcome::Rejected {
                    block: block.header,
                    reason: RejectReason::Execute(err),
                }
            }
        }
    }

    // A tie break winner is a sibling of the tip, so replacing the tip is a reorganization of depth 1
    // whose branch is just the winner.
    fn tie_break(&mut self, block: Block) -> BlockOutcome {
        let kept = self.tip.clone();
        let parent_height = match kept.height.parent() {
            Some(parent_height) => parent_height,
            None => return self.on_tie_break(kept, block.header, false),
        };
        let certified_height = self.finality.certified_height();
        if !self.config.tie_break_replaces_tip || parent_height < certified_height {
            return self.on_tie_break(kept, block.header, false);
        }

        self.cancellation.reset();
        self.on_start_reorg(&block.header, certified_height);
        let received = block.header.clone();
        let branch = Branch {
            common_ancestor: parent_height,
            blocks: Vec::new(),
        };
        let outcome = self.switch_branch(branch, block);
        let replaced = matches!(outcome, BlockOutcome::Committed { .. });
        Event::publish(
            &self.event_publisher,
            Event::TieBreak(TieBreakEvent {
                timestamp: SystemTime::now(),
                kept,
                received,
                replaced,
            }),
        );
        outcome
    }

    fn on_tie_break(&self, kept: BlockHeader, received: BlockHeader, replaced: bool) -> BlockOutcome {
        Event::publish(
            &self.event_publisher,
            Event::TieBreak(TieBreakEvent {
                timestamp: SystemTime::now(),
                kept,
                received,
                replaced,
            }),
        );
        BlockOutcome::Dropped {
            status: ForkStatus::TieBreak,
        }
    }
}

/// Reorganization.
///
/// A reorganization proceeds in three phases:
/// 1. [Finding the branch](Self::find_branch): fetch the received block's ancestry until it meets the
///    local chain. Nothing is mutated in this phase.
/// 2. Removing: save each block above the common ancestor to the temporary block store, then revert
///    it.
/// 3. Replaying: apply the fetched blocks and then the received block.
///
/// If removing or replaying fails, the new branch is reverted and the saved blocks are restored.
impl<E, T, F, O, S> Synchronizer<E, T, F, O, S>
where
    E: BlockExecutor,
    T: TempBlockStore,
    F: BlockFetcher,
    O: FinalityOracle,
    S: Slots,
{
    fn reorganize(&mut self, candidate: Block) -> BlockOutcome {
        let certified_height = self.finality.certified_height();
        self.cancellation.reset();
        self.on_start_reorg(&candidate.header, certified_height);

        match self.find_branch(&candidate, certified_height) {
            Ok(branch) => self.switch_branch(branch, candidate),
            Err(ReorgFailure::Recoverable(error)) => {
                log::warn!(
                    "reorganization onto block {} at height {} failed before mutating the chain: {}",
                    candidate.id(),
                    candidate.height(),
                    error
                );
                self.on_end_reorg(None, 0, 0, false);
                BlockOutcome::RolledBack {
                    error,
                    tip: self.tip.clone(),
                }
            }
            Err(ReorgFailure::Fatal(error)) => BlockOutcome::Fatal(self.halt(error)),
        }
    }

    /// Fetch the ancestry of `candidate`, newest batch first, until a fetched block matches the local
    /// block at the same height.
    ///
    /// Fetching never goes below `min(certified_height, tip height, candidate's parent height)`. A
    /// common ancestor below the certified height is a [`FatalError::FinalityViolation`] unless it is
    /// the tip itself.
    fn find_branch(
        &mut self,
        candidate: &Block,
        certified_height: BlockHeight,
    ) -> Result<Branch, ReorgFailure> {
        let parent_height =
            candidate
                .height()
                .parent()
                .ok_or(ReorgFailure::Fatal(FatalError::FinalityViolation {
                    certified_height,
                    attempted_height: BlockHeight::new(0),
                }))?;
        let low = min(min(certified_height, parent_height), self.tip.height);
        let highest_shared = min(self.tip.height, parent_height);
        let batch_size = max(self.config.fetch_batch_size, 1) as u64;
        let now = Timestamp::now();

        // Descending.
        let mut fetched: Vec<Block> = Vec::new();
        let mut common_ancestor = None;
        let mut expected_id = candidate.header.previous_block_id;
        let mut to = parent_height;

        'fetching: loop {
            let from = BlockHeight::new(max(
                low.int(),
                to.int().saturating_sub(batch_size - 1),
            ));
            if self.cancellation.is_cancelled() {
                return Err(ReorgFailure::Recoverable(ReorgError::Cancelled));
            }
            let batch = self
                .fetcher
                .fetch_range(from, to, &candidate.id())
                .map_err(|err| ReorgFailure::Recoverable(ReorgError::Fetch(err)))?;
            if !is_branch_segment(&batch, from, to, &expected_id) {
                return Err(ReorgFailure::Recoverable(ReorgError::BrokenBranch));
            }

            for block in batch.into_iter().rev() {
                if block.height() <= highest_shared {
                    let local = self.executor.header_at_height(block.height()).map_err(|error| {
                        ReorgFailure::Recoverable(ReorgError::Execute {
                            height: block.height(),
                            error,
                        })
                    })?;
                    if local.map(|local| local.id) == Some(block.id()) {
                        common_ancestor = Some(block.height());
                        break 'fetching;
                    }
                }

                expected_id = block.header.previous_block_id;
                fetched.push(match block.header.received_at {
                    Some(_) => block,
                    None => block.with_received_at(now),
                });
            }

            match from.parent() {
                Some(below) if from > low => to = below,
                _ => break,
            }
        }

        let common_ancestor = common_ancestor.ok_or(ReorgFailure::Fatal(
            FatalError::FinalityViolation {
                certified_height,
                attempted_height: low.parent().unwrap_or(low),
            },
        ))?;
        if common_ancestor < certified_height && self.tip.height > common_ancestor {
            return Err(ReorgFailure::Fatal(FatalError::FinalityViolation {
                certified_height,
                attempted_height: common_ancestor,
            }));
        }

        fetched.reverse();
        Ok(Branch {
            common_ancestor,
            blocks: fetched,
        })
    }

    fn switch_branch(&mut self, branch: Branch, candidate: Block) -> BlockOutcome {
        let common_ancestor = branch.common_ancestor;
        if self.cancellation.is_cancelled() {
            return self.roll_back(common_ancestor, Vec::new(), 0, ReorgError::Cancelled);
        }

        // Removing.
        let mut removed = Vec::new();
        let mut saved = Vec::new();
        while self.tip.height > common_ancestor {
            match self.remove_tip(&mut saved) {
                Ok(header) => removed.push(header),
                Err(error) => return self.roll_back(common_ancestor, saved, 0, error),
            }
        }

        // Replaying.
        let mut applied = Vec::new();
        for block in branch.blocks.iter().chain(iter::once(&candidate)) {
            if self.cancellation.is_cancelled() {
                return self.roll_back(
                    common_ancestor,
                    saved,
                    applied.len(),
                    ReorgError::Cancelled,
                );
            }
            if let Err(error) = self.executor.execute(block) {
                let error = ReorgError::Execute {
                    height: block.height(),
                    error,
                };
                return self.roll_back(common_ancestor, saved, applied.len(), error);
            }
            self.on_append(&block.header);
            applied.push(block.header.clone());
        }

        // Committing.
        if let Err(err) = self.temp_blocks.clear() {
            // Rollbacks only restore the entries their own reorganization saved, and recovery discards
            // blocks that lost to the tip.
            log::warn!("failed to clear the temporary block store: {}", err);
        }
        self.on_end_reorg(
            Some(common_ancestor),
            removed.len() as u64,
            applied.len() as u64,
            true,
        );

        BlockOutcome::Committed {
            common_ancestor,
            removed,
            applied,
            tip: self.tip.clone(),
        }
    }

    // Save the tip in the temporary block store, then revert it. Blocks appended to the temporary block
    // store are also pushed onto `saved`.
    fn remove_tip(&mut self, saved: &mut Vec<Block>) -> Result<BlockHeader, ReorgError> {
        let height = self.tip.height;
        let tip_block = self
            .executor
            .tip_block()
            .map_err(|error| ReorgError::Execute { height, error })?;
        if tip_block.header != self.tip {
            return Err(ReorgError::TipMoved);
        }

        self.temp_blocks
            .append(&tip_block)
            .map_err(ReorgError::Storage)?;
        let header = tip_block.header.clone();
        saved.push(tip_block);
        let removed = self
            .executor
            .undo_tip()
            .map_err(|error| ReorgError::Execute { height, error })?;

        self.on_remove(&header, removed.new_tip);
        Ok(header)
    }

    /// Revert the `applied` blocks of the new branch, then put back the blocks this reorganization
    /// `saved` in the temporary block store (in descending height), lowest first. Each saved block is
    /// popped only after it is back on the local chain.
    ///
    /// Older entries, left over from a reorganization whose commit failed to clear the store, sit
    /// below the saved ones and are not touched.
    fn roll_back(
        &mut self,
        common_ancestor: BlockHeight,
        saved: Vec<Block>,
        applied: usize,
        error: ReorgError,
    ) -> BlockOutcome {
        log::warn!(
            "rolling back reorganization of heights {} to {}: {}",
            common_ancestor + 1,
            self.tip.height,
            error
        );

        for _ in 0..applied {
            let reverted = self.tip.clone();
            match self.executor.undo_tip() {
                Ok(removed) => self.on_remove(&reverted, removed.new_tip),
                Err(error) => {
                    return BlockOutcome::Fatal(self.halt(FatalError::RestoreFailed { error }))
                }
            }
        }

        for block in saved.iter().rev() {
            if let Err(error) = self.put_back(block) {
                return BlockOutcome::Fatal(self.halt(FatalError::RestoreFailed { error }));
            }
            if let Err(err) = self.temp_blocks.pop_latest() {
                return BlockOutcome::Fatal(self.halt(FatalError::RestoreFailed {
                    error: err.into(),
                }));
            }
        }

        self.on_end_reorg(Some(common_ancestor), 0, 0, false);
        BlockOutcome::RolledBack {
            error,
            tip: self.tip.clone(),
        }
    }

    // Apply a stored block, unless removing stopped before reverting it.
    fn put_back(&mut self, block: &Block) -> Result<(), ExecuteError> {
        if block.height() <= self.tip.height {
            return match self.executor.header_at_height(block.height())? {
                Some(local) if local.id == block.id() => Ok(()),
                _ => Err(ExecuteError::DoesNotExtendTip {
                    block: block.header.clone(),
                    tip: self.tip.clone(),
                }),
            };
        }

        self.executor.apply_validated(block)?;
        self.on_append(&block.header);
        Ok(())
    }
}

/// Startup recovery.
impl<E, T, F, O, S> Synchronizer<E, T, F, O, S>
where
    E: BlockExecutor,
    T: TempBlockStore,
    F: BlockFetcher,
    O: FinalityOracle,
    S: Slots,
{
    fn restore_stored_branch(&mut self, ascending: Vec<Block>) -> RecoveryOutcome {
        let chains = ascending
            .windows(2)
            .all(|pair| pair[1].header.extends(&pair[0].header));
        let base_height = match ascending.first().and_then(|lowest| lowest.height().parent()) {
            Some(base_height) if chains => base_height,
            _ => return self.discard_stored_blocks(ascending.len() as u64),
        };

        // The stored branch must grow out of the local chain.
        match self.executor.header_at_height(base_height) {
            Ok(Some(base)) if base.id == ascending[0].header.previous_block_id => (),
            Ok(_) => return self.discard_stored_blocks(ascending.len() as u64),
            Err(error) => {
                return RecoveryOutcome::Fatal(self.halt(FatalError::RestoreFailed { error }))
            }
        }

        // Some stored blocks may still be on the local chain.
        let mut on_chain = 0;
        for block in ascending.iter() {
            match self.executor.header_at_height(block.height()) {
                Ok(Some(local)) if local.id == block.id() => on_chain += 1,
                Ok(_) => break,
                Err(error) => {
                    return RecoveryOutcome::Fatal(self.halt(FatalError::RestoreFailed { error }))
                }
            }
        }
        let keep_height = match on_chain {
            0 => base_height,
            n => ascending[n - 1].height(),
        };

        let certified_height = self.finality.certified_height();
        if self.tip.height > keep_height && keep_height < certified_height {
            return RecoveryOutcome::Fatal(self.halt(FatalError::FinalityViolation {
                certified_height,
                attempted_height: keep_height,
            }));
        }

        while self.tip.height > keep_height {
            let reverted = self.tip.clone();
            match self.executor.undo_tip() {
                Ok(removed) => self.on_remove(&reverted, removed.new_tip),
                Err(error) => {
                    return RecoveryOutcome::Fatal(self.halt(FatalError::RestoreFailed { error }))
                }
            }
        }

        let mut restored = 0;
        for block in ascending[on_chain..].iter() {
            if let Err(error) = self.executor.apply_validated(block) {
                return RecoveryOutcome::Fatal(self.halt(FatalError::RestoreFailed { error }));
            }
            self.on_append(&block.header);
            restored += 1;
        }

        if let Err(err) = self.temp_blocks.clear() {
            return RecoveryOutcome::Fatal(self.halt(FatalError::RestoreFailed {
                error: err.into(),
            }));
        }

        Event::publish(
            &self.event_publisher,
            Event::RestoreTempBlocks(RestoreTempBlocksEvent {
                timestamp: SystemTime::now(),
                restored,
                tip: self.tip.clone(),
            }),
        );
        RecoveryOutcome::Restored {
            tip: self.tip.clone(),
            restored,
        }
    }

    fn discard_stored_blocks(&mut self, discarded: u64) -> RecoveryOutcome {
        if let Err(err) = self.temp_blocks.clear() {
            return RecoveryOutcome::Fatal(self.halt(FatalError::RestoreFailed {
                error: err.into(),
            }));
        }

        Event::publish(
            &self.event_publisher,
            Event::ClearTempBlocks(ClearTempBlocksEvent {
                timestamp: SystemTime::now(),
                discarded,
            }),
        );
        RecoveryOutcome::Discarded { discarded }
    }
}

/// Tip updates and event publishing.
impl<E, T, F, O, S> Synchronizer<E, T, F, O, S>
where
    E: BlockExecutor,
    T: TempBlockStore,
    F: BlockFetcher,
    O: FinalityOracle,
    S: Slots,
{
    fn on_append(&mut self, block: &BlockHeader) {
        self.tip = block.clone();
        Event::publish(
            &self.event_publisher,
            Event::AppendBlock(AppendBlockEvent {
                timestamp: SystemTime::now(),
                block: block.clone(),
            }),
        );
    }

    fn on_remove(&mut self, block: &BlockHeader, new_tip: BlockHeader) {
        self.tip = new_tip;
        Event::publish(
            &self.event_publisher,
            Event::RemoveBlock(RemoveBlockEvent {
                timestamp: SystemTime::now(),
                block: block.clone(),
            }),
        );
    }

    fn on_start_reorg(&self, candidate: &BlockHeader, certified_height: BlockHeight) {
        Event::publish(
            &self.event_publisher,
            Event::StartReorg(StartReorgEvent {
                timestamp: SystemTime::now(),
                tip: self.tip.clone(),
                candidate: candidate.clone(),
                certified_height,
            }),
        );
    }

    fn on_end_reorg(
        &self,
        common_ancestor: Option<BlockHeight>,
        removed: u64,
        applied: u64,
        committed: bool,
    ) {
        Event::publish(
            &self.event_publisher,
            Event::EndReorg(EndReorgEvent {
                timestamp: SystemTime::now(),
                common_ancestor,
                removed,
                applied,
                committed,
                tip: self.tip.clone(),
            }),
        );
    }

    fn halt(&mut self, error: FatalError) -> FatalError {
        log::error!(
            "halting at tip {} (height {}), certified height {}: {}",
            self.tip.id,
            self.tip.height,
            self.finality.certified_height(),
            error
        );
        self.halted = true;
        Event::publish(
            &self.event_publisher,
            Event::Halt(HaltEvent {
                timestamp: SystemTime::now(),
                reason: error.to_string(),
            }),
        );
        error
    }
}

// Check that `segment` holds exactly the heights `from..=to` in ascending order, that every block in
// it is correct and extends the one before it, and that its last block is `expected_id`.
fn is_branch_segment(
    segment: &[Block],
    from: BlockHeight,
    to: BlockHeight,
    expected_id: &BlockID,
) -> bool {
    segment.len() as u64 == to.int() - from.int() + 1
        && segment.first().map(|first| first.height()) == Some(from)
        && segment.last().map(|last| last.id()) == Some(*expected_id)
        && segment.iter().all(|block| block.is_correct())
        && segment
            .windows(2)
            .all(|pair| pair[1].header.extends(&pair[0].header))
}
