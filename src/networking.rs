/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! [Trait definition](Network) for pluggable peer-to-peer networking, and a [`BlockFetcher`] that
//! uses it.
//!
//! Peers are identified by their Ed25519 [`VerifyingKey`]. Networking providers interact with this
//! crate through implementations of the [`Network`] trait, which allows sending a [`Message`] to a
//! specific peer and receiving messages from any peer.
//!
//! ## Block sync
//!
//! [`NetworkBlockFetcher`] fetches ranges of blocks by sending a [`BlockSyncRequest`] to one of its
//! sync peers and waiting for that peer's [`BlockSyncResponse`]. Peers are tried in round robin: a
//! peer that times out or sends a malformed response is skipped in favour of the next one, until every
//! peer has been tried once.

use std::thread;
use std::time::{Duration, Instant};

use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::VerifyingKey;

use crate::synchronizer::{BlockFetcher, FetchError};
use crate::types::{
    block::Block,
    data_types::{BlockHeight, BlockID},
};

pub trait Network: Clone + Send {
    /// Send a message to the specified peer without blocking.
    fn send(&mut self, peer: VerifyingKey, message: Message);

    /// Receive a message from any peer. Returns immediately with a `None` if no message is available
    /// now.
    fn recv(&mut self) -> Option<(VerifyingKey, Message)>;
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Message {
    BlockSyncRequest(BlockSyncRequest),
    BlockSyncResponse(BlockSyncResponse),
}

/// Request for the blocks at heights `from..=to` on the branch headed by `branch_head`.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BlockSyncRequest {
    pub from: BlockHeight,
    pub to: BlockHeight,
    pub branch_head: BlockID,
}

/// The requested blocks, in ascending order of height.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BlockSyncResponse {
    pub blocks: Vec<Block>,
}

/// [`BlockFetcher`] that requests blocks from sync peers over a [`Network`].
pub struct NetworkBlockFetcher<N: Network> {
    network: N,
    peers: Vec<VerifyingKey>,
    response_timeout: Duration,
    next_peer: usize,
}

impl<N: Network> NetworkBlockFetcher<N> {
    pub fn new(
        network: N,
        peers: Vec<VerifyingKey>,
        response_timeout: Duration,
    ) -> NetworkBlockFetcher<N> {
        NetworkBlockFetcher {
            network,
            peers,
            response_timeout,
            next_peer: 0,
        }
    }

    /// Replace the set of sync peers.
    pub fn set_peers(&mut self, peers: Vec<VerifyingKey>) {
        self.peers = peers;
        self.next_peer = 0;
    }

    // Wait until `deadline` for a response from `peer`. Messages from other peers are dropped.
    fn recv_response(&mut self, peer: &VerifyingKey, deadline: Instant) -> Option<BlockSyncResponse> {
        while Instant::now() < deadline {
            match self.network.recv() {
                Some((origin, Message::BlockSyncResponse(response))) if origin == *peer => {
                    return Some(response)
                }
                Some(_) => (),
                None => thread::yield_now(),
            }
        }

        None
    }
}

impl<N: Network> BlockFetcher for NetworkBlockFetcher<N> {
    fn fetch_range(
        &mut self,
        from: BlockHeight,
        to: BlockHeight,
        branch_head: &BlockID,
    ) -> Result<Vec<Block>, FetchError> {
        if self.peers.is_empty() {
            return Err(FetchError::NoPeers);
        }

        let mut error = FetchError::Timeout;
        for _ in 0..self.peers.len() {
            let peer = self.peers[self.next_peer % self.peers.len()];
            self.next_peer = (self.next_peer + 1) % self.peers.len();

            self.network.send(
                peer,
                Message::BlockSyncRequest(BlockSyncRequest {
                    from,
                    to,
                    branch_head: *branch_head,
                }),
            );
            match self.recv_response(&peer, Instant::now() + self.response_timeout) {
                Some(response) if covers_range(&response.blocks, from, to) => {
                    return Ok(response.blocks)
                }
                Some(_) => {
                    log::warn!("malformed block sync response for heights {} to {}", from, to);
                    error = FetchError::MalformedResponse
                }
                None => {
                    log::warn!("timed out fetching heights {} to {}", from, to);
                    error = FetchError::Timeout
                }
            }
        }

        Err(error)
    }
}

// Check that `blocks` are correct and have exactly the heights `from..=to`, in ascending order.
fn covers_range(blocks: &[Block], from: BlockHeight, to: BlockHeight) -> bool {
    to >= from
        && blocks.len() as u64 == to.int() - from.int() + 1
        && blocks
            .iter()
            .enumerate()
            .all(|(i, block)| block.height() == from + i as u64 && block.is_correct())
}
