use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, Receiver, Sender, TryRecvError},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
};

use ed25519_dalek::VerifyingKey;
use fork_choice_rs::{
    networking::{BlockSyncResponse, Message, Network},
    types::{block::Block, data_types::BlockID},
};

/// A mock network stub which passes messages from and to threads using channels.
#[derive(Clone)]
pub(crate) struct NetworkStub {
    my_verifying_key: VerifyingKey,
    all_peers: HashMap<VerifyingKey, Sender<(VerifyingKey, Message)>>,
    inbox: Arc<Mutex<Receiver<(VerifyingKey, Message)>>>,
}

impl Network for NetworkStub {
    fn send(&mut self, peer: VerifyingKey, message: Message) {
        if let Some(peer) = self.all_peers.get(&peer) {
            let _ = peer.send((self.my_verifying_key, message));
        }
    }

    fn recv(&mut self) -> Option<(VerifyingKey, Message)> {
        match self.inbox.lock().unwrap().try_recv() {
            Ok(o_m) => Some(o_m),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => panic!(),
        }
    }
}

pub(crate) fn mock_network(peers: impl Iterator<Item = VerifyingKey>) -> Vec<NetworkStub> {
    let mut all_peers = HashMap::new();
    let peer_and_inboxes: Vec<(VerifyingKey, Receiver<(VerifyingKey, Message)>)> = peers
        .map(|peer| {
            let (sender, receiver) = mpsc::channel();
            all_peers.insert(peer, sender);

            (peer, receiver)
        })
        .collect();

    peer_and_inboxes
        .into_iter()
        .map(|(my_verifying_key, inbox)| NetworkStub {
            my_verifying_key,
            all_peers: all_peers.clone(),
            inbox: Arc::new(Mutex::new(inbox)),
        })
        .collect()
}

/// How a [sync peer](start_sync_peer) answers block sync requests.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum PeerBehaviour {
    /// Answer with the requested blocks.
    Honest,
    /// Answer with the requested blocks minus the lowest one.
    Truncating,
    /// Never answer.
    Silent,
}

/// Start a thread that answers the block sync requests arriving at `network` from `blocks`, until
/// `shutdown` receives a message.
pub(crate) fn start_sync_peer(
    mut network: NetworkStub,
    blocks: Vec<Block>,
    behaviour: PeerBehaviour,
    shutdown: Receiver<()>,
) -> JoinHandle<()> {
    let blocks: HashMap<BlockID, Block> = blocks.into_iter().map(|block| (block.id(), block)).collect();
    thread::spawn(move || loop {
        match shutdown.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => return,
            Err(TryRecvError::Empty) => (),
        }

        match network.recv() {
            Some((origin, Message::BlockSyncRequest(request))) => {
                if behaviour == PeerBehaviour::Silent {
                    continue;
                }

                let mut range = Vec::new();
                let mut cursor = blocks.get(&request.branch_head);
                while let Some(block) = cursor {
                    if block.height() < request.from {
                        break;
                    }
                    if block.height() <= request.to {
                        range.push(block.clone());
                    }
                    cursor = blocks.get(&block.header.previous_block_id);
                }
                range.reverse();
                if behaviour == PeerBehaviour::Truncating && !range.is_empty() {
                    range.remove(0);
                }

                network.send(
                    origin,
                    Message::BlockSyncResponse(BlockSyncResponse { blocks: range }),
                );
            }
            Some(_) => (),
            None => thread::yield_now(),
        }
    })
}
