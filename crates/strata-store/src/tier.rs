// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The generic tier actor and chain wiring.
//!
//! One tokio task per tier. Each turn of the event loop drains every
//! queued store request before selecting on both queues, so writes never
//! stall behind slow reads and retrieves see fresh state on a best-effort
//! basis. There is no ordering guarantee between a store and a concurrent
//! retrieve of the same digest — callers that care must sequence
//! themselves.

use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;

use strata_proto::{
    BlockNode, RetrieveReceiver, RetrieveRequest, RetrieveResponse, RetrieveSender, StoreReceiver,
    StoreRequest, StoreSender,
};
use tracing::{debug, info};

use crate::{BlockStore, DiskTier, MemoryTier};

/// Queue capacities for one tier. Bounded sends are the chain's only
/// flow-control primitive: a full queue blocks the producer.
#[derive(Debug, Clone, Copy)]
pub struct TierConfig {
    /// Store queue capacity.
    pub store_capacity: usize,
    /// Retrieve queue capacity.
    pub retrieve_capacity: usize,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            store_capacity: 1000,
            retrieve_capacity: 1000,
        }
    }
}

/// The two senders a tier exposes to producers and to the tier in front
/// of it. Cloneable; dropping every clone of both closes the tier.
#[derive(Debug, Clone)]
pub struct TierHandle {
    /// Store queue of the tier.
    pub store: StoreSender,
    /// Retrieve queue of the tier.
    pub retrieve: RetrieveSender,
}

/// One storage tier: a backend plus its event loop state.
///
/// Spawn with [`Tier::spawn`]; the actor owns the backend exclusively, so
/// backends need no internal locking.
pub struct Tier<S: BlockStore> {
    backend: S,
    store_rx: StoreReceiver,
    retrieve_rx: RetrieveReceiver,
    next: Option<TierHandle>,
}

impl<S: BlockStore> Tier<S> {
    /// Spawn a tier actor over `backend`. `next` is the slower tier this
    /// one forwards to, or `None` for the tail of the chain.
    ///
    /// Returns the tier's handle and the join handle of its task. The
    /// task runs until both of its queues are closed.
    pub fn spawn(
        backend: S,
        config: TierConfig,
        next: Option<TierHandle>,
    ) -> (TierHandle, JoinHandle<()>) {
        let (store_tx, store_rx) = mpsc::channel(config.store_capacity);
        let (retrieve_tx, retrieve_rx) = mpsc::channel(config.retrieve_capacity);
        let tier = Self {
            backend,
            store_rx,
            retrieve_rx,
            next,
        };
        let task = tokio::spawn(tier.run());
        (
            TierHandle {
                store: store_tx,
                retrieve: retrieve_tx,
            },
            task,
        )
    }

    async fn run(mut self) {
        let mut store_open = true;
        let mut retrieve_open = true;
        while store_open || retrieve_open {
            // Writes first: drain every queued store before touching reads.
            while store_open {
                match self.store_rx.try_recv() {
                    Ok(req) => self.process_store(req).await,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => store_open = false,
                }
            }
            if !store_open && !retrieve_open {
                break;
            }
            tokio::select! {
                req = self.store_rx.recv(), if store_open => match req {
                    Some(req) => self.process_store(req).await,
                    None => store_open = false,
                },
                req = self.retrieve_rx.recv(), if retrieve_open => match req {
                    Some(req) => self.process_retrieve(req).await,
                    None => retrieve_open = false,
                },
            }
        }
        info!("tier queues closed; actor exiting");
    }

    async fn process_store(&mut self, req: StoreRequest) {
        self.backend.insert(&req.digest, &req.node);
        if let Some(next) = &self.next {
            // The awaited send is the chain's backpressure; the request is
            // shared, so this forwards handles, not payload bytes.
            if next.store.send(req).await.is_err() {
                debug!("downstream store queue closed; block kept at this tier only");
            }
        }
    }

    async fn process_retrieve(&mut self, req: RetrieveRequest) {
        if let Some(node) = self.backend.get(&req.digest) {
            let reply = RetrieveResponse {
                node,
                req_id: req.req_id,
            };
            // A closed reply port means the caller gave up; drop it.
            let _ = req.reply.send(reply).await;
            return;
        }
        match &self.next {
            Some(next) => {
                // The downstream tier answers the original reply port
                // directly; nothing comes back through this tier.
                if let Err(send_err) = next.retrieve.send(req).await {
                    let req = send_err.0;
                    let _ = req
                        .reply
                        .send(RetrieveResponse {
                            node: BlockNode::missing(),
                            req_id: req.req_id,
                        })
                        .await;
                }
            }
            None => {
                // Tail of the chain: answer the total miss so the caller
                // is never stranded.
                let _ = req
                    .reply
                    .send(RetrieveResponse {
                        node: BlockNode::missing(),
                        req_id: req.req_id,
                    })
                    .await;
            }
        }
    }
}

/// Spawn the canonical two-tier chain: a fresh [`MemoryTier`] in front of
/// a [`DiskTier`] rooted at `root`.
///
/// Returns the head tier's handle and the two actor join handles, head
/// first.
///
/// # Errors
///
/// Returns the underlying I/O error if the disk root cannot be created.
pub fn memory_over_disk(
    root: impl Into<std::path::PathBuf>,
    config: TierConfig,
) -> std::io::Result<(TierHandle, Vec<JoinHandle<()>>)> {
    let disk = DiskTier::open(root)?;
    let (disk_handle, disk_task) = Tier::spawn(disk, config, None);
    let (head, memory_task) = Tier::spawn(MemoryTier::new(), config, Some(disk_handle));
    Ok((head, vec![memory_task, disk_task]))
}
