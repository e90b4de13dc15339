// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Layered storage tiers for the strata block store.
//!
//! A chain is a singly-linked pipeline of tiers, fast in front of slow.
//! Each tier is an actor owning one backend and two bounded request
//! queues; stores cascade down the whole chain, retrieves travel only
//! until they hit, and the tail answers total misses with an empty node.
//! [`MemoryTier`] and [`DiskTier`] are the two shipped backends; anything
//! implementing [`BlockStore`] can sit in a [`Tier`].
//!
//! # Absence Semantics
//!
//! [`get`](BlockStore::get) returns `None` for missing blocks — this is
//! **not** an error. A chain is a cache hierarchy: missing blocks are
//! expected (evicted, never stored, lost to bit rot). Backends demote
//! every internal failure to absence; a failed write simply leaves the
//! block absent and a later store request writes it again.
//!
//! # Known Gaps
//!
//! There is no deletion, garbage collection, or reference counting; the
//! disk tier does not fsync and has no crash-recovery story. Eviction is
//! out of scope for both backends — safe only because a slower tier is
//! expected to retain every block.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]

mod disk;
mod memory;
mod tier;

pub use disk::DiskTier;
pub use memory::MemoryTier;
pub use tier::{memory_over_disk, Tier, TierConfig, TierHandle};

use strata_proto::{BlockNode, Digest};

/// Backend contract for one storage tier.
///
/// Intentionally synchronous and object-safe: a backend is owned by
/// exactly one tier task, which calls it between channel events. Block
/// files are one page, so even the disk backend's I/O runs inline on the
/// tier task.
pub trait BlockStore: Send + 'static {
    /// Persist a block under its digest. Idempotent — inserting an
    /// already-present digest is a no-op. Backend failures are swallowed
    /// (logged by the backend); the block is just absent afterwards.
    fn insert(&mut self, digest: &Digest, node: &BlockNode);

    /// Fetch a block by digest. `None` is a miss, never an error;
    /// integrity failures on read are demoted to misses.
    fn get(&self, digest: &Digest) -> Option<BlockNode>;

    /// Check presence without fetching.
    fn contains(&self, digest: &Digest) -> bool;
}
