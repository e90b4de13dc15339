// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Block model and tier channel protocol for the strata block store.
//!
//! `strata-proto` defines the vocabulary shared by the tree codec and the
//! storage tiers: the 32-byte [`Digest`], the sized [`BlockNode`], the
//! request/response messages that travel the tier chain, and the on-disk
//! frame format.
//!
//! # Digest Definition
//!
//! A block's digest is `SHA-256( u64_le(size) || payload )` — the logical
//! size of the subtree the block roots, little-endian, followed by the raw
//! payload bytes. The same bytes, in the same order, are what the disk
//! tier writes as a block file, so [`Digest::of_frame`] over a stored file
//! *is* the canonical digest check. There is exactly one hash definition
//! in this workspace.
//!
//! # Size Semantics
//!
//! `size` is the length of the *data subtree* a block roots, not the
//! length of its payload. For a leaf the two coincide; for an interior
//! block the payload is a run of child digests while `size` counts the
//! bytes of data underneath. A `size` of zero doubles as the "missing"
//! sentinel on the retrieve path (see [`BlockNode::missing`]).
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions
)]

mod digest;
mod node;
mod request;

pub use digest::Digest;
pub use node::{BlockNode, FrameError, FRAME_HEADER_SIZE};
pub use request::{
    ReplyReceiver, ReplySender, RetrieveReceiver, RetrieveRequest, RetrieveResponse,
    RetrieveSender, StoreReceiver, StoreRequest, StoreSender,
};

/// Maximum payload length of a leaf block, in bytes.
pub const BLOCK_SIZE: usize = 4096;

/// Length of a [`Digest`] in bytes.
pub const HASH_SIZE: usize = 32;

/// Number of child digests that fit in one interior block.
pub const FAN_OUT: usize = BLOCK_SIZE / HASH_SIZE;
