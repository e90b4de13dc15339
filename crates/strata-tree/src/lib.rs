// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Hash-tree codec for the strata block store.
//!
//! A byte vector of length `L` maps onto a tree of 4 KiB blocks:
//!
//! - `L ≤ 4096`: one leaf, digest `SHA-256(u64_le(L) || data)`.
//! - otherwise the vector splits into up to 128 consecutive slices of
//!   `4096 · 128^(ℓ-1)` bytes (minimal `ℓ` with `4096 · 128^ℓ ≥ L`, last
//!   slice may be short); each slice roots a subtree by the same rule and
//!   the parent's payload is the run of child digests in order.
//!
//! [`build`] walks a vector bottom-up, emits one store request per block
//! (children before parent), and returns the root digest. [`resolve`]
//! fetches the root, then fans out child fetches — interior children on
//! their own tasks, leaf children copied inline — reassembling the vector
//! by request id. The geometry is a function of the length alone, so the
//! same bytes always produce the same root.
//!
//! Fan-out concurrency is unbounded: resolving a huge tree can put
//! thousands of requests in flight at once. The bounded tier queues are
//! the only throttle.

mod build;
mod resolve;

pub use build::{build, BuildError};
pub use resolve::{resolve, ResolveError, MAX_RECEIVE_SIZE};
