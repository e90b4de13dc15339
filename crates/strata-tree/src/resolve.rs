// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Concurrent tree reconstruction.

use std::future::Future;
use std::pin::Pin;

use strata_proto::{
    BlockNode, Digest, RetrieveRequest, RetrieveSender, BLOCK_SIZE, FAN_OUT, HASH_SIZE,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Largest subtree size a root may declare before `resolve` refuses it.
/// A policy limit, not an integrity check — it caps the allocation an
/// untrusted digest can demand.
pub const MAX_RECEIVE_SIZE: u64 = 100_000_000;

/// Errors from [`resolve`]. Every chain-side failure reduces to a miss at
/// some tier; these variants are where the misses surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// No tier holds the block. Also reported for a zero-sized root: a
    /// legitimately empty vector and a total miss are indistinguishable
    /// on the retrieve path (the empty node is the miss sentinel). An
    /// existence probe on the backend is the way to tell them apart.
    #[error("[RESOLVE_NOT_FOUND] no tier holds {digest}")]
    NotFound {
        /// The digest nothing answered for.
        digest: Digest,
    },

    /// The root declared a size past [`MAX_RECEIVE_SIZE`].
    #[error("[RESOLVE_OVERSIZED] root declares {size} bytes (limit {MAX_RECEIVE_SIZE})")]
    OversizedRoot {
        /// Declared subtree size.
        size: u64,
    },

    /// A block's declared size disagrees with the slice geometry derived
    /// from its parent.
    #[error("[RESOLVE_SIZE_MISMATCH] expected a {expected}-byte subtree, block declares {reported}")]
    SizeMismatch {
        /// Slice length the parent geometry demands.
        expected: usize,
        /// Size the block actually declares.
        reported: u64,
    },

    /// A leaf's payload does not fill its slice.
    #[error("[RESOLVE_TRUNCATED_LEAF] leaf holds {actual} bytes of an expected {expected}")]
    TruncatedLeaf {
        /// Slice length the parent geometry demands.
        expected: usize,
        /// Payload length actually held.
        actual: usize,
    },

    /// An interior payload is not exactly one digest per child.
    #[error("[RESOLVE_MALFORMED_INTERIOR] interior holds {payload_len} payload bytes, not one digest per {children} children")]
    MalformedInterior {
        /// Child count derived from the slice geometry.
        children: usize,
        /// Interior payload length actually held.
        payload_len: usize,
    },

    /// A response carried a request id this resolve never issued.
    #[error("[RESOLVE_STRAY_RESPONSE] unknown request id {req_id}")]
    StrayResponse {
        /// The unrecognized id.
        req_id: usize,
    },

    /// The retrieve queue or a reply port closed mid-resolve.
    #[error("[RESOLVE_CHAIN_CLOSED] storage chain hung up mid-resolve")]
    ChainClosed,

    /// A fan-out task died before reporting.
    #[error("[RESOLVE_TASK_FAILED] fan-out task died before reporting")]
    TaskFailed,
}

/// Reconstruct the byte vector rooted at `root` by recursively fetching
/// blocks through `retrieve`.
///
/// Interior children are fetched and filled concurrently (one task per
/// child); leaf children are copied inline as their responses arrive.
/// Responses correlate by request id, so arrival order is irrelevant.
/// On failure, replies still in flight land on a dropped port and the
/// tiers discard them.
///
/// # Errors
///
/// See [`ResolveError`]; any integrity or policy failure anywhere in the
/// tree fails the whole resolve.
pub async fn resolve(root: Digest, retrieve: &RetrieveSender) -> Result<Vec<u8>, ResolveError> {
    let (reply, mut replies) = mpsc::channel(1);
    retrieve
        .send(RetrieveRequest {
            digest: root,
            req_id: 0,
            reply,
        })
        .await
        .map_err(|_| ResolveError::ChainClosed)?;
    let res = replies.recv().await.ok_or(ResolveError::ChainClosed)?;

    let size = res.node.size;
    if size == 0 {
        return Err(ResolveError::NotFound { digest: root });
    }
    if size > MAX_RECEIVE_SIZE {
        return Err(ResolveError::OversizedRoot { size });
    }

    let region_len = size as usize;
    fill(res.node, region_len, retrieve.clone()).await
}

/// Span of each child subtree directly below a node of `len` bytes: the
/// smallest `4096 · 128^ℓ` whose fan-out covers the whole region. This is
/// the same fold the builder uses, so a node's geometry is always derived
/// from its own length. A parent's span says how long a child's region
/// is, never how the child subdivides it; the last child of a level can
/// be arbitrarily short and shallow.
fn subtree_span(len: usize) -> usize {
    let mut span = BLOCK_SIZE;
    while span * FAN_OUT < len {
        span *= FAN_OUT;
    }
    span
}

type FillFuture = Pin<Box<dyn Future<Output = Result<Vec<u8>, ResolveError>> + Send>>;

/// Reconstruct the region a single block roots. A region of at most one
/// block is a leaf; anything larger is an interior node indexing
/// [`subtree_span`]-sized children.
fn fill(node: BlockNode, region_len: usize, retrieve: RetrieveSender) -> FillFuture {
    Box::pin(async move {
        if node.size != region_len as u64 {
            return Err(ResolveError::SizeMismatch {
                expected: region_len,
                reported: node.size,
            });
        }
        if region_len <= BLOCK_SIZE {
            if node.payload.len() != region_len {
                return Err(ResolveError::TruncatedLeaf {
                    expected: region_len,
                    actual: node.payload.len(),
                });
            }
            return Ok(node.payload.to_vec());
        }

        let child_span = subtree_span(region_len);
        let children = region_len.div_ceil(child_span);
        if node.payload.len() != children * HASH_SIZE {
            return Err(ResolveError::MalformedInterior {
                children,
                payload_len: node.payload.len(),
            });
        }
        let digests: Vec<Digest> = node
            .payload
            .chunks(HASH_SIZE)
            .filter_map(Digest::from_slice)
            .collect();

        // One shared reply port for the whole fan-out; req_id is the
        // child index.
        let (reply, mut replies) = mpsc::channel(children);
        for (req_id, digest) in digests.iter().enumerate() {
            retrieve
                .send(RetrieveRequest {
                    digest: *digest,
                    req_id,
                    reply: reply.clone(),
                })
                .await
                .map_err(|_| ResolveError::ChainClosed)?;
        }
        drop(reply);

        let mut out = vec![0u8; region_len];
        let mut pending: Vec<(usize, JoinHandle<Result<Vec<u8>, ResolveError>>)> = Vec::new();
        for _ in 0..children {
            let res = replies.recv().await.ok_or(ResolveError::ChainClosed)?;
            let index = res.req_id;
            let Some(digest) = digests.get(index) else {
                return Err(ResolveError::StrayResponse { req_id: index });
            };
            let start = index * child_span;
            let end = region_len.min(start + child_span);
            let child_len = end - start;
            if res.node.size == 0 {
                return Err(ResolveError::NotFound { digest: *digest });
            }
            if res.node.size != child_len as u64 {
                return Err(ResolveError::SizeMismatch {
                    expected: child_len,
                    reported: res.node.size,
                });
            }
            if child_len <= BLOCK_SIZE {
                // Leaf frontier: copy inline, no task per data block.
                if res.node.payload.len() != child_len {
                    return Err(ResolveError::TruncatedLeaf {
                        expected: child_len,
                        actual: res.node.payload.len(),
                    });
                }
                out[start..end].copy_from_slice(&res.node.payload);
            } else {
                // Branching frontier: recurse concurrently.
                let task = tokio::spawn(fill(res.node, child_len, retrieve.clone()));
                pending.push((start, task));
            }
        }

        for (start, task) in pending {
            let bytes = task.await.map_err(|_| ResolveError::TaskFailed)??;
            out[start..start + bytes.len()].copy_from_slice(&bytes);
        }
        Ok(out)
    })
}
