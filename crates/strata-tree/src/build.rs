// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bottom-up tree construction.

use std::future::Future;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use strata_proto::{BlockNode, Digest, StoreRequest, StoreSender, BLOCK_SIZE, FAN_OUT, HASH_SIZE};

/// Errors from [`build`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// The store queue closed before every block of the tree was emitted.
    #[error("[BUILD_CHAIN_CLOSED] store queue closed before the tree was fully emitted")]
    ChainClosed,
}

/// Compute the root digest of `data`, emitting every block of its tree
/// into `sink` (children before parents) when one is given.
///
/// The digest is a function of the bytes alone — passing a sink, or
/// none, never changes the root. Sends on the bounded store queue are
/// awaited, so a slow chain backpressures the builder.
///
/// # Errors
///
/// [`BuildError::ChainClosed`] if `sink` is closed mid-emission. Blocks
/// already emitted stay in the chain; re-building the same data emits
/// the identical tree, so a retry is always safe.
pub async fn build(data: &[u8], sink: Option<&StoreSender>) -> Result<Digest, BuildError> {
    build_node(data, sink).await
}

/// Recursive worker. Boxed because async recursion needs an indirection;
/// the depth is the tree height, which grows with the 128-ary logarithm
/// of the input length.
fn build_node<'a>(
    data: &'a [u8],
    sink: Option<&'a StoreSender>,
) -> Pin<Box<dyn Future<Output = Result<Digest, BuildError>> + Send + 'a>> {
    Box::pin(async move {
        let payload = if data.len() <= BLOCK_SIZE {
            Bytes::copy_from_slice(data)
        } else {
            let (children, span) = partition(data.len());
            let mut digests = BytesMut::with_capacity(children * HASH_SIZE);
            for slice in data.chunks(span) {
                let child = build_node(slice, sink).await?;
                digests.extend_from_slice(child.as_bytes());
            }
            digests.freeze()
        };

        let node = BlockNode::new(data.len() as u64, payload);
        let digest = node.digest();
        if let Some(sink) = sink {
            sink.send(StoreRequest { digest, node })
                .await
                .map_err(|_| BuildError::ChainClosed)?;
        }
        Ok(digest)
    })
}

/// Geometry of an interior node over `len` bytes: the child count and the
/// span of each child's subtree. Folds the leaf count by the fan-out
/// until one block of digests can index the whole vector.
fn partition(len: usize) -> (usize, usize) {
    let mut children = len.div_ceil(BLOCK_SIZE);
    let mut span = BLOCK_SIZE;
    while children > FAN_OUT {
        children = children.div_ceil(FAN_OUT);
        span *= FAN_OUT;
    }
    (children, span)
}
