// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Request and response messages for the tier chain.
//!
//! Tiers talk over bounded `tokio::sync::mpsc` channels. Store requests
//! flow head-to-tail and are terminal at the tail; retrieve requests flow
//! forward until some tier hits, and the hitting tier answers directly on
//! the `reply` sender the caller packed into the request. Messages are
//! immutable once built — forwarding one down the chain is a clone of
//! cheap handles, never a payload copy.

use tokio::sync::mpsc;

use crate::{BlockNode, Digest};

/// Sending half of a tier's store queue.
pub type StoreSender = mpsc::Sender<StoreRequest>;
/// Receiving half of a tier's store queue.
pub type StoreReceiver = mpsc::Receiver<StoreRequest>;
/// Sending half of a tier's retrieve queue.
pub type RetrieveSender = mpsc::Sender<RetrieveRequest>;
/// Receiving half of a tier's retrieve queue.
pub type RetrieveReceiver = mpsc::Receiver<RetrieveRequest>;
/// Sending half of a caller's reply port.
pub type ReplySender = mpsc::Sender<RetrieveResponse>;
/// Receiving half of a caller's reply port.
pub type ReplyReceiver = mpsc::Receiver<RetrieveResponse>;

/// Ask every tier on the chain to persist one block.
#[derive(Debug, Clone)]
pub struct StoreRequest {
    /// Canonical digest of `node`, computed by the producer.
    pub digest: Digest,
    /// The block to persist.
    pub node: BlockNode,
}

/// Ask the chain for the block with a given digest.
///
/// Several in-flight requests may share one reply port; `req_id` lets the
/// caller reassemble out-of-order responses. A tier that finds the reply
/// port closed drops the response on the floor — the caller gave up.
#[derive(Debug, Clone)]
pub struct RetrieveRequest {
    /// Digest of the wanted block.
    pub digest: Digest,
    /// Caller-chosen correlation id, echoed back in the response.
    pub req_id: usize,
    /// Where the hitting tier (or the tail, on a total miss) replies.
    pub reply: ReplySender,
}

/// Answer to a [`RetrieveRequest`].
///
/// On a total miss the node is [`BlockNode::missing`] — the caller is
/// never left waiting on a reply that will not come.
#[derive(Debug, Clone)]
pub struct RetrieveResponse {
    /// The found block, or the missing sentinel.
    pub node: BlockNode,
    /// `req_id` of the request this answers.
    pub req_id: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn forwarding_a_store_request_shares_the_payload() {
        let node = BlockNode::new(5, Bytes::from_static(b"hello"));
        let req = StoreRequest {
            digest: node.digest(),
            node,
        };
        let forwarded = req.clone();
        // Bytes handles point at the same backing storage.
        assert_eq!(
            forwarded.node.payload.as_ptr(),
            req.node.payload.as_ptr()
        );
    }

    #[tokio::test]
    async fn responses_correlate_by_req_id() {
        let (reply, mut replies) = mpsc::channel(2);
        for req_id in [1usize, 0] {
            reply
                .send(RetrieveResponse {
                    node: BlockNode::missing(),
                    req_id,
                })
                .await
                .unwrap();
        }
        drop(reply);
        let first = replies.recv().await.unwrap();
        let second = replies.recv().await.unwrap();
        assert_eq!((first.req_id, second.req_id), (1, 0));
    }
}
