// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Sized block payloads and the on-disk frame format.
//!
//! Frame layout:
//!
//! ``u64_le(size) || payload``
//!
//! These are exactly the bytes the digest definition hashes, so a stored
//! frame verifies against its digest with a single SHA-256 pass.

use bytes::Bytes;

use crate::Digest;

/// Length of the frame's size prefix, in bytes.
pub const FRAME_HEADER_SIZE: usize = 8;

/// One block of the hash tree: a payload plus the logical size of the
/// data subtree it roots.
///
/// For a leaf, `payload` is a slice of the original data and
/// `size == payload.len()`. For an interior block, `payload` is a run of
/// child digests and `size` counts the data bytes underneath. The payload
/// is a [`Bytes`] handle, so cloning a node — tiers forwarding a store
/// request down the chain, for instance — never copies block data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockNode {
    /// Logical length of the data subtree rooted at this block.
    pub size: u64,
    /// Leaf data, or concatenated child digests for an interior block.
    pub payload: Bytes,
}

impl BlockNode {
    /// Build a node from a subtree size and payload bytes.
    pub fn new(size: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            size,
            payload: payload.into(),
        }
    }

    /// The empty node a tail tier sends back on a terminal miss. Its zero
    /// `size` is the sentinel callers test for.
    pub fn missing() -> Self {
        Self {
            size: 0,
            payload: Bytes::new(),
        }
    }

    /// Canonical digest of this block.
    pub fn digest(&self) -> Digest {
        Digest::of_node(self.size, &self.payload)
    }

    /// Encode as an on-disk frame: `u64_le(size) || payload`.
    pub fn to_frame(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        frame.extend_from_slice(&self.size.to_le_bytes());
        frame.extend_from_slice(&self.payload);
        frame
    }

    /// Decode an on-disk frame. The payload is sliced out of the frame
    /// buffer without copying.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Truncated`] when the frame is shorter than
    /// its 8-byte size prefix.
    pub fn from_frame(frame: impl Into<Bytes>) -> Result<Self, FrameError> {
        let frame = frame.into();
        if frame.len() < FRAME_HEADER_SIZE {
            return Err(FrameError::Truncated { len: frame.len() });
        }
        let mut prefix = [0u8; FRAME_HEADER_SIZE];
        prefix.copy_from_slice(&frame[..FRAME_HEADER_SIZE]);
        Ok(Self {
            size: u64::from_le_bytes(prefix),
            payload: frame.slice(FRAME_HEADER_SIZE..),
        })
    }
}

/// Errors decoding an on-disk frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The frame is shorter than its size prefix.
    #[error("[FRAME_TRUNCATED] frame is {len} bytes; need at least the 8-byte size prefix")]
    Truncated {
        /// Observed frame length.
        len: usize,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn frame_round_trip() {
        let node = BlockNode::new(4097, Bytes::from_static(b"two child digests would go here"));
        let decoded = BlockNode::from_frame(node.to_frame()).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn frame_of_missing_node_is_just_the_prefix() {
        let frame = BlockNode::missing().to_frame();
        assert_eq!(frame, vec![0u8; FRAME_HEADER_SIZE]);
    }

    #[test]
    fn truncated_frames_are_rejected() {
        for len in 0..FRAME_HEADER_SIZE {
            let err = BlockNode::from_frame(vec![0u8; len]).unwrap_err();
            assert_eq!(err, FrameError::Truncated { len });
        }
    }

    #[test]
    fn frame_digest_matches_node_digest() {
        let node = BlockNode::new(3, Bytes::from_static(&[1, 2, 3]));
        assert_eq!(Digest::of_frame(&node.to_frame()), node.digest());
    }

    proptest! {
        #[test]
        fn decoding_arbitrary_bytes_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
            let _ = BlockNode::from_frame(bytes);
        }

        #[test]
        fn any_valid_frame_round_trips(
            size in any::<u64>(),
            payload in prop::collection::vec(any::<u8>(), 0..512),
        ) {
            let node = BlockNode::new(size, payload);
            let decoded = BlockNode::from_frame(node.to_frame()).unwrap();
            prop_assert_eq!(decoded, node);
        }
    }
}
