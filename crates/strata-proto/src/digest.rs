// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The 32-byte block digest and its bit-extraction helper.

use sha2::{Digest as _, Sha256};

use crate::HASH_SIZE;

/// A 32-byte SHA-256 content digest identifying one block.
///
/// Thin newtype over `[u8; 32]`. The inner bytes are public for zero-cost
/// access; the `Display` impl renders lowercase hex for logging, error
/// messages, and the disk tier's file names.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// View the digest as a byte slice.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Compute the canonical digest of a block:
    /// `SHA-256( u64_le(size) || payload )`.
    pub fn of_node(size: u64, payload: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(size.to_le_bytes());
        hasher.update(payload);
        Self(hasher.finalize().into())
    }

    /// Compute the digest of an already-framed block (`u64_le(size)`
    /// prefix included). The frame bytes are exactly the digest input, so
    /// this equals [`Digest::of_node`] over the parsed fields — it is the
    /// disk tier's bit-rot check.
    pub fn of_frame(frame: &[u8]) -> Self {
        Self(Sha256::digest(frame).into())
    }

    /// Reinterpret a 32-byte slice as a digest. Returns `None` for any
    /// other length. Used to walk the child digests packed in an interior
    /// block's payload.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Extract `width` consecutive bits starting at bit `offset`,
    /// little-endian within and across bytes: bit 0 of byte 0 is the
    /// least significant bit of the result.
    ///
    /// Bits past the end of the digest read as zero, so sharding code can
    /// slice uniformly without bounds checks. `width` must be at most 32.
    pub fn bits(&self, offset: usize, width: usize) -> u32 {
        debug_assert!(width <= 32, "bit width must fit in u32");
        let mut out = 0u32;
        let mut got = 0;
        while got < width {
            let bit = offset + got;
            let byte = bit / 8;
            if byte >= HASH_SIZE {
                break;
            }
            let shift = bit % 8;
            let take = (8 - shift).min(width - got);
            let chunk = (u32::from(self.0[byte]) >> shift) & ((1u32 << take) - 1);
            out |= chunk << got;
            got += take;
        }
        out
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn hex(digest: &Digest) -> String {
        digest.to_string()
    }

    // Pinned SHA-256 vectors for the three single-block shapes. These hex
    // strings are load-bearing: they pin the digest definition bit-for-bit.

    #[test]
    fn digest_of_empty_block() {
        let d = Digest::of_node(0, &[]);
        assert_eq!(
            hex(&d),
            "af5570f5a1810b7af78caf4bc70a660f0df51e42baf91d4de5b2328de0e83dfc"
        );
    }

    #[test]
    fn digest_of_single_byte_block() {
        let d = Digest::of_node(1, &[0x41]);
        assert_eq!(
            hex(&d),
            "0f32669d346065b1da465937a221d00801b2f572b01e395be6a8492bbb1f0467"
        );
    }

    #[test]
    fn digest_of_full_zero_block() {
        let d = Digest::of_node(4096, &[0u8; 4096]);
        assert_eq!(
            hex(&d),
            "34085a3cad6a1a45a68869e5a5eb2bcb79b0b6d84c0af33568f4f062aa43fc69"
        );
    }

    #[test]
    fn frame_digest_equals_node_digest() {
        let payload = b"frame and node hash the same bytes";
        let mut frame = (payload.len() as u64).to_le_bytes().to_vec();
        frame.extend_from_slice(payload);
        assert_eq!(
            Digest::of_frame(&frame),
            Digest::of_node(payload.len() as u64, payload)
        );
    }

    #[test]
    fn display_renders_lowercase_hex() {
        let d = Digest([0xAB; 32]);
        assert_eq!(hex(&d), "ab".repeat(32));
    }

    #[test]
    fn from_slice_rejects_wrong_lengths() {
        assert!(Digest::from_slice(&[0u8; 31]).is_none());
        assert!(Digest::from_slice(&[0u8; 33]).is_none());
        let d = Digest::from_slice(&[7u8; 32]).unwrap();
        assert_eq!(d.0, [7u8; 32]);
    }

    // bits() vectors over the ascending-byte digest 00 01 02 ... 1f.

    fn ascending() -> Digest {
        let mut bytes = [0u8; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = u8::try_from(i).unwrap();
        }
        Digest(bytes)
    }

    #[test]
    fn bits_whole_bytes() {
        let d = ascending();
        assert_eq!(d.bits(0, 8), 0x00);
        assert_eq!(d.bits(8, 8), 0x01);
        assert_eq!(d.bits(16, 32), 0x05040302);
    }

    #[test]
    fn bits_straddles_byte_boundaries() {
        let d = ascending();
        assert_eq!(d.bits(4, 8), 0x10);
        assert_eq!(d.bits(12, 16), 0x3020);
        assert_eq!(d.bits(40, 12), 0x605);
    }

    #[test]
    fn bits_past_the_end_reads_zero() {
        let d = ascending();
        assert_eq!(d.bits(256, 8), 0);
        assert_eq!(d.bits(1000, 32), 0);
        // A range crossing the end pads with zero bits.
        assert_eq!(d.bits(250, 8), 0x07);
    }

    proptest! {
        // bits() must agree with a bit-at-a-time reference for every
        // in-range (offset, width) pair.
        #[test]
        fn bits_matches_reference(
            bytes in prop::array::uniform32(any::<u8>()),
            offset in 0usize..300,
            width in 0usize..=32,
        ) {
            let d = Digest(bytes);
            let mut want = 0u32;
            for k in 0..width {
                let bit = offset + k;
                let byte = bit / 8;
                if byte < 32 && (bytes[byte] >> (bit % 8)) & 1 == 1 {
                    want |= 1 << k;
                }
            }
            prop_assert_eq!(d.bits(offset, width), want);
        }
    }
}
