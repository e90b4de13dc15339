// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! On-disk block store — the slow tier backend.
//!
//! Each block lives in its own file under two shard directories derived
//! from the digest's leading bits:
//!
//! ``<root>/<hex(bits(H,0,8))>/<hex(bits(H,8,8))>/<hex64(H)>``
//!
//! File contents are the canonical frame ``u64_le(size) || payload`` —
//! byte-identical to the digest input, so reads verify bit rot with one
//! SHA-256 pass over the raw file. A block that fails its self-check is a
//! silent miss; the chain above re-persists it on the next store pass.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use strata_proto::{BlockNode, Digest};
use tracing::{debug, warn};

use crate::BlockStore;

/// Shard directory levels beneath the root.
const SHARD_LEVELS: usize = 2;
/// Digest bits consumed per shard level.
const SHARD_WIDTH: usize = 8;

/// Filesystem-backed block store rooted at one directory.
///
/// Assumes exclusive access to its root. Writes are not fsynced and there
/// is no crash recovery — a torn write fails the read-side self-check and
/// becomes a miss, nothing worse.
pub struct DiskTier {
    root: PathBuf,
}

impl DiskTier {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the root cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The root directory this store writes beneath.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, digest: &Digest) -> PathBuf {
        let mut path = self.root.clone();
        for level in 0..SHARD_LEVELS {
            path.push(format!("{:02x}", digest.bits(level * SHARD_WIDTH, SHARD_WIDTH)));
        }
        path.push(digest.to_string());
        path
    }
}

impl BlockStore for DiskTier {
    fn insert(&mut self, digest: &Digest, node: &BlockNode) {
        let path = self.path_for(digest);
        if path.exists() {
            return;
        }
        if let Some(shard) = path.parent() {
            if let Err(err) = fs::create_dir_all(shard) {
                warn!(%digest, %err, "shard directory create failed; block not persisted");
                return;
            }
        }
        if let Err(err) = fs::write(&path, node.to_frame()) {
            warn!(%digest, %err, "block write failed; block not persisted");
        }
    }

    fn get(&self, digest: &Digest) -> Option<BlockNode> {
        let path = self.path_for(digest);
        let frame = match fs::read(&path) {
            Ok(frame) => frame,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(%digest, %err, "block read failed; treating as a miss");
                return None;
            }
        };
        if Digest::of_frame(&frame) != *digest {
            warn!(%digest, "on-disk block failed its self-check; treating as a miss");
            return None;
        }
        match BlockNode::from_frame(frame) {
            Ok(node) => Some(node),
            Err(err) => {
                debug!(%digest, %err, "stored frame unparseable; treating as a miss");
                None
            }
        }
    }

    fn contains(&self, digest: &Digest) -> bool {
        self.path_for(digest).exists()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn open_temp() -> (tempfile::TempDir, DiskTier) {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskTier::open(dir.path().join("blocks")).unwrap();
        (dir, store)
    }

    fn block(data: &'static [u8]) -> (Digest, BlockNode) {
        let node = BlockNode::new(data.len() as u64, Bytes::from_static(data));
        (node.digest(), node)
    }

    #[test]
    fn insert_get_round_trip() {
        let (_dir, mut store) = open_temp();
        let (digest, node) = block(b"persist me");
        store.insert(&digest, &node);
        assert_eq!(store.get(&digest), Some(node));
    }

    #[test]
    fn files_land_under_two_shard_levels() {
        let (_dir, mut store) = open_temp();
        let (digest, node) = block(b"sharded");
        store.insert(&digest, &node);

        // Level 0 and 1 are the first two digest bytes rendered as hex.
        let shard0 = format!("{:02x}", digest.0[0]);
        let shard1 = format!("{:02x}", digest.0[1]);
        let path = store
            .root()
            .join(shard0)
            .join(shard1)
            .join(digest.to_string());
        assert!(path.is_file());

        // And the file holds the canonical frame.
        assert_eq!(fs::read(path).unwrap(), node.to_frame());
    }

    #[test]
    fn get_missing_returns_none() {
        let (_dir, store) = open_temp();
        assert!(store.get(&Digest([0xEE; 32])).is_none());
    }

    #[test]
    fn insert_is_idempotent_on_disk() {
        let (_dir, mut store) = open_temp();
        let (digest, node) = block(b"write once");
        store.insert(&digest, &node);
        store.insert(&digest, &node);
        assert_eq!(store.get(&digest), Some(node));
    }

    #[test]
    fn corrupted_file_is_a_miss() {
        let (_dir, mut store) = open_temp();
        let (digest, node) = block(b"soon to rot");
        store.insert(&digest, &node);

        // Flip one payload byte in place.
        let path = store.path_for(&digest);
        let mut frame = fs::read(&path).unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        fs::write(&path, frame).unwrap();

        assert!(store.get(&digest).is_none());
        // contains() is a pure existence probe; the file is still there.
        assert!(store.contains(&digest));
    }

    #[test]
    fn truncated_file_is_a_miss() {
        let (_dir, mut store) = open_temp();
        let (digest, node) = block(b"soon to be cut short");
        store.insert(&digest, &node);

        let path = store.path_for(&digest);
        fs::write(&path, &[0u8; 3]).unwrap();
        assert!(store.get(&digest).is_none());
    }

    #[test]
    fn reopen_sees_existing_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("blocks");
        let (digest, node) = block(b"survives restart");
        {
            let mut store = DiskTier::open(&root).unwrap();
            store.insert(&digest, &node);
        }
        let store = DiskTier::open(&root).unwrap();
        assert_eq!(store.get(&digest), Some(node));
    }
}
