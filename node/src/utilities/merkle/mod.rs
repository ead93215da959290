//! Merkle root over the transactions of a block.
//!
//! Pairs are hashed with blake2-256, an odd node at the end of a level is paired with itself.
//! A block without transactions has [`Hash::ZERO`] as its root.
use crate::utilities::hash::Hash;

pub(crate) struct Merkle;

impl Merkle {
    pub(crate) fn calculate_root(leaves: &[Hash]) -> Hash {
        if leaves.is_empty() {
            return Hash::ZERO;
        }
        let mut level = leaves.to_vec();
        while level.len() > 1 {
            level = level
                .chunks(2)
                .map(|pair| {
                    let left = pair[0];
                    let right = pair.get(1).copied().unwrap_or(left);
                    let mut bytes = Vec::with_capacity(64);
                    bytes.extend_from_slice(left.as_bytes());
                    bytes.extend_from_slice(right.as_bytes());
                    Hash::digest(&bytes)
                })
                .collect();
        }
        level[0]
    }
}
