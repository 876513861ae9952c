use crate::{Hash256, Slot};
use serde_derive::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// A summary of a beacon block, committing to the body by its root only.
///
/// Two conflicting headers signed for the same slot form a proposer
/// slashing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct BeaconBlockHeader {
    pub slot: Slot,
    pub parent_root: Hash256,
    pub state_root: Hash256,
    pub body_root: Hash256,
}

impl BeaconBlockHeader {
    /// The signing root of the header.
    pub fn canonical_root(&self) -> Hash256 {
        self.tree_hash_root()
    }
}
