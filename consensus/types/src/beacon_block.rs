use crate::{BeaconBlockBody, Hash256, Slot};
use serde_derive::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// A block of the beacon chain.
///
/// A block's identity is its signing root, available via
/// [`BeaconBlock::canonical_root`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct BeaconBlock {
    pub slot: Slot,
    pub parent_root: Hash256,
    pub state_root: Hash256,
    pub body: BeaconBlockBody,
}

impl BeaconBlock {
    /// The genesis block: slot zero, zero parent root, committing to the
    /// genesis state.
    pub fn genesis(state_root: Hash256) -> Self {
        Self {
            slot: Slot::new(0),
            parent_root: Hash256::zero(),
            state_root,
            body: BeaconBlockBody::default(),
        }
    }

    /// The signing root of the block, used as its identity everywhere a
    /// block is keyed or referenced.
    pub fn canonical_root(&self) -> Hash256 {
        self.tree_hash_root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssz::{Decode, Encode};

    #[test]
    fn genesis_block_shape() {
        let state_root = Hash256::repeat_byte(0x42);
        let block = BeaconBlock::genesis(state_root);

        assert_eq!(block.slot, Slot::new(0));
        assert_eq!(block.parent_root, Hash256::zero());
        assert_eq!(block.state_root, state_root);
    }

    #[test]
    fn root_commits_to_every_field() {
        let base = BeaconBlock::genesis(Hash256::zero());

        let mut other = base.clone();
        other.slot = Slot::new(1);
        assert_ne!(base.canonical_root(), other.canonical_root());

        let mut other = base.clone();
        other.parent_root = Hash256::repeat_byte(1);
        assert_ne!(base.canonical_root(), other.canonical_root());

        let mut other = base.clone();
        other.body.graffiti = Hash256::repeat_byte(1);
        assert_ne!(base.canonical_root(), other.canonical_root());
    }

    #[test]
    fn ssz_round_trip() {
        let block = BeaconBlock {
            slot: Slot::new(7),
            parent_root: Hash256::repeat_byte(0x01),
            state_root: Hash256::repeat_byte(0x02),
            body: BeaconBlockBody::default(),
        };
        assert_eq!(
            BeaconBlock::from_ssz_bytes(&block.as_ssz_bytes()).unwrap(),
            block
        );
    }
}
