use crate::{Epoch, Hash256};
use serde_derive::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// Casper FFG checkpoint, the `(epoch, root)` pair justification and
/// finality are expressed in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize, Encode, Decode, TreeHash,
)]
pub struct Checkpoint {
    pub epoch: Epoch,
    pub root: Hash256,
}

impl Checkpoint {
    /// A stable hash of the checkpoint's serialized form.
    ///
    /// Used as the key of the checkpoint-to-block-root side table: two
    /// distinct checkpoints referencing the same block must not alias, so
    /// the table cannot be keyed by the root alone.
    pub fn cache_key(&self) -> Hash256 {
        self.tree_hash_root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssz::{Decode, Encode};

    #[test]
    fn ssz_round_trip() {
        let checkpoint = Checkpoint {
            epoch: Epoch::new(3),
            root: Hash256::repeat_byte(0xab),
        };
        assert_eq!(
            Checkpoint::from_ssz_bytes(&checkpoint.as_ssz_bytes()).unwrap(),
            checkpoint
        );
    }

    #[test]
    fn cache_key_distinguishes_epochs() {
        let root = Hash256::repeat_byte(0x11);
        let a = Checkpoint {
            epoch: Epoch::new(1),
            root,
        };
        let b = Checkpoint {
            epoch: Epoch::new(2),
            root,
        };
        assert_ne!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), a.cache_key());
    }
}
