use crate::Hash256;
use serde_derive::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// The payload of a beacon block.
///
/// Fork choice never inspects the body; it only contributes to the block's
/// signing root.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct BeaconBlockBody {
    pub randao_reveal: Hash256,
    pub graffiti: Hash256,
}
