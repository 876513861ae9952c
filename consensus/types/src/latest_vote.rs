use crate::{Epoch, Hash256};
use serde_derive::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// The most recent attestation by a validator considered for fork choice.
///
/// Votes only ever move forward: a stored vote is replaced by one with an
/// equal or higher target epoch, never a lower one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct LatestVote {
    pub epoch: Epoch,
    pub root: Hash256,
}
