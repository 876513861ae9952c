use crate::{AttestationData, MaxValidatorsPerCommittee};
use serde_derive::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::BitList;
use tree_hash_derive::TreeHash;

/// An aggregate vote for a head block and checkpoint pair, as gossiped on
/// the attestation topic.
///
/// The signature lives behind the BLS oracle and is not carried here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Attestation {
    pub aggregation_bits: BitList<MaxValidatorsPerCommittee>,
    pub data: AttestationData,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ssz::{Decode, Encode};

    #[test]
    fn ssz_round_trip() {
        let attestation = Attestation {
            aggregation_bits: BitList::with_capacity(8).unwrap(),
            data: AttestationData::default(),
        };
        assert_eq!(
            Attestation::from_ssz_bytes(&attestation.as_ssz_bytes()).unwrap(),
            attestation
        );
    }
}
