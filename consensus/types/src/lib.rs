//! Consensus types for the beacon fork-choice core.
//!
//! The types here carry only the fields fork choice, block admission and
//! gossip validation read; everything else a full state would hold is
//! opaque to this crate's consumers.

#[macro_use]
mod slot_epoch_macros;

pub mod attestation;
pub mod attestation_data;
pub mod beacon_block;
pub mod beacon_block_body;
pub mod beacon_block_header;
pub mod beacon_state;
pub mod chain_spec;
pub mod checkpoint;
pub mod latest_vote;
pub mod proposer_slashing;
pub mod slot_epoch;
pub mod validator;

pub use crate::attestation::Attestation;
pub use crate::attestation_data::AttestationData;
pub use crate::beacon_block::BeaconBlock;
pub use crate::beacon_block_body::BeaconBlockBody;
pub use crate::beacon_block_header::BeaconBlockHeader;
pub use crate::beacon_state::BeaconState;
pub use crate::chain_spec::ChainSpec;
pub use crate::checkpoint::Checkpoint;
pub use crate::latest_vote::LatestVote;
pub use crate::proposer_slashing::ProposerSlashing;
pub use crate::slot_epoch::{Epoch, Slot};
pub use crate::validator::Validator;

pub use ethereum_types::H256 as Hash256;
pub use ssz_types::{typenum, BitList, VariableList};

/// Upper bound on the validator registry, `2**40`.
pub type ValidatorRegistryLimit = typenum::U1099511627776;

/// Upper bound on committee size used for attestation bitfields.
pub type MaxValidatorsPerCommittee = typenum::U2048;
