use crate::{ChainSpec, Checkpoint, Epoch, Slot, Validator, ValidatorRegistryLimit};
use serde_derive::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::VariableList;
use tree_hash_derive::TreeHash;

/// The state of the beacon chain, reduced to the fields the fork-choice
/// core reads.
///
/// The full state carries far more (history, randao, eth1 data); all of
/// that is behind the state-transition oracle and invisible here.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct BeaconState {
    pub genesis_time: u64,
    pub slot: Slot,
    pub validators: VariableList<Validator, ValidatorRegistryLimit>,
    pub balances: VariableList<u64, ValidatorRegistryLimit>,
    pub current_justified_checkpoint: Checkpoint,
    pub finalized_checkpoint: Checkpoint,
}

impl BeaconState {
    /// The epoch of the state's current slot.
    pub fn current_epoch(&self, spec: &ChainSpec) -> Epoch {
        self.slot.epoch(spec.slots_per_epoch)
    }

    /// Indices of all validators active at `epoch`, in registry order.
    pub fn active_validator_indices(&self, epoch: Epoch) -> Vec<u64> {
        self.validators
            .iter()
            .enumerate()
            .filter(|(_, validator)| validator.is_active_at(epoch))
            .map(|(i, _)| i as u64)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_validators(activation_epochs: &[u64]) -> BeaconState {
        let validators = activation_epochs
            .iter()
            .map(|&epoch| Validator {
                effective_balance: 32_000_000_000,
                activation_epoch: Epoch::new(epoch),
                ..Validator::default()
            })
            .collect::<Vec<_>>();

        BeaconState {
            validators: VariableList::from(validators),
            ..BeaconState::default()
        }
    }

    #[test]
    fn active_indices_respect_activation_epoch() {
        let state = state_with_validators(&[0, 0, 5]);

        assert_eq!(state.active_validator_indices(Epoch::new(0)), vec![0, 1]);
        assert_eq!(state.active_validator_indices(Epoch::new(5)), vec![0, 1, 2]);
    }

    #[test]
    fn exited_validators_are_not_active() {
        let mut state = state_with_validators(&[0, 0]);
        if let Some(validator) = state.validators.get_mut(1) {
            validator.exit_epoch = Epoch::new(3);
        }

        assert_eq!(state.active_validator_indices(Epoch::new(2)), vec![0, 1]);
        assert_eq!(state.active_validator_indices(Epoch::new(3)), vec![0]);
    }

    #[test]
    fn current_epoch_uses_spec_slot_count() {
        let spec = ChainSpec::minimal();
        let state = BeaconState {
            slot: Slot::new(17),
            ..BeaconState::default()
        };
        assert_eq!(state.current_epoch(&spec), Epoch::new(2));
    }
}
