use crate::{ssz_from_store_bytes, ssz_store_bytes, DBColumn, Error, StoreItem};
use types::{BeaconBlock, BeaconState, LatestVote};

impl StoreItem for BeaconBlock {
    fn db_column() -> DBColumn {
        DBColumn::BeaconBlock
    }

    fn as_store_bytes(&self) -> Vec<u8> {
        ssz_store_bytes(self)
    }

    fn from_store_bytes(bytes: &[u8]) -> Result<Self, Error> {
        ssz_from_store_bytes(bytes)
    }
}

impl StoreItem for BeaconState {
    fn db_column() -> DBColumn {
        DBColumn::BeaconState
    }

    fn as_store_bytes(&self) -> Vec<u8> {
        ssz_store_bytes(self)
    }

    fn from_store_bytes(bytes: &[u8]) -> Result<Self, Error> {
        ssz_from_store_bytes(bytes)
    }
}

impl StoreItem for LatestVote {
    fn db_column() -> DBColumn {
        DBColumn::ValidatorVote
    }

    fn as_store_bytes(&self) -> Vec<u8> {
        ssz_store_bytes(self)
    }

    fn from_store_bytes(bytes: &[u8]) -> Result<Self, Error> {
        ssz_from_store_bytes(bytes)
    }
}
