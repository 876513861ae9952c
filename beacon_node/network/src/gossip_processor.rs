//! Deduplicating admission of gossiped operations.
//!
//! Peers forwarding a proposer slashing or attestation must validate it
//! first. The pipeline is the same for both kinds: drop anything whose
//! fingerprint is already cached (valid or invalid), check the consensus
//! predicate against the head state, cache the verdict and re-broadcast on
//! success. Transient head-state failures drop the message without caching
//! so it can be retried on re-receipt.

use crate::pubsub::{Broadcaster, PubsubMessage};
use crate::seen_cache::{default_seen_cache, SeenCache};
use crate::service::TaskTracker;
use parking_lot::Mutex;
use slog::{debug, error, warn, Logger};
use std::sync::Arc;
use store::{HeadStore, StateStore};
use tree_hash::TreeHash;
use types::{Attestation, BeaconState, Hash256, ProposerSlashing};

const VALID_PREFIX: &[u8] = b"valid:";
const INVALID_PREFIX: &[u8] = b"invalid:";

/// A consensus predicate rejected the operation. The verdict is
/// deterministic against persistent state, so it is safe to cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationInvalid(pub String);

impl std::fmt::Display for OperationInvalid {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The signature-oracle pair used to admit gossiped operations.
pub trait OperationVerifier: Send + Sync {
    fn verify_proposer_slashing(
        &self,
        state: &BeaconState,
        slashing: &ProposerSlashing,
    ) -> Result<(), OperationInvalid>;

    fn verify_attestation(
        &self,
        state: &BeaconState,
        attestation: &Attestation,
    ) -> Result<(), OperationInvalid>;
}

impl<V: OperationVerifier> OperationVerifier for Arc<V> {
    fn verify_proposer_slashing(
        &self,
        state: &BeaconState,
        slashing: &ProposerSlashing,
    ) -> Result<(), OperationInvalid> {
        (**self).verify_proposer_slashing(state, slashing)
    }

    fn verify_attestation(
        &self,
        state: &BeaconState,
        attestation: &Attestation,
    ) -> Result<(), OperationInvalid> {
        (**self).verify_attestation(state, attestation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipConfig {
    /// Whether attestations participate in the seen-cache. Slashings always
    /// do.
    pub attestation_cache: bool,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            attestation_cache: true,
        }
    }
}

/// Validates gossiped operations before they are handed on for processing
/// and re-broadcast.
pub struct GossipProcessor<S, V, B> {
    db: Arc<S>,
    verifier: V,
    broadcaster: B,
    config: GossipConfig,
    seen_slashings: Mutex<Box<dyn SeenCache>>,
    seen_attestations: Mutex<Box<dyn SeenCache>>,
    /// The state at the current head root, kept until the head moves or
    /// finality clears it.
    head_state: Mutex<Option<(Hash256, BeaconState)>>,
    tasks: TaskTracker,
    log: Logger,
}

impl<S, V, B> GossipProcessor<S, V, B>
where
    S: StateStore + HeadStore,
    V: OperationVerifier,
    B: Broadcaster,
{
    pub fn new(db: Arc<S>, verifier: V, broadcaster: B, tasks: TaskTracker, log: Logger) -> Self {
        Self {
            db,
            verifier,
            broadcaster,
            config: GossipConfig::default(),
            seen_slashings: Mutex::new(default_seen_cache()),
            seen_attestations: Mutex::new(default_seen_cache()),
            head_state: Mutex::new(None),
            tasks,
            log,
        }
    }

    pub fn with_config(mut self, config: GossipConfig) -> Self {
        self.config = config;
        self
    }

    /// Substitutes both seen-caches, e.g. for a bounded variant in tests.
    pub fn with_seen_caches(
        mut self,
        slashings: Box<dyn SeenCache>,
        attestations: Box<dyn SeenCache>,
    ) -> Self {
        self.seen_slashings = Mutex::new(slashings);
        self.seen_attestations = Mutex::new(attestations);
        self
    }

    /// Clears every per-finalized cache. Wired to the fork-choice
    /// finalization hook.
    pub fn clear_caches(&self) {
        self.seen_slashings.lock().clear();
        self.seen_attestations.lock().clear();
        *self.head_state.lock() = None;
    }

    /// Admission for a gossiped proposer slashing. The returned boolean is
    /// the forwarding verdict, not an error surface: `true` means the
    /// message was new, valid, and has been re-broadcast.
    pub fn validate_proposer_slashing(&self, slashing: &ProposerSlashing) -> bool {
        let _task = self.tasks.guard();

        let fingerprint = slashing.tree_hash_root();
        let invalid_key = cache_key(INVALID_PREFIX, fingerprint);
        let valid_key = cache_key(VALID_PREFIX, fingerprint);

        {
            let mut seen = self.seen_slashings.lock();
            if seen.contains(&invalid_key) || seen.contains(&valid_key) {
                return false;
            }
        }

        let state = match self.head_state_for_validation() {
            Some(state) => state,
            None => return false,
        };

        if let Err(e) = self.verifier.verify_proposer_slashing(&state, slashing) {
            warn!(
                self.log,
                "Received invalid proposer slashing";
                "proposer_index" => slashing.proposer_index,
                "error" => %e,
            );
            self.seen_slashings.lock().insert(invalid_key);
            return false;
        }
        self.seen_slashings.lock().insert(valid_key);

        if let Err(e) = self
            .broadcaster
            .broadcast(PubsubMessage::ProposerSlashing(Box::new(slashing.clone())))
        {
            error!(self.log, "Failed to propagate proposer slashing"; "error" => %e);
        }
        true
    }

    /// Admission for a gossiped attestation; same pipeline as proposer
    /// slashings, with the seen-cache participation gated by configuration.
    pub fn validate_attestation(&self, attestation: &Attestation) -> bool {
        let _task = self.tasks.guard();

        let fingerprint = attestation.tree_hash_root();
        let invalid_key = cache_key(INVALID_PREFIX, fingerprint);
        let valid_key = cache_key(VALID_PREFIX, fingerprint);

        if self.config.attestation_cache {
            let mut seen = self.seen_attestations.lock();
            if seen.contains(&invalid_key) || seen.contains(&valid_key) {
                return false;
            }
        }

        let state = match self.head_state_for_validation() {
            Some(state) => state,
            None => return false,
        };

        if let Err(e) = self.verifier.verify_attestation(&state, attestation) {
            warn!(
                self.log,
                "Received invalid attestation";
                "slot" => attestation.data.slot.as_u64(),
                "error" => %e,
            );
            if self.config.attestation_cache {
                self.seen_attestations.lock().insert(invalid_key);
            }
            return false;
        }
        if self.config.attestation_cache {
            self.seen_attestations.lock().insert(valid_key);
        }

        if let Err(e) = self
            .broadcaster
            .broadcast(PubsubMessage::Attestation(Box::new(attestation.clone())))
        {
            error!(self.log, "Failed to propagate attestation"; "error" => %e);
        }
        true
    }

    /// The head state, from the cache when the head has not moved.
    ///
    /// `None` covers both "no head yet" and store failures; neither verdict
    /// is cached because the condition is transient.
    fn head_state_for_validation(&self) -> Option<BeaconState> {
        let head_root = match self.db.head_block_root() {
            Ok(Some(root)) => root,
            Ok(None) => {
                debug!(self.log, "No head root yet; dropping gossip message");
                return None;
            }
            Err(e) => {
                error!(self.log, "Failed to read head root"; "error" => %e);
                return None;
            }
        };

        let mut cached = self.head_state.lock();
        if let Some((root, state)) = cached.as_ref() {
            if *root == head_root {
                return Some(state.clone());
            }
        }

        match self.db.state(head_root) {
            Ok(Some(state)) => {
                *cached = Some((head_root, state.clone()));
                Some(state)
            }
            Ok(None) => {
                debug!(
                    self.log,
                    "Head state not stored yet; dropping gossip message";
                    "head_root" => format!("{:?}", head_root),
                );
                None
            }
            Err(e) => {
                error!(self.log, "Failed to read head state"; "error" => %e);
                None
            }
        }
    }
}

fn cache_key(prefix: &[u8], fingerprint: Hash256) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 32);
    key.extend_from_slice(prefix);
    key.extend_from_slice(fingerprint.as_bytes());
    key
}
