use types::{Attestation, ProposerSlashing};

/// Messages that are published to peers after passing gossip validation.
#[derive(Debug, Clone, PartialEq)]
pub enum PubsubMessage {
    ProposerSlashing(Box<ProposerSlashing>),
    Attestation(Box<Attestation>),
}

#[derive(Debug)]
pub struct BroadcastError(pub String);

impl std::fmt::Display for BroadcastError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "broadcast failed: {}", self.0)
    }
}

/// The outbound edge to the p2p layer.
///
/// The core calls this at most once per accepted message. Failures are
/// logged by the caller and never retried; a lost broadcast may be
/// re-attempted only if the same message is received again after the
/// seen-cache evicts it.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, message: PubsubMessage) -> Result<(), BroadcastError>;
}

impl<B: Broadcaster> Broadcaster for std::sync::Arc<B> {
    fn broadcast(&self, message: PubsubMessage) -> Result<(), BroadcastError> {
        (**self).broadcast(message)
    }
}
