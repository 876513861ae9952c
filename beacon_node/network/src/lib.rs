//! The network-facing edge of the fork-choice core: gossip admission for
//! proposer slashings and attestations, the length-delimited SSZ wire
//! encoder, the initial-sync block importer and the service health check.
//!
//! Transport itself (peer management, pubsub) lives elsewhere; this crate
//! only consumes a [`Broadcaster`] sink and exposes validation callbacks.

pub mod encoder;
pub mod gossip_processor;
pub mod pubsub;
pub mod seen_cache;
pub mod service;
pub mod sync;

pub use encoder::{EncoderError, Encoding, NetworkEncoder};
pub use gossip_processor::{GossipConfig, GossipProcessor, OperationInvalid, OperationVerifier};
pub use pubsub::{BroadcastError, Broadcaster, PubsubMessage};
pub use seen_cache::SeenCache;
pub use service::{Service, ServiceConfig, ServiceError, TaskTracker};
pub use sync::{import_chain, SyncError};
