//! Error types for the overlay crate.
//!
//! Errors local to one unit of fan-out work (a seed host, a discovered peer)
//! are logged and swallowed by the callers; the types below still describe
//! them so the logs and test doubles speak the same language.

use std::time::Duration;

use libp2p::PeerId;
use thiserror::Error;

/// A routing record failed the content-addressing rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("malformed record key {0:?}: missing namespace separator")]
    MalformedKey(String),

    #[error("invalid record namespace {0:?}")]
    InvalidNamespace(String),

    #[error("value does not hash to the key: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("invalid public key record: {0}")]
    InvalidPublicKey(String),

    #[error("public key belongs to {actual}, not {expected}")]
    KeyMismatch { expected: String, actual: String },

    #[error("no candidate values to select from")]
    NoCandidates,

    #[error("none of the candidate values is valid")]
    NoValidCandidate,
}

/// A bootstrap address could not be turned into a peer descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid address {input:?}: {reason}")]
    InvalidAddress { input: String, reason: String },

    #[error("address {0:?} has no peer identity component")]
    MissingIdentity(String),
}

/// A DNS or provider lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("DNS lookup for {host} failed: {reason}")]
    Dns { host: String, reason: String },

    #[error("routing query failed: {0}")]
    Query(String),

    #[error("node is shut down")]
    Closed,
}

/// A connection attempt to a peer failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("connecting to {peer} timed out after {after:?}")]
    Timeout { peer: PeerId, after: Duration },

    #[error("connecting to {peer} failed: {reason}")]
    Transport { peer: PeerId, reason: String },

    #[error("node is shut down")]
    Closed,
}

/// A key/value operation against the routing store failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("record store rejected the record: {0}")]
    Store(String),

    #[error("put failed: {0}")]
    Put(String),

    #[error("no value found for {0:?}")]
    NotFound(String),

    #[error("node is shut down")]
    Closed,
}

/// Joining the routing network failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BootstrapError {
    #[error("no bootstrap peers available")]
    NoPeers,

    #[error("invalid configured bootstrap peer: {0}")]
    InvalidPeer(#[from] ParseError),

    #[error("none of the {attempted} bootstrap peers could be reached")]
    Unreachable { attempted: usize },

    #[error("routing table bootstrap failed: {0}")]
    RoutingTable(String),

    #[error("node is shut down")]
    Closed,
}

/// Subscribing to a pub/sub topic failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscribeError {
    #[error("failed to subscribe to topic {topic}: {reason}")]
    Transport { topic: String, reason: String },

    #[error("node is shut down")]
    Closed,
}

/// Publishing to a pub/sub topic failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("failed to publish to topic {topic}: {reason}")]
    Transport { topic: String, reason: String },

    #[error("node is shut down")]
    Closed,
}

/// Errors from the on-disk routing record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::DatabaseError> for StoreError {
    fn from(err: redb::DatabaseError) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(err: redb::TransactionError) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(err: redb::TableError) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(err: redb::StorageError) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(err: redb::CommitError) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Node lifecycle failures.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("failed to initialise host: {0}")]
    HostInit(String),

    #[error("failed to open routing store: {0}")]
    StoreOpen(String),

    #[error("failed to initialise routing: {0}")]
    RoutingInit(String),

    #[error("bootstrap failed: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("shutdown failed: {0}")]
    Shutdown(String),
}

impl From<StoreError> for NodeError {
    fn from(err: StoreError) -> Self {
        NodeError::StoreOpen(err.to_string())
    }
}
