//! Requests sent from [`NodeClient`](super::NodeClient) to the event loop.

use futures::channel::mpsc as stream_channel;
use libp2p::{
    kad::{Record, RecordKey},
    Multiaddr, PeerId,
};
use tokio::sync::oneshot;

use crate::{
    error::{
        BootstrapError, ConnectError, LookupError, PublishError, RoutingError, SubscribeError,
    },
    node::pubsub::GossipMessage,
    peer::PeerDescriptor,
};

pub(crate) type Reply<T> = oneshot::Sender<T>;

#[derive(Debug)]
pub(crate) enum Command {
    Dial {
        peer: PeerDescriptor,
        sender: Reply<Result<(), ConnectError>>,
    },
    AddAddresses {
        peer: PeerDescriptor,
        sender: Reply<()>,
    },
    ConnectedPeers {
        sender: Reply<Vec<PeerId>>,
    },
    Bootstrap {
        sender: Reply<Result<(), BootstrapError>>,
    },
    PutRecord {
        record: Record,
        sender: Reply<Result<(), RoutingError>>,
    },
    GetRecord {
        key: RecordKey,
        sender: Reply<Result<Vec<Record>, RoutingError>>,
    },
    StartProviding {
        key: RecordKey,
        sender: Reply<Result<(), LookupError>>,
    },
    /// Providers are streamed through `sender`, which is dropped once the
    /// query ends or `limit` providers were sent.
    GetProviders {
        key: RecordKey,
        limit: usize,
        sender: stream_channel::UnboundedSender<PeerDescriptor>,
    },
    Subscribe {
        topic: String,
        sender: Reply<Result<stream_channel::Receiver<GossipMessage>, SubscribeError>>,
    },
    Publish {
        topic: String,
        data: Vec<u8>,
        sender: Reply<Result<(), PublishError>>,
    },
    Topics {
        sender: Reply<Vec<String>>,
    },
    ListPeers {
        topic: String,
        sender: Reply<Vec<PeerId>>,
    },
    ListenAddrs {
        sender: Reply<Vec<Multiaddr>>,
    },
    Shutdown {
        sender: Reply<()>,
    },
}
