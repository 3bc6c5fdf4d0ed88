use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use super::network_type::NetworkType;
use super::secret_key::SecretKey;
use crate::application::cluster::discovery::PeerDiscovery;

/// The `cluster-bootstrap` command-line program resolves the initial peers
/// and advertise addresses of a node and hands them to the gossip layer.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct Args {
    /// Listen ip:port address for gRPC endpoints (StoreAPI).
    ///
    /// Make sure this address is routable from other components if you use
    /// gossip, `--grpc-advertise-address` is empty and you require cross-node
    /// connection.
    #[clap(long, default_value = "0.0.0.0:10901", value_name = "ADDR")]
    pub grpc_address: String,

    /// Explicit (external) host:port address to advertise for the gRPC
    /// StoreAPI in the gossip cluster. If empty, `--grpc-address` is used.
    #[clap(long, value_name = "ADDR")]
    pub grpc_advertise_address: Option<String>,

    /// Listen host:port for HTTP endpoints.
    #[clap(long, default_value = "0.0.0.0:10902", value_name = "ADDR")]
    pub http_address: String,

    /// Explicit (external) host:port address to advertise for the HTTP
    /// QueryAPI in the gossip cluster. If empty, `--http-address` is used.
    #[clap(long, value_name = "ADDR")]
    pub http_advertise_address: Option<String>,

    /// Whether this process serves the HTTP QueryAPI. Only then is an
    /// advertise address computed for it.
    #[clap(long)]
    pub query_api: bool,

    /// Listen ip:port address for the gossip cluster.
    #[clap(long = "cluster.address", default_value = "0.0.0.0:10900", value_name = "ADDR")]
    pub cluster_address: String,

    /// Explicit (external) ip:port address to advertise for gossip in the
    /// gossip cluster. Used internally for membership only.
    #[clap(long = "cluster.advertise-address", value_name = "ADDR")]
    pub cluster_advertise_address: Option<String>,

    /// Initial peers to join the cluster. It can be either <ip:port>, or
    /// <domain:port>. A lookup resolution is done only at the startup.
    ///
    /// E.g.: --cluster.peers 10.0.0.1:10900 --cluster.peers 10.0.0.2:10900
    #[clap(long = "cluster.peers", value_name = "ADDR")]
    pub peers: Vec<String>,

    /// File containing a list of peers, one on each line, to join the
    /// cluster. Each peer should be in the format <ip:port>.
    ///
    /// Takes precedence over `--cluster.peers`. The file is re-read on every
    /// resolution, so it may be populated after startup.
    #[clap(long = "cluster.peers-file", value_name = "FILE")]
    pub peers_file: Option<PathBuf>,

    /// Block startup until at least one peer other than this node is known.
    #[clap(long = "cluster.wait-if-empty")]
    pub wait_if_empty: bool,

    /// Interval between sending gossip messages.
    ///
    /// By lowering this value (more frequent) gossip messages are propagated
    /// across the cluster more quickly at the expense of increased bandwidth.
    /// Default is used from the specified network type.
    #[clap(long = "cluster.gossip-interval", value_parser = humantime::parse_duration, value_name = "DURATION")]
    pub gossip_interval: Option<Duration>,

    /// Interval for gossip state syncs.
    ///
    /// Setting this interval lower (more frequent) will increase convergence
    /// speeds across larger clusters at the expense of increased bandwidth
    /// usage. Default is used from the specified network type.
    #[clap(long = "cluster.pushpull-interval", value_parser = humantime::parse_duration, value_name = "DURATION")]
    pub push_pull_interval: Option<Duration>,

    /// Interval for membership to refresh `--cluster.peers` or
    /// `--cluster.peers-file` state, 0s disables refresh.
    #[clap(long = "cluster.refresh-interval", default_value = "1m", value_parser = humantime::parse_duration, value_name = "DURATION")]
    pub refresh_interval: Duration,

    /// Initial secret key to encrypt cluster gossip. Can be one of AES-128,
    /// AES-192, or AES-256 in hexadecimal format.
    #[clap(long = "cluster.secret-key", value_name = "HEX")]
    pub secret_key: Option<SecretKey>,

    /// Network type with predefined peers configurations. Sets of
    /// configurations accounting the latency differences between network
    /// types: local, lan, wan.
    #[clap(long = "cluster.network-type", default_value = "lan", value_name = "TYPE")]
    pub network_type: NetworkType,

    /// Enable tokio tracing for consumption by the tokio-console application
    /// note: this will attempt to connect to localhost:6669
    #[clap(long, name = "tokio-console", default_value = "false")]
    pub tokio_console: bool,
}

impl Default for Args {
    fn default() -> Self {
        let empty: Vec<String> = vec![];
        Self::parse_from(empty)
    }
}

impl Args {
    /// Select the peer discovery strategy. A peers file wins over a static
    /// peer list.
    pub fn peer_discovery(&self) -> PeerDiscovery {
        match &self.peers_file {
            Some(path) => PeerDiscovery::file(path.clone()),
            None => PeerDiscovery::static_list(self.peers.clone()),
        }
    }

    /// The HTTP advertise override, if one was given and is non-empty.
    pub fn http_advertise_address(&self) -> Option<&str> {
        self.http_advertise_address
            .as_deref()
            .filter(|addr| !addr.is_empty())
    }
}
