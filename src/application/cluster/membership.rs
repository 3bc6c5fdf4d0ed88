use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::application::config::network_type::NetworkType;
use crate::application::config::secret_key::SecretKey;

/// Everything the gossip layer needs to start cluster membership.
#[derive(Debug, Clone, Serialize)]
pub struct JoinRequest {
    /// Listen address for gossip.
    pub bind_address: String,

    /// Explicit gossip advertise address, if configured.
    pub advertise_address: Option<String>,

    /// Address this node advertises for gossip; peers equal to it were
    /// excluded from [`Self::peers`].
    pub self_address: String,

    pub store_api_address: String,
    pub query_api_address: Option<String>,

    /// Initial peers to contact.
    pub peers: Vec<String>,
    pub wait_if_empty: bool,

    pub gossip_interval: Option<Duration>,
    pub push_pull_interval: Option<Duration>,
    pub refresh_interval: Duration,

    #[serde(skip)]
    pub secret_key: Option<SecretKey>,
    pub network_type: NetworkType,
}

/// Handle to a started cluster membership.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterPeer {
    /// Unique name of this member within the cluster.
    pub name: String,
    pub join_request: JoinRequest,
}

impl ClusterPeer {
    pub fn advertise_address(&self) -> &str {
        &self.join_request.self_address
    }

    pub fn initial_peers(&self) -> &[String] {
        &self.join_request.peers
    }
}

/// The gossip protocol implementation that owns the membership lifecycle.
#[async_trait]
pub trait ClusterMembership {
    async fn join(&self, request: JoinRequest) -> anyhow::Result<ClusterPeer>;
}

/// Accepts every join request without starting any gossip. Used to inspect
/// what a node would join with.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunMembership;

#[async_trait]
impl ClusterMembership for DryRunMembership {
    async fn join(&self, request: JoinRequest) -> anyhow::Result<ClusterPeer> {
        let name = format!("{:016x}", rand::rng().random::<u64>());
        info!(
            "dry run: not starting gossip for member {} with {} initial peer(s)",
            name,
            request.peers.len()
        );

        Ok(ClusterPeer {
            name,
            join_request: request,
        })
    }
}
