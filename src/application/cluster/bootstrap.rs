use std::time::Duration;

use tracing::error;
use tracing::info;
use tracing::warn;

use super::advertise::calculate_advertise_address;
use super::advertise::is_unroutable;
use super::advertise::AdvertiseAddress;
use super::advertise::AdvertiseError;
use super::advertise::LocalIpSource;
use super::advertise::OutboundInterface;
use super::discovery::DiscoveryError;
use super::discovery::PeerDiscovery;
use super::membership::ClusterMembership;
use super::membership::ClusterPeer;
use super::membership::JoinRequest;
use crate::application::config::cli_args::Args;
use crate::application::config::network_type::NetworkType;
use crate::application::config::secret_key::SecretKey;

/// A service whose address is advertised through gossip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum AdvertisedService {
    #[strum(to_string = "gossip")]
    Gossip,

    #[strum(to_string = "gRPC StoreAPI")]
    StoreApi,

    #[strum(to_string = "HTTP QueryAPI")]
    QueryApi,
}

impl AdvertisedService {
    /// The flags an operator should look at when the advertised address is
    /// unroutable.
    fn flag_hint(self) -> &'static str {
        match self {
            Self::Gossip => {
                "provide --cluster.address as routable ip:port or --cluster.advertise-address as a routable host:port"
            }
            Self::StoreApi => {
                "provide --grpc-address as routable ip:port or --grpc-advertise-address as a routable host:port"
            }
            Self::QueryApi => {
                "provide --http-address as routable ip:port or --http-advertise-address as a routable host:port"
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("calculate advertise {service} address for gossip based on bind address: '{bind_address}' and advertise address: '{advertise_address}'")]
    AdvertiseAddress {
        service: AdvertisedService,
        bind_address: String,
        advertise_address: String,
        #[source]
        source: AdvertiseError,
    },

    #[error("resolving initial cluster peers")]
    Discovery(#[from] DiscoveryError),

    #[error("joining the gossip cluster")]
    Join(#[source] anyhow::Error),
}

/// Cluster configuration captured at startup, ready to join the gossip
/// cluster once the caller knows which of its services are enabled.
#[derive(Debug, Clone)]
pub struct ClusterBootstrap<L = OutboundInterface> {
    grpc_address: String,
    grpc_advertise_address: Option<String>,
    http_address: String,
    cluster_address: String,
    cluster_advertise_address: Option<String>,
    discovery: PeerDiscovery,
    gossip_interval: Option<Duration>,
    push_pull_interval: Option<Duration>,
    refresh_interval: Duration,
    secret_key: Option<SecretKey>,
    network_type: NetworkType,
    local_ip: L,
}

impl ClusterBootstrap {
    pub fn from_args(args: &Args) -> Self {
        Self {
            grpc_address: args.grpc_address.clone(),
            grpc_advertise_address: args.grpc_advertise_address.clone(),
            http_address: args.http_address.clone(),
            cluster_address: args.cluster_address.clone(),
            cluster_advertise_address: args.cluster_advertise_address.clone(),
            discovery: args.peer_discovery(),
            gossip_interval: args.gossip_interval,
            push_pull_interval: args.push_pull_interval,
            refresh_interval: args.refresh_interval,
            secret_key: args.secret_key.clone(),
            network_type: args.network_type,
            local_ip: OutboundInterface,
        }
    }
}

impl<L: LocalIpSource> ClusterBootstrap<L> {
    /// Replace the way wildcard bind addresses are turned into concrete IPs.
    pub fn with_local_ip_source<M: LocalIpSource>(self, local_ip: M) -> ClusterBootstrap<M> {
        ClusterBootstrap {
            grpc_address: self.grpc_address,
            grpc_advertise_address: self.grpc_advertise_address,
            http_address: self.http_address,
            cluster_address: self.cluster_address,
            cluster_advertise_address: self.cluster_advertise_address,
            discovery: self.discovery,
            gossip_interval: self.gossip_interval,
            push_pull_interval: self.push_pull_interval,
            refresh_interval: self.refresh_interval,
            secret_key: self.secret_key,
            network_type: self.network_type,
            local_ip,
        }
    }

    /// Resolve advertise addresses and initial peers, then join the cluster
    /// through `membership`.
    ///
    /// The HTTP QueryAPI address is only computed when `query_api_enabled`;
    /// otherwise `http_advertise_address` is passed on untouched.
    ///
    /// With `wait_if_empty` set and a peers file configured, this waits until
    /// the file lists another peer.
    pub async fn join<M>(
        &self,
        membership: &M,
        wait_if_empty: bool,
        http_advertise_address: Option<&str>,
        query_api_enabled: bool,
    ) -> Result<ClusterPeer, BootstrapError>
    where
        M: ClusterMembership + Sync + ?Sized,
    {
        let self_address = self.advertise(
            AdvertisedService::Gossip,
            &self.cluster_address,
            self.cluster_advertise_address.as_deref(),
        )?;

        let store_api_address = self.advertise(
            AdvertisedService::StoreApi,
            &self.grpc_address,
            self.grpc_advertise_address.as_deref(),
        )?;
        info!(
            "StoreAPI address that will be propagated through gossip: {}",
            store_api_address
        );

        let http_advertise_address = http_advertise_address.filter(|addr| !addr.is_empty());
        let query_api_address = if query_api_enabled {
            let address = self.advertise(
                AdvertisedService::QueryApi,
                &self.http_address,
                http_advertise_address,
            )?;
            info!(
                "QueryAPI address that will be propagated through gossip: {}",
                address
            );
            Some(address.to_string())
        } else {
            http_advertise_address.map(str::to_owned)
        };

        let self_address = self_address.to_string();
        let peers = self
            .discovery
            .resolve_peers(&self_address, wait_if_empty)
            .await?;
        info!("resolved {} initial cluster peer(s)", peers.len());

        let request = JoinRequest {
            bind_address: self.cluster_address.clone(),
            advertise_address: self.cluster_advertise_address.clone(),
            self_address,
            store_api_address: store_api_address.to_string(),
            query_api_address,
            peers,
            wait_if_empty,
            gossip_interval: self.gossip_interval,
            push_pull_interval: self.push_pull_interval,
            refresh_interval: self.refresh_interval,
            secret_key: self.secret_key.clone(),
            network_type: self.network_type,
        };

        membership.join(request).await.map_err(BootstrapError::Join)
    }

    /// Compute the advertise address of one service, warning if other hosts
    /// are unlikely to reach it.
    fn advertise(
        &self,
        service: AdvertisedService,
        bind_address: &str,
        advertise_address: Option<&str>,
    ) -> Result<AdvertiseAddress, BootstrapError> {
        let address = calculate_advertise_address(bind_address, advertise_address, &self.local_ip)
            .map_err(|source| {
                let advertise_address = advertise_address.unwrap_or_default();
                error!(
                    "fatal: cannot compute advertise {} address from bind address '{}' and advertise address '{}': {}",
                    service, bind_address, advertise_address, source
                );
                BootstrapError::AdvertiseAddress {
                    service,
                    bind_address: bind_address.to_owned(),
                    advertise_address: advertise_address.to_owned(),
                    source,
                }
            })?;

        if is_unroutable(&address.to_string()) {
            warn!(
                "this component advertises its {} on an unroutable address {}. This will not work cross-cluster",
                service, address
            );
            warn!("{}", service.flag_hint());
        }

        Ok(address)
    }
}
