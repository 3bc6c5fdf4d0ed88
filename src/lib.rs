//! Peer discovery and advertise-address resolution for nodes joining a
//! gossip cluster.
//!
//! Before joining, a node needs to know which peers to contact first and
//! which of its own addresses the rest of the cluster can reach it on. The
//! [`cluster`](application::cluster) module computes both and hands them to a
//! [`ClusterMembership`](application::cluster::membership::ClusterMembership)
//! implementation, which owns the gossip protocol itself.

pub mod application;
pub mod util_types;

use anyhow::Result;
use tracing::info;

use crate::application::cluster::bootstrap::ClusterBootstrap;
use crate::application::cluster::membership::ClusterMembership;
use crate::application::cluster::membership::ClusterPeer;
use crate::application::config::cli_args::Args;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve advertise addresses and initial peers from `args`, then join the
/// cluster through `membership`.
pub async fn initialize<M>(args: Args, membership: &M) -> Result<ClusterPeer>
where
    M: ClusterMembership + Sync + ?Sized,
{
    info!("Starting cluster bootstrap v{}", VERSION);

    let bootstrap = ClusterBootstrap::from_args(&args);
    let peer = bootstrap
        .join(
            membership,
            args.wait_if_empty,
            args.http_advertise_address(),
            args.query_api,
        )
        .await?;

    info!(
        "Joined cluster as {} advertising {}",
        peer.name,
        peer.advertise_address()
    );
    Ok(peer)
}
