//! Computing the address other cluster members should use to reach a
//! service of this node.
//!
//! A node binds its listeners to some address, often the wildcard address.
//! That address is of no use to a peer on another host, so before joining
//! the cluster the node works out a concrete `host:port` to advertise,
//! either from an explicit override or from a local private IP. The result
//! may still be unroutable (e.g. loopback), which [`is_unroutable`] detects
//! so the caller can warn about it.

use std::fmt;
use std::io;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::UdpSocket;

use tracing::debug;

/// Destination used to pick the interface that routes to private networks.
/// Connecting a UDP socket sends nothing; it only consults the routing table.
const PRIVATE_NETWORK_PROBE: (Ipv4Addr, u16) = (Ipv4Addr::new(10, 255, 255, 255), 1);

/// A concrete `host:port` advertised to the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdvertiseAddress {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for AdvertiseAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    #[error("missing port in address")]
    MissingPort,

    #[error("missing host in address")]
    MissingHost,

    #[error("too many colons in address")]
    TooManyColons,

    #[error("invalid port '{0}'")]
    InvalidPort(String),

    #[error("host '{0}' is not an IP address")]
    NotAnIp(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AdvertiseError {
    #[error("failed to parse advertise address '{address}'")]
    InvalidAdvertiseAddress {
        address: String,
        #[source]
        source: AddressParseError,
    },

    #[error("failed to parse bind address '{address}'")]
    InvalidBindAddress {
        address: String,
        #[source]
        source: AddressParseError,
    },

    #[error("failed to get private IP")]
    LocalIp(#[source] io::Error),

    #[error("no private IP found, explicit advertise address not provided")]
    NoPrivateIp,
}

/// Source of a concrete local IP to substitute for a wildcard bind address.
pub trait LocalIpSource {
    /// A private IP of this host, `None` if there is none.
    fn private_ip(&self) -> io::Result<Option<IpAddr>>;
}

/// Finds the private IP of the interface the host would use to reach a
/// private network.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutboundInterface;

impl LocalIpSource for OutboundInterface {
    fn private_ip(&self) -> io::Result<Option<IpAddr>> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        if let Err(e) = socket.connect(PRIVATE_NETWORK_PROBE) {
            debug!("no route towards a private network: {}", e);
            return Ok(None);
        }

        match socket.local_addr()?.ip() {
            IpAddr::V4(ip) if ip.is_private() => Ok(Some(IpAddr::V4(ip))),
            other => {
                debug!("outbound interface address {} is not private", other);
                Ok(None)
            }
        }
    }
}

/// Always yields the same IP. For hosts where the private IP is known up
/// front, and for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedLocalIp(pub Option<IpAddr>);

impl LocalIpSource for FixedLocalIp {
    fn private_ip(&self) -> io::Result<Option<IpAddr>> {
        Ok(self.0)
    }
}

/// Work out the address to advertise for a service bound to `bind_address`.
///
/// A non-empty `advertise_address` is used as given, hostnames included.
/// Otherwise the bind address must have an IP host; a wildcard IP is
/// replaced with a private IP obtained from `local_ip`.
pub fn calculate_advertise_address(
    bind_address: &str,
    advertise_address: Option<&str>,
    local_ip: &impl LocalIpSource,
) -> Result<AdvertiseAddress, AdvertiseError> {
    if let Some(advertise_address) = advertise_address.filter(|addr| !addr.is_empty()) {
        return parse_host_port(advertise_address).map_err(|source| {
            AdvertiseError::InvalidAdvertiseAddress {
                address: advertise_address.to_owned(),
                source,
            }
        });
    }

    let invalid_bind = |source| AdvertiseError::InvalidBindAddress {
        address: bind_address.to_owned(),
        source,
    };
    let AdvertiseAddress { host, port } = parse_host_port(bind_address).map_err(invalid_bind)?;
    let bind_ip = host
        .parse::<IpAddr>()
        .map_err(|_| invalid_bind(AddressParseError::NotAnIp(host.clone())))?
        .to_canonical();

    if !bind_ip.is_unspecified() {
        return Ok(AdvertiseAddress {
            host: bind_ip.to_string(),
            port,
        });
    }

    let private_ip = local_ip
        .private_ip()
        .map_err(AdvertiseError::LocalIp)?
        .ok_or(AdvertiseError::NoPrivateIp)?;
    debug!(
        "bind address {} is a wildcard, substituting private IP {}",
        bind_address, private_ip
    );

    Ok(AdvertiseAddress {
        host: private_ip.to_string(),
        port,
    })
}

/// Whether other hosts generally cannot reach `address`.
///
/// Accepts `host:port` or a bare host. Pure: no name resolution, no probing.
pub fn is_unroutable(address: &str) -> bool {
    let host = split_host_port(address)
        .map(|(host, _)| host)
        .unwrap_or(address);
    let host = host.trim_start_matches('[').trim_end_matches(']');

    match host.parse::<IpAddr>() {
        Ok(ip) => ip_is_unroutable(ip.to_canonical()),
        Err(_) => host.eq_ignore_ascii_case("localhost"),
    }
}

fn ip_is_unroutable(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ip) => ip.is_unspecified() || ip.is_loopback() || ip.is_link_local(),
        IpAddr::V6(ip) => ip.is_unspecified() || ip.is_loopback() || ip.is_unicast_link_local(),
    }
}

fn parse_host_port(address: &str) -> Result<AdvertiseAddress, AddressParseError> {
    let (host, port) = split_host_port(address)?;
    if host.is_empty() {
        return Err(AddressParseError::MissingHost);
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| AddressParseError::InvalidPort(port.to_owned()))?;

    Ok(AdvertiseAddress {
        host: host.to_owned(),
        port,
    })
}

/// Split `host:port` or `[ipv6]:port`. Brackets are stripped from the host.
fn split_host_port(address: &str) -> Result<(&str, &str), AddressParseError> {
    if let Some(rest) = address.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or(AddressParseError::MissingPort)?;
        let port = after
            .strip_prefix(':')
            .ok_or(AddressParseError::MissingPort)?;
        return Ok((host, port));
    }

    let (host, port) = address
        .rsplit_once(':')
        .ok_or(AddressParseError::MissingPort)?;
    if host.contains(':') {
        return Err(AddressParseError::TooManyColons);
    }
    Ok((host, port))
}
