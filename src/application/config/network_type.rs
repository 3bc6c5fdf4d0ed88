use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use strum::EnumIter;
use strum::IntoEnumIterator;

/// Named profile describing the latency characteristics of the network the
/// gossip cluster runs on. The gossip layer picks its default timings from
/// this profile.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, Default, EnumIter)]
pub enum NetworkType {
    /// All members on one host.
    Local,

    /// Members share a local area network.
    #[default]
    Lan,

    /// Members communicate across a wide area network.
    Wan,
}

impl NetworkType {
    /// Comma-separated list of accepted names, for help texts and errors.
    pub fn variants_list() -> String {
        Self::iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = match self {
            NetworkType::Local => "local",
            NetworkType::Lan => "lan",
            NetworkType::Wan => "wan",
        };
        write!(f, "{}", string)
    }
}

impl FromStr for NetworkType {
    type Err = String;
    fn from_str(input: &str) -> Result<NetworkType, Self::Err> {
        match input {
            "local" => Ok(NetworkType::Local),
            "lan" => Ok(NetworkType::Lan),
            "wan" => Ok(NetworkType::Wan),
            _ => Err(format!(
                "Failed to parse '{}' as network type, expected one of: {}",
                input,
                Self::variants_list()
            )),
        }
    }
}
