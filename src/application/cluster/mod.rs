//! Everything needed before a node can join the gossip cluster: the peers to
//! contact first and the addresses to advertise to them.

pub mod advertise;
pub mod bootstrap;
pub mod discovery;
pub mod membership;
