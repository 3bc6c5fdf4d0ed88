use std::path::Path;

use clap::Parser;
use cluster_bootstrap::application::config::cli_args::Args;

pub struct TestNode;

impl TestNode {
    /// Arguments with explicit advertise addresses for every service, so
    /// results do not depend on the interfaces of the machine running the
    /// tests.
    pub fn args_with(extra: &[&str]) -> Args {
        let fixed = [
            "cluster-bootstrap",
            "--cluster.advertise-address",
            "192.0.2.1:10900",
            "--grpc-advertise-address",
            "192.0.2.1:10901",
        ];
        Args::parse_from(fixed.iter().chain(extra.iter()).copied())
    }

    pub fn args_with_peers_file(path: &Path, extra: &[&str]) -> Args {
        let path = path.to_str().expect("temp path is valid UTF-8");
        let mut all = vec!["--cluster.peers-file", path];
        all.extend_from_slice(extra);
        Self::args_with(&all)
    }
}
