use std::borrow::Cow;
use std::path::PathBuf;
use std::time::Duration;

use itertools::Itertools;
use tracing::debug;
use tracing::warn;

use crate::util_types::retry::cancel_channel;
use crate::util_types::retry::retry;
use crate::util_types::retry::CancelReceiver;
use crate::util_types::retry::RetryError;

/// Time between two reads of a peers file that did not yet yield any peers.
pub const DEFAULT_PEERS_FILE_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Strategy for finding the initial set of peers to contact when joining the
/// gossip cluster.
///
/// Chosen once from configuration, see
/// [`Args::peer_discovery`](crate::application::config::cli_args::Args::peer_discovery).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerDiscovery {
    Static(StaticPeerList),
    File(FilePeerList),
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("resolving peers from file '{}' was aborted", .path.display())]
    PeersFileAborted {
        path: PathBuf,
        #[source]
        source: RetryError<PeersFileError>,
    },
}

/// Reasons a single read of the peers file did not produce a usable peer
/// list. All of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum PeersFileError {
    #[error("cannot read peers file: {0}")]
    Read(#[from] std::io::Error),

    #[error("peers file lists no peers other than this node")]
    NoPeers,
}

impl PeerDiscovery {
    pub fn static_list(peers: Vec<String>) -> Self {
        Self::Static(StaticPeerList::new(peers))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(FilePeerList::new(path))
    }

    /// Resolve the addresses to attempt joining, excluding `self_address`.
    ///
    /// If `wait_if_empty` is set and the peer list is backed by a file, this
    /// blocks until the file lists at least one other peer. There is no
    /// timeout; use [`Self::resolve_peers_until`] to bound the wait.
    pub async fn resolve_peers(
        &self,
        self_address: &str,
        wait_if_empty: bool,
    ) -> Result<Vec<String>, DiscoveryError> {
        match self {
            Self::Static(list) => Ok(list.resolve_peers(self_address)),
            Self::File(file) => file.resolve_peers(self_address, wait_if_empty).await,
        }
    }

    /// Like [`Self::resolve_peers`], but gives up waiting once `cancel`
    /// fires.
    pub async fn resolve_peers_until(
        &self,
        self_address: &str,
        wait_if_empty: bool,
        cancel: CancelReceiver,
    ) -> Result<Vec<String>, DiscoveryError> {
        match self {
            Self::Static(list) => Ok(list.resolve_peers(self_address)),
            Self::File(file) => {
                file.resolve_peers_until(self_address, wait_if_empty, cancel)
                    .await
            }
        }
    }
}

/// Peers fixed at startup, typically from `--cluster.peers`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StaticPeerList {
    peers: Vec<String>,
}

impl StaticPeerList {
    pub fn new(peers: Vec<String>) -> Self {
        Self { peers }
    }

    /// The configured peers verbatim and in their configured order, minus
    /// `self_address` and empty entries. Never waits: an empty list is
    /// returned as-is.
    pub fn resolve_peers(&self, self_address: &str) -> Vec<String> {
        exclude_self(self.peers.iter().map(String::as_str), self_address)
    }
}

/// Peers listed in a plain-text file, one `host:port` per line.
///
/// The file is read afresh on every resolution so that edits made after
/// startup are observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePeerList {
    path: PathBuf,
    retry_interval: Duration,
}

impl FilePeerList {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            retry_interval: DEFAULT_PEERS_FILE_RETRY_INTERVAL,
        }
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Read the peers from file, excluding `self_address`.
    ///
    /// With `wait_if_empty` unset, a single successful read is accepted even
    /// when it yields no peers. Otherwise the file is re-read every retry
    /// interval until it lists another peer. Read failures are always
    /// retried, regardless of `wait_if_empty`.
    ///
    /// The cancellation scope lives only for the duration of this call and
    /// is never fired, so with `wait_if_empty` set this can block forever.
    pub async fn resolve_peers(
        &self,
        self_address: &str,
        wait_if_empty: bool,
    ) -> Result<Vec<String>, DiscoveryError> {
        let (_cancel_tx, cancel_rx) = cancel_channel();
        self.resolve_peers_until(self_address, wait_if_empty, cancel_rx)
            .await
    }

    pub async fn resolve_peers_until(
        &self,
        self_address: &str,
        wait_if_empty: bool,
        cancel: CancelReceiver,
    ) -> Result<Vec<String>, DiscoveryError> {
        debug!("resolving cluster peers from {}", self.path.display());

        // TODO: a persistent error such as permission-denied is retried the
        // same way as a file that does not exist yet. Consider failing fast
        // on errors other than NotFound.
        retry(self.retry_interval, cancel, move || {
            self.read_peers(self_address, wait_if_empty)
        })
        .await
        .map_err(|source| DiscoveryError::PeersFileAborted {
            path: self.path.clone(),
            source,
        })
    }

    async fn read_peers(
        &self,
        self_address: &str,
        wait_if_empty: bool,
    ) -> Result<Vec<String>, PeersFileError> {
        let content = tokio::fs::read(&self.path).await?;
        let content = String::from_utf8_lossy(&content);
        if matches!(content, Cow::Owned(_)) {
            warn!(
                "peers file {} is not valid UTF-8; invalid bytes were replaced",
                self.path.display()
            );
        }

        // trimmed so that CRLF line endings behave like LF.
        let peers = exclude_self(content.lines().map(str::trim), self_address);

        if peers.is_empty() && wait_if_empty {
            return Err(PeersFileError::NoPeers);
        }

        Ok(peers)
    }
}

/// Keep non-empty candidates other than `self_address`, preserving order.
/// Duplicates are left for the gossip layer to deal with.
fn exclude_self<'a>(
    candidates: impl IntoIterator<Item = &'a str>,
    self_address: &str,
) -> Vec<String> {
    candidates
        .into_iter()
        .filter(|candidate| !candidate.is_empty() && *candidate != self_address)
        .map(str::to_owned)
        .collect_vec()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use proptest::collection::vec;
    use proptest::prop_assert;
    use proptest::prop_assert_eq;
    use proptest::prop_oneof;
    use proptest::strategy::Just;
    use proptest::strategy::Strategy;
    use tempfile::NamedTempFile;
    use test_strategy::proptest;
    use tracing_test::traced_test;

    use super::*;

    const SHORT: Duration = Duration::from_millis(20);

    fn peers_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn my_address_is_removed_from_file() {
        let file = peers_file("2.3.4.5:34\n1.2.3.4:23\n9.8.7.6:67\n");
        let subject = PeerDiscovery::file(file.path());

        let addresses = subject.resolve_peers("1.2.3.4:23", false).await.unwrap();

        assert_eq!(strings(&["2.3.4.5:34", "9.8.7.6:67"]), addresses);
    }

    #[tokio::test]
    async fn empty_file_does_not_wait() {
        let file = peers_file("");
        let subject = FilePeerList::new(file.path()).with_retry_interval(Duration::from_secs(60));

        let addresses = tokio::time::timeout(
            Duration::from_secs(5),
            subject.resolve_peers("not-used", false),
        )
        .await
        .expect("must not retry")
        .unwrap();

        assert!(addresses.is_empty());
    }

    #[tokio::test]
    async fn file_listing_only_self_does_not_wait_when_not_required() {
        let file = peers_file("1.2.3.4:23\n");
        let subject = FilePeerList::new(file.path());

        let addresses = subject.resolve_peers("1.2.3.4:23", false).await.unwrap();

        assert!(addresses.is_empty());
    }

    #[tokio::test]
    async fn waits_for_content() {
        let file = peers_file("");
        let path = file.path().to_path_buf();
        let subject = FilePeerList::new(&path).with_retry_interval(SHORT);

        let writer = tokio::spawn(async move {
            tokio::time::sleep(SHORT * 5).await;
            tokio::fs::write(&path, "2.3.4.5:34").await.unwrap();
        });

        let addresses = tokio::time::timeout(
            Duration::from_secs(10),
            subject.resolve_peers("not-used", true),
        )
        .await
        .expect("peers should have been found")
        .unwrap();

        writer.await.unwrap();
        assert_eq!(strings(&["2.3.4.5:34"]), addresses);
    }

    #[tokio::test]
    async fn waits_for_missing_file_to_appear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peers");
        let subject = FilePeerList::new(&path).with_retry_interval(SHORT);

        let writer = {
            let path = path.clone();
            tokio::spawn(async move {
                tokio::time::sleep(SHORT * 5).await;
                tokio::fs::write(&path, "\n10.0.0.7:10900\n").await.unwrap();
            })
        };

        // a missing file is retried even when waiting is not required.
        let addresses = tokio::time::timeout(
            Duration::from_secs(10),
            subject.resolve_peers("not-used", false),
        )
        .await
        .expect("file should have been read")
        .unwrap();

        writer.await.unwrap();
        assert_eq!(strings(&["10.0.0.7:10900"]), addresses);
    }

    #[tokio::test]
    async fn cancelled_wait_reports_last_error() {
        let file = peers_file("1.2.3.4:23\n");
        let subject = FilePeerList::new(file.path()).with_retry_interval(SHORT);
        let (cancel_tx, cancel_rx) = cancel_channel();

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(SHORT * 3).await;
            cancel_tx.send(()).unwrap();
        });

        let err = subject
            .resolve_peers_until("1.2.3.4:23", true, cancel_rx)
            .await
            .unwrap_err();

        canceller.await.unwrap();
        let DiscoveryError::PeersFileAborted { path, source } = err;
        assert_eq!(file.path(), path);
        assert!(matches!(source.last_error(), PeersFileError::NoPeers));
    }

    #[tokio::test]
    async fn file_changes_are_observed_between_calls() {
        let file = peers_file("10.0.0.1:1\n");
        let subject = PeerDiscovery::file(file.path());

        let first = subject.resolve_peers("self:1", false).await.unwrap();
        std::fs::write(file.path(), "10.0.0.2:2\n10.0.0.3:3\n").unwrap();
        let second = subject.resolve_peers("self:1", false).await.unwrap();

        assert_eq!(strings(&["10.0.0.1:1"]), first);
        assert_eq!(strings(&["10.0.0.2:2", "10.0.0.3:3"]), second);
    }

    #[tokio::test]
    async fn crlf_line_endings_are_accepted() {
        let file = peers_file("10.0.0.1:1\r\n\r\n10.0.0.2:2\r\n");
        let subject = FilePeerList::new(file.path());

        let addresses = subject.resolve_peers("10.0.0.2:2", false).await.unwrap();

        assert_eq!(strings(&["10.0.0.1:1"]), addresses);
    }

    #[traced_test]
    #[tokio::test]
    async fn invalid_utf8_does_not_block_resolution() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"10.0.0.1:1\n10.0.0.2:2\xff\n").unwrap();
        file.flush().unwrap();
        let subject = FilePeerList::new(file.path()).with_retry_interval(Duration::from_secs(60));

        let addresses = tokio::time::timeout(
            Duration::from_secs(5),
            subject.resolve_peers("self:1", false),
        )
        .await
        .expect("must not retry")
        .unwrap();

        assert_eq!(strings(&["10.0.0.1:1", "10.0.0.2:2\u{FFFD}"]), addresses);
        assert!(logs_contain("is not valid UTF-8"));
    }

    #[tokio::test]
    async fn static_entries_are_kept_verbatim() {
        let subject = PeerDiscovery::static_list(strings(&[" a:1", "b:2 ", "", "self:2"]));

        let addresses = subject.resolve_peers("self:2", false).await.unwrap();

        assert_eq!(strings(&[" a:1", "b:2 "]), addresses);
    }

    #[tokio::test]
    async fn static_list_excludes_self() {
        let subject = PeerDiscovery::static_list(strings(&["a:1", "self:2", "b:3"]));

        let addresses = subject.resolve_peers("self:2", true).await.unwrap();

        assert_eq!(strings(&["a:1", "b:3"]), addresses);
    }

    #[tokio::test]
    async fn static_list_without_self_is_unchanged() {
        let configured = strings(&["c:1", "a:2", "b:3", "a:2"]);
        let subject = PeerDiscovery::static_list(configured.clone());

        let addresses = subject.resolve_peers("self:2", false).await.unwrap();

        assert_eq!(configured, addresses);
    }

    #[tokio::test]
    async fn empty_static_list_never_waits() {
        let subject = PeerDiscovery::static_list(vec![]);
        let (_cancel_tx, cancel_rx) = cancel_channel();

        let addresses = subject
            .resolve_peers_until("self:2", true, cancel_rx)
            .await
            .unwrap();

        assert!(addresses.is_empty());
    }

    fn peer_line() -> impl Strategy<Value = String> {
        prop_oneof![
            Just(String::new()),
            Just("self:9".to_string()),
            (1u8..=254, 1u16..=u16::MAX).prop_map(|(octet, port)| format!("10.0.0.{octet}:{port}")),
        ]
    }

    #[proptest]
    fn exclude_self_keeps_order_of_remaining_entries(
        #[strategy(vec(peer_line(), 0..20))] lines: Vec<String>,
    ) {
        let resolved = exclude_self(lines.iter().map(String::as_str), "self:9");

        let expected = lines
            .iter()
            .filter(|line| !line.is_empty() && *line != "self:9")
            .cloned()
            .collect_vec();
        prop_assert_eq!(expected, resolved.clone());
        prop_assert!(!resolved.iter().any(|peer| peer == "self:9" || peer.is_empty()));
    }

    #[proptest(cases = 16)]
    fn file_resolution_matches_line_filter(
        #[strategy(vec(peer_line(), 1..10))] lines: Vec<String>,
    ) {
        let file = peers_file(&lines.join("\n"));
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let resolved = runtime
            .block_on(FilePeerList::new(file.path()).resolve_peers("self:9", false))
            .unwrap();

        prop_assert_eq!(exclude_self(lines.iter().map(String::as_str), "self:9"), resolved);
    }
}
