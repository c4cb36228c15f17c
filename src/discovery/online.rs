//! Online plugin search.
//!
//! Results are streamed as the remote produces them and stay live: install,
//! uninstall and download progress of a listed repository update its row
//! until the client disconnects.

use crate::core::types::changed;
use crate::core::{ErrorCode, Field, PluginId, Timestamp};
use crate::events::{EventSubscription, PluginEvent};
use crate::plugin::model::DownloadStatus;
use crate::plugin::registry::PluginRegistry;
use crate::remote::{folder_for_repo, normalize_repo, RemoteCandidate, RemoteSource};
use crate::stream::{live_list, ListItem, ListProducer, ListStream};
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One search result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OnlineEntry {
    /// Repository reference
    pub id: String,
    pub description: Option<String>,
    pub branch: Option<String>,
    pub stars: Option<u32>,
    pub updated_at: Option<Timestamp>,
    /// A plugin from this repository is installed
    pub installed: bool,
    /// Download in progress
    pub downloading: Option<DownloadStatus>,
}

impl OnlineEntry {
    fn from_candidate(candidate: RemoteCandidate, installed: bool) -> Self {
        Self {
            id: candidate.repo,
            description: candidate.description,
            branch: candidate.branch,
            stars: candidate.stars,
            updated_at: candidate.updated_at,
            installed,
            downloading: None,
        }
    }
}

/// Live fields of an `OnlineEntry`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OnlineEntryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed: Option<bool>,
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub downloading: Field<DownloadStatus>,
}

impl ListItem for OnlineEntry {
    type Key = String;
    type Patch = OnlineEntryPatch;

    fn key(&self) -> String {
        self.id.clone()
    }

    fn diff(&self, newer: &Self) -> Option<OnlineEntryPatch> {
        let patch = OnlineEntryPatch {
            installed: changed(&self.installed, &newer.installed),
            downloading: Field::change(&self.downloading, &newer.downloading),
        };
        (patch != OnlineEntryPatch::default()).then_some(patch)
    }

    fn apply(&mut self, patch: &OnlineEntryPatch) {
        if let Some(installed) = patch.installed {
            self.installed = installed;
        }
        patch.downloading.apply_to(&mut self.downloading);
    }
}

/// Searches a remote source on behalf of clients.
pub struct OnlineDiscovery {
    registry: Arc<PluginRegistry>,
    remote: Arc<dyn RemoteSource>,
}

impl OnlineDiscovery {
    /// Create a discovery service.
    pub fn new(registry: Arc<PluginRegistry>, remote: Arc<dyn RemoteSource>) -> Self {
        Self { registry, remote }
    }

    /// Start a search.
    ///
    /// Emits `Ready` once the remote has no more results, `Error` if the
    /// remote fails as a whole.
    pub fn search(&self, text: &str) -> ListStream<OnlineEntry> {
        let events = self.registry.bus().subscribe();
        let candidates = self.remote.search(text);
        let (producer, stream) = live_list(Vec::new());
        info!(query = text, "online search started");
        tokio::spawn(run_search(self.registry.clone(), candidates, events, producer));
        stream
    }
}

enum Outcome {
    Disconnected,
    SourceClosed,
    Failed(ErrorCode),
}

async fn run_search(
    registry: Arc<PluginRegistry>,
    mut candidates: BoxStream<'static, crate::core::Result<RemoteCandidate>>,
    mut events: EventSubscription,
    producer: ListProducer<OnlineEntry>,
) {
    let mut view = SearchView::default();
    let mut exhausted = false;
    let outcome = loop {
        tokio::select! {
            _ = producer.closed() => break Outcome::Disconnected,
            next = candidates.next(), if !exhausted => match next {
                Some(Ok(candidate)) => view.add(&registry, candidate, &producer),
                Some(Err(e)) if e.is_transient() => warn!(error = %e, "search result skipped"),
                Some(Err(e)) => {
                    warn!(error = %e, "online search failed");
                    break Outcome::Failed(e.code());
                }
                None => {
                    exhausted = true;
                    debug!(results = view.rows.len(), "online search exhausted");
                    producer.ready();
                }
            },
            event = events.recv() => match event {
                Some(event) => view.apply(&event, &producer),
                None => break Outcome::SourceClosed,
            },
        }
    };
    events.unsubscribe();
    match outcome {
        Outcome::Disconnected => debug!("online search released"),
        Outcome::SourceClosed => producer.end(),
        Outcome::Failed(code) => producer.error(code),
    }
}

struct Tracked {
    entry: OnlineEntry,
    repo: String,
    folder: PluginId,
}

#[derive(Default)]
struct SearchView {
    rows: BTreeMap<String, Tracked>,
}

impl SearchView {
    fn add(&mut self, registry: &PluginRegistry, candidate: RemoteCandidate, producer: &ListProducer<OnlineEntry>) {
        if self.rows.contains_key(&candidate.repo) {
            return;
        }
        let (repo, folder) = match (normalize_repo(&candidate.repo), folder_for_repo(&candidate.repo)) {
            (Ok(repo), Ok(folder)) => (repo, folder),
            (Err(e), _) | (_, Err(e)) => {
                warn!(repo = %candidate.repo, error = %e, "search result skipped");
                return;
            }
        };
        let installed_as = registry.folder_of_repo(&candidate.repo);
        let entry = OnlineEntry::from_candidate(candidate, installed_as.is_some());
        producer.add(entry.clone());
        self.rows.insert(
            entry.id.clone(),
            Tracked {
                entry,
                repo,
                folder: installed_as.unwrap_or(folder),
            },
        );
    }

    fn apply(&mut self, event: &PluginEvent, producer: &ListProducer<OnlineEntry>) {
        match event {
            PluginEvent::Installed(plugin) => {
                let declared = plugin.repo().and_then(|repo| normalize_repo(repo).ok());
                for row in self.rows.values_mut() {
                    if row.folder == plugin.id || declared.as_deref() == Some(row.repo.as_str()) {
                        row.folder = plugin.id.clone();
                        row.set(producer, |entry| entry.installed = true);
                    }
                }
            }
            PluginEvent::Uninstalled { id, .. } => self.for_folder(id, producer, |entry| entry.installed = false),
            PluginEvent::DownloadProgress { id, status } => {
                self.for_folder(id, producer, |entry| entry.downloading = status.clone())
            }
            _ => {}
        }
    }

    fn for_folder(&mut self, id: &PluginId, producer: &ListProducer<OnlineEntry>, edit: impl Fn(&mut OnlineEntry)) {
        for row in self.rows.values_mut().filter(|row| &row.folder == id) {
            row.set(producer, &edit);
        }
    }
}

impl Tracked {
    fn set(&mut self, producer: &ListProducer<OnlineEntry>, edit: impl Fn(&mut OnlineEntry)) {
        let mut newer = self.entry.clone();
        edit(&mut newer);
        if let Some(patch) = self.entry.diff(&newer) {
            producer.update(self.entry.id.clone(), patch);
            self.entry = newer;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::stream::{ListMirror, ListOp};
    use crate::testing::{drain_ops, installed, wait_for, FakeRemote, FakeRuntime, SearchHit};

    fn setup() -> (Arc<PluginRegistry>, Arc<FakeRemote>, OnlineDiscovery) {
        let registry = Arc::new(PluginRegistry::new(FakeRuntime::new(), EventBus::new(), 1));
        let remote = FakeRemote::new();
        let discovery = OnlineDiscovery::new(registry.clone(), remote.clone());
        (registry, remote, discovery)
    }

    fn hit(repo: &str) -> SearchHit {
        SearchHit::Found(RemoteCandidate::new(repo).with_description("a plugin"))
    }

    #[tokio::test]
    async fn test_results_then_ready() {
        let (registry, remote, discovery) = setup();
        registry.insert_installed(installed("acme-x", "1.0.0")).unwrap();
        remote.script_search(vec![hit("acme/x"), hit("acme/y"), hit("acme/x")], false);

        let mut stream = discovery.search("acme");
        let ops = drain_ops(&mut stream).await;
        assert_eq!(ops.len(), 3);
        match &ops[0] {
            ListOp::Add(entry) => {
                assert_eq!(entry.id, "acme/x");
                assert!(entry.installed);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(&ops[1], ListOp::Add(entry) if !entry.installed));
        assert_eq!(ops[2], ListOp::Ready);
        assert!(!stream.is_finished());
    }

    #[tokio::test]
    async fn test_transient_failures_are_skipped() {
        let (_registry, remote, discovery) = setup();
        remote.script_search(
            vec![hit("acme/x"), SearchHit::Transient("acme/bad".to_string()), hit("acme/y")],
            false,
        );

        let mut stream = discovery.search("acme");
        let ops = drain_ops(&mut stream).await;
        let added: Vec<_> = ops.iter().filter_map(|op| op.key()).collect();
        assert_eq!(added, vec!["acme/x".to_string(), "acme/y".to_string()]);
        assert_eq!(ops.last(), Some(&ListOp::Ready));
    }

    #[tokio::test]
    async fn test_fatal_failure_ends_with_error() {
        let (registry, remote, discovery) = setup();
        remote.script_search(vec![hit("acme/x"), SearchHit::Fatal("rate limited".to_string())], false);

        let stream = discovery.search("acme");
        let ops = stream.collect_until_end().await;
        assert_eq!(ops.last(), Some(&ListOp::Error(ErrorCode::RemoteFailed)));
        wait_for(|| registry.bus().listener_count() == 0).await;
    }

    #[tokio::test]
    async fn test_rows_follow_registry_events() {
        let (registry, remote, discovery) = setup();
        remote.script_search(vec![hit("acme/x")], false);

        let mut stream = discovery.search("acme");
        let mut mirror = ListMirror::from_snapshot(stream.snapshot());
        for op in drain_ops(&mut stream).await {
            mirror.apply(&op).unwrap();
        }

        let id = PluginId::new("acme-x");
        registry.report_download(&id, Some(DownloadStatus::Starting));
        for op in drain_ops(&mut stream).await {
            mirror.apply(&op).unwrap();
        }
        assert_eq!(
            mirror.get(&"acme/x".to_string()).unwrap().downloading,
            Some(DownloadStatus::Starting)
        );

        registry.insert_installed(installed("acme-x", "1.0.0")).unwrap();
        registry.report_download(&id, None);
        for op in drain_ops(&mut stream).await {
            mirror.apply(&op).unwrap();
        }
        let row = mirror.get(&"acme/x".to_string()).unwrap();
        assert!(row.installed);
        assert_eq!(row.downloading, None);

        registry.remove(&id).unwrap();
        for op in drain_ops(&mut stream).await {
            mirror.apply(&op).unwrap();
        }
        assert!(!mirror.get(&"acme/x".to_string()).unwrap().installed);
    }

    #[tokio::test]
    async fn test_installed_under_declared_repo() {
        let (registry, remote, discovery) = setup();
        remote.script_search(vec![hit("Acme/Widget")], false);
        let mut stream = discovery.search("widget");
        drain_ops(&mut stream).await;

        let mut plugin = installed("widget", "1.0.0");
        plugin.manifest.repo = Some("https://github.com/Acme/Widget.git".to_string());
        registry.insert_installed(plugin).unwrap();

        let ops = drain_ops(&mut stream).await;
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            ListOp::Update { key, patch } => {
                assert_eq!(key, "Acme/Widget");
                assert_eq!(patch.installed, Some(true));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disconnect_releases_listener() {
        let (registry, remote, discovery) = setup();
        remote.script_search(vec![hit("acme/x")], true);

        let stream = discovery.search("acme");
        assert_eq!(registry.bus().listener_count(), 1);
        stream.disconnect();
        wait_for(|| registry.bus().listener_count() == 0).await;
    }
}
