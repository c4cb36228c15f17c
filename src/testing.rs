//! Test doubles shared by unit tests.

use crate::core::sync::lock;
use crate::core::{Error, PluginId, Result};
use crate::plugin::model::{AvailablePlugin, ConfigFields, DownloadStatus, InstalledPlugin, PluginManifest};
use crate::plugin::registry::PluginRegistry;
use crate::plugin::runtime::{PluginRuntime, MANIFEST_FILE};
use crate::plugin::version::PluginVersion;
use crate::remote::{FetchRequest, ProgressFn, RemoteCandidate, RemoteDescriptor, RemoteSource, RepoInfo};
use crate::stream::{ListItem, ListOp, ListStream};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

/// Stopped, disabled plugin at `version`.
pub(crate) fn installed(id: &str, version: &str) -> InstalledPlugin {
    let version = PluginVersion::parse(version).unwrap();
    InstalledPlugin::new(PluginId::new(id), PluginManifest::new(version), 1)
}

/// Poll `condition` until it holds.
pub(crate) async fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

/// Every operation the producer emits before going quiet.
pub(crate) async fn drain_ops<T: ListItem>(stream: &mut ListStream<T>) -> Vec<ListOp<T>> {
    let mut ops = Vec::new();
    while let Ok(Some(op)) = tokio::time::timeout(Duration::from_millis(100), stream.next_op()).await {
        ops.push(op);
    }
    ops
}

/// Observed runtime interaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum RuntimeCall {
    Enable(PluginId),
    Disable(PluginId),
    Poll {
        id: PluginId,
        running: bool,
        folder_present: bool,
    },
}

#[derive(Default)]
struct RuntimeState {
    installed: Vec<InstalledPlugin>,
    builtins: Vec<AvailablePlugin>,
    fields: HashMap<PluginId, ConfigFields>,
    running: HashSet<PluginId>,
    calls: Vec<RuntimeCall>,
    disable_requests: HashMap<PluginId, u32>,
    auto_start: bool,
    stop_after: Option<u32>,
}

/// In-memory runtime. Starts plugins on enable when `auto_start` is set
/// and stops them after a configurable number of disable requests.
pub(crate) struct FakeRuntime {
    state: Mutex<RuntimeState>,
    registry: Mutex<Weak<PluginRegistry>>,
    plugins_dir: Mutex<Option<PathBuf>>,
}

impl FakeRuntime {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(RuntimeState {
                stop_after: Some(1),
                ..Default::default()
            }),
            registry: Mutex::new(Weak::new()),
            plugins_dir: Mutex::new(None),
        })
    }

    /// Route start/stop notifications to `registry`.
    pub(crate) fn attach(&self, registry: &Arc<PluginRegistry>) {
        *lock(&self.registry) = Arc::downgrade(registry);
    }

    /// Record folder presence on every poll.
    pub(crate) fn watch_dir(&self, dir: &Path) {
        *lock(&self.plugins_dir) = Some(dir.to_path_buf());
    }

    pub(crate) fn seed_installed(&self, plugin: InstalledPlugin) {
        lock(&self.state).installed.push(plugin);
    }

    pub(crate) fn seed_builtin(&self, plugin: AvailablePlugin) {
        lock(&self.state).builtins.push(plugin);
    }

    pub(crate) fn seed_fields(&self, id: &str, fields: ConfigFields) {
        lock(&self.state).fields.insert(PluginId::new(id), fields);
    }

    pub(crate) fn auto_start(&self) {
        lock(&self.state).auto_start = true;
    }

    /// Stop after `requests` disable requests; `None` never stops.
    pub(crate) fn stop_after(&self, requests: Option<u32>) {
        lock(&self.state).stop_after = requests;
    }

    pub(crate) fn calls(&self) -> Vec<RuntimeCall> {
        lock(&self.state).calls.clone()
    }

    pub(crate) fn disable_requests(&self, id: &str) -> u32 {
        lock(&self.state)
            .disable_requests
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    fn registry(&self) -> Option<Arc<PluginRegistry>> {
        lock(&self.registry).upgrade()
    }
}

#[async_trait]
impl PluginRuntime for FakeRuntime {
    async fn list_installed(&self) -> Result<Vec<InstalledPlugin>> {
        Ok(lock(&self.state).installed.clone())
    }

    async fn list_available_builtins(&self) -> Result<Vec<AvailablePlugin>> {
        Ok(lock(&self.state).builtins.clone())
    }

    fn is_running(&self, id: &PluginId) -> bool {
        let folder_present = lock(&self.plugins_dir)
            .as_ref()
            .is_some_and(|dir| dir.join(id.as_str()).exists());
        let mut state = lock(&self.state);
        let running = state.running.contains(id);
        state.calls.push(RuntimeCall::Poll {
            id: id.clone(),
            running,
            folder_present,
        });
        running
    }

    fn set_enabled(&self, id: &PluginId, enabled: bool) {
        let (started, stopped) = {
            let mut guard = lock(&self.state);
            let state = &mut *guard;
            if enabled {
                state.calls.push(RuntimeCall::Enable(id.clone()));
                let started = state.auto_start && state.running.insert(id.clone());
                (started, false)
            } else {
                state.calls.push(RuntimeCall::Disable(id.clone()));
                let requests = state.disable_requests.entry(id.clone()).or_default();
                *requests += 1;
                let due = state.stop_after.is_some_and(|after| *requests >= after);
                let stopped = due && state.running.remove(id);
                (false, stopped)
            }
        };
        if let Some(registry) = self.registry() {
            if started {
                let _ = registry.plugin_started(id);
            }
            if stopped {
                let _ = registry.plugin_stopped(id);
            }
        }
    }

    fn config_fields(&self, id: &PluginId) -> Option<ConfigFields> {
        lock(&self.state).fields.get(id).cloned()
    }
}

/// One scripted search result.
#[derive(Clone, Debug)]
pub(crate) enum SearchHit {
    Found(RemoteCandidate),
    Transient(String),
    Fatal(String),
}

#[derive(Default)]
struct RemoteState {
    hits: Vec<SearchHit>,
    pending_tail: bool,
    descriptors: HashMap<String, RemoteDescriptor>,
    unreachable: HashSet<String>,
    broken_fetches: HashSet<String>,
    blocked_publishes: HashSet<String>,
    stalled_fetches: HashSet<String>,
    fetches: Vec<FetchRequest>,
}

/// Scripted remote source. Packages are a bare `plugin.json` built from
/// the published descriptor.
#[derive(Default)]
pub(crate) struct FakeRemote {
    state: Mutex<RemoteState>,
}

impl FakeRemote {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn publish(&self, repo: &str, descriptor: RemoteDescriptor) {
        lock(&self.state).descriptors.insert(repo.to_string(), descriptor);
    }

    pub(crate) fn script_search(&self, hits: Vec<SearchHit>, pending_tail: bool) {
        let mut state = lock(&self.state);
        state.hits = hits;
        state.pending_tail = pending_tail;
    }

    pub(crate) fn make_unreachable(&self, repo: &str) {
        lock(&self.state).unreachable.insert(repo.to_string());
    }

    /// Fetches of `repo` write a partial file then fail.
    pub(crate) fn break_fetch(&self, repo: &str) {
        lock(&self.state).broken_fetches.insert(repo.to_string());
    }

    /// Fetches of `repo` succeed but leave a non-empty directory where the
    /// publish step moves the previous folder aside, so replacing fails.
    pub(crate) fn block_publish(&self, repo: &str) {
        lock(&self.state).blocked_publishes.insert(repo.to_string());
    }

    /// Fetches of `repo` report progress then never finish.
    pub(crate) fn stall_fetch(&self, repo: &str) {
        lock(&self.state).stalled_fetches.insert(repo.to_string());
    }

    pub(crate) fn fetches(&self) -> Vec<FetchRequest> {
        lock(&self.state).fetches.clone()
    }
}

#[async_trait]
impl RemoteSource for FakeRemote {
    fn search(&self, _query: &str) -> BoxStream<'static, Result<RemoteCandidate>> {
        let state = lock(&self.state);
        let results: Vec<Result<RemoteCandidate>> = state
            .hits
            .iter()
            .map(|hit| match hit {
                SearchHit::Found(candidate) => Ok(candidate.clone()),
                SearchHit::Transient(repo) => Err(Error::CandidateFailed {
                    repo: repo.clone(),
                    reason: "metadata unavailable".to_string(),
                }),
                SearchHit::Fatal(reason) => Err(Error::RemoteFailed(reason.clone())),
            })
            .collect();
        if state.pending_tail {
            stream::iter(results).chain(stream::pending()).boxed()
        } else {
            stream::iter(results).boxed()
        }
    }

    async fn repo_info(&self, repo: &str) -> Result<RepoInfo> {
        let state = lock(&self.state);
        if state.unreachable.contains(repo) {
            return Err(Error::RemoteFailed(format!("{repo} unreachable")));
        }
        if !state.descriptors.contains_key(repo) {
            return Err(Error::NotFound(repo.to_string()));
        }
        Ok(RepoInfo::new(repo))
    }

    async fn read_descriptor(&self, info: &RepoInfo) -> Result<RemoteDescriptor> {
        lock(&self.state)
            .descriptors
            .get(&info.repo)
            .cloned()
            .ok_or_else(|| Error::NotFound(info.repo.clone()))
    }

    async fn fetch(&self, request: &FetchRequest, dest: &Path, progress: ProgressFn<'_>) -> Result<()> {
        let (descriptor, broken, blocked, stalled) = {
            let mut state = lock(&self.state);
            state.fetches.push(request.clone());
            (
                state.descriptors.get(&request.repo).cloned(),
                state.broken_fetches.contains(&request.repo),
                state.blocked_publishes.contains(&request.repo),
                state.stalled_fetches.contains(&request.repo),
            )
        };
        progress(DownloadStatus::Starting);
        if stalled {
            std::future::pending::<()>().await;
        }
        if blocked {
            let aside = dest.with_extension("old");
            tokio::fs::create_dir_all(&aside).await?;
            tokio::fs::write(aside.join("keep"), b"x").await?;
        }
        if broken {
            tokio::fs::write(dest.join("partial.bin"), b"\0\0").await?;
            return Err(Error::RemoteFailed("connection reset".to_string()));
        }
        let descriptor = descriptor.ok_or_else(|| Error::NotFound(request.repo.clone()))?;
        let manifest = PluginManifest {
            version: descriptor.version,
            description: descriptor.description,
            api_required: descriptor.api_required,
            repo: Some(request.repo.clone()),
            config: ConfigFields::new(),
        };
        let body = serde_json::to_vec(&manifest)?;
        let total = body.len() as u64;
        progress(DownloadStatus::Receiving {
            received_bytes: total,
            total_bytes: Some(total),
        });
        tokio::fs::write(dest.join(MANIFEST_FILE), body).await?;
        Ok(())
    }
}
