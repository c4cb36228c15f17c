//! Live plugin list.
//!
//! Turns registry events into list operations for one subscriber.

use crate::core::PluginId;
use crate::events::{EventSubscription, PluginEvent};
use crate::plugin::entry::PluginEntry;
use crate::plugin::model::AvailablePlugin;
use crate::plugin::registry::{PluginRegistry, RegistrySnapshot};
use crate::stream::{live_list, ListItem, ListProducer, ListStream};
use std::collections::BTreeMap;
use tracing::debug;

/// Subscribe to the plugin list: installed plugins plus available ones
/// that are not installed.
pub fn watch_plugins(registry: &PluginRegistry) -> ListStream<PluginEntry> {
    let (snapshot, events) = registry.snapshot_and_subscribe();
    let view = PluginView::from_snapshot(&snapshot);
    let (producer, stream) = live_list(view.entries());
    tokio::spawn(run_feed(view, events, producer));
    stream
}

async fn run_feed(mut view: PluginView, mut events: EventSubscription, producer: ListProducer<PluginEntry>) {
    debug!(entries = view.rows.len(), "plugin list subscribed");
    let source_closed = loop {
        tokio::select! {
            _ = producer.closed() => break false,
            event = events.recv() => match event {
                Some(event) => view.apply(&event, &producer),
                None => break true,
            },
        }
    };
    events.unsubscribe();
    if source_closed {
        producer.end();
    }
    debug!("plugin list released");
}

/// What this subscriber has been told so far.
struct PluginView {
    rows: BTreeMap<PluginId, PluginEntry>,
}

impl PluginView {
    fn from_snapshot(snapshot: &RegistrySnapshot) -> Self {
        let mut rows: BTreeMap<PluginId, PluginEntry> = snapshot
            .available
            .iter()
            .map(|plugin| (plugin.id.clone(), PluginEntry::from_available(plugin)))
            .collect();
        for plugin in &snapshot.installed {
            rows.insert(plugin.id.clone(), PluginEntry::from_installed(plugin));
        }
        Self { rows }
    }

    fn entries(&self) -> Vec<PluginEntry> {
        self.rows.values().cloned().collect()
    }

    fn apply(&mut self, event: &PluginEvent, producer: &ListProducer<PluginEntry>) {
        match event {
            PluginEvent::Installed(plugin)
            | PluginEvent::Started(plugin)
            | PluginEvent::Stopped(plugin)
            | PluginEvent::Updated(plugin) => {
                self.set(&plugin.id, Some(PluginEntry::from_installed(plugin)), producer);
            }
            PluginEvent::Uninstalled { id, available } => {
                let fallback = available.as_ref().map(PluginEntry::from_available);
                self.set(id, fallback, producer);
            }
            PluginEvent::CatalogRefreshed(catalog) => self.refresh_catalog(catalog, producer),
            PluginEvent::DownloadProgress { .. } => {}
        }
    }

    fn refresh_catalog(&mut self, catalog: &[AvailablePlugin], producer: &ListProducer<PluginEntry>) {
        let mut fresh: BTreeMap<PluginId, PluginEntry> = catalog
            .iter()
            .filter(|plugin| !self.rows.get(&plugin.id).is_some_and(|row| row.installed))
            .map(|plugin| (plugin.id.clone(), PluginEntry::from_available(plugin)))
            .collect();

        let stale: Vec<PluginId> = self
            .rows
            .iter()
            .filter(|(id, row)| !row.installed && !fresh.contains_key(*id))
            .map(|(id, _)| id.clone())
            .collect();
        for id in stale {
            self.set(&id, None, producer);
        }
        while let Some((id, entry)) = fresh.pop_first() {
            self.set(&id, Some(entry), producer);
        }
    }

    fn set(&mut self, id: &PluginId, newer: Option<PluginEntry>, producer: &ListProducer<PluginEntry>) {
        match (self.rows.get(id), newer) {
            (Some(current), Some(newer)) => {
                if let Some(patch) = current.diff(&newer) {
                    producer.update(id.clone(), patch);
                    self.rows.insert(id.clone(), newer);
                }
            }
            (None, Some(newer)) => {
                producer.add(newer.clone());
                self.rows.insert(id.clone(), newer);
            }
            (Some(_), None) => {
                producer.remove(id.clone());
                self.rows.remove(id);
            }
            (None, None) => {}
        }
    }
}
