//! Composition root.
//!
//! [`SegEngine`] owns the remote store, cluster membership and the baseline
//! dictionary, and hands out one [`Domain`] per tenant. Opening a domain
//! performs its initial load and, when scheduling is on, starts one monitor
//! thread per remotely configured dictionary type.

#[cfg(test)]
mod tests;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use seg_core::dict::{DefaultDictionary, DictError, Dictionary, DictionaryType};
use seg_core::remote::{
    CredentialError, FileStore, HttpStore, RamRoleCredentials, RemoteDictStore,
};
use seg_core::settings::Settings;
use seg_sync::{ClusterMembership, PollOutcome, Scheduled, StaticCluster, SyncError, SyncMonitor};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("baseline dictionary: {0}")]
    Baseline(#[from] DictError),

    #[error("credentials: {0}")]
    Credential(#[from] CredentialError),

    #[error("monitor: {0}")]
    Sync(#[from] SyncError),

    #[error("domain name is blank")]
    BlankDomain,
}

/// One tenant's dictionary and the monitors keeping it current.
pub struct Domain {
    dictionary: Arc<Dictionary>,
    monitors: Vec<Arc<SyncMonitor>>,
    tasks: Mutex<Vec<Scheduled>>,
}

impl Domain {
    pub fn name(&self) -> &str {
        self.dictionary.domain()
    }

    pub fn dictionary(&self) -> &Arc<Dictionary> {
        &self.dictionary
    }

    pub fn monitors(&self) -> &[Arc<SyncMonitor>] {
        &self.monitors
    }

    /// Run one poll of every monitor now, outside the schedule.
    pub fn poll_now(&self) -> Vec<(DictionaryType, Result<PollOutcome, SyncError>)> {
        self.monitors.iter().map(|m| (m.kind(), m.poll())).collect()
    }

    pub fn is_scheduled(&self) -> bool {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.iter().any(Scheduled::is_running)
    }

    fn stop(&self) {
        let tasks: Vec<Scheduled> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            tasks.drain(..).collect()
        };
        for task in tasks {
            task.cancel();
        }
    }
}

impl Drop for Domain {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct SegEngine {
    settings: Settings,
    store: Arc<dyn RemoteDictStore>,
    cluster: Arc<dyn ClusterMembership>,
    baseline: Arc<DefaultDictionary>,
    domains: Mutex<HashMap<String, Arc<Domain>>>,
    schedule: bool,
}

impl SegEngine {
    pub fn new(
        settings: Settings,
        store: Arc<dyn RemoteDictStore>,
        cluster: Arc<dyn ClusterMembership>,
        baseline: Arc<DefaultDictionary>,
    ) -> Self {
        Self {
            settings,
            store,
            cluster,
            baseline,
            domains: Mutex::new(HashMap::new()),
            schedule: true,
        }
    }

    /// Build the store, cluster and baseline described by `settings`.
    pub fn from_settings(settings: Settings) -> Result<Self, EngineError> {
        let baseline = match &settings.baseline.dir {
            Some(dir) => DefaultDictionary::load(dir)?,
            None => DefaultDictionary::empty(),
        };
        let store = store_from_settings(&settings)?;
        let cluster = StaticCluster::new(
            settings.cluster.local_node.trim(),
            settings.cluster.nodes.clone(),
        );
        info!(store = store.name(), node = %cluster.local_node(), "engine ready");
        Ok(Self::new(
            settings,
            store,
            Arc::new(cluster),
            Arc::new(baseline),
        ))
    }

    /// Turn background polling on or off for domains opened afterwards.
    /// Polling also requires `remote.enabled`.
    pub fn with_scheduling(mut self, schedule: bool) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn RemoteDictStore> {
        &self.store
    }

    pub fn baseline(&self) -> &Arc<DefaultDictionary> {
        &self.baseline
    }

    /// Open `name`, or return it if already open.
    ///
    /// The initial load is one poll per monitor; failures are logged and
    /// leave that type empty until a later poll succeeds. Monitors are
    /// scheduled only when `remote.enabled` is set. The domain map is not
    /// locked while loading, so other domains stay reachable; when two
    /// opens of the same name race, the first one inserted wins.
    pub fn open_domain(&self, name: &str) -> Result<Arc<Domain>, EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::BlankDomain);
        }
        if let Some(domain) = self.domain(name) {
            return Ok(domain);
        }

        let dictionary = Arc::new(
            Dictionary::new(
                name,
                Arc::clone(&self.baseline),
                Arc::clone(&self.store),
                self.settings.endpoints(name),
            )
            .with_allow_empty(self.settings.remote.allow_empty),
        );
        let monitors = dictionary
            .endpoints()
            .configured()
            .into_iter()
            .map(|kind| {
                SyncMonitor::new(Arc::clone(&dictionary), kind, Arc::clone(&self.cluster))
                    .map(Arc::new)
            })
            .collect::<Result<Vec<_>, _>>()?;

        for monitor in &monitors {
            if let Err(e) = monitor.poll() {
                warn!(domain = name, kind = %monitor.kind(), "initial load failed: {e}");
            }
        }

        let mut domains = self.domains.lock().unwrap_or_else(|e| e.into_inner());
        let slot = match domains.entry(name.to_string()) {
            Entry::Occupied(existing) => {
                debug!(domain = name, "opened concurrently, keeping first");
                return Ok(Arc::clone(existing.get()));
            }
            Entry::Vacant(slot) => slot,
        };

        let mut tasks = Vec::new();
        if self.schedule && self.settings.remote.enabled {
            let refresh = &self.settings.remote.refresh;
            for monitor in &monitors {
                tasks.push(Scheduled::monitor(
                    Arc::clone(monitor),
                    refresh.delay(),
                    refresh.period(),
                )?);
            }
        }

        info!(
            domain = name,
            monitors = monitors.len(),
            scheduled = !tasks.is_empty(),
            "domain opened"
        );
        let domain = Arc::new(Domain {
            dictionary,
            monitors,
            tasks: Mutex::new(tasks),
        });
        slot.insert(Arc::clone(&domain));
        Ok(domain)
    }

    pub fn domain(&self, name: &str) -> Option<Arc<Domain>> {
        let domains = self.domains.lock().unwrap_or_else(|e| e.into_inner());
        domains.get(name.trim()).cloned()
    }

    pub fn domain_names(&self) -> Vec<String> {
        let domains = self.domains.lock().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = domains.keys().cloned().collect();
        names.sort();
        names
    }

    /// Cancel the domain's monitors and forget it. Handles already given out
    /// keep working on their last published dictionary.
    pub fn unload_domain(&self, name: &str) -> bool {
        let removed = {
            let mut domains = self.domains.lock().unwrap_or_else(|e| e.into_inner());
            domains.remove(name.trim())
        };
        match removed {
            Some(domain) => {
                domain.stop();
                info!(domain = %name.trim(), "domain unloaded");
                true
            }
            None => false,
        }
    }

    /// Unload every domain.
    pub fn shutdown(&self) {
        for name in self.domain_names() {
            self.unload_domain(&name);
        }
    }
}

impl Drop for SegEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn store_from_settings(settings: &Settings) -> Result<Arc<dyn RemoteDictStore>, EngineError> {
    let remote = &settings.remote;
    let root = remote.file.root.trim();
    if !root.is_empty() {
        return Ok(Arc::new(FileStore::new(PathBuf::from(root))));
    }
    let timeouts = remote.http.timeouts();
    let mut store = HttpStore::new(remote.oss.endpoint.trim(), timeouts);
    if !remote.oss.ram_role.trim().is_empty() {
        let credentials =
            RamRoleCredentials::new(&remote.oss.metadata_service, &remote.oss.ram_role, &timeouts)?;
        store = store.with_credentials(Arc::new(credentials));
    }
    Ok(Arc::new(store))
}
