
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use seg_core::dict::{DictError, Dictionary, DictionaryType};
use seg_core::remote::{same_etag, Fetch, NodeAck, RemoteDictStore, StoreError};
use tracing::{debug, debug_span, error, info, warn};

use crate::cluster::ClusterMembership;

/// Where a monitor is in its poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Polling,
    Unchanged,
    Changed,
    Reloading,
    Acknowledging,
    Error,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Polling => "polling",
            Phase::Unchanged => "unchanged",
            Phase::Changed => "changed",
            Phase::Reloading => "reloading",
            Phase::Acknowledging => "acknowledging",
            Phase::Error => "error",
        };
        f.pad(s)
    }
}

/// Snapshot of what a monitor knows about its endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteDictionaryState {
    pub phase: Phase,
    /// Change token of the content currently published; `None` until the
    /// first successful reload.
    pub last_etag: Option<String>,
    pub last_success: Option<SystemTime>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Remote object does not exist. Nothing changed.
    NotFound,
    /// Token matches the published content and this node's ack is current.
    Unchanged,
    /// Token unchanged, but this node's ack was missing or stale and was
    /// rewritten.
    AckRepaired,
    /// New content published under `etag`.
    Reloaded { etag: String, acknowledged: bool },
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("no {kind} endpoint configured for domain {domain}")]
    NotConfigured {
        domain: String,
        kind: DictionaryType,
    },

    #[error("metadata check failed: {0}")]
    Store(#[from] StoreError),

    #[error("reload failed: {0}")]
    Reload(#[from] DictError),

    #[error("failed to spawn monitor thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Polls one (domain, dictionary type) endpoint and keeps the domain's
/// published trie in step with it.
///
/// Polls are serialized per monitor. A failed poll leaves the published
/// dictionary and the last adopted token untouched, so the next poll retries.
pub struct SyncMonitor {
    dictionary: Arc<Dictionary>,
    kind: DictionaryType,
    endpoint: String,
    cluster: Arc<dyn ClusterMembership>,
    poll_lock: Mutex<()>,
    state: Mutex<RemoteDictionaryState>,
}

impl SyncMonitor {
    pub fn new(
        dictionary: Arc<Dictionary>,
        kind: DictionaryType,
        cluster: Arc<dyn ClusterMembership>,
    ) -> Result<Self, SyncError> {
        let endpoint = dictionary
            .endpoints()
            .get(kind)
            .ok_or_else(|| SyncError::NotConfigured {
                domain: dictionary.domain().to_string(),
                kind,
            })?
            .to_string();
        Ok(Self {
            dictionary,
            kind,
            endpoint,
            cluster,
            poll_lock: Mutex::new(()),
            state: Mutex::new(RemoteDictionaryState::default()),
        })
    }

    pub fn domain(&self) -> &str {
        self.dictionary.domain()
    }

    pub fn kind(&self) -> DictionaryType {
        self.kind
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> RemoteDictionaryState {
        self.lock_state().clone()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, RemoteDictionaryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_phase(&self, phase: Phase) {
        self.lock_state().phase = phase;
    }

    fn store(&self) -> &Arc<dyn RemoteDictStore> {
        self.dictionary.store()
    }

    /// One detection cycle: read the token, reload on change, acknowledge.
    pub fn poll(&self) -> Result<PollOutcome, SyncError> {
        let _poll = self.poll_lock.lock().unwrap_or_else(|e| e.into_inner());
        let _span =
            debug_span!("poll", domain = %self.dictionary.domain(), kind = %self.kind).entered();
        self.set_phase(Phase::Polling);

        let metadata = match self.store().metadata(&self.endpoint) {
            Ok(Fetch::Found(m)) => m,
            Ok(Fetch::NotFound) => {
                debug!(endpoint = %self.endpoint, "remote dictionary not found");
                self.set_phase(Phase::Idle);
                return Ok(PollOutcome::NotFound);
            }
            Err(e) => return Err(self.fail(e.into())),
        };

        let last = self.lock_state().last_etag.clone();
        if last.as_deref().is_some_and(|t| same_etag(t, &metadata.etag)) {
            self.set_phase(Phase::Unchanged);
            let local = self.cluster.local_node();
            let current = metadata
                .ack_for(&local)
                .is_some_and(|a| same_etag(a, &metadata.etag));
            if current {
                self.set_phase(Phase::Idle);
                return Ok(PollOutcome::Unchanged);
            }
            debug!(node = %local, "acknowledgement missing or stale");
            self.set_phase(Phase::Acknowledging);
            let acknowledged = self.acknowledge(&metadata.etag);
            self.set_phase(Phase::Idle);
            return Ok(if acknowledged {
                PollOutcome::AckRepaired
            } else {
                PollOutcome::Unchanged
            });
        }

        self.set_phase(Phase::Changed);
        info!(previous = ?last, etag = %metadata.etag, "remote dictionary changed");

        self.set_phase(Phase::Reloading);
        let outcome = match self.dictionary.reload(Some(self.kind)) {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.fail(e.into())),
        };
        if !outcome.is_loaded(self.kind) {
            // Removed between the metadata read and the content read.
            debug!(endpoint = %self.endpoint, "remote dictionary vanished during reload");
            self.set_phase(Phase::Idle);
            return Ok(PollOutcome::NotFound);
        }
        {
            let mut state = self.lock_state();
            state.last_etag = Some(metadata.etag.clone());
            state.last_success = Some(SystemTime::now());
            state.last_error = None;
            state.phase = Phase::Acknowledging;
        }

        let acknowledged = self.acknowledge(&metadata.etag);
        self.set_phase(Phase::Idle);
        Ok(PollOutcome::Reloaded {
            etag: metadata.etag,
            acknowledged,
        })
    }

    /// Record `etag` as adopted by this node. Failures are logged only; the
    /// next unchanged poll repairs a missing entry.
    fn acknowledge(&self, etag: &str) -> bool {
        let ack = NodeAck {
            node_id: self.cluster.local_node(),
            etag: etag.to_string(),
            peers: self.cluster.peers(),
        };
        match self.store().set_node_ack(&self.endpoint, &ack) {
            Ok(()) => {
                info!(node = %ack.node_id, etag, "acknowledged dictionary version");
                true
            }
            Err(StoreError::Unsupported(backend)) => {
                debug!(backend, "store does not record acknowledgements");
                false
            }
            Err(e) => {
                warn!(node = %ack.node_id, "failed to write acknowledgement: {e}");
                false
            }
        }
    }

    fn fail(&self, e: SyncError) -> SyncError {
        let transient = match &e {
            SyncError::Store(s) | SyncError::Reload(DictError::Store(s)) => s.is_transient(),
            _ => false,
        };
        if transient {
            warn!(endpoint = %self.endpoint, "poll failed: {e}");
        } else {
            error!(endpoint = %self.endpoint, "poll failed: {e}");
        }
        let mut state = self.lock_state();
        state.phase = Phase::Error;
        state.last_error = Some(e.to_string());
        e
    }
}

impl fmt::Debug for SyncMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncMonitor")
            .field("domain", &self.dictionary.domain())
            .field("kind", &self.kind)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
