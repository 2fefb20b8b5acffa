use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{
    content_etag, content_lines, Fetch, NodeAck, ObjectMetadata, RemoteDictStore, StoreError,
};

struct Object {
    text: String,
    etag: String,
    acks: BTreeMap<String, String>,
}

/// In-process store. Shared by every node that holds the same `Arc`, which
/// makes it a stand-in for one remote bucket in tests.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Object>>,
    /// Number of upcoming calls that fail with `Unavailable`.
    pending_failures: AtomicUsize,
    metadata_reads: AtomicUsize,
    content_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace an object, deriving its change token from the content.
    /// Returns the new token.
    pub fn put(&self, endpoint: &str, text: &str) -> String {
        let etag = content_etag(text.as_bytes());
        self.put_with_etag(endpoint, text, &etag);
        etag
    }

    /// Replace an object with an explicit change token. Acks are reset, as a
    /// re-upload replaces the object's metadata.
    pub fn put_with_etag(&self, endpoint: &str, text: &str, etag: &str) {
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.insert(
            endpoint.to_string(),
            Object {
                text: text.to_string(),
                etag: etag.to_string(),
                acks: BTreeMap::new(),
            },
        );
    }

    pub fn remove(&self, endpoint: &str) -> bool {
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.remove(endpoint).is_some()
    }

    /// Acknowledgement map of an object (empty if absent).
    pub fn acks(&self, endpoint: &str) -> BTreeMap<String, String> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects
            .get(endpoint)
            .map(|o| o.acks.clone())
            .unwrap_or_default()
    }

    /// Make the next `n` calls fail as if the network were down.
    pub fn fail_next(&self, n: usize) {
        self.pending_failures.store(n, Ordering::SeqCst);
    }

    pub fn metadata_reads(&self) -> usize {
        self.metadata_reads.load(Ordering::SeqCst)
    }

    pub fn content_reads(&self) -> usize {
        self.content_reads.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        let injected = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        Ok(())
    }
}

impl RemoteDictStore for MemoryStore {
    fn metadata(&self, endpoint: &str) -> Result<Fetch<ObjectMetadata>, StoreError> {
        self.metadata_reads.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        Ok(match objects.get(endpoint) {
            Some(o) => Fetch::Found(ObjectMetadata {
                etag: o.etag.clone(),
                acks: o.acks.clone(),
            }),
            None => Fetch::NotFound,
        })
    }

    fn content(&self, endpoint: &str) -> Result<Fetch<Vec<String>>, StoreError> {
        self.content_reads.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        Ok(match objects.get(endpoint) {
            Some(o) => Fetch::Found(content_lines(&o.text)),
            None => Fetch::NotFound,
        })
    }

    fn set_node_ack(&self, endpoint: &str, ack: &NodeAck) -> Result<(), StoreError> {
        self.check_failure()?;
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        let Some(object) = objects.get_mut(endpoint) else {
            return Err(StoreError::Unavailable(format!("no object at {endpoint}")));
        };
        ack.apply(&mut object.acks);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
