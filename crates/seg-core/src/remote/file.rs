//! Directory-backed store.
//!
//! Each endpoint maps to a file under `root`; `oss://bucket/key` endpoints map
//! to `root/bucket/key`, so a mirrored bucket can be served locally. The change
//! token is derived from the file bytes. Acknowledgements live in a JSON
//! sidecar `<file>.acks.json`, rewritten atomically under an exclusive lock
//! on `<file>.acks.lock`, so several processes may share one root.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::process;
use std::sync::Mutex;

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{
    content_etag, decode_content, Endpoint, Fetch, NodeAck, ObjectMetadata, RemoteDictStore,
    StoreError,
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct AckFile {
    acks: BTreeMap<String, String>,
}

pub struct FileStore {
    root: PathBuf,
    /// Serializes read-modify-write of ack sidecars.
    ack_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ack_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an endpoint to a path under the root.
    pub fn path_for(&self, endpoint: &str) -> Result<PathBuf, StoreError> {
        let relative = match Endpoint::parse(endpoint)? {
            Endpoint::File(path) => path,
            Endpoint::Oss { bucket, key } => Path::new(&bucket).join(key),
            Endpoint::Http(_) => return Err(StoreError::Unsupported("file store (http endpoint)")),
        };
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(StoreError::Malformed(format!(
                "endpoint escapes store root: {endpoint}"
            )));
        }
        Ok(self.root.join(relative))
    }

    fn sidecar(path: &Path, suffix: &str) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    fn ack_path(path: &Path) -> PathBuf {
        Self::sidecar(path, ".acks.json")
    }

    /// Acks for a metadata read. The sidecar is advisory: an unreadable one
    /// is reported as empty so change detection keeps working, and the next
    /// ack write replaces it.
    fn read_acks_lenient(path: &Path) -> BTreeMap<String, String> {
        Self::read_acks(path).unwrap_or_else(|e| {
            warn!(path = %Self::ack_path(path).display(), "ignoring ack sidecar: {e}");
            BTreeMap::new()
        })
    }

    fn read_acks(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read(Self::ack_path(path)) {
            Ok(bytes) => {
                let file: AckFile = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Malformed(format!("ack sidecar: {e}")))?;
                Ok(file.acks)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomic write: write to a per-writer .tmp then rename.
    fn write_acks(
        path: &Path,
        writer: &str,
        acks: BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        let target = Self::ack_path(path);
        let tag: String = writer
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let tmp = Self::sidecar(path, &format!(".acks.{tag}-{}.tmp", process::id()));
        let body = serde_json::to_vec_pretty(&AckFile { acks })
            .map_err(|e| StoreError::Malformed(format!("ack sidecar: {e}")))?;
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &target)?;
        Ok(())
    }

    fn read_object(path: &Path) -> Result<Fetch<Vec<u8>>, StoreError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Fetch::Found(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Fetch::NotFound),
            Err(e) => Err(e.into()),
        }
    }
}

impl RemoteDictStore for FileStore {
    fn metadata(&self, endpoint: &str) -> Result<Fetch<ObjectMetadata>, StoreError> {
        let path = self.path_for(endpoint)?;
        let Fetch::Found(bytes) = Self::read_object(&path)? else {
            return Ok(Fetch::NotFound);
        };
        Ok(Fetch::Found(ObjectMetadata {
            etag: content_etag(&bytes),
            acks: Self::read_acks_lenient(&path),
        }))
    }

    fn content(&self, endpoint: &str) -> Result<Fetch<Vec<String>>, StoreError> {
        let path = self.path_for(endpoint)?;
        match Self::read_object(&path)? {
            Fetch::Found(bytes) => Ok(Fetch::Found(decode_content(bytes)?)),
            Fetch::NotFound => Ok(Fetch::NotFound),
        }
    }

    fn set_node_ack(&self, endpoint: &str, ack: &NodeAck) -> Result<(), StoreError> {
        let path = self.path_for(endpoint)?;
        if !path.is_file() {
            return Err(StoreError::Unavailable(format!(
                "no object at {}",
                path.display()
            )));
        }
        let _guard = self.ack_lock.lock().unwrap_or_else(|e| e.into_inner());
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(Self::sidecar(&path, ".acks.lock"))?;
        lock_file.lock_exclusive()?;

        let mut acks = match Self::read_acks(&path) {
            Err(StoreError::Malformed(e)) => {
                warn!(path = %path.display(), "rewriting corrupt ack sidecar: {e}");
                BTreeMap::new()
            }
            other => other?,
        };
        ack.apply(&mut acks);
        // The lock is released when `lock_file` is dropped.
        Self::write_acks(&path, &ack.node_id, acks)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
