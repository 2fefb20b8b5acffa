use std::path::PathBuf;

use super::StoreError;

const OSS_SCHEME: &str = "oss://";
const FILE_SCHEME: &str = "file://";

/// Parsed dictionary endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `oss://bucket/key`
    Oss { bucket: String, key: String },
    /// `http://…` or `https://…`, used verbatim.
    Http(String),
    /// `file://path` or a bare path, relative to the file store root.
    File(PathBuf),
}

impl Endpoint {
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(StoreError::Malformed("empty endpoint".into()));
        }
        if let Some(rest) = raw.strip_prefix(OSS_SCHEME) {
            let (bucket, key) = rest
                .split_once('/')
                .filter(|(b, k)| !b.is_empty() && !k.is_empty())
                .ok_or_else(|| StoreError::Malformed(format!("expected oss://bucket/key: {raw}")))?;
            return Ok(Endpoint::Oss {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Ok(Endpoint::Http(raw.to_string()));
        }
        let path = raw.strip_prefix(FILE_SCHEME).unwrap_or(raw);
        Ok(Endpoint::File(PathBuf::from(path)))
    }

    /// Substitute `{domain}` in an endpoint template.
    pub fn for_domain(template: &str, domain: &str) -> String {
        template.replace("{domain}", domain)
    }

    /// Object URL for an OSS endpoint given the service host.
    pub fn url(&self, oss_host: &str) -> Option<String> {
        match self {
            Endpoint::Oss { bucket, key } => Some(format!("https://{bucket}.{oss_host}/{key}")),
            Endpoint::Http(url) => Some(url.clone()),
            Endpoint::File(_) => None,
        }
    }
}
